//! The two transaction modes.
//!
//! [`fallible_transaction`] reports failure to its caller as a classified
//! [`TransactionFailure`](crate::error::TransactionFailure) after best-effort
//! rollback. [`infallible_transaction`] never reports failure: it rolls back,
//! rewinds the durable log, and re-runs the whole body until it succeeds.

pub mod fallible;
pub mod infallible;

pub use fallible::{FallibleTransaction, fallible_transaction};
pub use infallible::{InfallibleTransaction, Restart, infallible_transaction};
