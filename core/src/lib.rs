//! # durable-tx-core
//!
//! Compensating transactions over a durable, replayable execution log.
//!
//! A transaction body is a sequence of externally-effectful [`Operation`]s,
//! each paired with a compensating action that undoes it. As operations
//! succeed their compensations accumulate on a stack; when something fails,
//! the stack unwinds in reverse order. The engine runs on top of a host
//! runtime that owns a durable execution log ([`DurableHost`]), which lets a
//! failed transaction rewind the log and replay the whole body as one unit.
//!
//! ## Transaction modes
//!
//! - [`fallible_transaction`]: failure is rolled back best-effort and
//!   reported to the caller as a classified [`TransactionFailure`].
//! - [`infallible_transaction`]: failure is rolled back, the log is rewound
//!   to the position captured at transaction start, and the entire body runs
//!   again, looping until it succeeds at the pace of the host's retry policy.
//!
//! ## Modules
//!
//! - [`mod@operation`]: the [`Operation`] trait and the [`operation()`]
//!   closure-pair constructor
//! - [`transaction`]: both transaction modes
//! - [`port`]: the [`DurableHost`] port the host runtime implements
//! - [`guard`]: RAII scopes over the host (atomic regions, policy overrides)
//! - [`error`]: [`TransactionFailure`] outcome classification
//! - [`telemetry`]: `tracing` subscriber wiring for binaries and examples
//!
//! ## Usage
//!
//! ```ignore
//! use durable_tx_core::{fallible_transaction, operation};
//!
//! let create = operation(
//!     |name: String| service.create(&name),
//!     |_, id| service.delete(id),
//! );
//!
//! let id = fallible_transaction(&host, |tx| {
//!     Box::pin(async move {
//!         let id = tx.execute(&create, "foo".to_string()).await?;
//!         tx.execute(&announce, id).await?;
//!         Ok(id)
//!     })
//! })
//! .await?;
//! ```

mod compensation;
pub mod error;
pub mod guard;
pub mod operation;
pub mod port;
pub mod telemetry;
pub mod transaction;

pub use error::{TransactionFailure, TransactionResult};
pub use guard::{
    AtomicRegion, IdempotenceModeOverride, PersistenceLevelOverride, RetryPolicyOverride,
};
pub use operation::{FnOperation, Operation, operation};
pub use port::durability::{DurableHost, LogPosition, PersistenceLevel, RetryPolicy};
pub use telemetry::{TelemetryConfig, TelemetryGuard, init_telemetry};
pub use transaction::{
    FallibleTransaction, InfallibleTransaction, Restart, fallible_transaction,
    infallible_transaction,
};
