//! Ports for the host execution environment.
//!
//! This module defines the trait abstractions (ports) the transaction engine
//! uses to interact with the durable execution host. Each port can have
//! multiple implementations (a real durable runtime, in-memory, mock, etc.).

pub mod durability;

pub use durability::{DurableHost, LogPosition, PersistenceLevel, RetryPolicy};
