//! # durable-tx-memory
//!
//! In-memory implementation of the durability host for durable-tx.
//!
//! [`InMemoryHost`] is a complete, thread-safe [`DurableHost`] without a real
//! durable runtime behind it. It is meant for tests, examples, and embedded
//! local development: every host interaction is recorded with a timestamp so
//! assertions can be made about rewind targets, atomic region bracketing,
//! and policy changes.
//!
//! # Example
//!
//! ```
//! use durable_tx_core::{fallible_transaction, operation};
//! use durable_tx_memory::InMemoryHost;
//!
//! # #[derive(Debug, thiserror::Error)]
//! # #[error("boom")]
//! # struct Boom;
//! let host = InMemoryHost::new();
//! let double = operation(|n: u32| Ok::<_, Boom>(n * 2), |_, _| Ok(()));
//!
//! let result = futures::executor::block_on(fallible_transaction(&host, |tx| {
//!     Box::pin(async move { tx.execute(&double, 21).await })
//! }));
//!
//! assert_eq!(result.unwrap(), 42);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use durable_tx_core::port::durability::{DurableHost, LogPosition, PersistenceLevel, RetryPolicy};
use parking_lot::RwLock;
use uuid::Uuid;

/// One recorded host interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum HostInteraction {
    /// The current log index was read.
    IndexRead(LogPosition),
    /// An application-level effect was appended via [`InMemoryHost::advance`].
    EffectRecorded(LogPosition),
    /// Execution was moved back to the given position.
    Rewind(LogPosition),
    /// An atomic region was opened at the given position.
    RegionOpened(LogPosition),
    /// The atomic region opened at the given position was closed.
    RegionClosed(LogPosition),
    /// The log was flushed to the requested number of replicas.
    LogCommitted { replicas: u8 },
    RetryPolicyReplaced(RetryPolicy),
    PersistenceLevelReplaced(PersistenceLevel),
    IdempotenceModeReplaced(bool),
    IdempotencyKeyIssued(Uuid),
}

/// A host interaction together with when it happened.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub interaction: HostInteraction,
    pub recorded_at: DateTime<Utc>,
}

/// Thread-safe in-memory durability host.
///
/// The log index advances on every host interaction, mirroring a real host
/// that records each intrinsic call to its oplog, so repeated index reads
/// observe strictly increasing positions. [`rewind_to`](DurableHost::rewind_to)
/// moves the index back; forward execution then re-advances through the
/// rewound range, exactly as a replay would.
pub struct InMemoryHost {
    index: AtomicU64,
    open_regions: RwLock<Vec<LogPosition>>,
    history: RwLock<Vec<HostRecord>>,
    retry_policy: RwLock<RetryPolicy>,
    persistence_level: RwLock<PersistenceLevel>,
    idempotent: AtomicBool,
}

impl Default for InMemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self {
            index: AtomicU64::new(0),
            open_regions: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            retry_policy: RwLock::new(RetryPolicy::default()),
            persistence_level: RwLock::new(PersistenceLevel::default()),
            // At-least-once is the host default.
            idempotent: AtomicBool::new(true),
        }
    }

    /// Appends an application-level effect to the simulated log and returns
    /// its position.
    pub fn advance(&self) -> LogPosition {
        let position = self.next_position();
        self.record(HostInteraction::EffectRecorded(position));
        position
    }

    /// Everything that happened on this host, in program order.
    pub fn history(&self) -> Vec<HostRecord> {
        self.history.read().clone()
    }

    /// All rewind targets, in the order they were requested.
    pub fn rewinds(&self) -> Vec<LogPosition> {
        self.history
            .read()
            .iter()
            .filter_map(|record| match record.interaction {
                HostInteraction::Rewind(position) => Some(position),
                _ => None,
            })
            .collect()
    }

    /// Number of atomic regions currently open.
    pub fn open_region_count(&self) -> usize {
        self.open_regions.read().len()
    }

    /// Clear all recorded history (useful between test phases).
    pub fn clear_history(&self) {
        self.history.write().clear();
    }

    fn next_position(&self) -> LogPosition {
        LogPosition(self.index.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn record(&self, interaction: HostInteraction) {
        self.history.write().push(HostRecord {
            interaction,
            recorded_at: Utc::now(),
        });
    }
}

impl DurableHost for InMemoryHost {
    fn current_log_index(&self) -> LogPosition {
        let position = self.next_position();
        self.record(HostInteraction::IndexRead(position));
        position
    }

    fn rewind_to(&self, position: LogPosition) {
        self.index.store(position.0, Ordering::SeqCst);
        self.record(HostInteraction::Rewind(position));
    }

    fn mark_atomic_begin(&self) -> LogPosition {
        let position = self.next_position();
        self.open_regions.write().push(position);
        self.record(HostInteraction::RegionOpened(position));
        position
    }

    fn mark_atomic_end(&self, begin: LogPosition) {
        let mut open = self.open_regions.write();
        // Closing an already-closed region does nothing.
        if let Some(found) = open.iter().rposition(|position| *position == begin) {
            open.remove(found);
            drop(open);
            self.record(HostInteraction::RegionClosed(begin));
        }
    }

    fn commit_log(&self, replicas: u8) {
        self.record(HostInteraction::LogCommitted { replicas });
    }

    fn retry_policy(&self) -> RetryPolicy {
        *self.retry_policy.read()
    }

    fn set_retry_policy(&self, policy: RetryPolicy) {
        *self.retry_policy.write() = policy;
        self.record(HostInteraction::RetryPolicyReplaced(policy));
    }

    fn persistence_level(&self) -> PersistenceLevel {
        *self.persistence_level.read()
    }

    fn set_persistence_level(&self, level: PersistenceLevel) {
        *self.persistence_level.write() = level;
        self.record(HostInteraction::PersistenceLevelReplaced(level));
    }

    fn idempotence_mode(&self) -> bool {
        self.idempotent.load(Ordering::SeqCst)
    }

    fn set_idempotence_mode(&self, idempotent: bool) {
        self.idempotent.store(idempotent, Ordering::SeqCst);
        self.record(HostInteraction::IdempotenceModeReplaced(idempotent));
    }

    fn generate_idempotency_key(&self) -> Uuid {
        let key = Uuid::new_v4();
        // Persisted before it is returned, so it survives replay.
        self.record(HostInteraction::IdempotencyKeyIssued(key));
        key
    }
}
