//! DurableHost port trait definition.
//!
//! This module defines the [`DurableHost`] trait that the host execution
//! environment must implement to give transactions their durability
//! guarantees. The engine only ever consumes these primitives; it never
//! implements them itself.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Position in the host's durable execution log.
///
/// Positions are opaque to the engine: the only operations it performs are
/// capturing the current position at transaction start and restoring that
/// exact position on retry. Positions issued by a host are strictly
/// increasing over the lifetime of forward execution; a rewind makes the host
/// re-issue the rewound range on replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogPosition(pub u64);

impl LogPosition {
    /// The position before any log record has been written.
    pub const ORIGIN: LogPosition = LogPosition(0);

    pub fn new(index: u64) -> Self {
        Self(index)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Host-level retry configuration.
///
/// This is the policy the host applies when it replays a failed region; the
/// engine itself never counts attempts or sleeps. Overriding it is the
/// designed way to bound or shape the retries of an infallible transaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts before the host gives up on the worker.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub min_delay: Duration,
    /// Upper bound on the delay between retries.
    pub max_delay: Duration,
    /// Exponential backoff multiplier applied per attempt.
    pub multiplier: f64,
    /// Optional jitter factor in `[0.0, 1.0]` applied to each delay.
    pub max_jitter_factor: Option<f64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
            max_jitter_factor: None,
        }
    }
}

/// How much of the execution the host records to its durable log.
///
/// Lowering the level trades durability for speed in sections that do not
/// need replay-exact behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistenceLevel {
    /// Record nothing; the section is re-executed from scratch on replay.
    PersistNothing,
    /// Record only side effects that left the process.
    PersistRemoteSideEffects,
    /// Let the host decide per operation.
    #[default]
    Smart,
}

impl fmt::Display for PersistenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceLevel::PersistNothing => write!(f, "persist-nothing"),
            PersistenceLevel::PersistRemoteSideEffects => write!(f, "persist-remote-side-effects"),
            PersistenceLevel::Smart => write!(f, "smart"),
        }
    }
}

/// Primitives the durable execution host provides to the engine.
///
/// # Contract
///
/// - [`current_log_index`](DurableHost::current_log_index) returns the
///   position corresponding to "now". Reads are strictly increasing across
///   forward execution because every host interaction is itself recorded.
/// - [`rewind_to`](DurableHost::rewind_to) causes execution to resume as
///   though currently at the given position; everything recorded after it is
///   discarded from the host's perspective and will be re-issued on replay.
/// - [`mark_atomic_begin`](DurableHost::mark_atomic_begin) /
///   [`mark_atomic_end`](DurableHost::mark_atomic_end) bracket a region that
///   is replayed as one unit if the host fails or restarts inside it. The
///   begin mark returns the position that closes the region; ending the same
///   region twice is a no-op.
///
/// # Failure
///
/// These are host intrinsics. An implementation that cannot honor a call has
/// no meaningful way to hand the problem back to the engine, which by design
/// has no fallback when its host is gone; implementations must trap (panic or
/// abort) instead of failing silently.
pub trait DurableHost: Send + Sync {
    /// Returns the log position corresponding to "now".
    fn current_log_index(&self) -> LogPosition;

    /// Moves execution back to `position`, discarding everything recorded
    /// after it.
    fn rewind_to(&self, position: LogPosition);

    /// Opens an atomic region and returns the position that closes it.
    fn mark_atomic_begin(&self) -> LogPosition;

    /// Closes the atomic region opened at `begin`.
    fn mark_atomic_end(&self, begin: LogPosition);

    /// Blocks until the log has been persisted to at least `replicas`
    /// replicas, or to every replica if fewer exist.
    fn commit_log(&self, replicas: u8);

    /// Returns the retry policy currently associated with the worker.
    fn retry_policy(&self) -> RetryPolicy;

    /// Replaces the worker's retry policy.
    fn set_retry_policy(&self, policy: RetryPolicy);

    /// Returns the worker's current persistence level.
    fn persistence_level(&self) -> PersistenceLevel;

    /// Sets the worker's persistence level.
    fn set_persistence_level(&self, level: PersistenceLevel);

    /// Returns the current idempotence mode. `true` means side effects are
    /// treated as idempotent and replayed with at-least-once semantics;
    /// `false` means at-most-once, failing the worker when it cannot know
    /// whether a side effect already ran.
    fn idempotence_mode(&self) -> bool;

    /// Sets the idempotence mode.
    fn set_idempotence_mode(&self, idempotent: bool);

    /// Generates an idempotency key that is persisted and committed before it
    /// is returned, so it survives replay and can be handed to third-party
    /// systems.
    fn generate_idempotency_key(&self) -> Uuid;
}

impl<H: DurableHost + ?Sized> DurableHost for &H {
    fn current_log_index(&self) -> LogPosition {
        (**self).current_log_index()
    }

    fn rewind_to(&self, position: LogPosition) {
        (**self).rewind_to(position)
    }

    fn mark_atomic_begin(&self) -> LogPosition {
        (**self).mark_atomic_begin()
    }

    fn mark_atomic_end(&self, begin: LogPosition) {
        (**self).mark_atomic_end(begin)
    }

    fn commit_log(&self, replicas: u8) {
        (**self).commit_log(replicas)
    }

    fn retry_policy(&self) -> RetryPolicy {
        (**self).retry_policy()
    }

    fn set_retry_policy(&self, policy: RetryPolicy) {
        (**self).set_retry_policy(policy)
    }

    fn persistence_level(&self) -> PersistenceLevel {
        (**self).persistence_level()
    }

    fn set_persistence_level(&self, level: PersistenceLevel) {
        (**self).set_persistence_level(level)
    }

    fn idempotence_mode(&self) -> bool {
        (**self).idempotence_mode()
    }

    fn set_idempotence_mode(&self, idempotent: bool) {
        (**self).set_idempotence_mode(idempotent)
    }

    fn generate_idempotency_key(&self) -> Uuid {
        (**self).generate_idempotency_key()
    }
}
