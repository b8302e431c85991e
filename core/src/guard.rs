//! Scoped guards over a [`DurableHost`].
//!
//! Every guard pairs a host call with its inverse and performs the inverse on
//! drop, so the pairing holds on every exit path, including early returns and
//! the retry path of an infallible transaction.

use crate::port::durability::{DurableHost, LogPosition, PersistenceLevel, RetryPolicy};

/// An open atomic region on the host.
///
/// The region is entered on construction and closed on drop. While the region
/// is open, a host-level failure or restart replays the whole region as one
/// unit instead of resuming somewhere inside it.
#[must_use = "the atomic region closes as soon as the guard is dropped"]
pub struct AtomicRegion<'a, H: DurableHost + ?Sized> {
    host: &'a H,
    begin: LogPosition,
}

impl<'a, H: DurableHost + ?Sized> AtomicRegion<'a, H> {
    /// Opens an atomic region on `host`.
    pub fn enter(host: &'a H) -> Self {
        let begin = host.mark_atomic_begin();
        Self { host, begin }
    }

    /// The position that closes this region.
    pub fn begin(&self) -> LogPosition {
        self.begin
    }
}

impl<H: DurableHost + ?Sized> Drop for AtomicRegion<'_, H> {
    fn drop(&mut self) {
        self.host.mark_atomic_end(self.begin);
    }
}

/// Scoped override of the worker's retry policy.
///
/// Installs `policy` on construction and restores the previous policy on
/// drop.
#[must_use = "the previous retry policy is restored as soon as the guard is dropped"]
pub struct RetryPolicyOverride<'a, H: DurableHost + ?Sized> {
    host: &'a H,
    previous: RetryPolicy,
}

impl<'a, H: DurableHost + ?Sized> RetryPolicyOverride<'a, H> {
    pub fn install(host: &'a H, policy: RetryPolicy) -> Self {
        let previous = host.retry_policy();
        host.set_retry_policy(policy);
        Self { host, previous }
    }

    /// The policy that will be restored on drop.
    pub fn previous(&self) -> RetryPolicy {
        self.previous
    }
}

impl<H: DurableHost + ?Sized> Drop for RetryPolicyOverride<'_, H> {
    fn drop(&mut self) {
        self.host.set_retry_policy(self.previous);
    }
}

/// Scoped override of the worker's persistence level.
#[must_use = "the previous persistence level is restored as soon as the guard is dropped"]
pub struct PersistenceLevelOverride<'a, H: DurableHost + ?Sized> {
    host: &'a H,
    previous: PersistenceLevel,
}

impl<'a, H: DurableHost + ?Sized> PersistenceLevelOverride<'a, H> {
    pub fn install(host: &'a H, level: PersistenceLevel) -> Self {
        let previous = host.persistence_level();
        host.set_persistence_level(level);
        Self { host, previous }
    }

    pub fn previous(&self) -> PersistenceLevel {
        self.previous
    }
}

impl<H: DurableHost + ?Sized> Drop for PersistenceLevelOverride<'_, H> {
    fn drop(&mut self) {
        self.host.set_persistence_level(self.previous);
    }
}

/// Scoped override of the worker's idempotence mode.
#[must_use = "the previous idempotence mode is restored as soon as the guard is dropped"]
pub struct IdempotenceModeOverride<'a, H: DurableHost + ?Sized> {
    host: &'a H,
    previous: bool,
}

impl<'a, H: DurableHost + ?Sized> IdempotenceModeOverride<'a, H> {
    pub fn install(host: &'a H, idempotent: bool) -> Self {
        let previous = host.idempotence_mode();
        host.set_idempotence_mode(idempotent);
        Self { host, previous }
    }

    pub fn previous(&self) -> bool {
        self.previous
    }
}

impl<H: DurableHost + ?Sized> Drop for IdempotenceModeOverride<'_, H> {
    fn drop(&mut self) {
        self.host.set_idempotence_mode(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct StubHost {
        index: AtomicU64,
        marks: Mutex<Vec<(&'static str, LogPosition)>>,
        retry_policy: Mutex<RetryPolicy>,
        persistence_level: Mutex<PersistenceLevel>,
        idempotent: AtomicBool,
    }

    impl DurableHost for StubHost {
        fn current_log_index(&self) -> LogPosition {
            LogPosition(self.index.fetch_add(1, Ordering::SeqCst) + 1)
        }

        fn rewind_to(&self, position: LogPosition) {
            self.index.store(position.0, Ordering::SeqCst);
        }

        fn mark_atomic_begin(&self) -> LogPosition {
            let begin = self.current_log_index();
            self.marks.lock().unwrap().push(("begin", begin));
            begin
        }

        fn mark_atomic_end(&self, begin: LogPosition) {
            self.marks.lock().unwrap().push(("end", begin));
        }

        fn commit_log(&self, _replicas: u8) {}

        fn retry_policy(&self) -> RetryPolicy {
            *self.retry_policy.lock().unwrap()
        }

        fn set_retry_policy(&self, policy: RetryPolicy) {
            *self.retry_policy.lock().unwrap() = policy;
        }

        fn persistence_level(&self) -> PersistenceLevel {
            *self.persistence_level.lock().unwrap()
        }

        fn set_persistence_level(&self, level: PersistenceLevel) {
            *self.persistence_level.lock().unwrap() = level;
        }

        fn idempotence_mode(&self) -> bool {
            self.idempotent.load(Ordering::SeqCst)
        }

        fn set_idempotence_mode(&self, idempotent: bool) {
            self.idempotent.store(idempotent, Ordering::SeqCst);
        }

        fn generate_idempotency_key(&self) -> Uuid {
            Uuid::new_v4()
        }
    }

    #[test]
    fn test_atomic_region_closes_with_its_begin_position() {
        let host = StubHost::default();
        let begin = {
            let region = AtomicRegion::enter(&host);
            region.begin()
        };

        let marks = host.marks.lock().unwrap();
        assert_eq!(marks.as_slice(), &[("begin", begin), ("end", begin)]);
    }

    #[test]
    fn test_atomic_region_closes_on_early_exit() {
        let host = StubHost::default();
        let run = || -> Result<(), ()> {
            let _region = AtomicRegion::enter(&host);
            Err(())
        };
        run().unwrap_err();

        let marks = host.marks.lock().unwrap();
        assert_eq!(marks.len(), 2);
        assert_eq!(marks[1].0, "end");
    }

    #[test]
    fn test_retry_policy_override_restores_previous() {
        let host = StubHost::default();
        let original = host.retry_policy();

        {
            let aggressive = RetryPolicy {
                max_attempts: 100,
                ..RetryPolicy::default()
            };
            let guard = RetryPolicyOverride::install(&host, aggressive);
            assert_eq!(guard.previous(), original);
            assert_eq!(host.retry_policy().max_attempts, 100);
        }

        assert_eq!(host.retry_policy(), original);
    }

    #[test]
    fn test_persistence_level_override_restores_previous() {
        let host = StubHost::default();

        {
            let _guard =
                PersistenceLevelOverride::install(&host, PersistenceLevel::PersistNothing);
            assert_eq!(host.persistence_level(), PersistenceLevel::PersistNothing);
        }

        assert_eq!(host.persistence_level(), PersistenceLevel::Smart);
    }

    #[test]
    fn test_idempotence_mode_override_restores_previous() {
        let host = StubHost::default();
        host.set_idempotence_mode(true);

        {
            let _guard = IdempotenceModeOverride::install(&host, false);
            assert!(!host.idempotence_mode());
        }

        assert!(host.idempotence_mode());
    }
}
