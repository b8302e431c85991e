//! Infallible transactions: failure rolls back, rewinds the durable log, and
//! re-runs the whole body until it succeeds.

use futures::future::BoxFuture;

use crate::compensation::{CompensationStack, InfallibleCompensation};
use crate::guard::AtomicRegion;
use crate::operation::Operation;
use crate::port::durability::{DurableHost, LogPosition};

/// Signal that the transaction body must restart from the beginning.
///
/// Yielded by [`InfallibleTransaction::execute`] when an operation fails.
/// Control never continues past the failing call: the body forwards the
/// signal with `?` and the engine re-invokes the body from scratch. The field
/// is private, so a body can neither fabricate the signal nor intercept it;
/// forwarding is the only thing `?` can do with it.
#[derive(Debug)]
pub struct Restart {
    _private: (),
}

/// Handle passed to the body of an infallible transaction.
///
/// Unlike a fallible transaction there is no shared error type: operation
/// errors never reach the body, they are absorbed into the restart loop.
pub struct InfallibleTransaction {
    compensations: CompensationStack<InfallibleCompensation>,
    begin_index: LogPosition,
}

impl InfallibleTransaction {
    fn new(begin_index: LogPosition) -> Self {
        Self {
            compensations: CompensationStack::new(),
            begin_index,
        }
    }

    /// The log position captured when the transaction started. Every retry
    /// rewinds to exactly this position.
    pub fn begin_index(&self) -> LogPosition {
        self.begin_index
    }

    /// Runs `op`; on success records its compensation, on failure signals a
    /// restart.
    ///
    /// Compensations recorded here must not fail: the retry strategy assumes
    /// rollback always succeeds, so a compensation error in this mode is a
    /// contract violation by the operation author and panics instead of
    /// becoming a value the loop could mistake for a retryable condition.
    pub async fn execute<Op>(&mut self, op: &Op, input: Op::In) -> Result<Op::Out, Restart>
    where
        Op: Operation,
    {
        match op.execute(input.clone()).await {
            Ok(output) => {
                let op = op.clone();
                let recorded = output.clone();
                self.compensations.push(Box::new(move || {
                    Box::pin(async move {
                        if let Err(error) = op.compensate(input, recorded).await {
                            panic!(
                                "compensation failed in an infallible transaction: {error}"
                            );
                        }
                    })
                }));
                Ok(output)
            }
            Err(error) => {
                tracing::warn!(
                    %error,
                    recorded = self.compensations.len(),
                    "operation failed, transaction will roll back and restart"
                );
                Err(Restart { _private: () })
            }
        }
    }

    async fn rollback(mut self) {
        while let Some(compensation) = self.compensations.pop() {
            compensation().await;
        }
    }
}

/// Runs `body` as an infallible transaction against `host`, returning its
/// value once an attempt completes.
///
/// The log position is captured once at the start. Whenever an operation
/// fails, the engine unwinds all recorded compensations in reverse order,
/// rewinds the host log to that starting position (so the host discards the
/// attempt, exactly matching the local rollback), and re-invokes `body` from
/// scratch with a fresh compensation stack, the same re-execution the host
/// itself performs when it replays the log after a crash. The loop is
/// unbounded: how often and how fast attempts happen is governed by the
/// host's retry policy, not by the engine.
///
/// Because `body` runs once per attempt, it must clone shared operations and
/// inputs into each attempt's future rather than move them:
///
/// ```ignore
/// let account_id = infallible_transaction(&host, |tx| {
///     let create = create_account.clone();
///     Box::pin(async move {
///         let id = tx.execute(&create, ("foo".into(), "foo@example.com".into())).await?;
///         Ok(id)
///     })
/// })
/// .await;
/// ```
pub async fn infallible_transaction<H, Out, F>(host: &H, mut body: F) -> Out
where
    H: DurableHost + ?Sized,
    F: for<'a> FnMut(&'a mut InfallibleTransaction) -> BoxFuture<'a, Result<Out, Restart>>,
{
    let _region = AtomicRegion::enter(host);
    let begin_index = host.current_log_index();
    let mut attempt: u64 = 1;
    loop {
        let mut tx = InfallibleTransaction::new(begin_index);
        let outcome = body(&mut tx).await;
        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "transaction succeeded after restart");
                }
                return value;
            }
            Err(Restart { .. }) => {
                tx.rollback().await;
                host.rewind_to(begin_index);
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::operation;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(&'static str);

    #[tokio::test]
    async fn test_execute_success_records_compensation() {
        let mut tx = InfallibleTransaction::new(LogPosition(3));
        let op = operation(|n: u32| Ok::<_, TestError>(n), |_, _| Ok(()));

        assert_eq!(tx.execute(&op, 5).await.unwrap(), 5);
        assert_eq!(tx.compensations.len(), 1);
        assert_eq!(tx.begin_index(), LogPosition(3));
    }

    #[tokio::test]
    async fn test_execute_failure_signals_restart() {
        let mut tx = InfallibleTransaction::new(LogPosition::ORIGIN);
        let op = operation(
            |_: u32| Err::<u32, _>(TestError("transient")),
            |_, _| Ok(()),
        );

        assert!(tx.execute(&op, 5).await.is_err());
        assert_eq!(tx.compensations.len(), 0);
    }

    #[tokio::test]
    #[should_panic(expected = "compensation failed in an infallible transaction")]
    async fn test_failing_compensation_is_a_defect() {
        let mut tx = InfallibleTransaction::new(LogPosition::ORIGIN);
        let op = operation(
            |n: u32| Ok::<_, TestError>(n),
            |_, _| Err(TestError("undo broke")),
        );

        tx.execute(&op, 5).await.unwrap();
        tx.rollback().await;
    }

    #[tokio::test]
    async fn test_rollback_runs_compensations_in_reverse() {
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let mut tx = InfallibleTransaction::new(LogPosition::ORIGIN);
        for name in ["first", "second", "third"] {
            let order_in_comp = Arc::clone(&order);
            let op = operation(
                move |n: u32| Ok::<_, TestError>(n),
                move |_, _| {
                    order_in_comp.lock().unwrap().push(name);
                    Ok(())
                },
            );
            tx.execute(&op, 0).await.unwrap();
        }

        tx.rollback().await;
        assert_eq!(
            order.lock().unwrap().as_slice(),
            &["third", "second", "first"]
        );
    }
}
