//! Fallible transactions: failure is classified and reported to the caller.

use futures::future::BoxFuture;

use crate::compensation::{CompensationStack, FallibleCompensation};
use crate::error::{TransactionFailure, TransactionResult};
use crate::guard::AtomicRegion;
use crate::operation::Operation;
use crate::port::durability::DurableHost;

/// Handle passed to the body of a fallible transaction.
///
/// All operations of one transaction share a single error type `Err`; the
/// classified outcome crossing the transaction boundary is
/// [`TransactionFailure<Err>`].
pub struct FallibleTransaction<Err> {
    compensations: CompensationStack<FallibleCompensation<Err>>,
}

impl<Err> FallibleTransaction<Err>
where
    Err: std::error::Error + Send + Sync + 'static,
{
    fn new() -> Self {
        Self {
            compensations: CompensationStack::new(),
        }
    }

    /// Runs `op` and, on success, records its compensation.
    ///
    /// A failure is handed back to the body as-is: nothing unwinds here. The
    /// body decides whether to propagate it (usually with `?`), and unwinding
    /// happens only at the transaction boundary once the body as a whole
    /// returns an error. Operations that were never attempted are never
    /// compensated.
    pub async fn execute<Op>(&mut self, op: &Op, input: Op::In) -> Result<Op::Out, Op::Err>
    where
        Op: Operation<Err = Err>,
    {
        match op.execute(input.clone()).await {
            Ok(output) => {
                let op = op.clone();
                let recorded = output.clone();
                self.compensations.push(Box::new(move || {
                    Box::pin(async move { op.compensate(input, recorded).await })
                }));
                tracing::debug!(
                    recorded = self.compensations.len(),
                    "operation succeeded, compensation recorded"
                );
                Ok(output)
            }
            Err(error) => {
                tracing::debug!(%error, "operation failed");
                Err(error)
            }
        }
    }

    /// Unwinds the stack newest-to-oldest and classifies the outcome. The
    /// first failing compensation halts the walk; older entries stay
    /// unexecuted.
    async fn rollback(mut self, error: Err) -> TransactionFailure<Err> {
        while let Some(compensation) = self.compensations.pop() {
            if let Err(compensation_error) = compensation().await {
                tracing::warn!(
                    %compensation_error,
                    remaining = self.compensations.len(),
                    "compensation failed, halting rollback"
                );
                return TransactionFailure::PartiallyRolledBack {
                    error,
                    compensation_error,
                };
            }
        }
        TransactionFailure::FullyRolledBack { error }
    }
}

/// Runs `body` as a fallible transaction against `host`.
///
/// The whole body executes inside one host atomic region, so a host-level
/// crash mid-transaction replays the transaction as a unit. If the body
/// returns an error, every compensation recorded so far runs in reverse
/// order and the classified [`TransactionFailure`] is returned; if the body
/// succeeds, its value is returned unchanged and the recorded compensations
/// are discarded.
///
/// # Example
///
/// ```ignore
/// let transferred = fallible_transaction(&host, |tx| {
///     Box::pin(async move {
///         let withdrawal = tx.execute(&withdraw, (from, amount)).await?;
///         tx.execute(&deposit, (to, amount)).await?;
///         Ok(withdrawal)
///     })
/// })
/// .await?;
/// ```
pub async fn fallible_transaction<H, Out, Err, F>(host: &H, body: F) -> TransactionResult<Out, Err>
where
    H: DurableHost + ?Sized,
    Err: std::error::Error + Send + Sync + 'static,
    F: for<'a> FnOnce(&'a mut FallibleTransaction<Err>) -> BoxFuture<'a, Result<Out, Err>>,
{
    let _region = AtomicRegion::enter(host);
    let mut tx = FallibleTransaction::new();
    let outcome = body(&mut tx).await;
    match outcome {
        Ok(value) => Ok(value),
        Err(error) => {
            tracing::warn!(
                %error,
                recorded = tx.compensations.len(),
                "transaction failed, rolling back"
            );
            Err(tx.rollback(error).await)
        }
    }
}
