//! Transaction outcome classification.

use thiserror::Error;

/// Why a fallible transaction failed, and how far rollback got.
///
/// Every compensation attempt is accounted for: either all recorded
/// compensations ran ([`FullyRolledBack`](TransactionFailure::FullyRolledBack))
/// or unwinding stopped at the first compensation that itself failed
/// ([`PartiallyRolledBack`](TransactionFailure::PartiallyRolledBack)), leaving
/// the older entries unexecuted.
///
/// Defects (a failing compensation in an infallible transaction, an
/// unavailable host) are not variants here: they panic, so they cannot be
/// caught and mistaken for a retryable condition.
#[derive(Debug, Error, PartialEq)]
pub enum TransactionFailure<Err> {
    /// The transaction body failed and every recorded compensation ran
    /// successfully.
    #[error("transaction failed and was rolled back completely: {error}")]
    FullyRolledBack { error: Err },

    /// The transaction body failed and unwinding stopped at a compensation
    /// that also failed.
    #[error(
        "transaction failed and was rolled back partially: {error} (compensation failed: {compensation_error})"
    )]
    PartiallyRolledBack {
        error: Err,
        compensation_error: Err,
    },
}

impl<Err> TransactionFailure<Err> {
    /// The error the transaction body failed with.
    pub fn error(&self) -> &Err {
        match self {
            TransactionFailure::FullyRolledBack { error } => error,
            TransactionFailure::PartiallyRolledBack { error, .. } => error,
        }
    }

    /// The error of the compensation that halted unwinding, if any.
    pub fn compensation_error(&self) -> Option<&Err> {
        match self {
            TransactionFailure::FullyRolledBack { .. } => None,
            TransactionFailure::PartiallyRolledBack {
                compensation_error, ..
            } => Some(compensation_error),
        }
    }

    pub fn is_fully_rolled_back(&self) -> bool {
        matches!(self, TransactionFailure::FullyRolledBack { .. })
    }
}

/// Result of running a fallible transaction.
pub type TransactionResult<Out, Err> = Result<Out, TransactionFailure<Err>>;
