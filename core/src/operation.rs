//! Reversible units of work.
//!
//! An [`Operation`] pairs an effectful `execute` with a `compensate` that
//! semantically undoes it. Operations are stateless and cheaply cloneable, so
//! one operation value can be shared read-only across many invocations.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

/// A reversible unit of work.
///
/// `compensate` must be defined for every output `execute` can successfully
/// produce: whenever an operation succeeds inside a transaction and a later
/// step of the same transaction fails, the engine calls `compensate` with the
/// original input and the produced output (delete what was created, restore
/// what was overwritten).
///
/// No ordering is implied between unrelated operations beyond the order in
/// which the transaction body invokes them.
#[async_trait]
pub trait Operation: Clone + Send + Sync + 'static {
    type In: Clone + Send + Sync + 'static;
    type Out: Clone + Send + Sync + 'static;
    type Err: std::error::Error + Send + Sync + 'static;

    /// Performs the effectful action.
    async fn execute(&self, input: Self::In) -> Result<Self::Out, Self::Err>;

    /// Undoes a previously successful `execute`, given its input and output.
    async fn compensate(&self, input: Self::In, output: Self::Out) -> Result<(), Self::Err>;
}

/// An [`Operation`] built from two plain closures.
///
/// Constructed with [`operation`]. The closures live behind an `Arc`, so
/// cloning is cheap and every clone runs the same pair of functions.
pub struct FnOperation<In, Out, Err, Exec, Comp> {
    inner: Arc<Inner<Exec, Comp>>,
    _marker: PhantomData<fn(In) -> (Out, Err)>,
}

struct Inner<Exec, Comp> {
    execute: Exec,
    compensate: Comp,
}

impl<In, Out, Err, Exec, Comp> Clone for FnOperation<In, Out, Err, Exec, Comp> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _marker: PhantomData,
        }
    }
}

/// Builds an [`Operation`] from an execute closure and a compensate closure.
///
/// # Example
///
/// ```ignore
/// let create_account = operation(
///     |(username, email): (String, String)| service.create(&username, &email),
///     |_, account_id| service.delete(account_id),
/// );
/// ```
pub fn operation<In, Out, Err, Exec, Comp>(
    execute: Exec,
    compensate: Comp,
) -> FnOperation<In, Out, Err, Exec, Comp>
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
    Err: std::error::Error + Send + Sync + 'static,
    Exec: Fn(In) -> Result<Out, Err> + Send + Sync + 'static,
    Comp: Fn(In, Out) -> Result<(), Err> + Send + Sync + 'static,
{
    FnOperation {
        inner: Arc::new(Inner {
            execute,
            compensate,
        }),
        _marker: PhantomData,
    }
}

#[async_trait]
impl<In, Out, Err, Exec, Comp> Operation for FnOperation<In, Out, Err, Exec, Comp>
where
    In: Clone + Send + Sync + 'static,
    Out: Clone + Send + Sync + 'static,
    Err: std::error::Error + Send + Sync + 'static,
    Exec: Fn(In) -> Result<Out, Err> + Send + Sync + 'static,
    Comp: Fn(In, Out) -> Result<(), Err> + Send + Sync + 'static,
{
    type In = In;
    type Out = Out;
    type Err = Err;

    async fn execute(&self, input: In) -> Result<Out, Err> {
        (self.inner.execute)(input)
    }

    async fn compensate(&self, input: In, output: Out) -> Result<(), Err> {
        (self.inner.compensate)(input, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq, thiserror::Error)]
    #[error("{0}")]
    struct TestError(String);

    #[tokio::test]
    async fn test_operation_runs_both_closures() {
        let undone: Arc<Mutex<Vec<(i32, i32)>>> = Arc::new(Mutex::new(Vec::new()));
        let undone_in_comp = Arc::clone(&undone);

        let double = operation(
            |input: i32| Ok::<_, TestError>(input * 2),
            move |input, output| {
                undone_in_comp.lock().unwrap().push((input, output));
                Ok(())
            },
        );

        assert_eq!(double.execute(21).await.unwrap(), 42);
        double.compensate(21, 42).await.unwrap();
        assert_eq!(undone.lock().unwrap().as_slice(), &[(21, 42)]);
    }

    #[tokio::test]
    async fn test_clones_share_the_same_functions() {
        let calls = Arc::new(Mutex::new(0u32));
        let calls_in_exec = Arc::clone(&calls);

        let op = operation(
            move |input: u32| {
                *calls_in_exec.lock().unwrap() += 1;
                Ok::<_, TestError>(input)
            },
            |_, _| Ok(()),
        );

        let clone = op.clone();
        op.execute(1).await.unwrap();
        clone.execute(2).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_execute_failure_is_returned() {
        let op = operation(
            |_: ()| Err::<(), _>(TestError("downstream unavailable".into())),
            |_, _| Ok(()),
        );

        let err = op.execute(()).await.unwrap_err();
        assert_eq!(err, TestError("downstream unavailable".into()));
    }
}
