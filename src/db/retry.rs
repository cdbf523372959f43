//! Whole-operation retry
//!
//! The wrapper replays the entire reconciliation closure (re-read, re-plan,
//! re-execute), never individual statements: after a transient failure the
//! in-flight transaction is already rolled back and the catalog may have
//! moved, so the only safe retry unit is the whole operation.

use std::future::Future;
use std::time::Duration;

use tracing::info;

use crate::constants::{MAX_ATTEMPTS, RETRY_DELAY};
use crate::error::{ReconcileError, Result};

/// Attempt bound and flat delay for the whole-operation retry loop.
#[derive(Debug, Clone)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: RETRY_DELAY,
        }
    }
}

/// Injected sleep so tests can run the loop without waiting.
pub trait Sleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}

/// What the bounded loop ended with.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    Exhausted(ReconcileError),
}

impl<T> RetryOutcome<T> {
    /// Exhaustion surfaces as a fatal error: the transient budget is spent.
    pub fn into_result(self) -> Result<T> {
        match self {
            RetryOutcome::Success(value) => Ok(value),
            RetryOutcome::Exhausted(err) => Err(err.into_fatal()),
        }
    }
}

/// Run `op` up to `max_attempts` times, sleeping `delay` between transient
/// failures. Non-transient errors propagate immediately through the outer
/// `Result`; running out of attempts yields `RetryOutcome::Exhausted`.
pub async fn run_with_retry<T, F, Fut, S>(
    sleeper: &S,
    max_attempts: u32,
    delay: Duration,
    mut op: F,
) -> Result<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    S: Sleeper,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("operation succeeded on attempt {attempt}");
                }
                return Ok(RetryOutcome::Success(value));
            }
            Err(err) if err.is_transient() => {
                info!("transient failure on attempt {attempt}/{max_attempts}: {err}");
                last_error = Some(err);
                if attempt < max_attempts {
                    sleeper.sleep(delay).await;
                }
            }
            Err(err) => return Err(err),
        }
    }

    // last_error is always set here: the loop only falls through after at
    // least one transient failure.
    Ok(RetryOutcome::Exhausted(last_error.unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct RecordingSleeper {
        slept: RefCell<Vec<Duration>>,
    }

    impl RecordingSleeper {
        fn new() -> Self {
            Self {
                slept: RefCell::new(Vec::new()),
            }
        }
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
            self.slept.borrow_mut().push(duration);
            std::future::ready(())
        }
    }

    fn transient() -> ReconcileError {
        ReconcileError::Transient {
            code: "40001".to_string(),
            source: sqlx::Error::Io(std::io::Error::other("serialization failure")),
        }
    }

    fn fatal() -> ReconcileError {
        ReconcileError::Fatal {
            code: Some("42601".to_string()),
            source: sqlx::Error::Io(std::io::Error::other("syntax error")),
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        init_tracing();
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);
        let outcome = run_with_retry(&sleeper, 3, Duration::from_millis(10), || {
            calls.set(calls.get() + 1);
            async { Ok(42) }
        })
        .await
        .unwrap();
        assert_eq!(outcome.into_result().unwrap(), 42);
        assert_eq!(calls.get(), 1);
        assert!(sleeper.slept.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);
        let outcome = run_with_retry(&sleeper, 3, Duration::from_millis(10), || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt < 3 {
                    Err(transient())
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(outcome.into_result().unwrap(), "done");
        assert_eq!(calls.get(), 3);
        assert_eq!(sleeper.slept.borrow().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_becomes_fatal() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);
        let outcome = run_with_retry(&sleeper, 3, Duration::from_millis(10), || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(transient()) }
        })
        .await
        .unwrap();
        assert_eq!(calls.get(), 3);
        // no sleep after the final attempt
        assert_eq!(sleeper.slept.borrow().len(), 2);
        let err = outcome.into_result().unwrap_err();
        assert!(matches!(err, ReconcileError::Fatal { .. }));
    }

    #[tokio::test]
    async fn test_fatal_propagates_immediately() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);
        let result = run_with_retry(&sleeper, 3, Duration::from_millis(10), || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(fatal()) }
        })
        .await;
        assert_eq!(calls.get(), 1);
        assert!(sleeper.slept.borrow().is_empty());
        assert!(matches!(result, Err(ReconcileError::Fatal { .. })));
    }

    #[tokio::test]
    async fn test_validation_errors_are_not_retried() {
        let sleeper = RecordingSleeper::new();
        let calls = Cell::new(0u32);
        let result = run_with_retry(&sleeper, 5, Duration::from_millis(10), || {
            calls.set(calls.get() + 1);
            async { Err::<(), _>(ReconcileError::validation("bad privilege")) }
        })
        .await;
        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(ReconcileError::Validation(_))));
    }
}
