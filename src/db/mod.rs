//! Connection pooling, transaction execution, error classification and retry

pub mod error_code;
pub mod executor;
pub mod pool;
pub mod retry;

pub use error_code::ErrorClass;
pub use executor::execute_plan;
pub use pool::{PoolRegistry, PoolSettings};
pub use retry::{RetryOutcome, RetrySettings, Sleeper, TokioSleeper, run_with_retry};
