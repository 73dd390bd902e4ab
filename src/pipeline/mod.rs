//! Job execution pipeline.
//!
//! - `RateLimiter` / `RetryPolicy`: pacing and backoff around each render
//! - `JobRegistry`: in-memory job bookkeeping
//! - `JobExecutor`: worker pool that runs submitted jobs

mod executor;
mod rate_limit;
mod registry;
mod retry;

pub use executor::{JobExecutor, RejectedUrl, SubmitReceipt};
pub use rate_limit::RateLimiter;
pub use registry::JobRegistry;
pub use retry::RetryPolicy;
