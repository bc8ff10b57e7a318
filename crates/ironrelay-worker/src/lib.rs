//! Background job processing for IronRelay.
//!
//! This crate provides:
//! - A registry mapping job names to handlers, and the `task!` macro
//! - A job queue for enqueuing (immediately or after commit) and admin actions
//! - A fixed-delay retry policy
//! - A worker runner that claims and executes one job at a time, and a pool
//!   of runners
//! - Built-in jobs for outbound webhook delivery and inbound webhook handling

pub mod jobs;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod runner;

pub use queue::{JobQueue, JobRequest};
pub use registry::{JobExecutionError, JobHandler, JobRegistry, Task};
pub use retry::{RetryDecision, RetryPolicy};
pub use runner::{WorkerPool, WorkerRunner};
