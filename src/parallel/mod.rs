//! Parallel execution of jobs on a caller-owned worker pool
//!
//! # Module Structure
//!
//! - `types`: Pool configuration and the messages passed to and from workers
//! - `worker`: Worker thread loop, with panic isolation per job
//! - `sink`: Collects outcomes back into submission order
//! - `executor`: The `JobExecutor` scoped pool and `merge_all`

mod executor;
mod sink;
mod types;
mod worker;

pub use executor::{merge_all, JobExecutor};
pub use types::{JobOutcome, PoolConfig};
pub(crate) use worker::panic_message;
