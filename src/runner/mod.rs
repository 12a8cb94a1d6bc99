//! Job execution: the spool store, the worker executor, the per-job action
//! task, and the request processor that ties them to the wire.

pub mod executor;
pub mod processor;
pub mod spool;
pub mod task;

pub use executor::JobExecutor;
pub use processor::RequestProcessor;
pub use spool::{JobState, JobStatus, SpoolStore};
