//! Worker thread for running jobs

use crossbeam_channel::Receiver;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

use super::types::{CompletedJob, WorkItem};
use crate::error::ExecutionError;

/// Runs jobs until the work channel closes. A panicking job becomes an
/// `ExecutionError::Panicked` outcome and the thread keeps serving.
pub(crate) fn worker_thread(worker_id: usize, work_receiver: Receiver<WorkItem>) {
    while let Ok(item) = work_receiver.recv() {
        let WorkItem {
            index,
            execution,
            result_sender,
        } = item;
        let job_name = execution.name().to_string();
        debug!(worker = worker_id, job = %job_name, index, "job picked up");

        let outcome = panic::catch_unwind(AssertUnwindSafe(move || execution.call())).map_err(
            |payload| {
                let message = panic_message(payload.as_ref());
                error!(worker = worker_id, job = %job_name, %message, "job panicked");
                ExecutionError::Panicked {
                    job: job_name,
                    message,
                }
            },
        );

        // The caller may have stopped listening; nothing to do then
        let _ = result_sender.send(CompletedJob { index, outcome });
    }
    debug!(worker = worker_id, "work channel closed, worker exiting");
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
