//! Outcome collection for parallel execution
//!
//! Workers finish in any order; outcomes are slotted back by submission index.

use crossbeam_channel::Receiver;
use tracing::warn;

use super::types::{CompletedJob, JobOutcome};
use crate::error::ExecutionError;

/// Receive until every slot is filled or every sender is gone. A slot still
/// empty after that belongs to a job whose result never came back.
pub(crate) fn collect_ordered(
    result_receiver: Receiver<CompletedJob>,
    job_names: Vec<String>,
) -> Vec<JobOutcome> {
    let mut slots: Vec<Option<JobOutcome>> = job_names.iter().map(|_| None).collect();
    let mut remaining = slots.len();

    while remaining > 0 {
        let Ok(completed) = result_receiver.recv() else {
            break;
        };
        match slots.get_mut(completed.index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(completed.outcome);
                remaining -= 1;
            }
            _ => warn!(index = completed.index, "unexpected job outcome ignored"),
        }
    }

    slots
        .into_iter()
        .zip(job_names)
        .map(|(slot, name)| slot.unwrap_or(Err(ExecutionError::Lost(name))))
        .collect()
}
