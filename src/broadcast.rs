//! End-of-input signalling from a producer to all of its downstream queues.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

use crate::pipeline::JobListener;
use crate::queue::RecordQueue;
use crate::report::Report;

/// Pushes exactly one poison into each listed queue, once per producer lifetime.
///
/// Register it as a [`JobListener`] on the producing job; its `after_job` hook
/// fires after the final dispatch, or after a fatal error, so consumers never
/// wait on a producer that has stopped.
pub struct PoisonBroadcaster<P> {
    queues: Vec<RecordQueue<P>>,
    fired: AtomicBool,
}

impl<P> PoisonBroadcaster<P> {
    pub fn new(queues: Vec<RecordQueue<P>>) -> Self {
        Self {
            queues,
            fired: AtomicBool::new(false),
        }
    }

    /// Broadcast poison to every queue in order. Returns `false` and does
    /// nothing if this broadcaster already fired.
    pub fn on_source_exhausted(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            warn!(
                queues = self.queues.len(),
                "duplicate poison broadcast suppressed"
            );
            return false;
        }
        for queue in &self.queues {
            queue.push_poison();
            debug!(queue = queue.name(), "poison record sent");
        }
        true
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

impl<P: Send> JobListener for PoisonBroadcaster<P> {
    fn after_job(&mut self, _report: &Report) {
        self.on_source_exhausted();
    }
}
