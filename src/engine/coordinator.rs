use std::sync::{Mutex, PoisonError};

use tracing::{debug, info};

use super::run::{ScanRun, ScanTrigger};

/// Outcome of a scan request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No scan was running; the caller should start one now.
    Start,
    /// Held in the pending slot until the running scan completes.
    Queued,
    /// A higher-priority request already holds the pending slot.
    Dropped,
}

#[derive(Debug, Default)]
struct State {
    running: bool,
    pending: Option<ScanTrigger>,
}

/// Serializes scans: one running at a time, at most one waiting.
#[derive(Debug, Default)]
pub struct ScanCoordinator {
    state: Mutex<State>,
}

impl ScanCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).running
    }

    pub fn pending(&self) -> Option<ScanTrigger> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).pending
    }

    pub fn request(&self, trigger: ScanTrigger) -> Admission {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if !state.running {
            state.running = true;
            debug!(trigger = %trigger, "Scan admitted");
            return Admission::Start;
        }

        let replace = state
            .pending
            .is_none_or(|pending| trigger.priority() >= pending.priority());
        if replace {
            debug!(trigger = %trigger, replaced = ?state.pending, "Scan queued");
            state.pending = Some(trigger);
            Admission::Queued
        } else {
            debug!(trigger = %trigger, pending = ?state.pending, "Scan request dropped");
            Admission::Dropped
        }
    }

    /// Marks the running scan finished. Returns the pending trigger, which
    /// is now considered running, or clears the running flag.
    pub fn complete(&self) -> Option<ScanTrigger> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next = state.pending.take();
        state.running = next.is_some();
        next
    }

    /// Runs `trigger` if admitted, then drains the pending slot. Requests
    /// made from inside `scan` are honored before this returns.
    pub fn run<F>(&self, trigger: ScanTrigger, mut scan: F) -> Vec<ScanRun>
    where
        F: FnMut(ScanTrigger) -> ScanRun,
    {
        let mut runs = Vec::new();
        if self.request(trigger) != Admission::Start {
            return runs;
        }

        let mut current = Some(trigger);
        while let Some(trigger) = current {
            info!(trigger = %trigger, "Starting scan");
            runs.push(scan(trigger));
            current = self.complete();
        }
        runs
    }
}
