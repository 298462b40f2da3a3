use super::error::Report;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

/// The externally visible state of one compile invocation.
///
/// `Running` transitions to exactly one of `Succeeded` or `Failed`; there
/// are no further transitions. A new compile is a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileState {
    Running,
    Succeeded,
    Failed,
}

/// One pipeline stage's progress: monotonically non-decreasing counters,
/// readable from any thread without a lock.
#[derive(Debug, Default)]
pub struct TaskProgress {
    total: AtomicU64,
    done: AtomicU64,
}

impl TaskProgress {
    /// Sets the task size, once the index is built and the size is known.
    pub(crate) fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    pub(crate) fn increment(&self) {
        self.done.fetch_add(1, Ordering::AcqRel);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Acquire)
    }

    /// Completed fraction in `[0, 1]`; zero-sized tasks read as complete.
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 1.0;
        }
        self.done() as f64 / total as f64
    }
}

/// The four proportional progress tasks of the compile pipeline, sized from
/// the conformation space index so callers can render accurate progress.
#[derive(Debug, Default)]
pub struct CompileProgress {
    pub parameterize: TaskProgress,
    pub partition_fixed_atoms: TaskProgress,
    pub static_energy: TaskProgress,
    pub atom_pairs: TaskProgress,
}

const STATE_RUNNING: u8 = 0;
const STATE_SUCCEEDED: u8 = 1;
const STATE_FAILED: u8 = 2;

/// The handle to one compile running on its background worker.
///
/// The initiating thread gets this back immediately and can poll progress
/// and state from any thread, or block in
/// [`wait_for_finish`](Self::wait_for_finish) to join. The result is
/// published exactly once, into a slot that is either empty or holds the
/// complete report; no reader can observe a partially-written report.
#[derive(Debug)]
pub struct CompileJob {
    pub progress: CompileProgress,
    state: AtomicU8,
    result: Mutex<Option<Report>>,
    finished: Condvar,
}

impl CompileJob {
    pub(crate) fn new() -> Self {
        Self {
            progress: CompileProgress::default(),
            state: AtomicU8::new(STATE_RUNNING),
            result: Mutex::new(None),
            finished: Condvar::new(),
        }
    }

    pub fn state(&self) -> CompileState {
        match self.state.load(Ordering::Acquire) {
            STATE_SUCCEEDED => CompileState::Succeeded,
            STATE_FAILED => CompileState::Failed,
            _ => CompileState::Running,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() != CompileState::Running
    }

    /// Publishes the report and wakes every waiter. Called exactly once,
    /// by the worker.
    pub(crate) fn publish(&self, report: Report) {
        let state = if report.is_success() {
            STATE_SUCCEEDED
        } else {
            STATE_FAILED
        };
        let mut slot = self.result.lock().unwrap_or_else(|p| p.into_inner());
        *slot = Some(report);
        self.state.store(state, Ordering::Release);
        drop(slot);
        self.finished.notify_all();
    }

    /// Blocks until the worker publishes, then takes the report.
    ///
    /// The report moves to the first taker; the final state stays
    /// observable through [`state`](Self::state) afterward.
    pub fn wait_for_finish(&self) -> Report {
        let mut slot = self.result.lock().unwrap_or_else(|p| p.into_inner());
        loop {
            if let Some(report) = slot.take() {
                return report;
            }
            slot = self
                .finished
                .wait(slot)
                .unwrap_or_else(|p| p.into_inner());
        }
    }

    /// Takes the report if the worker already published it.
    pub fn try_take(&self) -> Option<Report> {
        self.result
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take()
    }
}
