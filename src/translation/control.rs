/*!
 * Pause and cancel signals for running jobs.
 *
 * Each job id maps to a `RunControl` holding a `watch` channel with the
 * job's `RunState`. Control signals may arrive from any task at any time;
 * the job only observes them at its checkpoints, where a paused job sleeps
 * on the channel until the state changes.
 */

use log::{debug, info};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Paused and cancelled flags of one job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    pub paused: bool,
    pub cancelled: bool,
}

/// Inbound control signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    Pause,
    Resume,
    Cancel,
}

/// Marker returned by a checkpoint once the job has been cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Run state of a single job
#[derive(Debug)]
pub struct RunControl {
    state: watch::Sender<RunState>,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (state, _) = watch::channel(RunState::default());
        Self { state }
    }

    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Apply a signal and return the resulting state
    ///
    /// Cancellation is terminal: neither pause nor resume clears it.
    pub fn apply(&self, signal: ControlSignal) -> RunState {
        self.state.send_if_modified(|state| {
            let before = *state;
            match signal {
                ControlSignal::Pause => state.paused = true,
                ControlSignal::Resume => state.paused = false,
                ControlSignal::Cancel => state.cancelled = true,
            }
            *state != before
        });
        self.state()
    }

    pub fn pause(&self) -> RunState {
        self.apply(ControlSignal::Pause)
    }

    pub fn resume(&self) -> RunState {
        self.apply(ControlSignal::Resume)
    }

    pub fn cancel(&self) -> RunState {
        self.apply(ControlSignal::Cancel)
    }

    /// Wait until the job may proceed
    ///
    /// Returns immediately when running, sleeps while paused, and fails with
    /// [`Cancelled`] as soon as the job is cancelled, paused or not.
    pub async fn checkpoint(&self) -> Result<(), Cancelled> {
        let mut receiver = self.state.subscribe();
        let mut announced = false;
        loop {
            let state = *receiver.borrow_and_update();
            if state.cancelled {
                return Err(Cancelled);
            }
            if !state.paused {
                return Ok(());
            }
            if !announced {
                debug!("Job paused, waiting for resume or cancel");
                announced = true;
            }
            if receiver.changed().await.is_err() {
                return Err(Cancelled);
            }
        }
    }
}

/// Run controls of every live job, keyed by job id
#[derive(Debug, Default)]
pub struct RunControlStore {
    jobs: Mutex<HashMap<String, Arc<RunControl>>>,
}

impl RunControlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Control for `job_id`, created on first use
    ///
    /// Registering ahead of the run lets signals sent before the job starts
    /// take effect at its first checkpoint.
    pub fn register(&self, job_id: &str) -> Arc<RunControl> {
        Arc::clone(
            self.jobs
                .lock()
                .entry(job_id.to_string())
                .or_insert_with(|| Arc::new(RunControl::new())),
        )
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<RunControl>> {
        self.jobs.lock().get(job_id).cloned()
    }

    /// Current state, `{paused: false, cancelled: false}` for unknown jobs
    pub fn state(&self, job_id: &str) -> RunState {
        self.get(job_id).map(|control| control.state()).unwrap_or_default()
    }

    /// Apply a signal to a registered `job_id`
    ///
    /// Unknown or finished jobs are left alone and yield `None`.
    pub fn signal(&self, job_id: &str, signal: ControlSignal) -> Option<RunState> {
        let Some(control) = self.get(job_id) else {
            debug!("Job {}: {:?} ignored, no such job", job_id, signal);
            return None;
        };
        let state = control.apply(signal);
        info!("Job {}: {:?} -> paused={}, cancelled={}", job_id, signal, state.paused, state.cancelled);
        Some(state)
    }

    /// Drop the entry of a finished job
    pub fn remove(&self, job_id: &str) {
        if self.jobs.lock().remove(job_id).is_some() {
            debug!("Run control for job {} released", job_id);
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}
