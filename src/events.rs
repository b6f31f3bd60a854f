/*!
 * Outbound job notifications.
 *
 * The pipeline reports everything a front end needs to render a job
 * (per-block text, progress, review requests, errors) as `JobEvent`s pushed
 * into an `EventSink`. Emitting never blocks and never fails the job.
 */

use log::{debug, error, info, warn};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::subtitle_processor::SrtBlock;
use crate::translation::control::RunState;
use crate::verification::issue::{Issue, IssueStatus};

/// Notification about a running job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JobEvent {
    /// Text a block has after its window was processed
    #[serde(rename_all = "camelCase")]
    TranslationUpdate { job_id: String, block_number: usize, text: String },

    /// Source text of a translated block, for side-by-side display
    #[serde(rename_all = "camelCase")]
    OriginalUpdate { job_id: String, block_number: usize, text: String },

    /// Blocks processed out of the total
    #[serde(rename_all = "camelCase")]
    Progress { job_id: String, current: usize, total: usize },

    /// Verification step, description and percentage (0..=100)
    #[serde(rename_all = "camelCase")]
    VerificationStatus { job_id: String, step: String, description: String, percentage: u8 },

    /// The scanner found an issue
    #[serde(rename_all = "camelCase")]
    IssueFound { job_id: String, issue: Issue },

    /// An issue with its improved translation awaits a reviewer decision
    #[serde(rename_all = "camelCase")]
    ApprovalRequested {
        job_id: String,
        issue: Issue,
        context_before: Vec<SrtBlock>,
        context_after: Vec<SrtBlock>,
    },

    /// A reviewer decision was applied
    #[serde(rename_all = "camelCase")]
    DecisionApplied { job_id: String, block_number: usize, status: IssueStatus, text: String },

    /// Verification stopped on an error
    #[serde(rename_all = "camelCase")]
    VerificationError { job_id: String, message: String },

    /// The job stopped at a checkpoint after a cancel signal
    #[serde(rename_all = "camelCase")]
    JobCancelled { job_id: String, windows_completed: usize },

    /// Pause or cancel flags changed
    #[serde(rename_all = "camelCase")]
    RunStateChanged { job_id: String, state: RunState },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            Self::TranslationUpdate { job_id, .. }
            | Self::OriginalUpdate { job_id, .. }
            | Self::Progress { job_id, .. }
            | Self::VerificationStatus { job_id, .. }
            | Self::IssueFound { job_id, .. }
            | Self::ApprovalRequested { job_id, .. }
            | Self::DecisionApplied { job_id, .. }
            | Self::VerificationError { job_id, .. }
            | Self::JobCancelled { job_id, .. }
            | Self::RunStateChanged { job_id, .. } => job_id,
        }
    }
}

/// Receiver of job notifications
pub trait EventSink: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Forwards events into an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<JobEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: JobEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event receiver dropped, discarding event");
        }
    }
}

/// Writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: JobEvent) {
        match &event {
            JobEvent::VerificationError { job_id, message } => error!("[{}] verification failed: {}", job_id, message),
            JobEvent::JobCancelled { job_id, windows_completed } => {
                warn!("[{}] cancelled after {} window(s)", job_id, windows_completed)
            }
            JobEvent::Progress { job_id, current, total } => debug!("[{}] progress {}/{}", job_id, current, total),
            JobEvent::VerificationStatus { job_id, step, description, percentage } => {
                info!("[{}] {} {}%: {}", job_id, step, percentage, description)
            }
            other => debug!("{:?}", other),
        }
    }
}
