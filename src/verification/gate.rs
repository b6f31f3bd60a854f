/*!
 * Rendezvous between the review workflow and the reviewer.
 *
 * `ApprovalGate` holds, per job id, the sending half of a bounded decision
 * queue. The coordinator owns the receiving half through an `ApprovalRound`
 * and waits for the decision on one block at a time. Decisions are matched by
 * block number: one that arrives for a block not yet asked about is kept and
 * handed out when that block comes up.
 */

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

use crate::errors::VerificationError;
use crate::verification::issue::Decision;

/// Decisions that may queue up for one job before submissions are refused
pub const DEFAULT_DECISION_CAPACITY: usize = 32;

#[derive(Debug)]
struct GateSlot {
    round_id: Uuid,
    sender: mpsc::Sender<Decision>,
}

type Slots = Arc<Mutex<HashMap<String, GateSlot>>>;

/// Decision queues of every job under review
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    slots: Slots,
    capacity: usize,
}

impl Default for ApprovalGate {
    fn default() -> Self {
        Self::new(DEFAULT_DECISION_CAPACITY)
    }
}

impl ApprovalGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Start a round for `job_id`
    ///
    /// A round still open for the same job is replaced; its pending wait
    /// ends with [`VerificationError::GateClosed`].
    pub fn open(&self, job_id: &str) -> ApprovalRound {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let round_id = Uuid::new_v4();

        let previous = self.slots.lock().insert(job_id.to_string(), GateSlot { round_id, sender });
        if let Some(previous) = previous {
            warn!("Job {}: replacing approval round {} with {}", job_id, previous.round_id, round_id);
        } else {
            debug!("Job {}: approval round {} opened", job_id, round_id);
        }

        ApprovalRound {
            job_id: job_id.to_string(),
            round_id,
            receiver,
            early: HashMap::new(),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Queue a reviewer decision for `job_id`
    pub fn submit(&self, job_id: &str, decision: Decision) -> Result<(), VerificationError> {
        let slots = self.slots.lock();
        let slot = slots
            .get(job_id)
            .ok_or_else(|| VerificationError::NoActiveRound(job_id.to_string()))?;

        match slot.sender.try_send(decision) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(VerificationError::QueueFull(job_id.to_string())),
            Err(TrySendError::Closed(_)) => Err(VerificationError::NoActiveRound(job_id.to_string())),
        }
    }

    /// Close the round of `job_id`, ending any wait on it
    pub fn close(&self, job_id: &str) -> bool {
        let closed = self.slots.lock().remove(job_id).is_some();
        if closed {
            info!("Job {}: approval round closed", job_id);
        }
        closed
    }

    pub fn is_open(&self, job_id: &str) -> bool {
        self.slots.lock().contains_key(job_id)
    }
}

/// Receiving side of one job's decision queue
///
/// Dropping the round removes its slot from the gate, unless a newer round
/// has replaced it.
#[derive(Debug)]
pub struct ApprovalRound {
    job_id: String,
    round_id: Uuid,
    receiver: mpsc::Receiver<Decision>,
    early: HashMap<usize, Decision>,
    slots: Slots,
}

impl ApprovalRound {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn round_id(&self) -> Uuid {
        self.round_id
    }

    /// Wait for the decision on `block_number`
    ///
    /// Decisions for other blocks received meanwhile are kept for later;
    /// when a block is decided twice the first decision wins.
    pub async fn wait_for(&mut self, block_number: usize) -> Result<Decision, VerificationError> {
        if let Some(decision) = self.early.remove(&block_number) {
            return Ok(decision);
        }

        while let Some(decision) = self.receiver.recv().await {
            if decision.block_number == block_number {
                return Ok(decision);
            }
            match self.early.entry(decision.block_number) {
                Entry::Vacant(entry) => {
                    debug!("Job {}: holding early decision for block {}", self.job_id, decision.block_number);
                    entry.insert(decision);
                }
                Entry::Occupied(_) => {
                    warn!("Job {}: block {} already decided, dropping repeat", self.job_id, decision.block_number);
                }
            }
        }

        Err(VerificationError::GateClosed {
            job_id: self.job_id.clone(),
            block_number,
        })
    }

    /// Decisions received for blocks that were never asked about
    pub fn unclaimed(&self) -> usize {
        self.early.len()
    }
}

impl Drop for ApprovalRound {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        if slots.get(&self.job_id).is_some_and(|slot| slot.round_id == self.round_id) {
            slots.remove(&self.job_id);
            debug!("Job {}: approval round {} released", self.job_id, self.round_id);
        }
    }
}
