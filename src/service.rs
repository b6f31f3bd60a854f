use log::{debug, info};
use std::sync::Arc;

use crate::app_config::Config;
use crate::errors::{TranslationError, VerificationError};
use crate::events::{EventSink, JobEvent};
use crate::subtitle_processor::{SrtBlock, SrtParser};
use crate::translation::control::{ControlSignal, RunControlStore, RunState};
use crate::translation::glossary::Glossary;
use crate::translation::orchestrator::{BatchOptions, BatchTranslator, JobContext, TranslationJob, TranslationOutcome};
use crate::translation::client::TranslatorClient;
use crate::verification::coordinator::{VerificationCoordinator, VerificationOptions, VerificationReport};
use crate::verification::gate::ApprovalGate;
use crate::verification::issue::Decision;

// @module: Entry point for translation and review jobs

/// Owns the state of every live job
///
/// Jobs are addressed by an id chosen by the caller (see
/// [`SubtitleService::new_job_id`]). Run control for a job exists from
/// [`SubtitleService::prepare_job`] or the start of its translation until the
/// translation returns. Approval state exists while a review round runs.
pub struct SubtitleService {
    // @field: Model calls
    translator: Arc<dyn TranslatorClient>,

    // @field: Outbound notifications
    events: Arc<dyn EventSink>,

    // @field: Pause/cancel flags by job id
    controls: RunControlStore,

    // @field: Decision queues by job id
    gate: ApprovalGate,

    batch_options: BatchOptions,
    verification_options: VerificationOptions,
}

impl SubtitleService {
    pub fn new(translator: Arc<dyn TranslatorClient>, events: Arc<dyn EventSink>) -> Self {
        Self {
            translator,
            events,
            controls: RunControlStore::new(),
            gate: ApprovalGate::default(),
            batch_options: BatchOptions::default(),
            verification_options: VerificationOptions::default(),
        }
    }

    /// Service tuned by the translation and verification sections of `config`
    pub fn from_config(config: &Config, translator: Arc<dyn TranslatorClient>, events: Arc<dyn EventSink>) -> Self {
        Self::new(translator, events)
            .with_batch_options(config.translation.batch_options())
            .with_verification_options(config.verification.verification_options())
    }

    pub fn with_batch_options(mut self, options: BatchOptions) -> Self {
        self.batch_options = options;
        self
    }

    pub fn with_verification_options(mut self, options: VerificationOptions) -> Self {
        self.verification_options = options;
        self
    }

    /// Fresh, unique job id
    pub fn new_job_id() -> String {
        format!("translation-{}", uuid::Uuid::new_v4())
    }

    /// Register `job_id` ahead of its translation
    ///
    /// Pause and cancel sent between this call and the start of the run are
    /// honoured at the first window. The entry is released when the
    /// translation of the job returns.
    pub fn prepare_job(&self, job_id: &str) {
        self.controls.register(job_id);
        debug!("Job {}: prepared", job_id);
    }

    /// Parse SRT `content` and translate it
    pub async fn translate_srt(
        &self,
        job_id: &str,
        content: &str,
        job: &TranslationJob,
    ) -> Result<TranslationOutcome, TranslationError> {
        let blocks = match SrtParser::parse_document(content) {
            Ok(blocks) => blocks,
            Err(e) => {
                self.controls.remove(job_id);
                return Err(e.into());
            }
        };
        self.translate_blocks(job_id, &blocks, job).await
    }

    /// Translate `blocks` under `job_id`
    ///
    /// The job's run control and glossary are released when this returns,
    /// whether the run completed, was cancelled or failed.
    pub async fn translate_blocks(
        &self,
        job_id: &str,
        blocks: &[SrtBlock],
        job: &TranslationJob,
    ) -> Result<TranslationOutcome, TranslationError> {
        let ctx = JobContext {
            job_id: job_id.to_string(),
            control: self.controls.register(job_id),
            glossary: Arc::new(Glossary::new()),
        };
        let orchestrator = BatchTranslator::new(
            Arc::clone(&self.translator),
            Arc::clone(&self.events),
            self.batch_options.clone(),
        );

        let result = orchestrator.translate(&ctx, job, blocks).await;

        self.controls.remove(job_id);
        debug!("Job {}: released run control and {} glossary term(s)", job_id, ctx.glossary.len());
        result
    }

    /// Pause the translation of `job_id`, `None` when no such job is live
    pub fn pause(&self, job_id: &str) -> Option<RunState> {
        self.signal(job_id, ControlSignal::Pause)
    }

    pub fn resume(&self, job_id: &str) -> Option<RunState> {
        self.signal(job_id, ControlSignal::Resume)
    }

    /// Cancel the translation of `job_id`
    ///
    /// Takes effect at the job's next checkpoint. Any open review round of the
    /// job is closed as well, even when no translation is live.
    pub fn cancel(&self, job_id: &str) -> Option<RunState> {
        if self.gate.close(job_id) {
            info!("Job {}: review round aborted by cancel", job_id);
        }
        self.signal(job_id, ControlSignal::Cancel)
    }

    /// Paused and cancelled flags, both false for unknown jobs
    pub fn run_state(&self, job_id: &str) -> RunState {
        self.controls.state(job_id)
    }

    fn signal(&self, job_id: &str, signal: ControlSignal) -> Option<RunState> {
        let state = self.controls.signal(job_id, signal)?;
        self.events.emit(JobEvent::RunStateChanged {
            job_id: job_id.to_string(),
            state,
        });
        Some(state)
    }

    /// Review `translated` against `original` with the reviewer in the loop
    ///
    /// Decisions for this round are passed in through
    /// [`SubtitleService::submit_decision`] under the same `job_id`.
    pub async fn verify(
        &self,
        job_id: &str,
        original: &[SrtBlock],
        translated: &[SrtBlock],
        language: &str,
    ) -> Result<VerificationReport, VerificationError> {
        let coordinator = VerificationCoordinator::new(
            Arc::clone(&self.translator),
            Arc::clone(&self.events),
            self.gate.clone(),
            self.verification_options.clone(),
        );

        coordinator.run(job_id, original, translated, language).await
    }

    /// Hand a reviewer decision to the running review of `job_id`
    pub fn submit_decision(&self, job_id: &str, decision: Decision) -> Result<(), VerificationError> {
        debug!("Job {}: decision {:?} for block {}", job_id, decision.kind, decision.block_number);
        self.gate.submit(job_id, decision)
    }

    /// Whether a review round is waiting on decisions for `job_id`
    pub fn is_reviewing(&self, job_id: &str) -> bool {
        self.gate.is_open(job_id)
    }
}
