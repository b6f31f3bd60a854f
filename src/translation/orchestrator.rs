/*!
 * Batch translation of a subtitle document.
 *
 * Blocks are sorted by number and translated in consecutive windows of
 * `batch_size`. Each window is sent with up to `context_before` preceding
 * blocks (already translated text when available) and up to `context_after`
 * following blocks (source text), plus a snapshot of the job glossary.
 * Windows run strictly in order, one at a time, with a checkpoint for
 * pause/cancel before each one.
 */

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::TranslationError;
use crate::events::{EventSink, JobEvent};
use crate::subtitle_processor::SrtBlock;
use crate::translation::client::{BatchRequest, TranslatorClient};
use crate::translation::control::RunControl;
use crate::translation::glossary::Glossary;
use crate::translation::prompts::TranslationStyle;

/// Window geometry and pacing
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOptions {
    /// Blocks translated per call
    pub batch_size: usize,
    /// Blocks shown before the window
    pub context_before: usize,
    /// Blocks shown after the window
    pub context_after: usize,
    /// Pause between consecutive windows
    pub pacing_delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 4,
            context_before: 2,
            context_after: 3,
            pacing_delay: Duration::from_millis(1000),
        }
    }
}

/// What to translate into
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationJob {
    /// English language name used in prompts
    pub language: String,
    pub style: TranslationStyle,
    /// Sampling seed shared by every window; drawn at random when `None`
    pub seed: Option<u64>,
}

impl TranslationJob {
    pub fn new(language: impl Into<String>, style: TranslationStyle) -> Self {
        Self {
            language: language.into(),
            style,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }
}

/// Per-job state shared with the control entry points
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: String,
    pub control: Arc<RunControl>,
    pub glossary: Arc<Glossary>,
}

impl JobContext {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            control: Arc::new(RunControl::new()),
            glossary: Arc::new(Glossary::new()),
        }
    }
}

/// How a translation run ended
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationOutcome {
    /// Every window was processed; blocks are in ascending number order
    Completed(Vec<SrtBlock>),
    /// Stopped at a checkpoint; `partial` holds the full document with the
    /// windows finished so far translated and the rest in source text
    Cancelled {
        partial: Vec<SrtBlock>,
        windows_completed: usize,
    },
}

impl TranslationOutcome {
    pub fn blocks(&self) -> &[SrtBlock] {
        match self {
            Self::Completed(blocks) => blocks,
            Self::Cancelled { partial, .. } => partial,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Drives a document through the translator window by window
pub struct BatchTranslator {
    translator: Arc<dyn TranslatorClient>,
    events: Arc<dyn EventSink>,
    options: BatchOptions,
}

impl BatchTranslator {
    pub fn new(translator: Arc<dyn TranslatorClient>, events: Arc<dyn EventSink>, options: BatchOptions) -> Self {
        Self { translator, events, options }
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Translate `blocks`
    ///
    /// A window whose call fails keeps its source text and the run goes on;
    /// only invalid arguments make this return an error. Cancellation is
    /// reported as [`TranslationOutcome::Cancelled`].
    pub async fn translate(
        &self,
        ctx: &JobContext,
        job: &TranslationJob,
        blocks: &[SrtBlock],
    ) -> Result<TranslationOutcome, TranslationError> {
        if blocks.is_empty() {
            return Err(TranslationError::InvalidArgument("No blocks to translate".to_string()));
        }
        if self.options.batch_size == 0 {
            return Err(TranslationError::InvalidArgument("Batch size must be at least 1".to_string()));
        }
        if job.language.trim().is_empty() {
            return Err(TranslationError::InvalidArgument("Language cannot be empty".to_string()));
        }

        let mut sorted = blocks.to_vec();
        sorted.sort_by_key(|block| block.number);

        let seed = job.seed.unwrap_or_else(|| rand::random::<u32>() as u64);
        let total = sorted.len();
        let window_count = total.div_ceil(self.options.batch_size);
        info!(
            "Job {}: translating {} blocks to {} in {} window(s) of {} (style {}, seed {})",
            ctx.job_id, total, job.language, window_count, self.options.batch_size, job.style, seed
        );

        let mut translations: HashMap<usize, String> = HashMap::with_capacity(total);
        let mut processed = 0;
        self.emit_progress(ctx, 0, total);

        for (window_index, start) in (0..total).step_by(self.options.batch_size).enumerate() {
            if ctx.control.checkpoint().await.is_err() {
                info!("Job {}: cancelled before window {} of {}", ctx.job_id, window_index + 1, window_count);
                self.events.emit(JobEvent::JobCancelled {
                    job_id: ctx.job_id.clone(),
                    windows_completed: window_index,
                });
                return Ok(TranslationOutcome::Cancelled {
                    partial: overlay(&sorted, &translations),
                    windows_completed: window_index,
                });
            }

            let end = (start + self.options.batch_size).min(total);
            let batch = &sorted[start..end];
            let before = context_before(&sorted, start, self.options.context_before, &translations);
            let after = context_after(&sorted, end, self.options.context_after);
            let glossary = ctx.glossary.snapshot();

            let request = BatchRequest {
                batch,
                context_before: &before,
                context_after: &after,
                glossary: &glossary,
                language: &job.language,
                style: job.style,
                seed: Some(seed),
            };

            match self.translator.translate_batch(&request).await {
                Ok(result) => {
                    for block in batch {
                        // a blank text would leave a record without a text line
                        let text = match result.translations.get(&block.number).filter(|text| !text.trim().is_empty()) {
                            Some(text) => {
                                translations.insert(block.number, text.clone());
                                text.clone()
                            }
                            None => {
                                warn!("Job {}: block {} missing or blank in response, keeping source text", ctx.job_id, block.number);
                                block.text.clone()
                            }
                        };
                        processed += 1;
                        self.emit_block(ctx, block, text);
                        self.emit_progress(ctx, processed, total);
                    }

                    let foreign = result
                        .translations
                        .keys()
                        .filter(|number| !batch.iter().any(|block| block.number == **number))
                        .count();
                    if foreign > 0 {
                        debug!("Job {}: ignored {} translation(s) outside blocks {}-{}",
                            ctx.job_id, foreign, batch[0].number, batch[batch.len() - 1].number);
                    }

                    ctx.glossary.merge(result.terms);
                }
                Err(e) => {
                    error!(
                        "Job {}: window {} (blocks {}-{}) failed, keeping source text: {}",
                        ctx.job_id, window_index + 1, batch[0].number, batch[batch.len() - 1].number, e
                    );
                    for block in batch {
                        processed += 1;
                        self.emit_block(ctx, block, block.text.clone());
                        self.emit_progress(ctx, processed, total);
                    }
                }
            }

            if end < total && !self.options.pacing_delay.is_zero() {
                tokio::time::sleep(self.options.pacing_delay).await;
            }
        }

        self.emit_progress(ctx, total, total);
        info!(
            "Job {}: translated {} of {} blocks, glossary holds {} term(s)",
            ctx.job_id, translations.len(), total, ctx.glossary.len()
        );

        Ok(TranslationOutcome::Completed(overlay(&sorted, &translations)))
    }

    fn emit_block(&self, ctx: &JobContext, block: &SrtBlock, text: String) {
        self.events.emit(JobEvent::TranslationUpdate {
            job_id: ctx.job_id.clone(),
            block_number: block.number,
            text,
        });
        self.events.emit(JobEvent::OriginalUpdate {
            job_id: ctx.job_id.clone(),
            block_number: block.number,
            text: block.text.clone(),
        });
    }

    fn emit_progress(&self, ctx: &JobContext, current: usize, total: usize) {
        self.events.emit(JobEvent::Progress {
            job_id: ctx.job_id.clone(),
            current,
            total,
        });
    }
}

/// Up to `count` blocks before index `start`, translated text preferred
pub fn context_before(
    blocks: &[SrtBlock],
    start: usize,
    count: usize,
    translations: &HashMap<usize, String>,
) -> Vec<SrtBlock> {
    let from = start.saturating_sub(count);
    blocks[from..start.min(blocks.len())]
        .iter()
        .map(|block| match translations.get(&block.number) {
            Some(text) => block.with_text(text.as_str()),
            None => block.clone(),
        })
        .collect()
}

/// Up to `count` blocks from index `end` on, source text
pub fn context_after(blocks: &[SrtBlock], end: usize, count: usize) -> Vec<SrtBlock> {
    let from = end.min(blocks.len());
    let to = end.saturating_add(count).min(blocks.len());
    blocks[from..to].to_vec()
}

/// Source blocks with translated text where available; time ranges untouched
pub fn overlay(blocks: &[SrtBlock], translations: &HashMap<usize, String>) -> Vec<SrtBlock> {
    blocks
        .iter()
        .map(|block| match translations.get(&block.number) {
            Some(text) => block.with_text(text.as_str()),
            None => block.clone(),
        })
        .collect()
}
