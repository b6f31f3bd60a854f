/*!
 * Scripted `TranslatorClient` for pipeline tests
 *
 * Answers every call deterministically and records what it was asked, so
 * tests can check windowing, context and glossary flow without a model.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Notify;

use subtrans::errors::{ProviderError, TranslationError};
use subtrans::translation::client::{
    AnalysisRequest, BatchRequest, BatchTranslation, DefectReport, RetranslationRequest, TranslatorClient,
};
use subtrans::verification::ProblemType;

/// What one translation call was given
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedBatch {
    pub batch: Vec<usize>,
    pub context_before: Vec<usize>,
    /// Text of the preceding blocks as the model saw it
    pub context_before_texts: Vec<String>,
    pub context_after: Vec<usize>,
    pub glossary: BTreeMap<String, String>,
    pub seed: Option<u64>,
}

/// Handles to a translation call that blocks until released
#[derive(Debug, Clone)]
pub struct WindowHold {
    pub window: usize,
    /// Notified when the held call has started
    pub started: Arc<Notify>,
    /// Notify to let the held call return
    pub release: Arc<Notify>,
}

#[derive(Debug, Default)]
pub struct ScriptedTranslator {
    failing_windows: HashSet<usize>,
    terms: HashMap<usize, BTreeMap<String, String>>,
    defects: BTreeMap<usize, DefectReport>,
    blank_blocks: HashSet<usize>,
    fail_analysis: bool,
    fail_retranslation: bool,
    empty_retranslation: bool,
    hold: Option<WindowHold>,
    batches: Mutex<Vec<RecordedBatch>>,
    analyses: Mutex<Vec<Vec<usize>>>,
    retranslations: Mutex<Vec<Vec<usize>>>,
}

impl ScriptedTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translation call `window` (0-based) fails with a provider error
    pub fn failing_window(mut self, window: usize) -> Self {
        self.failing_windows.insert(window);
        self
    }

    /// Translation call `window` proposes a glossary term
    pub fn with_term(mut self, window: usize, source: &str, target: &str) -> Self {
        self.terms.entry(window).or_default().insert(source.to_string(), target.to_string());
        self
    }

    /// Analysis reports `block_number` as defective
    pub fn with_defect(mut self, block_number: usize, problem: ProblemType, score: u8) -> Self {
        self.defects.insert(
            block_number,
            DefectReport {
                block_number,
                problem_types: BTreeSet::from([problem]),
                quality_score: score,
                recommendations: Some(format!("rework block {}", block_number)),
            },
        );
        self
    }

    /// Translation of `block_number` comes back as whitespace
    pub fn blank_block(mut self, block_number: usize) -> Self {
        self.blank_blocks.insert(block_number);
        self
    }

    /// Every analysis call fails
    pub fn failing_analysis(mut self) -> Self {
        self.fail_analysis = true;
        self
    }

    /// Every re-translation call fails
    pub fn failing_retranslation(mut self) -> Self {
        self.fail_retranslation = true;
        self
    }

    /// Re-translation never proposes anything
    pub fn empty_retranslation(mut self) -> Self {
        self.empty_retranslation = true;
        self
    }

    /// Translation call `window` waits until released
    pub fn holding_window(mut self, window: usize) -> (Self, WindowHold) {
        let hold = WindowHold {
            window,
            started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        self.hold = Some(hold.clone());
        (self, hold)
    }

    pub fn batches(&self) -> Vec<RecordedBatch> {
        self.batches.lock().clone()
    }

    pub fn analyses(&self) -> Vec<Vec<usize>> {
        self.analyses.lock().clone()
    }

    pub fn retranslations(&self) -> Vec<Vec<usize>> {
        self.retranslations.lock().clone()
    }
}

/// Text the scripted translator gives a block
pub fn scripted_translation(language: &str, text: &str) -> String {
    format!("[{}] {}", language, text)
}

#[async_trait]
impl TranslatorClient for ScriptedTranslator {
    async fn translate_batch(&self, request: &BatchRequest<'_>) -> Result<BatchTranslation, TranslationError> {
        let window = {
            let mut batches = self.batches.lock();
            batches.push(RecordedBatch {
                batch: request.batch.iter().map(|block| block.number).collect(),
                context_before: request.context_before.iter().map(|block| block.number).collect(),
                context_before_texts: request.context_before.iter().map(|block| block.text.clone()).collect(),
                context_after: request.context_after.iter().map(|block| block.number).collect(),
                glossary: request.glossary.clone(),
                seed: request.seed,
            });
            batches.len() - 1
        };

        if let Some(hold) = self.hold.as_ref().filter(|hold| hold.window == window) {
            hold.started.notify_one();
            hold.release.notified().await;
        }

        if self.failing_windows.contains(&window) {
            return Err(TranslationError::Provider(ProviderError::ConnectionError(format!(
                "window {} unreachable",
                window
            ))));
        }

        Ok(BatchTranslation {
            translations: request
                .batch
                .iter()
                .map(|block| {
                    let text = if self.blank_blocks.contains(&block.number) {
                        "   ".to_string()
                    } else {
                        scripted_translation(request.language, &block.text)
                    };
                    (block.number, text)
                })
                .collect(),
            terms: self.terms.get(&window).cloned().unwrap_or_default(),
        })
    }

    async fn analyze(&self, request: &AnalysisRequest<'_>) -> Result<Vec<DefectReport>, TranslationError> {
        self.analyses
            .lock()
            .push(request.translated.iter().map(|block| block.number).collect());

        if self.fail_analysis {
            return Err(TranslationError::Provider(ProviderError::ApiError {
                status_code: 503,
                message: "analysis unavailable".to_string(),
            }));
        }

        Ok(request
            .translated
            .iter()
            .filter_map(|block| self.defects.get(&block.number).cloned())
            .collect())
    }

    async fn retranslate(&self, request: &RetranslationRequest<'_>) -> Result<HashMap<usize, String>, TranslationError> {
        self.retranslations
            .lock()
            .push(request.issues.iter().map(|issue| issue.block_number).collect());

        if self.fail_retranslation {
            return Err(TranslationError::Provider(ProviderError::ConnectionError(
                "re-translation unreachable".to_string(),
            )));
        }
        if self.empty_retranslation {
            return Ok(HashMap::new());
        }
        Ok(request
            .issues
            .iter()
            .map(|issue| (issue.block_number, format!("better {}", issue.block_number)))
            .collect())
    }
}
