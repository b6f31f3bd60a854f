/*!
 * Quality scan of a translated document.
 *
 * Original and translated blocks are paired by number and analysed in
 * overlapping windows. The scan runs as its own task and hands issues over a
 * bounded channel as soon as each window is analysed, so review can start
 * before the scan is done. A block reported by an earlier window is not
 * reported again.
 */

use log::{debug, error, info};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::errors::TranslationError;
use crate::events::{EventSink, JobEvent};
use crate::subtitle_processor::SrtBlock;
use crate::translation::client::{AnalysisRequest, TranslatorClient};
use crate::verification::issue::Issue;

/// Issues buffered between the scan task and its consumer
const ISSUE_CHANNEL_CAPACITY: usize = 16;

/// Step name of scan progress events
pub const SCAN_STEP: &str = "verification";

/// Window geometry and pacing of the scan
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    /// Blocks per analysis call
    pub window_size: usize,
    /// Blocks shared by consecutive windows
    pub overlap: usize,
    /// Pause after each analysis call
    pub pacing_delay: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            window_size: 10,
            overlap: 3,
            pacing_delay: Duration::from_millis(1000),
        }
    }
}

impl ScanOptions {
    /// Distance between the starts of consecutive windows, at least 1
    pub fn stride(&self) -> usize {
        self.window_size.saturating_sub(self.overlap).max(1)
    }

    /// Start indices of every window over `len` pairs
    ///
    /// Stops at the first window that reaches the end, so no window is
    /// wholly covered by the one before it.
    pub fn window_starts(&self, len: usize) -> Vec<usize> {
        let window = self.window_size.max(1);
        let mut starts = Vec::new();
        let mut start = 0;
        while start < len {
            starts.push(start);
            if start + window >= len {
                break;
            }
            start += self.stride();
        }
        starts
    }
}

/// Launches scan tasks
#[derive(Clone)]
pub struct VerificationScanner {
    translator: Arc<dyn TranslatorClient>,
    events: Arc<dyn EventSink>,
    options: ScanOptions,
}

impl VerificationScanner {
    pub fn new(translator: Arc<dyn TranslatorClient>, events: Arc<dyn EventSink>, options: ScanOptions) -> Self {
        Self { translator, events, options }
    }

    /// Start scanning in the background
    ///
    /// The stream yields each issue once, then ends. A translator failure is
    /// yielded as the last item.
    pub fn spawn(
        &self,
        job_id: &str,
        original: &[SrtBlock],
        translated: &[SrtBlock],
        language: &str,
    ) -> IssueStream {
        let (sender, receiver) = mpsc::channel(ISSUE_CHANNEL_CAPACITY);
        let pairs = pair_blocks(original, translated);
        let scanner = self.clone();
        let job_id = job_id.to_string();
        let language = language.to_string();

        let handle = tokio::spawn(async move {
            scanner.run(job_id, pairs, language, sender).await;
        });

        IssueStream { receiver, handle }
    }

    async fn run(
        self,
        job_id: String,
        pairs: Vec<(SrtBlock, SrtBlock)>,
        language: String,
        sender: mpsc::Sender<Result<Issue, TranslationError>>,
    ) {
        let starts = self.options.window_starts(pairs.len());
        let total = starts.len();
        self.emit_status(&job_id, "Initializing translation check", 5);
        info!("Job {}: scanning {} block(s) in {} window(s)", job_id, pairs.len(), total);

        let mut reported: HashSet<usize> = HashSet::new();

        for (index, start) in starts.into_iter().enumerate() {
            let end = (start + self.options.window_size).min(pairs.len());
            let window = &pairs[start..end];
            let original: Vec<SrtBlock> = window.iter().map(|(o, _)| o.clone()).collect();
            let translated: Vec<SrtBlock> = window.iter().map(|(_, t)| t.clone()).collect();

            let percentage = 5 + ((index + 1) * 90 / total) as u8;
            self.emit_status(
                &job_id,
                &format!("Analyzing translation quality: group {} of {}", index + 1, total),
                percentage,
            );

            let request = AnalysisRequest {
                original: &original,
                translated: &translated,
                language: &language,
            };
            let reports = match self.translator.analyze(&request).await {
                Ok(reports) => reports,
                Err(e) => {
                    error!("Job {}: analysis of window {} failed: {}", job_id, index + 1, e);
                    let _ = sender.send(Err(e)).await;
                    return;
                }
            };

            for report in reports {
                let Some((source, target)) = window.iter().find(|(o, _)| o.number == report.block_number) else {
                    debug!("Job {}: ignoring report for block {} outside the window", job_id, report.block_number);
                    continue;
                };
                if !reported.insert(report.block_number) {
                    continue;
                }

                let issue = Issue::new(
                    report.block_number,
                    report.problem_types,
                    source.text.clone(),
                    target.text.clone(),
                    report.quality_score,
                    report.recommendations,
                );
                if sender.send(Ok(issue)).await.is_err() {
                    debug!("Job {}: issue consumer gone, stopping scan", job_id);
                    return;
                }
            }

            if index + 1 < total && !self.options.pacing_delay.is_zero() {
                tokio::time::sleep(self.options.pacing_delay).await;
            }
        }

        self.emit_status(&job_id, "Translation quality analysis complete", 95);
        info!("Job {}: scan finished with {} issue(s)", job_id, reported.len());
    }

    fn emit_status(&self, job_id: &str, description: &str, percentage: u8) {
        self.events.emit(JobEvent::VerificationStatus {
            job_id: job_id.to_string(),
            step: SCAN_STEP.to_string(),
            description: description.to_string(),
            percentage,
        });
    }
}

/// Issues of one scan, in discovery order
///
/// Dropping the stream stops the scan task.
#[derive(Debug)]
pub struct IssueStream {
    receiver: mpsc::Receiver<Result<Issue, TranslationError>>,
    handle: JoinHandle<()>,
}

impl IssueStream {
    pub async fn next(&mut self) -> Option<Result<Issue, TranslationError>> {
        self.receiver.recv().await
    }
}

impl Drop for IssueStream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Blocks present in both documents, by ascending number
fn pair_blocks(original: &[SrtBlock], translated: &[SrtBlock]) -> Vec<(SrtBlock, SrtBlock)> {
    let translated: BTreeMap<usize, &SrtBlock> = translated.iter().map(|block| (block.number, block)).collect();
    let mut pairs: Vec<(SrtBlock, SrtBlock)> = original
        .iter()
        .filter_map(|source| {
            translated
                .get(&source.number)
                .map(|target| (source.clone(), (*target).clone()))
        })
        .collect();
    pairs.sort_by_key(|(source, _)| source.number);
    pairs
}
