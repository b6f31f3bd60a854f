/*!
 * Review workflow over a translated document.
 *
 * Issues stream in from the scanner and are buffered. A buffer is flushed
 * when it holds `flush_threshold` issues, when it holds an issue on the last
 * block, and when the scan ends. A flush groups the buffered issues, asks
 * for an improved translation of each group in one call, then publishes the
 * issues of the group one by one and waits for the reviewer's decision on
 * each. Once the scan is exhausted the decisions are applied to the document.
 */

use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::errors::VerificationError;
use crate::events::{EventSink, JobEvent};
use crate::subtitle_processor::SrtBlock;
use crate::translation::client::{RetranslationRequest, TranslatorClient};
use crate::verification::gate::{ApprovalGate, ApprovalRound};
use crate::verification::grouper::group_issues;
use crate::verification::issue::Issue;
use crate::verification::scanner::{ScanOptions, VerificationScanner};

/// Step name of re-translation progress events
pub const RETRANSLATION_STEP: &str = "retranslation";

/// Tuning of the review workflow
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOptions {
    pub scan: ScanOptions,
    /// Largest block-number distance inside one group
    pub group_gap: usize,
    /// Blocks shown before a block under review
    pub context_before: usize,
    /// Blocks shown after a block under review
    pub context_after: usize,
    /// Buffered issues that trigger a flush
    pub flush_threshold: usize,
    /// Pause after each re-translation call
    pub pacing_delay: Duration,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            group_gap: 2,
            context_before: 2,
            context_after: 2,
            flush_threshold: 3,
            pacing_delay: Duration::from_millis(1000),
        }
    }
}

/// Result of a review round
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationReport {
    /// Translated document with decisions applied, ascending by number
    pub blocks: Vec<SrtBlock>,
    /// Every issue that was put to the reviewer, with its final status
    pub decided: Vec<Issue>,
    /// Issues left undecided because their group got no re-translation
    pub unresolved: Vec<Issue>,
}

/// Runs review rounds
pub struct VerificationCoordinator {
    translator: Arc<dyn TranslatorClient>,
    events: Arc<dyn EventSink>,
    gate: ApprovalGate,
    options: VerificationOptions,
}

struct RoundState<'a> {
    job_id: &'a str,
    language: &'a str,
    blocks: &'a [SrtBlock],
    round: ApprovalRound,
    decided: Vec<Issue>,
    unresolved: Vec<Issue>,
}

impl VerificationCoordinator {
    pub fn new(
        translator: Arc<dyn TranslatorClient>,
        events: Arc<dyn EventSink>,
        gate: ApprovalGate,
        options: VerificationOptions,
    ) -> Self {
        Self { translator, events, gate, options }
    }

    /// Review `translated` against `original`
    ///
    /// Decisions are submitted through the gate under `job_id`. On failure
    /// an error event is emitted and the round is closed before returning.
    pub async fn run(
        &self,
        job_id: &str,
        original: &[SrtBlock],
        translated: &[SrtBlock],
        language: &str,
    ) -> Result<VerificationReport, VerificationError> {
        if translated.is_empty() {
            return Err(VerificationError::InvalidInput("translated document has no blocks".to_string()));
        }

        let mut blocks = translated.to_vec();
        blocks.sort_by_key(|block| block.number);

        let state = RoundState {
            job_id,
            language,
            blocks: &blocks,
            round: self.gate.open(job_id),
            decided: Vec::new(),
            unresolved: Vec::new(),
        };

        match self.review(state, original).await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Job {}: verification failed: {}", job_id, e);
                self.events.emit(JobEvent::VerificationError {
                    job_id: job_id.to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn review(&self, mut state: RoundState<'_>, original: &[SrtBlock]) -> Result<VerificationReport, VerificationError> {
        let scanner = VerificationScanner::new(
            Arc::clone(&self.translator),
            Arc::clone(&self.events),
            self.options.scan.clone(),
        );
        let mut stream = scanner.spawn(state.job_id, original, state.blocks, state.language);
        let last_block = state.blocks.last().map(|block| block.number);
        let mut buffer: Vec<Issue> = Vec::new();

        while let Some(item) = stream.next().await {
            let issue = item?;
            debug!("Job {}: issue on block {} ({} problem(s))", state.job_id, issue.block_number, issue.problem_types.len());
            self.events.emit(JobEvent::IssueFound {
                job_id: state.job_id.to_string(),
                issue: issue.clone(),
            });

            let on_last_block = Some(issue.block_number) == last_block;
            buffer.push(issue);
            if buffer.len() >= self.options.flush_threshold || on_last_block {
                self.flush(&mut state, std::mem::take(&mut buffer)).await?;
            }
        }
        if !buffer.is_empty() {
            self.flush(&mut state, buffer).await?;
        }

        let blocks = reconcile(state.blocks, &state.decided);
        info!(
            "Job {}: verification complete, {} decision(s) applied, {} issue(s) unresolved",
            state.job_id, state.decided.len(), state.unresolved.len()
        );
        Ok(VerificationReport {
            blocks,
            decided: state.decided,
            unresolved: state.unresolved,
        })
    }

    async fn flush(&self, state: &mut RoundState<'_>, issues: Vec<Issue>) -> Result<(), VerificationError> {
        let groups = group_issues(issues, self.options.group_gap);
        let total = groups.len();

        for (index, group) in groups.into_iter().enumerate() {
            let first = group[0].block_number;
            let last = group[group.len() - 1].block_number;
            self.events.emit(JobEvent::VerificationStatus {
                job_id: state.job_id.to_string(),
                step: RETRANSLATION_STEP.to_string(),
                description: format!("Retranslating blocks {}-{}", first, last),
                percentage: ((index + 1) * 100 / total) as u8,
            });
            self.process_group(state, group).await?;
        }
        Ok(())
    }

    async fn process_group(&self, state: &mut RoundState<'_>, group: Vec<Issue>) -> Result<(), VerificationError> {
        let first = group[0].block_number;
        let last = group[group.len() - 1].block_number;
        let (before, after) = surrounding_blocks(
            state.blocks,
            first,
            last,
            self.options.context_before,
            self.options.context_after,
        );

        let improved = self
            .translator
            .retranslate(&RetranslationRequest {
                issues: &group,
                context_before: &before,
                context_after: &after,
                language: state.language,
            })
            .await?;
        if !self.options.pacing_delay.is_zero() {
            tokio::time::sleep(self.options.pacing_delay).await;
        }

        if improved.is_empty() {
            warn!("Job {}: no improved translation for blocks {}-{}, leaving them unchanged", state.job_id, first, last);
            state.unresolved.extend(group);
            return Ok(());
        }

        for mut issue in group {
            issue.improved_translation = Some(
                improved
                    .get(&issue.block_number)
                    .cloned()
                    .unwrap_or_else(|| issue.current_translation.clone()),
            );
            let (context_before, context_after) = surrounding_blocks(
                state.blocks,
                issue.block_number,
                issue.block_number,
                self.options.context_before,
                self.options.context_after,
            );
            self.events.emit(JobEvent::ApprovalRequested {
                job_id: state.job_id.to_string(),
                issue: issue.clone(),
                context_before,
                context_after,
            });

            let decision = state.round.wait_for(issue.block_number).await?;
            issue.apply(&decision);
            let text = issue
                .final_text()
                .unwrap_or(issue.current_translation.as_str())
                .to_string();
            info!("Job {}: block {} {:?}", state.job_id, issue.block_number, issue.status);
            self.events.emit(JobEvent::DecisionApplied {
                job_id: state.job_id.to_string(),
                block_number: issue.block_number,
                status: issue.status,
                text,
            });
            state.decided.push(issue);
        }
        Ok(())
    }
}

/// Blocks around the span `first..=last`, by position in the sorted document
pub fn surrounding_blocks(
    blocks: &[SrtBlock],
    first: usize,
    last: usize,
    before: usize,
    after: usize,
) -> (Vec<SrtBlock>, Vec<SrtBlock>) {
    let start = blocks.partition_point(|block| block.number < first);
    let end = blocks.partition_point(|block| block.number <= last);
    let before_blocks = blocks[start.saturating_sub(before)..start].to_vec();
    let after_blocks = blocks[end..end.saturating_add(after).min(blocks.len())].to_vec();
    (before_blocks, after_blocks)
}

/// Apply decided issues to the document by block number
///
/// Blocks without a decided issue keep their text.
pub fn reconcile(blocks: &[SrtBlock], decided: &[Issue]) -> Vec<SrtBlock> {
    let finals: HashMap<usize, &str> = decided
        .iter()
        .filter_map(|issue| issue.final_text().map(|text| (issue.block_number, text)))
        .collect();

    blocks
        .iter()
        .map(|block| match finals.get(&block.number) {
            Some(text) => block.with_text(*text),
            None => block.clone(),
        })
        .collect()
}
