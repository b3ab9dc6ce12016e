use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::classifier::{Classifier, CompletionRequest};
use crate::model::{AnnotateCounts, AnnotatedComment, RawComment};
use crate::normalize::Normalizer;
use crate::store::{AnnotatedStore, collect_annotated_ids};

use super::debug::DebugCapture;
use super::error::AnnotateError;
use super::prompts::{
    CLASSIFY_SYSTEM_PROMPT, REPAIR_SYSTEM_PROMPT, build_classify_prompt, build_repair_prompt,
};
use super::response::{ModelAnnotation, ResponseError, parse_annotations};
use super::retry::{Pause, RetryError, RetryPolicy};

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrchestratorConfig {
    pub(crate) batch_size: usize,
    pub(crate) max_retries: u32,
    pub(crate) repair_enabled: bool,
    pub(crate) batch_pause: Duration,
    pub(crate) max_response_tokens: u32,
}

#[derive(Debug)]
pub(crate) struct RunOutcome {
    pub(crate) annotated: Vec<Value>,
    pub(crate) counts: AnnotateCounts,
    pub(crate) warnings: Vec<String>,
}

pub(crate) struct WorkPlan<'a> {
    pub(crate) remaining: Vec<&'a RawComment>,
    pub(crate) recognized_ids: usize,
}

pub(crate) fn plan_work<'a>(raw_comments: &'a [RawComment], annotated: &[Value]) -> WorkPlan<'a> {
    let annotated_ids = collect_annotated_ids(annotated);
    let mut queued = HashSet::<&str>::new();
    let remaining = raw_comments
        .iter()
        .filter(|comment| !comment.comment_id.is_empty())
        .filter(|comment| !annotated_ids.contains(&comment.comment_id))
        .filter(|comment| queued.insert(comment.comment_id.as_str()))
        .collect();

    WorkPlan {
        remaining,
        recognized_ids: annotated_ids.len(),
    }
}

pub(crate) struct Orchestrator<'a> {
    classifier: &'a dyn Classifier,
    normalizer: &'a Normalizer,
    store: &'a AnnotatedStore,
    debug: &'a DebugCapture,
    config: OrchestratorConfig,
}

impl<'a> Orchestrator<'a> {
    pub(crate) fn new(
        classifier: &'a dyn Classifier,
        normalizer: &'a Normalizer,
        store: &'a AnnotatedStore,
        debug: &'a DebugCapture,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            classifier,
            normalizer,
            store,
            debug,
            config,
        }
    }

    pub(crate) fn run(
        &self,
        raw_comments: &[RawComment],
        previously_annotated: Vec<Value>,
        pause: &mut dyn Pause,
    ) -> Result<RunOutcome> {
        let plan = plan_work(raw_comments, &previously_annotated);
        let batch_size = self.config.batch_size.max(1);
        let batches = plan.remaining.chunks(batch_size).collect::<Vec<_>>();

        let mut counts = AnnotateCounts {
            raw_total: raw_comments.len(),
            previously_annotated_rows: previously_annotated.len(),
            recognized_ids: plan.recognized_ids,
            remaining: plan.remaining.len(),
            batches_total: batches.len(),
            ..AnnotateCounts::default()
        };
        let mut warnings = Vec::<String>::new();
        let mut seen = collect_annotated_ids(&previously_annotated);
        let mut annotated = previously_annotated;

        info!(
            raw_total = counts.raw_total,
            annotated_rows = counts.previously_annotated_rows,
            recognized_ids = counts.recognized_ids,
            remaining = counts.remaining,
            batches = counts.batches_total,
            batch_size,
            "classification work planned"
        );

        for (index, batch) in batches.iter().enumerate() {
            if index > 0 {
                pause.pause(self.config.batch_pause);
            }

            match self.classify_with_retry(index, batch, pause) {
                Ok(items) => {
                    let merged = self.merge_batch(batch, items, &mut seen, &mut annotated)?;
                    counts.comments_added += merged.added;
                    counts.ids_discarded += merged.discarded;
                    counts.batches_succeeded += 1;

                    self.store.save(&annotated).with_context(|| {
                        format!("failed to persist annotations after batch {index}")
                    })?;
                    info!(
                        batch = index,
                        added = merged.added,
                        discarded = merged.discarded,
                        annotated_total = annotated.len(),
                        "batch classified and persisted"
                    );
                }
                Err(err @ AnnotateError::RetryBudgetExhausted { .. }) => {
                    counts.batches_skipped += 1;
                    warn!(batch = index, error = %err, "batch skipped; left for a future run");
                    warnings.push(format!("batch {index} skipped: {err}"));
                }
                Err(err @ AnnotateError::InvalidResponseFormat { .. }) => {
                    counts.batches_abandoned += 1;
                    warn!(batch = index, error = %err, "batch abandoned after malformed response");
                    warnings.push(format!("batch {index} abandoned: {err}"));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(RunOutcome {
            annotated,
            counts,
            warnings,
        })
    }

    fn classify_with_retry(
        &self,
        index: usize,
        batch: &[&RawComment],
        pause: &mut dyn Pause,
    ) -> Result<Vec<ModelAnnotation>, AnnotateError> {
        let policy = RetryPolicy::new(self.config.max_retries);
        policy
            .run(
                pause,
                |attempt| self.classify_batch(index, batch, attempt),
                AnnotateError::is_retryable,
            )
            .map_err(|err| match err {
                RetryError::Exhausted { attempts, last } => AnnotateError::RetryBudgetExhausted {
                    attempts,
                    last_error: last.to_string(),
                },
                RetryError::Fatal { attempt, error } => {
                    debug!(batch = index, attempt, error = %error, "batch failed without retry");
                    error
                }
            })
    }

    fn classify_batch(
        &self,
        index: usize,
        batch: &[&RawComment],
        attempt: u32,
    ) -> Result<Vec<ModelAnnotation>, AnnotateError> {
        let request = CompletionRequest {
            system: CLASSIFY_SYSTEM_PROMPT.to_string(),
            user: build_classify_prompt(batch),
            max_tokens: self.config.max_response_tokens,
        };
        debug!(batch = index, attempt, comments = batch.len(), "requesting classification");

        let raw_text = self.classifier.complete(&request)?;
        match parse_annotations(&raw_text) {
            Ok(items) => Ok(items),
            Err(parse_err) => self.recover(index, attempt, &raw_text, parse_err),
        }
    }

    fn recover(
        &self,
        index: usize,
        attempt: u32,
        raw_text: &str,
        parse_err: ResponseError,
    ) -> Result<Vec<ModelAnnotation>, AnnotateError> {
        let bad_prefix = format!("classifier_bad_json_attempt{attempt}");

        if !self.config.repair_enabled {
            let raw_capture = self.debug.capture(&bad_prefix, raw_text);
            return Err(AnnotateError::InvalidResponseFormat {
                reason: parse_err.to_string(),
                raw_capture,
                repair_capture: None,
            });
        }

        warn!(
            batch = index,
            attempt,
            error = %parse_err,
            "malformed classifier output; requesting repair"
        );
        let request = CompletionRequest {
            system: REPAIR_SYSTEM_PROMPT.to_string(),
            user: build_repair_prompt(raw_text),
            max_tokens: self.config.max_response_tokens,
        };

        let repaired = match self.classifier.complete(&request) {
            Ok(repaired) => repaired,
            Err(err) => {
                self.debug.capture(&bad_prefix, raw_text);
                return Err(err.into());
            }
        };

        match parse_annotations(&repaired) {
            Ok(items) => {
                info!(batch = index, attempt, items = items.len(), "repair pass recovered batch");
                Ok(items)
            }
            Err(repair_err) => {
                let raw_capture = self.debug.capture(&bad_prefix, raw_text);
                let detail = format!(
                    "original error: {parse_err}\nrepair error: {repair_err}\n\n\
                     repair response:\n{repaired}\n"
                );
                let repair_capture = self.debug.capture(
                    &format!("classifier_repair_failed_attempt{attempt}"),
                    &detail,
                );
                Err(AnnotateError::InvalidResponseFormat {
                    reason: format!("{parse_err}; repair also failed: {repair_err}"),
                    raw_capture,
                    repair_capture,
                })
            }
        }
    }

    fn merge_batch(
        &self,
        batch: &[&RawComment],
        items: Vec<ModelAnnotation>,
        seen: &mut HashSet<String>,
        annotated: &mut Vec<Value>,
    ) -> Result<MergeCounts> {
        let by_id = batch
            .iter()
            .map(|comment| (comment.comment_id.as_str(), *comment))
            .collect::<HashMap<_, _>>();
        let mut merged = MergeCounts::default();

        for item in items {
            let Some(original) = item.id().and_then(|id| by_id.get(id).copied()) else {
                merged.discarded += 1;
                continue;
            };
            if !seen.insert(original.comment_id.clone()) {
                merged.discarded += 1;
                continue;
            }

            let classification = self.normalizer.normalize(&item.into_payload());
            let record =
                serde_json::to_value(AnnotatedComment::new(original.clone(), classification))
                    .with_context(|| {
                        format!("failed to serialize annotation {}", original.comment_id)
                    })?;
            annotated.push(record);
            merged.added += 1;
        }

        Ok(merged)
    }
}

#[derive(Debug, Default)]
struct MergeCounts {
    added: usize,
    discarded: usize,
}
