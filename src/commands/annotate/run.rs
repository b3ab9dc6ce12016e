use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::classifier::AnthropicClassifier;
use crate::cli::AnnotateArgs;
use crate::commands::{locate, render_command};
use crate::config::PipelineConfig;
use crate::model::{AnnotatePaths, AnnotateRunManifest, AnnotateSettings, RawComment};
use crate::normalize::Normalizer;
use crate::store::AnnotatedStore;
use crate::util::{
    ensure_directory, now_utc_string, read_json, sha256_file, utc_compact_string, write_json_pretty,
};

use super::debug::DebugCapture;
use super::error::AnnotateError;
use super::orchestrator::{Orchestrator, OrchestratorConfig, plan_work};
use super::retry::ThreadPause;

pub fn run(args: AnnotateArgs, config: &PipelineConfig) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("annotate-{}", utc_compact_string(started_ts));
    let config = apply_overrides(locate(config, &args.location), &args);

    let input_path = args.input.clone().unwrap_or_else(|| config.raw_comments_path());
    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| config.annotated_comments_path());
    let debug_dir = args.debug_dir.clone().unwrap_or_else(|| config.debug_dir());
    let manifest_dir = config.manifest_dir();
    let manifest_path =
        manifest_dir.join(format!("annotate_run_{}.json", utc_compact_string(started_ts)));

    info!(
        run_id = %run_id,
        input = %input_path.display(),
        output = %output_path.display(),
        "starting annotate"
    );

    let model = if args.dry_run {
        config.classifier.model.clone().unwrap_or_default()
    } else {
        require_model(&config)?
    };

    let records: Vec<Value> = read_json(&input_path)?;
    let (mut comments, mut warnings) = decode_raw_comments(records);
    if comments.is_empty() {
        warn!(path = %input_path.display(), "no raw comments found; nothing to annotate");
        return Ok(());
    }
    if let Some(limit) = config.annotate.limit {
        comments.truncate(limit);
    }

    let store = AnnotatedStore::new(&output_path);
    let loaded = store.load()?;

    if args.dry_run {
        let plan = plan_work(&comments, &loaded.rows);
        info!(
            raw_total = comments.len(),
            annotated_rows = loaded.rows.len(),
            recognized_ids = plan.recognized_ids,
            remaining = plan.remaining.len(),
            batch_size = config.annotate.batch_size,
            "annotate dry-run complete"
        );
        return Ok(());
    }

    let api_key = require_api_key(&config)?;
    let classifier = AnthropicClassifier::new(&config.classifier.api_base, &model, &api_key)
        .context("failed to set up classifier client")?;
    let normalizer = Normalizer::new()?;
    let debug = DebugCapture::new(&debug_dir);
    let orchestrator = Orchestrator::new(
        &classifier,
        &normalizer,
        &store,
        &debug,
        OrchestratorConfig {
            batch_size: config.annotate.batch_size,
            max_retries: config.annotate.max_retries,
            repair_enabled: config.annotate.repair_enabled,
            batch_pause: config.annotate.batch_pause(),
            max_response_tokens: config.classifier.max_response_tokens,
        },
    );

    let outcome = orchestrator.run(&comments, loaded.rows, &mut ThreadPause)?;
    let mut counts = outcome.counts;
    counts.annotated_total = outcome.annotated.len();
    warnings.extend(outcome.warnings);

    let status = if counts.batches_skipped + counts.batches_abandoned > 0 {
        "completed_with_failed_batches"
    } else {
        "completed"
    };

    ensure_directory(&manifest_dir)?;
    let manifest = AnnotateRunManifest {
        manifest_version: 1,
        run_id,
        status: status.to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_command(),
        input_sha256: sha256_file(&input_path)?,
        settings: AnnotateSettings {
            model,
            api_base: config.classifier.api_base.clone(),
            batch_size: config.annotate.batch_size,
            max_retries: config.annotate.max_retries,
            pause_ms: config.annotate.pause_ms,
            repair_enabled: config.annotate.repair_enabled,
            max_response_tokens: config.classifier.max_response_tokens,
            limit: config.annotate.limit,
        },
        paths: AnnotatePaths {
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            debug_dir: debug_dir.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: counts.clone(),
        quarantined_output: loaded
            .quarantined
            .as_ref()
            .map(|path| path.display().to_string()),
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(path = %manifest_path.display(), "wrote annotate run manifest");
    info!(
        status,
        added = counts.comments_added,
        skipped = counts.batches_skipped,
        abandoned = counts.batches_abandoned,
        annotated_total = counts.annotated_total,
        "annotate completed"
    );

    Ok(())
}

fn decode_raw_comments(records: Vec<Value>) -> (Vec<RawComment>, Vec<String>) {
    let mut comments = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();

    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<RawComment>(record) {
            Ok(comment) => comments.push(comment),
            Err(err) => {
                warn!(record = index, error = %err, "skipping unreadable raw comment");
                warnings.push(format!("raw record {index} skipped: {err}"));
            }
        }
    }

    (comments, warnings)
}

fn apply_overrides(mut config: PipelineConfig, args: &AnnotateArgs) -> PipelineConfig {
    if let Some(model) = args.model.as_deref().map(str::trim).filter(|model| !model.is_empty()) {
        config.classifier.model = Some(model.to_string());
    }
    if let Some(api_base) = &args.api_base {
        config.classifier.api_base = api_base.clone();
    }
    if let Some(tokens) = args.max_response_tokens {
        config.classifier.max_response_tokens = tokens;
    }
    if let Some(batch_size) = args.batch_size {
        config.annotate.batch_size = batch_size;
    }
    if let Some(max_retries) = args.max_retries {
        config.annotate.max_retries = max_retries;
    }
    if let Some(pause_ms) = args.pause_ms {
        config.annotate.pause_ms = pause_ms;
    }
    if args.no_repair {
        config.annotate.repair_enabled = false;
    }
    if args.limit.is_some() {
        config.annotate.limit = args.limit;
    }
    config.annotate.batch_size = config.annotate.batch_size.max(1);
    config
}

fn require_model(config: &PipelineConfig) -> Result<String, AnnotateError> {
    config
        .classifier
        .model
        .clone()
        .ok_or_else(|| {
            AnnotateError::ConfigurationMissing("classifier model identifier".to_string())
        })
}

fn require_api_key(config: &PipelineConfig) -> Result<String, AnnotateError> {
    std::env::var(&config.classifier.api_key_env)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            AnnotateError::ConfigurationMissing(format!(
                "classifier API key (env {})",
                config.classifier.api_key_env
            ))
        })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn missing_model_fails_before_any_work() {
        let config = PipelineConfig::default();
        let err = require_model(&config).expect_err("model is required");
        assert!(matches!(err, AnnotateError::ConfigurationMissing(_)));
    }

    #[test]
    fn run_rejects_missing_model_without_reading_input() {
        let args = AnnotateArgs {
            input: Some(PathBuf::from("/definitely/not/here.json")),
            ..AnnotateArgs::default()
        };
        let err = run(args, &PipelineConfig::default()).expect_err("run should fail fast");
        assert!(err.to_string().contains("required configuration missing"));
    }

    #[test]
    fn loosely_typed_raw_records_are_kept_and_garbage_is_skipped() {
        let records = vec![
            serde_json::json!({"comment_id": "a", "text": null, "published_at": "2024-03-04"}),
            serde_json::json!({"comment_id": "b", "text": "nice", "like_count": "12"}),
            serde_json::json!("not a record"),
        ];

        let (comments, warnings) = decode_raw_comments(records);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "");
        assert_eq!(comments[1].like_count, Some(12));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].starts_with("raw record 2 skipped"));
    }

    #[test]
    fn dry_run_reads_raw_document_with_loose_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("raw.json");
        let records = serde_json::json!([
            {"comment_id": "a", "text": null, "published_at": "2024-03-04T10:00:00Z"},
            {"comment_id": "b", "text": "ok", "like_count": "12"}
        ]);
        write_json_pretty(&input, &records).expect("seed raw comments");

        let args = AnnotateArgs {
            input: Some(input),
            output: Some(dir.path().join("annotated.json")),
            dry_run: true,
            ..AnnotateArgs::default()
        };
        run(args, &PipelineConfig::default()).expect("dry run should read the document");
    }

    #[test]
    fn cli_overrides_take_precedence_over_file_values() {
        let args = AnnotateArgs {
            model: Some(" claude-cli ".to_string()),
            batch_size: Some(0),
            no_repair: true,
            limit: Some(20),
            ..AnnotateArgs::default()
        };

        let config = apply_overrides(PipelineConfig::default(), &args);
        assert_eq!(config.classifier.model.as_deref(), Some("claude-cli"));
        assert_eq!(config.annotate.batch_size, 1);
        assert!(!config.annotate.repair_enabled);
        assert_eq!(config.annotate.limit, Some(20));
        assert_eq!(config.annotate.max_retries, 2);
    }
}
