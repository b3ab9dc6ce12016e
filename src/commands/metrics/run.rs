use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use tracing::info;

use crate::cli::MetricsArgs;
use crate::commands::locate;
use crate::config::PipelineConfig;
use crate::model::MetricsRunManifest;
use crate::normalize::Normalizer;
use crate::util::{
    ensure_directory, now_utc_string, read_json, sha256_file, utc_compact_string, write_json_pretty,
};

use super::engine::compute_metrics;
use super::input::annotated_from_records;
use super::types::MetricsOptions;

pub fn run(args: MetricsArgs, config: &PipelineConfig) -> Result<()> {
    let started_ts = Utc::now();
    let run_id = format!("metrics-{}", utc_compact_string(started_ts));
    let config = locate(config, &args.location);
    let options = options_from(&config, &args);

    let input_path = args
        .input
        .clone()
        .unwrap_or_else(|| config.annotated_comments_path());
    let output_path = args.output.clone().unwrap_or_else(|| config.metrics_path());
    let manifest_dir = config.manifest_dir();
    let manifest_path =
        manifest_dir.join(format!("metrics_run_{}.json", utc_compact_string(started_ts)));

    info!(
        run_id = %run_id,
        input = %input_path.display(),
        latest_weeks = options.latest_weeks,
        top_topics = options.top_topics,
        "starting metrics"
    );

    let records: Vec<Value> = read_json(&input_path)?;
    let normalizer = Normalizer::new()?;
    let comments = annotated_from_records(&records, &normalizer)?;
    let document = compute_metrics(&comments, &options)?;

    write_json_pretty(&output_path, &document)?;

    ensure_directory(&manifest_dir)?;
    let manifest = MetricsRunManifest {
        manifest_version: 1,
        run_id,
        generated_at: now_utc_string(),
        input_path: input_path.display().to_string(),
        input_sha256: sha256_file(&input_path)?,
        output_path: output_path.display().to_string(),
        latest_weeks: options.latest_weeks,
        top_topics: options.top_topics,
        min_focus_week_comments: options.min_focus_week_comments,
        comments_total: comments.len(),
        comments_in_window: document.sentiment_trend.iter().map(|row| row.count).sum(),
        weeks: document.escalation.iter().map(|row| row.week.label()).collect(),
        focus_week: document.focus_week.week.label(),
    };
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        output = %output_path.display(),
        manifest = %manifest_path.display(),
        weeks = manifest.weeks.len(),
        comments_in_window = manifest.comments_in_window,
        focus_week = %manifest.focus_week,
        status = ?document.focus_week.status,
        "metrics completed"
    );

    Ok(())
}

fn options_from(config: &PipelineConfig, args: &MetricsArgs) -> MetricsOptions {
    MetricsOptions {
        latest_weeks: args.latest_weeks.unwrap_or(config.metrics.latest_weeks),
        top_topics: args.top_topics.unwrap_or(config.metrics.top_topics),
        min_focus_week_comments: args
            .min_focus_week_comments
            .unwrap_or(config.metrics.min_focus_week_comments),
    }
}
