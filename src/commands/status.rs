use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::locate;
use crate::config::PipelineConfig;
use crate::model::record_id;
use crate::util::read_json;

pub fn run(args: StatusArgs, config: &PipelineConfig) -> Result<()> {
    let config = locate(config, &args.location);
    let raw_path = config.raw_comments_path();
    let annotated_path = config.annotated_comments_path();
    let metrics_path = config.metrics_path();
    let manifest_dir = config.manifest_dir();

    info!(
        data_dir = %config.data_dir.display(),
        channel = %config.channel_slug(),
        "status requested"
    );

    let raw_ids = if raw_path.exists() {
        let rows: Vec<Value> = read_json(&raw_path)?;
        info!(path = %raw_path.display(), comments = rows.len(), "loaded raw comments");
        Some(ids_of(&rows))
    } else {
        warn!(path = %raw_path.display(), "raw comments missing");
        None
    };

    if annotated_path.exists() {
        match read_json::<Vec<Value>>(&annotated_path) {
            Ok(rows) => {
                let annotated = ids_of(&rows);
                let remaining = raw_ids
                    .as_ref()
                    .map(|raw| {
                        raw.iter()
                            .filter(|id| annotated.binary_search(id).is_err())
                            .count()
                    })
                    .unwrap_or(0);
                info!(
                    path = %annotated_path.display(),
                    rows = rows.len(),
                    annotated_ids = annotated.len(),
                    remaining,
                    "loaded annotated comments"
                );
            }
            Err(err) => {
                warn!(
                    path = %annotated_path.display(),
                    error = %err,
                    "annotated comments unreadable"
                );
            }
        }
    } else {
        warn!(path = %annotated_path.display(), "annotated comments missing");
    }

    if metrics_path.exists() {
        let document: Value = read_json(&metrics_path)?;
        let weeks = document
            .get("escalation")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        let focus = &document["focus_week"];
        info!(
            path = %metrics_path.display(),
            weeks,
            focus_week = %focus["week"].as_str().unwrap_or_default(),
            focus_status = %focus["status"].as_str().unwrap_or_default(),
            "loaded aggregated metrics"
        );
    } else {
        warn!(path = %metrics_path.display(), "aggregated metrics missing");
    }

    match newest_manifest(&manifest_dir)? {
        Some(path) => {
            let manifest: Value = read_json(&path)?;
            info!(
                path = %path.display(),
                run_id = %manifest["run_id"].as_str().unwrap_or_default(),
                status = %manifest["status"].as_str().unwrap_or("completed"),
                "latest run manifest"
            );
        }
        None => warn!(path = %manifest_dir.display(), "no run manifests found"),
    }

    Ok(())
}

fn ids_of(rows: &[Value]) -> Vec<String> {
    let mut ids = rows
        .iter()
        .filter_map(record_id)
        .map(str::to_string)
        .collect::<Vec<_>>();
    ids.sort();
    ids.dedup();
    ids
}

fn newest_manifest(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        return Ok(None);
    }

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if newest.as_ref().is_none_or(|(current, _)| modified > *current) {
            newest = Some((modified, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}
