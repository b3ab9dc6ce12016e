use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use crate::model::record_id;
use crate::util::{local_compact_string, write_json_pretty};

#[derive(Debug, Default)]
pub struct LoadedAnnotations {
    pub rows: Vec<Value>,
    pub quarantined: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AnnotatedStore {
    path: PathBuf,
}

impl AnnotatedStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<LoadedAnnotations> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(LoadedAnnotations::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", self.path.display()));
            }
        };

        match serde_json::from_slice::<Vec<Value>>(&raw) {
            Ok(rows) => Ok(LoadedAnnotations {
                rows,
                quarantined: None,
            }),
            Err(err) => {
                let backup = self.quarantine_path();
                fs::rename(&self.path, &backup).with_context(|| {
                    format!(
                        "failed to move corrupt {} to {}",
                        self.path.display(),
                        backup.display()
                    )
                })?;
                warn!(
                    path = %self.path.display(),
                    backup = %backup.display(),
                    error = %err,
                    "annotated document failed to parse; moved aside and starting fresh"
                );
                Ok(LoadedAnnotations {
                    rows: Vec::new(),
                    quarantined: Some(backup),
                })
            }
        }
    }

    pub fn save(&self, rows: &[Value]) -> Result<()> {
        write_json_pretty(&self.path, &rows)
    }

    fn quarantine_path(&self) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("annotated");
        let mut candidate = self
            .path
            .with_file_name(format!("{stem}.corrupt_{}.json", local_compact_string()));
        let mut counter = 1;
        while candidate.exists() {
            candidate = self.path.with_file_name(format!(
                "{stem}.corrupt_{}_{counter}.json",
                local_compact_string()
            ));
            counter += 1;
        }
        candidate
    }
}

pub fn collect_annotated_ids(rows: &[Value]) -> HashSet<String> {
    rows.iter()
        .filter_map(record_id)
        .map(ToOwned::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn load_returns_empty_set_when_file_is_missing() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = AnnotatedStore::new(dir.path().join("annotated.json"));

        let loaded = store.load().expect("missing file should load as empty");
        assert!(loaded.rows.is_empty());
        assert!(loaded.quarantined.is_none());
    }

    #[test]
    fn corrupt_document_is_moved_aside_not_overwritten() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("annotated_comments_x.json");
        fs::write(&path, "[{\"comment_id\": \"a\"").expect("fixture should be written");
        let store = AnnotatedStore::new(&path);

        let loaded = store.load().expect("corrupt file should be quarantined");
        assert!(loaded.rows.is_empty());

        let backup = loaded.quarantined.expect("backup path should be reported");
        assert!(!path.exists());
        assert!(
            backup
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("annotated_comments_x.corrupt_"))
        );
        let preserved = fs::read_to_string(&backup).expect("backup should be readable");
        assert_eq!(preserved, "[{\"comment_id\": \"a\"");
    }

    #[test]
    fn save_then_load_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store = AnnotatedStore::new(dir.path().join("annotated.json"));
        let rows = vec![json!({"comment_id": "a", "sentiment": "neutral"})];

        store.save(&rows).expect("save should succeed");
        let loaded = store.load().expect("load should succeed");
        assert_eq!(loaded.rows, rows);
    }

    #[test]
    fn collect_annotated_ids_accepts_legacy_id_field() {
        let rows = vec![
            json!({"comment_id": "a"}),
            json!({"id": "b"}),
            json!({"comment_id": "", "id": "c"}),
            json!({"id": 7}),
            json!("not an object"),
        ];

        let ids = collect_annotated_ids(&rows);
        let mut sorted = ids.into_iter().collect::<Vec<_>>();
        sorted.sort();
        assert_eq!(sorted, vec!["a", "b", "c"]);
    }
}
