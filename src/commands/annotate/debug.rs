use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use crate::util::ensure_directory;

#[derive(Debug, Clone)]
pub(crate) struct DebugCapture {
    dir: PathBuf,
}

impl DebugCapture {
    pub(crate) fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub(crate) fn capture(&self, prefix: &str, text: &str) -> Option<PathBuf> {
        match self.write(prefix, text) {
            Ok(path) => {
                info!(path = %path.display(), "captured classifier debug artifact");
                Some(path)
            }
            Err(err) => {
                warn!(prefix, error = %err, "failed to capture classifier debug artifact");
                None
            }
        }
    }

    fn write(&self, prefix: &str, text: &str) -> Result<PathBuf> {
        ensure_directory(&self.dir)?;

        let ts = Utc::now().timestamp();
        let mut path = self.dir.join(format!("{prefix}_{ts}.txt"));
        let mut counter = 1;
        while path.exists() {
            path = self.dir.join(format!("{prefix}_{ts}_{counter}.txt"));
            counter += 1;
        }

        fs::write(&path, text)
            .with_context(|| format!("failed to write debug artifact: {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_never_overwrites_existing_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let capture = DebugCapture::new(dir.path().join("debug"));

        let first = capture.capture("bad_json", "one").expect("first capture");
        let second = capture.capture("bad_json", "two").expect("second capture");

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(first).expect("first readable"), "one");
        assert_eq!(fs::read_to_string(second).expect("second readable"), "two");
    }
}
