use std::path::PathBuf;

use crate::classifier::ClassifierError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum AnnotateError {
    #[error("required configuration missing: {0}")]
    ConfigurationMissing(String),
    #[error(
        "invalid response format from classifier: {reason}{}",
        describe_captures(.raw_capture, .repair_capture)
    )]
    InvalidResponseFormat {
        reason: String,
        raw_capture: Option<PathBuf>,
        repair_capture: Option<PathBuf>,
    },
    #[error("retry budget exhausted after {attempts} attempts: {last_error}")]
    RetryBudgetExhausted { attempts: u32, last_error: String },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

fn describe_captures(raw: &Option<PathBuf>, repair: &Option<PathBuf>) -> String {
    let mut detail = String::new();
    if let Some(path) = raw {
        detail.push_str(&format!(" (raw output: {})", path.display()));
    }
    if let Some(path) = repair {
        detail.push_str(&format!(" (repair output: {})", path.display()));
    }
    detail
}

impl AnnotateError {
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(self, Self::Classifier(_))
    }
}
