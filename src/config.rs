use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::util::slugify_channel;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_MAX_RESPONSE_TOKENS: u32 = 3500;
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_PAUSE_MS: u64 = 500;
pub const DEFAULT_LATEST_WEEKS: usize = 3;
pub const DEFAULT_TOP_TOPICS: usize = 5;
pub const DEFAULT_MIN_FOCUS_WEEK_COMMENTS: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    paths: PathsSection,
    #[serde(default)]
    classifier: ClassifierSection,
    #[serde(default)]
    annotate: AnnotateSection,
    #[serde(default)]
    metrics: MetricsSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathsSection {
    data_dir: Option<PathBuf>,
    channel: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ClassifierSection {
    model: Option<String>,
    api_base: Option<String>,
    api_key_env: Option<String>,
    max_response_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AnnotateSection {
    batch_size: Option<usize>,
    max_retries: Option<u32>,
    pause_ms: Option<u64>,
    repair_enabled: Option<bool>,
    limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetricsSection {
    latest_weeks: Option<usize>,
    top_topics: Option<usize>,
    min_focus_week_comments: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    pub model: Option<String>,
    pub api_base: String,
    pub api_key_env: String,
    pub max_response_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotateConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub pause_ms: u64,
    pub repair_enabled: bool,
    pub limit: Option<usize>,
}

impl AnnotateConfig {
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
    pub latest_weeks: usize,
    pub top_topics: usize,
    pub min_focus_week_comments: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,
    pub channel: String,
    pub classifier: ClassifierConfig,
    pub annotate: AnnotateConfig,
    pub metrics: MetricsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_file_config(FileConfig::default())
    }
}

impl PipelineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(content)?;
        Ok(Self::from_file_config(file))
    }

    fn from_file_config(file: FileConfig) -> Self {
        Self {
            data_dir: file
                .paths
                .data_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            channel: file.paths.channel.unwrap_or_default(),
            classifier: ClassifierConfig {
                model: file
                    .classifier
                    .model
                    .map(|model| model.trim().to_string())
                    .filter(|model| !model.is_empty()),
                api_base: file
                    .classifier
                    .api_base
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
                api_key_env: file
                    .classifier
                    .api_key_env
                    .unwrap_or_else(|| DEFAULT_API_KEY_ENV.to_string()),
                max_response_tokens: file
                    .classifier
                    .max_response_tokens
                    .unwrap_or(DEFAULT_MAX_RESPONSE_TOKENS),
            },
            annotate: AnnotateConfig {
                batch_size: file.annotate.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
                max_retries: file.annotate.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
                pause_ms: file.annotate.pause_ms.unwrap_or(DEFAULT_PAUSE_MS),
                repair_enabled: file.annotate.repair_enabled.unwrap_or(true),
                limit: file.annotate.limit,
            },
            metrics: MetricsConfig {
                latest_weeks: file.metrics.latest_weeks.unwrap_or(DEFAULT_LATEST_WEEKS),
                top_topics: file.metrics.top_topics.unwrap_or(DEFAULT_TOP_TOPICS),
                min_focus_week_comments: file
                    .metrics
                    .min_focus_week_comments
                    .unwrap_or(DEFAULT_MIN_FOCUS_WEEK_COMMENTS),
            },
        }
    }

    pub fn channel_slug(&self) -> String {
        slugify_channel(&self.channel)
    }

    pub fn raw_comments_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("raw_comments_{}.json", self.channel_slug()))
    }

    pub fn annotated_comments_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("annotated_comments_{}.json", self.channel_slug()))
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.data_dir
            .join(format!("aggregated_metrics_{}.json", self.channel_slug()))
    }

    pub fn debug_dir(&self) -> PathBuf {
        self.data_dir.join("debug_classifier")
    }

    pub fn manifest_dir(&self) -> PathBuf {
        self.data_dir.join("manifests")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_a_config_file() {
        let config = PipelineConfig::load(None).expect("default config should load");

        assert_eq!(config.classifier.model, None);
        assert_eq!(config.annotate.batch_size, 10);
        assert_eq!(config.annotate.max_retries, 2);
        assert_eq!(config.annotate.batch_pause(), Duration::from_millis(500));
        assert!(config.annotate.repair_enabled);
        assert_eq!(config.classifier.max_response_tokens, 3500);
        assert_eq!(config.metrics.latest_weeks, 3);
        assert_eq!(config.metrics.min_focus_week_comments, 50);
        assert_eq!(
            config.annotated_comments_path(),
            PathBuf::from("data/annotated_comments_channel.json")
        );
    }

    #[test]
    fn toml_values_override_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [paths]
            data_dir = "/tmp/signal"
            channel = "@MyChannel"

            [classifier]
            model = "  claude-test  "

            [annotate]
            batch_size = 25
            repair_enabled = false

            [metrics]
            latest_weeks = 0
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.classifier.model.as_deref(), Some("claude-test"));
        assert_eq!(config.annotate.batch_size, 25);
        assert!(!config.annotate.repair_enabled);
        assert_eq!(config.metrics.latest_weeks, 0);
        assert_eq!(
            config.raw_comments_path(),
            PathBuf::from("/tmp/signal/raw_comments_mychannel.json")
        );
    }

    #[test]
    fn blank_model_counts_as_missing() {
        let config = PipelineConfig::from_toml_str("[classifier]\nmodel = \"   \"\n")
            .expect("config should parse");
        assert_eq!(config.classifier.model, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_toml_str("[annotate]\nbatchsize = 3\n").is_err());
    }
}
