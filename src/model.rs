use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const CLASSIFICATION_FIELDS: [&str; 4] =
    ["sentiment", "intent", "emotion_intensity", "key_topics"];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Self::Positive, Self::Neutral, Self::Negative];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.as_str() == value)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Praise,
    Question,
    ConstructiveCriticism,
    AggressiveCriticism,
    Discussion,
    Other,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Self::Praise,
        Self::Question,
        Self::ConstructiveCriticism,
        Self::AggressiveCriticism,
        Self::Discussion,
        Self::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Praise => "praise",
            Self::Question => "question",
            Self::ConstructiveCriticism => "constructive_criticism",
            Self::AggressiveCriticism => "aggressive_criticism",
            Self::Discussion => "discussion",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|item| item.as_str() == value)
    }

    pub fn group(self) -> IntentGroup {
        match self {
            Self::Praise => IntentGroup::Supportive,
            Self::Question | Self::Discussion => IntentGroup::Neutral,
            Self::ConstructiveCriticism | Self::AggressiveCriticism => IntentGroup::Critical,
            Self::Other => IntentGroup::Other,
        }
    }

    pub fn is_critical(self) -> bool {
        self.group() == IntentGroup::Critical
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentGroup {
    Supportive,
    Neutral,
    Critical,
    Other,
}

impl IntentGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supportive => "supportive",
            Self::Neutral => "neutral",
            Self::Critical => "critical",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub sentiment: Sentiment,
    pub intent: Intent,
    pub emotion_intensity: f64,
    pub key_topics: Vec<String>,
}

impl Default for Classification {
    fn default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            intent: Intent::Other,
            emotion_intensity: 0.0,
            key_topics: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawComment {
    #[serde(default, deserialize_with = "lenient_string")]
    pub comment_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub published_at: String,
    #[serde(default, deserialize_with = "lenient_count")]
    pub like_count: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_id: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_optional_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub video_title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn scalar_string(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(scalar_string(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_optional_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(scalar_string(Value::deserialize(deserializer)?))
}

fn lenient_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|count| count.is_finite())
                .map(|count| count as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedComment {
    #[serde(flatten)]
    pub comment: RawComment,
    #[serde(flatten)]
    pub classification: Classification,
}

impl AnnotatedComment {
    pub fn new(comment: RawComment, classification: Classification) -> Self {
        Self {
            comment,
            classification,
        }
    }

    pub fn id(&self) -> &str {
        &self.comment.comment_id
    }
}

/// Strips classification keys so the remaining fields can be read back as a
/// `RawComment`. Legacy rows that carry `id` instead of `comment_id` are
/// re-keyed.
pub fn raw_fields_of(record: &Value) -> Option<Map<String, Value>> {
    let mut fields = record.as_object()?.clone();
    for key in CLASSIFICATION_FIELDS {
        fields.remove(key);
    }

    let has_comment_id = fields
        .get("comment_id")
        .and_then(Value::as_str)
        .is_some_and(|value| !value.is_empty());
    if !has_comment_id {
        if let Some(Value::String(legacy)) = fields.remove("id") {
            fields.insert("comment_id".to_string(), Value::String(legacy));
        }
    }

    Some(fields)
}

pub fn record_id(record: &Value) -> Option<&str> {
    let object = record.as_object()?;
    object
        .get("comment_id")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            object
                .get("id")
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
        })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatePaths {
    pub input_path: String,
    pub output_path: String,
    pub debug_dir: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotateCounts {
    pub raw_total: usize,
    pub previously_annotated_rows: usize,
    pub recognized_ids: usize,
    pub remaining: usize,
    pub batches_total: usize,
    pub batches_succeeded: usize,
    pub batches_skipped: usize,
    pub batches_abandoned: usize,
    pub comments_added: usize,
    pub ids_discarded: usize,
    pub annotated_total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateSettings {
    pub model: String,
    pub api_base: String,
    pub batch_size: usize,
    pub max_retries: u32,
    pub pause_ms: u64,
    pub repair_enabled: bool,
    pub max_response_tokens: u32,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub input_sha256: String,
    pub settings: AnnotateSettings,
    pub paths: AnnotatePaths,
    pub counts: AnnotateCounts,
    pub quarantined_output: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub generated_at: String,
    pub input_path: String,
    pub input_sha256: String,
    pub output_path: String,
    pub latest_weeks: usize,
    pub top_topics: usize,
    pub min_focus_week_comments: usize,
    pub comments_total: usize,
    pub comments_in_window: usize,
    pub weeks: Vec<String>,
    pub focus_week: String,
}
