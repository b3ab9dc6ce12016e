use std::collections::HashSet;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;

use crate::model::{Classification, Intent, Sentiment};

pub const MAX_TOPICS: usize = 3;

#[derive(Debug, Clone)]
pub struct Normalizer {
    topic_separator: Regex,
    topic_disallowed: Regex,
    topic_underscore_run: Regex,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            topic_separator: Regex::new(r"[ \-]")
                .context("failed to compile topic separator regex")?,
            topic_disallowed: Regex::new(r"[^\p{Alphabetic}\p{Nd}\p{Nl}\p{No}_]")
                .context("failed to compile topic character regex")?,
            topic_underscore_run: Regex::new(r"_{2,}")
                .context("failed to compile topic underscore regex")?,
        })
    }

    pub fn normalize(&self, raw: &Value) -> Classification {
        let sentiment = label_of(raw.get("sentiment"))
            .as_deref()
            .and_then(Sentiment::parse)
            .unwrap_or(Sentiment::Neutral);
        let intent = label_of(raw.get("intent"))
            .as_deref()
            .and_then(Intent::parse)
            .unwrap_or(Intent::Other);

        Classification {
            sentiment,
            intent,
            emotion_intensity: emotion_of(raw.get("emotion_intensity")),
            key_topics: self.topics_of(raw.get("key_topics")),
        }
    }

    pub fn normalize_topic(&self, topic: &str) -> String {
        let lowered = topic.trim().to_lowercase();
        let separated = self.topic_separator.replace_all(&lowered, "_");
        let kept = self.topic_disallowed.replace_all(&separated, "");
        let collapsed = self.topic_underscore_run.replace_all(&kept, "_");
        collapsed.trim_matches('_').to_string()
    }

    fn topics_of(&self, value: Option<&Value>) -> Vec<String> {
        let Some(Value::Array(items)) = value else {
            return Vec::new();
        };

        let mut seen = HashSet::<String>::new();
        let mut topics = Vec::with_capacity(MAX_TOPICS);
        for item in items {
            let Some(text) = scalar_text(item) else {
                continue;
            };
            let topic = self.normalize_topic(&text);
            if topic.is_empty() || !seen.insert(topic.clone()) {
                continue;
            }
            topics.push(topic);
            if topics.len() == MAX_TOPICS {
                break;
            }
        }

        topics
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn label_of(value: Option<&Value>) -> Option<String> {
    scalar_text(value?).map(|text| text.trim().to_lowercase())
}

fn emotion_of(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Bool(flag)) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    };

    match parsed {
        Some(number) if !number.is_nan() => number.clamp(0.0, 1.0),
        _ => 0.0,
    }
}
