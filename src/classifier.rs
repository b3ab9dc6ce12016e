use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to build classifier client: {0}")]
    Setup(String),
    #[error("classifier request failed: {0}")]
    Transport(String),
    #[error("classifier API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("classifier response had no text content")]
    EmptyResponse,
}

pub trait Classifier {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError>;
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Unsupported,
}

pub struct AnthropicClassifier {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl AnthropicClassifier {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Result<Self, ClassifierError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ClassifierError::Setup(err.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn headers(&self) -> Result<HeaderMap, ClassifierError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|err| ClassifierError::Setup(format!("invalid api key header: {err}")))?,
        );
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl Classifier for AnthropicClassifier {
    fn complete(&self, request: &CompletionRequest) -> Result<String, ClassifierError> {
        let url = format!("{}/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: 0.0,
            system: &request.system,
            messages: vec![WireMessage {
                role: "user",
                content: &request.user,
            }],
        };

        debug!(model = %self.model, prompt_chars = request.user.len(), "classifier request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .map_err(|err| ClassifierError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: MessagesResponse = response
            .json()
            .map_err(|err| ClassifierError::Transport(format!("undecodable response: {err}")))?;

        let text = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Unsupported => None,
            })
            .ok_or(ClassifierError::EmptyResponse)?;

        Ok(text.trim().to_string())
    }
}
