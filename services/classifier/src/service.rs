//! The external classification service: the trait the client retries against
//! and its HTTP implementation for an OpenAI-compatible chat endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use openai::chat::{ChatCompletionMessage, ChatCompletionMessageRole};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shared::config::ClassifierConfig;
use tracing::{debug, error, info};

use crate::error::ServiceError;
use crate::prompt;

#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Sends a complete prompt and returns the raw answer text.
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatCompletionMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug)]
pub struct OpenAiService {
    http: Client,
    endpoint: String,
    model: String,
    /// `None` when no key is configured; every call then fails as `Auth`.
    api_key: Option<String>,
}

static SHARED: OnceCell<Arc<OpenAiService>> = OnceCell::new();

impl OpenAiService {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ServiceError::Transient(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: Some(config.api_key.trim())
                .filter(|k| !k.is_empty())
                .map(str::to_string),
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    /// The process-wide handle. The first successful call builds it; later
    /// calls return the same instance whatever config they pass.
    pub fn shared(config: &ClassifierConfig) -> Result<Arc<Self>, ServiceError> {
        SHARED
            .get_or_try_init(|| {
                let service = Self::new(config)?;
                info!(endpoint = %service.endpoint, model = %service.model, "classification service initialised");
                Ok(Arc::new(service))
            })
            .map(Arc::clone)
    }
}

fn message(role: ChatCompletionMessageRole, text: &str) -> ChatCompletionMessage {
    ChatCompletionMessage {
        role,
        content: Some(text.to_string()),
        ..Default::default()
    }
}

fn map_status(status: StatusCode) -> ServiceError {
    let detail = format!("http {}", status.as_u16());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Auth(detail),
        StatusCode::BAD_REQUEST | StatusCode::NOT_FOUND | StatusCode::UNPROCESSABLE_ENTITY => {
            ServiceError::Rejected(detail)
        }
        StatusCode::TOO_MANY_REQUESTS => ServiceError::Quota(detail),
        _ => ServiceError::Transient(detail),
    }
}

fn map_transport(e: reqwest::Error) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout
    } else {
        ServiceError::Transient(e.to_string())
    }
}

#[async_trait]
impl ClassificationService for OpenAiService {
    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(ServiceError::Auth("no API key configured".into()));
        };
        let messages = [message(ChatCompletionMessageRole::User, prompt)];
        let req = ChatRequest {
            model: &self.model,
            messages: &messages,
            temperature: prompt::TEMPERATURE,
        };
        debug!(model = %self.model, chars = prompt.len(), "→ classification request");
        let res = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&req)
            .send()
            .await
            .map_err(map_transport)?;

        let status = res.status();
        let bytes = res.bytes().await.map_err(map_transport)?;
        if !status.is_success() {
            let err = map_status(status);
            error!(
                %status,
                body = %String::from_utf8_lossy(&bytes[..bytes.len().min(512)]),
                "classification service returned an error"
            );
            return Err(err);
        }

        let chat: ChatResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::Transient(format!("undecodable response: {e}")))?;
        let answer = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(ServiceError::Empty);
        }
        debug!(chars = answer.len(), "← classification answer");
        Ok(answer)
    }
}
