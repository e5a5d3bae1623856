use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::{
    error::{AnalysisError, Result},
    provider::{Dialect, EndpointConfig},
    schema::to_json_schema,
};

const ERROR_BODY_LIMIT: usize = 300;

/// A remote text-completion service that answers a prompt under an output schema.
///
/// `Ok(None)` means the endpoint answered but produced no text.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str, schema: &Value) -> Result<Option<String>>;
}

/// [`GenerativeModel`] over HTTP, speaking the dialect of the configured provider.
pub struct HttpModel {
    http: reqwest::Client,
    config: EndpointConfig,
}

impl HttpModel {
    /// The configured timeout bounds each whole request, connect through body.
    pub fn new(config: EndpointConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            config,
        })
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AnalysisError::Unauthorized {
                reason: format!(
                    "missing API key for {} (set {})",
                    self.config.provider.name(),
                    self.config.provider.config().env_vars.join(" or ")
                ),
            })
    }

    fn build_request(
        &self,
        api_key: &str,
        prompt: &str,
        schema: &Value,
    ) -> reqwest::RequestBuilder {
        match self.config.dialect() {
            Dialect::Gemini => {
                let url = format!(
                    "{}/models/{}:generateContent",
                    self.config.api_url.trim_end_matches('/'),
                    self.config.model
                );
                self.http
                    .post(url)
                    .header("Content-Type", "application/json")
                    .header("x-goog-api-key", api_key)
                    .json(&gemini_body(prompt, schema))
            }
            Dialect::OpenaiCompatible => self
                .http
                .post(&self.config.api_url)
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&openai_body(&self.config.model, prompt, schema)),
        }
    }
}

#[async_trait]
impl GenerativeModel for HttpModel {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str, schema: &Value) -> Result<Option<String>> {
        let api_key = self.api_key()?;

        let response = self.build_request(api_key, prompt, schema).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        if body.trim().is_empty() {
            return Ok(None);
        }

        let envelope: Value =
            serde_json::from_str(&body).map_err(|e| AnalysisError::MalformedJson {
                reason: format!("response envelope: {}", e),
            })?;

        Ok(match self.config.dialect() {
            Dialect::Gemini => gemini_text(&envelope),
            Dialect::OpenaiCompatible => openai_text(&envelope),
        })
    }
}

fn gemini_body(prompt: &str, schema: &Value) -> Value {
    json!({
        "contents": [
            {
                "role": "user",
                "parts": [{ "text": prompt }],
            },
        ],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": schema,
        },
    })
}

fn openai_body(model: &str, prompt: &str, schema: &Value) -> Value {
    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": prompt,
            },
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "video_concept_analysis",
                "strict": true,
                "schema": to_json_schema(schema),
            },
        },
    })
}

/// Concatenated text parts of the first candidate.
fn gemini_text(envelope: &Value) -> Option<String> {
    let parts = envelope["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|part| part["text"].as_str()).collect();
    (!text.is_empty()).then_some(text)
}

fn openai_text(envelope: &Value) -> Option<String> {
    envelope["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
}

fn classify_status(status: StatusCode, body: &str) -> AnalysisError {
    let snippet: String = body.chars().take(ERROR_BODY_LIMIT).collect();

    // Gemini reports a bad key as 400 INVALID_ARGUMENT rather than 401.
    let bad_key = status == StatusCode::BAD_REQUEST && body.contains("API_KEY_INVALID");

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN || bad_key {
        AnalysisError::Unauthorized { reason: snippet }
    } else {
        AnalysisError::NetworkError {
            status: Some(status.as_u16()),
            reason: snippet,
        }
    }
}
