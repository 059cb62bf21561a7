mod converse;
mod extract;
mod prompts;

use std::collections::VecDeque;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub use converse::{request_finalize, request_plan};
pub use extract::extract_first_json;
pub use prompts::Prompts;

/// The hosted language model, reduced to one black-box call. Everything
/// downstream treats the reply as untrusted text.
pub trait Generator: Send + Sync {
    fn generate(
        &self,
        system_prompt: &str,
        user_payload: &Value,
        max_tokens: u32,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// OpenAI-style chat-completions client. Deliberately carries no request
/// timeout: a stalled model call stalls the request (known hardening gap,
/// see DESIGN.md).
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model_id: String,
}

impl HttpGenerator {
    pub fn new(endpoint: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model_id: model_id.into(),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

impl Generator for HttpGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_payload: &Value,
        max_tokens: u32,
    ) -> Result<String> {
        let body = json!({
            "model": self.model_id,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_payload.to_string() }
            ],
            "max_tokens": max_tokens,
            "temperature": 0.2,
            "top_p": 0.95,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("model call failed for {}", self.endpoint))?;

        if !response.status().is_success() {
            anyhow::bail!("model endpoint returned HTTP {}", response.status());
        }

        let payload: Value = response
            .json()
            .await
            .context("model reply was not valid JSON")?;

        let text = payload
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(text)
    }
}

/// Canned replies for tests and offline runs; an exhausted queue behaves
/// like an unreachable model so the degraded paths get exercised.
#[derive(Debug, Default)]
pub struct StaticGenerator {
    replies: Mutex<VecDeque<String>>,
}

impl StaticGenerator {
    pub fn offline() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

impl Generator for StaticGenerator {
    async fn generate(&self, _system: &str, _user: &Value, _max_tokens: u32) -> Result<String> {
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no model configured"))
    }
}

/// Concrete dispatch over the configured backends, mirroring how the
/// ledger-less test paths and the real model share one seam.
pub enum GeneratorKind {
    Http(HttpGenerator),
    Static(StaticGenerator),
}

impl GeneratorKind {
    pub fn model_id(&self) -> &str {
        match self {
            Self::Http(http) => http.model_id(),
            Self::Static(_) => "static",
        }
    }
}

impl Generator for GeneratorKind {
    async fn generate(
        &self,
        system_prompt: &str,
        user_payload: &Value,
        max_tokens: u32,
    ) -> Result<String> {
        match self {
            Self::Http(generator) => generator.generate(system_prompt, user_payload, max_tokens).await,
            Self::Static(generator) => {
                generator.generate(system_prompt, user_payload, max_tokens).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_generator_pops_replies_then_fails() {
        let generator = StaticGenerator::with_replies(vec!["one".to_string()]);
        let first = generator.generate("s", &json!({}), 10).await.unwrap();
        assert_eq!(first, "one");
        assert!(generator.generate("s", &json!({}), 10).await.is_err());
    }
}
