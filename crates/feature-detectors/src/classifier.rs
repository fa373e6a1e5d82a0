//! Bounded external text-classification fallback.
//!
//! The classifier is an optional collaborator behind a strict output
//! contract. Any transport or contract violation is an error the detectors
//! degrade on; nothing here ever panics or blocks unboundedly.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("classifier transport failed: {0}")]
    Http(String),
    #[error("classifier response violated the output contract: {0}")]
    Contract(String),
}

/// Contract the external classifier must return.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifierVerdict {
    pub present: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

/// Text-classification port consumed by the detector fallback path.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<ClassifierVerdict, ClassifyError>;
}

/// Connection settings for the OpenAI-compatible chat endpoint.
#[derive(Clone, Debug)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_ms: u64,
}

impl ClassifierConfig {
    /// Resolve from the environment. `None` (unset endpoint) means the
    /// fallback path is skipped entirely.
    pub fn from_env() -> Option<Self> {
        let endpoint = env::var("FUNNELPROBE_CLASSIFIER_URL").ok()?;
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return None;
        }
        Some(Self {
            endpoint,
            api_key: env::var("FUNNELPROBE_CLASSIFIER_KEY").ok(),
            model: env::var("FUNNELPROBE_CLASSIFIER_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            timeout_ms: 12_000,
        })
    }
}

const SYSTEM_CONTRACT: &str = "You classify e-commerce page content. Respond with a single JSON \
object and nothing else: {\"present\": boolean, \"confidence\": number between 0 and 1, \
\"evidence\": array of up to 3 short literal quotes from the content}. If the feature is absent, \
use present=false with empty evidence.";

/// Classifier over an OpenAI-compatible `chat/completions` endpoint.
pub struct HttpClassifier {
    cfg: ClassifierConfig,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(cfg: ClassifierConfig) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|err| ClassifyError::Http(err.to_string()))?;
        Ok(Self { cfg, client })
    }
}

#[async_trait]
impl TextClassifier for HttpClassifier {
    async fn classify(&self, prompt: &str) -> Result<ClassifierVerdict, ClassifyError> {
        let body = json!({
            "model": self.cfg.model,
            "temperature": 0,
            "max_tokens": 300,
            "messages": [
                { "role": "system", "content": SYSTEM_CONTRACT },
                { "role": "user", "content": prompt },
            ],
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.cfg.endpoint))
            .json(&body);
        if let Some(key) = &self.cfg.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|err| ClassifyError::Http(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifyError::Http(format!("status {status}")));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|err| ClassifyError::Http(err.to_string()))?;
        let content = payload
            .get("choices")
            .and_then(|choices| choices.get(0))
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(|content| content.as_str())
            .ok_or_else(|| ClassifyError::Contract("missing message content".to_string()))?;

        debug!(target: "feature-detectors", chars = content.len(), "classifier responded");
        parse_verdict(content)
    }
}

/// Parse the model's reply into a verdict, tolerating markdown code fences.
pub fn parse_verdict(content: &str) -> Result<ClassifierVerdict, ClassifyError> {
    let trimmed = content.trim();
    let stripped = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(stripped).map_err(|err| ClassifyError::Contract(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_bare_json_verdict() {
        let verdict =
            parse_verdict(r#"{"present": true, "confidence": 0.8, "evidence": ["you may also like"]}"#)
                .unwrap();
        assert!(verdict.present);
        assert_eq!(verdict.evidence.len(), 1);
    }

    #[test]
    fn parses_a_fenced_verdict() {
        let fenced = "```json\n{\"present\": false, \"confidence\": 0.1, \"evidence\": []}\n```";
        let verdict = parse_verdict(fenced).unwrap();
        assert!(!verdict.present);
    }

    #[test]
    fn missing_fields_default_instead_of_failing() {
        let verdict = parse_verdict(r#"{"present": true}"#).unwrap();
        assert!(verdict.present);
        assert_eq!(verdict.confidence, 0.0);
        assert!(verdict.evidence.is_empty());
    }

    #[test]
    fn prose_violates_the_contract() {
        let err = parse_verdict("The page probably has an upsell module.").unwrap_err();
        assert!(matches!(err, ClassifyError::Contract(_)));
    }
}
