// src/oracle.rs

use crate::config::{LlmBackend, LlmSection};
use crate::contract::{self, RawExtractionResult};
use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Produces a `RawExtractionResult` from raw document text.
///
/// The concrete mechanism (model-backed, rule-based, hybrid) is swappable;
/// the flattener and record assembly only ever see this trait.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract(&self, document: &str, text: &str) -> Result<RawExtractionResult>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Truncate very long documents to stay within model context limits.
const MAX_PROMPT_CHARS: usize = 12_000;

/// Chat-completions client for the extraction oracle.
///
/// One long-lived handle, constructed once at startup; a failed construction
/// or health check is `OracleUnavailable` rather than a crash.
pub struct LlmOracle {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl LlmOracle {
    pub async fn connect(llm: &LlmSection) -> Result<Self> {
        let (endpoint, api_key) = match llm.backend {
            LlmBackend::Ollama => {
                // required by the API but ignored by Ollama
                (llm.ollama.clone(), "ollama".to_string())
            }
            LlmBackend::Remote => {
                let key = std::env::var("LLM_API_KEY").map_err(|_| {
                    PipelineError::OracleUnavailable(
                        "LLM_API_KEY env var required for the remote backend".to_string(),
                    )
                })?;
                (llm.remote.clone(), key)
            }
        };

        let client = Client::new();

        if llm.backend == LlmBackend::Ollama && !ollama_reachable(&client, &endpoint.base_url).await
        {
            return Err(PipelineError::OracleUnavailable(format!(
                "Ollama is not running at {} — start it with: ollama serve",
                endpoint.base_url
            )));
        }

        info!(
            backend = ?llm.backend,
            url = %endpoint.base_url,
            model = %endpoint.model,
            "Extraction oracle ready"
        );

        Ok(Self {
            client,
            base_url: endpoint.base_url,
            model: endpoint.model,
            api_key,
        })
    }
}

#[async_trait]
impl ExtractionOracle for LlmOracle {
    async fn extract(&self, document: &str, text: &str) -> Result<RawExtractionResult> {
        let text = truncate_chars(text, MAX_PROMPT_CHARS);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: contract::EXTRACTION_RULES.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: format!("DOCUMENT TEXT:\n\n{text}"),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::OracleViolation {
                document: document.to_string(),
                reason: format!("LLM API error {status}: {body}"),
            });
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| PipelineError::OracleViolation {
                document: document.to_string(),
                reason: "empty response from LLM".to_string(),
            })?;

        parse_oracle_content(document, content)
    }
}

/// Reduce raw model output to the contract shape, rejecting anything that
/// does not parse into it.
pub fn parse_oracle_content(document: &str, content: &str) -> Result<RawExtractionResult> {
    // Strip markdown fences if the model added them despite instructions
    let json_str = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    // Some models prepend reasoning text; keep only the outermost JSON object.
    let json_str =
        extract_json_object(json_str).ok_or_else(|| PipelineError::OracleViolation {
            document: document.to_string(),
            reason: "no JSON object in LLM response".to_string(),
        })?;

    contract::parse_raw_extraction(json_str).map_err(|e| PipelineError::OracleViolation {
        document: document.to_string(),
        reason: format!("response does not match the extraction schema: {e}"),
    })
}

/// Outermost `{...}` of a string that may carry surrounding chatter.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Check that the Ollama server is reachable before committing to a batch.
async fn ollama_reachable(client: &Client, base_url: &str) -> bool {
    // Ollama's health endpoint is at the root (not under /v1)
    let health_url = base_url.trim_end_matches("/v1").trim_end_matches("/v1/");

    match client
        .get(health_url)
        .timeout(std::time::Duration::from_secs(3))
        .send()
        .await
    {
        Ok(resp) => {
            if resp.status().is_success() {
                true
            } else {
                warn!(status = %resp.status(), "Ollama server returned non-OK status");
                false
            }
        }
        Err(e) => {
            warn!(error = %e, "Ollama server not reachable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_json_from_fenced_output() {
        let content = "```json\n{\"invoices\": []}\n```";
        let raw = parse_oracle_content("doc.pdf", content).unwrap();
        assert!(raw.invoices.is_empty());
    }

    #[test]
    fn recovers_json_from_chatty_output() {
        let content = "Sure, here is the extraction:\n{\"shipping_bill_header\": {\"SB NO.\": \"77\"}}\nLet me know if you need more.";
        let raw = parse_oracle_content("doc.pdf", content).unwrap();
        assert_eq!(raw.header.sb_no.as_deref(), Some("77"));
    }

    #[test]
    fn rejects_non_json_naming_the_document() {
        let err = parse_oracle_content("bill_3.pdf", "I could not read this document").unwrap_err();
        match err {
            PipelineError::OracleViolation { document, .. } => assert_eq!(document, "bill_3.pdf"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_wrong_shape() {
        assert!(parse_oracle_content("d", "[1, 2, 3]").is_err());
        assert!(parse_oracle_content("d", "{\"invoices\": 5}").is_err());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "₹".repeat(10);
        assert_eq!(truncate_chars(&text, 4).chars().count(), 4);
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
