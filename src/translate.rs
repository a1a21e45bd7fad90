//! Translation of finalized sentences through a chat-style LLM endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;

/// A translation backend shared by all speaker pipelines. Implementations
/// must support concurrent calls.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_language` (a BCP-47-style tag such as
    /// "es" or "fr").
    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiTranslator {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiTranslator {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn instruction(target_language: &str) -> String {
        format!(
            "Translate the following text to {}. Return only the translation, no additional text.",
            target_language
        )
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": Self::instruction(target_language) },
                { "role": "user", "content": text },
            ],
            "max_tokens": 100,
            "temperature": 0.1,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("failed to send translation request")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("translation service returned {}: {}", status, body);
        }

        let json: serde_json::Value = res
            .json()
            .await
            .context("failed to parse translation response")?;
        let translated = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if translated.is_empty() {
            anyhow::bail!("translation service returned an empty response");
        }

        debug!("translated {} chars to {}", text.len(), target_language);
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_names_target_language() {
        let instruction = OpenAiTranslator::instruction("es");
        assert!(instruction.starts_with("Translate the following text to es."));
        assert!(instruction.contains("only the translation"));
    }

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let translator = OpenAiTranslator::new(
            "key".to_string(),
            "http://localhost:11434/v1/".to_string(),
            "gpt-4o-mini".to_string(),
        )
        .unwrap();
        assert_eq!(translator.base_url, "http://localhost:11434/v1");
    }
}
