//! Speech-to-text backends.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::audio::{encode_wav, AudioWindow};

/// A remote speech-to-text service shared by all speaker pipelines.
///
/// Implementations must support concurrent calls; one request is made per
/// audio window and failures are reported to the caller, which logs and
/// drops the window.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe one audio window, optionally hinting the spoken language.
    /// Returns the trimmed transcript, which may be empty.
    async fn transcribe(&self, window: &AudioWindow, language: Option<&str>) -> Result<String>;
}

/// Client for an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct OpenAiStt {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiStt {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }
}

#[async_trait]
impl SpeechToText for OpenAiStt {
    async fn transcribe(&self, window: &AudioWindow, language: Option<&str>) -> Result<String> {
        let wav = encode_wav(&window.samples, window.sample_rate, window.channels);

        let part = reqwest::multipart::Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let url = format!("{}/audio/transcriptions", self.base_url);
        let res = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .context("failed to send transcription request")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("transcription service returned {}: {}", status, body);
        }

        let json: serde_json::Value = res
            .json()
            .await
            .context("failed to parse transcription response")?;
        let text = json["text"].as_str().unwrap_or("").trim().to_string();

        debug!(
            "transcribed {}ms window -> {} chars",
            window.duration_ms(),
            text.len()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_stripped() {
        let stt = OpenAiStt::new(
            "key".to_string(),
            "https://api.openai.com/v1/".to_string(),
            "gpt-4o-transcribe".to_string(),
        )
        .unwrap();
        assert_eq!(stt.base_url, "https://api.openai.com/v1");
    }
}
