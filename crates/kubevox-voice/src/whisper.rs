//! whisper.cpp server client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use kubevox_contracts::{
    error::{KubevoxError, KubevoxResult},
    model::AudioClip,
};
use kubevox_core::traits::Transcriber;

#[derive(Debug, Clone)]
pub struct WhisperConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8081".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    text: String,
}

#[derive(Debug, Clone)]
pub struct WhisperClient {
    http: reqwest::Client,
    cfg: WhisperConfig,
}

impl WhisperClient {
    pub fn new(cfg: WhisperConfig) -> KubevoxResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| KubevoxError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, cfg })
    }
}

#[async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, audio: &AudioClip) -> KubevoxResult<String> {
        let url = format!("{}/inference", self.cfg.base_url.trim_end_matches('/'));
        debug!(url = %url, bytes = audio.bytes.len(), "POST audio for transcription");

        let part = Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str("audio/wav")
            .map_err(|e| KubevoxError::Transcription {
                reason: format!("invalid audio part: {e}"),
            })?;
        let form = Form::new()
            .part("file", part)
            .text("response_format", "json")
            .text("temperature", "0.0");

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| KubevoxError::Transcription {
                reason: format!("failed to reach whisper server at {}: {e}", self.cfg.base_url),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(KubevoxError::Transcription {
                reason: format!("whisper server returned status {}", status.as_u16()),
            });
        }

        let body: InferenceResponse = resp.json().await.map_err(|e| KubevoxError::Transcription {
            reason: format!("failed to parse transcription JSON: {e}"),
        })?;
        Ok(clean_transcript(&body.text))
    }
}

/// whisper.cpp pads segments with spaces and marks silence with tokens
/// like `[BLANK_AUDIO]`; both are dropped.
pub fn clean_transcript(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        match rest[start..].find(']') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                rest = &rest[start..];
                break;
            }
        }
    }
    out.push_str(rest);
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_collapses_whitespace() {
        assert_eq!(
            clean_transcript("  how many pods\n are  running "),
            "how many pods are running"
        );
    }

    #[test]
    fn drops_bracketed_markers() {
        assert_eq!(clean_transcript("[BLANK_AUDIO]"), "");
        assert_eq!(clean_transcript(" restart web [MUSIC] please"), "restart web please");
        assert_eq!(clean_transcript("unterminated [tag"), "unterminated [tag");
    }
}
