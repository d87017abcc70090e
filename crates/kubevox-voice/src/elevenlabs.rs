//! ElevenLabs text-to-speech with local playback.
//!
//! The synthesized MP3 is written to a temporary file and handed to an
//! external player (`ffplay` by default). The file is removed once the
//! player exits.

use std::{io::Write, time::Duration};

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use kubevox_contracts::error::{KubevoxError, KubevoxResult};
use kubevox_core::traits::Speaker;

pub const API_KEY_ENV: &str = "ELEVENLABS_API_KEY";

#[derive(Clone)]
pub struct ElevenLabsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub voice_id: String,
    pub model_id: String,
    pub request_timeout: Duration,
    /// Player command; the audio file path is appended as the last argument.
    pub player: Vec<String>,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            base_url: "https://api.elevenlabs.io".to_string(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            request_timeout: Duration::from_secs(30),
            player: ["ffplay", "-nodisp", "-autoexit", "-loglevel", "quiet"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl std::fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("voice_id", &self.voice_id)
            .field("model_id", &self.model_id)
            .field("request_timeout", &self.request_timeout)
            .field("player", &self.player)
            .finish()
    }
}

pub struct ElevenLabsSpeaker {
    http: reqwest::Client,
    api_key: String,
    cfg: ElevenLabsConfig,
}

impl ElevenLabsSpeaker {
    /// Fails when no API key is configured or the player command is empty.
    pub fn new(cfg: ElevenLabsConfig) -> KubevoxResult<Self> {
        let api_key = cfg.api_key.clone().ok_or_else(|| KubevoxError::ConfigError {
            reason: format!("voice output needs an ElevenLabs API key (set {API_KEY_ENV})"),
        })?;
        if cfg.player.is_empty() {
            return Err(KubevoxError::ConfigError {
                reason: "speech player command is empty".to_string(),
            });
        }
        let http = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .map_err(|e| KubevoxError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, api_key, cfg })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.voice_id
        )
    }

    async fn synthesize(&self, text: &str) -> KubevoxResult<Vec<u8>> {
        let resp = self
            .http
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&json!({ "text": text, "model_id": self.cfg.model_id }))
            .send()
            .await
            .map_err(|e| KubevoxError::Speech {
                reason: format!("text-to-speech request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(KubevoxError::Speech {
                reason: format!("text-to-speech returned status {}", status.as_u16()),
            });
        }
        let bytes = resp.bytes().await.map_err(|e| KubevoxError::Speech {
            reason: format!("failed to read synthesized audio: {e}"),
        })?;
        Ok(bytes.to_vec())
    }

    async fn play(&self, audio: &[u8]) -> KubevoxResult<()> {
        let mut file = tempfile::Builder::new()
            .prefix("kubevox-")
            .suffix(".mp3")
            .tempfile()
            .map_err(speech_io)?;
        file.write_all(audio).map_err(speech_io)?;
        file.flush().map_err(speech_io)?;

        let (program, args) = self
            .cfg
            .player
            .split_first()
            .ok_or_else(|| KubevoxError::ConfigError {
                reason: "speech player command is empty".to_string(),
            })?;
        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(file.path())
            .stdin(std::process::Stdio::null())
            .status()
            .await
            .map_err(|e| KubevoxError::Speech {
                reason: format!("failed to start audio player '{program}': {e}"),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(KubevoxError::Speech {
                reason: format!("audio player '{program}' exited with {status}"),
            })
        }
    }
}

fn speech_io(e: std::io::Error) -> KubevoxError {
    KubevoxError::Speech {
        reason: format!("failed to stage synthesized audio: {e}"),
    }
}

#[async_trait]
impl Speaker for ElevenLabsSpeaker {
    async fn speak(&self, text: &str) -> KubevoxResult<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let audio = self.synthesize(text).await?;
        debug!(bytes = audio.len(), voice = %self.cfg.voice_id, "speech synthesized");
        self.play(&audio).await
    }
}
