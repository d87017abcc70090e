//! # kubevox-voice
//!
//! Network adapters at the edges of the KubeVox pipeline:
//! - `llama`: llama.cpp server as the `LanguageModel`
//! - `whisper`: whisper.cpp server as the `Transcriber`
//! - `elevenlabs`: ElevenLabs synthesis plus local playback as the `Speaker`

pub mod elevenlabs;
pub mod llama;
pub mod whisper;

pub use elevenlabs::{ElevenLabsConfig, ElevenLabsSpeaker};
pub use llama::{LlamaClient, LlamaConfig};
pub use whisper::{WhisperClient, WhisperConfig};
