//! On-disk configuration for the `kubevox` binary.
//!
//! Every key is optional; a missing default file means built-in defaults.
//! Command-line flags are applied on top by `main`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use kubevox_contracts::error::{KubevoxError, KubevoxResult};
use kubevox_core::DispatchOptions;
use kubevox_k8s::ClusterSettings;
use kubevox_voice::{ElevenLabsConfig, LlamaConfig, WhisperConfig};

pub const CONFIG_ENV: &str = "KUBEVOX_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub llm: LlmSection,
    pub dispatch: DispatchSection,
    pub kubernetes: KubernetesSection,
    pub speech: SpeechSection,
    pub policy: PolicySection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSection {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    pub system_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchSection {
    pub invoke_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KubernetesSection {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechSection {
    pub whisper_url: Option<String>,
    pub transcribe_timeout_secs: Option<u64>,
    pub elevenlabs_api_key: Option<String>,
    pub voice_id: Option<String>,
    pub model_id: Option<String>,
    pub player: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicySection {
    /// Gate policy file. Unset means the policy embedded in the binary.
    pub path: Option<PathBuf>,
}

impl Config {
    pub fn from_toml_str(s: &str) -> KubevoxResult<Self> {
        toml::from_str(s).map_err(|e| KubevoxError::ConfigError {
            reason: format!("failed to parse config TOML: {e}"),
        })
    }

    /// Load from `explicit`, then `$KUBEVOX_CONFIG`, then the default path.
    ///
    /// An explicitly named file must exist; the default one may be absent.
    pub fn load(explicit: Option<&Path>) -> KubevoxResult<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match named {
            Some(path) => Self::from_file(&path),
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> KubevoxResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| KubevoxError::ConfigError {
            reason: format!("cannot read config '{}': {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn llama(&self) -> LlamaConfig {
        let mut cfg = LlamaConfig::default();
        if let Some(url) = &self.llm.base_url {
            cfg.base_url = url.clone();
        }
        if let Some(model) = &self.llm.model {
            cfg.model = model.clone();
        }
        if let Some(t) = self.llm.temperature {
            cfg.temperature = t;
        }
        if let Some(secs) = self.llm.timeout_secs {
            cfg.request_timeout = Duration::from_secs(secs);
        }
        if let Some(prompt) = &self.llm.system_prompt {
            cfg.system_prompt = prompt.clone();
        }
        cfg
    }

    pub fn dispatch(&self) -> DispatchOptions {
        let mut opts = DispatchOptions::default();
        if let Some(secs) = self.dispatch.invoke_timeout_secs {
            opts.invoke_timeout = Duration::from_secs(secs);
        }
        opts
    }

    pub fn cluster(&self) -> ClusterSettings {
        let mut settings = ClusterSettings {
            kubeconfig: self.kubernetes.kubeconfig.clone(),
            context: self.kubernetes.context.clone(),
            ..ClusterSettings::default()
        };
        if let Some(secs) = self.kubernetes.request_timeout_secs {
            settings.request_timeout = Duration::from_secs(secs);
        }
        settings
    }

    pub fn whisper(&self) -> WhisperConfig {
        let mut cfg = WhisperConfig::default();
        if let Some(url) = &self.speech.whisper_url {
            cfg.base_url = url.clone();
        }
        if let Some(secs) = self.speech.transcribe_timeout_secs {
            cfg.request_timeout = Duration::from_secs(secs);
        }
        cfg
    }

    pub fn elevenlabs(&self) -> ElevenLabsConfig {
        let mut cfg = ElevenLabsConfig::default();
        if let Some(key) = &self.speech.elevenlabs_api_key {
            cfg.api_key = Some(key.clone());
        }
        if let Some(voice) = &self.speech.voice_id {
            cfg.voice_id = voice.clone();
        }
        if let Some(model) = &self.speech.model_id {
            cfg.model_id = model.clone();
        }
        if let Some(player) = &self.speech.player {
            cfg.player = player.clone();
        }
        cfg
    }
}

/// `~/.config/kubevox/config.toml`.
pub fn default_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join(".config")
            .join("kubevox")
            .join("config.toml")
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = Config::from_toml_str("").unwrap();
        assert_eq!(cfg.llama().base_url, "http://localhost:8080");
        assert_eq!(cfg.dispatch().invoke_timeout, Duration::from_secs(10));
        assert_eq!(cfg.cluster().request_timeout, Duration::from_secs(8));
        assert!(cfg.policy.path.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let cfg = Config::from_toml_str(
            r#"
[llm]
base_url = "http://gpu-box:9000"
temperature = 0.2

[dispatch]
invoke_timeout_secs = 3

[kubernetes]
context = "staging"

[speech]
voice_id = "abc"
player = ["mpv", "--really-quiet"]

[policy]
path = "/etc/kubevox/gate.toml"
"#,
        )
        .unwrap();

        assert_eq!(cfg.llama().base_url, "http://gpu-box:9000");
        assert!((cfg.llama().temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(cfg.dispatch().invoke_timeout, Duration::from_secs(3));
        assert_eq!(cfg.cluster().context.as_deref(), Some("staging"));
        assert_eq!(cfg.elevenlabs().voice_id, "abc");
        assert_eq!(cfg.elevenlabs().player, vec!["mpv", "--really-quiet"]);
        assert_eq!(cfg.policy.path, Some(PathBuf::from("/etc/kubevox/gate.toml")));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::from_toml_str("[llm]\nbase_uri = \"x\"\n").unwrap_err();
        assert!(matches!(err, KubevoxError::ConfigError { .. }));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[kubernetes]\nrequest_timeout_secs = 20").unwrap();

        let cfg = Config::load(Some(file.path())).unwrap();
        assert_eq!(cfg.cluster().request_timeout, Duration::from_secs(20));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
