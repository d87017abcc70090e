//! Exec credential plugins (`users[].user.exec`), as used by EKS, GKE and AKS.
//!
//! The plugin is a local command that prints an `ExecCredential` object on
//! stdout. Its `status` carries either a bearer token or a client
//! certificate, optionally with an expiry.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::{error::ClusterError, kubeconfig::Credentials};

pub const DEFAULT_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

/// The `exec` block of a kubeconfig user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<ExecEnvVar>,
    #[serde(default)]
    pub api_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecEnvVar {
    pub name: String,
    pub value: String,
}

/// A plugin invocation with its command resolved against the kubeconfig
/// directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecPlugin {
    pub command: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub api_version: String,
}

impl ExecPlugin {
    /// A command containing a path separator is taken relative to
    /// `base_dir`; a bare name is looked up on `PATH`.
    pub fn from_config(cfg: &ExecConfig, base_dir: &Path) -> Self {
        let command = PathBuf::from(&cfg.command);
        let command = if command.is_relative() && command.components().count() > 1 {
            base_dir.join(command)
        } else {
            command
        };
        Self {
            command,
            args: cfg.args.clone(),
            env: cfg.env.iter().map(|v| (v.name.clone(), v.value.clone())).collect(),
            api_version: cfg
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        }
    }
}

/// Credentials produced by one plugin run.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    pub credentials: Credentials,
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct ExecCredential {
    #[serde(default)]
    status: Option<ExecCredentialStatus>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    client_certificate_data: Option<String>,
    #[serde(default)]
    client_key_data: Option<String>,
    #[serde(default)]
    expiration_timestamp: Option<DateTime<Utc>>,
}

/// Run the plugin non-interactively and parse what it prints.
pub async fn run(
    plugin: &ExecPlugin,
    timeout: Duration,
) -> Result<IssuedCredentials, ClusterError> {
    let exec_info = json!({
        "apiVersion": plugin.api_version,
        "kind": "ExecCredential",
        "spec": { "interactive": false },
    });

    let mut command = tokio::process::Command::new(&plugin.command);
    command
        .args(&plugin.args)
        .envs(plugin.env.iter().map(|(k, v)| (k, v)))
        .env("KUBERNETES_EXEC_INFO", exec_info.to_string())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    debug!(command = %plugin.command.display(), "running credential plugin");
    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| ClusterError::Timeout {
            after_ms: timeout.as_millis() as u64,
        })?
        .map_err(|e| ClusterError::Kubeconfig {
            reason: format!(
                "failed to run credential plugin '{}': {e}",
                plugin.command.display()
            ),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail: String = stderr.trim().chars().take(200).collect();
        return Err(ClusterError::Kubeconfig {
            reason: format!(
                "credential plugin '{}' exited with {}: {detail}",
                plugin.command.display(),
                output.status
            ),
        });
    }
    parse_credential(&output.stdout)
}

/// Interpret an `ExecCredential` document. A token wins over a certificate.
pub fn parse_credential(stdout: &[u8]) -> Result<IssuedCredentials, ClusterError> {
    let credential: ExecCredential =
        serde_json::from_slice(stdout).map_err(|e| ClusterError::Kubeconfig {
            reason: format!("credential plugin printed invalid ExecCredential: {e}"),
        })?;
    let status = credential.status.ok_or_else(|| ClusterError::Kubeconfig {
        reason: "credential plugin returned no status".to_string(),
    })?;

    let expires = status.expiration_timestamp;
    let credentials = match status {
        ExecCredentialStatus {
            token: Some(token),
            ..
        } if !token.is_empty() => Credentials::Bearer(token),
        ExecCredentialStatus {
            client_certificate_data: Some(cert),
            client_key_data: Some(key),
            ..
        } => Credentials::ClientCertificate {
            cert_pem: cert.into_bytes(),
            key_pem: key.into_bytes(),
        },
        _ => {
            return Err(ClusterError::Kubeconfig {
                reason: "credential plugin returned neither a token nor a client certificate"
                    .to_string(),
            })
        }
    };
    Ok(IssuedCredentials { credentials, expires })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_command_paths_use_kubeconfig_dir() {
        let cfg = ExecConfig {
            command: "bin/get-token".to_string(),
            args: vec![],
            env: vec![ExecEnvVar {
                name: "AWS_PROFILE".to_string(),
                value: "prod".to_string(),
            }],
            api_version: None,
        };
        let plugin = ExecPlugin::from_config(&cfg, Path::new("/home/me/.kube"));
        assert_eq!(plugin.command, PathBuf::from("/home/me/.kube/bin/get-token"));
        assert_eq!(plugin.env, vec![("AWS_PROFILE".to_string(), "prod".to_string())]);
        assert_eq!(plugin.api_version, DEFAULT_API_VERSION);

        let bare = ExecConfig {
            command: "aws".to_string(),
            ..cfg
        };
        assert_eq!(
            ExecPlugin::from_config(&bare, Path::new("/home/me/.kube")).command,
            PathBuf::from("aws")
        );
    }

    #[test]
    fn token_status_becomes_bearer() {
        let issued = parse_credential(
            br#"{"apiVersion":"client.authentication.k8s.io/v1beta1","kind":"ExecCredential",
                 "status":{"token":"k8s-aws-v1.abc",
                           "expirationTimestamp":"2030-01-01T00:00:00Z"}}"#,
        )
        .unwrap();
        assert_eq!(issued.credentials, Credentials::Bearer("k8s-aws-v1.abc".to_string()));
        assert_eq!(
            issued.expires.map(|t| t.to_rfc3339()),
            Some("2030-01-01T00:00:00+00:00".to_string())
        );
    }

    #[test]
    fn certificate_status_becomes_client_certificate() {
        let issued = parse_credential(
            br#"{"status":{"clientCertificateData":"CERT","clientKeyData":"KEY"}}"#,
        )
        .unwrap();
        assert_eq!(
            issued.credentials,
            Credentials::ClientCertificate {
                cert_pem: b"CERT".to_vec(),
                key_pem: b"KEY".to_vec(),
            }
        );
        assert!(issued.expires.is_none());
    }

    #[test]
    fn empty_status_is_rejected() {
        assert!(parse_credential(br#"{"status":{}}"#).is_err());
        assert!(parse_credential(br#"{"kind":"ExecCredential"}"#).is_err());
        assert!(parse_credential(b"not json").is_err());
    }

    fn script_plugin(dir: &tempfile::TempDir, body: &str, env: &[(&str, &str)]) -> ExecPlugin {
        let script = dir.path().join("get-token.sh");
        std::fs::write(&script, body).unwrap();
        ExecPlugin {
            command: PathBuf::from("sh"),
            args: vec![script.display().to_string()],
            env: env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            api_version: DEFAULT_API_VERSION.to_string(),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_plugin_with_env_and_exec_info() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script_plugin(
            &dir,
            r#"case "$KUBERNETES_EXEC_INFO" in *ExecCredential*) ;; *) exit 3 ;; esac
printf '{"status":{"token":"%s"}}' "$ISSUED_TOKEN"
"#,
            &[("ISSUED_TOKEN", "from-plugin")],
        );

        let issued = run(&plugin, Duration::from_secs(5)).await.unwrap();
        assert_eq!(issued.credentials, Credentials::Bearer("from-plugin".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_plugin_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script_plugin(
            &dir,
            "echo 'token expired, run aws sso login' >&2\nexit 1\n",
            &[],
        );

        let err = run(&plugin, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(
            &err,
            ClusterError::Kubeconfig { reason } if reason.contains("aws sso login")
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_plugin_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = script_plugin(&dir, "sleep 5\n", &[]);

        let err = run(&plugin, Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ClusterError::Timeout { after_ms: 100 }));
    }
}
