//! Kubeconfig discovery, parsing, and context resolution.
//!
//! Only the subset of the kubeconfig format that the adapters need is
//! modelled. `set_current_context` edits the file through an untyped YAML
//! tree so fields this module does not know about survive the rewrite.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::debug;

use crate::{
    error::ClusterError,
    exec::{ExecConfig, ExecPlugin},
};

/// Locate the kubeconfig: first entry of `$KUBECONFIG`, else `~/.kube/config`.
pub fn default_path() -> Result<PathBuf, ClusterError> {
    if let Some(raw) = std::env::var_os("KUBECONFIG") {
        if let Some(first) = std::env::split_paths(&raw).find(|p| !p.as_os_str().is_empty()) {
            return Ok(first);
        }
    }
    directories::BaseDirs::new()
        .map(|d| d.home_dir().join(".kube").join("config"))
        .ok_or_else(|| ClusterError::Kubeconfig {
            reason: "cannot determine home directory".to_string(),
        })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(default)]
    pub current_context: Option<String>,
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEntry {
    pub server: String,
    #[serde(default)]
    pub certificate_authority: Option<String>,
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: UserEntry,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserEntry {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default, rename = "tokenFile")]
    pub token_file: Option<String>,
    #[serde(default)]
    pub client_certificate: Option<String>,
    #[serde(default)]
    pub client_certificate_data: Option<String>,
    #[serde(default)]
    pub client_key: Option<String>,
    #[serde(default)]
    pub client_key_data: Option<String>,
    #[serde(default)]
    pub exec: Option<ExecConfig>,
    /// Legacy provider plugins (`gcp`, `azure`, `oidc`). Not supported.
    #[serde(default)]
    pub auth_provider: Option<serde_yaml::Value>,
    /// Basic auth. Not supported.
    #[serde(default)]
    pub username: Option<String>,
}

/// How requests to the API server authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    Bearer(String),
    /// PEM certificate chain and PEM private key.
    ClientCertificate { cert_pem: Vec<u8>, key_pem: Vec<u8> },
    /// A credential plugin still to be run; `ClusterAccess::connect`
    /// replaces it with what the plugin issues.
    Exec(ExecPlugin),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::None => f.write_str("None"),
            Credentials::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Credentials::ClientCertificate { .. } => f.write_str("ClientCertificate(<redacted>)"),
            Credentials::Exec(plugin) => write!(f, "Exec({})", plugin.command.display()),
        }
    }
}

/// Everything needed to talk to one cluster.
#[derive(Debug, Clone)]
pub struct ResolvedContext {
    pub context: String,
    pub cluster: String,
    pub server: String,
    pub ca_pem: Option<Vec<u8>>,
    pub insecure: bool,
    pub credentials: Credentials,
}

impl Kubeconfig {
    pub fn load(path: &Path) -> Result<Self, ClusterError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ClusterError::Kubeconfig {
            reason: format!("failed to read '{}': {}", path.display(), e),
        })?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, ClusterError> {
        serde_yaml::from_str(s).map_err(|e| ClusterError::Kubeconfig {
            reason: format!("failed to parse kubeconfig: {e}"),
        })
    }

    pub fn context_names(&self) -> Vec<String> {
        self.contexts.iter().map(|c| c.name.clone()).collect()
    }

    /// Resolve `context` (or the current context) into connection details.
    ///
    /// Relative certificate paths are taken relative to `base_dir`, the
    /// directory holding the kubeconfig.
    pub fn resolve(
        &self,
        context: Option<&str>,
        base_dir: &Path,
    ) -> Result<ResolvedContext, ClusterError> {
        let name = context
            .or(self.current_context.as_deref())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ClusterError::Kubeconfig {
                reason: "no current-context set and no context given".to_string(),
            })?;

        let ctx = self
            .contexts
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ClusterError::ContextNotFound {
                name: name.to_string(),
            })?;

        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == ctx.context.cluster)
            .ok_or_else(|| ClusterError::Kubeconfig {
                reason: format!(
                    "context '{}' refers to unknown cluster '{}'",
                    name, ctx.context.cluster
                ),
            })?;

        let user = match &ctx.context.user {
            Some(user_name) => Some(
                self.users
                    .iter()
                    .find(|u| &u.name == user_name)
                    .ok_or_else(|| ClusterError::Kubeconfig {
                        reason: format!("context '{name}' refers to unknown user '{user_name}'"),
                    })?,
            ),
            None => None,
        };

        let ca_pem = material(
            cluster.cluster.certificate_authority_data.as_deref(),
            cluster.cluster.certificate_authority.as_deref(),
            base_dir,
        )?;

        let credentials = match user {
            Some(u) => user_credentials(&u.user, base_dir)?,
            None => Credentials::None,
        };

        debug!(
            context = %name,
            cluster = %cluster.name,
            server = %cluster.cluster.server,
            "resolved kubeconfig context"
        );

        Ok(ResolvedContext {
            context: name.to_string(),
            cluster: cluster.name.clone(),
            server: cluster.cluster.server.trim_end_matches('/').to_string(),
            ca_pem,
            insecure: cluster.cluster.insecure_skip_tls_verify,
            credentials,
        })
    }
}

/// Pick the authentication mechanism of one kubeconfig user.
///
/// Order: `token`, `tokenFile`, client certificate and key, `exec`. A user
/// that only configures a mechanism this module cannot use is an error, so
/// requests are never sent unauthenticated by accident.
fn user_credentials(entry: &UserEntry, base_dir: &Path) -> Result<Credentials, ClusterError> {
    if let Some(token) = entry.token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Credentials::Bearer(token.to_string()));
    }
    if let Some(file) = &entry.token_file {
        let path = base_dir.join(file);
        let token = std::fs::read_to_string(&path).map_err(|e| ClusterError::Kubeconfig {
            reason: format!("failed to read token file '{}': {}", path.display(), e),
        })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(ClusterError::Kubeconfig {
                reason: format!("token file '{}' is empty", path.display()),
            });
        }
        return Ok(Credentials::Bearer(token.to_string()));
    }

    let cert = material(
        entry.client_certificate_data.as_deref(),
        entry.client_certificate.as_deref(),
        base_dir,
    )?;
    let key = material(entry.client_key_data.as_deref(), entry.client_key.as_deref(), base_dir)?;
    if let (Some(cert_pem), Some(key_pem)) = (cert, key) {
        return Ok(Credentials::ClientCertificate { cert_pem, key_pem });
    }

    if let Some(exec) = &entry.exec {
        return Ok(Credentials::Exec(ExecPlugin::from_config(exec, base_dir)));
    }
    if entry.auth_provider.is_some() {
        return Err(unsupported("auth-provider"));
    }
    if entry.username.is_some() {
        return Err(unsupported("basic"));
    }
    Ok(Credentials::None)
}

fn unsupported(mechanism: &str) -> ClusterError {
    ClusterError::Kubeconfig {
        reason: format!("unsupported auth: {mechanism}"),
    }
}

/// Inline base64 data wins over a file reference.
fn material(
    data: Option<&str>,
    file: Option<&str>,
    base_dir: &Path,
) -> Result<Option<Vec<u8>>, ClusterError> {
    if let Some(encoded) = data {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| ClusterError::Kubeconfig {
                reason: format!("invalid base64 in kubeconfig: {e}"),
            })?;
        return Ok(Some(bytes));
    }
    if let Some(file) = file {
        let path = base_dir.join(file);
        let bytes = std::fs::read(&path).map_err(|e| ClusterError::Kubeconfig {
            reason: format!("failed to read '{}': {}", path.display(), e),
        })?;
        return Ok(Some(bytes));
    }
    Ok(None)
}

/// Persist `context` as the kubeconfig's `current-context`.
pub fn set_current_context(path: &Path, context: &str) -> Result<(), ClusterError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ClusterError::Kubeconfig {
        reason: format!("failed to read '{}': {}", path.display(), e),
    })?;
    let mut doc: serde_yaml::Value =
        serde_yaml::from_str(&contents).map_err(|e| ClusterError::Kubeconfig {
            reason: format!("failed to parse kubeconfig: {e}"),
        })?;

    let known = doc
        .get("contexts")
        .and_then(|v| v.as_sequence())
        .is_some_and(|contexts| {
            contexts
                .iter()
                .any(|c| c.get("name").and_then(|n| n.as_str()) == Some(context))
        });
    if !known {
        return Err(ClusterError::ContextNotFound {
            name: context.to_string(),
        });
    }

    let map = doc.as_mapping_mut().ok_or_else(|| ClusterError::Kubeconfig {
        reason: "kubeconfig is not a mapping".to_string(),
    })?;
    map.insert(
        serde_yaml::Value::from("current-context"),
        serde_yaml::Value::from(context),
    );

    let rendered = serde_yaml::to_string(&doc).map_err(|e| ClusterError::Kubeconfig {
        reason: format!("failed to serialize kubeconfig: {e}"),
    })?;
    std::fs::write(path, rendered).map_err(|e| ClusterError::Kubeconfig {
        reason: format!("failed to write '{}': {}", path.display(), e),
    })?;

    debug!(context = %context, path = %path.display(), "current-context updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    const SAMPLE: &str = r#"
apiVersion: v1
kind: Config
current-context: dev
clusters:
- name: dev-cluster
  cluster:
    server: https://dev.example.com:6443/
    certificate-authority-data: LS0tLS1CRUdJTg==
- name: prod-cluster
  cluster:
    server: https://prod.example.com:6443
    insecure-skip-tls-verify: true
contexts:
- name: dev
  context:
    cluster: dev-cluster
    user: dev-admin
    namespace: web
- name: prod
  context:
    cluster: prod-cluster
    user: prod-reader
users:
- name: dev-admin
  user:
    token: s3cr3t
- name: prod-reader
  user: {}
preferences: {}
"#;

    #[test]
    fn resolves_current_context() {
        let config = Kubeconfig::from_yaml_str(SAMPLE).unwrap();
        let resolved = config.resolve(None, Path::new("/nonexistent")).unwrap();

        assert_eq!(resolved.context, "dev");
        assert_eq!(resolved.cluster, "dev-cluster");
        assert_eq!(resolved.server, "https://dev.example.com:6443");
        assert_eq!(resolved.ca_pem.as_deref(), Some(&b"-----BEGIN"[..]));
        assert!(!resolved.insecure);
        assert_eq!(resolved.credentials, Credentials::Bearer("s3cr3t".to_string()));
    }

    #[test]
    fn override_selects_another_context() {
        let config = Kubeconfig::from_yaml_str(SAMPLE).unwrap();
        let resolved = config.resolve(Some("prod"), Path::new("/nonexistent")).unwrap();

        assert_eq!(resolved.cluster, "prod-cluster");
        assert!(resolved.insecure);
        assert!(resolved.ca_pem.is_none());
        assert_eq!(resolved.credentials, Credentials::None);
    }

    #[test]
    fn unknown_context_is_not_found() {
        let config = Kubeconfig::from_yaml_str(SAMPLE).unwrap();
        let err = config.resolve(Some("staging"), Path::new("/")).unwrap_err();
        assert!(matches!(err, ClusterError::ContextNotFound { name } if name == "staging"));
    }

    #[test]
    fn client_certificate_files_are_relative_to_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("client.crt"), "CERT").unwrap();
        std::fs::write(dir.path().join("client.key"), "KEY").unwrap();

        let yaml = r#"
current-context: local
clusters:
- name: local
  cluster:
    server: https://127.0.0.1:6443
contexts:
- name: local
  context:
    cluster: local
    user: me
users:
- name: me
  user:
    client-certificate: client.crt
    client-key: client.key
"#;
        let config = Kubeconfig::from_yaml_str(yaml).unwrap();
        let resolved = config.resolve(None, dir.path()).unwrap();
        assert_eq!(
            resolved.credentials,
            Credentials::ClientCertificate {
                cert_pem: b"CERT".to_vec(),
                key_pem: b"KEY".to_vec(),
            }
        );
    }

    fn single_user_config(user: &str) -> Kubeconfig {
        let yaml = format!(
            r#"
current-context: eks
clusters:
- name: eks
  cluster:
    server: https://ABC.gr7.eu-west-1.eks.amazonaws.com
contexts:
- name: eks
  context:
    cluster: eks
    user: me
users:
- name: me
  user:
{user}
"#
        );
        Kubeconfig::from_yaml_str(&yaml).unwrap()
    }

    #[test]
    fn exec_user_resolves_to_plugin() {
        let config = single_user_config(
            r#"    exec:
      apiVersion: client.authentication.k8s.io/v1beta1
      command: aws
      args: [eks, get-token, --cluster-name, prod]
      env:
      - name: AWS_PROFILE
        value: prod
      interactiveMode: Never"#,
        );
        let resolved = config.resolve(None, Path::new("/")).unwrap();

        assert_ne!(resolved.credentials, Credentials::None);
        match resolved.credentials {
            Credentials::Exec(plugin) => {
                assert_eq!(plugin.command, std::path::PathBuf::from("aws"));
                assert_eq!(plugin.args, vec!["eks", "get-token", "--cluster-name", "prod"]);
                assert_eq!(plugin.env, vec![("AWS_PROFILE".to_string(), "prod".to_string())]);
            }
            other => panic!("expected Exec, got {other:?}"),
        }
    }

    #[test]
    fn token_file_is_read_relative_to_kubeconfig() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sa.token"), "eyJhbGciOi\n").unwrap();

        let config = single_user_config("    tokenFile: sa.token");
        let resolved = config.resolve(None, dir.path()).unwrap();
        assert_eq!(resolved.credentials, Credentials::Bearer("eyJhbGciOi".to_string()));
    }

    #[test]
    fn missing_token_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = single_user_config("    tokenFile: gone.token");
        assert!(matches!(
            config.resolve(None, dir.path()),
            Err(ClusterError::Kubeconfig { .. })
        ));
    }

    #[test]
    fn unsupported_mechanisms_are_errors() {
        let provider = single_user_config(
            r#"    auth-provider:
      name: gcp
      config: {}"#,
        );
        let err = provider.resolve(None, Path::new("/")).unwrap_err();
        assert!(matches!(
            &err,
            ClusterError::Kubeconfig { reason } if reason == "unsupported auth: auth-provider"
        ));

        let basic = single_user_config("    username: admin\n    password: hunter2");
        let err = basic.resolve(None, Path::new("/")).unwrap_err();
        assert!(matches!(
            &err,
            ClusterError::Kubeconfig { reason } if reason == "unsupported auth: basic"
        ));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let rendered = format!("{:?}", Credentials::Bearer("s3cr3t".to_string()));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn set_current_context_persists_and_keeps_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, SAMPLE).unwrap();

        set_current_context(&path, "prod").unwrap();

        let reloaded = Kubeconfig::load(&path).unwrap();
        assert_eq!(reloaded.current_context.as_deref(), Some("prod"));
        assert_eq!(reloaded.context_names(), vec!["dev", "prod"]);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("preferences"));
    }

    #[test]
    fn set_current_context_rejects_unknown_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        std::fs::write(&path, SAMPLE).unwrap();

        let err = set_current_context(&path, "staging").unwrap_err();
        assert!(matches!(err, ClusterError::ContextNotFound { .. }));

        let reloaded = Kubeconfig::load(&path).unwrap();
        assert_eq!(reloaded.current_context.as_deref(), Some("dev"));
    }
}
