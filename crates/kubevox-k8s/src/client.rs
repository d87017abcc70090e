//! Minimal REST client for the Kubernetes API server.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{
    error::ClusterError,
    kubeconfig::{Credentials, ResolvedContext},
    models::Status,
};

const MERGE_PATCH: &str = "application/merge-patch+json";

/// An authenticated HTTP client bound to one cluster.
#[derive(Debug, Clone)]
pub struct ClusterClient {
    http: reqwest::Client,
    server: String,
    timeout: Duration,
}

impl ClusterClient {
    pub fn connect(resolved: &ResolvedContext, timeout: Duration) -> Result<Self, ClusterError> {
        let tls_error = |e: reqwest::Error| ClusterError::Kubeconfig {
            reason: format!("invalid TLS material: {e}"),
        };

        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(resolved.insecure);

        if let Some(ca) = &resolved.ca_pem {
            let cert = reqwest::Certificate::from_pem(ca).map_err(tls_error)?;
            builder = builder.add_root_certificate(cert);
        }

        match &resolved.credentials {
            Credentials::None => {}
            Credentials::Bearer(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
                    ClusterError::Kubeconfig {
                        reason: format!("invalid bearer token: {e}"),
                    }
                })?;
                value.set_sensitive(true);
                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, value);
                builder = builder.default_headers(headers);
            }
            Credentials::ClientCertificate { cert_pem, key_pem } => {
                let mut pem = cert_pem.clone();
                pem.push(b'\n');
                pem.extend_from_slice(key_pem);
                builder = builder.identity(reqwest::Identity::from_pem(&pem).map_err(tls_error)?);
            }
            Credentials::Exec(plugin) => {
                return Err(ClusterError::Kubeconfig {
                    reason: format!(
                        "credential plugin '{}' has not been run",
                        plugin.command.display()
                    ),
                })
            }
        }

        let http = builder.build().map_err(tls_error)?;
        Ok(Self {
            http,
            server: resolved.server.clone(),
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.server, path)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClusterError> {
        debug!(path = %path, "GET");
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = check(resp).await?;
        resp.json().await.map_err(|e| ClusterError::Decode {
            reason: format!("{path}: {e}"),
        })
    }

    pub async fn get_text(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<String, ClusterError> {
        debug!(path = %path, "GET text");
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let resp = check(resp).await?;
        resp.text().await.map_err(|e| self.transport_error(e))
    }

    pub async fn delete(&self, path: &str) -> Result<(), ClusterError> {
        debug!(path = %path, "DELETE");
        let resp = self
            .http
            .delete(self.url(path))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        check(resp).await?;
        Ok(())
    }

    /// JSON merge patch (RFC 7386).
    pub async fn merge_patch(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<(), ClusterError> {
        debug!(path = %path, "PATCH");
        let resp = self
            .http
            .patch(self.url(path))
            .header(CONTENT_TYPE, MERGE_PATCH)
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        check(resp).await?;
        Ok(())
    }

    fn transport_error(&self, e: reqwest::Error) -> ClusterError {
        if e.is_timeout() {
            ClusterError::Timeout {
                after_ms: self.timeout.as_millis() as u64,
            }
        } else if e.is_connect() {
            ClusterError::Unreachable {
                reason: e.to_string(),
            }
        } else {
            ClusterError::Decode {
                reason: e.to_string(),
            }
        }
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ClusterError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(api_error(status.as_u16(), &body))
}

/// Build an `Api` error, preferring the `message` of a `Status` body.
pub fn api_error(status: u16, body: &str) -> ClusterError {
    let message = serde_json::from_str::<Status>(body)
        .ok()
        .and_then(|s| s.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                format!("request failed with HTTP {status}")
            } else {
                trimmed.chars().take(200).collect()
            }
        });
    ClusterError::Api { status, message }
}

/// Check a DNS-1123 object name before it is spliced into a request path.
pub fn validate_name(kind: &'static str, value: &str) -> Result<(), ClusterError> {
    let valid = !value.is_empty()
        && value.len() <= 253
        && value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
        && value.starts_with(|c: char| c.is_ascii_alphanumeric())
        && value.ends_with(|c: char| c.is_ascii_alphanumeric());
    if valid {
        Ok(())
    } else {
        Err(ClusterError::InvalidName {
            kind,
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{api_error, validate_name};
    use crate::error::ClusterError;

    #[test]
    fn api_error_prefers_status_message() {
        let body = json!({
            "kind": "Status",
            "apiVersion": "v1",
            "status": "Failure",
            "message": "pods is forbidden: User \"dev\" cannot list resource \"pods\"",
            "reason": "Forbidden",
            "code": 403
        })
        .to_string();
        match api_error(403, &body) {
            ClusterError::Api { status, message } => {
                assert_eq!(status, 403);
                assert!(message.starts_with("pods is forbidden"), "{message}");
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn api_error_falls_back_to_body_or_status() {
        match api_error(502, "  bad gateway \n") {
            ClusterError::Api { message, .. } => assert_eq!(message, "bad gateway"),
            other => panic!("expected Api, got {other:?}"),
        }
        match api_error(500, "") {
            ClusterError::Api { message, .. } => {
                assert_eq!(message, "request failed with HTTP 500")
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn names_are_checked_before_use_in_paths() {
        assert!(validate_name("pod", "nginx-7d9f8b-abcde").is_ok());
        assert!(validate_name("namespace", "kube-system").is_ok());
        assert!(validate_name("pod", "../secrets").is_err());
        assert!(validate_name("pod", "Nginx").is_err());
        assert!(validate_name("pod", "").is_err());
        assert!(validate_name("pod", "web/1").is_err());
        assert!(validate_name("pod", "-web").is_err());
    }
}
