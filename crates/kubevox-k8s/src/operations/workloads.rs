//! Mutating workload operations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::info;

use kubevox_contracts::invocation::{BoundArguments, ResultFields};

use super::{fields, namespace_arg, str_arg};
use crate::{access::ClusterAccess, client::validate_name, error::ClusterError};

const RESTARTED_AT: &str = "kubectl.kubernetes.io/restartedAt";

pub(crate) async fn delete_pod(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let pod = str_arg(args, "pod_name")?;
    let namespace = namespace_arg(args)?;
    validate_name("pod", pod)?;

    let (client, _) = access.connect().await?;
    client
        .delete(&format!("/api/v1/namespaces/{namespace}/pods/{pod}"))
        .await?;
    info!(pod = %pod, namespace = %namespace, "pod deleted");
    Ok(ResultFields::new())
}

pub(crate) async fn restart_deployment(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let deployment = str_arg(args, "deployment_name")?;
    let namespace = namespace_arg(args)?;
    validate_name("deployment", deployment)?;

    let now = Utc::now();
    let (client, _) = access.connect().await?;
    client
        .merge_patch(
            &format!("/apis/apps/v1/namespaces/{namespace}/deployments/{deployment}"),
            &restart_patch(now),
        )
        .await?;
    info!(deployment = %deployment, namespace = %namespace, "rollout restart triggered");
    Ok(fields([("restarted_at", json!(now.format("%H:%M UTC").to_string()))]))
}

pub(crate) async fn scale_deployment(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let deployment = str_arg(args, "deployment_name")?;
    let namespace = namespace_arg(args)?;
    validate_name("deployment", deployment)?;
    let replicas = args
        .get_i64("replicas")
        .ok_or(ClusterError::MissingArgument { name: "replicas" })?;
    if !(0..=i64::from(i32::MAX)).contains(&replicas) {
        return Err(ClusterError::Api {
            status: 422,
            message: format!("replicas must be between 0 and {}, got {replicas}", i32::MAX),
        });
    }

    let (client, _) = access.connect().await?;
    client
        .merge_patch(
            &format!("/apis/apps/v1/namespaces/{namespace}/deployments/{deployment}/scale"),
            &json!({ "spec": { "replicas": replicas } }),
        )
        .await?;
    info!(deployment = %deployment, namespace = %namespace, replicas, "deployment scaled");
    Ok(ResultFields::new())
}

/// The same pod-template annotation `kubectl rollout restart` writes.
fn restart_patch(at: DateTime<Utc>) -> Value {
    json!({
        "spec": { "template": { "metadata": { "annotations": {
            RESTARTED_AT: at.to_rfc3339_opts(SecondsFormat::Secs, true)
        } } } }
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn restart_patch_sets_pod_template_annotation() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let patch = restart_patch(at);
        assert_eq!(
            patch["spec"]["template"]["metadata"]["annotations"][RESTARTED_AT],
            "2024-05-01T10:30:00Z"
        );
    }
}
