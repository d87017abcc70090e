//! Kubeconfig context listing and switching.

use serde_json::{json, Value};
use tracing::info;

use kubevox_contracts::invocation::{BoundArguments, ResultFields};

use super::{fields, str_arg};
use crate::{access::ClusterAccess, error::ClusterError};

pub(crate) async fn available_clusters(
    access: &ClusterAccess,
) -> Result<ResultFields, ClusterError> {
    let (_, config) = access.load_kubeconfig()?;
    let names = config.context_names();
    let active = access
        .active_context(&config)
        .filter(|ctx| names.contains(ctx))
        .map_or(Value::Null, Value::String);

    Ok(fields([
        ("total_clusters", json!(names.len())),
        ("active_cluster", active),
        ("cluster_names", json!(names)),
    ]))
}

pub(crate) async fn switch_cluster(
    access: &ClusterAccess,
    args: &BoundArguments,
) -> Result<ResultFields, ClusterError> {
    let target = str_arg(args, "cluster_name")?;
    access.switch_context(target)?;
    info!(context = %target, "switched cluster context");
    Ok(fields([("cluster_name", json!(target))]))
}

pub(crate) async fn cluster_name(access: &ClusterAccess) -> Result<ResultFields, ClusterError> {
    let (_, config) = access.load_kubeconfig()?;
    let name = access
        .active_context(&config)
        .ok_or_else(|| ClusterError::Kubeconfig {
            reason: "no current-context set".to_string(),
        })?;
    Ok(fields([("cluster_name", json!(name))]))
}
