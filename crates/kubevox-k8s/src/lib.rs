//! # kubevox-k8s
//!
//! Kubernetes control-plane adapters for KubeVox.
//!
//! This crate provides:
//! - kubeconfig discovery and context resolution (`kubeconfig`, `access`)
//! - exec credential plugins for managed clusters (`exec`)
//! - a small authenticated REST client for the API server (`client`)
//! - the built-in operation catalog and its `Invoker` adapter (`operations`)
//!
//! Every adapter classifies its failures into the execution taxonomy
//! (`Unreachable`, `PermissionDenied`, `NotFound`, `Timeout`, `Unknown`)
//! through `From<ClusterError> for ExecutionFailure`.

pub mod access;
pub mod client;
pub mod error;
pub mod exec;
pub mod kubeconfig;
pub mod models;
pub mod operations;

pub use access::{ClusterAccess, ClusterSettings};
pub use error::ClusterError;
pub use operations::{builtin_catalog, Builtin, ClusterInvoker};
