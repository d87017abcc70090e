//! # kubevox-core
//!
//! The command pipeline engine for KubeVox.
//!
//! This crate provides:
//! - The collaborator traits (`Invoker`, `LanguageModel`, `GatePolicy`,
//!   `Confirmer`, `Transcriber`, `Speaker`)
//! - The `OperationStore` catalog and its function-calling exporter
//! - The `Dispatcher` that validates and safely runs a model proposal
//! - The response renderer and the `Pipeline` that wires everything together
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kubevox_core::{Dispatcher, DispatchOptions, OperationStore, Pipeline};
//! ```

pub mod catalog;
pub mod dispatch;
pub mod pipeline;
pub mod render;
pub mod store;
pub mod template;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use dispatch::{DispatchOptions, Dispatcher, PreparedCall, Rejection};
pub use pipeline::{Pipeline, Turn, TurnOutcome};
pub use store::OperationStore;
