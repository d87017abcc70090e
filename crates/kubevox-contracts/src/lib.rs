//! # kubevox-contracts
//!
//! Shared types, failure taxonomy, and contracts for the KubeVox command
//! pipeline.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod error;
pub mod failure;
pub mod gate;
pub mod invocation;
pub mod model;
pub mod operation;
