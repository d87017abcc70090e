//! # kubevox-policy
//!
//! A TOML-driven, refuse-by-default confirmation gate for KubeVox.
//!
//! ## Overview
//!
//! This crate provides [`TomlGatePolicy`], which implements the
//! [`GatePolicy`](kubevox_core::traits::GatePolicy) trait. The pipeline
//! consults it after a proposal has been validated and before the adapter
//! runs. Rules are declared in TOML, evaluated in order, and the first
//! matching rule wins. If no rule matches, the call is refused.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use kubevox_policy::{default_policy, TomlGatePolicy};
//!
//! let gate = match path {
//!     Some(p) => TomlGatePolicy::from_file(p)?,
//!     None => default_policy()?,
//! };
//! ```

pub mod engine;
pub mod rule;

pub use engine::TomlGatePolicy;
pub use rule::{GateConfig, GateRule, RuleVerdict};

use kubevox_contracts::error::KubevoxResult;

/// The gate policy shipped with the binary.
pub const DEFAULT_POLICY_TOML: &str = include_str!("../../../policies/default.toml");

/// Build the shipped gate policy.
pub fn default_policy() -> KubevoxResult<TomlGatePolicy> {
    TomlGatePolicy::from_toml_str(DEFAULT_POLICY_TOML)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
