//! Core trait definitions for the KubeVox pipeline.
//!
//! These traits define the trust boundary around the dispatch engine:
//!
//! - `LanguageModel`: untrusted proposer (may hallucinate operations)
//! - `Invoker`: trusted adapter into the cluster control plane
//! - `GatePolicy`: trusted gate deciding whether a prepared call may run
//! - `Confirmer`: asks the user before a gated call runs
//! - `Transcriber` / `Speaker`: speech I/O at the edges of the pipeline
//!
//! The dispatcher guarantees that `Invoker::invoke()` is never called for a
//! proposal that has not been resolved against the catalog and fully typed.

use async_trait::async_trait;

use kubevox_contracts::{
    error::KubevoxResult,
    failure::ExecutionFailure,
    gate::{GateContext, GateVerdict},
    invocation::{BoundArguments, ResultFields},
    model::{AudioClip, FunctionSpec, ModelReply},
};

/// An adapter that performs one catalog operation against the cluster.
///
/// Adapters hold no per-request state. Each call is stateless and, for
/// non-mutating operations, idempotent at the protocol level.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Names of the result fields `invoke()` returns on success.
    ///
    /// The operation store checks response-template placeholders against
    /// this list at registration time.
    fn result_fields(&self) -> &[&'static str];

    /// Run the operation with a validated, typed, defaulted argument set.
    ///
    /// Failures must be classified into the execution taxonomy; the
    /// dispatcher never inspects adapter internals.
    async fn invoke(&self, arguments: &BoundArguments) -> Result<ResultFields, ExecutionFailure>;
}

/// The language-model backend that maps a transcript onto the catalog.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Propose either one function call or a plain-text reply.
    async fn propose(
        &self,
        transcript: &str,
        catalog: &[FunctionSpec],
    ) -> KubevoxResult<ModelReply>;
}

/// The policy consulted between validation and invocation.
///
/// Implementations must be deterministic and fast; no I/O on this path.
pub trait GatePolicy: Send + Sync {
    fn evaluate(&self, ctx: &GateContext<'_>) -> KubevoxResult<GateVerdict>;
}

/// Asks the user whether a gated call should run.
#[async_trait]
pub trait Confirmer: Send + Sync {
    /// Return true only on an explicit yes.
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Speech-to-text engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioClip) -> KubevoxResult<String>;
}

/// Text-to-speech engine.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> KubevoxResult<()>;
}
