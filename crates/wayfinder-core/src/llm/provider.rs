//! Generative model port.

use wayfinder_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// A chat completion backend. Implemented in `wayfinder-infra` by
/// `OpenAiCompatibleProvider` and in tests by a scripted mock.
pub trait LlmProvider: Send + Sync {
    /// Short backend name, reported as `gen_ai.system`.
    fn name(&self) -> &str;

    /// One non-streaming completion. Timeouts are applied by the caller.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
