use tw_domain::{CancelToken, Result};

/// The injected LLM callback.
///
/// Implementations translate the prompt into a completion however they
/// like (HTTP, local model, scripted test double) and are required to
/// honour the cancellation token promptly: once it trips, `complete`
/// returns `Error::Cancelled` instead of blocking out the deadline.
#[async_trait::async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(&self, prompt: &str, cancel: &CancelToken) -> Result<String>;
}
