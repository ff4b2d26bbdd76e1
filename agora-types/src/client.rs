//! Model invocation seam.

use async_trait::async_trait;

use crate::error::ModelError;
use crate::secret::ByokCredentials;
use crate::stream::ModelStream;

/// One turn's generation request.
///
/// Borrowed throughout: the system prompt and BYOK credentials live in
/// the execution plan for the whole bout, and the key in particular must
/// not be copied around. `byok = None` means platform credentials.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Wire model id to invoke.
    pub model: &'a str,
    /// System prompt (persona + format directives). `None` for
    /// system-less calls like share-line generation.
    pub system: Option<&'a str>,
    /// User prompt (context + transcript + turn instruction).
    pub user: &'a str,
    /// Output token cap for this turn.
    pub max_output_tokens: u32,
    /// Caller-supplied credentials, when this is a BYOK bout.
    pub byok: Option<&'a ByokCredentials>,
}

/// LLM invocation interface.
///
/// Object-safe on purpose — the engine holds `Arc<dyn ModelClient>` so
/// tests can swap in a scripted client. One call = one streamed turn;
/// retry policy, if any, lives inside the implementation.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Start a streaming generation. Errors here mean the request never
    /// got going; mid-stream failures arrive as stream events.
    async fn stream(&self, request: GenerationRequest<'_>) -> Result<ModelStream, ModelError>;
}
