use crate::services::gemini::{GenerateContentRequest, GenerateContentResponse};

/// Why a call to the generative provider produced no usable envelope.
#[derive(Debug, thiserror::Error)]
pub enum ProviderFailure {
    /// The provider answered with a non-success HTTP status.
    #[error("provider returned {status} {status_text}")]
    Status {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("provider unreachable: {0}")]
    Transport(String),

    /// The response body was not a `generateContent` envelope.
    #[error("provider response could not be decoded: {0}")]
    Decode(String),
}

/// Trait for generative AI backends (Gemini, test doubles, ...)
#[async_trait::async_trait]
pub trait GenerativeProvider: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ProviderFailure>;
}
