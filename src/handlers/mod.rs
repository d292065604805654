pub mod calorie;
pub mod chat;

pub use calorie::CalorieHandler;
pub use chat::ChatHandler;

use crate::error::ApiError;
use crate::services::ProviderFailure;

/// Maps a provider failure onto the HTTP error, naming non-success statuses
/// with `describe(status_text)`.
pub(crate) fn provider_error(
    failure: ProviderFailure,
    describe: impl FnOnce(&str) -> String,
) -> ApiError {
    match failure {
        ProviderFailure::Status {
            status,
            status_text,
            body,
        } => ApiError::Provider {
            message: describe(&status_text),
            status: Some(status),
            details: Some(body),
        },
        ProviderFailure::Transport(cause) => ApiError::Transport(cause),
        ProviderFailure::Decode(cause) => ApiError::Provider {
            message: "Invalid response from Gemini API".to_string(),
            status: None,
            details: Some(cause),
        },
    }
}
