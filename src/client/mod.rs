pub mod api;
pub mod chat;
pub mod formatter;
pub mod result_card;
pub mod uploader;

pub use api::{ApiClient, ClientError, NutritionApi};
pub use chat::ChatTranscript;
pub use uploader::{SelectedImage, UploadPhase, UploadWidget};

/// Toast-style message surfaced to the user by the widgets.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Success(String),
    Error(String),
}
