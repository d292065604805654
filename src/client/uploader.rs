use std::path::Path;

use anyhow::Context;
use base64::{engine::general_purpose, Engine};

use super::api::{ClientError, NutritionApi};
use super::Notification;
use crate::models::{AnalysisRequest, AnalysisResult};

/// A food photo picked by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedImage {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl SelectedImage {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Reads an image from disk, guessing the MIME type from the extension.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read the image {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        log::debug!("📊 Image file size: {} bytes", bytes.len());
        Ok(Self::new(file_name.clone(), mime_type_for(&file_name), bytes))
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.bytes)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

pub fn mime_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPhase {
    Empty,
    Previewing,
    Analyzing,
    Result,
}

/// Upload-and-analyze widget state.
///
/// A failed analysis drops back to `Previewing` with the image kept, so the
/// user can retry without picking the file again.
#[derive(Debug)]
pub struct UploadWidget {
    phase: UploadPhase,
    image: Option<SelectedImage>,
    preview: Option<String>,
    context: String,
    result: Option<AnalysisResult>,
    notifications: Vec<Notification>,
}

impl Default for UploadWidget {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadWidget {
    pub fn new() -> Self {
        Self {
            phase: UploadPhase::Empty,
            image: None,
            preview: None,
            context: String::new(),
            result: None,
            notifications: Vec::new(),
        }
    }

    pub fn phase(&self) -> UploadPhase {
        self.phase
    }

    pub fn preview(&self) -> Option<&str> {
        self.preview.as_deref()
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.result.as_ref()
    }

    /// The trigger is disabled while a request is in flight or nothing is selected.
    pub fn can_analyze(&self) -> bool {
        self.image.is_some() && self.phase != UploadPhase::Analyzing
    }

    pub fn set_context(&mut self, context: impl Into<String>) {
        self.context = context.into();
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Returns `false` if a request is in flight and the selection was ignored.
    pub fn select(&mut self, image: SelectedImage) -> bool {
        if self.phase == UploadPhase::Analyzing {
            return false;
        }

        self.preview = Some(image.data_url());
        self.image = Some(image);
        self.result = None;
        self.phase = UploadPhase::Previewing;
        true
    }

    pub fn clear(&mut self) -> bool {
        if self.phase == UploadPhase::Analyzing {
            return false;
        }

        self.image = None;
        self.preview = None;
        self.result = None;
        self.phase = UploadPhase::Empty;
        true
    }

    /// Moves to `Analyzing` and returns the request to send, or `None` when
    /// the trigger is disabled.
    pub fn start_analysis(&mut self) -> Option<AnalysisRequest> {
        if self.phase == UploadPhase::Analyzing {
            return None;
        }
        let Some(image) = &self.image else {
            self.notifications
                .push(Notification::Error("Please select an image first".to_string()));
            return None;
        };

        let context = self.context.trim();
        let request = AnalysisRequest {
            base64_image: Some(image.to_base64()),
            mime_type: Some(image.mime_type.clone()),
            additional_context: (!context.is_empty()).then(|| context.to_string()),
        };

        self.phase = UploadPhase::Analyzing;
        Some(request)
    }

    pub fn finish_analysis(&mut self, outcome: Result<AnalysisResult, ClientError>) {
        if self.phase != UploadPhase::Analyzing {
            log::warn!("Analysis finished while not analyzing; ignoring");
            return;
        }

        match outcome {
            Ok(result) => {
                log::info!("✅ Analysis complete: {}", result.food_name);
                self.result = Some(result);
                self.phase = UploadPhase::Result;
                self.notifications
                    .push(Notification::Success("Analysis complete!".to_string()));
            }
            Err(e) => {
                log::error!("Error analyzing image: {}", e);
                self.phase = UploadPhase::Previewing;
                self.notifications.push(Notification::Error(e.to_string()));
            }
        }
    }

    pub async fn analyze(&mut self, api: &dyn NutritionApi) {
        if let Some(request) = self.start_analysis() {
            let outcome = api.analyze(&request).await;
            self.finish_analysis(outcome);
        }
    }
}
