use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::provider_error;
use crate::models::{AnalysisRequest, AnalysisResult};
use crate::services::gemini::{Content, GenerateContentRequest, InlineData, Part};
use crate::services::GenerativeProvider;

pub const DEFAULT_ANALYSIS_MODEL: &str = "gemini-2.0-flash";

const ANALYSIS_PROMPT: &str = "Analyze this food image and provide nutritional information. \
Return ONLY a valid JSON object with this exact structure (no markdown, no explanations): \
{ \"foodName\": \"name of the food\", \"calories\": number, \"nutrients\": { \"protein\": number in grams, \
\"carbs\": number in grams, \"fat\": number in grams }, \"portionSize\": \"estimated portion size\" }";

/// Lenient decode: anything that is not a well-formed request body yields an
/// empty request, which then fails field validation.
pub fn parse_analysis_request(body: &str) -> AnalysisRequest {
    serde_json::from_str(body).unwrap_or_else(|e| {
        log::debug!("Analysis body is not a request object: {}", e);
        AnalysisRequest::default()
    })
}

pub fn build_analysis_request(
    base64_image: &str,
    mime_type: &str,
    additional_context: Option<&str>,
) -> GenerateContentRequest {
    let mut prompt = ANALYSIS_PROMPT.to_string();
    if let Some(context) = additional_context.map(str::trim).filter(|c| !c.is_empty()) {
        prompt.push_str("\n\nAdditional context from the user about this meal: ");
        prompt.push_str(context);
    }

    GenerateContentRequest {
        contents: vec![Content {
            role: None,
            parts: vec![
                Part::text(prompt),
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.to_string(),
                        data: base64_image.to_string(),
                    },
                },
            ],
        }],
        system_instruction: None,
        generation_config: None,
    }
}

/// Strict parse of the model's text into an `AnalysisResult`.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, ApiError> {
    let parse_error = |message: &str| ApiError::Parse {
        message: message.to_string(),
        raw: text.to_string(),
    };

    let result: AnalysisResult = serde_json::from_str(text).map_err(|e| {
        log::error!("❌ Error parsing Gemini response: {}", e);
        parse_error("Failed to parse Gemini response")
    })?;

    if result.food_name.trim().is_empty() {
        return Err(parse_error("Incomplete data in Gemini response"));
    }

    Ok(result)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub struct CalorieHandler {
    provider: Option<Arc<dyn GenerativeProvider>>,
    model: String,
}

impl CalorieHandler {
    pub fn new(provider: Option<Arc<dyn GenerativeProvider>>, model: String) -> Self {
        Self { provider, model }
    }

    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisResult, ApiError> {
        let (base64_image, mime_type) = match (
            non_empty(request.base64_image),
            non_empty(request.mime_type),
        ) {
            (Some(image), Some(mime)) => (image, mime),
            _ => return Err(ApiError::MissingField("base64Image or mimeType".to_string())),
        };

        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| ApiError::Configuration("Gemini API key not configured".to_string()))?;

        log::info!(
            "📸 Analyzing {} image ({} base64 bytes)",
            mime_type,
            base64_image.len()
        );

        let payload = build_analysis_request(
            &base64_image,
            &mime_type,
            request.additional_context.as_deref(),
        );
        let response = provider
            .generate_content(&self.model, &payload)
            .await
            .map_err(|failure| provider_error(failure, |_| "Error from Gemini API".to_string()))?;

        let text = response.first_text().ok_or_else(|| ApiError::Provider {
            message: "Invalid response from Gemini API".to_string(),
            status: None,
            details: None,
        })?;
        log::debug!("💬 Gemini analysis text: {}", text);

        let result = parse_analysis(text)?;
        log::info!("✅ Analysis complete: {} ({} kcal)", result.food_name, result.calories);
        Ok(result)
    }
}
