use std::sync::Arc;

use crate::error::ApiError;
use crate::handlers::provider_error;
use crate::models::{ChatReply, ChatRequest, ChatRole, ChatTurn};
use crate::services::gemini::{
    Content, GenerateContentRequest, GenerationConfig, Part, SystemInstruction,
};
use crate::services::GenerativeProvider;

pub const DEFAULT_CHAT_MODEL: &str = "gemini-1.5-flash-latest";

pub const FALLBACK_REPLY: &str = "I'm sorry, I couldn't process your request. Please try again.";

const SYSTEM_INSTRUCTION: &str = "You are a professional dietician and nutrition expert. \
Provide accurate, evidence-based advice about nutrition, diet plans, healthy eating habits, and food choices. \
Format your responses with clear structure: use **bold** for section titles, use numbered points, \
and use * for bullet points. Be helpful, concise, and personable while maintaining a professional tone. \
When uncertain, acknowledge limitations and avoid making definitive medical claims. \
Focus on general nutritional advice rather than specific medical recommendations.";

const TEMPERATURE: f64 = 0.3;
const TOP_P: f64 = 0.8;
const TOP_K: u32 = 40;
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Decodes and validates a chat body: roles must be `user`/`model`, every
/// turn needs at least one text part, and `message` must be a string.
pub fn parse_chat_request(body: &str) -> Result<ChatRequest, ApiError> {
    let request: ChatRequest =
        serde_json::from_str(body).map_err(|e| ApiError::Validation(e.to_string()))?;

    if let Some(index) = request.history.iter().position(|turn| turn.parts.is_empty()) {
        return Err(ApiError::Validation(format!(
            "history[{}].parts must not be empty",
            index
        )));
    }

    Ok(request)
}

pub fn build_chat_request(history: &[ChatTurn], message: &str) -> GenerateContentRequest {
    let to_content = |turn: &ChatTurn| Content {
        role: Some(turn.role.to_string()),
        parts: turn.parts.iter().map(|p| Part::text(p.text.clone())).collect(),
    };

    let mut contents: Vec<Content> = history.iter().map(to_content).collect();
    contents.push(to_content(&ChatTurn::new(ChatRole::User, message)));

    GenerateContentRequest {
        contents,
        system_instruction: Some(SystemInstruction {
            parts: vec![Part::text(SYSTEM_INSTRUCTION)],
        }),
        generation_config: Some(GenerationConfig {
            temperature: TEMPERATURE,
            top_p: TOP_P,
            top_k: TOP_K,
            max_output_tokens: MAX_OUTPUT_TOKENS,
        }),
    }
}

pub struct ChatHandler {
    provider: Option<Arc<dyn GenerativeProvider>>,
    model: String,
}

impl ChatHandler {
    pub fn new(provider: Option<Arc<dyn GenerativeProvider>>, model: String) -> Self {
        Self { provider, model }
    }

    pub async fn reply(&self, request: ChatRequest) -> Result<ChatReply, ApiError> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            log::error!("GEMINI_API_KEY is not set in environment variables.");
            ApiError::Configuration("Server configuration error".to_string())
        })?;

        log::info!(
            "💬 Chat request with {} prior turns: '{}'",
            request.history.len(),
            request.message
        );

        let payload = build_chat_request(&request.history, &request.message);
        let response = provider
            .generate_content(&self.model, &payload)
            .await
            .map_err(|failure| {
                provider_error(failure, |status_text| {
                    format!("Gemini API Error: {}", status_text)
                })
            })?;

        let response = match response.first_text() {
            Some(text) => text.to_string(),
            None => {
                log::warn!("⚠️ Gemini reply had no text, using fallback");
                FALLBACK_REPLY.to_string()
            }
        };

        Ok(ChatReply { response })
    }
}
