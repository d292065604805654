use super::api::{ClientError, NutritionApi};
use super::formatter;
use super::Notification;
use crate::handlers::chat::FALLBACK_REPLY;
use crate::models::{ChatReply, ChatRole, ChatTurn};

pub const GREETING: &str = "Hello! I'm your nutrition assistant. Feel free to ask me about diet \
recommendations, nutritional information, or healthy eating habits. How can I help you today?";

pub const CONNECTION_TROUBLE: &str =
    "I'm sorry, I'm having trouble connecting right now. Please try again in a moment.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptMessage {
    pub speaker: Speaker,
    pub content: String,
}

impl TranscriptMessage {
    /// Assistant text goes through the reply formatter; user text is escaped verbatim.
    pub fn to_html(&self) -> String {
        match self.speaker {
            Speaker::Assistant => formatter::reply_to_html(&self.content),
            Speaker::User => formatter::escape_html(&self.content).replace('\n', "<br/>"),
        }
    }

    fn to_turn(&self) -> ChatTurn {
        let role = match self.speaker {
            Speaker::User => ChatRole::User,
            Speaker::Assistant => ChatRole::Model,
        };
        ChatTurn::new(role, self.content.clone())
    }
}

/// Client-side conversation with the nutrition assistant.
///
/// The server keeps no session, so every send replays the whole transcript.
#[derive(Debug)]
pub struct ChatTranscript {
    messages: Vec<TranscriptMessage>,
    pending: bool,
    notifications: Vec<Notification>,
}

impl Default for ChatTranscript {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self {
            messages: vec![TranscriptMessage {
                speaker: Speaker::Assistant,
                content: GREETING.to_string(),
            }],
            pending: false,
            notifications: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[TranscriptMessage] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Appends the user's message and returns the history and message to send.
    /// Blank input, or input while a reply is pending, is ignored.
    pub fn begin_send(&mut self, input: &str) -> Option<(Vec<ChatTurn>, String)> {
        if self.pending || input.trim().is_empty() {
            return None;
        }

        let history = self.messages.iter().map(TranscriptMessage::to_turn).collect();
        self.messages.push(TranscriptMessage {
            speaker: Speaker::User,
            content: input.to_string(),
        });
        self.pending = true;

        Some((history, input.to_string()))
    }

    pub fn finish_send(&mut self, outcome: Result<ChatReply, ClientError>) {
        if !self.pending {
            return;
        }
        self.pending = false;

        let content = match outcome {
            Ok(reply) if reply.response.is_empty() => FALLBACK_REPLY.to_string(),
            Ok(reply) => reply.response,
            Err(e) => {
                log::error!("Error sending message: {}", e);
                self.notifications
                    .push(Notification::Error(format!("Failed to get response: {}", e)));
                CONNECTION_TROUBLE.to_string()
            }
        };

        self.messages.push(TranscriptMessage {
            speaker: Speaker::Assistant,
            content,
        });
    }

    pub async fn send(&mut self, api: &dyn NutritionApi, input: &str) {
        if let Some((history, message)) = self.begin_send(input) {
            let outcome = api.chat(&history, &message).await;
            self.finish_send(outcome);
        }
    }
}
