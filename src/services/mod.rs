pub mod ai_service;
pub mod gemini; // Google Gemini generateContent API
pub mod identity; // Accounts and session tokens

pub use ai_service::{GenerativeProvider, ProviderFailure};
pub use gemini::GeminiService;
pub use identity::{AccountStore, IdentityProvider, TokenSigner};
