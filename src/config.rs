use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::handlers::calorie::DEFAULT_ANALYSIS_MODEL;
use crate::handlers::chat::DEFAULT_CHAT_MODEL;
use crate::services::gemini::DEFAULT_API_BASE;

pub const DEFAULT_PORT: u16 = 3000;

pub const DEFAULT_ALLOWED_ORIGINS: [&str; 3] = [
    "http://localhost:3000",
    "http://localhost:5173",
    "https://nutrisnack.onrender.com",
];

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub analysis_model: String,
    pub chat_model: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub auth_secret: Option<String>,
    pub require_auth: bool,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let port = match get("PORT") {
            Some(port) => port
                .parse::<u16>()
                .with_context(|| format!("PORT must be a port number, got '{}'", port))?,
            None => DEFAULT_PORT,
        };

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(origins) => origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            None => DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
        };

        let require_auth = match get("REQUIRE_AUTH") {
            Some(flag) => parse_flag(&flag)
                .with_context(|| format!("REQUIRE_AUTH must be true or false, got '{}'", flag))?,
            None => false,
        };

        Ok(Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_api_base: get("GEMINI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            analysis_model: get("GEMINI_ANALYSIS_MODEL")
                .unwrap_or_else(|| DEFAULT_ANALYSIS_MODEL.to_string()),
            chat_model: get("GEMINI_CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            port,
            allowed_origins,
            auth_secret: get("AUTH_SECRET"),
            require_auth,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
