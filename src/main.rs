use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;

use nutrisnack::config::Config;
use nutrisnack::handlers::{CalorieHandler, ChatHandler};
use nutrisnack::server::{create_router, AppState};
use nutrisnack::services::{AccountStore, GeminiService, GenerativeProvider, TokenSigner};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("🚀 Starting NutriSnack API server...");

    let config = Config::from_env()?;

    let provider: Option<Arc<dyn GenerativeProvider>> = match &config.gemini_api_key {
        Some(key) => {
            log::info!("✅ Gemini service initialized ({})", config.gemini_api_base);
            Some(Arc::new(GeminiService::new(
                key.clone(),
                config.gemini_api_base.clone(),
            )))
        }
        None => {
            log::warn!("⚠️ GEMINI_API_KEY not set, analysis and chat requests will fail");
            None
        }
    };

    let secret = config.auth_secret.clone().unwrap_or_else(|| {
        log::warn!("⚠️ AUTH_SECRET not set, sessions will not survive a restart");
        format!("{}{}", uuid::Uuid::new_v4(), uuid::Uuid::new_v4())
    });
    let identity = Arc::new(AccountStore::new(TokenSigner::new(secret)));

    let state = AppState {
        calorie: Arc::new(CalorieHandler::new(
            provider.clone(),
            config.analysis_model.clone(),
        )),
        chat: Arc::new(ChatHandler::new(provider, config.chat_model.clone())),
        identity,
        require_auth: config.require_auth,
    };
    log::info!(
        "✅ Handlers initialized (analysis: {}, chat: {})",
        config.analysis_model,
        config.chat_model
    );
    if config.require_auth {
        log::info!("🔐 API routes require a bearer token");
    }

    let app = create_router(state, &config);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;

    log::info!("🌐 Allowed origins: {}", config.allowed_origins.join(", "));
    log::info!("🎉 Server is running on port {}", config.port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    log::info!("🛑 Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
    }
    log::info!("🛑 Shutting down...");
}
