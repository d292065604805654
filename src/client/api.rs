use crate::models::{
    AnalysisRequest, AnalysisResult, ChatReply, ChatRequest, ChatTurn, Credentials, ErrorBody,
    Session,
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response from API: {0}")]
    InvalidResponse(String),

    #[error("Not signed in")]
    NotSignedIn,
}

/// Backend operations the upload widget and chat transcript depend on.
#[async_trait::async_trait]
pub trait NutritionApi: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ClientError>;
    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<ChatReply, ClientError>;
}

/// HTTP client for the proxy service.
pub struct ApiClient {
    base_url: String,
    session: Option<Session>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: Option<&str>) -> Self {
        let base_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_API_BASE_URL);

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session: None,
            client: reqwest::Client::new(),
        }
    }

    /// Joins the base URL and an endpoint, adding the leading slash if needed.
    pub fn api_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}/{}", self.base_url, endpoint)
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T, ClientError>
    where
        B: serde::Serialize + ?Sized,
        T: serde::de::DeserializeOwned,
    {
        let mut request = self.client.post(self.api_url(endpoint)).json(body);
        if let Some(session) = &self.session {
            request = request.bearer_auth(&session.token);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            log::error!("API error response ({}): {}", status, text);
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("Request failed with status {}", status.as_u16()));
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&text).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    pub async fn signup(&mut self, email: &str, password: &str) -> Result<&Session, ClientError> {
        self.authenticate("/api/auth/signup", email, password).await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&Session, ClientError> {
        self.authenticate("/api/auth/login", email, password).await
    }

    async fn authenticate(
        &mut self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<&Session, ClientError> {
        let credentials = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        let session: Session = self.post(endpoint, &credentials).await?;
        log::info!("Signed in as {}", session.email);
        Ok(&*self.session.insert(session))
    }

    /// Revokes the session server-side and forgets it locally.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let session = self.session.take().ok_or(ClientError::NotSignedIn)?;

        let response = self
            .client
            .post(self.api_url("/api/auth/logout"))
            .bearer_auth(&session.token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: format!("Logout failed with status {}", status.as_u16()),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NutritionApi for ApiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ClientError> {
        self.post("/api/calorie/analyze", request).await
    }

    async fn chat(&self, history: &[ChatTurn], message: &str) -> Result<ChatReply, ClientError> {
        let request = ChatRequest {
            history: history.to_vec(),
            message: message.to_string(),
        };
        self.post("/api/chat", &request).await
    }
}
