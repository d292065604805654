use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::models::{Credentials, Session};

type HmacSha256 = Hmac<Sha256>;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Identity backend behind signup / login / logout.
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn signup(&self, credentials: &Credentials) -> Result<Session, ApiError>;
    async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError>;
    async fn logout(&self, token: &str) -> Result<(), ApiError>;
    /// Returns the email the token was issued to.
    async fn verify(&self, token: &str) -> Result<String, ApiError>;
}

/// Issues and checks `base64url(email:expiry).hex(hmac)` session tokens.
pub struct TokenSigner {
    secret: Vec<u8>,
    ttl: Duration,
}

impl TokenSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            ttl: Duration::days(7),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn mac(&self) -> HmacSha256 {
        // HMAC accepts keys of any length
        HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size")
    }

    pub fn issue(&self, email: &str) -> String {
        let expiry = (Utc::now() + self.ttl).timestamp();
        let payload = URL_SAFE_NO_PAD.encode(format!("{}:{}", email, expiry));

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{}.{}", payload, signature)
    }

    pub fn verify(&self, token: &str) -> Result<String, ApiError> {
        self.claims(token).map(|(email, _)| email)
    }

    /// Checks the signature and expiry, returning the email and expiry timestamp.
    fn claims(&self, token: &str) -> Result<(String, i64), ApiError> {
        let invalid = || ApiError::Unauthorized("Invalid session token".to_string());

        let (payload, signature) = token.rsplit_once('.').ok_or_else(invalid)?;
        let signature = hex::decode(signature).map_err(|_| invalid())?;

        let mut mac = self.mac();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;

        let decoded = URL_SAFE_NO_PAD.decode(payload).map_err(|_| invalid())?;
        let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
        let (email, expiry) = decoded.rsplit_once(':').ok_or_else(invalid)?;
        let expiry: i64 = expiry.parse().map_err(|_| invalid())?;

        if expiry <= Utc::now().timestamp() {
            return Err(ApiError::Unauthorized("Session expired".to_string()));
        }

        Ok((email.to_string(), expiry))
    }
}

struct StoredAccount {
    salt: String,
    digest: Vec<u8>,
}

fn password_mac(salt: &str, password: &str) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(salt.as_bytes()).expect("HMAC can take key of any size");
    mac.update(password.as_bytes());
    mac
}

fn hash_password(salt: &str, password: &str) -> Vec<u8> {
    password_mac(salt, password).finalize().into_bytes().to_vec()
}

/// Constant-time comparison against the stored digest.
fn password_matches(account: &StoredAccount, password: &str) -> bool {
    password_mac(&account.salt, password)
        .verify_slice(&account.digest)
        .is_ok()
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::Validation("email address is malformed".to_string())),
    }
}

/// Process-local account store with signed, revocable session tokens.
pub struct AccountStore {
    accounts: RwLock<HashMap<String, StoredAccount>>,
    /// Revoked token -> its expiry timestamp. Entries are dropped once expired.
    revoked: RwLock<HashMap<String, i64>>,
    signer: TokenSigner,
}

impl AccountStore {
    pub fn new(signer: TokenSigner) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashMap::new()),
            signer,
        }
    }

    fn session_for(&self, email: String) -> Session {
        let token = self.signer.issue(&email);
        Session { email, token }
    }

    async fn check(&self, token: &str) -> Result<(String, i64), ApiError> {
        if self.revoked.read().await.contains_key(token) {
            return Err(ApiError::Unauthorized("Session has been revoked".to_string()));
        }
        self.signer.claims(token)
    }
}

#[async_trait::async_trait]
impl IdentityProvider for AccountStore {
    async fn signup(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let email = normalize_email(&credentials.email)?;
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ApiError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&email) {
            return Err(ApiError::Conflict("Account already exists".to_string()));
        }

        let salt = uuid::Uuid::new_v4().simple().to_string();
        let digest = hash_password(&salt, &credentials.password);
        accounts.insert(email.clone(), StoredAccount { salt, digest });
        drop(accounts);

        log::info!("👤 Account created: {}", email);
        Ok(self.session_for(email))
    }

    async fn login(&self, credentials: &Credentials) -> Result<Session, ApiError> {
        let rejected = || ApiError::Unauthorized("Invalid email or password".to_string());
        let email = normalize_email(&credentials.email).map_err(|_| rejected())?;

        let accounts = self.accounts.read().await;
        let account = accounts.get(&email).ok_or_else(rejected)?;
        if !password_matches(account, &credentials.password) {
            log::warn!("⚠️ Failed login for {}", email);
            return Err(rejected());
        }
        drop(accounts);

        log::info!("🔐 Login: {}", email);
        Ok(self.session_for(email))
    }

    async fn logout(&self, token: &str) -> Result<(), ApiError> {
        let (email, expiry) = self.check(token).await?;

        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, expires| *expires > now);
        revoked.insert(token.to_string(), expiry);
        drop(revoked);

        log::info!("👋 Logout: {}", email);
        Ok(())
    }

    async fn verify(&self, token: &str) -> Result<String, ApiError> {
        self.check(token).await.map(|(email, _)| email)
    }
}
