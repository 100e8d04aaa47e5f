//! Accounts: signup and login with bcrypt password hashes, and signed JWT
//! bearer tokens identifying the user behind a search.

use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingFields,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(_) => AuthError::EmailTaken,
            other => AuthError::Store(other),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    store: Store,
    jwt_secret: String,
    token_ttl_secs: i64,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(store: Store, jwt_secret: &str, token_ttl_secs: i64) -> Self {
        Self {
            store,
            jwt_secret: jwt_secret.to_string(),
            token_ttl_secs,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Register an account and sign the user in.
    pub async fn signup(&self, credentials: Credentials) -> Result<TokenResponse, AuthError> {
        let (email, password) = normalize(credentials)?;

        let cost = self.hash_cost;
        let password_hash = tokio::task::spawn_blocking(move || hash(password, cost))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(|e| AuthError::Internal(format!("Password hashing failed: {}", e)))?;

        let user_id = self.store.create_user(&email, &password_hash).await?;
        info!(user_id, "account created");
        self.issue_token(user_id, &email)
    }

    pub async fn login(&self, credentials: Credentials) -> Result<TokenResponse, AuthError> {
        let (email, password) = normalize(credentials)?;
        let user = self
            .store
            .find_user(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let stored = user.password_hash.clone();
        let valid = tokio::task::spawn_blocking(move || verify(password, &stored))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(|e| AuthError::Internal(format!("Password verification failed: {}", e)))?;

        if !valid {
            return Err(AuthError::InvalidCredentials);
        }
        self.issue_token(user.id, &user.email)
    }

    /// Validate a bearer token and return the user id it carries.
    pub fn verify_token(&self, token: &str) -> Result<i64, AuthError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        data.claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("subject is not a user id".to_string()))
    }

    fn issue_token(&self, user_id: i64, email: &str) -> Result<TokenResponse, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: (now + Duration::seconds(self.token_ttl_secs)).timestamp(),
            iat: now.timestamp(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(TokenResponse {
            token,
            token_type: "Bearer",
            expires_in: self.token_ttl_secs,
        })
    }
}

/// Trim and lowercase the email; both fields must be non-empty.
fn normalize(credentials: Credentials) -> Result<(String, String), AuthError> {
    let email = credentials.email.trim().to_lowercase();
    if email.is_empty() || credentials.password.is_empty() {
        return Err(AuthError::MissingFields);
    }
    Ok((email, credentials.password))
}

/// "Bearer abc" → "abc".
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::memory_store;

    async fn service() -> AuthService {
        AuthService::new(memory_store().await, "test-secret", 3600).with_hash_cost(4)
    }

    fn creds(email: &str, password: &str) -> Credentials {
        Credentials { email: email.into(), password: password.into() }
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let auth = service().await;
        let signed_up = auth.signup(creds("  Ada@Example.COM ", "hunter2")).await.unwrap();
        let uid = auth.verify_token(&signed_up.token).unwrap();

        let logged_in = auth.login(creds("ada@example.com", "hunter2")).await.unwrap();
        assert_eq!(auth.verify_token(&logged_in.token).unwrap(), uid);
        assert_eq!(logged_in.token_type, "Bearer");
        assert_eq!(logged_in.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_signup_duplicate_email_rejected() {
        let auth = service().await;
        auth.signup(creds("ada@example.com", "a")).await.unwrap();
        let err = auth.signup(creds("ADA@example.com", "b")).await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let auth = service().await;
        assert!(matches!(auth.signup(creds("  ", "pw")).await, Err(AuthError::MissingFields)));
        assert!(matches!(auth.login(creds("a@b.c", "")).await, Err(AuthError::MissingFields)));
    }

    #[tokio::test]
    async fn test_login_wrong_password_or_unknown_user() {
        let auth = service().await;
        auth.signup(creds("ada@example.com", "right")).await.unwrap();
        assert!(matches!(
            auth.login(creds("ada@example.com", "wrong")).await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login(creds("bob@example.com", "right")).await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_rejected() {
        let store = memory_store().await;
        let issuer = AuthService::new(store.clone(), "one", 3600).with_hash_cost(4);
        let verifier = AuthService::new(store, "two", 3600);
        let token = issuer.signup(creds("ada@example.com", "pw")).await.unwrap().token;
        assert!(matches!(verifier.verify_token(&token), Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let auth = AuthService::new(memory_store().await, "s", -3600).with_hash_cost(4);
        let token = auth.signup(creds("ada@example.com", "pw")).await.unwrap().token;
        assert!(auth.verify_token(&token).is_err());
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
    }
}
