use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::Role;
use uuid::Uuid;
use crate::api::AppState;

pub const TOKEN_COOKIE: &str = "token";
const PASSWORD_COST: u32 = 10;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token absent")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("user already exists")]
    EmailTaken,

    #[error("user not found")]
    UserNotFound,

    #[error("user is already an admin")]
    AlreadyAdmin,

    #[error("admin role required")]
    AdminOnly,

    #[error("{0}")]
    InvalidInput(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl From<diesel::result::Error> for AuthError {
    fn from(err: diesel::result::Error) -> Self {
        AuthError::Store(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AuthError::Hashing(err.to_string())
    }
}

pub fn issue_token(config: &AuthConfig, user_id: Uuid, role: Role) -> Result<String, AuthError> {
    let exp = Utc::now().timestamp() + config.token_ttl_secs;
    let claims = Claims {
        sub: user_id,
        role,
        exp: exp.max(0) as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(config.secret.as_bytes()))
        .map_err(|e| AuthError::Signing(e.to_string()))
}

pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims, AuthError> {
    decode::<Claims>(token, &DecodingKey::from_secret(config.secret.as_bytes()), &Validation::default())
        .map(|data| data.claims)
        .map_err(|_| AuthError::InvalidToken)
}

// bcrypt is CPU bound, keep it off the async workers.
pub async fn hash_password(password: String) -> Result<String, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, PASSWORD_COST))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(AuthError::from)
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AuthError::Hashing(e.to_string()))?
        .map_err(AuthError::from)
}

/// Reads the session token from the `token` cookie, falling back to an
/// `Authorization: Bearer` header.
fn token_from_parts(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        return Some(cookie.value().to_string());
    }

    parts.headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Caller identity resolved from a verified token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = token_from_parts(parts).ok_or(AuthError::MissingToken)?;
        let claims = verify_token(&state.auth, &token)?;
        Ok(AuthUser { id: claims.sub, role: claims.role })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.role != Role::Admin {
            return Err(AuthError::AdminOnly);
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            secret: "test-secret".to_string(),
            token_ttl_secs: 3600,
        }
    }

    #[test]
    fn test_token_round_trip() {
        let user_id = Uuid::new_v4();
        let token = issue_token(&config(), user_id, Role::Admin).unwrap();

        let claims = verify_token(&config(), &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let token = issue_token(&config(), Uuid::new_v4(), Role::User).unwrap();
        let other = AuthConfig { secret: "another".to_string(), ..config() };

        assert!(matches!(verify_token(&other, &token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let expired = AuthConfig { token_ttl_secs: -3600, ..config() };
        let token = issue_token(&expired, Uuid::new_v4(), Role::User).unwrap();

        assert!(matches!(verify_token(&config(), &token), Err(AuthError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_password_hash_and_verify() {
        let hash = hash_password("hunter2".to_string()).await.unwrap();

        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password("hunter3".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_token_from_cookie_or_bearer_header() {
        let (parts, _) = axum::http::Request::builder()
            .header("cookie", "theme=dark; token=abc.def.ghi")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(token_from_parts(&parts).as_deref(), Some("abc.def.ghi"));

        let (parts, _) = axum::http::Request::builder()
            .header("authorization", "Bearer xyz")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(token_from_parts(&parts).as_deref(), Some("xyz"));

        let (parts, _) = axum::http::Request::builder().body(()).unwrap().into_parts();
        assert!(token_from_parts(&parts).is_none());
    }
}
