//! Bearer-token principal extraction
//!
//! Tokens are issued elsewhere; this service only validates HS256 JWTs
//! signed with the shared `JWT_SECRET`.

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// JWT claims accepted by the service
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (principal id)
    pub sub: String,
    #[serde(default)]
    pub username: Option<String>,
    pub exp: usize,
}

/// Authenticated identity allowed to create and delete polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub username: Option<String>,
}

#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> AppResult<Principal> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::warn!("JWT validation failed: {}", e);
            AppError::Unauthorized
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized);
        }

        Ok(Principal {
            id: data.claims.sub,
            username: data.claims.username,
        })
    }
}

/// `Authorization: Bearer <token>` value, if present
pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn principal_from_request(req: &HttpRequest) -> AppResult<Principal> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("AppState not registered".to_string()))?;
    let token = bearer_token(req).ok_or(AppError::Unauthorized)?;
    state.verifier.verify(token)
}

/// Handlers take `Option<Principal>` and let the service decide; a missing
/// or invalid token yields `None`.
impl FromRequest for Principal {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(principal_from_request(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn create_test_jwt(sub: &str, expires_in_seconds: i64, secret: &str) -> String {
        let exp = (chrono::Utc::now().timestamp() + expires_in_seconds) as usize;
        let claims = Claims {
            sub: sub.to_string(),
            username: Some("alice".to_string()),
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_token_yields_principal() {
        let verifier = TokenVerifier::new("test-secret");
        let principal = verifier
            .verify(&create_test_jwt("user-1", 3600, "test-secret"))
            .unwrap();
        assert_eq!(principal.id, "user-1");
        assert_eq!(principal.username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let verifier = TokenVerifier::new("test-secret");
        let token = create_test_jwt("user-1", -3600, "test-secret");
        assert_eq!(verifier.verify(&token), Err(AppError::Unauthorized));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let verifier = TokenVerifier::new("test-secret");
        let token = create_test_jwt("user-1", 3600, "other-secret");
        assert_eq!(verifier.verify(&token), Err(AppError::Unauthorized));
    }

    #[test]
    fn test_bearer_token_parsing() {
        let req = actix_web::test::TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def"));

        let req = actix_web::test::TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic xyz"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
