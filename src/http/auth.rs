//! Bearer-token auth middleware. Validates the JWT, requires a `user_id`
//! claim, and injects a `Principal` into request extensions.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, Validation, decode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::config::JwtConfig;
use crate::error::AuthError;

use super::error_codes::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: String,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub exp: Option<i64>,
}

/// The authenticated caller, injected into request extensions by `require_auth`.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct JwtState {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtState {
    pub fn new(config: &JwtConfig) -> Self {
        let algorithm = config
            .algorithm
            .parse()
            .unwrap_or(jsonwebtoken::Algorithm::HS256);
        Self {
            decoding_key: DecodingKey::from_secret(config.secret_key.expose_secret().as_bytes()),
            validation: Validation::new(algorithm),
        }
    }
}

pub async fn require_auth(
    State(jwt): State<Arc<JwtState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError::from(AuthError::InvalidToken))?;

    let claims = decode_token(&jwt, token)?;

    req.extensions_mut().insert(Principal { user_id: claims.user_id, is_active: claims.is_active });

    Ok(next.run(req).await)
}

fn decode_token(jwt: &JwtState, token: &str) -> Result<Claims, ApiError> {
    let token_data = decode::<Claims>(token, &jwt.decoding_key, &jwt.validation).map_err(|e| {
        let auth_err = match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        };
        tracing::warn!(error = %e, "jwt validation failed");
        ApiError::from(auth_err)
    })?;

    if token_data.claims.user_id.is_empty() {
        return Err(ApiError::from(AuthError::InvalidToken));
    }

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

    fn test_jwt_state(secret: &str) -> JwtState {
        JwtState {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    #[test]
    fn valid_token_decodes_claims() {
        let claims = Claims { user_id: "u1".into(), is_active: Some(true), exp: Some(9_999_999_999) };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"secret")).unwrap();

        let state = test_jwt_state("secret");
        let decoded = decode_token(&state, &token).unwrap();
        assert_eq!(decoded.user_id, "u1");
    }

    #[test]
    fn wrong_secret_is_invalid_token_not_expired() {
        let claims = Claims { user_id: "u1".into(), is_active: None, exp: Some(9_999_999_999) };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"right-secret")).unwrap();

        let state = test_jwt_state("wrong-secret");
        let err = decode_token(&state, &token).unwrap_err();
        assert_eq!(err.0, super::error_codes::ErrorCode::InvalidToken);
    }
}
