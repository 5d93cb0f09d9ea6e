//! Credential checks for the API routes.
//!
//! Requests authenticate with `Authorization: Token <token>` (or `Bearer`),
//! or with HTTP Basic credentials. Tokens are exchanged for credentials at
//! `POST /api-token-auth`. With no users configured the API runs open, which
//! keeps local development friction-free.

use crate::observability;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;

use super::AppState;
use crate::config::Config;

pub async fn require_auth<B>(
    State(state): State<AppState>,
    request: Request<B>,
    next: Next<B>,
) -> Response {
    if !state.config.auth_enabled() {
        return next.run(request).await;
    }
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|raw| check_credentials(&state.config, raw))
        .unwrap_or(false);
    if authorized {
        next.run(request).await
    } else {
        observability::auth_rejected();
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "authentication required" })),
        )
            .into_response()
    }
}

fn check_credentials(config: &Config, raw: &str) -> bool {
    if let Some(token) = raw.strip_prefix("Token ").or_else(|| raw.strip_prefix("Bearer ")) {
        return config.user_for_token(token.trim()).is_some();
    }
    if let Some(encoded) = raw.strip_prefix("Basic ") {
        if let Ok(decoded) = BASE64.decode(encoded.trim()) {
            if let Ok(text) = String::from_utf8(decoded) {
                if let Some((username, password)) = text.split_once(':') {
                    return config.user_for_credentials(username, password).is_some();
                }
            }
        }
    }
    false
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// Token exchange: credentials in, token out.
pub async fn obtain_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Response {
    match state.config.user_for_credentials(&request.username, &request.password) {
        Some(user) => Json(serde_json::json!({ "token": user.token })).into_response(),
        None => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "unable to log in with provided credentials" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiUser, AuthConfig};

    fn config_with_user() -> Config {
        Config {
            auth: AuthConfig {
                users: vec![ApiUser {
                    username: "admin-der".to_string(),
                    password: "secret".to_string(),
                    token: "tok-123".to_string(),
                }],
            },
            ..Default::default()
        }
    }

    #[test]
    fn token_and_bearer_schemes_are_accepted() {
        let config = config_with_user();
        assert!(check_credentials(&config, "Token tok-123"));
        assert!(check_credentials(&config, "Bearer tok-123"));
        assert!(!check_credentials(&config, "Token wrong"));
    }

    #[test]
    fn basic_credentials_are_decoded() {
        let config = config_with_user();
        let encoded = BASE64.encode("admin-der:secret");
        assert!(check_credentials(&config, &format!("Basic {encoded}")));
        let encoded = BASE64.encode("admin-der:wrong");
        assert!(!check_credentials(&config, &format!("Basic {encoded}")));
    }
}
