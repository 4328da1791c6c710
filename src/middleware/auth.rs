use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::AppError;
use crate::AppState;

/// HTTP basic auth where the username must equal the server key. The
/// password is ignored.
pub async fn server_key_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let username = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(basic_auth_username);

    match username {
        Some(user) if user == state.service.server_key() => Ok(next.run(req).await),
        _ => {
            tracing::warn!(path = %req.uri().path(), "rejected request with invalid credentials");
            Err(AppError::Unauthorized)
        }
    }
}

fn basic_auth_username(header: &str) -> Option<String> {
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (username, _password) = credentials.split_once(':')?;
    Some(username.to_string())
}
