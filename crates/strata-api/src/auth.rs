use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine as _;

use crate::state::AppState;

/// Requires either `Authorization: Bearer <token>` or HTTP Basic auth with
/// the token as the password (username is ignored) — some operators front
/// this API with tooling that only speaks Basic auth. Missing, malformed,
/// or incorrect credentials all return 401.
pub async fn require_bearer_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let authorized = match header {
        Some(h) if h.starts_with("Bearer ") => h.trim_start_matches("Bearer ") == state.auth_token.as_str(),
        Some(h) if h.starts_with("Basic ") => decode_basic_password(h.trim_start_matches("Basic "))
            .map(|password| password == state.auth_token.as_str())
            .unwrap_or(false),
        _ => false,
    };

    if authorized {
        next.run(request).await
    } else {
        (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response()
    }
}

fn decode_basic_password(encoded: &str) -> Option<String> {
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    text.split_once(':').map(|(_, password)| password.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_credentials_decode_password_after_colon() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("anyuser:secret-token");
        assert_eq!(decode_basic_password(&encoded).as_deref(), Some("secret-token"));
    }

    #[test]
    fn malformed_basic_credentials_decode_to_none() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("no-colon-here");
        assert_eq!(decode_basic_password(&encoded), None);
    }
}
