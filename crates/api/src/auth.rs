use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{ApiError, AppState};

/// Rejects any `/api` request whose bearer token is not the configured
/// `API_TOKEN`.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let presented = bearer_token(request.headers());
    let token_present = presented.is_some();
    if presented == Some(state.api_token.as_str()) {
        return Ok(next.run(request).await);
    }

    warn!(
        method = %request.method(),
        path = %request.uri().path(),
        token_present,
        "Rejected API request"
    );
    Err(ApiError::Unauthorized)
}

/// The credential of an `Authorization: Bearer <token>` header. The scheme
/// is matched case-insensitively; an empty token counts as absent.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
