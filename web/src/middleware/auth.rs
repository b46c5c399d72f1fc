use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use log::*;
use serde_json::json;

use crate::AppState;

/// True when no token is expected, or the `Authorization: Bearer` value matches it.
pub(crate) fn bearer_matches(headers: &HeaderMap, expected: Option<&str>) -> bool {
    let Some(expected) = expected else {
        return true;
    };

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected)
}

pub(crate) fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "Unauthorized" })),
    )
        .into_response()
}

/// Guards the call maintenance endpoints with `admin_api_token`. Open when no token is configured.
pub async fn require_admin_token(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let expected = app_state.config.admin_api_token();
    if bearer_matches(request.headers(), expected.as_deref()) {
        next.run(request).await
    } else {
        warn!(
            "Rejected {} {} with a missing or wrong admin token",
            request.method(),
            request.uri().path()
        );
        unauthorized()
    }
}
