use axum::extract::{Request, State};
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use sharekeep_auth::AuthError;
use sharekeep_core::protocol::ErrorKind;

use crate::error::error_response;
use crate::ApiState;

/// Resolves the bearer token into an [`sharekeep_auth::AuthContext`]
/// request extension, or answers 401 before any handler runs.
pub(crate) async fn require_bearer(
    State(state): State<ApiState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return unauthenticated(&AuthError::MissingToken);
    };

    match state.validator.validate_token(&token).await {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(error) => {
            tracing::debug!(error = %error, "bearer token rejected");
            unauthenticated(&error)
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthenticated(error: &AuthError) -> Response {
    let mut response = error_response(ErrorKind::Unauthenticated, error.to_string());
    response
        .headers_mut()
        .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::test_support::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).expect("header"));
        headers
    }

    #[test]
    fn parses_bearer_scheme_case_insensitively() {
        assert_eq!(bearer_token(&headers("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("bearer  abc ")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn missing_token_is_unauthenticated() {
        let harness = Harness::new().await;
        let (status, body) = harness.call("GET", "/api/v1/shared", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");
        assert_eq!(body["error"], "missing authorization token");
    }

    #[tokio::test]
    async fn unknown_token_is_unauthenticated_before_validation_of_arguments() {
        let harness = Harness::new().await;
        let (status, body) = harness
            .call(
                "POST",
                "/api/v1/spaces/chores/invites",
                Some("forged"),
                Some(json!({ "role": "owner" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthenticated");
    }

    #[tokio::test]
    async fn health_needs_no_token() {
        let harness = Harness::new().await;
        let (status, _) = harness.call("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
