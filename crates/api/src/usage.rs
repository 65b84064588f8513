use axum::body::Bytes;
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sharekeep_auth::event_signature::SIGNATURE_HEADER;
use sharekeep_auth::AuthContext;
use sharekeep_core::protocol::{ErrorKind, StorageEvent, StorageEventKind, StorageUsageView};
use sharekeep_ledger::EventOutcome;

use crate::error::{error_response, ledger_failure, timestamp};
use crate::ApiState;

pub(crate) async fn get_usage(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
) -> Response {
    let usage = match state.quota.usage(&auth.user_id).await {
        Ok(usage) => usage,
        Err(error) => return ledger_failure("get_usage", error),
    };

    let view = match usage {
        Some(usage) => match timestamp(usage.updated_at) {
            Ok(updated_at) => StorageUsageView {
                user_id: usage.user_id,
                bytes_used: usage.bytes_used,
                updated_at: Some(updated_at),
            },
            Err(response) => return response,
        },
        None => StorageUsageView {
            user_id: auth.user_id,
            bytes_used: 0,
            updated_at: None,
        },
    };
    Json(view).into_response()
}

/// Object-store notification. Once the signature and body check out the
/// answer is always 202; the counter outcome stays server-side.
pub(crate) async fn storage_event(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(key) = state.event_key.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(error) = key.verify(&body, signature) {
        tracing::warn!(error = %error, "storage event rejected");
        return error_response(ErrorKind::Unauthenticated, error.to_string());
    }

    let event: StorageEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(error) => {
            return error_response(
                ErrorKind::InvalidArgument,
                format!("malformed storage event: {error}"),
            )
        }
    };

    let outcome = match event.kind {
        StorageEventKind::Finalize => state.quota.on_object_finalized(&event.path, event.size).await,
        StorageEventKind::Delete => state.quota.on_object_deleted(&event.path, event.size).await,
    };
    if outcome == EventOutcome::Dropped {
        tracing::warn!(path = %event.path, kind = ?event.kind, "storage event not counted");
    }
    StatusCode::ACCEPTED.into_response()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::*;

    async fn usage(harness: &Harness, token: &str) -> serde_json::Value {
        let (status, body) = harness
            .call("GET", "/api/v1/storage/usage", Some(token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    async fn send(harness: &Harness, kind: &str, path: &str, size: u64) -> StatusCode {
        let body = json!({ "kind": kind, "path": path, "size": size }).to_string();
        let signature = event_key().sign(body.as_bytes());
        harness.post_event(&body, Some(signature)).await.0
    }

    #[tokio::test]
    async fn usage_starts_at_zero() {
        let harness = Harness::new().await;
        assert_eq!(
            usage(&harness, GUEST_TOKEN).await,
            json!({ "userId": GUEST, "bytesUsed": 0 })
        );
    }

    #[tokio::test]
    async fn signed_events_drive_the_counter() {
        let harness = Harness::new().await;
        let path = format!("users/{GUEST}/photos/a.png");

        assert_eq!(send(&harness, "finalize", &path, 500).await, StatusCode::ACCEPTED);
        assert_eq!(send(&harness, "finalize", &path, 1500).await, StatusCode::ACCEPTED);
        assert_eq!(send(&harness, "delete", &path, 500).await, StatusCode::ACCEPTED);

        let body = usage(&harness, GUEST_TOKEN).await;
        assert_eq!(body["bytesUsed"], 1500);
        assert_eq!(body["updatedAt"], "2024-06-01T00:00:00Z");

        assert_eq!(send(&harness, "delete", &path, 9999).await, StatusCode::ACCEPTED);
        assert_eq!(usage(&harness, GUEST_TOKEN).await["bytesUsed"], 0);
        assert_eq!(usage(&harness, OTHER_TOKEN).await["bytesUsed"], 0);
    }

    #[tokio::test]
    async fn events_outside_user_prefix_are_accepted_and_ignored() {
        let harness = Harness::new().await;
        assert_eq!(
            send(&harness, "finalize", "public/logo.png", 10).await,
            StatusCode::ACCEPTED
        );
        assert!(harness.storage.get_usage("public").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn unsigned_or_tampered_events_are_rejected() {
        let harness = Harness::new().await;
        let body = json!({ "kind": "finalize", "path": "users/guest-1/a", "size": 5 }).to_string();

        let (status, response) = harness.post_event(&body, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(response["code"], "unauthenticated");

        let forged = event_key().sign(b"something else");
        let (status, _) = harness.post_event(&body, Some(forged)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        assert_eq!(usage(&harness, GUEST_TOKEN).await["bytesUsed"], 0);
    }

    #[tokio::test]
    async fn malformed_events_are_invalid_arguments() {
        let harness = Harness::new().await;
        for body in [
            r#"{"kind":"archive","path":"users/guest-1/a","size":5}"#,
            r#"{"kind":"finalize","path":"users/guest-1/a","size":-5}"#,
            "not json",
        ] {
            let signature = event_key().sign(body.as_bytes());
            let (status, response) = harness.post_event(body, Some(signature)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(response["code"], "invalid_argument");
        }
    }

    #[tokio::test]
    async fn event_route_is_absent_without_a_key() {
        let harness = Harness::without_events().await;
        let body = r#"{"kind":"finalize","path":"users/guest-1/a","size":5}"#;
        let signature = event_key().sign(body.as_bytes());
        let (status, _) = harness.post_event(body, Some(signature)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
