use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sharekeep_auth::event_signature::{EventKey, SIGNATURE_HEADER};
use sharekeep_auth::{AuthContext, AuthError, TokenValidator};
use sharekeep_core::ManualClock;
use sharekeep_ledger::{QuotaLedger, SharingService};
#[allow(unused_imports)]
pub(crate) use sharekeep_storage::{MemoryStorage, SpaceStorage, UsageStorage};
use tower::ServiceExt;

use crate::{router, ApiState, STORAGE_EVENTS_PATH};

pub(crate) const OWNER_TOKEN: &str = "owner-token";
pub(crate) const GUEST_TOKEN: &str = "guest-token";
pub(crate) const OTHER_TOKEN: &str = "other-token";
pub(crate) const OWNER: &str = "owner-1";
pub(crate) const GUEST: &str = "guest-1";
pub(crate) const OTHER: &str = "guest-2";
pub(crate) const SPACE: &str = "chores";

struct StubValidator {
    tokens: HashMap<String, AuthContext>,
}

#[async_trait]
impl TokenValidator for StubValidator {
    async fn validate_token(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}

fn context(user_id: &str, display_name: &str) -> AuthContext {
    AuthContext {
        issuer: "https://id.example.com".to_owned(),
        user_id: user_id.to_owned(),
        display_name: display_name.to_owned(),
    }
}

pub(crate) fn start() -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(1_717_200_000)
}

pub(crate) fn days(n: u64) -> Duration {
    Duration::from_secs(n * 86_400)
}

pub(crate) fn event_key() -> EventKey {
    EventKey::new(vec![42_u8; 32]).expect("event key")
}

/// A router over memory storage with three known callers and, unless
/// built with [`Harness::without_events`], the storage-event route.
pub(crate) struct Harness {
    pub app: Router,
    pub storage: Arc<MemoryStorage>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::build(Some(event_key())).await
    }

    pub async fn without_events() -> Self {
        Self::build(None).await
    }

    async fn build(key: Option<EventKey>) -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let clock = Arc::new(ManualClock::new(start()));
        storage
            .put_space(OWNER, SPACE, "Weekend chores")
            .await
            .expect("seed space");

        let validator = StubValidator {
            tokens: HashMap::from([
                (OWNER_TOKEN.to_owned(), context(OWNER, "Owner")),
                (GUEST_TOKEN.to_owned(), context(GUEST, "Guest One")),
                (OTHER_TOKEN.to_owned(), context(OTHER, "")),
            ]),
        };
        let mut state = ApiState::new(
            SharingService::new(storage.clone(), clock.clone()),
            QuotaLedger::new(storage.clone(), clock.clone()),
            Arc::new(validator),
        );
        if let Some(key) = key {
            state = state.with_event_key(key);
        }

        Self {
            app: router(state),
            storage,
            clock,
        }
    }

    pub async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                request = request.header(CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        self.send(request.body(body).expect("build request")).await
    }

    pub async fn post_event(&self, body: &str, signature: Option<String>) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method("POST")
            .uri(STORAGE_EVENTS_PATH)
            .header(CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            request = request.header(SIGNATURE_HEADER, signature);
        }
        self.send(request.body(Body::from(body.to_owned())).expect("build request"))
            .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("dispatch request");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    /// Creates an invite as the owner and returns its code.
    pub async fn invite(&self, role: &str) -> String {
        let (status, body) = self
            .call(
                "POST",
                "/api/v1/spaces/chores/invites",
                Some(OWNER_TOKEN),
                Some(serde_json::json!({ "role": role })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["inviteCode"].as_str().expect("invite code").to_owned()
    }

    pub async fn accept(&self, token: &str, code: &str) -> (StatusCode, Value) {
        self.call(
            "POST",
            &format!("/api/v1/invites/{code}/accept"),
            Some(token),
            None,
        )
        .await
    }
}
