#![forbid(unsafe_code)]

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{extract::State, http::StatusCode, middleware, Router};
use sharekeep_auth::event_signature::EventKey;
use sharekeep_auth::TokenValidator;
use sharekeep_ledger::{QuotaLedger, SharingService};

mod access;
mod bearer;
mod error;
mod invites;
mod spaces;
mod usage;

#[cfg(test)]
mod test_support;

pub const STORAGE_EVENTS_PATH: &str = "/internal/v1/storage-events";

#[derive(Clone)]
pub struct ApiState {
    sharing: SharingService,
    quota: QuotaLedger,
    validator: Arc<dyn TokenValidator>,
    event_key: Option<EventKey>,
}

impl ApiState {
    #[must_use]
    pub fn new(
        sharing: SharingService,
        quota: QuotaLedger,
        validator: Arc<dyn TokenValidator>,
    ) -> Self {
        Self {
            sharing,
            quota,
            validator,
            event_key: None,
        }
    }

    /// Enables the storage-event route, authenticated with `key`.
    #[must_use]
    pub fn with_event_key(mut self, key: EventKey) -> Self {
        self.event_key = Some(key);
        self
    }
}

pub fn router(state: ApiState) -> Router {
    let authenticated = Router::new()
        .route(
            "/api/v1/spaces/{space_id}",
            get(spaces::get_space)
                .put(spaces::put_space)
                .delete(spaces::delete_space),
        )
        .route(
            "/api/v1/spaces/{space_id}/sharing",
            delete(spaces::purge_sharing),
        )
        .route(
            "/api/v1/spaces/{space_id}/invites",
            get(invites::list_invites).post(invites::create_invite),
        )
        .route(
            "/api/v1/spaces/{space_id}/collaborators/{user_id}",
            delete(access::revoke_access),
        )
        .route("/api/v1/invites/{code}", delete(invites::revoke_invite))
        .route("/api/v1/invites/{code}/accept", post(invites::accept_invite))
        .route("/api/v1/shared", get(spaces::shared_with_me))
        .route(
            "/api/v1/shared/{owner_id}/{space_id}/leave",
            post(access::leave_space),
        )
        .route("/api/v1/storage/usage", get(usage::get_usage))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            bearer::require_bearer,
        ));

    let mut router = Router::new()
        .route("/health", get(health))
        .merge(authenticated);
    if state.event_key.is_some() {
        router = router.route(STORAGE_EVENTS_PATH, post(usage::storage_event));
    }
    router.with_state(state)
}

async fn health(State(state): State<ApiState>) -> StatusCode {
    match state.sharing.ping().await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
