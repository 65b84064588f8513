use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sharekeep_auth::AuthContext;
use sharekeep_core::protocol::SuccessResult;

use crate::error::ledger_failure;
use crate::ApiState;

pub(crate) async fn revoke_access(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path((space_id, user_id)): Path<(String, String)>,
) -> Response {
    match state
        .sharing
        .revoke_access(&auth.user_id, &space_id, &user_id)
        .await
    {
        Ok(()) => Json(SuccessResult::ok()).into_response(),
        Err(error) => ledger_failure("revoke_access", error),
    }
}

pub(crate) async fn leave_space(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path((owner_id, space_id)): Path<(String, String)>,
) -> Response {
    match state
        .sharing
        .leave_space(&auth.user_id, &owner_id, &space_id)
        .await
    {
        Ok(()) => Json(SuccessResult::ok()).into_response(),
        Err(error) => ledger_failure("leave_space", error),
    }
}
