use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sharekeep_auth::AuthContext;
use sharekeep_core::protocol::{
    AcceptInviteResult, CreateInviteParams, CreateInviteResult, InviteView, ListInvitesResult,
    SuccessResult,
};

use crate::error::{bad_body, ledger_failure, timestamp};
use crate::ApiState;

pub(crate) async fn create_invite(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(space_id): Path<String>,
    params: Result<Json<CreateInviteParams>, JsonRejection>,
) -> Response {
    let Json(params) = match params {
        Ok(params) => params,
        Err(rejection) => return bad_body(rejection),
    };
    let invite = match state
        .sharing
        .create_invite(&auth.user_id, &space_id, &params.role, params.expires_in_days)
        .await
    {
        Ok(invite) => invite,
        Err(error) => return ledger_failure("create_invite", error),
    };

    match timestamp(invite.expires_at) {
        Ok(expires_at) => Json(CreateInviteResult {
            invite_code: invite.code,
            expires_at,
        })
        .into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn accept_invite(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(code): Path<String>,
) -> Response {
    match state
        .sharing
        .accept_invite(&auth.user_id, &auth.display_name, &code)
        .await
    {
        Ok(outcome) => Json(AcceptInviteResult {
            success: true,
            space_name: outcome.space_name,
            role: outcome.role,
            already_joined: outcome.already_joined,
        })
        .into_response(),
        Err(error) => ledger_failure("accept_invite", error),
    }
}

pub(crate) async fn list_invites(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(space_id): Path<String>,
) -> Response {
    let records = match state
        .sharing
        .list_active_invites(&auth.user_id, &space_id)
        .await
    {
        Ok(records) => records,
        Err(error) => return ledger_failure("list_invites", error),
    };

    let mut invites = Vec::with_capacity(records.len());
    for record in records {
        let (created_at, expires_at) =
            match (timestamp(record.created_at), timestamp(record.expires_at)) {
                (Ok(created_at), Ok(expires_at)) => (created_at, expires_at),
                (Err(response), _) | (_, Err(response)) => return response,
            };
        invites.push(InviteView {
            code: record.code,
            space_id: record.space_id,
            space_name: record.space_name,
            role: record.role,
            created_at,
            expires_at,
        });
    }
    Json(ListInvitesResult { invites }).into_response()
}

pub(crate) async fn revoke_invite(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(code): Path<String>,
) -> Response {
    match state.sharing.revoke_invite(&auth.user_id, &code).await {
        Ok(()) => Json(SuccessResult::ok()).into_response(),
        Err(error) => ledger_failure("revoke_invite", error),
    }
}
