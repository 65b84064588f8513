use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use sharekeep_auth::AuthContext;
use sharekeep_core::protocol::{
    CollaboratorView, PutSpaceParams, SharedSpaceView, SharedWithMeResult, SpaceView,
    SuccessResult,
};
use sharekeep_storage::SpaceRecord;

use crate::error::{bad_body, ledger_failure, timestamp};
use crate::ApiState;

fn space_view(space: SpaceRecord) -> Result<SpaceView, Response> {
    let mut collaborators = Vec::with_capacity(space.collaborators.len());
    for (user_id, collaborator) in space.collaborators {
        collaborators.push(CollaboratorView {
            user_id,
            role: collaborator.role,
            display_name: collaborator.display_name,
            added_at: timestamp(collaborator.added_at)?,
        });
    }
    Ok(SpaceView {
        space_id: space.space_id,
        name: space.name,
        is_shared: space.is_shared,
        collaborators,
    })
}

fn respond(space: SpaceRecord) -> Response {
    match space_view(space) {
        Ok(view) => Json(view).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn get_space(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(space_id): Path<String>,
) -> Response {
    match state.sharing.get_space(&auth.user_id, &space_id).await {
        Ok(space) => respond(space),
        Err(error) => ledger_failure("get_space", error),
    }
}

pub(crate) async fn put_space(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(space_id): Path<String>,
    params: Result<Json<PutSpaceParams>, JsonRejection>,
) -> Response {
    let Json(params) = match params {
        Ok(params) => params,
        Err(rejection) => return bad_body(rejection),
    };
    match state
        .sharing
        .put_space(&auth.user_id, &space_id, &params.name)
        .await
    {
        Ok(space) => respond(space),
        Err(error) => ledger_failure("put_space", error),
    }
}

pub(crate) async fn delete_space(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(space_id): Path<String>,
) -> Response {
    match state.sharing.delete_space(&auth.user_id, &space_id).await {
        Ok(()) => Json(SuccessResult::ok()).into_response(),
        Err(error) => ledger_failure("delete_space", error),
    }
}

pub(crate) async fn purge_sharing(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Path(space_id): Path<String>,
) -> Response {
    match state
        .sharing
        .purge_space_sharing(&auth.user_id, &space_id)
        .await
    {
        Ok(_) => Json(SuccessResult::ok()).into_response(),
        Err(error) => ledger_failure("purge_sharing", error),
    }
}

pub(crate) async fn shared_with_me(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
) -> Response {
    match state.sharing.shared_with_me(&auth.user_id).await {
        Ok(entries) => Json(SharedWithMeResult {
            spaces: entries
                .into_iter()
                .map(|entry| SharedSpaceView {
                    owner_id: entry.owner_id,
                    space_id: entry.space_id,
                    space_name: entry.space_name,
                    role: entry.role,
                })
                .collect(),
        })
        .into_response(),
        Err(error) => ledger_failure("shared_with_me", error),
    }
}
