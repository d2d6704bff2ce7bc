//! Group API endpoints.

use api_types::group::{GroupDetail, GroupNew, GroupRename, GroupView, GroupsResponse};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{ServerError, members, server::ServerState, user};

fn group_view(group: engine::Group) -> GroupView {
    GroupView {
        id: group.id,
        name: group.name,
        created_at: group.created_at,
        updated_at: group.updated_at,
    }
}

/// Handle requests for creating a new group.
pub async fn create(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let group_id = state.engine.new_group(&payload.name, &user.username).await?;
    let (group, _) = state
        .engine
        .group_snapshot(&group_id, &user.username)
        .await?;

    Ok((StatusCode::CREATED, Json(group_view(group))))
}

/// Handle requests for listing the caller's groups.
pub async fn list(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
) -> Result<Json<GroupsResponse>, ServerError> {
    let groups = state.engine.list_groups(&user.username).await?;

    Ok(Json(GroupsResponse {
        groups: groups.into_iter().map(group_view).collect(),
    }))
}

/// Handle requests for one group with its full member list.
pub async fn get_detail(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<Json<GroupDetail>, ServerError> {
    let (group, member_list) = state
        .engine
        .group_snapshot(&group_id, &user.username)
        .await?;

    Ok(Json(GroupDetail {
        group: group_view(group),
        members: member_list.into_iter().map(members::member_view).collect(),
    }))
}

/// Handle requests for renaming a group.
pub async fn rename(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<GroupRename>,
) -> Result<Json<GroupView>, ServerError> {
    let group = state
        .engine
        .rename_group(&group_id, &payload.name, &user.username)
        .await?;

    Ok(Json(group_view(group)))
}

/// Handle requests for deleting a group and everything in it.
pub async fn delete(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
) -> Result<StatusCode, ServerError> {
    state.engine.delete_group(&group_id, &user.username).await?;

    Ok(StatusCode::NO_CONTENT)
}
