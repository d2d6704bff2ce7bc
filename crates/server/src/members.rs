//! Member API endpoints.

use api_types::member::{MemberNew, MemberRemoved, MemberView, RemovalMode};
use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{ServerError, server::ServerState, user};

pub(crate) fn member_view(member: engine::Member) -> MemberView {
    MemberView {
        id: member.id,
        name: member.name,
        active: member.active,
    }
}

/// Handle requests for adding a member to a group.
pub async fn add(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path(group_id): Path<String>,
    Json(payload): Json<MemberNew>,
) -> Result<(StatusCode, Json<MemberView>), ServerError> {
    let member = state
        .engine
        .add_member(&group_id, &payload.name, &user.username)
        .await?;

    Ok((StatusCode::CREATED, Json(member_view(member))))
}

/// Handle requests for removing a member.
///
/// Members referenced by expenses are deactivated instead of deleted; the
/// response says which of the two happened.
pub async fn remove(
    Extension(user): Extension<user::Model>,
    State(state): State<ServerState>,
    Path((group_id, member_id)): Path<(String, String)>,
) -> Result<Json<MemberRemoved>, ServerError> {
    let removal = state
        .engine
        .remove_member(&group_id, &member_id, &user.username)
        .await?;

    let removed = match removal {
        engine::MemberRemoval::Deactivated(member) => MemberRemoved {
            member_id: member.id,
            mode: RemovalMode::Deactivated,
        },
        engine::MemberRemoval::Deleted { member_id } => MemberRemoved {
            member_id,
            mode: RemovalMode::Deleted,
        },
    };

    Ok(Json(removed))
}
