//! Group and membership endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use api_types::group::{
    AdminTransfer, GroupListResponse, GroupNew, GroupRole, GroupView, MemberNew, MemberRoleUpdate,
    MemberView, MembersResponse,
};
use engine::{Currency, Group, GroupMember};

use crate::{
    ServerError,
    server::{CurrentUser, ServerState},
};

fn role_to_engine(role: GroupRole) -> Result<engine::GroupRole, ServerError> {
    Ok(engine::GroupRole::try_from(role.as_str())?)
}

fn role_to_api(role: engine::GroupRole) -> GroupRole {
    match role {
        engine::GroupRole::Admin => GroupRole::Admin,
        engine::GroupRole::Member => GroupRole::Member,
        engine::GroupRole::Guest => GroupRole::Guest,
        engine::GroupRole::Assistant => GroupRole::Assistant,
    }
}

fn member_view(member: GroupMember) -> MemberView {
    MemberView {
        user_id: member.user_id,
        role: role_to_api(member.role),
    }
}

fn group_view(group: Group) -> GroupView {
    GroupView {
        id: group.id,
        name: group.name,
        currency: group.currency.code().to_string(),
        created_by: group.created_by,
        created_at: group.created_at,
        members: group.members.into_iter().map(member_view).collect(),
    }
}

pub async fn list(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
) -> Result<Json<GroupListResponse>, ServerError> {
    let groups = state
        .engine
        .list_groups(&user_id)
        .await?
        .into_iter()
        .map(group_view)
        .collect();

    Ok(Json(GroupListResponse { groups }))
}

pub async fn create(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Json(payload): Json<GroupNew>,
) -> Result<(StatusCode, Json<GroupView>), ServerError> {
    let currency = Currency::try_from(payload.currency.as_str())?;
    let group = state
        .engine
        .create_group(&payload.name, currency, &user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(group_view(group))))
}

pub async fn get(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<GroupView>, ServerError> {
    let group = state.engine.group(group_id, &user_id).await?;
    Ok(Json(group_view(group)))
}

pub async fn list_members(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<Json<MembersResponse>, ServerError> {
    let members = state
        .engine
        .list_members(group_id, &user_id)
        .await?
        .into_iter()
        .map(member_view)
        .collect();

    Ok(Json(MembersResponse { members }))
}

pub async fn add_member(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<MemberNew>,
) -> Result<(StatusCode, Json<MemberView>), ServerError> {
    let member = state
        .engine
        .add_member(
            group_id,
            &payload.user_id,
            role_to_engine(payload.role)?,
            &user_id,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(member_view(member))))
}

pub async fn update_member_role(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path((group_id, member_id)): Path<(Uuid, String)>,
    Json(payload): Json<MemberRoleUpdate>,
) -> Result<Json<MemberView>, ServerError> {
    let member = state
        .engine
        .update_member_role(group_id, &member_id, role_to_engine(payload.role)?, &user_id)
        .await?;

    Ok(Json(member_view(member)))
}

pub async fn remove_member(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path((group_id, member_id)): Path<(Uuid, String)>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .remove_member(group_id, &member_id, &user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn transfer_admin(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
    Json(payload): Json<AdminTransfer>,
) -> Result<StatusCode, ServerError> {
    state
        .engine
        .transfer_admin(group_id, &payload.user_id, &user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    State(state): State<ServerState>,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.engine.leave_group(group_id, &user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
