use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{EngineError, GroupMember, GroupRole, ResultEngine, group_members, groups, users};

use super::Engine;

impl Engine {
    pub(super) async fn require_user_exists(
        &self,
        db: &DatabaseTransaction,
        user_id: &str,
    ) -> ResultEngine<()> {
        let exists = users::Entity::find_by_id(user_id.to_string())
            .one(db)
            .await?
            .is_some();
        if !exists {
            return Err(EngineError::KeyNotFound("user not exists".to_string()));
        }
        Ok(())
    }

    pub(super) async fn require_group(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<groups::Model> {
        groups::Entity::find_by_id(group_id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("group not exists".to_string()))
    }

    pub(super) async fn member_role(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Option<GroupRole>> {
        let row = group_members::Entity::find_by_id((group_id.to_string(), user_id.to_string()))
            .one(db)
            .await?;
        row.as_ref()
            .map(|m| GroupRole::try_from(m.role.as_str()))
            .transpose()
    }

    /// Members ordered by user id.
    pub(super) async fn group_members(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
    ) -> ResultEngine<Vec<GroupMember>> {
        group_members::Entity::find()
            .filter(group_members::Column::GroupId.eq(group_id.to_string()))
            .order_by_asc(group_members::Column::UserId)
            .all(db)
            .await?
            .into_iter()
            .map(GroupMember::try_from)
            .collect()
    }

    /// Loads the group and checks that `user_id` belongs to it.
    pub(super) async fn require_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<(groups::Model, GroupRole)> {
        let group = self.require_group(db, group_id).await?;
        let role = self
            .member_role(db, group_id, user_id)
            .await?
            .ok_or_else(|| EngineError::Forbidden("not a member of this group".to_string()))?;
        Ok((group, role))
    }

    pub(super) async fn require_admin(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<groups::Model> {
        let (group, role) = self.require_member(db, group_id, user_id).await?;
        if role != GroupRole::Admin {
            return Err(EngineError::Forbidden(
                "only the group admin can manage members".to_string(),
            ));
        }
        Ok(group)
    }
}

/// Checks that `user_id` is a member who can owe or be owed money.
pub(super) fn require_financial(
    members: &[GroupMember],
    user_id: &str,
    label: &str,
) -> ResultEngine<()> {
    match members.iter().find(|m| m.user_id == user_id) {
        None => Err(EngineError::InvalidInput(format!(
            "{label} {user_id} is not a group member"
        ))),
        Some(m) if !m.role.is_financial() => Err(EngineError::InvalidInput(format!(
            "{label} {user_id} is an assistant"
        ))),
        Some(_) => Ok(()),
    }
}
