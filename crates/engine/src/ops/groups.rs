use sea_orm::{DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Group, GroupMember, GroupRole, ResultEngine, group_members, groups,
    util::normalize_required_text,
};

use super::{Engine, with_tx};

fn ensure_assignable(role: GroupRole) -> ResultEngine<()> {
    if role == GroupRole::Admin {
        return Err(EngineError::InvalidInput(
            "the admin role can only be handed over with an admin transfer".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    async fn load_group(
        &self,
        db: &DatabaseTransaction,
        model: groups::Model,
    ) -> ResultEngine<Group> {
        let mut group = Group::try_from(model)?;
        group.members = self.group_members(db, group.id).await?;
        Ok(group)
    }

    async fn require_target_member(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<GroupRole> {
        self.member_role(db, group_id, user_id)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("member not exists".to_string()))
    }

    async fn set_role(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        user_id: &str,
        role: GroupRole,
    ) -> ResultEngine<()> {
        let member = GroupMember::new(user_id, role);
        group_members::ActiveModel::from_member(&group_id.to_string(), &member)
            .update(db)
            .await?;
        Ok(())
    }

    /// Creates a group; the creator becomes its only admin.
    pub async fn create_group(
        &self,
        name: &str,
        currency: Currency,
        user_id: &str,
    ) -> ResultEngine<Group> {
        let name = normalize_required_text(name, "group name")?;
        with_tx!(self, |db_tx| {
            self.require_user_exists(&db_tx, user_id).await?;

            let mut group = Group::new(name, currency, user_id);
            groups::ActiveModel::from(&group).insert(&db_tx).await?;

            let admin = GroupMember::new(user_id, GroupRole::Admin);
            group_members::ActiveModel::from_member(&group.id.to_string(), &admin)
                .insert(&db_tx)
                .await?;
            group.members.push(admin);

            Ok(group)
        })
    }

    /// Group with its members. Members only.
    pub async fn group(&self, group_id: Uuid, user_id: &str) -> ResultEngine<Group> {
        with_tx!(self, |db_tx| {
            let (model, _) = self.require_member(&db_tx, group_id, user_id).await?;
            self.load_group(&db_tx, model).await
        })
    }

    /// Groups the user belongs to, oldest first.
    pub async fn list_groups(&self, user_id: &str) -> ResultEngine<Vec<Group>> {
        with_tx!(self, |db_tx| {
            let memberships: Vec<group_members::Model> = group_members::Entity::find()
                .filter(group_members::Column::UserId.eq(user_id.to_string()))
                .all(&db_tx)
                .await?;
            let ids: Vec<String> = memberships.into_iter().map(|m| m.group_id).collect();
            if ids.is_empty() {
                return Ok(Vec::new());
            }

            let models: Vec<groups::Model> = groups::Entity::find()
                .filter(groups::Column::Id.is_in(ids))
                .order_by_asc(groups::Column::CreatedAt)
                .order_by_asc(groups::Column::Id)
                .all(&db_tx)
                .await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                out.push(self.load_group(&db_tx, model).await?);
            }
            Ok(out)
        })
    }

    /// Members of a group ordered by user id. Members only.
    pub async fn list_members(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<GroupMember>> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, group_id, user_id).await?;
            self.group_members(&db_tx, group_id).await
        })
    }

    /// Adds a member (admin only). `Admin` cannot be granted here.
    pub async fn add_member(
        &self,
        group_id: Uuid,
        member_id: &str,
        role: GroupRole,
        user_id: &str,
    ) -> ResultEngine<GroupMember> {
        ensure_assignable(role)?;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, user_id).await?;
            self.require_user_exists(&db_tx, member_id).await?;
            if self.member_role(&db_tx, group_id, member_id).await?.is_some() {
                return Err(EngineError::ExistingKey(format!(
                    "{member_id} is already a member"
                )));
            }

            let member = GroupMember::new(member_id, role);
            group_members::ActiveModel::from_member(&group_id.to_string(), &member)
                .insert(&db_tx)
                .await?;
            Ok(member)
        })
    }

    /// Changes a non-admin member's role (admin only).
    pub async fn update_member_role(
        &self,
        group_id: Uuid,
        member_id: &str,
        role: GroupRole,
        user_id: &str,
    ) -> ResultEngine<GroupMember> {
        ensure_assignable(role)?;
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, user_id).await?;
            let current = self.require_target_member(&db_tx, group_id, member_id).await?;
            if current == GroupRole::Admin {
                return Err(EngineError::Forbidden(
                    "cannot change the admin's role; transfer the admin role instead".to_string(),
                ));
            }
            self.set_role(&db_tx, group_id, member_id, role).await?;
            Ok(GroupMember::new(member_id, role))
        })
    }

    /// Hands the admin role to another member. The previous admin becomes a
    /// regular member in the same transaction.
    pub async fn transfer_admin(
        &self,
        group_id: Uuid,
        new_admin: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        if new_admin == user_id {
            return Err(EngineError::InvalidInput(
                "you are already the admin".to_string(),
            ));
        }
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, user_id).await?;
            let role = self.require_target_member(&db_tx, group_id, new_admin).await?;
            if !role.is_financial() {
                return Err(EngineError::InvalidInput(
                    "an assistant cannot become the admin".to_string(),
                ));
            }
            self.set_role(&db_tx, group_id, new_admin, GroupRole::Admin)
                .await?;
            self.set_role(&db_tx, group_id, user_id, GroupRole::Member)
                .await?;
            Ok(())
        })
    }

    /// Removes a member (admin only). The admin cannot be removed.
    pub async fn remove_member(
        &self,
        group_id: Uuid,
        member_id: &str,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_admin(&db_tx, group_id, user_id).await?;
            let role = self.require_target_member(&db_tx, group_id, member_id).await?;
            if role == GroupRole::Admin {
                return Err(EngineError::Forbidden(
                    "cannot remove the last admin".to_string(),
                ));
            }
            group_members::Entity::delete_by_id((group_id.to_string(), member_id.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Leaves a group. The admin has to transfer the role first.
    pub async fn leave_group(&self, group_id: Uuid, user_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (_, role) = self.require_member(&db_tx, group_id, user_id).await?;
            if role == GroupRole::Admin {
                return Err(EngineError::Forbidden(
                    "cannot remove the last admin; transfer the admin role before leaving"
                        .to_string(),
                ));
            }
            group_members::Entity::delete_by_id((group_id.to_string(), user_id.to_string()))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }
}
