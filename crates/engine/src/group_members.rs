//! Group memberships.
//!
//! Every group has exactly one `Admin`. `Assistant` members (the chat bot)
//! are part of the group but never take part in any money computation.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupRole {
    Admin,
    Member,
    Guest,
    Assistant,
}

impl GroupRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Member => "MEMBER",
            Self::Guest => "GUEST",
            Self::Assistant => "ASSISTANT",
        }
    }

    /// Returns `true` if members with this role owe or are owed money.
    pub fn is_financial(self) -> bool {
        !matches!(self, Self::Assistant)
    }
}

impl TryFrom<&str> for GroupRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "ADMIN" => Ok(Self::Admin),
            "MEMBER" => Ok(Self::Member),
            "GUEST" => Ok(Self::Guest),
            "ASSISTANT" => Ok(Self::Assistant),
            other => Err(EngineError::InvalidInput(format!(
                "invalid group role: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: String,
    pub role: GroupRole,
}

impl GroupMember {
    pub fn new(user_id: impl Into<String>, role: GroupRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "group_members")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub group_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    pub role: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl ActiveModel {
    pub(crate) fn from_member(group_id: &str, member: &GroupMember) -> Self {
        Self {
            group_id: ActiveValue::Set(group_id.to_string()),
            user_id: ActiveValue::Set(member.user_id.clone()),
            role: ActiveValue::Set(member.role.as_str().to_string()),
        }
    }
}

impl TryFrom<Model> for GroupMember {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            role: GroupRole::try_from(model.role.as_str())?,
            user_id: model.user_id,
        })
    }
}
