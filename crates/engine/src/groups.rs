//! A `Group` is a set of users sharing expenses. It carries a base currency
//! which is always present in balance summaries, even before the first
//! expense is recorded.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, GroupMember, ResultEngine, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub currency: Currency,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn new(name: String, currency: Currency, created_by: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            currency,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            members: Vec::new(),
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "groups")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub currency: String,
    pub created_by: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::group_members::Entity")]
    GroupMembers,
}

impl Related<super::group_members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GroupMembers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Group> for ActiveModel {
    fn from(value: &Group) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            name: ActiveValue::Set(value.name.clone()),
            currency: ActiveValue::Set(value.currency.code().to_string()),
            created_by: ActiveValue::Set(value.created_by.clone()),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for Group {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "group")?,
            currency: Currency::try_from(model.currency.as_str())?,
            name: model.name,
            created_by: model.created_by,
            created_at: model.created_at,
            members: Vec::new(),
        })
    }
}
