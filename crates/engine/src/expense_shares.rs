//! Expense shares table. A share row lives and dies with its expense.

use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{EngineError, ExpenseShare, MoneyCents, ResultEngine, ShareType, util::parse_uuid};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "expense_shares")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub expense_id: String,
    pub user_id: String,
    pub amount_minor: i64,
    pub share_type: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Expenses,
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&ExpenseShare> for ActiveModel {
    fn from(share: &ExpenseShare) -> Self {
        Self {
            id: ActiveValue::Set(share.id.to_string()),
            expense_id: ActiveValue::Set(share.expense_id.to_string()),
            user_id: ActiveValue::Set(share.user_id.clone()),
            amount_minor: ActiveValue::Set(share.amount.cents()),
            share_type: ActiveValue::Set(share.share_type.as_str().to_string()),
        }
    }
}

impl TryFrom<Model> for ExpenseShare {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "expense share")?,
            expense_id: parse_uuid(&model.expense_id, "expense")?,
            amount: MoneyCents::new(model.amount_minor),
            share_type: ShareType::try_from(model.share_type.as_str())?,
            user_id: model.user_id,
        })
    }
}
