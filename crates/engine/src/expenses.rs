//! Expense primitives.
//!
//! An `Expense` is paid by one user and split into `ExpenseShare`s, one per
//! participant. The shares always add up to the expense amount (within one
//! minor unit), except for compensating expenses produced by a confirmed
//! settlement: those carry a single negative share of `-amount`.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, MoneyCents, ResultEngine, ShareAllocation, expense_shares,
    util::parse_uuid,
};

/// Tolerance accepted between an expense amount and the sum of its shares.
pub const SHARE_SUM_TOLERANCE: MoneyCents = MoneyCents::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShareType {
    Equal,
    Percentage,
    Fixed,
}

impl ShareType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::Percentage => "PERCENTAGE",
            Self::Fixed => "FIXED",
        }
    }
}

impl TryFrom<&str> for ShareType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "EQUAL" => Ok(Self::Equal),
            "PERCENTAGE" => Ok(Self::Percentage),
            "FIXED" => Ok(Self::Fixed),
            other => Err(EngineError::InvalidInput(format!(
                "invalid share type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseShare {
    pub id: Uuid,
    pub expense_id: Uuid,
    pub user_id: String,
    /// Signed: negative only on compensating expenses.
    pub amount: MoneyCents,
    pub share_type: ShareType,
}

impl ExpenseShare {
    pub fn new(
        expense_id: Uuid,
        user_id: impl Into<String>,
        amount: MoneyCents,
        share_type: ShareType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            expense_id,
            user_id: user_id.into(),
            amount,
            share_type,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub id: Uuid,
    pub group_id: Option<Uuid>,
    pub description: Option<String>,
    pub amount: MoneyCents,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
    pub paid_by: String,
    pub created_by: String,
    pub is_settlement: bool,
    pub settlement_id: Option<Uuid>,
    pub shares: Vec<ExpenseShare>,
}

impl Expense {
    /// Builds a regular expense from the allocator output.
    pub fn new(
        group_id: Option<Uuid>,
        description: Option<String>,
        amount: MoneyCents,
        currency: Currency,
        occurred_at: DateTime<Utc>,
        paid_by: &str,
        created_by: &str,
        allocations: Vec<ShareAllocation>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidInput(
                "expense amount must be > 0".to_string(),
            ));
        }
        amount.ensure_within_limit("expense amount")?;
        let id = Uuid::new_v4();
        let shares = allocations
            .into_iter()
            .map(|a| ExpenseShare::new(id, a.user_id, a.amount, a.share_type))
            .collect();
        let expense = Self {
            id,
            group_id,
            description,
            amount,
            currency,
            occurred_at,
            paid_by: paid_by.to_string(),
            created_by: created_by.to_string(),
            is_settlement: false,
            settlement_id: None,
            shares,
        };
        expense.check_share_sum()?;
        Ok(expense)
    }

    /// Sum of all share amounts. Fails when the sum does not fit in an
    /// `i64`.
    pub fn share_total(&self) -> ResultEngine<MoneyCents> {
        MoneyCents::checked_sum(self.shares.iter().map(|s| s.amount)).ok_or_else(|| {
            EngineError::InvalidInput(format!("expense {} shares are too large", self.id))
        })
    }

    /// Checks the share-sum invariant.
    ///
    /// Regular expenses: shares add up to `amount`. Compensating expenses:
    /// shares add up to `-amount`.
    pub fn check_share_sum(&self) -> ResultEngine<()> {
        let expected = if self.is_settlement {
            MoneyCents::ZERO.checked_sub(self.amount)
        } else {
            Some(self.amount)
        };
        let total = self.share_total()?;
        let within = expected
            .and_then(|expected| total.checked_sub(expected))
            .is_some_and(|diff| diff.abs() <= SHARE_SUM_TOLERANCE);
        if !within {
            return Err(EngineError::Consistency(format!(
                "expense {} shares sum to {total}, which does not match amount {}",
                self.id, self.amount
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: Option<String>,
    pub description: Option<String>,
    pub amount_minor: i64,
    pub currency: String,
    pub occurred_at: DateTimeUtc,
    pub paid_by: String,
    pub created_by: String,
    pub is_settlement: bool,
    pub settlement_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_shares::Entity")]
    ExpenseShares,
}

impl Related<super::expense_shares::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseShares.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Expense> for ActiveModel {
    fn from(expense: &Expense) -> Self {
        Self {
            id: ActiveValue::Set(expense.id.to_string()),
            group_id: ActiveValue::Set(expense.group_id.map(|id| id.to_string())),
            description: ActiveValue::Set(expense.description.clone()),
            amount_minor: ActiveValue::Set(expense.amount.cents()),
            currency: ActiveValue::Set(expense.currency.code().to_string()),
            occurred_at: ActiveValue::Set(expense.occurred_at),
            paid_by: ActiveValue::Set(expense.paid_by.clone()),
            created_by: ActiveValue::Set(expense.created_by.clone()),
            is_settlement: ActiveValue::Set(expense.is_settlement),
            settlement_id: ActiveValue::Set(expense.settlement_id.map(|id| id.to_string())),
        }
    }
}

impl TryFrom<(Model, Vec<expense_shares::Model>)> for Expense {
    type Error = EngineError;

    fn try_from((model, shares): (Model, Vec<expense_shares::Model>)) -> ResultEngine<Self> {
        let shares = shares
            .into_iter()
            .map(ExpenseShare::try_from)
            .collect::<ResultEngine<Vec<_>>>()?;
        Ok(Self {
            id: parse_uuid(&model.id, "expense")?,
            group_id: model
                .group_id
                .as_deref()
                .map(|id| parse_uuid(id, "group"))
                .transpose()?,
            description: model.description,
            amount: MoneyCents::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            occurred_at: model.occurred_at,
            paid_by: model.paid_by,
            created_by: model.created_by,
            is_settlement: model.is_settlement,
            settlement_id: model
                .settlement_id
                .as_deref()
                .map(|id| parse_uuid(id, "settlement"))
                .transpose()?,
            shares,
        })
    }
}
