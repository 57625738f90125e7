use std::collections::HashMap;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    CreateExpenseCmd, EngineError, Expense, ExpenseShare, GroupMember, GroupRole, ResultEngine,
    SplitRule, UpdateExpenseCmd, allocate_shares, expense_shares, expenses,
    util::normalize_optional_text,
};

use super::{Engine, access::require_financial, with_tx};

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ExpensesCursor {
    occurred_at: DateTime<Utc>,
    expense_id: String,
}

impl ExpensesCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidInput("invalid expenses cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidInput("invalid expenses cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidInput("invalid expenses cursor".to_string()))
    }
}

/// Participants in member order: all financial members unless given.
fn resolve_participants(
    members: &[GroupMember],
    requested: Option<Vec<String>>,
) -> ResultEngine<Vec<String>> {
    match requested {
        Some(participants) => {
            for user in &participants {
                require_financial(members, user, "participant")?;
            }
            Ok(participants)
        }
        None => Ok(members
            .iter()
            .filter(|m| m.role.is_financial())
            .map(|m| m.user_id.clone())
            .collect()),
    }
}

fn ensure_editable(expense: &Expense, role: GroupRole, user_id: &str) -> ResultEngine<()> {
    if expense.is_settlement {
        return Err(EngineError::Forbidden(
            "settlement expenses cannot be changed".to_string(),
        ));
    }
    if expense.paid_by != user_id && expense.created_by != user_id && role != GroupRole::Admin {
        return Err(EngineError::Forbidden(
            "only the payer, the creator or the group admin can change this expense".to_string(),
        ));
    }
    Ok(())
}

impl Engine {
    /// Writes an expense and its shares.
    pub(super) async fn insert_expense(
        &self,
        db: &DatabaseTransaction,
        expense: &Expense,
    ) -> ResultEngine<()> {
        expenses::ActiveModel::from(expense).insert(db).await?;
        for share in &expense.shares {
            expense_shares::ActiveModel::from(share).insert(db).await?;
        }
        Ok(())
    }

    /// Attaches shares to expense rows, preserving row order.
    pub(super) async fn load_expenses(
        &self,
        db: &DatabaseTransaction,
        models: Vec<expenses::Model>,
    ) -> ResultEngine<Vec<Expense>> {
        if models.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<String> = models.iter().map(|m| m.id.clone()).collect();
        let share_models: Vec<expense_shares::Model> = expense_shares::Entity::find()
            .filter(expense_shares::Column::ExpenseId.is_in(ids))
            .order_by_asc(expense_shares::Column::UserId)
            .all(db)
            .await?;

        let mut shares_by_expense: HashMap<String, Vec<expense_shares::Model>> = HashMap::new();
        for share in share_models {
            shares_by_expense
                .entry(share.expense_id.clone())
                .or_default()
                .push(share);
        }

        models
            .into_iter()
            .map(|model| {
                let shares = shares_by_expense.remove(&model.id).unwrap_or_default();
                Expense::try_from((model, shares))
            })
            .collect()
    }

    async fn require_expense(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        expense_id: Uuid,
    ) -> ResultEngine<Expense> {
        let model = expenses::Entity::find_by_id(expense_id.to_string())
            .filter(expenses::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))?;
        self.load_expenses(db, vec![model])
            .await?
            .pop()
            .ok_or_else(|| EngineError::KeyNotFound("expense not exists".to_string()))
    }

    /// Records an expense, splitting it with the allocator.
    pub async fn create_expense(&self, cmd: CreateExpenseCmd) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, cmd.group_id, &cmd.user_id)
                .await?;
            let members = self.group_members(&db_tx, cmd.group_id).await?;

            let paid_by = cmd.paid_by.unwrap_or_else(|| cmd.user_id.clone());
            require_financial(&members, &paid_by, "payer")?;
            let participants = resolve_participants(&members, cmd.participants)?;

            let allocations =
                allocate_shares(cmd.amount, cmd.currency, &participants, &cmd.split)?;
            let expense = Expense::new(
                Some(cmd.group_id),
                normalize_optional_text(cmd.description.as_deref()),
                cmd.amount,
                cmd.currency,
                cmd.occurred_at,
                &paid_by,
                &cmd.user_id,
                allocations,
            )?;
            self.insert_expense(&db_tx, &expense).await?;

            tracing::debug!(
                expense_id = %expense.id,
                group_id = %cmd.group_id,
                amount = %expense.amount.display_with(expense.currency),
                "expense recorded"
            );
            Ok(expense)
        })
    }

    /// Patches an expense. Payer, creator or admin only; settlement
    /// expenses are read-only.
    pub async fn update_expense(&self, cmd: UpdateExpenseCmd) -> ResultEngine<Expense> {
        with_tx!(self, |db_tx| {
            let (_, role) = self
                .require_member(&db_tx, cmd.group_id, &cmd.user_id)
                .await?;
            let mut expense = self
                .require_expense(&db_tx, cmd.group_id, cmd.expense_id)
                .await?;
            ensure_editable(&expense, role, &cmd.user_id)?;

            if let Some(currency) = cmd.currency {
                expense.currency = currency;
            }
            if let Some(occurred_at) = cmd.occurred_at {
                expense.occurred_at = occurred_at;
            }
            if let Some(description) = cmd.description.as_deref() {
                expense.description = normalize_optional_text(Some(description));
            }

            if cmd.reallocates() {
                let members = self.group_members(&db_tx, cmd.group_id).await?;
                if let Some(paid_by) = cmd.paid_by.clone() {
                    require_financial(&members, &paid_by, "payer")?;
                    expense.paid_by = paid_by;
                }
                if let Some(amount) = cmd.amount {
                    expense.amount = amount;
                }
                // Without an explicit list, the current participants are
                // kept, in member order.
                let participants = match cmd.participants.clone() {
                    Some(participants) => resolve_participants(&members, Some(participants))?,
                    None => {
                        let current: Vec<&str> =
                            expense.shares.iter().map(|s| s.user_id.as_str()).collect();
                        let kept: Vec<String> = members
                            .iter()
                            .filter(|m| current.contains(&m.user_id.as_str()))
                            .map(|m| m.user_id.clone())
                            .collect();
                        resolve_participants(&members, Some(kept))?
                    }
                };
                let split = cmd.split.clone().unwrap_or(SplitRule::Equal);
                let allocations =
                    allocate_shares(expense.amount, expense.currency, &participants, &split)?;
                expense.shares = allocations
                    .into_iter()
                    .map(|a| ExpenseShare::new(expense.id, a.user_id, a.amount, a.share_type))
                    .collect();
                expense.check_share_sum()?;

                expense_shares::Entity::delete_many()
                    .filter(expense_shares::Column::ExpenseId.eq(expense.id.to_string()))
                    .exec(&db_tx)
                    .await?;
                for share in &expense.shares {
                    expense_shares::ActiveModel::from(share)
                        .insert(&db_tx)
                        .await?;
                }
            }

            expenses::ActiveModel::from(&expense).update(&db_tx).await?;
            Ok(expense)
        })
    }

    /// Deletes an expense and its shares. Payer, creator or admin only.
    pub async fn delete_expense(
        &self,
        group_id: Uuid,
        expense_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let (_, role) = self.require_member(&db_tx, group_id, user_id).await?;
            let expense = self.require_expense(&db_tx, group_id, expense_id).await?;
            ensure_editable(&expense, role, user_id)?;

            expense_shares::Entity::delete_many()
                .filter(expense_shares::Column::ExpenseId.eq(expense.id.to_string()))
                .exec(&db_tx)
                .await?;
            expenses::Entity::delete_by_id(expense.id.to_string())
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Every expense of a group with its shares, newest first.
    pub async fn list_expenses(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Expense>> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, group_id, user_id).await?;
            let models = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(expenses::Column::OccurredAt)
                .order_by_desc(expenses::Column::Id)
                .all(&db_tx)
                .await?;
            self.load_expenses(&db_tx, models).await
        })
    }

    /// Lists a group's expenses with cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_at DESC, expense_id DESC)`.
    pub async fn list_expenses_page(
        &self,
        group_id: Uuid,
        user_id: &str,
        limit: u64,
        cursor: Option<&str>,
    ) -> ResultEngine<(Vec<Expense>, Option<String>)> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, group_id, user_id).await?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = expenses::Entity::find()
                .filter(expenses::Column::GroupId.eq(group_id.to_string()))
                .order_by_desc(expenses::Column::OccurredAt)
                .order_by_desc(expenses::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = ExpensesCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(expenses::Column::OccurredAt.lt(cursor.occurred_at))
                        .add(
                            Condition::all()
                                .add(expenses::Column::OccurredAt.eq(cursor.occurred_at))
                                .add(expenses::Column::Id.lt(cursor.expense_id)),
                        ),
                );
            }

            let rows: Vec<expenses::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() as u64 > limit;
            let rows: Vec<expenses::Model> = rows.into_iter().take(limit as usize).collect();
            let out = self.load_expenses(&db_tx, rows).await?;

            let next_cursor = if has_more {
                out.last()
                    .map(|expense| ExpensesCursor {
                        occurred_at: expense.occurred_at,
                        expense_id: expense.id.to_string(),
                    })
                    .map(|c| c.encode())
                    .transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }
}
