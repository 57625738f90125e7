use chrono::Utc;
use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    CreateSettlementCmd, EngineError, ResultEngine, Settlement, SettlementStatus,
    TransitionOutcome, lifecycle, settlements, util::normalize_optional_text,
};

use super::{Engine, access::require_financial, with_tx};

impl Engine {
    async fn require_settlement(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        settlement_id: Uuid,
    ) -> ResultEngine<Settlement> {
        let model = settlements::Entity::find_by_id(settlement_id.to_string())
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("settlement not exists".to_string()))?;
        Settlement::try_from(model)
    }

    pub(super) async fn group_settlements(
        &self,
        db: &DatabaseTransaction,
        group_id: Uuid,
        condition: Condition,
    ) -> ResultEngine<Vec<Settlement>> {
        settlements::Entity::find()
            .filter(settlements::Column::GroupId.eq(group_id.to_string()))
            .filter(condition)
            .order_by_desc(settlements::Column::OccurredAt)
            .order_by_desc(settlements::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(Settlement::try_from)
            .collect()
    }

    /// Records a settlement in `Pending` or `PendingConfirmation`.
    ///
    /// Both parties must be distinct, non-assistant members of the group.
    pub async fn create_settlement(&self, cmd: CreateSettlementCmd) -> ResultEngine<Settlement> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, cmd.group_id, &cmd.user_id)
                .await?;
            let members = self.group_members(&db_tx, cmd.group_id).await?;
            require_financial(&members, &cmd.user_id, "initiator")?;
            require_financial(&members, &cmd.settled_with, "counterparty")?;

            let settlement = Settlement::new(
                cmd.group_id,
                &cmd.user_id,
                &cmd.settled_with,
                cmd.amount,
                cmd.currency,
                cmd.settlement_type,
                cmd.status,
                cmd.occurred_at,
                normalize_optional_text(cmd.description.as_deref()),
            )?;
            settlements::ActiveModel::from(&settlement)
                .insert(&db_tx)
                .await?;

            tracing::info!(
                settlement_id = %settlement.id,
                group_id = %settlement.group_id,
                kind = settlement.settlement_type.as_str(),
                status = settlement.status.as_str(),
                amount = %settlement.amount.display_with(settlement.currency),
                "settlement recorded"
            );
            Ok(settlement)
        })
    }

    /// Moves a settlement to `to` on behalf of `user_id`.
    ///
    /// The status write is guarded on the status observed at load time, so
    /// two racing confirmations cannot both succeed. Confirmation inserts the
    /// compensating expense in the same transaction.
    pub async fn transition_settlement(
        &self,
        group_id: Uuid,
        settlement_id: Uuid,
        to: SettlementStatus,
        user_id: &str,
    ) -> ResultEngine<TransitionOutcome> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, group_id, user_id).await?;
            let current = self
                .require_settlement(&db_tx, group_id, settlement_id)
                .await?;
            let outcome = lifecycle::transition(&current, to, user_id, Utc::now())?;

            let updated = settlements::Entity::update_many()
                .col_expr(settlements::Column::Status, Expr::value(to.as_str()))
                .col_expr(
                    settlements::Column::UpdatedAt,
                    Expr::value(outcome.settlement.updated_at),
                )
                .filter(settlements::Column::Id.eq(settlement_id.to_string()))
                .filter(settlements::Column::Status.eq(current.status.as_str()))
                .exec(&db_tx)
                .await?;
            if updated.rows_affected == 0 {
                tracing::warn!(
                    settlement_id = %settlement_id,
                    observed = current.status.as_str(),
                    requested = to.as_str(),
                    "settlement status changed concurrently"
                );
                return Err(EngineError::InvalidTransition(
                    "settlement was changed by someone else; reload it and try again".to_string(),
                ));
            }

            if let Some(expense) = &outcome.compensating_expense {
                self.insert_expense(&db_tx, expense).await?;
                tracing::info!(
                    settlement_id = %settlement_id,
                    expense_id = %expense.id,
                    "compensating expense created"
                );
            }

            tracing::info!(
                settlement_id = %settlement_id,
                from = current.status.as_str(),
                to = to.as_str(),
                user_id,
                "settlement transitioned"
            );
            Ok(outcome)
        })
    }

    /// Every settlement of a group, newest first.
    pub async fn list_settlements(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<Settlement>> {
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, group_id, user_id).await?;
            self.group_settlements(&db_tx, group_id, Condition::all())
                .await
        })
    }

    /// Settlements between two users in either direction, newest first.
    pub async fn settlements_between(
        &self,
        group_id: Uuid,
        user_a: &str,
        user_b: &str,
        user_id: &str,
    ) -> ResultEngine<Vec<Settlement>> {
        let pair = |a: &str, b: &str| {
            Condition::all()
                .add(settlements::Column::InitiatedBy.eq(a.to_string()))
                .add(settlements::Column::SettledWith.eq(b.to_string()))
        };
        with_tx!(self, |db_tx| {
            self.require_member(&db_tx, group_id, user_id).await?;
            let condition = Condition::any()
                .add(pair(user_a, user_b))
                .add(pair(user_b, user_a));
            self.group_settlements(&db_tx, group_id, condition).await
        })
    }
}
