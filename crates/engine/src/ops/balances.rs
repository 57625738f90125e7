use sea_orm::{
    Condition, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    BalanceSummary, Currency, GroupRole, LedgerSnapshot, ResultEngine, compute_group_balances,
    expenses, group_members, groups, merge_summaries, util::parse_uuid,
};

use super::{Engine, with_tx};

impl Engine {
    /// Reads members, expenses (with shares) and settlements of one group.
    /// Callers run this inside the transaction they compute from.
    async fn ledger_snapshot(
        &self,
        db: &DatabaseTransaction,
        group: &groups::Model,
    ) -> ResultEngine<LedgerSnapshot> {
        let group_id = parse_uuid(&group.id, "group")?;
        let members = self.group_members(db, group_id).await?;
        let expense_models = expenses::Entity::find()
            .filter(expenses::Column::GroupId.eq(group.id.clone()))
            .order_by_asc(expenses::Column::OccurredAt)
            .order_by_asc(expenses::Column::Id)
            .all(db)
            .await?;
        let expenses = self.load_expenses(db, expense_models).await?;
        let settlements = self
            .group_settlements(db, group_id, Condition::all())
            .await?;

        Ok(LedgerSnapshot {
            members,
            expenses,
            settlements,
            base_currency: Some(Currency::try_from(group.currency.as_str())?),
        })
    }

    /// Per-currency balances of `user_id` against every other member.
    pub async fn group_balances(
        &self,
        group_id: Uuid,
        user_id: &str,
    ) -> ResultEngine<Vec<BalanceSummary>> {
        with_tx!(self, |db_tx| {
            let (group, _) = self.require_member(&db_tx, group_id, user_id).await?;
            let snapshot = self.ledger_snapshot(&db_tx, &group).await?;
            compute_group_balances(user_id, &snapshot)
        })
    }

    /// Balances of `user_id` across all of their groups, merged per currency
    /// and counterpart. Groups where the user is an assistant are skipped.
    pub async fn user_balances(&self, user_id: &str) -> ResultEngine<Vec<BalanceSummary>> {
        with_tx!(self, |db_tx| {
            let memberships: Vec<group_members::Model> = group_members::Entity::find()
                .filter(group_members::Column::UserId.eq(user_id.to_string()))
                .order_by_asc(group_members::Column::GroupId)
                .all(&db_tx)
                .await?;

            let mut summaries = Vec::new();
            for membership in memberships {
                if !GroupRole::try_from(membership.role.as_str())?.is_financial() {
                    continue;
                }
                let group_id = parse_uuid(&membership.group_id, "group")?;
                let group = self.require_group(&db_tx, group_id).await?;
                let snapshot = self.ledger_snapshot(&db_tx, &group).await?;
                summaries.extend(compute_group_balances(user_id, &snapshot)?);
            }
            merge_summaries(summaries)
        })
    }
}
