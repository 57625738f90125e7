//! Balance computation.
//!
//! Folds a group's expenses and shares into per-currency balances relative
//! to one requesting user:
//! - positive: the other member owes the requester
//! - negative: the requester owes the other member
//!
//! Settlements reach the balances only through their compensating expense.
//! The settlement rows in the snapshot are used to reconcile the two
//! representations, never to fold amounts a second time.
//!
//! Everything here is pure: identical snapshots give identical output.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    Currency, EngineError, Expense, GroupMember, MoneyCents, ResultEngine, Settlement,
};

/// Signed balance against one other member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberBalance {
    pub user_id: String,
    pub amount: MoneyCents,
}

/// Balances in one currency, relative to the requesting user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub currency: Currency,
    /// Sum of positive balances.
    pub total_owed: MoneyCents,
    /// Sum of the absolute values of negative balances.
    pub total_owing: MoneyCents,
    pub net_balance: MoneyCents,
    pub balances: Vec<MemberBalance>,
}

impl BalanceSummary {
    fn from_bucket(
        currency: Currency,
        bucket: BTreeMap<String, MoneyCents>,
    ) -> ResultEngine<Self> {
        let overflow = || {
            EngineError::Consistency(format!("{currency} balance totals overflow"))
        };
        let total_owed =
            MoneyCents::checked_sum(bucket.values().copied().filter(|v| v.is_positive()))
                .ok_or_else(overflow)?;
        let total_owing = bucket
            .values()
            .copied()
            .filter(|v| v.is_negative())
            .try_fold(MoneyCents::ZERO, |acc, v| acc.checked_sub(v))
            .ok_or_else(overflow)?;
        let net_balance = total_owed.checked_sub(total_owing).ok_or_else(overflow)?;
        Ok(Self {
            currency,
            total_owed,
            total_owing,
            net_balance,
            balances: bucket
                .into_iter()
                .map(|(user_id, amount)| MemberBalance { user_id, amount })
                .collect(),
        })
    }

    /// Balance against `user_id`, zero when absent.
    pub fn balance_with(&self, user_id: &str) -> MoneyCents {
        self.balances
            .iter()
            .find(|b| b.user_id == user_id)
            .map(|b| b.amount)
            .unwrap_or_default()
    }
}

/// Everything the balance fold reads for one group, taken from a single
/// consistent read.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    pub members: Vec<GroupMember>,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<Settlement>,
    /// Currency that always gets a summary, even with no activity.
    pub base_currency: Option<Currency>,
}

type Buckets = BTreeMap<Currency, BTreeMap<String, MoneyCents>>;

/// Computes one [`BalanceSummary`] per currency for `requester`.
///
/// Currencies are sorted by code and members by id, so the output is
/// deterministic. Membership of `requester` is the caller's responsibility.
pub fn compute_group_balances(
    requester: &str,
    snapshot: &LedgerSnapshot,
) -> ResultEngine<Vec<BalanceSummary>> {
    reconcile(snapshot)?;

    let assistants: HashSet<&str> = snapshot
        .members
        .iter()
        .filter(|m| !m.role.is_financial())
        .map(|m| m.user_id.as_str())
        .collect();
    let counterparts: Vec<&str> = snapshot
        .members
        .iter()
        .filter(|m| m.role.is_financial() && m.user_id != requester)
        .map(|m| m.user_id.as_str())
        .collect();

    let mut buckets: Buckets = BTreeMap::new();
    let bucket_for = |currency: Currency, buckets: &mut Buckets| {
        buckets.entry(currency).or_insert_with(|| {
            counterparts
                .iter()
                .map(|user| (user.to_string(), MoneyCents::ZERO))
                .collect()
        });
    };

    if let Some(currency) = snapshot.base_currency {
        bucket_for(currency, &mut buckets);
    }

    for expense in &snapshot.expenses {
        bucket_for(expense.currency, &mut buckets);
        let Some(bucket) = buckets.get_mut(&expense.currency) else {
            continue;
        };
        let payer = expense.paid_by.as_str();
        if assistants.contains(payer) {
            continue;
        }

        for share in &expense.shares {
            let debtor = share.user_id.as_str();
            if assistants.contains(debtor) || debtor == payer {
                continue;
            }
            let (counterpart, updated) = if payer == requester {
                let current = bucket.entry(debtor.to_string()).or_default();
                (debtor, current.checked_add(share.amount))
            } else if debtor == requester {
                let current = bucket.entry(payer.to_string()).or_default();
                (payer, current.checked_sub(share.amount))
            } else {
                continue;
            };
            let updated = updated.ok_or_else(|| {
                EngineError::Consistency(format!(
                    "{} balance with {counterpart} overflows",
                    expense.currency
                ))
            })?;
            bucket.insert(counterpart.to_string(), updated);
        }
    }

    buckets
        .into_iter()
        .map(|(currency, bucket)| BalanceSummary::from_bucket(currency, bucket))
        .collect()
}

/// Checks the ledger invariants the fold relies on:
/// - every expense respects its share-sum rule;
/// - every confirmed/completed settlement has exactly one compensating
///   expense with the same amount and currency;
/// - every compensating expense points at a confirmed/completed settlement.
pub fn reconcile(snapshot: &LedgerSnapshot) -> ResultEngine<()> {
    let mut compensating: HashMap<Uuid, Vec<&Expense>> = HashMap::new();
    for expense in &snapshot.expenses {
        expense.check_share_sum()?;
        if expense.is_settlement {
            let settlement_id = expense.settlement_id.ok_or_else(|| {
                EngineError::Consistency(format!(
                    "settlement expense {} has no settlement",
                    expense.id
                ))
            })?;
            compensating.entry(settlement_id).or_default().push(expense);
        }
    }

    let settlements: HashMap<Uuid, &Settlement> =
        snapshot.settlements.iter().map(|s| (s.id, s)).collect();

    for (settlement_id, expenses) in &compensating {
        let applied = settlements
            .get(settlement_id)
            .is_some_and(|s| s.status.is_applied());
        if !applied {
            return Err(EngineError::Consistency(format!(
                "compensating expense for settlement {settlement_id} without a confirmed settlement"
            )));
        }
        if expenses.len() != 1 {
            return Err(EngineError::Consistency(format!(
                "settlement {settlement_id} has {} compensating expenses",
                expenses.len()
            )));
        }
    }

    for settlement in snapshot.settlements.iter().filter(|s| s.status.is_applied()) {
        let Some([expense]) = compensating.get(&settlement.id).map(Vec::as_slice) else {
            return Err(EngineError::Consistency(format!(
                "settlement {} is {} but has no compensating expense",
                settlement.id,
                settlement.status.label()
            )));
        };
        if expense.amount != settlement.amount || expense.currency != settlement.currency {
            return Err(EngineError::Consistency(format!(
                "compensating expense {} does not match settlement {}",
                expense.id, settlement.id
            )));
        }
    }

    Ok(())
}

/// Merges summaries coming from several groups: same currency and same
/// counterpart add up.
pub fn merge_summaries(
    summaries: impl IntoIterator<Item = BalanceSummary>,
) -> ResultEngine<Vec<BalanceSummary>> {
    let mut buckets: Buckets = BTreeMap::new();
    for summary in summaries {
        let bucket = buckets.entry(summary.currency).or_default();
        for MemberBalance { user_id, amount } in summary.balances {
            let current = bucket.entry(user_id.clone()).or_default();
            *current = current.checked_add(amount).ok_or_else(|| {
                EngineError::Consistency(format!(
                    "{} balance with {user_id} overflows across groups",
                    summary.currency
                ))
            })?;
        }
    }
    buckets
        .into_iter()
        .map(|(currency, bucket)| BalanceSummary::from_bucket(currency, bucket))
        .collect()
}
