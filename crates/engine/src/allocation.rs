//! Expense split allocation.
//!
//! Turns an expense amount and a participant list into per-member shares
//! whose sum is exactly the amount, at minor-unit precision. The participant
//! list must already exclude `Assistant` members.
//!
//! Rounding: every participant but the last gets a truncated share, the last
//! one absorbs the remainder. For `10.00` over three members this yields
//! `[3.33, 3.33, 3.34]`.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, MoneyCents, ResultEngine, ShareType};

/// 100% expressed in basis points.
pub const FULL_PERCENTAGE_BPS: u32 = 10_000;

/// How an expense is split between its participants.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum SplitRule {
    Equal,
    /// Exact amounts per member. Members missing from the map get a zero
    /// share.
    Custom(BTreeMap<String, MoneyCents>),
    /// Basis points per member (`10_000` = 100%).
    Percentage(BTreeMap<String, u32>),
    /// One member carries the whole amount.
    AssignAll(String),
}

/// One computed share, not yet bound to an expense.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareAllocation {
    pub user_id: String,
    pub amount: MoneyCents,
    pub share_type: ShareType,
}

/// Splits `amount` between `members` according to `rule`.
///
/// The result follows the order of `members` and always satisfies
/// `sum(shares) == amount`.
pub fn allocate_shares(
    amount: MoneyCents,
    currency: Currency,
    members: &[String],
    rule: &SplitRule,
) -> ResultEngine<Vec<ShareAllocation>> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidInput(
            "amount must be > 0".to_string(),
        ));
    }
    amount.ensure_within_limit("amount")?;
    if members.is_empty() {
        return Err(EngineError::InvalidInput(
            "at least one member is required".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(members.len());
    for member in members {
        if !seen.insert(member.as_str()) {
            return Err(EngineError::InvalidInput(format!(
                "duplicate member: {member}"
            )));
        }
    }

    match rule {
        SplitRule::Equal => Ok(equal_split(amount, members)),
        SplitRule::Custom(custom) => custom_split(amount, currency, members, custom),
        SplitRule::Percentage(bps) => percentage_split(amount, members, bps),
        SplitRule::AssignAll(target) => assign_all(amount, members, target),
    }
}

fn equal_split(amount: MoneyCents, members: &[String]) -> Vec<ShareAllocation> {
    let n = members.len() as i64;
    let base = MoneyCents::new(amount.cents() / n);
    let last = amount - MoneyCents::new(base.cents() * (n - 1));

    members
        .iter()
        .enumerate()
        .map(|(idx, user_id)| ShareAllocation {
            user_id: user_id.clone(),
            amount: if idx + 1 == members.len() { last } else { base },
            share_type: ShareType::Equal,
        })
        .collect()
}

fn ensure_known_members<V>(members: &[String], values: &BTreeMap<String, V>) -> ResultEngine<()> {
    if let Some(unknown) = values.keys().find(|k| !members.contains(*k)) {
        return Err(EngineError::InvalidInput(format!(
            "{unknown} is not a participant"
        )));
    }
    Ok(())
}

/// Exact amounts from the caller. A residual of exactly one minor unit is
/// pushed onto the first member; anything larger is a caller bug.
fn custom_split(
    amount: MoneyCents,
    currency: Currency,
    members: &[String],
    custom: &BTreeMap<String, MoneyCents>,
) -> ResultEngine<Vec<ShareAllocation>> {
    ensure_known_members(members, custom)?;
    if let Some((user, value)) = custom.iter().find(|(_, v)| v.is_negative()) {
        return Err(EngineError::InvalidInput(format!(
            "custom amount for {user} is negative: {value}"
        )));
    }

    let mut shares: Vec<ShareAllocation> = members
        .iter()
        .map(|user_id| ShareAllocation {
            user_id: user_id.clone(),
            amount: custom.get(user_id).copied().unwrap_or_default(),
            share_type: ShareType::Fixed,
        })
        .collect();

    let total = MoneyCents::checked_sum(shares.iter().map(|s| s.amount))
        .ok_or_else(|| EngineError::InvalidInput("custom amounts are too large".to_string()))?;
    let residual = amount
        .checked_sub(total)
        .ok_or_else(|| EngineError::InvalidInput("custom amounts are too large".to_string()))?;
    if residual.is_zero() {
        return Ok(shares);
    }
    if residual.abs() > MoneyCents::new(1) {
        return Err(EngineError::Consistency(format!(
            "custom amounts sum to {}, expected {}",
            total.display_with(currency),
            amount.display_with(currency)
        )));
    }

    let first = &mut shares[0];
    first.amount += residual;
    if first.amount.is_negative() {
        return Err(EngineError::Consistency(format!(
            "cannot absorb rounding residual on {}",
            first.user_id
        )));
    }
    Ok(shares)
}

fn percentage_split(
    amount: MoneyCents,
    members: &[String],
    bps: &BTreeMap<String, u32>,
) -> ResultEngine<Vec<ShareAllocation>> {
    ensure_known_members(members, bps)?;
    let total_bps: u64 = bps.values().map(|v| u64::from(*v)).sum();
    if total_bps != u64::from(FULL_PERCENTAGE_BPS) {
        return Err(EngineError::InvalidInput(format!(
            "percentages must add up to 100%, got {}.{:02}%",
            total_bps / 100,
            total_bps % 100
        )));
    }

    // The remainder goes to the last member actually holding a percentage.
    let absorber = members
        .iter()
        .rposition(|m| bps.get(m).copied().unwrap_or(0) > 0)
        .ok_or_else(|| EngineError::InvalidInput("no member holds a percentage".to_string()))?;

    let mut assigned = MoneyCents::ZERO;
    let mut shares: Vec<ShareAllocation> = members
        .iter()
        .enumerate()
        .map(|(idx, user_id)| {
            let share_bps = i128::from(bps.get(user_id).copied().unwrap_or(0));
            let cents = if idx == absorber {
                0
            } else {
                (i128::from(amount.cents()) * share_bps / i128::from(FULL_PERCENTAGE_BPS)) as i64
            };
            let value = MoneyCents::new(cents);
            assigned += value;
            ShareAllocation {
                user_id: user_id.clone(),
                amount: value,
                share_type: ShareType::Percentage,
            }
        })
        .collect();
    shares[absorber].amount = amount - assigned;
    Ok(shares)
}

fn assign_all(
    amount: MoneyCents,
    members: &[String],
    target: &str,
) -> ResultEngine<Vec<ShareAllocation>> {
    if !members.iter().any(|m| m == target) {
        return Err(EngineError::InvalidInput(format!(
            "{target} is not a participant"
        )));
    }
    Ok(members
        .iter()
        .map(|user_id| ShareAllocation {
            user_id: user_id.clone(),
            amount: if user_id == target {
                amount
            } else {
                MoneyCents::ZERO
            },
            share_type: ShareType::Fixed,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eur() -> Currency {
        Currency::try_from("EUR").unwrap()
    }

    fn members(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("user{i}")).collect()
    }

    fn amounts(shares: &[ShareAllocation]) -> Vec<i64> {
        shares.iter().map(|s| s.amount.cents()).collect()
    }

    #[test]
    fn equal_split_last_member_absorbs_remainder() {
        let shares =
            allocate_shares(MoneyCents::new(1000), eur(), &members(3), &SplitRule::Equal).unwrap();
        assert_eq!(amounts(&shares), vec![333, 333, 334]);
        assert!(shares.iter().all(|s| s.share_type == ShareType::Equal));
        assert_eq!(shares[2].user_id, "user2");
    }

    #[test]
    fn equal_split_sum_matches_for_many_inputs() {
        let samples = [1, 2, 7, 99, 100, 101, 1000, 3333, 12_345, 99_999, 1_000_001];
        for n in 1..=50 {
            let members = members(n);
            for &cents in &samples {
                let amount = MoneyCents::new(cents);
                let shares = allocate_shares(amount, eur(), &members, &SplitRule::Equal).unwrap();
                assert_eq!(shares.len(), n);
                let total: MoneyCents = shares.iter().map(|s| s.amount).sum();
                assert_eq!(total, amount, "n={n} amount={cents}");
                assert!(shares.iter().all(|s| !s.amount.is_negative()));
            }
        }
    }

    #[test]
    fn custom_split_keeps_exact_amounts() {
        let members = members(2);
        let custom = BTreeMap::from([
            ("user0".to_string(), MoneyCents::new(700)),
            ("user1".to_string(), MoneyCents::new(300)),
        ]);
        let shares = allocate_shares(
            MoneyCents::new(1000),
            eur(),
            &members,
            &SplitRule::Custom(custom),
        )
        .unwrap();
        assert_eq!(amounts(&shares), vec![700, 300]);
        assert!(shares.iter().all(|s| s.share_type == ShareType::Fixed));
    }

    #[test]
    fn custom_split_nudges_first_member_by_one_cent() {
        let members = members(3);
        let custom = BTreeMap::from([
            ("user0".to_string(), MoneyCents::new(333)),
            ("user1".to_string(), MoneyCents::new(333)),
            ("user2".to_string(), MoneyCents::new(333)),
        ]);
        let shares = allocate_shares(
            MoneyCents::new(1000),
            eur(),
            &members,
            &SplitRule::Custom(custom),
        )
        .unwrap();
        assert_eq!(amounts(&shares), vec![334, 333, 333]);
    }

    #[test]
    fn custom_split_rejects_larger_mismatch() {
        let custom = BTreeMap::from([("user0".to_string(), MoneyCents::new(900))]);
        let err = allocate_shares(
            MoneyCents::new(1000),
            eur(),
            &members(2),
            &SplitRule::Custom(custom),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Consistency(_)));
    }

    #[test]
    fn custom_split_rejects_unknown_or_negative_members() {
        let unknown = BTreeMap::from([("mallory".to_string(), MoneyCents::new(1000))]);
        let err = allocate_shares(
            MoneyCents::new(1000),
            eur(),
            &members(2),
            &SplitRule::Custom(unknown),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let negative = BTreeMap::from([
            ("user0".to_string(), MoneyCents::new(1100)),
            ("user1".to_string(), MoneyCents::new(-100)),
        ]);
        let err = allocate_shares(
            MoneyCents::new(1000),
            eur(),
            &members(2),
            &SplitRule::Custom(negative),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn custom_split_overflowing_total_is_invalid() {
        let custom = BTreeMap::from([
            ("user0".to_string(), MoneyCents::new(i64::MAX)),
            ("user1".to_string(), MoneyCents::new(1)),
        ]);
        let err = allocate_shares(
            MoneyCents::new(100),
            eur(),
            &members(2),
            &SplitRule::Custom(custom),
        )
        .unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidInput("custom amounts are too large".to_string())
        );
    }

    #[test]
    fn amount_above_limit_is_invalid() {
        let amount = MoneyCents::new(MoneyCents::MAX_AMOUNT.cents() + 1);
        let err = allocate_shares(amount, eur(), &members(2), &SplitRule::Equal).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
        let shares =
            allocate_shares(MoneyCents::MAX_AMOUNT, eur(), &members(3), &SplitRule::Equal).unwrap();
        let total: MoneyCents = shares.iter().map(|s| s.amount).sum();
        assert_eq!(total, MoneyCents::MAX_AMOUNT);
    }

    #[test]
    fn percentage_split_absorbs_on_last_holder() {
        let bps = BTreeMap::from([
            ("user0".to_string(), 3_333),
            ("user1".to_string(), 3_333),
            ("user2".to_string(), 3_334),
        ]);
        let shares = allocate_shares(
            MoneyCents::new(1000),
            eur(),
            &members(3),
            &SplitRule::Percentage(bps),
        )
        .unwrap();
        assert_eq!(amounts(&shares), vec![333, 333, 334]);
        assert!(shares.iter().all(|s| s.share_type == ShareType::Percentage));
    }

    #[test]
    fn percentage_split_skips_zero_holders_for_remainder() {
        let bps = BTreeMap::from([
            ("user0".to_string(), 5_000),
            ("user1".to_string(), 5_000),
        ]);
        let shares = allocate_shares(
            MoneyCents::new(1001),
            eur(),
            &members(3),
            &SplitRule::Percentage(bps),
        )
        .unwrap();
        assert_eq!(amounts(&shares), vec![500, 501, 0]);
    }

    #[test]
    fn percentage_split_requires_full_hundred() {
        let bps = BTreeMap::from([("user0".to_string(), 9_000)]);
        let err = allocate_shares(
            MoneyCents::new(1000),
            eur(),
            &members(2),
            &SplitRule::Percentage(bps),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn assign_all_to_one_member() {
        let shares = allocate_shares(
            MoneyCents::new(4_250),
            eur(),
            &members(3),
            &SplitRule::AssignAll("user1".to_string()),
        )
        .unwrap();
        assert_eq!(amounts(&shares), vec![0, 4_250, 0]);
        assert!(shares.iter().all(|s| s.share_type == ShareType::Fixed));
    }

    #[test]
    fn rejects_empty_members_and_non_positive_amounts() {
        let err = allocate_shares(MoneyCents::new(100), eur(), &[], &SplitRule::Equal).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let err =
            allocate_shares(MoneyCents::ZERO, eur(), &members(2), &SplitRule::Equal).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));

        let err = allocate_shares(MoneyCents::new(-5), eur(), &members(2), &SplitRule::Equal)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn rejects_duplicate_members() {
        let members = vec!["alice".to_string(), "alice".to_string()];
        let err =
            allocate_shares(MoneyCents::new(100), eur(), &members, &SplitRule::Equal).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }
}
