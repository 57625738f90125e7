//! Command structs for engine operations.
//!
//! These types group parameters for write operations (expense create/update,
//! settlement create), keeping call sites readable and avoiding long
//! argument lists.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Currency, MoneyCents, SettlementStatus, SettlementType, SplitRule};

/// Record a new expense in a group.
#[derive(Clone, Debug)]
pub struct CreateExpenseCmd {
    pub group_id: Uuid,
    pub user_id: String,
    pub amount: MoneyCents,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
    /// Defaults to the acting user.
    pub paid_by: Option<String>,
    /// Defaults to every non-assistant member.
    pub participants: Option<Vec<String>>,
    pub split: SplitRule,
    pub description: Option<String>,
}

impl CreateExpenseCmd {
    #[must_use]
    pub fn new(
        group_id: Uuid,
        user_id: impl Into<String>,
        amount: MoneyCents,
        currency: Currency,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id,
            user_id: user_id.into(),
            amount,
            currency,
            occurred_at,
            paid_by: None,
            participants: None,
            split: SplitRule::Equal,
            description: None,
        }
    }

    #[must_use]
    pub fn paid_by(mut self, user_id: impl Into<String>) -> Self {
        self.paid_by = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = Some(participants.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn split(mut self, split: SplitRule) -> Self {
        self.split = split;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Patch an existing expense. Shares are re-allocated whenever the amount,
/// payer, participants or split rule change.
#[derive(Clone, Debug)]
pub struct UpdateExpenseCmd {
    pub group_id: Uuid,
    pub expense_id: Uuid,
    pub user_id: String,

    pub amount: Option<MoneyCents>,
    pub currency: Option<Currency>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub paid_by: Option<String>,
    pub participants: Option<Vec<String>>,
    pub split: Option<SplitRule>,
    pub description: Option<String>,
}

impl UpdateExpenseCmd {
    #[must_use]
    pub fn new(group_id: Uuid, expense_id: Uuid, user_id: impl Into<String>) -> Self {
        Self {
            group_id,
            expense_id,
            user_id: user_id.into(),
            amount: None,
            currency: None,
            occurred_at: None,
            paid_by: None,
            participants: None,
            split: None,
            description: None,
        }
    }

    #[must_use]
    pub fn amount(mut self, amount: MoneyCents) -> Self {
        self.amount = Some(amount);
        self
    }

    #[must_use]
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = Some(currency);
        self
    }

    #[must_use]
    pub fn occurred_at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    #[must_use]
    pub fn paid_by(mut self, user_id: impl Into<String>) -> Self {
        self.paid_by = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn participants<I, S>(mut self, participants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.participants = Some(participants.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn split(mut self, split: SplitRule) -> Self {
        self.split = Some(split);
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn reallocates(&self) -> bool {
        self.amount.is_some()
            || self.paid_by.is_some()
            || self.participants.is_some()
            || self.split.is_some()
    }
}

/// Record a settlement between the acting user and another member.
#[derive(Clone, Debug)]
pub struct CreateSettlementCmd {
    pub group_id: Uuid,
    /// The initiator.
    pub user_id: String,
    pub settled_with: String,
    pub amount: MoneyCents,
    pub currency: Currency,
    pub settlement_type: SettlementType,
    pub status: SettlementStatus,
    pub occurred_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl CreateSettlementCmd {
    #[must_use]
    pub fn new(
        group_id: Uuid,
        user_id: impl Into<String>,
        settled_with: impl Into<String>,
        amount: MoneyCents,
        currency: Currency,
        settlement_type: SettlementType,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            group_id,
            user_id: user_id.into(),
            settled_with: settled_with.into(),
            amount,
            currency,
            settlement_type,
            status: SettlementStatus::Pending,
            occurred_at,
            description: None,
        }
    }

    /// Initial status; only `Pending` and `PendingConfirmation` are accepted.
    #[must_use]
    pub fn status(mut self, status: SettlementStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
