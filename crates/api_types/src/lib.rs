//! Request and response bodies of the HTTP API.
//!
//! Amounts travel as signed integers in minor units (`*_minor`), currencies
//! as three-letter codes. Every request names its currency explicitly.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub mod user {
    use super::*;

    /// Self-registration; the id is the caller's `x-user-id`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserNew {
        pub display_name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserCreated {
        pub id: String,
    }
}

pub mod group {
    use super::*;

    /// Role of a member inside a group.
    ///
    /// - `ADMIN`: exactly one per group, manages members.
    /// - `MEMBER` / `GUEST`: take part in expenses and settlements.
    /// - `ASSISTANT`: the chat bot, never part of any money computation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum GroupRole {
        Admin,
        Member,
        Guest,
        Assistant,
    }

    impl GroupRole {
        /// Returns the canonical role string used by the engine/database.
        pub fn as_str(self) -> &'static str {
            match self {
                Self::Admin => "ADMIN",
                Self::Member => "MEMBER",
                Self::Guest => "GUEST",
                Self::Assistant => "ASSISTANT",
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupNew {
        pub name: String,
        /// Base currency, e.g. `"EUR"`.
        pub currency: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupView {
        pub id: Uuid,
        pub name: String,
        pub currency: String,
        pub created_by: String,
        pub created_at: DateTime<Utc>,
        pub members: Vec<MemberView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct GroupListResponse {
        pub groups: Vec<GroupView>,
    }

    /// Request body for adding a member.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberNew {
        pub user_id: String,
        pub role: GroupRole,
    }

    /// Request body for changing a member's role.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberRoleUpdate {
        pub role: GroupRole,
    }

    /// Request body for handing the admin role over.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AdminTransfer {
        pub user_id: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MembersResponse {
        pub members: Vec<MemberView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberView {
        pub user_id: String,
        pub role: GroupRole,
    }
}

pub mod expense {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum ShareType {
        Equal,
        Percentage,
        Fixed,
    }

    /// How an expense is split between participants.
    ///
    /// ```json
    /// {"kind": "equal"}
    /// {"kind": "custom", "values": {"alice": 700, "bob": 300}}
    /// {"kind": "percentage", "values": {"alice": 2500, "bob": 7500}}
    /// {"kind": "assign_all", "values": "alice"}
    /// ```
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(tag = "kind", content = "values", rename_all = "snake_case")]
    pub enum SplitRule {
        Equal,
        /// Minor units per member.
        Custom(BTreeMap<String, i64>),
        /// Basis points per member, summing to 10000.
        Percentage(BTreeMap<String, u32>),
        AssignAll(String),
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseNew {
        /// Must be > 0.
        pub amount_minor: i64,
        pub currency: String,
        /// RFC3339 timestamp, including timezone offset (local user time).
        pub occurred_at: DateTime<FixedOffset>,
        /// Defaults to the acting user.
        pub paid_by: Option<String>,
        /// Defaults to every member except assistants.
        pub participants: Option<Vec<String>>,
        /// Defaults to an equal split.
        pub split: Option<SplitRule>,
        pub description: Option<String>,
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseUpdate {
        pub amount_minor: Option<i64>,
        pub currency: Option<String>,
        pub occurred_at: Option<DateTime<FixedOffset>>,
        pub paid_by: Option<String>,
        pub participants: Option<Vec<String>>,
        pub split: Option<SplitRule>,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ShareView {
        pub user_id: String,
        /// Negative only on settlement expenses.
        pub amount_minor: i64,
        pub share_type: ShareType,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseView {
        pub id: Uuid,
        pub description: Option<String>,
        pub amount_minor: i64,
        pub currency: String,
        pub occurred_at: DateTime<Utc>,
        pub paid_by: String,
        pub created_by: String,
        pub is_settlement: bool,
        pub settlement_id: Option<Uuid>,
        pub shares: Vec<ShareView>,
    }

    /// Query string of `GET /groups/{group_id}/expenses`.
    #[derive(Debug, Default, Serialize, Deserialize)]
    pub struct ExpenseList {
        pub limit: Option<u64>,
        /// Opaque pagination cursor (base64), from `next_cursor`.
        ///
        /// Newest → older pagination.
        pub cursor: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ExpenseListResponse {
        pub expenses: Vec<ExpenseView>,
        /// Opaque cursor for fetching the next page (older items).
        pub next_cursor: Option<String>,
    }

    /// Stateless split preview.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AllocateRequest {
        pub amount_minor: i64,
        pub currency: String,
        pub members: Vec<String>,
        pub split: Option<SplitRule>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AllocationView {
        pub user_id: String,
        pub amount_minor: i64,
        pub share_type: ShareType,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AllocateResponse {
        pub shares: Vec<AllocationView>,
    }
}

pub mod settlement {
    use super::*;
    use crate::expense::ExpenseView;

    /// `PAYMENT`: the initiator pays the counterparty. `RECEIPT`: the
    /// initiator receives from the counterparty.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum SettlementType {
        Payment,
        Receipt,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum SettlementStatus {
        Pending,
        PendingConfirmation,
        Confirmed,
        Completed,
        Cancelled,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementNew {
        pub settled_with: String,
        /// Must be > 0.
        pub amount_minor: i64,
        pub currency: String,
        pub settlement_type: SettlementType,
        /// `PENDING` (default) or `PENDING_CONFIRMATION`.
        pub status: Option<SettlementStatus>,
        /// RFC3339 timestamp, including timezone offset (local user time).
        pub occurred_at: DateTime<FixedOffset>,
        pub description: Option<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementView {
        pub id: Uuid,
        pub group_id: Uuid,
        pub amount_minor: i64,
        pub currency: String,
        pub occurred_at: DateTime<Utc>,
        pub description: Option<String>,
        pub initiated_by: String,
        pub settled_with: String,
        pub settlement_type: SettlementType,
        pub status: SettlementStatus,
        pub updated_at: DateTime<Utc>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementListResponse {
        pub settlements: Vec<SettlementView>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementTransition {
        pub status: SettlementStatus,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct SettlementTransitionResponse {
        pub settlement: SettlementView,
        /// Present when the settlement was just confirmed.
        pub compensating_expense: Option<ExpenseView>,
    }
}

pub mod balance {
    use super::*;

    /// Positive: `user_id` owes the requester. Negative: the requester owes
    /// `user_id`.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct MemberBalanceView {
        pub user_id: String,
        pub amount_minor: i64,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalanceSummaryView {
        pub currency: String,
        pub total_owed_minor: i64,
        pub total_owing_minor: i64,
        pub net_balance_minor: i64,
        pub balances: Vec<MemberBalanceView>,
    }

    /// One entry per currency.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct BalancesResponse {
        pub balances: Vec<BalanceSummaryView>,
    }
}
