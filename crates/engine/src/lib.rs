//! Splitia engine: shared-expense ledger for groups.
//!
//! The pure parts work on in-memory values and never touch storage:
//! - [`allocate_shares`] splits an expense between members;
//! - [`lifecycle::transition`] drives the settlement state machine;
//! - [`compute_group_balances`] folds a group ledger into per-currency balances.
//!
//! [`Engine`] is the sea-orm backed ledger store around them. Every write
//! goes through one database transaction.

pub use allocation::{FULL_PERCENTAGE_BPS, ShareAllocation, SplitRule, allocate_shares};
pub use balances::{
    BalanceSummary, LedgerSnapshot, MemberBalance, compute_group_balances, merge_summaries,
    reconcile,
};
pub use commands::{CreateExpenseCmd, CreateSettlementCmd, UpdateExpenseCmd};
pub use currency::Currency;
pub use error::EngineError;
pub use expenses::{Expense, ExpenseShare, SHARE_SUM_TOLERANCE, ShareType};
pub use group_members::{GroupMember, GroupRole};
pub use groups::Group;
pub use lifecycle::TransitionOutcome;
pub use money::MoneyCents;
pub use ops::{Engine, EngineBuilder};
pub use settlements::{Settlement, SettlementStatus, SettlementType};

mod allocation;
mod balances;
mod commands;
mod currency;
mod error;
mod expense_shares;
mod expenses;
mod group_members;
mod groups;
pub mod lifecycle;
mod money;
mod ops;
mod settlements;
mod users;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
