//! Settlement lifecycle.
//!
//! ```text
//! Pending             --initiator marks paid/received--> PendingConfirmation
//! PendingConfirmation --counterparty confirms---------> Confirmed
//! Confirmed           --receiver marks settled--------> Completed   (terminal)
//! Pending | PendingConfirmation --initiator cancels---> Cancelled   (terminal)
//! ```
//!
//! Confirming a settlement produces one compensating expense: paid by the
//! settlement payer, with a single `-amount` share on the receiver. Balance
//! computations only ever see that expense, never the settlement status.
//!
//! This module is pure. Persisting the outcome atomically is the ledger
//! store's job (see `Engine::transition_settlement`).

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    EngineError, Expense, ExpenseShare, ResultEngine, Settlement, SettlementStatus, ShareType,
};

/// Who is allowed to drive a given edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Actor {
    Initiator,
    Counterparty,
    Receiver,
}

impl Actor {
    fn user<'a>(self, settlement: &'a Settlement) -> &'a str {
        match self {
            Self::Initiator => &settlement.initiated_by,
            Self::Counterparty => settlement.counterparty(),
            Self::Receiver => settlement.receiver(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Counterparty => "counterparty",
            Self::Receiver => "recipient",
        }
    }
}

fn allowed_actor(from: SettlementStatus, to: SettlementStatus) -> Option<(Actor, &'static str)> {
    use SettlementStatus::*;
    match (from, to) {
        (Pending, PendingConfirmation) => Some((Actor::Initiator, "mark this settlement as paid")),
        (PendingConfirmation, Confirmed) => Some((Actor::Counterparty, "confirm this settlement")),
        (Confirmed, Completed) => Some((Actor::Receiver, "complete this settlement")),
        (Pending | PendingConfirmation, Cancelled) => {
            Some((Actor::Initiator, "cancel this settlement"))
        }
        _ => None,
    }
}

/// Result of a successful transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitionOutcome {
    pub settlement: Settlement,
    /// Present only when the transition lands on `Confirmed`.
    pub compensating_expense: Option<Expense>,
}

/// Validates and applies `current -> to` on behalf of `acting_user`.
///
/// Users outside the settlement always get `ForbiddenTransition`, whatever
/// the status. For the parties, fails with `InvalidTransition` when the edge
/// does not exist from the current status ("already finalized") and with
/// `ForbiddenTransition` when the edge belongs to the other party ("not your
/// turn"). The input is never modified.
pub fn transition(
    current: &Settlement,
    to: SettlementStatus,
    acting_user: &str,
    at: DateTime<Utc>,
) -> ResultEngine<TransitionOutcome> {
    if !current.involves(acting_user) {
        return Err(EngineError::ForbiddenTransition(
            "only the settlement parties can change its status".to_string(),
        ));
    }

    let from = current.status;
    let Some((actor, action)) = allowed_actor(from, to) else {
        return Err(invalid_transition(from, to));
    };
    if actor.user(current) != acting_user {
        return Err(EngineError::ForbiddenTransition(format!(
            "only the {} can {action}",
            actor.describe()
        )));
    }

    let mut settlement = current.clone();
    settlement.status = to;
    settlement.updated_at = at;

    let compensating_expense = (to == SettlementStatus::Confirmed)
        .then(|| compensating_expense(&settlement, acting_user));

    Ok(TransitionOutcome {
        settlement,
        compensating_expense,
    })
}

fn invalid_transition(from: SettlementStatus, to: SettlementStatus) -> EngineError {
    if from.is_terminal() || from == to {
        EngineError::InvalidTransition(format!("settlement is already {}", from.label()))
    } else {
        EngineError::InvalidTransition(format!(
            "cannot move a {} settlement to {}",
            from.label(),
            to.label()
        ))
    }
}

/// Builds the compensating expense for a confirmed settlement.
pub fn compensating_expense(settlement: &Settlement, created_by: &str) -> Expense {
    let id = Uuid::new_v4();
    let description = match &settlement.description {
        Some(text) => format!("Settlement: {text}"),
        None => "Settlement".to_string(),
    };
    Expense {
        id,
        group_id: Some(settlement.group_id),
        description: Some(description),
        amount: settlement.amount,
        currency: settlement.currency,
        occurred_at: settlement.occurred_at,
        paid_by: settlement.payer().to_string(),
        created_by: created_by.to_string(),
        is_settlement: true,
        settlement_id: Some(settlement.id),
        shares: vec![ExpenseShare::new(
            id,
            settlement.receiver(),
            -settlement.amount,
            ShareType::Fixed,
        )],
    }
}
