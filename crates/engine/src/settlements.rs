//! Settlements between two group members.
//!
//! A settlement records money moving outside of any single expense:
//! - `Payment`: the initiator pays `settled_with`.
//! - `Receipt`: the initiator receives from `settled_with`.
//!
//! Settlements are never deleted; `Cancelled` is a terminal status. Status
//! changes go through [`crate::lifecycle`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Currency, EngineError, MoneyCents, ResultEngine, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementType {
    Payment,
    Receipt,
}

impl SettlementType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Payment => "PAYMENT",
            Self::Receipt => "RECEIPT",
        }
    }
}

impl TryFrom<&str> for SettlementType {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PAYMENT" => Ok(Self::Payment),
            "RECEIPT" => Ok(Self::Receipt),
            other => Err(EngineError::InvalidInput(format!(
                "invalid settlement type: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettlementStatus {
    Pending,
    PendingConfirmation,
    Confirmed,
    Completed,
    Cancelled,
}

impl SettlementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::PendingConfirmation => "PENDING_CONFIRMATION",
            Self::Confirmed => "CONFIRMED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Human label used in error messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::PendingConfirmation => "pending confirmation",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses whose money effect is materialized in the ledger.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Confirmed | Self::Completed)
    }
}

impl TryFrom<&str> for SettlementStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "PENDING_CONFIRMATION" => Ok(Self::PendingConfirmation),
            "CONFIRMED" => Ok(Self::Confirmed),
            "COMPLETED" => Ok(Self::Completed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(EngineError::InvalidInput(format!(
                "invalid settlement status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: Uuid,
    pub group_id: Uuid,
    /// Always positive; direction comes from `settlement_type`.
    pub amount: MoneyCents,
    pub currency: Currency,
    pub occurred_at: DateTime<Utc>,
    pub description: Option<String>,
    pub initiated_by: String,
    pub settled_with: String,
    pub settlement_type: SettlementType,
    pub status: SettlementStatus,
    pub updated_at: DateTime<Utc>,
}

impl Settlement {
    /// Creates a settlement in `Pending` or `PendingConfirmation`.
    pub fn new(
        group_id: Uuid,
        initiated_by: &str,
        settled_with: &str,
        amount: MoneyCents,
        currency: Currency,
        settlement_type: SettlementType,
        status: SettlementStatus,
        occurred_at: DateTime<Utc>,
        description: Option<String>,
    ) -> ResultEngine<Self> {
        if !amount.is_positive() {
            return Err(EngineError::InvalidInput(
                "settlement amount must be > 0".to_string(),
            ));
        }
        amount.ensure_within_limit("settlement amount")?;
        if initiated_by == settled_with {
            return Err(EngineError::InvalidInput(
                "cannot settle with yourself".to_string(),
            ));
        }
        if !matches!(
            status,
            SettlementStatus::Pending | SettlementStatus::PendingConfirmation
        ) {
            return Err(EngineError::InvalidInput(format!(
                "a settlement cannot start as {}",
                status.label()
            )));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            group_id,
            amount,
            currency,
            occurred_at,
            description,
            initiated_by: initiated_by.to_string(),
            settled_with: settled_with.to_string(),
            settlement_type,
            status,
            updated_at: Utc::now(),
        })
    }

    /// The user whose money leaves.
    pub fn payer(&self) -> &str {
        match self.settlement_type {
            SettlementType::Payment => &self.initiated_by,
            SettlementType::Receipt => &self.settled_with,
        }
    }

    /// The user whose money arrives.
    pub fn receiver(&self) -> &str {
        match self.settlement_type {
            SettlementType::Payment => &self.settled_with,
            SettlementType::Receipt => &self.initiated_by,
        }
    }

    /// The non-initiating party.
    pub fn counterparty(&self) -> &str {
        &self.settled_with
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.initiated_by == user_id || self.settled_with == user_id
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "settlements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub group_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub occurred_at: DateTimeUtc,
    pub description: Option<String>,
    pub initiated_by: String,
    pub settled_with: String,
    pub settlement_type: String,
    pub status: String,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Groups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Settlement> for ActiveModel {
    fn from(settlement: &Settlement) -> Self {
        Self {
            id: ActiveValue::Set(settlement.id.to_string()),
            group_id: ActiveValue::Set(settlement.group_id.to_string()),
            amount_minor: ActiveValue::Set(settlement.amount.cents()),
            currency: ActiveValue::Set(settlement.currency.code().to_string()),
            occurred_at: ActiveValue::Set(settlement.occurred_at),
            description: ActiveValue::Set(settlement.description.clone()),
            initiated_by: ActiveValue::Set(settlement.initiated_by.clone()),
            settled_with: ActiveValue::Set(settlement.settled_with.clone()),
            settlement_type: ActiveValue::Set(settlement.settlement_type.as_str().to_string()),
            status: ActiveValue::Set(settlement.status.as_str().to_string()),
            updated_at: ActiveValue::Set(settlement.updated_at),
        }
    }
}

impl TryFrom<Model> for Settlement {
    type Error = EngineError;

    fn try_from(model: Model) -> ResultEngine<Self> {
        Ok(Self {
            id: parse_uuid(&model.id, "settlement")?,
            group_id: parse_uuid(&model.group_id, "group")?,
            amount: MoneyCents::new(model.amount_minor),
            currency: Currency::try_from(model.currency.as_str())?,
            occurred_at: model.occurred_at,
            description: model.description,
            initiated_by: model.initiated_by,
            settled_with: model.settled_with,
            settlement_type: SettlementType::try_from(model.settlement_type.as_str())?,
            status: SettlementStatus::try_from(model.status.as_str())?,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settlement(kind: SettlementType) -> Settlement {
        Settlement::new(
            Uuid::new_v4(),
            "alice",
            "bob",
            MoneyCents::new(2000),
            Currency::try_from("EUR").unwrap(),
            kind,
            SettlementStatus::Pending,
            Utc::now(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn payment_direction() {
        let s = settlement(SettlementType::Payment);
        assert_eq!(s.payer(), "alice");
        assert_eq!(s.receiver(), "bob");
        assert_eq!(s.counterparty(), "bob");
    }

    #[test]
    fn receipt_direction_inverts_roles() {
        let s = settlement(SettlementType::Receipt);
        assert_eq!(s.payer(), "bob");
        assert_eq!(s.receiver(), "alice");
        assert_eq!(s.counterparty(), "bob");
    }

    #[test]
    fn rejects_invalid_creation() {
        let eur = Currency::try_from("EUR").unwrap();
        let group = Uuid::new_v4();
        let zero = Settlement::new(
            group,
            "alice",
            "bob",
            MoneyCents::ZERO,
            eur,
            SettlementType::Payment,
            SettlementStatus::Pending,
            Utc::now(),
            None,
        );
        assert!(matches!(zero, Err(EngineError::InvalidInput(_))));

        let self_settle = Settlement::new(
            group,
            "alice",
            "alice",
            MoneyCents::new(100),
            eur,
            SettlementType::Payment,
            SettlementStatus::Pending,
            Utc::now(),
            None,
        );
        assert!(matches!(self_settle, Err(EngineError::InvalidInput(_))));

        let confirmed = Settlement::new(
            group,
            "alice",
            "bob",
            MoneyCents::new(100),
            eur,
            SettlementType::Payment,
            SettlementStatus::Confirmed,
            Utc::now(),
            None,
        );
        assert!(matches!(confirmed, Err(EngineError::InvalidInput(_))));

        let huge = Settlement::new(
            group,
            "alice",
            "bob",
            MoneyCents::new(i64::MAX),
            eur,
            SettlementType::Payment,
            SettlementStatus::Pending,
            Utc::now(),
            None,
        );
        assert!(matches!(huge, Err(EngineError::InvalidInput(_))));
    }
}
