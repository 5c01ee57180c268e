use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use splitledger_core::{EngineError, Entity, Money, SettlementId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementRecordError {
    #[error("settlement amount must be positive (got {0})")]
    NonPositiveAmount(Money),

    #[error("{0} cannot settle with themselves")]
    SelfSettlement(UserId),
}

impl From<SettlementRecordError> for EngineError {
    fn from(err: SettlementRecordError) -> Self {
        EngineError::input(err.to_string())
    }
}

/// A payment that actually happened: `from_user` paid `to_user`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    id: SettlementId,
    from_user: UserId,
    to_user: UserId,
    amount: Money,
    settled_at: DateTime<Utc>,
}

impl SettlementRecord {
    pub fn new(
        id: SettlementId,
        from_user: UserId,
        to_user: UserId,
        amount: Money,
        settled_at: DateTime<Utc>,
    ) -> Result<Self, SettlementRecordError> {
        if !amount.is_positive() {
            return Err(SettlementRecordError::NonPositiveAmount(amount));
        }
        if from_user == to_user {
            return Err(SettlementRecordError::SelfSettlement(from_user));
        }
        Ok(Self {
            id,
            from_user,
            to_user,
            amount,
            settled_at,
        })
    }

    pub fn from_user(&self) -> UserId {
        self.from_user
    }

    pub fn to_user(&self) -> UserId {
        self.to_user
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn settled_at(&self) -> DateTime<Utc> {
        self.settled_at
    }
}

impl Entity for SettlementRecord {
    type Id = SettlementId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(n: u128) -> UserId {
        UserId::from_uuid(Uuid::from_u128(n))
    }

    #[test]
    fn rejects_non_positive_amounts() {
        let err = SettlementRecord::new(SettlementId::new(), user(1), user(2), Money::ZERO, Utc::now())
            .unwrap_err();
        assert_eq!(err, SettlementRecordError::NonPositiveAmount(Money::ZERO));
    }

    #[test]
    fn rejects_self_settlement() {
        let err = SettlementRecord::new(
            SettlementId::new(),
            user(1),
            user(1),
            Money::from_cents(10),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, SettlementRecordError::SelfSettlement(user(1)));
        assert!(EngineError::from(err).is_user_facing());
    }
}
