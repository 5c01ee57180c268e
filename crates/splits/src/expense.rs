use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{Entity, ExpenseId, Money, UserId};

use crate::allocator::{Allocation, allocate};
use crate::error::AllocationError;
use crate::policy::AllocationPolicy;

/// A shared expense together with the allocation computed for it.
///
/// The allocation is derived once, at creation or revision time, and is never
/// patched in place: [`Expense::revise`] produces a new allocation from
/// scratch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    id: ExpenseId,
    description: String,
    payer: UserId,
    total: Money,
    participants: Vec<UserId>,
    policy: AllocationPolicy,
    allocation: Allocation,
    occurred_at: DateTime<Utc>,
}

impl Expense {
    pub fn new(
        id: ExpenseId,
        payer: UserId,
        total: Money,
        participants: Vec<UserId>,
        policy: AllocationPolicy,
        occurred_at: DateTime<Utc>,
    ) -> Result<Self, AllocationError> {
        let allocation = allocate(total, &participants, &policy)?;
        Ok(Self {
            id,
            description: String::new(),
            payer,
            total,
            participants,
            policy,
            allocation,
            occurred_at,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Edit the amount, participants or policy.
    ///
    /// All-or-nothing: on error the expense is left untouched.
    pub fn revise(
        &mut self,
        total: Money,
        participants: Vec<UserId>,
        policy: AllocationPolicy,
    ) -> Result<(), AllocationError> {
        let allocation = allocate(total, &participants, &policy)?;
        self.total = total;
        self.participants = participants;
        self.policy = policy;
        self.allocation = allocation;
        Ok(())
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn payer(&self) -> UserId {
        self.payer
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn participants(&self) -> &[UserId] {
        &self.participants
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

impl Entity for Expense {
    type Id = ExpenseId;

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

    fn test_expense() -> Expense {
        Expense::new(
            ExpenseId::new(),
            user(1),
            Money::from_cents(9_000),
            vec![user(1), user(2), user(3)],
            AllocationPolicy::Equal,
            Utc::now(),
        )
        .unwrap()
        .with_description("Dinner")
    }

    #[test]
    fn creation_computes_allocation() {
        let expense = test_expense();
        assert_eq!(expense.allocation().len(), 3);
        assert_eq!(expense.allocation().amount_for(user(2)), Some(Money::from_cents(3_000)));
        assert_eq!(expense.description(), "Dinner");
    }

    #[test]
    fn revision_replaces_allocation_wholesale() {
        let mut expense = test_expense();
        let id = *expense.id();

        let policy = AllocationPolicy::shares([(user(2), 1), (user(3), 3)]).unwrap();
        expense
            .revise(Money::from_cents(4_000), vec![user(2), user(3)], policy.clone())
            .unwrap();

        assert_eq!(*expense.id(), id);
        assert_eq!(expense.policy(), &policy);
        assert_eq!(expense.allocation().amount_for(user(1)), None);
        assert_eq!(expense.allocation().amount_for(user(3)), Some(Money::from_cents(3_000)));
        assert_eq!(expense.allocation().total(), expense.total());
    }

    #[test]
    fn failed_revision_leaves_expense_untouched() {
        let mut expense = test_expense();
        let before = expense.clone();

        let err = expense
            .revise(Money::from_cents(-5), vec![user(1)], AllocationPolicy::Equal)
            .unwrap_err();

        assert!(matches!(err, AllocationError::NonPositiveTotal { .. }));
        assert_eq!(expense, before);
    }
}
