//! Settlement planner: net balances → suggested payments.
//!
//! Greedy largest-creditor / largest-debtor matching. It is O(n log n) and
//! deterministic, and usually close to the minimum number of payments, but
//! it is not guaranteed to be globally minimal for every distribution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use splitledger_core::{EngineError, EngineResult, Money, SettlementId, UserId};

use crate::balances::NetBalances;
use crate::record::{SettlementRecord, SettlementRecordError};

/// A suggested payment. Ephemeral: becomes a [`SettlementRecord`] only once
/// someone actually pays it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementInstruction {
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount: Money,
}

impl SettlementInstruction {
    pub fn into_record(
        self,
        id: SettlementId,
        settled_at: DateTime<Utc>,
    ) -> Result<SettlementRecord, SettlementRecordError> {
        SettlementRecord::new(id, self.from_user, self.to_user, self.amount, settled_at)
    }
}

/// Plan the payments that bring `balances` to zero.
///
/// Refuses balances that do not sum to zero, and reports any residual left
/// after matching instead of dropping it.
pub fn plan_settlements(balances: &NetBalances) -> EngineResult<Vec<SettlementInstruction>> {
    balances.ensure_balanced()?;

    let mut creditors: Vec<(UserId, i128)> = Vec::new();
    let mut debtors: Vec<(UserId, i128)> = Vec::new();
    for (user, balance) in balances.iter() {
        let cents = i128::from(balance.cents());
        if cents > 0 {
            creditors.push((user, cents));
        } else if cents < 0 {
            debtors.push((user, -cents));
        }
    }

    // Largest first; equal amounts fall back to user id so output is stable.
    creditors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    debtors.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut instructions = Vec::new();
    let (mut ci, mut di) = (0, 0);
    while ci < creditors.len() && di < debtors.len() {
        let amount = creditors[ci].1.min(debtors[di].1);
        let cents = i64::try_from(amount)
            .map_err(|_| EngineError::state_invariant("settlement amount exceeds range"))?;
        instructions.push(SettlementInstruction {
            from_user: debtors[di].0,
            to_user: creditors[ci].0,
            amount: Money::from_cents(cents),
        });

        creditors[ci].1 -= amount;
        debtors[di].1 -= amount;
        if creditors[ci].1 == 0 {
            ci += 1;
        }
        if debtors[di].1 == 0 {
            di += 1;
        }
    }

    let residual: i128 = creditors[ci..].iter().map(|c| c.1).sum::<i128>()
        + debtors[di..].iter().map(|d| d.1).sum::<i128>();
    if residual != 0 {
        tracing::error!(residual = %residual, "settlement planning left an unmatched residual");
        return Err(EngineError::state_invariant(format!(
            "settlement planning left {residual} cents unmatched"
        )));
    }

    tracing::debug!(
        users = balances.len(),
        instructions = instructions.len(),
        "planned settlements"
    );
    Ok(instructions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    fn user(n: u128) -> UserId {
        UserId::from_uuid(Uuid::from_u128(n))
    }

    fn balances(entries: &[(u128, i64)]) -> NetBalances {
        entries
            .iter()
            .map(|&(u, c)| (user(u), Money::from_cents(c)))
            .collect()
    }

    fn triples(plan: &[SettlementInstruction]) -> Vec<(UserId, UserId, i64)> {
        plan.iter()
            .map(|i| (i.from_user, i.to_user, i.amount.cents()))
            .collect()
    }

    #[test]
    fn one_creditor_two_debtors() {
        let plan = plan_settlements(&balances(&[(1, 500), (2, -300), (3, -200)])).unwrap();
        assert_eq!(
            triples(&plan),
            vec![(user(2), user(1), 300), (user(3), user(1), 200)]
        );
    }

    #[rstest]
    #[case::empty(&[], 0)]
    #[case::all_settled(&[(1, 0), (2, 0)], 0)]
    #[case::pair(&[(1, 100), (2, -100)], 1)]
    #[case::two_by_two(&[(1, 700), (2, 300), (3, -600), (4, -400)], 3)]
    #[case::mirror_pairs(&[(1, 250), (2, 100), (3, -250), (4, -100)], 2)]
    fn instruction_counts(#[case] entries: &[(u128, i64)], #[case] expected: usize) {
        let plan = plan_settlements(&balances(entries)).unwrap();
        assert_eq!(plan.len(), expected);
        assert!(plan.iter().all(|i| i.amount.is_positive() && i.from_user != i.to_user));
    }

    #[test]
    fn ties_are_broken_by_user_id() {
        let plan = plan_settlements(&balances(&[(4, 100), (3, 100), (2, -100), (1, -100)])).unwrap();
        assert_eq!(
            triples(&plan),
            vec![(user(1), user(3), 100), (user(2), user(4), 100)]
        );
    }

    #[test]
    fn unbalanced_input_is_refused() {
        let err = plan_settlements(&balances(&[(1, 100), (2, -99)])).unwrap_err();
        assert_eq!(err.kind(), splitledger_core::ErrorKind::StateInvariant);
    }

    #[test]
    fn instruction_converts_to_record() {
        let instruction = SettlementInstruction {
            from_user: user(2),
            to_user: user(1),
            amount: Money::from_cents(300),
        };
        let record = instruction
            .into_record(SettlementId::new(), Utc::now())
            .unwrap();
        assert_eq!(record.from_user(), user(2));
        assert_eq!(record.amount(), Money::from_cents(300));
    }
}
