//! Balance aggregation: expenses + settlement records → net balance per user.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use splitledger_core::{EngineError, EngineResult, Entity, Money, UserId};
use splitledger_splits::Expense;

use crate::record::SettlementRecord;

/// Net position per user.
///
/// Positive means the group owes the user; negative means the user owes the
/// group. Keyed by user id so iteration order is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetBalances(BTreeMap<UserId, Money>);

impl NetBalances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance for `user`; users never seen have a zero balance.
    pub fn get(&self, user: UserId) -> Money {
        self.0.get(&user).copied().unwrap_or(Money::ZERO)
    }

    pub fn iter(&self) -> impl Iterator<Item = (UserId, Money)> + '_ {
        self.0.iter().map(|(&user, &amount)| (user, amount))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, user: UserId) -> bool {
        self.0.contains_key(&user)
    }

    pub fn credit(&mut self, user: UserId, amount: Money) -> EngineResult<()> {
        let balance = self.0.entry(user).or_default();
        let current = *balance;
        *balance = current
            .checked_add(amount)
            .ok_or_else(|| out_of_range(user, i128::from(current.cents()) + i128::from(amount.cents())))?;
        Ok(())
    }

    pub fn debit(&mut self, user: UserId, amount: Money) -> EngineResult<()> {
        let balance = self.0.entry(user).or_default();
        let current = *balance;
        *balance = current
            .checked_sub(amount)
            .ok_or_else(|| out_of_range(user, i128::from(current.cents()) - i128::from(amount.cents())))?;
        Ok(())
    }

    /// Sum over all users, widened so it cannot overflow.
    pub fn sum(&self) -> i128 {
        self.0.values().map(|m| i128::from(m.cents())).sum()
    }

    /// Fails with a state-invariant error unless balances net to zero.
    pub fn ensure_balanced(&self) -> EngineResult<()> {
        let sum = self.sum();
        if sum != 0 {
            tracing::error!(sum = %sum, users = self.len(), "net balances do not sum to zero");
            return Err(EngineError::state_invariant(format!(
                "net balances sum to {sum} cents instead of zero"
            )));
        }
        Ok(())
    }

    pub fn into_inner(self) -> BTreeMap<UserId, Money> {
        self.0
    }
}

/// Builds from explicit per-user balances; a repeated user keeps the last value.
impl FromIterator<(UserId, Money)> for NetBalances {
    fn from_iter<I: IntoIterator<Item = (UserId, Money)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn out_of_range(user: UserId, cents: i128) -> EngineError {
    tracing::error!(%user, cents = %cents, "net balance out of range");
    EngineError::state_invariant(format!(
        "net balance for {user} ({cents} cents) does not fit in a 64-bit amount"
    ))
}

/// Fold a group's history into net balances.
///
/// Every member starts at zero. Each expense credits its payer with the total
/// and debits every allocation entry; each settlement record credits the
/// payer and debits the recipient. Addition commutes, so input order never
/// affects the result.
///
/// Users who appear in the history but not in `members` are still folded (so
/// the zero-sum invariant survives) and logged.
///
/// Sums are kept in `i128`; a final balance outside the `i64` range is a
/// state-invariant error.
pub fn aggregate_balances(
    expenses: &[Expense],
    settlements: &[SettlementRecord],
    members: &[UserId],
) -> EngineResult<NetBalances> {
    let known: BTreeSet<UserId> = members.iter().copied().collect();
    let mut running: BTreeMap<UserId, i128> = members.iter().map(|&user| (user, 0)).collect();

    let note_outsider = |user: UserId, source: &str| {
        if !known.contains(&user) {
            tracing::warn!(%user, source, "history references a user outside the group");
        }
    };

    for expense in expenses {
        note_outsider(expense.payer(), "expense payer");
        *running.entry(expense.payer()).or_default() += i128::from(expense.total().cents());
        let mut allocated: i128 = 0;
        for entry in expense.allocation().iter() {
            note_outsider(entry.user, "expense participant");
            *running.entry(entry.user).or_default() -= i128::from(entry.amount.cents());
            allocated += i128::from(entry.amount.cents());
        }
        if allocated != i128::from(expense.total().cents()) {
            tracing::error!(
                expense = %expense.id(),
                total = expense.total().cents(),
                allocated = %allocated,
                "expense allocation does not conserve its total"
            );
        }
    }

    for record in settlements {
        note_outsider(record.from_user(), "settlement payer");
        note_outsider(record.to_user(), "settlement recipient");
        *running.entry(record.from_user()).or_default() += i128::from(record.amount().cents());
        *running.entry(record.to_user()).or_default() -= i128::from(record.amount().cents());
    }

    let mut balances = BTreeMap::new();
    for (user, cents) in running {
        let cents = i64::try_from(cents).map_err(|_| out_of_range(user, cents))?;
        balances.insert(user, Money::from_cents(cents));
    }

    tracing::debug!(
        expenses = expenses.len(),
        settlements = settlements.len(),
        users = balances.len(),
        "aggregated balances"
    );
    Ok(NetBalances(balances))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use splitledger_core::{ExpenseId, SettlementId};
    use splitledger_splits::AllocationPolicy;
    use uuid::Uuid;

    fn user(n: u128) -> UserId {
        UserId::from_uuid(Uuid::from_u128(n))
    }

    fn equal_expense(payer: UserId, cents: i64, participants: &[UserId]) -> Expense {
        Expense::new(
            ExpenseId::new(),
            payer,
            Money::from_cents(cents),
            participants.to_vec(),
            AllocationPolicy::Equal,
            Utc::now(),
        )
        .unwrap()
    }

    fn payment(from: UserId, to: UserId, cents: i64) -> SettlementRecord {
        SettlementRecord::new(SettlementId::new(), from, to, Money::from_cents(cents), Utc::now())
            .unwrap()
    }

    #[test]
    fn members_without_history_start_at_zero() {
        let balances = aggregate_balances(&[], &[], &[user(1), user(2)]).unwrap();
        assert_eq!(balances.len(), 2);
        assert_eq!(balances.get(user(1)), Money::ZERO);
    }

    #[test]
    fn payer_share_nets_out() {
        let members = [user(1), user(2), user(3)];
        let balances = aggregate_balances(&[equal_expense(user(1), 9_000, &members)], &[], &members).unwrap();
        assert_eq!(balances.get(user(1)), Money::from_cents(6_000));
        assert_eq!(balances.get(user(2)), Money::from_cents(-3_000));
        assert_eq!(balances.get(user(3)), Money::from_cents(-3_000));
        assert!(balances.ensure_balanced().is_ok());
    }

    #[test]
    fn settlement_moves_balance_from_debtor_to_creditor() {
        let members = [user(1), user(2)];
        let balances = aggregate_balances(
            &[equal_expense(user(1), 1_000, &members)],
            &[payment(user(2), user(1), 500)],
            &members,
        )
        .unwrap();
        assert_eq!(balances.get(user(1)), Money::ZERO);
        assert_eq!(balances.get(user(2)), Money::ZERO);
    }

    #[test]
    fn outsiders_are_folded_in() {
        let balances = aggregate_balances(
            &[equal_expense(user(1), 300, &[user(1), user(9)])],
            &[],
            &[user(1)],
        )
        .unwrap();
        assert!(balances.contains(user(9)));
        assert_eq!(balances.sum(), 0);
    }

    #[test]
    fn order_of_history_does_not_matter() {
        let members = [user(1), user(2), user(3)];
        let expenses = vec![
            equal_expense(user(1), 1_001, &members),
            equal_expense(user(2), 777, &[user(2), user(3)]),
        ];
        let settlements = vec![payment(user(3), user(1), 100), payment(user(2), user(1), 50)];

        let forward = aggregate_balances(&expenses, &settlements, &members).unwrap();

        let mut expenses_rev = expenses.clone();
        expenses_rev.reverse();
        let mut settlements_rev = settlements.clone();
        settlements_rev.reverse();
        let backward = aggregate_balances(&expenses_rev, &settlements_rev, &members).unwrap();

        assert_eq!(forward, backward);
    }

    #[test]
    fn unbalanced_input_is_a_state_invariant_error() {
        let balances: NetBalances = [(user(1), Money::from_cents(5)), (user(2), Money::from_cents(-4))]
            .into_iter()
            .collect();
        let err = balances.ensure_balanced().unwrap_err();
        assert_eq!(err.kind(), splitledger_core::ErrorKind::StateInvariant);
    }

    #[test]
    fn intermediate_sums_beyond_i64_still_net_out() {
        let members = [user(1), user(2)];
        let big = i64::MAX / 2 + 1;
        let expenses = vec![
            equal_expense(user(1), big, &[user(2)]),
            equal_expense(user(1), big, &[user(2)]),
        ];
        let settlements = vec![payment(user(2), user(1), big), payment(user(2), user(1), big)];
        let balances = aggregate_balances(&expenses, &settlements, &members).unwrap();
        assert_eq!(balances.get(user(1)), Money::ZERO);
        assert_eq!(balances.get(user(2)), Money::ZERO);
    }

    #[test]
    fn balance_outside_i64_is_a_state_invariant_error() {
        let members = [user(1), user(2)];
        let big = i64::MAX / 2 + 1;
        let expenses = vec![
            equal_expense(user(1), big, &[user(2)]),
            equal_expense(user(1), big, &[user(2)]),
        ];
        let err = aggregate_balances(&expenses, &[], &members).unwrap_err();
        assert_eq!(err.kind(), splitledger_core::ErrorKind::StateInvariant);
    }

    #[test]
    fn credit_and_debit_reject_overflow() {
        let mut balances = NetBalances::new();
        balances.credit(user(1), Money::from_cents(i64::MAX)).unwrap();
        assert!(balances.credit(user(1), Money::from_cents(1)).is_err());
        assert_eq!(balances.get(user(1)), Money::from_cents(i64::MAX));

        balances.debit(user(2), Money::from_cents(40)).unwrap();
        assert_eq!(balances.get(user(2)), Money::from_cents(-40));
    }
}
