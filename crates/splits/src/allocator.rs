//! Split allocator: turns an expense total into exact per-participant cents.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use splitledger_core::{Money, UserId, ValueObject, round_div_half_away};

use crate::error::AllocationError;
use crate::policy::{AllocationPolicy, Percent, SplitKind};

/// Percentages may miss 100% by at most one hundredth of a percent.
const PERCENT_TOLERANCE_HUNDREDTHS: u64 = 1;

/// One participant's share of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationEntry {
    pub user: UserId,
    pub amount: Money,
}

/// Per-participant breakdown of an expense total, in participant order.
///
/// Invariant: amounts are non-negative and sum exactly to the total that was
/// allocated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Allocation {
    entries: Vec<AllocationEntry>,
}

impl ValueObject for Allocation {}

impl Allocation {
    pub fn entries(&self) -> &[AllocationEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &AllocationEntry> {
        self.entries.iter()
    }

    pub fn total(&self) -> Money {
        self.entries.iter().map(|e| e.amount).sum()
    }

    pub fn amount_for(&self, user: UserId) -> Option<Money> {
        self.entries.iter().find(|e| e.user == user).map(|e| e.amount)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Allocate `total` among `participants` according to `policy`.
///
/// Pure and deterministic: the same arguments always produce the same
/// allocation, so retried expense creation is idempotent. Participant order
/// matters; it decides who receives leftover cents.
pub fn allocate(
    total: Money,
    participants: &[UserId],
    policy: &AllocationPolicy,
) -> Result<Allocation, AllocationError> {
    let members = distinct_participants(participants)?;
    if !total.is_positive() {
        return Err(AllocationError::NonPositiveTotal { total });
    }
    for user in policy.parameterized_users() {
        if !members.contains(&user) {
            return Err(AllocationError::UnknownParticipant {
                kind: policy.kind(),
                user,
            });
        }
    }

    let amounts = match policy {
        AllocationPolicy::Equal => split_equal(total.cents(), participants.len()),
        AllocationPolicy::ExactAmounts(amounts) => split_exact(total, participants, amounts)?,
        AllocationPolicy::Percentages(percentages) => {
            let weights = required_weights(participants, SplitKind::Percentage, |user| {
                percentages.get(user).map(|p| u64::from(p.hundredths()))
            })?;
            let sum: u64 = weights.iter().sum();
            if sum.abs_diff(u64::from(Percent::HUNDRED.hundredths())) > PERCENT_TOLERANCE_HUNDREDTHS {
                return Err(AllocationError::PercentageTotal { hundredths: sum });
            }
            split_weighted(total, &weights, u64::from(Percent::HUNDRED.hundredths()))
        }
        AllocationPolicy::Shares(shares) => {
            let weights = required_weights(participants, SplitKind::Share, |user| {
                shares.get(user).map(|s| u64::from(s.get()))
            })?;
            let total_shares = weights.iter().sum();
            split_weighted(total, &weights, total_shares)
        }
    };

    let allocated: i128 = amounts.iter().map(|&c| i128::from(c)).sum();
    if allocated != i128::from(total.cents()) || amounts.iter().any(|&c| c < 0) {
        let actual = Money::from_cents(i64::try_from(allocated).unwrap_or(i64::MAX));
        tracing::error!(
            kind = %policy.kind(),
            expected = total.cents(),
            actual = actual.cents(),
            "allocation failed to conserve cents"
        );
        return Err(AllocationError::UnreconciledRounding {
            expected: total,
            actual,
        });
    }

    tracing::debug!(
        kind = %policy.kind(),
        total = total.cents(),
        participants = participants.len(),
        "allocated expense"
    );

    Ok(Allocation {
        entries: participants
            .iter()
            .zip(amounts)
            .map(|(&user, cents)| AllocationEntry {
                user,
                amount: Money::from_cents(cents),
            })
            .collect(),
    })
}

fn distinct_participants(participants: &[UserId]) -> Result<BTreeSet<UserId>, AllocationError> {
    if participants.is_empty() {
        return Err(AllocationError::EmptyParticipants);
    }
    let mut seen = BTreeSet::new();
    for &user in participants {
        if !seen.insert(user) {
            return Err(AllocationError::DuplicateParticipant { user });
        }
    }
    Ok(seen)
}

fn required_weights(
    participants: &[UserId],
    kind: SplitKind,
    lookup: impl Fn(&UserId) -> Option<u64>,
) -> Result<Vec<u64>, AllocationError> {
    participants
        .iter()
        .map(|user| lookup(user).ok_or(AllocationError::PolicyMismatch { kind, user: *user }))
        .collect()
}

/// Base share for everyone; the first `total mod n` participants get one
/// extra cent.
fn split_equal(total: i64, n: usize) -> Vec<i64> {
    let n = n as i64;
    let base = total / n;
    let remainder = total % n;
    (0..n).map(|i| base + i64::from(i < remainder)).collect()
}

fn split_exact(
    total: Money,
    participants: &[UserId],
    amounts: &BTreeMap<UserId, Money>,
) -> Result<Vec<i64>, AllocationError> {
    let mut out = Vec::with_capacity(participants.len());
    for user in participants {
        let amount = amounts.get(user).copied().unwrap_or(Money::ZERO);
        if amount.is_negative() {
            return Err(AllocationError::NegativeAmount {
                user: *user,
                amount,
            });
        }
        out.push(amount.cents());
    }

    let sum: i128 = out.iter().map(|&c| i128::from(c)).sum();
    if sum != i128::from(total.cents()) {
        return Err(AllocationError::ExactSumMismatch {
            expected: total,
            actual: Money::from_cents(i64::try_from(sum).unwrap_or(i64::MAX)),
        });
    }
    Ok(out)
}

/// raw_i = round(total × weight_i / denominator), then repaired to sum to
/// `total`.
fn split_weighted(total: Money, weights: &[u64], denominator: u64) -> Vec<i64> {
    let mut raw: Vec<i64> = weights
        .iter()
        .map(|&w| {
            let share = round_div_half_away(
                i128::from(total.cents()) * i128::from(w),
                i128::from(denominator),
            );
            i64::try_from(share).unwrap_or(i64::MAX)
        })
        .collect();
    repair(total.cents(), &mut raw, weights);
    raw
}

/// Spread the rounding drift over participants ordered by descending weight
/// (ties: participant order), as if handing out one cent per participant per
/// round.
///
/// Zero-weight participants never receive a cent, and nobody is taken below
/// zero. Any drift left over is caught by the conservation check in
/// [`allocate`].
fn repair(total: i64, raw: &mut [i64], weights: &[u64]) {
    let diff = i128::from(total) - raw.iter().map(|&c| i128::from(c)).sum::<i128>();
    if diff == 0 {
        return;
    }
    tracing::debug!(drift = %diff, "repairing rounding drift");

    let mut order: Vec<usize> = (0..raw.len()).filter(|&i| weights[i] > 0).collect();
    order.sort_by_key(|&i| Reverse(weights[i]));
    if order.is_empty() {
        return;
    }

    if diff > 0 {
        spread(raw, &order, diff, 1);
        return;
    }

    // Whole rounds until someone would hit zero, then drop them and go again.
    let mut excess = -diff;
    let mut active: Vec<usize> = order.into_iter().filter(|&i| raw[i] > 0).collect();
    while excess > 0 && !active.is_empty() {
        let len = active.len() as i128;
        let floor = active.iter().map(|&i| i128::from(raw[i])).min().unwrap_or(0);
        if excess >= floor * len {
            for &i in &active {
                raw[i] -= floor as i64;
            }
            excess -= floor * len;
            active.retain(|&i| raw[i] > 0);
        } else {
            spread(raw, &active, excess, -1);
            excess = 0;
        }
    }
}

/// Move `amount` cents in direction `sign`: `amount / k` to each of the `k`
/// participants in `order`, plus one more to the first `amount % k`.
fn spread(raw: &mut [i64], order: &[usize], amount: i128, sign: i64) {
    let k = order.len() as i128;
    let each = (amount / k) as i64;
    let extra = (amount % k) as usize;
    for (rank, &i) in order.iter().enumerate() {
        raw[i] += sign * (each + i64::from(rank < extra));
    }
}
