//! Pre-flight validation of split drafts.
//!
//! A [`SplitDraft`] is the loosely-typed shape an expense arrives in, whether
//! typed by hand or produced by the draft-review workflow. Validation reports
//! *every* problem as a user-facing [`SplitIssue`]; only a clean draft is
//! turned into a typed [`AllocationPolicy`].

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use splitledger_core::{Currency, EngineError, Money, UserId};

use crate::allocator::{Allocation, allocate};
use crate::policy::{AllocationPolicy, Percent, SplitKind};

/// Exact amounts may miss the total by this much before being rejected.
pub const EXACT_TOLERANCE_CENTS: i64 = 1;

/// Percentages may miss 100 by this many hundredths.
pub const PERCENT_TOLERANCE_HUNDREDTHS: i64 = 1;

/// An expense split as submitted, before validation.
///
/// `params` holds one decimal per participant, read according to `kind`:
/// an amount in major currency units, a percentage, or a share count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitDraft {
    pub total_cents: i64,
    #[serde(default)]
    pub currency: Currency,
    pub kind: SplitKind,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub params: BTreeMap<UserId, Decimal>,
}

/// A user-facing validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitIssue {
    NoParticipants,
    DuplicateParticipant { user: UserId },
    NonPositiveTotal { total: Money, currency: Currency },
    NotAParticipant { user: UserId },
    MissingValue { kind: SplitKind, user: UserId },
    InvalidAmount { user: UserId, value: Decimal },
    NegativeAmount { user: UserId, value: Decimal },
    AmountsDoNotAddUp { expected: Money, actual: Money, currency: Currency },
    PercentOutOfRange { user: UserId, value: Decimal },
    PercentagesDoNotAddUp { total: Decimal },
    ShareNotPositiveInteger { user: UserId, value: Decimal },
}

impl core::fmt::Display for SplitIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SplitIssue::NoParticipants => f.write_str("Choose at least one person to split with."),
            SplitIssue::DuplicateParticipant { user } => {
                write!(f, "{user} is listed more than once.")
            }
            SplitIssue::NonPositiveTotal { total, currency } => write!(
                f,
                "The expense total must be greater than zero (got {}).",
                currency.format(*total)
            ),
            SplitIssue::NotAParticipant { user } => {
                write!(f, "A value was entered for {user}, who is not part of this split.")
            }
            SplitIssue::MissingValue { kind, user } => write!(f, "Enter a {kind} for {user}."),
            SplitIssue::InvalidAmount { user, value } => {
                write!(f, "{value} is not a valid amount for {user}.")
            }
            SplitIssue::NegativeAmount { user, value } => {
                write!(f, "Amounts cannot be negative ({user}: {value}).")
            }
            SplitIssue::AmountsDoNotAddUp {
                expected,
                actual,
                currency,
            } => write!(
                f,
                "Amounts add up to {} but the expense total is {}.",
                currency.format(*actual),
                currency.format(*expected)
            ),
            SplitIssue::PercentOutOfRange { user, value } => {
                write!(f, "Percentages must be between 0 and 100 ({user}: {value}).")
            }
            SplitIssue::PercentagesDoNotAddUp { total } => {
                write!(f, "Percentages add up to {total}% instead of 100%.")
            }
            SplitIssue::ShareNotPositiveInteger { user, value } => {
                write!(f, "Shares must be positive whole numbers ({user}: {value}).")
            }
        }
    }
}

/// A draft that failed validation, with every issue found.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{}", render_issues(.0))]
pub struct SplitRejected(pub Vec<SplitIssue>);

fn render_issues(issues: &[SplitIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl From<SplitRejected> for EngineError {
    fn from(err: SplitRejected) -> Self {
        EngineError::input(err.to_string())
    }
}

/// Validate a draft; an empty list means it can be allocated.
pub fn validate_split(draft: &SplitDraft) -> Vec<SplitIssue> {
    match draft.build_policy() {
        Ok(_) => Vec::new(),
        Err(SplitRejected(issues)) => issues,
    }
}

impl SplitDraft {
    pub fn validate(&self) -> Vec<SplitIssue> {
        validate_split(self)
    }

    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Validate and convert into a typed policy.
    ///
    /// Exact amounts within [`EXACT_TOLERANCE_CENTS`] of the total are
    /// reconciled here, so the allocator always receives an exact map.
    pub fn to_policy(&self) -> Result<AllocationPolicy, SplitRejected> {
        self.build_policy()
    }

    /// Validate, convert, and allocate in one step.
    pub fn allocate(&self) -> Result<Allocation, EngineError> {
        let policy = self.to_policy()?;
        Ok(allocate(self.total(), &self.participants, &policy)?)
    }

    fn build_policy(&self) -> Result<AllocationPolicy, SplitRejected> {
        let mut issues = self.structural_issues();

        let policy = match self.kind {
            SplitKind::Equal => Some(AllocationPolicy::Equal),
            SplitKind::Exact => self.exact_policy(&mut issues),
            SplitKind::Percentage => self.percentage_policy(&mut issues),
            SplitKind::Share => self.share_policy(&mut issues),
        };

        match policy {
            Some(policy) if issues.is_empty() => Ok(policy),
            _ => Err(SplitRejected(issues)),
        }
    }

    fn structural_issues(&self) -> Vec<SplitIssue> {
        let mut issues = Vec::new();
        if self.participants.is_empty() {
            issues.push(SplitIssue::NoParticipants);
        }
        let mut seen = BTreeSet::new();
        for &user in &self.participants {
            if !seen.insert(user) {
                issues.push(SplitIssue::DuplicateParticipant { user });
            }
        }
        if self.total_cents <= 0 {
            issues.push(SplitIssue::NonPositiveTotal {
                total: self.total(),
                currency: self.currency,
            });
        }
        if self.kind != SplitKind::Equal {
            for &user in self.params.keys() {
                if !seen.contains(&user) {
                    issues.push(SplitIssue::NotAParticipant { user });
                }
            }
        }
        issues
    }

    fn exact_policy(&self, issues: &mut Vec<SplitIssue>) -> Option<AllocationPolicy> {
        let mut amounts: Vec<(UserId, i64)> = Vec::with_capacity(self.participants.len());
        let mut clean = true;
        for &user in &self.participants {
            let value = self.params.get(&user).copied().unwrap_or(Decimal::ZERO);
            match to_minor_units(value, self.currency) {
                Some(_) if value < Decimal::ZERO => {
                    issues.push(SplitIssue::NegativeAmount { user, value });
                    clean = false;
                }
                Some(cents) => amounts.push((user, cents)),
                None => {
                    issues.push(SplitIssue::InvalidAmount { user, value });
                    clean = false;
                }
            }
        }
        if !clean || self.participants.is_empty() {
            return None;
        }

        let sum: i128 = amounts.iter().map(|&(_, c)| i128::from(c)).sum();
        let drift = i128::from(self.total_cents) - sum;
        if drift.abs() > i128::from(EXACT_TOLERANCE_CENTS) {
            issues.push(SplitIssue::AmountsDoNotAddUp {
                expected: self.total(),
                actual: Money::from_cents(i64::try_from(sum).unwrap_or(i64::MAX)),
                currency: self.currency,
            });
            return None;
        }

        if drift != 0 {
            // Largest amount absorbs the conversion residue (ties: participant order).
            let mut target = 0;
            for (i, &(_, cents)) in amounts.iter().enumerate() {
                if cents > amounts[target].1 {
                    target = i;
                }
            }
            amounts[target].1 += drift as i64;
            tracing::debug!(
                user = %amounts[target].0,
                drift = %drift,
                "reconciled exact amounts to expense total"
            );
        }

        Some(AllocationPolicy::ExactAmounts(
            amounts
                .into_iter()
                .map(|(user, cents)| (user, Money::from_cents(cents)))
                .collect(),
        ))
    }

    fn percentage_policy(&self, issues: &mut Vec<SplitIssue>) -> Option<AllocationPolicy> {
        let mut entries: Vec<(UserId, Decimal, u32)> = Vec::with_capacity(self.participants.len());
        let mut clean = true;
        for &user in &self.participants {
            let Some(&value) = self.params.get(&user) else {
                issues.push(SplitIssue::MissingValue {
                    kind: SplitKind::Percentage,
                    user,
                });
                clean = false;
                continue;
            };
            match Percent::from_decimal(value) {
                Ok(percent) => entries.push((user, value, percent.hundredths())),
                Err(_) => {
                    issues.push(SplitIssue::PercentOutOfRange { user, value });
                    clean = false;
                }
            }
        }
        if !clean || self.participants.is_empty() {
            return None;
        }

        // Tolerance applies to the values as entered, not the rounded ones.
        let total: Decimal = entries.iter().map(|&(_, value, _)| value).sum();
        let tolerance = Decimal::new(PERCENT_TOLERANCE_HUNDREDTHS, 2);
        if (total - Decimal::ONE_HUNDRED).abs() > tolerance {
            issues.push(SplitIssue::PercentagesDoNotAddUp { total });
            return None;
        }

        reconcile_hundredths(&mut entries);
        let mut percentages = BTreeMap::new();
        for (user, _, hundredths) in entries {
            let percent = Percent::from_hundredths(hundredths).ok()?;
            percentages.insert(user, percent);
        }
        Some(AllocationPolicy::Percentages(percentages))
    }

    fn share_policy(&self, issues: &mut Vec<SplitIssue>) -> Option<AllocationPolicy> {
        let mut shares = BTreeMap::new();
        for &user in &self.participants {
            let Some(&value) = self.params.get(&user) else {
                issues.push(SplitIssue::MissingValue {
                    kind: SplitKind::Share,
                    user,
                });
                continue;
            };
            let count = value
                .fract()
                .is_zero()
                .then(|| value.to_u32())
                .flatten()
                .and_then(NonZeroU32::new);
            match count {
                Some(count) => {
                    shares.insert(user, count);
                }
                None => issues.push(SplitIssue::ShareNotPositiveInteger { user, value }),
            }
        }
        if shares.len() != self.participants.len() || self.participants.is_empty() {
            return None;
        }
        Some(AllocationPolicy::Shares(shares))
    }
}

/// Bring rounded percentages back to exactly 100.00%.
///
/// A shortfall goes to the largest percentage. An excess is taken from the
/// largest percentages first, never below zero. Ties follow participant order.
fn reconcile_hundredths(entries: &mut [(UserId, Decimal, u32)]) {
    let target = i64::from(Percent::HUNDRED.hundredths());
    let sum: i64 = entries.iter().map(|&(_, _, h)| i64::from(h)).sum();
    let drift = target - sum;
    if drift == 0 {
        return;
    }

    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&i| core::cmp::Reverse(entries[i].2));

    if drift > 0 {
        if let Some(&largest) = order.first() {
            entries[largest].2 += drift as u32;
        }
    } else {
        let mut excess = drift.unsigned_abs();
        for i in order {
            if excess == 0 {
                break;
            }
            let taken = excess.min(u64::from(entries[i].2));
            entries[i].2 -= taken as u32;
            excess -= taken;
        }
    }
    tracing::debug!(drift, "reconciled rounded percentages to 100%");
}

/// Convert a major-unit decimal (e.g. `12.345` USD) to minor units, rounding
/// half away from zero at the currency's scale.
fn to_minor_units(value: Decimal, currency: Currency) -> Option<i64> {
    let factor = Decimal::from(10i64.checked_pow(currency.minor_digits())?);
    value
        .checked_mul(factor)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}
