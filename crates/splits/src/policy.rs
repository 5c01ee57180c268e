use std::collections::BTreeMap;
use std::num::NonZeroU32;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use splitledger_core::{Money, UserId, ValueObject};

use crate::error::AllocationError;

/// Canonical split vocabulary.
///
/// Callers speak two dialects ("amount/percent/share" and
/// "exact/percentage/equal"); both are accepted when parsing, but only these
/// four names exist inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SplitKind {
    Equal,
    Exact,
    Percentage,
    Share,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown split type {0:?} (expected one of: equal, exact, percentage, share)")]
pub struct UnknownSplitKind(pub String);

impl SplitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SplitKind::Equal => "equal",
            SplitKind::Exact => "exact",
            SplitKind::Percentage => "percentage",
            SplitKind::Share => "share",
        }
    }
}

impl core::fmt::Display for SplitKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SplitKind {
    type Err = UnknownSplitKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "equal" | "even" => Ok(SplitKind::Equal),
            "exact" | "amount" | "amounts" => Ok(SplitKind::Exact),
            "percentage" | "percentages" | "percent" => Ok(SplitKind::Percentage),
            "share" | "shares" => Ok(SplitKind::Share),
            _ => Err(UnknownSplitKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for SplitKind {
    type Error = UnknownSplitKind;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A percentage in hundredths of a percent (`10_000` = 100%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Percent(u32);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("percentage must be between 0 and 100 (got {0})")]
pub struct PercentOutOfRange(pub String);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(10_000);

    pub fn from_hundredths(hundredths: u32) -> Result<Self, PercentOutOfRange> {
        if hundredths > Self::HUNDRED.0 {
            return Err(PercentOutOfRange(Decimal::new(hundredths.into(), 2).to_string()));
        }
        Ok(Self(hundredths))
    }

    /// Quantise a decimal percentage (e.g. `33.333`) to hundredths.
    pub fn from_decimal(value: Decimal) -> Result<Self, PercentOutOfRange> {
        if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
            return Err(PercentOutOfRange(value.to_string()));
        }
        let hundredths = (value * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_u32()
            .ok_or_else(|| PercentOutOfRange(value.to_string()))?;
        Self::from_hundredths(hundredths)
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_decimal(self) -> Decimal {
        Decimal::new(self.0.into(), 2)
    }
}

impl core::fmt::Display for Percent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}%", self.as_decimal())
    }
}

impl TryFrom<u32> for Percent {
    type Error = PercentOutOfRange;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_hundredths(value)
    }
}

impl From<Percent> for u32 {
    fn from(value: Percent) -> Self {
        value.0
    }
}

/// How an expense total is divided among its participants.
///
/// Each variant carries exactly the per-user parameters it needs, in typed
/// form. Maps are ordered so iteration (and serialization) is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum AllocationPolicy {
    Equal,
    ExactAmounts(BTreeMap<UserId, Money>),
    Percentages(BTreeMap<UserId, Percent>),
    Shares(BTreeMap<UserId, NonZeroU32>),
}

impl ValueObject for AllocationPolicy {}

impl AllocationPolicy {
    pub fn kind(&self) -> SplitKind {
        match self {
            AllocationPolicy::Equal => SplitKind::Equal,
            AllocationPolicy::ExactAmounts(_) => SplitKind::Exact,
            AllocationPolicy::Percentages(_) => SplitKind::Percentage,
            AllocationPolicy::Shares(_) => SplitKind::Share,
        }
    }

    /// Exact per-user amounts; every amount must be non-negative.
    pub fn exact_amounts(
        amounts: impl IntoIterator<Item = (UserId, Money)>,
    ) -> Result<Self, AllocationError> {
        let mut map = BTreeMap::new();
        for (user, amount) in amounts {
            if amount.is_negative() {
                return Err(AllocationError::NegativeAmount { user, amount });
            }
            map.insert(user, amount);
        }
        Ok(AllocationPolicy::ExactAmounts(map))
    }

    pub fn percentages(percentages: impl IntoIterator<Item = (UserId, Percent)>) -> Self {
        AllocationPolicy::Percentages(percentages.into_iter().collect())
    }

    /// Share counts; zero shares are rejected.
    pub fn shares(shares: impl IntoIterator<Item = (UserId, u32)>) -> Result<Self, AllocationError> {
        let mut map = BTreeMap::new();
        for (user, count) in shares {
            let count = NonZeroU32::new(count).ok_or(AllocationError::ZeroShare { user })?;
            map.insert(user, count);
        }
        Ok(AllocationPolicy::Shares(map))
    }

    /// Users the policy carries parameters for (empty for `Equal`).
    pub fn parameterized_users(&self) -> Vec<UserId> {
        match self {
            AllocationPolicy::Equal => Vec::new(),
            AllocationPolicy::ExactAmounts(m) => m.keys().copied().collect(),
            AllocationPolicy::Percentages(m) => m.keys().copied().collect(),
            AllocationPolicy::Shares(m) => m.keys().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use uuid::Uuid;

    fn user(n: u128) -> UserId {
        UserId::from_uuid(Uuid::from_u128(n))
    }

    #[rstest]
    #[case("equal", SplitKind::Equal)]
    #[case("Even", SplitKind::Equal)]
    #[case("exact", SplitKind::Exact)]
    #[case("amount", SplitKind::Exact)]
    #[case("percentage", SplitKind::Percentage)]
    #[case("PERCENT", SplitKind::Percentage)]
    #[case("share", SplitKind::Share)]
    #[case(" shares ", SplitKind::Share)]
    fn both_vocabularies_map_to_one_kind(#[case] raw: &str, #[case] expected: SplitKind) {
        assert_eq!(raw.parse::<SplitKind>().unwrap(), expected);
    }

    #[test]
    fn unknown_split_kind_is_rejected() {
        assert!("itemized".parse::<SplitKind>().is_err());
        assert!(serde_json::from_str::<SplitKind>("\"itemized\"").is_err());
    }

    #[test]
    fn split_kind_serializes_canonically() {
        let kind: SplitKind = serde_json::from_str("\"amount\"").unwrap();
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"exact\"");
    }

    #[test]
    fn percent_quantises_to_hundredths() {
        let p = Percent::from_decimal(Decimal::new(33_333, 3)).unwrap();
        assert_eq!(p.hundredths(), 3_333);
        assert_eq!(p.to_string(), "33.33%");
    }

    #[rstest]
    #[case(Decimal::new(-1, 2))]
    #[case(Decimal::new(10_001, 2))]
    fn percent_out_of_range_is_rejected(#[case] value: Decimal) {
        assert!(Percent::from_decimal(value).is_err());
    }

    #[test]
    fn percent_deserialization_enforces_range() {
        assert!(serde_json::from_str::<Percent>("10001").is_err());
        assert_eq!(serde_json::from_str::<Percent>("2500").unwrap().hundredths(), 2_500);
    }

    #[test]
    fn zero_share_is_rejected_at_construction() {
        let err = AllocationPolicy::shares([(user(1), 2), (user(2), 0)]).unwrap_err();
        assert_eq!(err, AllocationError::ZeroShare { user: user(2) });
    }

    #[test]
    fn negative_exact_amount_is_rejected_at_construction() {
        let err = AllocationPolicy::exact_amounts([(user(1), Money::from_cents(-1))]).unwrap_err();
        assert!(matches!(err, AllocationError::NegativeAmount { .. }));
    }

    #[test]
    fn policy_serializes_with_kind_tag() {
        let policy = AllocationPolicy::shares([(user(1), 3)]).unwrap();
        let json = serde_json::to_value(&policy).unwrap();
        assert_eq!(json["kind"], "shares");
        let back: AllocationPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }
}
