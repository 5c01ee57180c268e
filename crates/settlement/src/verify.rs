//! Post-checks for settlement plans, whether produced by the planner or
//! merged/optimised elsewhere.

use std::collections::BTreeMap;

use splitledger_core::{EngineError, EngineResult, Money, UserId};

use crate::balances::NetBalances;
use crate::planner::SettlementInstruction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstructionIssue {
    NonPositiveAmount { index: usize, amount: Money },
    SelfPayment { index: usize, user: UserId },
    /// Applying the plan leaves `user` with `residual` instead of zero.
    Unbalanced { user: UserId, residual: i128 },
}

impl core::fmt::Display for InstructionIssue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InstructionIssue::NonPositiveAmount { index, amount } => {
                write!(f, "instruction #{index} has non-positive amount {amount}")
            }
            InstructionIssue::SelfPayment { index, user } => {
                write!(f, "instruction #{index} pays {user} to themselves")
            }
            InstructionIssue::Unbalanced { user, residual } => {
                write!(f, "plan leaves {user} with {residual} cents outstanding")
            }
        }
    }
}

/// Check `instructions` against the balances they are meant to clear.
///
/// Each instruction is applied like a settlement record (payer credited,
/// recipient debited); afterwards every user must be at exactly zero.
pub fn validate_instructions(
    balances: &NetBalances,
    instructions: &[SettlementInstruction],
) -> Vec<InstructionIssue> {
    let mut issues = Vec::new();
    let mut remaining: BTreeMap<UserId, i128> = balances
        .iter()
        .map(|(user, amount)| (user, i128::from(amount.cents())))
        .collect();

    for (index, instruction) in instructions.iter().enumerate() {
        if !instruction.amount.is_positive() {
            issues.push(InstructionIssue::NonPositiveAmount {
                index,
                amount: instruction.amount,
            });
        }
        if instruction.from_user == instruction.to_user {
            issues.push(InstructionIssue::SelfPayment {
                index,
                user: instruction.from_user,
            });
        }
        let cents = i128::from(instruction.amount.cents());
        *remaining.entry(instruction.from_user).or_default() += cents;
        *remaining.entry(instruction.to_user).or_default() -= cents;
    }

    issues.extend(
        remaining
            .into_iter()
            .filter(|&(_, residual)| residual != 0)
            .map(|(user, residual)| InstructionIssue::Unbalanced { user, residual }),
    );
    issues
}

/// Like [`validate_instructions`], but as a state-invariant error.
pub fn ensure_valid_plan(
    balances: &NetBalances,
    instructions: &[SettlementInstruction],
) -> EngineResult<()> {
    let issues = validate_instructions(balances, instructions);
    if issues.is_empty() {
        return Ok(());
    }
    let message = issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    tracing::error!(issues = issues.len(), %message, "settlement plan failed validation");
    Err(EngineError::state_invariant(message))
}
