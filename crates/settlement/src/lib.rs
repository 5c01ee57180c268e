//! Group balances and debt settlement.
//!
//! Folds expenses and recorded payments into net balances, plans the payments
//! that bring those balances to zero, and checks any such plan. Everything
//! here is recomputed from the caller's history; nothing is persisted.

pub mod balances;
pub mod cache;
pub mod planner;
pub mod record;
pub mod verify;

pub use balances::{NetBalances, aggregate_balances};
pub use cache::BalanceCache;
pub use planner::{SettlementInstruction, plan_settlements};
pub use record::{SettlementRecord, SettlementRecordError};
pub use verify::{InstructionIssue, ensure_valid_plan, validate_instructions};
