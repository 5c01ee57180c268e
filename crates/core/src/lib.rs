//! `splitledger-core` — shared building blocks for the split engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the error taxonomy, and integer minor-unit money.

pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use entity::Entity;
pub use error::{EngineError, EngineResult, ErrorKind};
pub use id::{ExpenseId, GroupId, SettlementId, UserId};
pub use money::{Currency, Money, UnknownCurrency, format_money, round_div_half_away};
pub use value_object::ValueObject;
