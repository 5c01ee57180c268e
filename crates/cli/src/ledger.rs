//! JSON input documents and their conversion into domain values.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use splitledger_core::{Currency, EngineError, ExpenseId, Money, SettlementId, UserId};
use splitledger_settlement::SettlementRecord;
use splitledger_splits::{Expense, SplitDraft};

#[derive(Debug, Clone, Deserialize)]
pub struct MemberEntry {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseEntry {
    #[serde(default)]
    pub id: Option<ExpenseId>,
    pub payer: UserId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub split: SplitDraft,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementEntry {
    #[serde(default)]
    pub id: Option<SettlementId>,
    pub from_user: UserId,
    pub to_user: UserId,
    pub amount_cents: i64,
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

/// A group's history as exported by the expense repository.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerDocument {
    pub members: Vec<MemberEntry>,
    #[serde(default)]
    pub expenses: Vec<ExpenseEntry>,
    #[serde(default)]
    pub settlements: Vec<SettlementEntry>,
}

/// Validated domain view of a [`LedgerDocument`].
///
/// Every expense in a ledger shares one currency; settlements are recorded
/// in it too.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub currency: Currency,
    pub members: Vec<UserId>,
    pub names: BTreeMap<UserId, String>,
    pub expenses: Vec<Expense>,
    pub settlements: Vec<SettlementRecord>,
}

impl Ledger {
    /// Display label for a user: their name if known, else their id.
    pub fn label(&self, user: UserId) -> String {
        self.names
            .get(&user)
            .cloned()
            .unwrap_or_else(|| user.to_string())
    }
}

impl TryFrom<LedgerDocument> for Ledger {
    type Error = anyhow::Error;

    fn try_from(doc: LedgerDocument) -> anyhow::Result<Self> {
        let members = doc.members.iter().map(|m| m.id).collect();
        let names = doc
            .members
            .iter()
            .filter_map(|m| m.name.clone().map(|name| (m.id, name)))
            .collect();

        let mut currency: Option<Currency> = None;
        let mut expenses = Vec::with_capacity(doc.expenses.len());
        for (index, entry) in doc.expenses.into_iter().enumerate() {
            match currency {
                Some(expected) if expected != entry.split.currency => {
                    bail!(
                        "expense #{index} ({:?}) is in {} but earlier expenses are in {}; \
                         balances across currencies cannot be netted",
                        entry.description,
                        entry.split.currency.code(),
                        expected.code(),
                    );
                }
                Some(_) => {}
                None => currency = Some(entry.split.currency),
            }
            let policy = entry
                .split
                .to_policy()
                .map_err(EngineError::from)
                .with_context(|| format!("expense #{index} ({:?}) is invalid", entry.description))?;
            let expense = Expense::new(
                entry.id.unwrap_or_default(),
                entry.payer,
                entry.split.total(),
                entry.split.participants.clone(),
                policy,
                entry.occurred_at.unwrap_or_else(Utc::now),
            )
            .map_err(EngineError::from)
            .with_context(|| format!("expense #{index} ({:?}) could not be allocated", entry.description))?
            .with_description(entry.description);
            expenses.push(expense);
        }

        let mut settlements = Vec::with_capacity(doc.settlements.len());
        for (index, entry) in doc.settlements.into_iter().enumerate() {
            let record = SettlementRecord::new(
                entry.id.unwrap_or_default(),
                entry.from_user,
                entry.to_user,
                Money::from_cents(entry.amount_cents),
                entry.settled_at.unwrap_or_else(Utc::now),
            )
            .map_err(EngineError::from)
            .with_context(|| format!("settlement #{index} is invalid"))?;
            settlements.push(record);
        }

        Ok(Self {
            currency: currency.unwrap_or_default(),
            members,
            names,
            expenses,
            settlements,
        })
    }
}

/// Read and parse a JSON document from `path`.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
