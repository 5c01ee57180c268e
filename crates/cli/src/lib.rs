//! splitledger CLI: split an expense, show group balances, or suggest the
//! payments that settle a group, from JSON documents.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};

use splitledger_core::{Currency, EngineError, UserId};
use splitledger_settlement::{aggregate_balances, ensure_valid_plan, plan_settlements};
use splitledger_splits::{SplitDraft, allocate, validate_split};

pub mod ledger;
pub mod output;

use ledger::{Ledger, LedgerDocument, read_json};
use output::{OutputFormat, Row};

/// splitledger command line
#[derive(Debug, Parser)]
#[command(name = "splitledger")]
#[command(about = "Split shared expenses and settle group balances", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Currency used to display amounts (defaults to the document's currency)
    #[arg(short, long, env = "SPLITLEDGER_CURRENCY")]
    pub currency: Option<Currency>,

    /// Output format (table, json)
    #[arg(short, long, env = "SPLITLEDGER_OUTPUT", value_enum, default_value_t = OutputFormat::Table)]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate a split draft and print the resulting allocation
    Split {
        /// Path to a split draft JSON document
        draft: PathBuf,
    },
    /// Print net balances for a group ledger
    Balances {
        /// Path to a ledger JSON document
        ledger: PathBuf,
    },
    /// Suggest payments that settle a group ledger
    #[command(alias = "plan")]
    Settle {
        /// Path to a ledger JSON document
        ledger: PathBuf,
    },
}

/// Execute a parsed command, writing results to `out`.
pub fn run(cli: Cli, out: &mut dyn Write) -> anyhow::Result<()> {
    match cli.command {
        Commands::Split { draft } => {
            let draft: SplitDraft = read_json(&draft)?;
            let currency = cli.currency.unwrap_or(draft.currency);
            split(&draft, currency, cli.output, out)
        }
        Commands::Balances { ledger } => {
            let ledger = load_ledger(&ledger)?;
            let currency = cli.currency.unwrap_or(ledger.currency);
            balances(&ledger, currency, cli.output, out)
        }
        Commands::Settle { ledger } => {
            let ledger = load_ledger(&ledger)?;
            let currency = cli.currency.unwrap_or(ledger.currency);
            settle(&ledger, currency, cli.output, out)
        }
    }
}

fn load_ledger(path: &std::path::Path) -> anyhow::Result<Ledger> {
    let doc: LedgerDocument = read_json(path)?;
    Ledger::try_from(doc)
}

fn split(
    draft: &SplitDraft,
    currency: Currency,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let issues = validate_split(draft);
    if !issues.is_empty() {
        for issue in &issues {
            tracing::warn!(%issue, "split draft rejected");
        }
        let messages: Vec<String> = issues.iter().map(ToString::to_string).collect();
        bail!("split draft is invalid:\n  {}", messages.join("\n  "));
    }

    let policy = draft.to_policy().map_err(EngineError::from)?;
    let allocation = allocate(draft.total(), &draft.participants, &policy)
        .map_err(EngineError::from)
        .context("allocation failed")?;

    let rows: Vec<Row> = allocation
        .iter()
        .map(|e| Row::amount(e.user.to_string(), e.amount))
        .collect();
    output::write(out, format, currency, &rows, &allocation)
}

fn balances(
    ledger: &Ledger,
    currency: Currency,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let balances = aggregate_balances(&ledger.expenses, &ledger.settlements, &ledger.members)?;
    balances.ensure_balanced()?;

    let rows: Vec<Row> = balances
        .iter()
        .map(|(user, amount)| Row::amount(ledger.label(user), amount))
        .collect();
    output::write(out, format, currency, &rows, &balances)
}

fn settle(
    ledger: &Ledger,
    currency: Currency,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let balances = aggregate_balances(&ledger.expenses, &ledger.settlements, &ledger.members)?;
    let plan = plan_settlements(&balances).context("could not plan settlements")?;
    ensure_valid_plan(&balances, &plan).context("planned settlements failed validation")?;

    let arrow = |from: UserId, to: UserId| format!("{} -> {}", ledger.label(from), ledger.label(to));
    let rows: Vec<Row> = plan
        .iter()
        .map(|i| Row::amount(arrow(i.from_user, i.to_user), i.amount))
        .collect();
    output::write(out, format, currency, &rows, &plan)
}
