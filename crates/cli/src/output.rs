//! Output formatting for CLI commands.

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;

use splitledger_core::{Currency, Money};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format (raw minor units)
    Json,
}

/// One line of table output.
#[derive(Debug, Clone)]
pub struct Row {
    pub label: String,
    pub amount: Money,
}

impl Row {
    pub fn amount(label: impl Into<String>, amount: Money) -> Self {
        Self {
            label: label.into(),
            amount,
        }
    }
}

/// Write `rows` as a table, or `value` as pretty JSON.
pub fn write<T: Serialize + ?Sized>(
    out: &mut dyn Write,
    format: OutputFormat,
    currency: Currency,
    rows: &[Row],
    value: &T,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, value)?;
            writeln!(out)?;
        }
        OutputFormat::Table => {
            if rows.is_empty() {
                writeln!(out, "(nothing to show)")?;
                return Ok(());
            }
            let width = rows.iter().map(|r| r.label.chars().count()).max().unwrap_or(0);
            for row in rows {
                writeln!(
                    out,
                    "{:<width$}  {:>16}",
                    row.label,
                    currency.format(row.amount),
                    width = width
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_aligns_labels_and_amounts() {
        let rows = vec![
            Row::amount("Ana", Money::from_cents(5_000)),
            Row::amount("Benedict", Money::from_cents(-2_100)),
        ];
        let mut out = Vec::new();
        write(&mut out, OutputFormat::Table, Currency::Eur, &rows, &()).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("Ana       "));
        assert!(lines[0].ends_with("€50.00"));
        assert!(lines[1].ends_with("-€21.00"));
    }

    #[test]
    fn empty_table_says_so() {
        let mut out = Vec::new();
        write(&mut out, OutputFormat::Table, Currency::Usd, &[], &()).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "(nothing to show)\n");
    }
}
