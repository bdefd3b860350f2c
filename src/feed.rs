//! CSV command feed - turns recorded order flow into engine commands.
//!
//! One row per command:
//!
//! ```text
//! action,order_id,side,price,qty,timestamp
//! submit,1,buy,100.00,100,2024-01-02T09:30:00Z
//! modify,1,,,150,
//! cancel,1,,,,
//! ```
//!
//! Prices are quoted decimals and are converted to fixed-point with the
//! book's `price_scale`.

use std::io;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::command::{CancelOrder, Command, ModifyOrder, NewOrder, Side};
use crate::config::BookConfig;
use crate::error::BookError;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: {reason}")]
    Malformed { row: usize, reason: String },

    #[error("row {row}: {source}")]
    Price { row: usize, source: BookError },
}

/// A raw CSV row
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRecord {
    pub action: String,
    pub order_id: u64,
    pub side: Option<String>,
    pub price: Option<Decimal>,
    pub qty: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A command with the time it was recorded, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedCommand {
    pub at: Option<DateTime<Utc>>,
    pub command: Command,
}

impl CommandRecord {
    /// Convert into an engine command. `row` is only used for error messages.
    pub fn to_command(&self, row: usize, config: &BookConfig) -> Result<Command, FeedError> {
        let malformed = |reason: String| FeedError::Malformed { row, reason };

        match self.action.trim().to_ascii_lowercase().as_str() {
            "submit" | "add" | "new" => {
                let side = self.side.as_deref().map(|s| s.trim().to_ascii_lowercase());
                let side = match side.as_deref() {
                    Some("buy") | Some("bid") | Some("b") => Side::Buy,
                    Some("sell") | Some("ask") | Some("s") => Side::Sell,
                    other => return Err(malformed(format!("bad side {:?}", other))),
                };
                let quote = self.price.ok_or_else(|| malformed("missing price".into()))?;
                let price = config
                    .to_fixed_price(quote)
                    .map_err(|source| FeedError::Price { row, source })?;
                let qty = self
                    .qty
                    .and_then(|q| u32::try_from(q).ok())
                    .ok_or_else(|| malformed(format!("bad quantity {:?}", self.qty)))?;
                Ok(Command::Submit(NewOrder::new(self.order_id, side, price, qty)))
            }
            "cancel" => Ok(Command::Cancel(CancelOrder {
                order_id: self.order_id,
            })),
            "modify" => {
                let new_qty = self.qty.ok_or_else(|| malformed("missing quantity".into()))?;
                Ok(Command::Modify(ModifyOrder {
                    order_id: self.order_id,
                    new_qty,
                }))
            }
            other => Err(malformed(format!("unknown action {:?}", other))),
        }
    }
}

/// Read every row of a CSV feed (with header) into commands.
pub fn read_commands<R: io::Read>(
    reader: R,
    config: &BookConfig,
) -> Result<Vec<TimedCommand>, FeedError> {
    let mut csv = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut commands = Vec::new();
    for (i, record) in csv.deserialize::<CommandRecord>().enumerate() {
        // Header is line 1
        let row = i + 2;
        let record = record?;
        commands.push(TimedCommand {
            at: record.timestamp,
            command: record.to_command(row, config)?,
        });
    }
    Ok(commands)
}
