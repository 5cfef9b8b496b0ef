use crate::application::engine::Trigger;
use crate::error::{EngineError, Result};
use crate::interfaces::json::trigger::{DispatchTrigger, SettlementTrigger};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Dispatch,
    Settle,
}

/// One CSV row: `kind, order_id, delivered_amount`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct TriggerRecord {
    pub kind: TriggerKind,
    pub order_id: Option<String>,
    pub delivered_amount: Option<Decimal>,
}

impl TryFrom<TriggerRecord> for Trigger {
    type Error = EngineError;

    fn try_from(record: TriggerRecord) -> Result<Self> {
        match record.kind {
            TriggerKind::Dispatch => DispatchTrigger {
                order_id: record.order_id,
            }
            .try_into(),
            TriggerKind::Settle => SettlementTrigger {
                order_id: record.order_id,
                delivered_amount: record.delivered_amount,
            }
            .try_into(),
        }
    }
}

/// Reads triggers from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and tolerating a missing trailing
/// `delivered_amount` column on dispatch rows.
pub struct TriggerReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TriggerReader<R> {
    /// Creates a new `TriggerReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads, deserializes and validates triggers.
    ///
    /// A malformed row yields an error for that row only; iteration continues.
    pub fn triggers(self) -> impl Iterator<Item = Result<Trigger>> {
        self.reader.into_deserialize().map(|result| {
            let record: TriggerRecord = result.map_err(EngineError::from)?;
            Trigger::try_from(record)
        })
    }
}
