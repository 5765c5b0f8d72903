//! Ledger records as the client sees them.
//!
//! Wire rows are decoded into validated values here; nothing downstream
//! ever handles a date that does not parse or an amount that is not a
//! finite number.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum EntryError {
    #[error("date is required")]
    MissingDate,
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("malformed row: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub id: EntryId,
    pub date: NaiveDate,
    pub amount: f64,
    pub description: String,
    pub category: String,
}

/// The object-shaped projection served for charting.
#[derive(Clone, Debug, PartialEq)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub amount: f64,
    pub category: String,
}

/// `YYYY-MM` grouping key. Ordering is chronological, which matches the
/// lexicographic order of the zero-padded text form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn from_date(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month number, 1 to 12.
    pub fn month(&self) -> u32 {
        self.month
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Anything that can be grouped by month and category.
pub trait Posting {
    fn date(&self) -> NaiveDate;
    fn amount(&self) -> f64;
    fn category(&self) -> &str;

    fn month(&self) -> MonthKey {
        MonthKey::from_date(self.date())
    }
}

impl Posting for Entry {
    fn date(&self) -> NaiveDate {
        self.date
    }
    fn amount(&self) -> f64 {
        self.amount
    }
    fn category(&self) -> &str {
        &self.category
    }
}

impl Posting for HistoryPoint {
    fn date(&self) -> NaiveDate {
        self.date
    }
    fn amount(&self) -> f64 {
        self.amount
    }
    fn category(&self) -> &str {
        &self.category
    }
}

#[derive(Deserialize)]
struct EntryRow(i64, String, Value, String, String);

#[derive(Deserialize)]
struct HistoryRow {
    date: String,
    amount: Value,
    category: String,
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, EntryError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(EntryError::MissingDate);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| EntryError::InvalidDate(raw.to_string()))
}

/// Accepts JSON numbers and numeric strings; anything that is not a finite
/// number is refused rather than turned into zero or NaN.
pub fn parse_amount(raw: &Value) -> Result<f64, EntryError> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(EntryError::InvalidAmount(raw.to_string())),
    }
}

impl Entry {
    /// Decodes one `[id, date, amount, description, category]` row.
    pub fn from_wire(row: Value) -> Result<Self, EntryError> {
        let EntryRow(id, date, amount, description, category) = serde_json::from_value(row)?;
        Ok(Entry {
            id: EntryId(id),
            date: parse_date(&date)?,
            amount: parse_amount(&amount)?,
            description,
            category,
        })
    }
}

impl HistoryPoint {
    pub fn from_wire(row: Value) -> Result<Self, EntryError> {
        let HistoryRow {
            date,
            amount,
            category,
        } = serde_json::from_value(row)?;
        Ok(HistoryPoint {
            date: parse_date(&date)?,
            amount: parse_amount(&amount)?,
            category,
        })
    }
}

impl From<&Entry> for HistoryPoint {
    fn from(entry: &Entry) -> Self {
        HistoryPoint {
            date: entry.date,
            amount: entry.amount,
            category: entry.category.clone(),
        }
    }
}

/// Result of decoding a server payload row by row.
#[derive(Debug)]
pub struct Decoded<T> {
    pub items: Vec<T>,
    pub skipped: usize,
}

pub fn decode_rows<T>(rows: Vec<Value>, decode: fn(Value) -> Result<T, EntryError>) -> Decoded<T> {
    let mut items = Vec::with_capacity(rows.len());
    let mut skipped = 0;
    for row in rows {
        let shown = row.to_string();
        match decode(row) {
            Ok(item) => items.push(item),
            Err(err) => {
                tracing::warn!(row = %shown, error = %err, "skipping malformed ledger row");
                skipped += 1;
            }
        }
    }
    Decoded { items, skipped }
}

/// Raw form values for a new or edited entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntryDraft {
    pub date: String,
    pub amount: String,
    pub description: String,
    pub category: String,
}

/// A draft that passed validation, in the shape the server accepts.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryPayload {
    pub date: String,
    pub amount: f64,
    pub description: String,
    pub category: String,
}

impl EntryDraft {
    pub fn from_entry(entry: &Entry) -> Self {
        EntryDraft {
            date: entry.date.format(DATE_FORMAT).to_string(),
            amount: entry.amount.to_string(),
            description: entry.description.clone(),
            category: entry.category.clone(),
        }
    }

    pub fn validate(&self) -> Result<EntryPayload, EntryError> {
        let date = parse_date(&self.date)?;
        let amount = parse_amount(&Value::String(self.amount.clone()))?;
        Ok(EntryPayload {
            date: date.format(DATE_FORMAT).to_string(),
            amount,
            description: self.description.clone(),
            category: self.category.clone(),
        })
    }
}
