//! Sequential, human-readable invoice numbers.
//!
//! Format: `FACT-{YYYY}{MM}{seq}` where `seq` is zero-padded to three digits.
//! The sequence restarts every calendar month. Past 999 the width simply grows
//! (`FACT-2025061000`); the next number after that is derived from the last
//! three characters only, exactly like any other number.
//!
//! Finding "the latest number of the month" is the store's job; this module
//! only turns that (optional) number into the next one.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use facturo_core::ValueObject;

pub const INVOICE_NUMBER_PREFIX: &str = "FACT-";

const SEQUENCE_WIDTH: usize = 3;

/// Calendar month an invoice number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NumberingPeriod {
    year: i32,
    month: u32,
}

impl NumberingPeriod {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// `FACT-YYYYMM`, the prefix every number of this month starts with.
    pub fn prefix(&self) -> String {
        format!("{INVOICE_NUMBER_PREFIX}{:04}{:02}", self.year, self.month)
    }
}

/// An assigned invoice number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceNumber(String);

impl ValueObject for InvoiceNumber {}

impl InvoiceNumber {
    /// Wrap a number read back from storage.
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn with_sequence(period: NumberingPeriod, sequence: u32) -> Self {
        Self(format!(
            "{}{:0width$}",
            period.prefix(),
            sequence,
            width = SEQUENCE_WIDTH
        ))
    }

    pub fn first(period: NumberingPeriod) -> Self {
        Self::with_sequence(period, 1)
    }

    /// Number following `latest` within `period`.
    ///
    /// `latest` is the most recently created number sharing the period prefix,
    /// or `None` for the first invoice of the month. A suffix that does not
    /// parse restarts the sequence at 1.
    pub fn next(period: NumberingPeriod, latest: Option<&InvoiceNumber>) -> Self {
        match latest {
            None => Self::first(period),
            Some(latest) => {
                let previous = latest.trailing_sequence().unwrap_or(0);
                Self::with_sequence(period, previous.saturating_add(1))
            }
        }
    }

    /// Integer value of the last three characters.
    pub fn trailing_sequence(&self) -> Option<u32> {
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(SEQUENCE_WIDTH - 1)
            .map(|(idx, _)| idx)
            .unwrap_or(0);
        let tail = &self.0[start..];
        if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        tail.parse().ok()
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl core::fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
