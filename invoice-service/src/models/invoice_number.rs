//! Year-scoped invoice numbers: `INV-<year>-<sequence>`.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const INVOICE_NUMBER_PREFIX: &str = "INV";

/// Minimum width of the sequence part. Larger sequences widen instead of wrapping.
const SEQUENCE_WIDTH: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Malformed invoice number: {0}")]
pub struct InvalidInvoiceNumber(pub String);

/// A parsed invoice number.
///
/// Ordering is numeric (year, then sequence). For sequences below 10000 this is
/// the same as the string ordering of the rendered numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvoiceNumber {
    year: i32,
    sequence: u64,
}

impl InvoiceNumber {
    pub fn new(year: i32, sequence: u64) -> Self {
        Self { year, sequence }
    }

    /// The first number of a calendar year.
    pub fn first(year: i32) -> Self {
        Self::new(year, 1)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The number that follows this one within the same year, or `None` once
    /// the sequence space is used up.
    pub fn next(&self) -> Option<Self> {
        self.sequence
            .checked_add(1)
            .map(|sequence| Self::new(self.year, sequence))
    }

    /// String prefix shared by every number of `year`, e.g. `INV-2024-`.
    pub fn prefix_for_year(year: i32) -> String {
        format!("{}-{}-", INVOICE_NUMBER_PREFIX, year)
    }

    pub fn parse(value: &str) -> Result<Self, InvalidInvoiceNumber> {
        let invalid = || InvalidInvoiceNumber(value.to_string());

        let rest = value
            .strip_prefix(INVOICE_NUMBER_PREFIX)
            .and_then(|r| r.strip_prefix('-'))
            .ok_or_else(invalid)?;
        let (year, sequence) = rest.split_once('-').ok_or_else(invalid)?;

        if !is_ascii_digits(year) || !is_ascii_digits(sequence) {
            return Err(invalid());
        }

        Ok(Self {
            year: year.parse().map_err(|_| invalid())?,
            sequence: sequence.parse().map_err(|_| invalid())?,
        })
    }
}

fn is_ascii_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:0>width$}",
            Self::prefix_for_year(self.year),
            self.sequence,
            width = SEQUENCE_WIDTH
        )
    }
}

impl FromStr for InvoiceNumber {
    type Err = InvalidInvoiceNumber;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
