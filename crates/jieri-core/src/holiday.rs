//! Holiday domain model.
//!
//! The atomic unit of every answer the assistant produces: one calendar
//! date paired with a holiday name.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A single calendar holiday.
///
/// Serializes as `{"date": "YYYY-MM-DD", "name": "..."}`, the exact record
/// shape of the wire contract. The date is validated at construction; the
/// name is stripped of emphasis markup and surrounding whitespace but keeps
/// interior punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// Calendar date (ISO 8601, zero-padded)
    pub date: NaiveDate,
    /// Holiday name, non-empty after trimming
    pub name: String,
}

impl Holiday {
    /// Creates a holiday from an already-validated date and a raw name.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EmptyName`] if nothing remains of the name after
    /// markup and whitespace trimming.
    pub fn new(date: NaiveDate, name: impl AsRef<str>) -> Result<Self> {
        let name = trim_markup(name.as_ref());
        if name.is_empty() {
            return Err(CoreError::EmptyName);
        }
        Ok(Self {
            date,
            name: name.to_string(),
        })
    }

    /// Creates a holiday from year/month/day components.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDate`] if the components do not form a
    /// real calendar date (e.g. February 30th), or [`CoreError::EmptyName`]
    /// for a blank name.
    pub fn from_ymd(year: i32, month: u32, day: u32, name: impl AsRef<str>) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or(CoreError::InvalidDate { year, month, day })?;
        Self::new(date, name)
    }
}

/// Strips emphasis markers and surrounding whitespace from a holiday name.
///
/// Interior punctuation is preserved; only the delimiters themselves and
/// outer whitespace are removed.
fn trim_markup(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c| c == '*' || c == '_' || c == '`')
        .trim()
}
