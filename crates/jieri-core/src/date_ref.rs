//! Date-reference extraction.
//!
//! Recovers the `(year, month)` a free-form question is asking about, e.g.
//! `"2024年台灣10月紀念日有哪些?"` → `(2024, 10)`. The first year/month pair
//! found reading left to right wins.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, Result};

/// The target year and month recovered from a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRef {
    /// 4-digit calendar year
    pub year: i32,
    /// Month in the range 1..=12
    pub month: u32,
}

/// `2024年 ... 10月` — a 4-digit year with a 年 marker, then the nearest
/// 1-2 digit month with a 月 marker. Intervening text is allowed.
static CJK_YEAR_MONTH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)(\d{4})\s*年.*?(\d{1,2})\s*月").expect("year/month grammar must compile")
});

/// `2024-10`, `2024/10` — numeric fallback for questions without CJK markers.
static NUMERIC_YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})\s*[-/.]\s*(\d{1,2})").expect("numeric grammar must compile"));

impl DateRef {
    /// Creates a date reference, validating the month range.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidDate`] for months outside 1..=12.
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(CoreError::InvalidDate {
                year,
                month,
                day: 1,
            });
        }
        Ok(Self { year, month })
    }

    /// Extracts the target year and month from a question.
    ///
    /// The CJK grammar is tried first, the numeric fallback second; within
    /// each grammar the first pair with a plausible month wins.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DateNotFound`] when no year/month pair can be
    /// located. This is a recoverable condition: callers respond with a
    /// structured error payload, never a crash.
    pub fn extract(question: &str) -> Result<Self> {
        for re in [&*CJK_YEAR_MONTH_RE, &*NUMERIC_YEAR_MONTH_RE] {
            for caps in re.captures_iter(question) {
                let Ok(year) = caps[1].parse::<i32>() else {
                    continue;
                };
                let Ok(month) = caps[2].parse::<u32>() else {
                    continue;
                };
                if let Ok(date_ref) = Self::new(year, month) {
                    return Ok(date_ref);
                }
            }
        }
        Err(CoreError::DateNotFound)
    }

    /// Renders the reference as the `"YYYY-MM"` form used for tool input,
    /// zero-padding the month.
    pub fn ym(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}
