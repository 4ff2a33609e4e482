//! Membership verdicts for follow-up questions.
//!
//! A follow-up turn asks whether a candidate holiday is already in the
//! previously stored list. The judgment itself is delegated to the model;
//! this module owns the verdict shape, the deterministic fallback used when
//! the model's reply cannot be parsed, and the list rendering that makes a
//! `reason` self-contained and auditable.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::holiday::Holiday;

/// Whether a candidate holiday should be added to the stored list.
///
/// `add = true` means the candidate is judged absent from the list. The
/// `reason` states whether the holiday is already present and enumerates the
/// current list contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub add: bool,
    pub reason: String,
}

/// A candidate holiday referenced by a follow-up question.
///
/// The date may be partially specified: `"10-31"` (no year) and
/// `"2024-10-31"` are both accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub date: String,
    pub name: String,
}

/// How much of a calendar date the candidate actually pinned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateDate {
    Full(NaiveDate),
    MonthDay { month: u32, day: u32 },
    Unparsed,
}

impl Candidate {
    fn parsed_date(&self) -> CandidateDate {
        let raw = self.date.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return CandidateDate::Full(date);
        }
        let mut parts = raw.splitn(2, '-');
        if let (Some(month), Some(day)) = (parts.next(), parts.next()) {
            if let (Ok(month), Ok(day)) = (month.trim().parse(), day.trim().parse()) {
                return CandidateDate::MonthDay { month, day };
            }
        }
        CandidateDate::Unparsed
    }

    /// Case- and whitespace-insensitive match against a stored holiday.
    ///
    /// The name must match; the date must match too when it could be parsed,
    /// with year-less candidates compared on month and day only.
    pub fn matches(&self, holiday: &Holiday) -> bool {
        if normalize_name(&self.name) != normalize_name(&holiday.name) {
            return false;
        }
        match self.parsed_date() {
            CandidateDate::Full(date) => date == holiday.date,
            CandidateDate::MonthDay { month, day } => {
                holiday.date.month() == month && holiday.date.day() == day
            }
            CandidateDate::Unparsed => true,
        }
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Renders a holiday list as `名稱 (YYYY-MM-DD)` entries for verdict reasons
/// and prompt context.
pub fn render_list(list: &[Holiday]) -> String {
    if list.is_empty() {
        return "（清單目前是空的）".to_string();
    }
    list.iter()
        .map(|holiday| format!("{} ({})", holiday.name, holiday.date))
        .collect::<Vec<_>>()
        .join("、")
}

impl Verdict {
    /// Deterministic verdict computed from the stored list, used whenever
    /// the model reply cannot be parsed into the expected shape. The reason
    /// always enumerates the current list so the answer is auditable without
    /// re-querying state.
    pub fn fallback(candidate: &Candidate, list: &[Holiday]) -> Self {
        let contents = render_list(list);
        if list.iter().any(|holiday| candidate.matches(holiday)) {
            Self {
                add: false,
                reason: format!(
                    "節日「{}」({}) 已經存在於該月份的節日清單中，不需要新增。目前清單包含: {}",
                    candidate.name, candidate.date, contents
                ),
            }
        } else {
            Self {
                add: true,
                reason: format!(
                    "節日「{}」({}) 不存在於該月份的節日清單中，需要新增。目前清單包含: {}",
                    candidate.name, candidate.date, contents
                ),
            }
        }
    }

    /// Shape-preserving verdict for follow-ups where no candidate holiday
    /// could be recovered from the question.
    pub fn unidentified(list: &[Holiday]) -> Self {
        Self {
            add: false,
            reason: format!(
                "無法從問題中識別節日資訊，因此不進行新增。目前清單包含: {}",
                render_list(list)
            ),
        }
    }
}
