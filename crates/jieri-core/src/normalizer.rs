//! Free-text to holiday-list normalization.
//!
//! Model answers arrive as markdown-ish prose. This module scans that text
//! for holiday mentions and turns them into validated [`Holiday`] records
//! for the month the question asked about.
//!
//! Two segment grammars are recognized, tried as ordered alternatives at
//! each position:
//!
//! - name-first: `**國慶日** 10月10日`
//! - date-first: `**10月31日 - 蔣公誕辰紀念日**`
//!
//! The year never comes from the text itself; it is injected from the
//! [`DateRef`] extracted from the question. Mentions of other months are
//! discarded, duplicates are kept (deduplication is the membership judge's
//! job, not the normalizer's).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::date_ref::DateRef;
use crate::holiday::Holiday;

/// One holiday mention recognized in model output, tagged by which grammar
/// matched it.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Emphasized name followed by a day reference
    NameFirst { name: String, month: u32, day: u32 },
    /// Emphasized day reference followed by a name
    DateFirst { month: u32, day: u32, name: String },
}

impl Segment {
    fn into_parts(self) -> (u32, u32, String) {
        match self {
            Segment::NameFirst { name, month, day } | Segment::DateFirst { month, day, name } => {
                (month, day, name)
            }
        }
    }
}

/// Combined segment grammar. Alternation order matters: the name-first
/// branch is preferred when both could start at the same position. A stray
/// per-segment `YYYY年` prefix before the day reference is tolerated and
/// ignored; the year always comes from the extracted context.
static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        // name-first: **name** [sep] [YYYY年] M月D日
        r"\*\*(?P<name_a>[^*\n]+?)\*\*[\s:：,，、()（）—–-]*(?:\d{4}\s*年\s*)?(?P<m_a>\d{1,2})\s*月\s*(?P<d_a>\d{1,2})\s*日",
        r"|",
        // date-first: **[YYYY年] M月D日[**] [sep] name**
        r"\*\*\s*(?:\d{4}\s*年\s*)?(?P<m_b>\d{1,2})\s*月\s*(?P<d_b>\d{1,2})\s*日(?:\*\*)?[\s:：,，、()（）—–-]*(?P<name_b>[^*\n]+?)\*\*",
    ))
    .expect("segment grammar must compile")
});

/// Scans text for holiday mentions, producing tagged segments in order of
/// appearance. Matches never overlap; each grammar is tried left to right.
fn segments(text: &str) -> Vec<Segment> {
    SEGMENT_RE
        .captures_iter(text)
        .filter_map(|caps| {
            if let (Some(name), Some(month), Some(day)) =
                (caps.name("name_a"), caps.name("m_a"), caps.name("d_a"))
            {
                Some(Segment::NameFirst {
                    name: name.as_str().to_string(),
                    month: month.as_str().parse().ok()?,
                    day: day.as_str().parse().ok()?,
                })
            } else if let (Some(month), Some(day), Some(name)) =
                (caps.name("m_b"), caps.name("d_b"), caps.name("name_b"))
            {
                Some(Segment::DateFirst {
                    month: month.as_str().parse().ok()?,
                    day: day.as_str().parse().ok()?,
                    name: name.as_str().to_string(),
                })
            } else {
                None
            }
        })
        .collect()
}

/// Normalizes free-form model text into a holiday list for the target month.
///
/// Zero matching segments yield an empty list, never an error: a question
/// may legitimately have no holidays in range. Segments naming a different
/// month, an impossible calendar date, or an empty name are skipped without
/// affecting their siblings. The result is deterministic for identical
/// inputs.
pub fn normalize(text: &str, target: DateRef) -> Vec<Holiday> {
    let mut holidays = Vec::new();
    for segment in segments(text) {
        let (month, day, name) = segment.into_parts();
        if month != target.month {
            continue;
        }
        if let Ok(holiday) = Holiday::from_ymd(target.year, month, day, &name) {
            holidays.push(holiday);
        }
    }
    holidays
}
