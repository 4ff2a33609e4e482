//! Strict wire-contract payloads.
//!
//! Every answer the assistant emits, regardless of the internal path that
//! produced it, is one of three JSON shapes consumed programmatically by
//! downstream callers:
//!
//! - `{"Result": [{"date": "...", "name": "..."}, ...]}` for holiday listings
//! - `{"Result": [{"add": bool, "reason": "..."}]}` for membership verdicts
//! - `{"Error": "..."}` for recoverable extraction failures
//!
//! Output is bare JSON with no surrounding markup fences.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::holiday::Holiday;
use crate::verdict::Verdict;

/// Error payload text for questions without an extractable year/month.
pub const DATE_NOT_FOUND_MESSAGE: &str = "無法從問題中提取日期資訊";

/// One of the three response shapes of the wire contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiResponse {
    /// Membership verdict response
    Verdicts {
        #[serde(rename = "Result")]
        result: Vec<Verdict>,
    },
    /// Holiday listing response
    Holidays {
        #[serde(rename = "Result")]
        result: Vec<Holiday>,
    },
    /// Recoverable error response
    Error {
        #[serde(rename = "Error")]
        error: String,
    },
}

impl ApiResponse {
    /// Wraps a holiday list (possibly empty) as a listing response.
    pub fn holidays(result: Vec<Holiday>) -> Self {
        Self::Holidays { result }
    }

    /// Wraps a single membership verdict.
    pub fn verdict(verdict: Verdict) -> Self {
        Self::Verdicts {
            result: vec![verdict],
        }
    }

    /// The structured payload for an unextractable date reference.
    pub fn date_not_found() -> Self {
        Self::Error {
            error: DATE_NOT_FOUND_MESSAGE.to_string(),
        }
    }

    /// Serializes the response as the bare JSON the contract requires.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if encoding fails; CJK text is emitted
    /// unescaped.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
