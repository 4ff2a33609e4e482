//! Calendarific holiday lookup.
//!
//! The one authoritative data source the assistant can consult instead of
//! trusting model knowledge. Exposed to the model as the
//! `get_calendar_events` tool taking a single `"YYYY-MM"` string.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use jieri_core::Holiday;

use crate::config;
use crate::error::AgentError;
use crate::tool::Tool;

/// Registered name of the holiday lookup tool.
pub const CALENDAR_TOOL_NAME: &str = "get_calendar_events";

const DEFAULT_BASE_URL: &str = "https://calendarific.com/api/v2/holidays";
const DEFAULT_COUNTRY: &str = "TW";

/// Client for the Calendarific v2 holidays endpoint.
#[derive(Clone)]
pub struct CalendarificClient {
    client: Client,
    api_key: String,
    country: String,
    base_url: String,
}

impl CalendarificClient {
    /// Creates a new client for the given API key, defaulting to Taiwan.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            country: DEFAULT_COUNTRY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Loads configuration from ~/.config/jieri/secret.json or the
    /// CALENDARIFIC_API_KEY environment variable.
    pub fn try_from_env() -> Result<Self, AgentError> {
        if let Ok(secret_config) = config::load_secret_config() {
            if let Some(calendarific) = secret_config.calendarific {
                let mut client = Self::new(calendarific.api_key);
                if let Some(country) = calendarific.country {
                    client = client.with_country(country);
                }
                return Ok(client);
            }
        }

        let api_key = std::env::var("CALENDARIFIC_API_KEY").map_err(|_| {
            AgentError::Config(
                "CALENDARIFIC_API_KEY not found in ~/.config/jieri/secret.json or environment variables"
                    .into(),
            )
        })?;
        Ok(Self::new(api_key))
    }

    /// Overrides the country code after construction.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Overrides the endpoint, e.g. for a test server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetches the holidays for one year/month.
    ///
    /// # Errors
    ///
    /// A non-success upstream status is surfaced as a process error; there
    /// is no fallback data source, so callers see the failure unmodified.
    pub async fn fetch(&self, year: i32, month: u32) -> Result<Vec<Holiday>, AgentError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("country", self.country.as_str()),
                ("year", &year.to_string()),
                ("month", &month.to_string()),
            ])
            .send()
            .await
            .map_err(|err| AgentError::ProcessError {
                status_code: None,
                message: format!("holiday API request failed: {err}"),
                is_retryable: err.is_connect() || err.is_timeout(),
                retry_after: None,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ProcessError {
                status_code: Some(status.as_u16()),
                message: format!("holiday API request failed, status: {status}"),
                is_retryable: status.is_server_error() || status.as_u16() == 429,
                retry_after: None,
            });
        }

        let envelope: HolidaysEnvelope = response.json().await.map_err(|err| {
            AgentError::Other(format!("failed to parse holiday API response: {err}"))
        })?;

        Ok(records_from_envelope(envelope))
    }
}

#[derive(Debug, Deserialize)]
struct HolidaysEnvelope {
    #[serde(default)]
    response: HolidaysBody,
}

#[derive(Debug, Default, Deserialize)]
struct HolidaysBody {
    #[serde(default)]
    holidays: Vec<ApiHoliday>,
}

#[derive(Debug, Deserialize)]
struct ApiHoliday {
    name: String,
    date: ApiDate,
}

#[derive(Debug, Deserialize)]
struct ApiDate {
    iso: String,
}

fn records_from_envelope(envelope: HolidaysEnvelope) -> Vec<Holiday> {
    envelope
        .response
        .holidays
        .into_iter()
        .filter_map(|entry| {
            // iso may carry a time component; only the date part matters
            let date_part = entry.date.iso.get(..10)?;
            let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
            match Holiday::new(date, &entry.name) {
                Ok(holiday) => Some(holiday),
                Err(err) => {
                    tracing::warn!(name = %entry.name, %err, "skipping malformed holiday record");
                    None
                }
            }
        })
        .collect()
}

/// Parses the tool's `"YYYY-MM"` input convention.
fn parse_year_month(input: &str) -> Result<(i32, u32), AgentError> {
    let trimmed = input.trim();
    let (year, month) = trimmed.split_once('-').ok_or_else(|| {
        AgentError::ExecutionFailed(format!(
            "calendar tool input must be in 'YYYY-MM' format, got: {trimmed}"
        ))
    })?;

    let year = year.trim().parse::<i32>().map_err(|_| {
        AgentError::ExecutionFailed(format!("invalid year in calendar tool input: {trimmed}"))
    })?;
    let month = month.trim().parse::<u32>().map_err(|_| {
        AgentError::ExecutionFailed(format!("invalid month in calendar tool input: {trimmed}"))
    })?;

    if !(1..=12).contains(&month) {
        return Err(AgentError::ExecutionFailed(format!(
            "month out of range in calendar tool input: {trimmed}"
        )));
    }

    Ok((year, month))
}

/// Tool wrapper the model invokes with a `"YYYY-MM"` string; returns the
/// `{"Result": [...]}` JSON of the fetched records.
pub struct CalendarEventsTool {
    client: CalendarificClient,
}

impl CalendarEventsTool {
    pub fn new(client: CalendarificClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for CalendarEventsTool {
    fn name(&self) -> &str {
        CALENDAR_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Call this tool to fetch Taiwan's calendar events for a specific year and month in 'YYYY-MM' format."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "Target year and month in 'YYYY-MM' format, e.g. '2024-10'."
                }
            },
            "required": ["input"]
        })
    }

    async fn call(&self, input: &str) -> Result<String, AgentError> {
        let (year, month) = parse_year_month(input)?;
        let holidays = self.client.fetch(year, month).await?;
        tracing::info!(year, month, count = holidays.len(), "holiday lookup completed");

        serde_json::to_string(&jieri_core::ApiResponse::holidays(holidays))
            .map_err(|err| AgentError::Other(format!("failed to encode lookup result: {err}")))
    }
}
