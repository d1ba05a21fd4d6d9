//! Date and timestamp columns.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::{OutputError, OutputHandler, OutputResult, OutputValue, Reservation};
use crate::error::ConfigResult;
use crate::exec::Record;
use crate::source::Sources;
use crate::value::Value;

const DEFAULT_FORMAT: &str = "%Y-%m-%d";

/// Reformats a stored date with a `chrono` format string.
///
/// Accepts ISO dates, `YYYY-MM-DD HH:MM:SS` timestamps, RFC 3339 and unix
/// seconds. NULL formats as the empty string; anything else is an error.
#[derive(Debug, Clone)]
pub struct DateOutput {
    title: Option<String>,
    format: String,
    reservation: Reservation,
}

impl DateOutput {
    pub fn new(alias: &str, source: &str, path: &str) -> Self {
        Self {
            title: None,
            format: DEFAULT_FORMAT.into(),
            reservation: Reservation::new(source, path, alias),
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.into());
        self
    }
}

fn parse(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Int(seconds) => DateTime::from_timestamp(*seconds, 0).map(|dt| dt.naive_utc()),
        Value::Text(text) => {
            let text = text.trim();
            NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
                .ok()
                .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
        }
        _ => None,
    }
}

impl OutputHandler for DateOutput {
    fn alias(&self) -> &str {
        &self.reservation.alias
    }

    fn title(&self) -> &str {
        match (&self.title, &self.reservation.field) {
            (Some(title), _) => title,
            (None, Some(field)) => &field.field.title,
            (None, None) => &self.reservation.alias,
        }
    }

    fn initialize(&mut self, sources: &mut Sources) -> ConfigResult<()> {
        self.reservation.reserve(sources)?;
        Ok(())
    }

    fn format(&self, record: &Record) -> OutputResult<OutputValue> {
        let raw = self.reservation.value(record)?;
        if raw.is_null() {
            return Ok(OutputValue::new(Value::Null, String::new()));
        }
        let parsed = parse(raw).ok_or_else(|| OutputError::InvalidDate {
            alias: self.reservation.alias.clone(),
            value: raw.as_text(),
        })?;
        Ok(OutputValue::new(
            raw.clone(),
            parsed.format(&self.format).to_string(),
        ))
    }
}
