//! Plain and enumerated columns.

use super::{
    AggregatableOutput, OutputHandler, OutputResult, OutputValue, Reservation,
};
use crate::error::{ConfigResult, ReportResult};
use crate::exec::Record;
use crate::field::FieldType;
use crate::source::Sources;
use crate::value::Value;

/// Text form of a raw value for a field type.
pub(crate) fn format_value(value: &Value, field_type: FieldType) -> String {
    match (field_type, value) {
        (_, Value::Null) => String::new(),
        (FieldType::Money, other) => match other.as_f64() {
            Some(amount) => format!("{:.2}", amount),
            None => other.as_text(),
        },
        (FieldType::Boolean, other) => match other.as_i64() {
            Some(0) => "No".into(),
            Some(_) => "Yes".into(),
            None => other.as_text(),
        },
        (_, other) => other.as_text(),
    }
}

/// One column, formatted by its type.
#[derive(Debug, Clone)]
pub struct FieldOutput {
    title: Option<String>,
    reservation: Reservation,
    aggregated: bool,
}

impl FieldOutput {
    pub fn new(alias: &str, source: &str, path: &str) -> Self {
        Self {
            title: None,
            reservation: Reservation::new(source, path, alias),
            aggregated: false,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl OutputHandler for FieldOutput {
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
        let field_type = self
            .reservation
            .field
            .as_ref()
            .map(|field| field.field.field_type)
            .unwrap_or_default();
        Ok(OutputValue::new(raw.clone(), format_value(raw, field_type)))
    }

    fn as_aggregatable(&mut self) -> Option<&mut dyn AggregatableOutput> {
        Some(self)
    }
}

impl AggregatableOutput for FieldOutput {
    fn enable_aggregation(&mut self, sources: &mut Sources) -> ReportResult<()> {
        self.reservation.set_aggregate(sources, true)?;
        self.aggregated = true;
        Ok(())
    }

    fn disable_aggregation(&mut self, sources: &mut Sources) -> ReportResult<()> {
        self.reservation.set_aggregate(sources, false)?;
        self.aggregated = false;
        Ok(())
    }

    fn is_aggregated(&self) -> bool {
        self.aggregated
    }
}

/// Enumerated column: the stored value is shown as its option label.
#[derive(Debug, Clone)]
pub struct OptionOutput {
    inner: FieldOutput,
}

impl OptionOutput {
    pub fn new(alias: &str, source: &str, path: &str) -> Self {
        Self {
            inner: FieldOutput::new(alias, source, path),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.inner = self.inner.with_title(title);
        self
    }
}

impl OutputHandler for OptionOutput {
    fn alias(&self) -> &str {
        self.inner.alias()
    }

    fn title(&self) -> &str {
        self.inner.title()
    }

    fn initialize(&mut self, sources: &mut Sources) -> ConfigResult<()> {
        self.inner.initialize(sources)
    }

    fn format(&self, record: &Record) -> OutputResult<OutputValue> {
        let value = self.inner.format(record)?;
        let label = self
            .inner
            .reservation
            .field
            .as_ref()
            .and_then(|field| field.field.option_label(&value.raw_value))
            .map(String::from);
        Ok(match label {
            Some(label) => OutputValue::new(value.raw_value, label),
            None => value,
        })
    }

    fn as_aggregatable(&mut self) -> Option<&mut dyn AggregatableOutput> {
        Some(&mut self.inner)
    }
}
