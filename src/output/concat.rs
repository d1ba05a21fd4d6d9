//! Several columns joined into one display value.

use super::{OutputHandler, OutputResult, OutputValue, Reservation};
use crate::error::ConfigResult;
use crate::exec::Record;
use crate::source::Sources;
use crate::value::Value;

/// Joins the non-empty text of several columns with a separator.
///
/// Each column is reserved as `{alias}__{i}`. The raw value is the joined
/// text, or NULL when every part is NULL.
#[derive(Debug, Clone)]
pub struct ConcatOutput {
    alias: String,
    title: String,
    separator: String,
    parts: Vec<Reservation>,
}

impl ConcatOutput {
    pub fn new(alias: &str, source: &str, paths: &[&str]) -> Self {
        let parts = paths
            .iter()
            .enumerate()
            .map(|(i, path)| Reservation::new(source, path, &format!("{}__{}", alias, i)))
            .collect();
        Self {
            alias: alias.into(),
            title: inflector::cases::titlecase::to_title_case(alias),
            separator: " ".into(),
            parts,
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.into();
        self
    }
}

impl OutputHandler for ConcatOutput {
    fn alias(&self) -> &str {
        &self.alias
    }

    fn title(&self) -> &str {
        &self.title
    }

    fn initialize(&mut self, sources: &mut Sources) -> ConfigResult<()> {
        for part in &mut self.parts {
            part.reserve(sources)?;
        }
        Ok(())
    }

    fn format(&self, record: &Record) -> OutputResult<OutputValue> {
        let mut texts = Vec::with_capacity(self.parts.len());
        for part in &self.parts {
            let text = part.value(record)?.as_text();
            if !text.is_empty() {
                texts.push(text);
            }
        }
        let joined = texts.join(&self.separator);
        let raw = if texts.is_empty() {
            Value::Null
        } else {
            Value::Text(joined.clone())
        };
        Ok(OutputValue::new(raw, joined))
    }
}
