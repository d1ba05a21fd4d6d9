//! Columns rendered as hyperlinks.

use super::{escape_html, OutputHandler, OutputResult, OutputValue, Reservation};
use crate::error::ConfigResult;
use crate::exec::Record;
use crate::source::Sources;

/// Label column linked to a URL built from a key column.
///
/// `url` is a template where `{}` is replaced by the key. The html value is
/// an escaped anchor; rows with a NULL key get no anchor.
#[derive(Debug, Clone)]
pub struct LinkOutput {
    title: Option<String>,
    url: String,
    label: Reservation,
    key: Reservation,
}

impl LinkOutput {
    pub fn new(alias: &str, source: &str, label_path: &str, key_path: &str, url: &str) -> Self {
        Self {
            title: None,
            url: url.into(),
            label: Reservation::new(source, label_path, alias),
            key: Reservation::new(source, key_path, &format!("{}__key", alias)),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl OutputHandler for LinkOutput {
    fn alias(&self) -> &str {
        &self.label.alias
    }

    fn title(&self) -> &str {
        match (&self.title, &self.label.field) {
            (Some(title), _) => title,
            (None, Some(field)) => &field.field.title,
            (None, None) => &self.label.alias,
        }
    }

    fn initialize(&mut self, sources: &mut Sources) -> ConfigResult<()> {
        self.label.reserve(sources)?;
        self.key.reserve(sources)?;
        Ok(())
    }

    fn format(&self, record: &Record) -> OutputResult<OutputValue> {
        let label = self.label.value(record)?;
        let key = self.key.value(record)?;
        let text = label.as_text();
        let value = OutputValue::new(label.clone(), text.clone());
        if key.is_null() {
            return Ok(value);
        }
        let href = self.url.replace("{}", &key.as_text());
        Ok(value.with_html(format!(
            "<a href=\"{}\">{}</a>",
            escape_html(&href),
            escape_html(&text)
        )))
    }
}
