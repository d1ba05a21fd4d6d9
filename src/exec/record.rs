//! Raw result rows.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::value::Value;

/// One raw result row: column alias to value, in SELECT order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, alias: impl Into<String>, value: Value) {
        self.columns.push((alias.into(), value));
    }

    pub fn with(mut self, alias: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(alias, value.into());
        self
    }

    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(key, _)| key == alias)
            .map(|(_, value)| value)
    }

    /// Value for `alias`, or NULL when the column is absent.
    pub fn value(&self, alias: &str) -> Value {
        self.get(alias).cloned().unwrap_or_default()
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }

    /// Keep only the columns named in `aliases`, in record order.
    pub fn project<'a>(&self, aliases: impl IntoIterator<Item = &'a str>) -> Record {
        let wanted: Vec<&str> = aliases.into_iter().collect();
        Record {
            columns: self
                .columns
                .iter()
                .filter(|(key, _)| wanted.contains(&key.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Record {
            columns: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (key, value) in &self.columns {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
