//! Ordered field collection addressable by name and by alias.

use super::FieldSpecification;

/// Errors raised while building a [`DataSpecification`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    /// A field with this name or alias is already registered. Callers that
    /// "ensure" a field treat this as success.
    #[error("field already exists: {0}")]
    AlreadyExists(String),
}

pub type FieldResult<T> = Result<T, FieldError>;

/// Ordered collection of fields keyed by a name unique within the
/// collection. Aliases are unique too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataSpecification {
    entries: Vec<(String, FieldSpecification)>,
}

impl DataSpecification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `field` under `name`.
    ///
    /// Fails with [`FieldError::AlreadyExists`] when the name or the alias
    /// collides; the collection is left untouched in that case.
    pub fn add(&mut self, name: &str, field: FieldSpecification) -> FieldResult<()> {
        if self.contains_name(name) {
            return Err(FieldError::AlreadyExists(name.to_string()));
        }
        if self.contains_alias(&field.alias) {
            return Err(FieldError::AlreadyExists(field.alias.clone()));
        }
        self.entries.push((name.to_string(), field));
        Ok(())
    }

    /// Register a field under its own alias.
    pub fn push(&mut self, field: FieldSpecification) -> FieldResult<()> {
        let name = field.alias.clone();
        self.add(&name, field)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&FieldSpecification> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, field)| field)
    }

    pub fn get_by_alias(&self, alias: &str) -> Option<&FieldSpecification> {
        self.entries
            .iter()
            .find(|(_, field)| field.alias == alias)
            .map(|(_, field)| field)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.get_by_name(name).is_some()
    }

    pub fn contains_alias(&self, alias: &str) -> bool {
        self.get_by_alias(alias).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldSpecification> {
        let idx = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(idx).1)
    }

    /// Clone every field of `other` into this collection, prefixing both
    /// the key and the alias with `prefix`.
    ///
    /// All-or-nothing: on a collision nothing is added.
    pub fn merge(&mut self, other: &DataSpecification, prefix: &str) -> FieldResult<()> {
        let incoming: Vec<(String, FieldSpecification)> = other
            .entries
            .iter()
            .map(|(key, field)| {
                let alias = format!("{}{}", prefix, field.alias);
                (format!("{}{}", prefix, key), field.clone_as(&alias))
            })
            .collect();

        for (idx, (key, field)) in incoming.iter().enumerate() {
            let clashes_earlier = incoming[..idx]
                .iter()
                .any(|(k, f)| k == key || f.alias == field.alias);
            if self.contains_name(key) || self.contains_alias(&field.alias) || clashes_earlier {
                return Err(FieldError::AlreadyExists(key.clone()));
            }
        }

        self.entries.extend(incoming);
        Ok(())
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpecification> {
        self.entries.iter().map(|(_, field)| field)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, field)| field.alias.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
