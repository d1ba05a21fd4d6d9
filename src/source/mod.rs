//! Source façade.
//!
//! A [`Source`] is one logical entity: its main table plus satellite tables
//! (details, custom field groups) that are joined only once something
//! references one of their fields. Filters, output handlers and aggregate
//! toggles go through [`Source::ensure_field`], which attaches the owning
//! table on first use.
//!
//! The composed flow is cached. Any mutable access to a child drops the
//! cache; [`Source::flow`] builds a complete new flow and only then stores
//! it.
//!
//! Field paths are `column` for entity columns and `satellite.column` for
//! satellite columns. Default output aliases are `<source>_<column>` and
//! `<source>_<satellite>_<column>`.

mod aggregate;
mod error;

pub use aggregate::{AggregateFunction, Aggregation};
pub use error::{FieldResolutionError, FieldResolutionResult};

use tracing::debug;

use crate::field::{FieldError, FieldSpecification};
use crate::flow::{ColumnRef, CombinedFlow, Flow, JoinStrategy, SubqueryFlow, TableFlow};
use crate::predicate::{PredicateId, WhereClause};
use crate::schema::{
    ColumnSpec, EntityCatalog, SatelliteKind, SatelliteTable, SchemaProvider, SchemaResult,
};

/// The table of a source that owns a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Entity,
    Satellite(String),
}

/// A field after resolution: where it lives and how the composed flow
/// exposes it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    pub target: Target,
    pub alias: String,
    pub field: FieldSpecification,
}

#[derive(Debug, Clone)]
struct Satellite {
    spec: SatelliteTable,
    alias: String,
    /// A table flow, or for `multiple` satellites a subquery reducing the
    /// satellite to one row per entity.
    flow: Flow,
}

impl Satellite {
    fn new(source: &str, spec: &SatelliteTable) -> FieldResolutionResult<Self> {
        let alias = format!("{}_{}", source, spec.name);
        let table = TableFlow::new(&spec.table, &alias);
        let flow = if spec.multiple {
            let key_alias = format!("{}_{}", alias, spec.join_column);
            let mut inner = table;
            inner
                .add_field(
                    &key_alias,
                    FieldSpecification::new(&spec.join_column, Default::default()).with_alias(&key_alias),
                )
                .map_err(|_| FieldResolutionError::AliasConflict(key_alias.clone()))?;
            let mut inner = Flow::from(inner);
            inner.add_aggregate(&key_alias)?;
            Flow::from(SubqueryFlow::new(inner, &alias))
        } else {
            Flow::from(table)
        };
        Ok(Self {
            spec: spec.clone(),
            alias,
            flow,
        })
    }

    /// Column of this satellite compared with the entity in the ON clause.
    fn join_column(&self) -> ColumnRef {
        if self.spec.multiple {
            ColumnRef::new(&self.alias, &format!("{}_{}", self.alias, self.spec.join_column))
        } else {
            ColumnRef::new(&self.alias, &self.spec.join_column)
        }
    }

    fn table_mut(&mut self) -> Option<&mut TableFlow> {
        match &mut self.flow {
            Flow::Subquery(subquery) => subquery.inner_mut().as_table_mut(),
            other => other.as_table_mut(),
        }
    }

    fn add_field(&mut self, column: &ColumnSpec, alias: &str) -> Result<(), FieldError> {
        let mut field = column.to_field(alias);
        if self.spec.multiple {
            let min = crate::field::SqlWrapper::function("MIN");
            field.wrapper = Some(match &field.wrapper {
                Some(inner) => inner.nest_in(&min),
                None => min,
            });
        }
        match self.table_mut() {
            Some(table) => table.add_field(alias, field),
            None => Ok(()),
        }
    }
}

/// One logical entity and its lazily joined satellites.
#[derive(Debug, Clone)]
pub struct Source {
    name: String,
    catalog: EntityCatalog,
    entity: Option<Flow>,
    satellites: Vec<Satellite>,
    aggregation: Option<Aggregation>,
    composed: Option<Flow>,
}

impl Source {
    pub fn new(name: &str, catalog: EntityCatalog) -> Self {
        Self {
            name: name.into(),
            catalog,
            entity: None,
            satellites: Vec::new(),
            aggregation: None,
            composed: None,
        }
    }

    /// Source named `name` over `entity` as `provider` describes it.
    pub fn from_provider(name: &str, entity: &str, provider: &dyn SchemaProvider) -> SchemaResult<Self> {
        Ok(Self::new(name, provider.entity(entity)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &EntityCatalog {
        &self.catalog
    }

    /// Table alias of the entity table.
    pub fn entity_alias(&self) -> &str {
        &self.name
    }

    pub fn default_alias(&self, path: &str) -> String {
        format!("{}_{}", self.name, path.replace('.', "_"))
    }

    fn new_entity_flow(&self) -> Flow {
        entity_flow(&self.name, &self.catalog)
    }

    /// Drop the cached composed flow.
    pub fn invalidate(&mut self) {
        if self.composed.take().is_some() {
            debug!(source = %self.name, "invalidated composed flow");
        }
    }

    pub fn is_cached(&self) -> bool {
        self.composed.is_some()
    }

    // =========================================================================
    // Lazy extension
    // =========================================================================

    /// The entity table flow, created on first use.
    pub fn ensure_entity(&mut self) -> &mut Flow {
        self.invalidate();
        let (name, catalog) = (&self.name, &self.catalog);
        self.entity.get_or_insert_with(|| entity_flow(name, catalog))
    }

    /// The flow of satellite `name`, joined on first use.
    pub fn ensure_satellite(&mut self, name: &str) -> FieldResolutionResult<&mut Flow> {
        self.invalidate();
        let idx = match self.satellites.iter().position(|s| s.spec.name == name) {
            Some(idx) => idx,
            None => {
                let spec = self.catalog.satellite(name).ok_or_else(|| {
                    FieldResolutionError::UnknownSatellite {
                        source_name: self.name.clone(),
                        satellite: name.into(),
                    }
                })?;
                debug!(source = %self.name, satellite = name, multiple = spec.multiple, "joining satellite");
                let satellite = Satellite::new(&self.name, spec)?;
                self.satellites.push(satellite);
                self.satellites.len() - 1
            }
        };
        Ok(&mut self.satellites[idx].flow)
    }

    fn ensure_satellite_of_kind(
        &mut self,
        name: &str,
        kind: SatelliteKind,
    ) -> FieldResolutionResult<&mut Flow> {
        match self.catalog.satellite(name) {
            Some(spec) if spec.kind != kind => Err(FieldResolutionError::WrongSatelliteKind {
                source_name: self.name.clone(),
                satellite: name.into(),
                expected: kind,
            }),
            _ => self.ensure_satellite(name),
        }
    }

    pub fn ensure_detail(&mut self, name: &str) -> FieldResolutionResult<&mut Flow> {
        self.ensure_satellite_of_kind(name, SatelliteKind::Detail)
    }

    pub fn ensure_custom_group(&mut self, name: &str) -> FieldResolutionResult<&mut Flow> {
        self.ensure_satellite_of_kind(name, SatelliteKind::CustomGroup)
    }

    /// Satellites joined so far, in join order.
    pub fn attached_satellites(&self) -> impl Iterator<Item = &str> {
        self.satellites.iter().map(|s| s.spec.name.as_str())
    }

    // =========================================================================
    // Fields
    // =========================================================================

    /// Where `path` lives and its column description.
    pub fn resolve(&self, path: &str) -> FieldResolutionResult<(Target, ColumnSpec)> {
        let unknown = || FieldResolutionError::UnknownField {
            source_name: self.name.clone(),
            field: path.into(),
        };

        if let Some(column) = self.catalog.column(path) {
            return Ok((Target::Entity, column.clone()));
        }

        let (satellite, column) = path.split_once('.').ok_or_else(unknown)?;
        let spec = self.catalog.satellite(satellite).ok_or_else(|| {
            FieldResolutionError::UnknownSatellite {
                source_name: self.name.clone(),
                satellite: satellite.into(),
            }
        })?;
        let column = spec.column(column).ok_or_else(unknown)?;
        Ok((Target::Satellite(satellite.into()), column.clone()))
    }

    /// Attach the table owning `path` and return the field bound to that
    /// table, without projecting it.
    ///
    /// Fields of `multiple` satellites are only reachable through the
    /// reducing subquery, so those are projected under their default alias.
    pub fn ensure_field(&mut self, path: &str) -> FieldResolutionResult<FieldRef> {
        let (target, column) = self.resolve(path)?;
        let alias = self.default_alias(path);

        if let Target::Satellite(name) = &target {
            if self.catalog.satellite(name).is_some_and(|s| s.multiple) {
                return self.ensure_field_in_source(path, &alias);
            }
        }

        self.child_flow_mut(&target)?;
        let mut field = column.to_field(&alias);
        field.table = Some(self.table_alias(&target));
        Ok(FieldRef {
            target,
            alias,
            field,
        })
    }

    /// Table alias of a child.
    pub fn table_alias(&self, target: &Target) -> String {
        match target {
            Target::Entity => self.name.clone(),
            Target::Satellite(name) => format!("{}_{}", self.name, name),
        }
    }

    /// Attach the table owning `path` and project the field under `alias`.
    ///
    /// Idempotent for the same column; an alias already taken by a
    /// different column is an [`FieldResolutionError::AliasConflict`].
    pub fn ensure_field_in_source(&mut self, path: &str, alias: &str) -> FieldResolutionResult<FieldRef> {
        let (target, column) = self.resolve(path)?;

        let added = match &target {
            Target::Entity => {
                let field = column.to_field(alias);
                match self.ensure_entity().as_table_mut() {
                    Some(table) => table.add_field(alias, field),
                    None => Ok(()),
                }
            }
            Target::Satellite(name) => {
                self.ensure_satellite(name)?;
                match self.satellites.iter_mut().find(|s| &s.spec.name == name) {
                    Some(satellite) => satellite.add_field(&column, alias),
                    None => Ok(()),
                }
            }
        };

        let field = self
            .child_flow(&target)
            .and_then(|flow| flow.fields().into_iter().find(|f| f.alias == alias))
            .ok_or_else(|| FieldResolutionError::UnknownField {
                source_name: self.name.clone(),
                field: path.into(),
            })?;

        if let Err(FieldError::AlreadyExists(_)) = added {
            let same_column = self
                .stored_field(&target, alias)
                .is_some_and(|stored| stored.name == column.name);
            if !same_column {
                return Err(FieldResolutionError::AliasConflict(alias.into()));
            }
        }

        Ok(FieldRef {
            target,
            alias: alias.into(),
            field,
        })
    }

    /// The field as stored on the owning table, before any derived-table
    /// renaming.
    fn stored_field(&self, target: &Target, alias: &str) -> Option<FieldSpecification> {
        let flow = self.child_flow(target)?;
        let table = match flow {
            Flow::Subquery(subquery) => subquery.inner().as_table()?,
            other => other.as_table()?,
        };
        table.fields().get_by_alias(alias).cloned()
    }

    /// Owner of a projected alias.
    pub fn find_field(&self, alias: &str) -> Option<FieldRef> {
        let children = self
            .entity
            .iter()
            .map(|flow| (Target::Entity, flow))
            .chain(
                self.satellites
                    .iter()
                    .map(|s| (Target::Satellite(s.spec.name.clone()), &s.flow)),
            );
        for (target, flow) in children {
            if let Some(field) = flow.fields().into_iter().find(|f| f.alias == alias) {
                return Some(FieldRef {
                    target,
                    alias: alias.into(),
                    field,
                });
            }
        }
        None
    }

    /// Projected aliases across every attached table.
    pub fn aliases(&self) -> Vec<String> {
        self.entity
            .iter()
            .chain(self.satellites.iter().map(|s| &s.flow))
            .flat_map(|flow| flow.fields())
            .map(|field| field.alias)
            .collect()
    }

    // =========================================================================
    // Child access
    // =========================================================================

    pub fn child_flow(&self, target: &Target) -> Option<&Flow> {
        match target {
            Target::Entity => self.entity.as_ref(),
            Target::Satellite(name) => self
                .satellites
                .iter()
                .find(|s| &s.spec.name == name)
                .map(|s| &s.flow),
        }
    }

    /// Mutable child, attaching it first.
    pub fn child_flow_mut(&mut self, target: &Target) -> FieldResolutionResult<&mut Flow> {
        match target {
            Target::Entity => Ok(self.ensure_entity()),
            Target::Satellite(name) => self.ensure_satellite(name),
        }
    }

    pub fn add_clause(
        &mut self,
        target: &Target,
        clause: impl Into<WhereClause>,
    ) -> FieldResolutionResult<PredicateId> {
        Ok(self.child_flow_mut(target)?.add_clause(clause)?)
    }

    /// Detach clause `id` from whichever child holds it.
    pub fn remove_clause(&mut self, id: PredicateId) -> FieldResolutionResult<bool> {
        self.invalidate();
        let mut removed = false;
        for flow in self.entity.iter_mut().chain(self.satellites.iter_mut().map(|s| &mut s.flow)) {
            removed |= flow.remove_clause(id)?;
        }
        Ok(removed)
    }

    pub fn has_clause(&self, id: PredicateId) -> bool {
        self.entity
            .iter()
            .chain(self.satellites.iter().map(|s| &s.flow))
            .any(|flow| flow.has_clause(id))
    }

    /// Make the field projected as `alias` a GROUP BY key of its table.
    pub fn add_aggregate(&mut self, alias: &str) -> FieldResolutionResult<()> {
        let owner = self.find_field(alias).ok_or_else(|| FieldResolutionError::UnknownField {
            source_name: self.name.clone(),
            field: alias.into(),
        })?;
        self.child_flow_mut(&owner.target)?.add_aggregate(alias)?;
        Ok(())
    }

    pub fn remove_aggregate(&mut self, alias: &str) -> FieldResolutionResult<bool> {
        let Some(owner) = self.find_field(alias) else {
            return Ok(false);
        };
        Ok(self.child_flow_mut(&owner.target)?.remove_aggregate(alias)?)
    }

    pub fn is_aggregate(&self, alias: &str) -> bool {
        self.find_field(alias)
            .and_then(|owner| self.child_flow(&owner.target))
            .is_some_and(|flow| flow.is_aggregate(alias))
    }

    // =========================================================================
    // Aggregation mode
    // =========================================================================

    pub fn set_aggregation(&mut self, aggregation: Aggregation) -> FieldResolutionResult<()> {
        aggregation.validate(&self.name, &self.catalog)?;
        self.invalidate();
        self.ensure_entity();
        self.aggregation = Some(aggregation);
        Ok(())
    }

    pub fn clear_aggregation(&mut self) {
        self.invalidate();
        self.aggregation = None;
    }

    pub fn aggregation(&self) -> Option<&Aggregation> {
        self.aggregation.as_ref()
    }

    /// Alias where joins onto this source land: the derived table when
    /// aggregated, the entity table otherwise.
    pub fn join_alias(&self) -> String {
        match &self.aggregation {
            Some(_) => Aggregation::derived_alias(&self.name),
            None => self.name.clone(),
        }
    }

    /// Column to compare when joining onto this source. Group keys of an
    /// aggregated source are read from the derived table.
    pub fn join_reference(&self, column: &str) -> ColumnRef {
        match &self.aggregation {
            Some(aggregation) if aggregation.is_key(column) => ColumnRef::new(
                &Aggregation::derived_alias(&self.name),
                &Aggregation::key_alias(&self.name, column),
            ),
            _ => ColumnRef::new(&self.name, column),
        }
    }

    /// Whether a join whose ON clause attaches this source may compare
    /// `column`. The first table of an aggregated source is the derived
    /// table, which only carries the group keys.
    pub fn joinable_on(&self, column: &str) -> bool {
        match &self.aggregation {
            Some(aggregation) => aggregation.is_key(column),
            None => self.catalog.column(column).is_some(),
        }
    }

    // =========================================================================
    // Composition
    // =========================================================================

    fn satellite_strategy(&self, satellite: &Satellite) -> JoinStrategy {
        JoinStrategy::left().on(
            ColumnRef::new(&self.name, &satellite.spec.entity_column),
            satellite.join_column(),
        )
    }

    /// Build the effective flow without touching the cache.
    pub fn compose(&self) -> FieldResolutionResult<Flow> {
        let entity = self
            .entity
            .clone()
            .unwrap_or_else(|| self.new_entity_flow());

        if self.satellites.is_empty() && self.aggregation.is_none() {
            return Ok(entity);
        }

        let mut combined = match &self.aggregation {
            Some(aggregation) => {
                let derived = aggregation.derived_flow(
                    &self.name,
                    &self.catalog,
                    &self.name,
                    entity.state().clauses(),
                )?;
                let join_back = aggregation.join_back(&self.name, &self.name);
                CombinedFlow::new(derived).with_join(entity, join_back)
            }
            None => CombinedFlow::new(entity),
        };

        for satellite in &self.satellites {
            combined.join(satellite.flow.clone(), self.satellite_strategy(satellite));
        }
        Ok(Flow::Combined(combined))
    }

    /// The effective flow, cached until the next mutable access.
    pub fn flow(&mut self) -> FieldResolutionResult<&Flow> {
        let flow = match self.composed.take() {
            Some(flow) => flow,
            None => {
                debug!(source = %self.name, "composing source flow");
                self.compose()?
            }
        };
        Ok(self.composed.insert(flow))
    }
}

fn entity_flow(name: &str, catalog: &EntityCatalog) -> Flow {
    let mut flow = TableFlow::new(&catalog.table, name);
    if let Some(schema) = &catalog.schema {
        flow = flow.with_schema(schema);
    }
    flow.into()
}

/// Named sources of one report.
#[derive(Debug, Clone, Default)]
pub struct Sources {
    items: Vec<Source>,
}

impl Sources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `source`, replacing one of the same name.
    pub fn insert(&mut self, source: Source) {
        match self.items.iter_mut().find(|s| s.name == source.name) {
            Some(existing) => *existing = source,
            None => self.items.push(source),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.items.iter().find(|s| s.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Source> {
        self.items.iter_mut().find(|s| s.name == name)
    }

    pub fn require(&self, name: &str) -> FieldResolutionResult<&Source> {
        self.get(name)
            .ok_or_else(|| FieldResolutionError::UnknownSource(name.into()))
    }

    pub fn require_mut(&mut self, name: &str) -> FieldResolutionResult<&mut Source> {
        self.get_mut(name)
            .ok_or_else(|| FieldResolutionError::UnknownSource(name.into()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Source> {
        self.items.iter_mut()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<Source> for Sources {
    fn from_iter<I: IntoIterator<Item = Source>>(iter: I) -> Self {
        let mut sources = Sources::new();
        for source in iter {
            sources.insert(source);
        }
        sources
    }
}
