//! N-ary join of child flows.

use super::{
    always_true, Composition, Flow, FlowError, FlowResult, FlowState, JoinDescription, JoinKind,
    JoinStrategy,
};
use crate::exec::Record;
use crate::field::{DataSpecification, FieldSpecification};
use crate::sql::{Join, JoinType};

/// An anchor flow plus children joined onto it.
///
/// Renders as one statement: nested combined children contribute their
/// joins to the same FROM list, and every child's projection is
/// concatenated into the SELECT list. A child attached with a LEFT join
/// has its own INNER joins flattened as LEFT, so an unmatched parent row
/// survives the nested joins.
#[derive(Debug, Clone, Default)]
pub struct CombinedFlow {
    children: Vec<JoinDescription>,
    pub(crate) state: FlowState,
}

impl CombinedFlow {
    pub fn new(anchor: impl Into<Flow>) -> Self {
        Self {
            children: vec![JoinDescription::anchor(anchor.into())],
            state: FlowState::default(),
        }
    }

    /// Attach `flow` with `strategy`. An empty combined flow takes it as the
    /// anchor and drops the strategy.
    pub fn join(&mut self, flow: impl Into<Flow>, strategy: JoinStrategy) {
        if self.children.is_empty() {
            self.children.push(JoinDescription::anchor(flow.into()));
        } else {
            self.children.push(JoinDescription::joined(flow.into(), strategy));
        }
    }

    pub fn with_join(mut self, flow: impl Into<Flow>, strategy: JoinStrategy) -> Self {
        self.join(flow, strategy);
        self
    }

    pub fn children(&self) -> &[JoinDescription] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut [JoinDescription] {
        &mut self.children
    }

    pub fn child(&self, idx: usize) -> Option<&Flow> {
        self.children.get(idx).map(|child| &child.flow)
    }

    pub fn child_mut(&mut self, idx: usize) -> Option<&mut Flow> {
        self.children.get_mut(idx).map(|child| &mut child.flow)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Every child's projection merged in join order, keyed by alias. A
    /// child whose aliases collide with an earlier child is left out.
    pub fn data_specification(&self) -> DataSpecification {
        let mut spec = DataSpecification::new();
        for child in &self.children {
            if let Err(err) = spec.merge(&child.flow.data_specification(), "") {
                tracing::warn!(%err, "duplicate alias in composed projection");
            }
        }
        spec
    }

    pub(crate) fn fields(&self) -> Vec<FieldSpecification> {
        self.data_specification().fields().cloned().collect()
    }

    /// Split a composed row into one record per child, by field alias.
    pub fn split_record(&self, record: &Record) -> Vec<Record> {
        self.children
            .iter()
            .map(|child| {
                let fields = child.flow.fields();
                record.project(fields.iter().map(|field| field.alias.as_str()))
            })
            .collect()
    }

    pub(crate) fn compose(&self) -> FlowResult<Composition> {
        let (anchor, rest) = self.children.split_first().ok_or(FlowError::Empty)?;
        let mut composition = anchor.flow.compose()?;

        for (idx, child) in rest.iter().enumerate() {
            let strategy = child
                .strategy
                .as_ref()
                .ok_or(FlowError::MissingJoinStrategy(idx + 1))?;
            let inner = child.flow.compose()?;
            let on = strategy
                .on_condition(inner.on_extra)
                .unwrap_or_else(always_true);

            composition.joins.push(Join {
                join_type: strategy.kind().into(),
                table: inner.from,
                on: Some(on),
            });
            let outer = strategy.kind();
            composition.joins.extend(inner.joins.into_iter().map(|mut join| {
                if outer == JoinKind::Left && join.join_type == JoinType::Inner {
                    join.join_type = JoinType::Left;
                }
                join
            }));
            composition.filters.extend(inner.filters);
            composition.select.extend(inner.select);
            composition.group_by.extend(inner.group_by);
        }

        Ok(composition)
    }
}
