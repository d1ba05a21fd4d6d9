//! Join planning.
//!
//! Sources are nodes and declared joins are edges of an undirected graph.
//! A breadth-first walk from the anchor picks, for every other source, the
//! join that attaches it; that walk order is the order joins are rendered
//! in, so every join's parent is already in the FROM list.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::config::{JoinColumns, JoinConfig, SourceConfig};
use crate::error::{ConfigResult, ConfigurationError};
use crate::flow::JoinKind;

/// One join oriented away from the anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedJoin {
    pub parent: String,
    pub child: String,
    pub kind: JoinKind,
    /// `(parent column, child column)` pairs.
    pub columns: Vec<(String, String)>,
}

impl PlannedJoin {
    fn oriented(join: &JoinConfig, parent: &str) -> Self {
        let forward = join.from == parent;
        let columns = join
            .on
            .iter()
            .map(|JoinColumns { from, to }| {
                if forward {
                    (from.clone(), to.clone())
                } else {
                    (to.clone(), from.clone())
                }
            })
            .collect();
        let (parent, child) = if forward {
            (&join.from, &join.to)
        } else {
            (&join.to, &join.from)
        };
        Self {
            parent: parent.clone(),
            child: child.clone(),
            kind: join.kind,
            columns,
        }
    }
}

/// Joins in breadth-first order from the first source.
///
/// Every source must be reachable from the anchor, and each source is
/// attached by exactly one join: a join between two already attached
/// sources is rejected.
pub fn plan_joins(sources: &[SourceConfig], joins: &[JoinConfig]) -> ConfigResult<Vec<PlannedJoin>> {
    let anchor = sources.first().ok_or(ConfigurationError::NoSources)?;

    let mut graph: UnGraph<&str, usize> = UnGraph::new_undirected();
    let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
    for source in sources {
        nodes.insert(&source.name, graph.add_node(&source.name));
    }
    for (idx, join) in joins.iter().enumerate() {
        let node = |name: &str| {
            nodes
                .get(name)
                .copied()
                .ok_or_else(|| ConfigurationError::UnknownSource(name.to_string()))
        };
        let invalid = |reason: &str| ConfigurationError::InvalidJoin {
            from: join.from.clone(),
            to: join.to.clone(),
            reason: reason.into(),
        };
        let (from, to) = (node(&join.from)?, node(&join.to)?);
        if from == to {
            return Err(invalid("a source cannot join itself"));
        }
        graph.add_edge(from, to, idx);
    }

    let start = nodes[anchor.name.as_str()];
    let mut visited: HashSet<NodeIndex> = HashSet::from([start]);
    let mut used: HashSet<EdgeIndex> = HashSet::new();
    let mut queue = VecDeque::from([start]);
    let mut planned = Vec::with_capacity(joins.len());

    while let Some(current) = queue.pop_front() {
        let mut edges: Vec<_> = graph.edges(current).collect();
        edges.sort_by_key(|edge| *edge.weight());
        for edge in edges {
            if used.contains(&edge.id()) {
                continue;
            }
            let neighbor = if edge.source() == current {
                edge.target()
            } else {
                edge.source()
            };
            let join = &joins[*edge.weight()];
            if visited.contains(&neighbor) {
                return Err(ConfigurationError::InvalidJoin {
                    from: join.from.clone(),
                    to: join.to.clone(),
                    reason: "source is already joined".into(),
                });
            }
            used.insert(edge.id());
            visited.insert(neighbor);
            queue.push_back(neighbor);
            planned.push(PlannedJoin::oriented(join, graph[current]));
        }
    }

    if let Some(orphan) = sources
        .iter()
        .find(|source| !visited.contains(&nodes[source.name.as_str()]))
    {
        return Err(ConfigurationError::DisconnectedSource(orphan.name.clone()));
    }
    Ok(planned)
}
