//! Reference Graph
//!
//! A petgraph view of which schemas mention which: an edge `A -> B` for every
//! `Reference { target: B }` anywhere inside schema `A`. Used to report
//! reference cycles and dangling targets before any resolution is attempted.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::proto::{SchemaId, SchemaRegistry};
use crate::schema::SchemaNode;

/// Directed graph of schema references
#[derive(Debug)]
pub struct ReferenceGraph {
    graph: DiGraph<SchemaId, ()>,
    node_indices: HashMap<SchemaId, NodeIndex>,
    /// `(from, target)` pairs whose target is not in the registry
    dangling: BTreeSet<(SchemaId, SchemaId)>,
}

impl ReferenceGraph {
    pub fn build(registry: &SchemaRegistry) -> Self {
        let mut graph = DiGraph::with_capacity(registry.len(), registry.len() * 2);
        let mut node_indices = HashMap::with_capacity(registry.len());

        for id in registry.ids() {
            node_indices.insert(id.clone(), graph.add_node(id.clone()));
        }

        let mut dangling = BTreeSet::new();
        for (id, node) in registry.iter() {
            let from = node_indices[id];
            let mut targets = BTreeSet::new();
            collect_references(node, &mut targets);

            for target in targets {
                match node_indices.get(target) {
                    Some(&to) => {
                        graph.add_edge(from, to, ());
                    }
                    None => {
                        dangling.insert((id.clone(), target.to_string()));
                    }
                }
            }
        }

        Self {
            graph,
            node_indices,
            dangling,
        }
    }

    pub fn schema_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Ids directly referenced by `id`
    pub fn refs_out(&self, id: &str) -> Vec<&SchemaId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Ids that directly reference `id`
    pub fn refs_in(&self, id: &str) -> Vec<&SchemaId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &str, direction: Direction) -> Vec<&SchemaId> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };

        let mut ids: Vec<&SchemaId> = self
            .graph
            .edges_directed(idx, direction)
            .filter_map(|e| match direction {
                Direction::Outgoing => self.graph.node_weight(e.target()),
                Direction::Incoming => self.graph.node_weight(e.source()),
            })
            .collect();
        ids.sort();
        ids
    }

    /// Groups of schemas that reference each other
    ///
    /// Strongly connected components of more than one schema, plus schemas
    /// that reference themselves. Each group is sorted; groups are ordered by
    /// their first id.
    pub fn cycles(&self) -> Vec<Vec<SchemaId>> {
        let mut groups: Vec<Vec<SchemaId>> = kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut ids: Vec<SchemaId> = scc
                    .into_iter()
                    .filter_map(|idx| self.graph.node_weight(idx).cloned())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        groups.sort();
        groups
    }

    /// Every schema reachable from `id`, excluding `id` itself unless it is
    /// part of a cycle
    pub fn dependencies(&self, id: &str) -> BTreeSet<SchemaId> {
        let Some(&start) = self.node_indices.get(id) else {
            return BTreeSet::new();
        };

        let mut result = BTreeSet::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeIndex> = self.graph.neighbors(start).collect();

        while let Some(idx) = stack.pop() {
            if !visited.insert(idx) {
                continue;
            }
            if let Some(node_id) = self.graph.node_weight(idx) {
                result.insert(node_id.clone());
            }
            stack.extend(self.graph.neighbors(idx));
        }

        result
    }

    /// `(from, target)` pairs whose target is missing from the registry
    pub fn dangling(&self) -> impl Iterator<Item = (&str, &str)> {
        self.dangling.iter().map(|(from, to)| (from.as_str(), to.as_str()))
    }
}

/// Reference targets anywhere inside `node`
fn collect_references<'n>(node: &'n SchemaNode, out: &mut BTreeSet<&'n str>) {
    match node {
        SchemaNode::Reference { target } => {
            out.insert(target.as_str());
        }
        SchemaNode::Array { element_type } => collect_references(element_type, out),
        SchemaNode::Tuple { element_types, .. } => {
            for ty in element_types {
                collect_references(ty, out);
            }
        }
        SchemaNode::Interface(body) => {
            for member in &body.extends {
                collect_references(&member.ty, out);
            }
            for prop in &body.properties {
                collect_references(&prop.ty, out);
            }
            if let Some(signature) = &body.index_signature {
                collect_references(&signature.ty, out);
            }
        }
        SchemaNode::IndexedAccess { object_type, .. } => collect_references(object_type, out),
        SchemaNode::Union { members } | SchemaNode::Intersection { members } => {
            for member in members {
                collect_references(&member.ty, out);
            }
        }
        SchemaNode::Keyof { target }
        | SchemaNode::Pick { target, .. }
        | SchemaNode::Partial { target }
        | SchemaNode::Omit { target, .. }
        | SchemaNode::NonNullable { target } => collect_references(target, out),
        SchemaNode::Overwrite { target, overwrite } => {
            collect_references(target, out);
            collect_references(overwrite, out);
        }
        SchemaNode::Boolean
        | SchemaNode::Number { .. }
        | SchemaNode::String
        | SchemaNode::Enum { .. }
        | SchemaNode::Any
        | SchemaNode::Literal { .. }
        | SchemaNode::Object
        | SchemaNode::Buffer { .. }
        | SchemaNode::Date
        | SchemaNode::Custom { .. } => {}
    }
}
