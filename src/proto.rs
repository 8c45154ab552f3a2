//! Protocol documents and the schema registry
//!
//! A protocol file is a JSON document of the form
//!
//! ```text
//! {
//!   "version": 3,
//!   "services": [ { "id": 0, "name": "user/Login", "type": "api", "req": "...", "res": "..." } ],
//!   "types": { "user/PtlLogin/ReqLogin": { "type": "Interface", ... } }
//! }
//! ```
//!
//! Schema ids have the form `{relativePath}/{namespace}/{typeName}`; nested
//! namespaces are flattened by `/`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, SchemaError};
use crate::schema::{NodeRef, SchemaNode};

/// Canonical schema identifier
pub type SchemaId = String;

/// Split a schema id into `(path, type_name)`
///
/// `"a/b/PtlFoo/ReqFoo"` becomes `("a/b/PtlFoo", "ReqFoo")`. An id without a
/// separator has an empty path.
pub fn split_schema_id(id: &str) -> (&str, &str) {
    match id.rsplit_once('/') {
        Some((path, name)) => (path, name),
        None => ("", id),
    }
}

/// Immutable mapping from schema id to schema node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaRegistry {
    types: BTreeMap<SchemaId, NodeRef>,
}

/// Search result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: SchemaId,
    pub score: i64,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a schema, returning the previous node under that id
    pub fn insert(&mut self, id: impl Into<SchemaId>, node: impl Into<NodeRef>) -> Option<NodeRef> {
        self.types.insert(id.into(), node.into())
    }

    pub fn get(&self, id: &str) -> Option<&NodeRef> {
        self.types.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All schema ids, sorted
    pub fn ids(&self) -> impl Iterator<Item = &SchemaId> {
        self.types.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SchemaId, &NodeRef)> {
        self.types.iter()
    }

    /// Merge another registry into this one
    ///
    /// The same id may appear in both only if the nodes are structurally equal.
    pub fn merge(&mut self, other: SchemaRegistry) -> Result<()> {
        for (id, node) in other.types {
            match self.types.get(&id) {
                Some(existing) if existing != &node => {
                    return Err(SchemaError::DuplicateSchema { id });
                }
                Some(_) => {}
                None => {
                    self.types.insert(id, node);
                }
            }
        }
        Ok(())
    }

    /// Resolve a query (full id or bare type name) to a canonical id
    pub fn resolve_id(&self, query: &str) -> Option<&SchemaId> {
        if let Some((id, _)) = self.types.get_key_value(query) {
            return Some(id);
        }

        // Try as type name (first match in id order)
        if let Some(id) = self.ids().find(|id| split_schema_id(id).1 == query) {
            return Some(id);
        }

        let query_lower = query.to_lowercase();
        self.ids()
            .find(|id| split_schema_id(id).1.to_lowercase() == query_lower)
    }

    /// Search schema ids (fuzzy)
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        let matcher = SkimMatcherV2::default();
        let mut results: Vec<SearchResult> = self
            .ids()
            .filter_map(|id| {
                matcher
                    .fuzzy_match(id, query)
                    .map(|score| SearchResult { id: id.clone(), score })
            })
            .collect();

        // Sort by score descending, then id for stable output
        results.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
        results.truncate(limit);
        results
    }
}

impl FromIterator<(SchemaId, SchemaNode)> for SchemaRegistry {
    fn from_iter<I: IntoIterator<Item = (SchemaId, SchemaNode)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().map(|(id, node)| (id, Arc::new(node))).collect(),
        }
    }
}

/// Service definition in a protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServiceDef {
    /// Request/response API
    Api {
        id: u32,
        name: String,
        req: SchemaId,
        res: SchemaId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conf: Option<serde_json::Value>,
    },
    /// One-way message
    Msg {
        id: u32,
        name: String,
        msg: SchemaId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conf: Option<serde_json::Value>,
    },
}

impl ServiceDef {
    pub fn name(&self) -> &str {
        match self {
            ServiceDef::Api { name, .. } | ServiceDef::Msg { name, .. } => name,
        }
    }

    /// Schema ids this service depends on
    pub fn schema_ids(&self) -> Vec<&str> {
        match self {
            ServiceDef::Api { req, res, .. } => vec![req.as_str(), res.as_str()],
            ServiceDef::Msg { msg, .. } => vec![msg.as_str()],
        }
    }
}

/// A complete protocol document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub services: Vec<ServiceDef>,
    #[serde(default)]
    pub types: SchemaRegistry,
}

impl ServiceProto {
    /// Parse a protocol document from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// `(service name, schema id)` pairs whose schema is absent from `types`
    pub fn missing_schemas(&self) -> Vec<(&str, &str)> {
        self.services
            .iter()
            .flat_map(|s| s.schema_ids().into_iter().map(move |id| (s.name(), id)))
            .filter(|(_, id)| !self.types.contains(id))
            .collect()
    }
}
