//! Schema Resolution
//!
//! Turns any [`SchemaNode`] into its concrete, non-reference form and flattens
//! interface-like nodes (interfaces, and Pick/Partial/Omit/Overwrite applied
//! to them) into a single property list for validators and code generators.
//!
//! Resolution is a recursive descent over an immutable [`SchemaRegistry`].
//! The only state is a set of identity-keyed memo tables that grow
//! monotonically for the lifetime of one [`SchemaResolver`].
//!
//! ```text
//! Reference ──lookup──▶ registry node ──(reference-like?)──▶ recurse
//! IndexedAccess ──flatten objectType──▶ property | index signature
//! Keyof ──flatten target──▶ Union<Literal(name)...>
//! Pick<Omit<X>> ──unwind──▶ X ──apply inside-out──▶ FlatInterface
//! ```

mod cache;
mod mapped;
mod union;

pub use union::apply_union_properties;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Result, SchemaError};
use crate::proto::SchemaRegistry;
use crate::schema::{FlatInterface, InterfaceSchema, NodeRef, Property, SchemaNode};
use cache::{node_key, NodeCache};

/// Tunables for a resolver session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Maximum nesting of resolution calls before giving up
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Reject `Pick` keys that match neither a property nor an index signature
    #[serde(default)]
    pub strict_pick: bool,
}

fn default_max_depth() -> usize {
    128
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            strict_pick: false,
        }
    }
}

/// Number of memoized entries per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub flat_interfaces: usize,
    pub union_properties: usize,
    pub mapped_types: usize,
}

/// Resolves references and flattens interfaces against one registry
pub struct SchemaResolver<'a> {
    registry: &'a SchemaRegistry,
    config: ResolverConfig,
    flat_cache: NodeCache<FlatInterface>,
    union_cache: NodeCache<Vec<String>>,
    mapped_cache: NodeCache<NodeRef>,
    /// Nodes currently being flattened or expanded
    in_progress: Vec<NodeRef>,
    depth: usize,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self::with_config(registry, ResolverConfig::default())
    }

    pub fn with_config(registry: &'a SchemaRegistry, config: ResolverConfig) -> Self {
        Self {
            registry,
            config,
            flat_cache: NodeCache::default(),
            union_cache: NodeCache::default(),
            mapped_cache: NodeCache::default(),
            in_progress: Vec::new(),
            depth: 0,
        }
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            flat_interfaces: self.flat_cache.len(),
            union_properties: self.union_cache.len(),
            mapped_types: self.mapped_cache.len(),
        }
    }

    /// Drop memo entries for nodes that are no longer referenced anywhere
    pub fn purge_caches(&mut self) -> usize {
        let removed = self.flat_cache.purge() + self.union_cache.purge() + self.mapped_cache.purge();
        debug!(removed, "purged resolver caches");
        removed
    }

    /// Look up a schema by id and resolve it
    pub fn resolve_id(&mut self, id: &str) -> Result<NodeRef> {
        let node = self.lookup(id)?;
        self.resolve_reference(&node)
    }

    /// Look up a schema by id and flatten it
    pub fn flatten_id(&mut self, id: &str) -> Result<FlatInterface> {
        let node = self.lookup(id)?;
        self.get_flat_interface_schema(&node)
    }

    fn lookup(&self, id: &str) -> Result<NodeRef> {
        self.registry
            .get(id)
            .cloned()
            .ok_or_else(|| SchemaError::UnresolvedReference {
                target: id.to_string(),
            })
    }

    // =========================================================================
    // Reference resolution
    // =========================================================================

    /// Resolve a reference-like node to the node it stands for
    ///
    /// Nodes that are not Reference, IndexedAccess or Keyof are returned as-is.
    pub fn resolve_reference(&mut self, node: &NodeRef) -> Result<NodeRef> {
        match &**node {
            SchemaNode::Reference { .. } => self.guarded(|this| this.resolve_reference_chain(node)),
            SchemaNode::IndexedAccess { object_type, index } => {
                self.guarded(|this| this.resolve_indexed_access(object_type, index))
            }
            SchemaNode::Keyof { target } => self.guarded(|this| this.resolve_keyof(target)),
            _ => Ok(node.clone()),
        }
    }

    fn resolve_reference_chain(&mut self, node: &NodeRef) -> Result<NodeRef> {
        let mut chain: Vec<String> = Vec::new();
        let mut current = node.clone();

        while let SchemaNode::Reference { target } = &*current {
            let seen = chain.contains(target);
            chain.push(target.clone());
            if seen {
                return Err(SchemaError::CircularReference { chain });
            }
            let next = self
                .registry
                .get(target)
                .cloned()
                .ok_or_else(|| SchemaError::UnresolvedReference {
                    target: target.clone(),
                })?;
            current = next;
        }

        trace!(chain = %chain.join(" -> "), kind = %current.kind(), "resolved reference");

        if current.is_reference_like() {
            self.resolve_reference(&current)
        } else {
            Ok(current)
        }
    }

    fn resolve_indexed_access(&mut self, object_type: &NodeRef, index: &str) -> Result<NodeRef> {
        let object = self.resolve_reference(object_type)?;
        if !matches!(&*object, SchemaNode::Interface(_)) && !object.is_mapped() {
            return Err(SchemaError::InvalidObjectType {
                kind: object.kind().to_string(),
            });
        }

        let flat = self.get_flat_interface_schema(&object)?;
        let ty = match flat.property(index) {
            Some(prop) if prop.optional && !has_undefined_member(&prop.ty) => Arc::new(SchemaNode::union([
                prop.ty.clone(),
                Arc::new(SchemaNode::undefined()),
            ])),
            Some(prop) => prop.ty.clone(),
            None => match &flat.index_signature {
                Some(signature) => signature.ty.clone(),
                None => {
                    return Err(SchemaError::InvalidIndex {
                        index: index.to_string(),
                        object: describe(object_type),
                    })
                }
            },
        };

        if ty.is_reference_like() {
            self.resolve_reference(&ty)
        } else {
            Ok(ty)
        }
    }

    fn resolve_keyof(&mut self, target: &NodeRef) -> Result<NodeRef> {
        let flat = self.get_flat_interface_schema(target)?;
        let names = flat
            .properties
            .iter()
            .map(|p| Arc::new(SchemaNode::string_literal(p.name.as_str())));
        Ok(Arc::new(SchemaNode::union(names)))
    }

    // =========================================================================
    // Interface flattening
    // =========================================================================

    /// Flatten an interface-like node into a single property list
    ///
    /// Self-declared properties win over inherited ones; among `extends`
    /// entries, earlier entries win over later ones. The returned value is an
    /// independent copy of the memoized result.
    pub fn get_flat_interface_schema(&mut self, node: &NodeRef) -> Result<FlatInterface> {
        if let Some(flat) = self.flat_cache.get(node) {
            trace!(node = %describe(node), "flat interface cache hit");
            return Ok(flat.clone());
        }

        let flat = self.guarded(|this| this.tracked(node, |this| this.flatten_uncached(node)))?;
        self.flat_cache.insert(node, flat.clone());
        Ok(flat)
    }

    fn flatten_uncached(&mut self, node: &NodeRef) -> Result<FlatInterface> {
        match &**node {
            SchemaNode::Interface(body) => self.flatten_interface(body),
            n if n.is_reference_like() => {
                let resolved = self.resolve_reference(node)?;
                if matches!(&*resolved, SchemaNode::Interface(_)) || resolved.is_mapped() {
                    self.get_flat_interface_schema(&resolved)
                } else {
                    Err(SchemaError::NotAnInterface {
                        kind: resolved.kind().to_string(),
                    })
                }
            }
            n if n.is_mapped() => self.flatten_mapped_type(node),
            other => Err(SchemaError::NotAnInterface {
                kind: other.kind().to_string(),
            }),
        }
    }

    fn flatten_interface(&mut self, body: &InterfaceSchema) -> Result<FlatInterface> {
        let mut properties: Vec<Property> = Vec::with_capacity(body.properties.len());
        for prop in &body.properties {
            match properties.iter_mut().find(|p| p.name == prop.name) {
                Some(existing) => *existing = prop.clone(),
                None => properties.push(prop.clone()),
            }
        }
        let mut index_signature = body.index_signature.clone();

        for extend in &body.extends {
            let parent = self.resolve_reference(&extend.ty)?;
            if !matches!(&*parent, SchemaNode::Interface(_)) && !parent.is_mapped() {
                return Err(SchemaError::InvalidExtends {
                    kind: parent.kind().to_string(),
                });
            }

            let flat_parent = self.get_flat_interface_schema(&parent)?;
            for prop in flat_parent.properties {
                if !properties.iter().any(|p| p.name == prop.name) {
                    properties.push(prop);
                }
            }
            if index_signature.is_none() {
                index_signature = flat_parent.index_signature;
            }
        }

        renumber(&mut properties);
        Ok(FlatInterface {
            properties,
            index_signature,
        })
    }

    /// Resolve `node` and run whichever expansion applies to its shape
    ///
    /// Interfaces and mapped types over interfaces are flattened; unions,
    /// intersections and mapped types over them have their property names
    /// collected. Other nodes only need to resolve.
    pub fn check_schema(&mut self, node: &NodeRef) -> Result<()> {
        let resolved = self.resolve_reference(node)?;
        match &*resolved {
            SchemaNode::Interface(_) => self.get_flat_interface_schema(&resolved).map(|_| ()),
            SchemaNode::Union { .. } | SchemaNode::Intersection { .. } => {
                self.get_union_properties(&resolved).map(|_| ())
            }
            n if n.is_mapped() => self.get_property_names(&resolved).map(|_| ()),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Recursion bookkeeping
    // =========================================================================

    /// Run `f` one level deeper, failing once `max_depth` is reached
    fn guarded<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= self.config.max_depth {
            return Err(SchemaError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run `f` with `node` marked in progress; re-entering it is a cycle
    fn tracked<T>(&mut self, node: &NodeRef, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let key = node_key(node);
        if let Some(pos) = self.in_progress.iter().position(|n| node_key(n) == key) {
            let mut chain: Vec<String> = self.in_progress[pos..].iter().map(|n| self.label(n)).collect();
            chain.push(self.label(node));
            return Err(SchemaError::CircularReference { chain });
        }

        self.in_progress.push(node.clone());
        let result = f(self);
        self.in_progress.pop();
        result
    }

    /// Registry id of `node` if it is a top-level schema, else [`describe`]
    fn label(&self, node: &NodeRef) -> String {
        self.registry
            .iter()
            .find(|(_, candidate)| Arc::ptr_eq(*candidate, node))
            .map(|(id, _)| id.clone())
            .unwrap_or_else(|| describe(node))
    }
}

/// Human-readable label: the target id for references, else the kind
fn describe(node: &SchemaNode) -> String {
    match node {
        SchemaNode::Reference { target } => target.clone(),
        other => other.kind().to_string(),
    }
}

/// `T | undefined` already spelled out
fn has_undefined_member(ty: &SchemaNode) -> bool {
    match ty {
        SchemaNode::Union { members } => members.iter().any(|m| m.ty.is_undefined_literal()),
        _ => false,
    }
}

fn renumber(properties: &mut [Property]) {
    for (i, prop) in properties.iter_mut().enumerate() {
        prop.id = i as u32;
    }
}
