//! Mapped types: Pick, Partial, Omit, Overwrite
//!
//! A chain such as `Pick<Omit<X, 'a'>, 'b'>` is unwound to its innermost
//! target `X`. Over an interface the chain flattens inside-out; over a union
//! or intersection it distributes: `Pick<A | B>` is `Pick<A> | Pick<B>`.

use std::sync::Arc;
use tracing::{debug, trace};

use super::{renumber, SchemaResolver};
use crate::error::{Result, SchemaError};
use crate::schema::{FlatInterface, Member, NodeRef, Property, SchemaNode};

impl<'a> SchemaResolver<'a> {
    /// Unwind a (possibly nested) mapped type to its innermost target
    ///
    /// Returns the innermost Interface as-is, or a new Union/Intersection of
    /// equal arity whose members are each wrapped in the full chain. Any other
    /// innermost target is [`SchemaError::UnsupportedPattern`].
    pub fn parse_mapped_type(&mut self, node: &NodeRef) -> Result<NodeRef> {
        if !node.is_mapped() {
            return Err(SchemaError::NotAMappedType {
                kind: node.kind().to_string(),
            });
        }
        if let Some(parsed) = self.mapped_cache.get(node) {
            return Ok(parsed.clone());
        }

        let parsed = self.guarded(|this| this.tracked(node, |this| this.unwind_mapped_type(node)))?;
        self.mapped_cache.insert(node, parsed.clone());
        Ok(parsed)
    }

    fn unwind_mapped_type(&mut self, node: &NodeRef) -> Result<NodeRef> {
        // Outermost first
        let mut chain: Vec<NodeRef> = Vec::new();
        let mut child = node.clone();

        while let Some(target) = child.mapped_target().cloned() {
            if chain.iter().any(|link| Arc::ptr_eq(link, &child)) {
                let mut names: Vec<String> = chain.iter().map(|link| self.label(link)).collect();
                names.push(self.label(&child));
                return Err(SchemaError::CircularReference { chain: names });
            }
            chain.push(child);
            child = self.resolve_reference(&target)?;
        }

        trace!(depth = chain.len(), innermost = %child.kind(), "unwound mapped type");

        match &*child {
            SchemaNode::Interface(_) => Ok(child.clone()),
            SchemaNode::Union { members } => Ok(Arc::new(SchemaNode::Union {
                members: distribute(&chain, members),
            })),
            SchemaNode::Intersection { members } => Ok(Arc::new(SchemaNode::Intersection {
                members: distribute(&chain, members),
            })),
            other => Err(SchemaError::UnsupportedPattern {
                mapped: node.kind().to_string(),
                target: other.kind().to_string(),
            }),
        }
    }

    /// Apply a mapped type to its flattened target
    pub(super) fn flatten_mapped_type(&mut self, node: &NodeRef) -> Result<FlatInterface> {
        let Some(target) = node.mapped_target() else {
            return Err(SchemaError::NotAMappedType {
                kind: node.kind().to_string(),
            });
        };
        let target = self.resolve_reference(target)?;

        let mut flat = match &*target {
            t if matches!(t, SchemaNode::Interface(_)) || t.is_mapped() => {
                self.get_flat_interface_schema(&target)?
            }
            SchemaNode::Union { .. } | SchemaNode::Intersection { .. } => {
                return Err(SchemaError::NotAnInterface {
                    kind: target.kind().to_string(),
                })
            }
            other => {
                return Err(SchemaError::UnsupportedPattern {
                    mapped: node.kind().to_string(),
                    target: other.kind().to_string(),
                })
            }
        };

        match &**node {
            SchemaNode::Pick { keys, .. } => self.apply_pick(&flat, keys, &target),
            SchemaNode::Partial { .. } => {
                for prop in &mut flat.properties {
                    prop.optional = true;
                }
                Ok(flat)
            }
            SchemaNode::Omit { keys, .. } => {
                flat.properties.retain(|p| !keys.contains(&p.name));
                renumber(&mut flat.properties);
                Ok(flat)
            }
            SchemaNode::Overwrite { overwrite, .. } => {
                let overwrite = self.get_flat_interface_schema(overwrite)?;
                if overwrite.index_signature.is_some() {
                    flat.index_signature = overwrite.index_signature;
                }
                for prop in overwrite.properties {
                    flat.properties.retain(|p| p.name != prop.name);
                    flat.properties.push(prop);
                }
                renumber(&mut flat.properties);
                Ok(flat)
            }
            other => Err(SchemaError::NotAMappedType {
                kind: other.kind().to_string(),
            }),
        }
    }

    fn apply_pick(&self, flat: &FlatInterface, keys: &[String], target: &NodeRef) -> Result<FlatInterface> {
        let mut properties: Vec<Property> = Vec::with_capacity(keys.len());

        for key in keys {
            if properties.iter().any(|p| &p.name == key) {
                continue;
            }
            let id = properties.len() as u32;
            if let Some(prop) = flat.property(key) {
                properties.push(Property {
                    id,
                    name: key.clone(),
                    optional: prop.optional,
                    ty: prop.ty.clone(),
                });
            } else if let Some(signature) = &flat.index_signature {
                properties.push(Property::new(id, key.clone(), signature.ty.clone()));
            } else if self.config.strict_pick {
                return Err(SchemaError::InvalidIndex {
                    index: key.clone(),
                    object: self.label(target),
                });
            } else {
                debug!(key = %key, target = %self.label(target), "pick key not found; dropped");
            }
        }

        Ok(FlatInterface {
            properties,
            index_signature: None,
        })
    }
}

/// Wrap every member in the chain, innermost link closest to the member
fn distribute(chain: &[NodeRef], members: &[Member]) -> Vec<Member> {
    members
        .iter()
        .map(|member| Member {
            id: member.id,
            ty: chain.iter().rev().fold(member.ty.clone(), |inner, link| {
                link.with_mapped_target(inner.clone()).map(Arc::new).unwrap_or(inner)
            }),
        })
        .collect()
}
