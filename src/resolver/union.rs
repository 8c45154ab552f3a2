//! Union properties
//!
//! The property names legal on at least one branch of a Union or
//! Intersection. Validators use them to skip, rather than reject, a property
//! that belongs to a sibling branch.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::trace;

use super::SchemaResolver;
use crate::error::{Result, SchemaError};
use crate::schema::{
    FlatInterface, IndexKeyType, IndexSignature, Member, NodeRef, Property, SchemaNode,
    NUMBER_INDEX_MARKER, STRING_INDEX_MARKER,
};

impl<'a> SchemaResolver<'a> {
    /// Sorted, deduplicated property names reachable from any member
    ///
    /// Index signatures contribute `[[String]]` / `[[Number]]`.
    pub fn get_union_properties(&mut self, node: &NodeRef) -> Result<Vec<String>> {
        let members = match &**node {
            SchemaNode::Union { members } | SchemaNode::Intersection { members } => members,
            other => {
                return Err(SchemaError::NotAUnion {
                    kind: other.kind().to_string(),
                })
            }
        };
        if let Some(names) = self.union_cache.get(node) {
            return Ok(names.clone());
        }

        let names = self.guarded(|this| {
            this.tracked(node, |this| {
                let mut names = BTreeSet::new();
                this.add_union_properties(&mut names, members)?;
                Ok(names.into_iter().collect::<Vec<_>>())
            })
        })?;
        trace!(count = names.len(), "collected union properties");

        self.union_cache.insert(node, names.clone());
        Ok(names)
    }

    /// Property names of a union, intersection or mapped type
    ///
    /// A mapped type over a union is distributed first; over an interface it
    /// is flattened. Reference-like nodes are resolved. Anything else is
    /// [`SchemaError::NotAUnion`].
    pub fn get_property_names(&mut self, node: &NodeRef) -> Result<Vec<String>> {
        let schema = self.resolve_reference(node)?;
        match &*schema {
            SchemaNode::Union { .. } | SchemaNode::Intersection { .. } => self.get_union_properties(&schema),
            s if s.is_mapped() => {
                let parsed = self.parse_mapped_type(&schema)?;
                if matches!(&*parsed, SchemaNode::Interface(_)) {
                    let mut names = BTreeSet::new();
                    self.add_flat_properties(&mut names, &schema)?;
                    Ok(names.into_iter().collect())
                } else {
                    self.get_union_properties(&parsed)
                }
            }
            other => Err(SchemaError::NotAUnion {
                kind: other.kind().to_string(),
            }),
        }
    }

    fn add_union_properties(&mut self, names: &mut BTreeSet<String>, members: &[Member]) -> Result<()> {
        for member in members {
            let schema = self.resolve_reference(&member.ty)?;
            match &*schema {
                SchemaNode::Interface(_) => self.add_flat_properties(names, &schema)?,
                SchemaNode::Union { .. } | SchemaNode::Intersection { .. } => {
                    names.extend(self.get_union_properties(&schema)?);
                }
                s if s.is_mapped() => {
                    let parsed = self.parse_mapped_type(&schema)?;
                    if matches!(&*parsed, SchemaNode::Interface(_)) {
                        // Flatten the mapped node itself so Pick/Omit still apply
                        self.add_flat_properties(names, &schema)?;
                    } else {
                        names.extend(self.get_union_properties(&parsed)?);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn add_flat_properties(&mut self, names: &mut BTreeSet<String>, node: &NodeRef) -> Result<()> {
        let flat = self.get_flat_interface_schema(node)?;
        names.extend(flat.properties.into_iter().map(|p| p.name));
        if let Some(signature) = flat.index_signature {
            names.insert(signature.key_type.marker().to_string());
        }
        Ok(())
    }
}

/// Widen a flat interface with the union's property names
///
/// Unknown names become optional `Any` properties; the `[[String]]` and
/// `[[Number]]` markers add an `Any` index signature when none exists. The
/// input is left untouched.
pub fn apply_union_properties(flat: &FlatInterface, names: &[String]) -> FlatInterface {
    let any: NodeRef = Arc::new(SchemaNode::Any);
    let mut applied = flat.clone();

    for name in names {
        let key_type = match name.as_str() {
            STRING_INDEX_MARKER => Some(IndexKeyType::String),
            NUMBER_INDEX_MARKER => Some(IndexKeyType::Number),
            _ => None,
        };

        match key_type {
            Some(key_type) => {
                if applied.index_signature.is_none() {
                    applied.index_signature = Some(IndexSignature {
                        key_type,
                        ty: any.clone(),
                    });
                }
            }
            None if !applied.has_property(name) => {
                let id = applied.properties.len() as u32;
                applied
                    .properties
                    .push(Property::new(id, name.clone(), any.clone()).optional());
            }
            None => {}
        }
    }

    applied
}
