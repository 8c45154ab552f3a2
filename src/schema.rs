//! Schema node model
//!
//! A protocol file describes every type as a tree of [`SchemaNode`]s, tagged by
//! a `type` discriminator. Child nodes are shared through [`NodeRef`] so the
//! resolver can key its caches on node identity.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared handle to a schema node. Identity is the allocation.
pub type NodeRef = Arc<SchemaNode>;

/// Discriminant of a [`SchemaNode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaKind {
    Boolean,
    Number,
    String,
    Array,
    Tuple,
    Enum,
    Any,
    Literal,
    Object,
    Interface,
    Buffer,
    IndexedAccess,
    Reference,
    Keyof,
    Union,
    Intersection,
    Pick,
    Partial,
    Omit,
    Overwrite,
    NonNullable,
    Date,
    Custom,
}

impl SchemaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaKind::Boolean => "Boolean",
            SchemaKind::Number => "Number",
            SchemaKind::String => "String",
            SchemaKind::Array => "Array",
            SchemaKind::Tuple => "Tuple",
            SchemaKind::Enum => "Enum",
            SchemaKind::Any => "Any",
            SchemaKind::Literal => "Literal",
            SchemaKind::Object => "Object",
            SchemaKind::Interface => "Interface",
            SchemaKind::Buffer => "Buffer",
            SchemaKind::IndexedAccess => "IndexedAccess",
            SchemaKind::Reference => "Reference",
            SchemaKind::Keyof => "Keyof",
            SchemaKind::Union => "Union",
            SchemaKind::Intersection => "Intersection",
            SchemaKind::Pick => "Pick",
            SchemaKind::Partial => "Partial",
            SchemaKind::Omit => "Omit",
            SchemaKind::Overwrite => "Overwrite",
            SchemaKind::NonNullable => "NonNullable",
            SchemaKind::Date => "Date",
            SchemaKind::Custom => "Custom",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding hint for `Number` schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int,
    Uint,
    Double,
    Bigint,
    Bigint64,
    Biguint64,
}

/// Value of a `Literal` schema. `undefined` is the absence of a value and is
/// modelled one level up as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Null,
    Boolean(bool),
    Number(serde_json::Number),
    String(String),
}

/// Value of an `Enum` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    String(String),
    Number(serde_json::Number),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub id: u32,
    pub value: EnumValue,
}

/// Key type of an index signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKeyType {
    String,
    Number,
}

impl IndexKeyType {
    /// Marker name used in union property lists, e.g. `[[String]]`
    pub fn marker(&self) -> &'static str {
        match self {
            IndexKeyType::String => STRING_INDEX_MARKER,
            IndexKeyType::Number => NUMBER_INDEX_MARKER,
        }
    }
}

pub const STRING_INDEX_MARKER: &str = "[[String]]";
pub const NUMBER_INDEX_MARKER: &str = "[[Number]]";

/// `{ [key: string]: T }` / `{ [key: number]: T }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSignature {
    pub key_type: IndexKeyType,
    #[serde(rename = "type")]
    pub ty: NodeRef,
}

/// A named property of an interface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(rename = "type")]
    pub ty: NodeRef,
}

impl Property {
    pub fn new(id: u32, name: impl Into<String>, ty: impl Into<NodeRef>) -> Self {
        Self {
            id,
            name: name.into(),
            optional: false,
            ty: ty.into(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// An `{ id, type }` entry: union/intersection members and `extends` items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: u32,
    #[serde(rename = "type")]
    pub ty: NodeRef,
}

impl Member {
    pub fn new(id: u32, ty: impl Into<NodeRef>) -> Self {
        Self { id, ty: ty.into() }
    }
}

/// Body of an `Interface` schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSchema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<Member>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_signature: Option<IndexSignature>,
}

/// One type description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum SchemaNode {
    Boolean,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scalar_type: Option<ScalarType>,
    },
    String,
    Array {
        element_type: NodeRef,
    },
    Tuple {
        element_types: Vec<NodeRef>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        optional_start_index: Option<usize>,
    },
    Enum {
        members: Vec<EnumMember>,
    },
    Any,
    Literal {
        #[serde(
            default,
            skip_serializing_if = "Option::is_none",
            deserialize_with = "present_literal"
        )]
        literal: Option<LiteralValue>,
    },
    Object,
    Interface(InterfaceSchema),
    Buffer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        array_type: Option<String>,
    },
    IndexedAccess {
        object_type: NodeRef,
        index: String,
    },
    Reference {
        target: String,
    },
    Keyof {
        target: NodeRef,
    },
    Union {
        members: Vec<Member>,
    },
    Intersection {
        members: Vec<Member>,
    },
    Pick {
        target: NodeRef,
        keys: Vec<String>,
    },
    Partial {
        target: NodeRef,
    },
    Omit {
        target: NodeRef,
        keys: Vec<String>,
    },
    Overwrite {
        target: NodeRef,
        overwrite: NodeRef,
    },
    NonNullable {
        target: NodeRef,
    },
    Date,
    Custom {
        name: String,
    },
}

/// A present `literal` field is never `undefined`, even when it is `null`.
fn present_literal<'de, D>(deserializer: D) -> Result<Option<LiteralValue>, D::Error>
where
    D: Deserializer<'de>,
{
    LiteralValue::deserialize(deserializer).map(Some)
}

impl SchemaNode {
    pub fn kind(&self) -> SchemaKind {
        match self {
            SchemaNode::Boolean => SchemaKind::Boolean,
            SchemaNode::Number { .. } => SchemaKind::Number,
            SchemaNode::String => SchemaKind::String,
            SchemaNode::Array { .. } => SchemaKind::Array,
            SchemaNode::Tuple { .. } => SchemaKind::Tuple,
            SchemaNode::Enum { .. } => SchemaKind::Enum,
            SchemaNode::Any => SchemaKind::Any,
            SchemaNode::Literal { .. } => SchemaKind::Literal,
            SchemaNode::Object => SchemaKind::Object,
            SchemaNode::Interface(_) => SchemaKind::Interface,
            SchemaNode::Buffer { .. } => SchemaKind::Buffer,
            SchemaNode::IndexedAccess { .. } => SchemaKind::IndexedAccess,
            SchemaNode::Reference { .. } => SchemaKind::Reference,
            SchemaNode::Keyof { .. } => SchemaKind::Keyof,
            SchemaNode::Union { .. } => SchemaKind::Union,
            SchemaNode::Intersection { .. } => SchemaKind::Intersection,
            SchemaNode::Pick { .. } => SchemaKind::Pick,
            SchemaNode::Partial { .. } => SchemaKind::Partial,
            SchemaNode::Omit { .. } => SchemaKind::Omit,
            SchemaNode::Overwrite { .. } => SchemaKind::Overwrite,
            SchemaNode::NonNullable { .. } => SchemaKind::NonNullable,
            SchemaNode::Date => SchemaKind::Date,
            SchemaNode::Custom { .. } => SchemaKind::Custom,
        }
    }

    /// Reference, IndexedAccess or Keyof: meaning only through indirection
    pub fn is_reference_like(&self) -> bool {
        matches!(
            self,
            SchemaNode::Reference { .. } | SchemaNode::IndexedAccess { .. } | SchemaNode::Keyof { .. }
        )
    }

    /// Pick, Partial, Omit or Overwrite
    pub fn is_mapped(&self) -> bool {
        matches!(
            self,
            SchemaNode::Pick { .. }
                | SchemaNode::Partial { .. }
                | SchemaNode::Omit { .. }
                | SchemaNode::Overwrite { .. }
        )
    }

    /// Anything that may flatten to an interface
    pub fn is_interface_like(&self) -> bool {
        matches!(self, SchemaNode::Interface(_)) || self.is_reference_like() || self.is_mapped()
    }

    /// Target of a mapped type
    pub fn mapped_target(&self) -> Option<&NodeRef> {
        match self {
            SchemaNode::Pick { target, .. }
            | SchemaNode::Partial { target }
            | SchemaNode::Omit { target, .. }
            | SchemaNode::Overwrite { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Copy of this mapped type pointing at a different target
    pub fn with_mapped_target(&self, new_target: NodeRef) -> Option<SchemaNode> {
        let node = match self {
            SchemaNode::Pick { keys, .. } => SchemaNode::Pick {
                target: new_target,
                keys: keys.clone(),
            },
            SchemaNode::Partial { .. } => SchemaNode::Partial { target: new_target },
            SchemaNode::Omit { keys, .. } => SchemaNode::Omit {
                target: new_target,
                keys: keys.clone(),
            },
            SchemaNode::Overwrite { overwrite, .. } => SchemaNode::Overwrite {
                target: new_target,
                overwrite: overwrite.clone(),
            },
            _ => return None,
        };
        Some(node)
    }

    /// `Literal` with no value, i.e. `undefined`
    pub fn is_undefined_literal(&self) -> bool {
        matches!(self, SchemaNode::Literal { literal: None })
    }

    // ---- constructors ----

    pub fn number() -> Self {
        SchemaNode::Number { scalar_type: None }
    }

    pub fn reference(target: impl Into<String>) -> Self {
        SchemaNode::Reference {
            target: target.into(),
        }
    }

    pub fn literal(value: LiteralValue) -> Self {
        SchemaNode::Literal {
            literal: Some(value),
        }
    }

    pub fn string_literal(value: impl Into<String>) -> Self {
        Self::literal(LiteralValue::String(value.into()))
    }

    pub fn undefined() -> Self {
        SchemaNode::Literal { literal: None }
    }

    pub fn interface(properties: Vec<Property>) -> Self {
        SchemaNode::Interface(InterfaceSchema {
            properties,
            ..Default::default()
        })
    }

    /// Union whose member ids follow the order of `types`
    pub fn union(types: impl IntoIterator<Item = NodeRef>) -> Self {
        SchemaNode::Union {
            members: numbered_members(types),
        }
    }

    pub fn intersection(types: impl IntoIterator<Item = NodeRef>) -> Self {
        SchemaNode::Intersection {
            members: numbered_members(types),
        }
    }

    pub fn pick(target: impl Into<NodeRef>, keys: &[&str]) -> Self {
        SchemaNode::Pick {
            target: target.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn omit(target: impl Into<NodeRef>, keys: &[&str]) -> Self {
        SchemaNode::Omit {
            target: target.into(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn partial(target: impl Into<NodeRef>) -> Self {
        SchemaNode::Partial {
            target: target.into(),
        }
    }

    pub fn overwrite(target: impl Into<NodeRef>, overwrite: impl Into<NodeRef>) -> Self {
        SchemaNode::Overwrite {
            target: target.into(),
            overwrite: overwrite.into(),
        }
    }
}

fn numbered_members(types: impl IntoIterator<Item = NodeRef>) -> Vec<Member> {
    types
        .into_iter()
        .enumerate()
        .map(|(i, ty)| Member { id: i as u32, ty })
        .collect()
}

/// An interface with inheritance resolved: no `extends`, unique property names
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatInterface {
    pub properties: Vec<Property>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_signature: Option<IndexSignature>,
}

impl FlatInterface {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_interface() {
        let json = r#"{
            "type": "Interface",
            "properties": [
                { "id": 0, "name": "id", "type": { "type": "Number", "scalarType": "uint" } },
                { "id": 1, "name": "nick", "optional": true, "type": { "type": "String" } }
            ],
            "indexSignature": { "keyType": "String", "type": { "type": "Any" } }
        }"#;
        let node: SchemaNode = serde_json::from_str(json).unwrap();

        let SchemaNode::Interface(body) = node else {
            panic!("expected Interface");
        };
        assert_eq!(body.properties.len(), 2);
        assert_eq!(
            *body.properties[0].ty,
            SchemaNode::Number {
                scalar_type: Some(ScalarType::Uint)
            }
        );
        assert!(body.properties[1].optional);
        assert_eq!(body.index_signature.unwrap().key_type, IndexKeyType::String);
    }

    #[test]
    fn test_literal_null_is_not_undefined() {
        let undefined: SchemaNode = serde_json::from_str(r#"{ "type": "Literal" }"#).unwrap();
        let null: SchemaNode = serde_json::from_str(r#"{ "type": "Literal", "literal": null }"#).unwrap();
        let number: SchemaNode = serde_json::from_str(r#"{ "type": "Literal", "literal": 3 }"#).unwrap();

        assert!(undefined.is_undefined_literal());
        assert_eq!(null, SchemaNode::literal(LiteralValue::Null));
        assert_eq!(number, SchemaNode::literal(LiteralValue::Number(3.into())));
    }

    #[test]
    fn test_numeric_literals_keep_their_form() {
        for json in [
            r#"{"type":"Literal","literal":3}"#,
            r#"{"type":"Literal","literal":-7}"#,
            r#"{"type":"Literal","literal":2.5}"#,
            r#"{"type":"Enum","members":[{"id":0,"value":1},{"id":1,"value":"b"}]}"#,
        ] {
            let node: SchemaNode = serde_json::from_str(json).unwrap();
            assert_eq!(serde_json::to_string(&node).unwrap(), json);
        }
    }

    #[test]
    fn test_serialize_skips_empty_fields() {
        let node = SchemaNode::interface(vec![Property::new(0, "a", SchemaNode::String)]);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "Interface",
                "properties": [{ "id": 0, "name": "a", "type": { "type": "String" } }]
            })
        );
    }

    #[test]
    fn test_with_mapped_target_keeps_keys() {
        let pick = SchemaNode::pick(SchemaNode::reference("a/A"), &["x", "y"]);
        let moved = pick.with_mapped_target(Arc::new(SchemaNode::reference("a/B"))).unwrap();

        assert_eq!(moved, SchemaNode::pick(SchemaNode::reference("a/B"), &["x", "y"]));
        assert!(SchemaNode::Any.with_mapped_target(Arc::new(SchemaNode::Any)).is_none());
    }

    #[test]
    fn test_classification() {
        assert!(SchemaNode::reference("x").is_reference_like());
        assert!(SchemaNode::partial(SchemaNode::reference("x")).is_mapped());
        assert!(SchemaNode::interface(vec![]).is_interface_like());
        assert!(!SchemaNode::union(vec![]).is_interface_like());
        assert_eq!(SchemaNode::Date.kind().to_string(), "Date");
    }
}
