//! Resolver Integration Tests
//!
//! Runs the resolver against a protocol fixture and checks the structural
//! properties every flattening must satisfy.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use proto_schemas::{
    apply_union_properties, load_proto_file, FlatInterface, LiteralValue, NodeRef, Property, ReferenceGraph,
    SchemaError, SchemaNode, SchemaRegistry, SchemaResolver, ServiceProto,
};
use rstest::{fixture, rstest};

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

#[fixture]
fn proto() -> ServiceProto {
    load_proto_file(&fixtures_path().join("protocol.json"))
        .expect("Fixture protocol should load")
        .proto
}

fn names(flat: &FlatInterface) -> Vec<&str> {
    flat.property_names().collect()
}

fn reference(id: &str) -> NodeRef {
    Arc::new(SchemaNode::reference(id))
}

// =============================================================================
// Basic scenarios
// =============================================================================

fn user_registry() -> SchemaRegistry {
    [(
        "a/User".to_string(),
        SchemaNode::interface(vec![Property::new(0, "id", SchemaNode::number())]),
    )]
    .into_iter()
    .collect()
}

#[test]
fn test_reference_returns_registry_node() {
    let reg = user_registry();
    let mut resolver = SchemaResolver::new(&reg);

    let resolved = resolver.resolve_reference(&reference("a/User")).unwrap();
    assert!(Arc::ptr_eq(&resolved, reg.get("a/User").unwrap()));
}

#[test]
fn test_indexed_access_required_property() {
    let reg = user_registry();
    let mut resolver = SchemaResolver::new(&reg);
    let node = Arc::new(SchemaNode::IndexedAccess {
        object_type: reference("a/User"),
        index: "id".to_string(),
    });

    assert_eq!(*resolver.resolve_reference(&node).unwrap(), SchemaNode::number());
}

#[test]
fn test_indexed_access_optional_property() {
    let reg = SchemaRegistry::new();
    let mut resolver = SchemaResolver::new(&reg);
    let node = Arc::new(SchemaNode::IndexedAccess {
        object_type: Arc::new(SchemaNode::interface(vec![
            Property::new(0, "x", SchemaNode::String).optional(),
        ])),
        index: "x".to_string(),
    });

    let resolved = resolver.resolve_reference(&node).unwrap();
    match &*resolved {
        SchemaNode::Union { members } => {
            assert_eq!(members.len(), 2);
            assert_eq!(*members[0].ty, SchemaNode::String);
            assert!(members[1].ty.is_undefined_literal());
        }
        other => panic!("Expected Union, got {:?}", other),
    }
}

#[test]
fn test_pick_renumbers() {
    let reg = SchemaRegistry::new();
    let mut resolver = SchemaResolver::new(&reg);
    let abc = SchemaNode::interface(vec![
        Property::new(0, "a", SchemaNode::String),
        Property::new(1, "b", SchemaNode::String),
        Property::new(2, "c", SchemaNode::String),
    ]);
    let node: NodeRef = Arc::new(SchemaNode::pick(abc, &["a", "c"]));

    let flat = resolver.get_flat_interface_schema(&node).unwrap();
    assert_eq!(names(&flat), vec!["a", "c"]);
    assert_eq!(flat.properties.iter().map(|p| p.id).collect::<Vec<_>>(), vec![0, 1]);
}

#[test]
fn test_omit_removes_key() {
    let reg = SchemaRegistry::new();
    let mut resolver = SchemaResolver::new(&reg);
    let ab = SchemaNode::interface(vec![
        Property::new(0, "a", SchemaNode::String),
        Property::new(1, "b", SchemaNode::String),
    ]);
    let node: NodeRef = Arc::new(SchemaNode::omit(ab, &["b"]));

    assert_eq!(names(&resolver.get_flat_interface_schema(&node).unwrap()), vec!["a"]);
}

#[test]
fn test_keyof_yields_string_literals() {
    let reg = SchemaRegistry::new();
    let mut resolver = SchemaResolver::new(&reg);
    let node = Arc::new(SchemaNode::Keyof {
        target: Arc::new(SchemaNode::interface(vec![
            Property::new(0, "x", SchemaNode::Any),
            Property::new(1, "y", SchemaNode::Any),
        ])),
    });

    let resolved = resolver.resolve_reference(&node).unwrap();
    let SchemaNode::Union { members } = &*resolved else {
        panic!("Expected Union, got {:?}", resolved);
    };
    let literals: Vec<_> = members.iter().map(|m| (*m.ty).clone()).collect();
    assert_eq!(
        literals,
        vec![
            SchemaNode::literal(LiteralValue::String("x".to_string())),
            SchemaNode::literal(LiteralValue::String("y".to_string())),
        ]
    );
}

// =============================================================================
// Reference chains
// =============================================================================

#[rstest]
#[case(1)]
#[case(2)]
#[case(8)]
fn test_finite_chain_reaches_terminal(#[case] length: usize) {
    let mut reg = SchemaRegistry::new();
    for i in 0..length {
        reg.insert(format!("c/{}", i), SchemaNode::reference(format!("c/{}", i + 1)));
    }
    reg.insert(format!("c/{}", length), SchemaNode::Boolean);
    let mut resolver = SchemaResolver::new(&reg);

    assert_eq!(*resolver.resolve_reference(&reference("c/0")).unwrap(), SchemaNode::Boolean);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
fn test_cyclic_chain_terminates(#[case] length: usize) {
    let mut reg = SchemaRegistry::new();
    for i in 0..length {
        reg.insert(format!("c/{}", i), SchemaNode::reference(format!("c/{}", (i + 1) % length)));
    }
    let mut resolver = SchemaResolver::new(&reg);

    match resolver.resolve_reference(&reference("c/0")) {
        Err(SchemaError::CircularReference { chain }) => {
            assert_eq!(chain.len(), length + 1);
            assert_eq!(chain.first(), chain.last());
        }
        other => panic!("Expected CircularReference, got {:?}", other),
    }
}

// =============================================================================
// Fixture protocol
// =============================================================================

#[rstest]
fn test_fixture_services_are_complete(proto: ServiceProto) {
    assert_eq!(proto.version, Some(2));
    assert_eq!(proto.services.len(), 2);
    assert!(proto.missing_schemas().is_empty());
}

#[rstest]
fn test_every_fixture_schema_resolves(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    for (id, node) in proto.types.iter() {
        resolver
            .check_schema(node)
            .unwrap_or_else(|e| panic!("{} failed to check: {}", id, e));
    }
}

#[rstest]
fn test_partial_over_union_distributes(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let node = resolver.resolve_id("chat/PartialContent").unwrap();

    assert!(matches!(
        resolver.get_flat_interface_schema(&node),
        Err(SchemaError::NotAnInterface { .. })
    ));
    assert_eq!(
        resolver.get_property_names(&node).unwrap(),
        vec!["[[String]]", "kind", "text", "url"]
    );

    let parsed = resolver.parse_mapped_type(&node).unwrap();
    let SchemaNode::Union { members } = &*parsed else {
        panic!("Expected Union, got {:?}", parsed);
    };
    for member in members {
        let flat = resolver.get_flat_interface_schema(&member.ty).unwrap();
        assert!(flat.properties.iter().all(|p| p.optional));
    }
}

#[rstest]
fn test_extends_appends_inherited(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let flat = resolver.flatten_id("user/PtlLogin/ReqLogin").unwrap();

    assert_eq!(names(&flat), vec!["account", "password", "sn"]);
    assert!(flat.property("sn").unwrap().optional);
}

#[rstest]
fn test_indexed_access_inside_property(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let flat = resolver.flatten_id("user/PtlLogin/ResLogin").unwrap();

    let token = resolver.resolve_reference(&flat.property("token").unwrap().ty).unwrap();
    assert_eq!(*token, SchemaNode::String);

    let user = resolver.flatten_id("user/PublicUser").unwrap();
    assert_eq!(names(&user), vec!["id", "name"]);
}

#[rstest]
fn test_partial_over_omit(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let flat = resolver.flatten_id("user/UserPatch").unwrap();

    assert_eq!(names(&flat), vec!["name", "nick"]);
    assert!(flat.properties.iter().all(|p| p.optional));
}

#[rstest]
fn test_alias_resolves_to_target(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let alias = resolver.resolve_id("user/UserAlias").unwrap();
    assert!(Arc::ptr_eq(&alias, proto.types.get("user/User").unwrap()));
    assert_eq!(
        resolver.flatten_id("user/UserAlias").unwrap(),
        resolver.flatten_id("user/User").unwrap()
    );
}

#[rstest]
fn test_keyof_fixture(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let keys = resolver.resolve_id("user/UserKey").unwrap();
    let SchemaNode::Union { members } = &*keys else {
        panic!("Expected Union, got {:?}", keys);
    };
    assert_eq!(members.len(), 4);
}

#[rstest]
fn test_union_properties_with_index_signature(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let content = resolver.resolve_id("chat/Content").unwrap();

    let names = resolver.get_union_properties(&content).unwrap();
    assert_eq!(names, vec!["[[String]]", "kind", "text", "url"]);
}

#[rstest]
fn test_reference_graph_of_fixture(proto: ServiceProto) {
    let graph = ReferenceGraph::build(&proto.types);

    assert!(graph.cycles().is_empty());
    assert_eq!(graph.dangling().count(), 0);
    let deps: Vec<_> = graph.dependencies("user/PtlLogin/ResLogin").into_iter().collect();
    assert_eq!(deps, vec!["user/PublicUser", "user/Session", "user/User"]);
}

// =============================================================================
// Mapped-type properties
// =============================================================================

#[rstest]
#[case("user/User")]
#[case("user/PtlLogin/ReqLogin")]
#[case("user/PublicUser")]
#[case("chat/Image")]
fn test_partial_is_idempotent(proto: ServiceProto, #[case] id: &str) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let once: NodeRef = Arc::new(SchemaNode::partial(reference(id)));
    let twice: NodeRef = Arc::new(SchemaNode::partial(SchemaNode::partial(reference(id))));

    assert_eq!(
        resolver.get_flat_interface_schema(&once).unwrap(),
        resolver.get_flat_interface_schema(&twice).unwrap()
    );
}

#[rstest]
#[case("user/User", &["id", "nick", "missing"])]
#[case("user/PtlLogin/ReqLogin", &["sn", "account", "sn"])]
#[case("chat/Image", &["url", "anything"])]
#[case("chat/Meta", &["0", "1"])]
fn test_pick_membership(proto: ServiceProto, #[case] id: &str, #[case] keys: &[&str]) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let target = resolver.flatten_id(id).unwrap();
    let node: NodeRef = Arc::new(SchemaNode::pick(reference(id), keys));
    let picked = resolver.get_flat_interface_schema(&node).unwrap();

    for name in picked.property_names() {
        assert!(keys.contains(&name), "{} not among {:?}", name, keys);
    }
    for key in keys {
        if target.has_property(key) || target.index_signature.is_some() {
            assert!(picked.has_property(key), "{} missing from Pick of {}", key, id);
        }
    }
}

#[rstest]
#[case("user/User", &["id", "nope"])]
#[case("user/PtlLogin/ReqLogin", &["sn", "account"])]
#[case("chat/Image", &["kind"])]
fn test_omit_is_disjoint(proto: ServiceProto, #[case] id: &str, #[case] keys: &[&str]) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let node: NodeRef = Arc::new(SchemaNode::omit(reference(id), keys));
    let flat = resolver.get_flat_interface_schema(&node).unwrap();

    assert!(flat.property_names().all(|name| !keys.contains(&name)));
}

// =============================================================================
// Union properties
// =============================================================================

#[rstest]
fn test_union_properties_ignore_member_order(proto: ServiceProto) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let ids = ["chat/Text", "chat/Image", "chat/Meta", "user/PublicUser"];

    let forward: NodeRef = Arc::new(SchemaNode::union(ids.iter().map(|id| reference(id))));
    let backward: NodeRef = Arc::new(SchemaNode::union(ids.iter().rev().map(|id| reference(id))));
    let forward = resolver.get_union_properties(&forward).unwrap();
    let backward = resolver.get_union_properties(&backward).unwrap();
    assert_eq!(forward, backward);

    let mut expected = BTreeSet::new();
    for id in ids {
        let flat = resolver.flatten_id(id).unwrap();
        expected.extend(flat.property_names().map(str::to_string));
        if let Some(signature) = flat.index_signature {
            expected.insert(signature.key_type.marker().to_string());
        }
    }
    assert_eq!(forward, expected.into_iter().collect::<Vec<_>>());
}

#[rstest]
#[case("user/User")]
#[case("chat/Text")]
#[case("chat/Meta")]
fn test_apply_union_properties_is_superset(proto: ServiceProto, #[case] id: &str) {
    let mut resolver = SchemaResolver::new(&proto.types);
    let content = resolver.resolve_id("chat/Content").unwrap();
    let union_names = resolver.get_union_properties(&content).unwrap();
    let flat = resolver.flatten_id(id).unwrap();

    let applied = apply_union_properties(&flat, &union_names);
    for prop in &flat.properties {
        assert_eq!(applied.property(&prop.name), Some(prop));
    }
    assert!(applied.index_signature.is_some());
    if let Some(signature) = &flat.index_signature {
        assert_eq!(applied.index_signature.as_ref(), Some(signature));
    }
}
