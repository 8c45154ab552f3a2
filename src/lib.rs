//! Protocol Schema Resolution
//!
//! Resolves references and flattens interface-like types in the schema
//! registry of a protocol document, so validators and encoders can work on
//! concrete, inheritance-free shapes.
//!
//! ## Features
//!
//! - **Reference Resolution**: `Reference`, `IndexedAccess` and `keyof` nodes
//!   resolve to the node they stand for
//! - **Interface Flattening**: `extends` chains and Pick/Partial/Omit/Overwrite
//!   collapse into one property list
//! - **Union Properties**: every property name legal on some branch of a union
//! - **Identity Memoization**: results are cached per node allocation
//! - **Reference Graph**: cycle and dangling-reference reports via petgraph
//!
//! ## Example
//!
//! ```
//! use proto_schemas::{SchemaRegistry, SchemaResolver, SchemaNode, Property};
//!
//! let registry: SchemaRegistry = [(
//!     "user/User".to_string(),
//!     SchemaNode::interface(vec![Property::new(0, "id", SchemaNode::String)]),
//! )]
//! .into_iter()
//! .collect();
//!
//! let mut resolver = SchemaResolver::new(&registry);
//! let flat = resolver.flatten_id("user/User").unwrap();
//! assert_eq!(flat.property_names().collect::<Vec<_>>(), vec!["id"]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod loader;
pub mod proto;
pub mod resolver;
pub mod schema;

pub use config::{OutputFormat, Settings};
pub use error::{Result, SchemaError};
pub use graph::ReferenceGraph;
pub use loader::{load, load_from_directory, load_proto_file, LoadedProto, LoaderConfig};
pub use proto::{SchemaId, SchemaRegistry, ServiceDef, ServiceProto};
pub use resolver::{apply_union_properties, CacheStats, ResolverConfig, SchemaResolver};
pub use schema::{FlatInterface, IndexKeyType, IndexSignature, LiteralValue, Member, NodeRef, Property, SchemaNode};
