//! silex-sparql
//!
//! A declarative object mapper for RDF triple stores.
//!
//! # Architecture
//!
//! - [`rdf`]: terms, quads, vocabularies, the indexed quad store and the
//!   [`rdf::GraphStore`] seam
//! - [`sparql`]: query algebra, rendering and in-memory evaluation
//! - [`mapping`]: class definitions, validated descriptors, URI generation,
//!   instance ↔ quad conversion and query translation
//! - [`tree`]: resource hierarchies (class trees, parent-linked resources)
//! - [`document`]: document stores committed alongside the graph
//! - [`transaction`]: cross-store transactions with a journal
//! - [`service`]: the [`SparqlService`] facade
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use silex_sparql::mapping::{
//!     Datatype, MappingResult, PropertyDefinition, ResourceDefinition, ResourceInstance,
//!     SparqlResource,
//! };
//! use silex_sparql::rdf::namespace::RDFS;
//! use silex_sparql::rdf::{MemoryGraphStore, NamedNode, Vocabulary};
//! use silex_sparql::{MapperConfig, SparqlService};
//!
//! const VOCAB: Vocabulary = Vocabulary::new("ex", "http://example.org/vocab#", &["Germplasm"]);
//!
//! struct Germplasm {
//!     uri: Option<NamedNode>,
//!     name: String,
//! }
//!
//! impl SparqlResource for Germplasm {
//!     fn definition() -> ResourceDefinition {
//!         ResourceDefinition::new("Germplasm")
//!             .ontology(VOCAB)
//!             .resource("Germplasm")
//!             .graph("germplasm")
//!             .uri_generator("name")
//!             .property(PropertyDefinition::data("name", RDFS, "label", Datatype::String).required())
//!     }
//!     fn uri(&self) -> Option<&NamedNode> {
//!         self.uri.as_ref()
//!     }
//!     fn set_uri(&mut self, uri: NamedNode) {
//!         self.uri = Some(uri);
//!     }
//!     fn to_instance(&self) -> ResourceInstance {
//!         let mut instance = ResourceInstance::new(self.uri.clone());
//!         instance.set("name", self.name.as_str());
//!         instance
//!     }
//!     fn from_instance(instance: ResourceInstance) -> MappingResult<Self> {
//!         Ok(Self { name: instance.string("name").unwrap_or_default(), uri: instance.uri })
//!     }
//! }
//!
//! let service = SparqlService::new(Arc::new(MemoryGraphStore::new()), MapperConfig::default());
//! let mut maize = Germplasm { uri: None, name: "Zea mays".to_string() };
//! let uri = service.create(None, &mut maize).unwrap();
//! assert_eq!(uri.as_str(), "http://opensilex.dev/id/germplasm/zea-mays");
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod document;
pub mod mapping;
pub mod rdf;
pub mod service;
pub mod sparql;
pub mod transaction;
pub mod tree;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigResult, MapperConfig};

pub use document::{
    open_store, Document, DocumentError, DocumentResult, DocumentSession, DocumentStore,
    MemoryDocumentStore, RocksDocumentStore,
};

pub use mapping::{
    DescriptorRegistry, MappingError, ResourceDefinition, ResourceDescriptor, ResourceInstance,
    SearchFilter, SearchRequest, SortField, SparqlResource, ValidationError,
};

pub use rdf::{
    ChangeSet, GraphStore, Literal, MemoryGraphStore, NamedNode, Quad, RdfFormat, RdfStoreError,
};

pub use service::{ListWithPagination, MapperError, MapperResult, SparqlService, TreeResource};

pub use transaction::{
    CrossStoreTransaction, TransactionContext, TransactionError, TransactionEvent,
    TransactionJournal,
};

pub use tree::{ResourceTree, TreeResolver};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
