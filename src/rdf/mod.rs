//! RDF data model and storage
//!
//! This module provides:
//! - RDF terms, triples and quads (named graphs)
//! - Vocabularies and prefix management
//! - An indexed in-memory quad store with change sets
//! - The [`GraphStore`] seam used by the mapper
//! - Turtle / N-Triples loading
//! - Transitive hierarchy walking (`rdfs:subClassOf*`)
//!
//! # Example
//!
//! ```rust
//! use silex_sparql::rdf::{ChangeSet, GraphStore, Literal, MemoryGraphStore, NamedNode, Quad, QuadPattern};
//!
//! let store = MemoryGraphStore::new();
//! let mut changes = ChangeSet::new();
//! changes.insert(Quad::new(
//!     NamedNode::new("http://example.org/plant/1").unwrap(),
//!     NamedNode::new("http://www.w3.org/2000/01/rdf-schema#label").unwrap(),
//!     Literal::new_simple_literal("Maize"),
//!     None,
//! ));
//! store.apply(&changes).unwrap();
//! assert_eq!(store.quads(&QuadPattern::any()).unwrap().len(), 1);
//! ```

mod types;
mod store;
mod repository;
pub mod namespace;
pub mod schema;
mod serialization;

pub use types::{
    BlankNode, GraphScope, Literal, NamedNode, Quad, QuadPattern, RdfError, RdfObject, RdfResult,
    RdfSubject, RdfTerm, Triple,
};

pub use store::{AppliedChanges, ChangeSet, RdfStore, RdfStoreError, RdfStoreResult};

pub use repository::{GraphStore, MemoryGraphStore};

pub use namespace::{NamespaceManager, PrefixError, PrefixResult, Vocabulary};

pub use serialization::{
    ParseError, ParseResult, RdfFormat, RdfParser, RdfSerializer, SerializeError,
    SerializeResult,
};
