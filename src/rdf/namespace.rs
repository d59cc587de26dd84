//! Vocabularies and prefix management
//!
//! A [`Vocabulary`] is the constant description of an ontology: its preferred
//! prefix, its namespace IRI and the closed list of terms it defines. Mapped
//! classes reference ontology terms through vocabularies, so a misspelled term
//! is caught when the class descriptor is built rather than when a query
//! silently returns nothing.

use indexmap::IndexMap;
use thiserror::Error;

use super::types::{NamedNode, RdfResult};

/// Prefix errors
#[derive(Error, Debug)]
pub enum PrefixError {
    /// Unknown prefix
    #[error("Unknown prefix: {0}")]
    UnknownPrefix(String),

    /// Not a compact IRI
    #[error("Invalid compact IRI: {0}")]
    InvalidIri(String),
}

pub type PrefixResult<T> = Result<T, PrefixError>;

/// Constant ontology descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vocabulary {
    /// Preferred prefix
    pub prefix: &'static str,
    /// Namespace IRI, ending with `#` or `/`
    pub namespace: &'static str,
    /// Local names defined by the ontology
    pub terms: &'static [&'static str],
}

impl Vocabulary {
    pub const fn new(
        prefix: &'static str,
        namespace: &'static str,
        terms: &'static [&'static str],
    ) -> Self {
        Self {
            prefix,
            namespace,
            terms,
        }
    }

    /// Whether the ontology defines this local name
    pub fn defines(&self, local_name: &str) -> bool {
        self.terms.contains(&local_name)
    }

    /// Full IRI string of a local name, defined or not
    pub fn iri(&self, local_name: &str) -> String {
        format!("{}{}", self.namespace, local_name)
    }

    /// Named node of a defined term
    pub fn term(&self, local_name: &str) -> Option<NamedNode> {
        if self.defines(local_name) {
            NamedNode::new(self.iri(local_name)).ok()
        } else {
            None
        }
    }
}

pub const RDF: Vocabulary = Vocabulary::new(
    "rdf",
    "http://www.w3.org/1999/02/22-rdf-syntax-ns#",
    &["type", "Property", "langString", "List", "first", "rest", "nil"],
);

pub const RDFS: Vocabulary = Vocabulary::new(
    "rdfs",
    "http://www.w3.org/2000/01/rdf-schema#",
    &[
        "Class",
        "Resource",
        "Literal",
        "label",
        "comment",
        "subClassOf",
        "subPropertyOf",
        "domain",
        "range",
        "seeAlso",
        "isDefinedBy",
    ],
);

pub const OWL: Vocabulary = Vocabulary::new(
    "owl",
    "http://www.w3.org/2002/07/owl#",
    &[
        "Class",
        "Thing",
        "ObjectProperty",
        "DatatypeProperty",
        "equivalentClass",
        "inverseOf",
        "sameAs",
        "Restriction",
        "onProperty",
    ],
);

pub const XSD: Vocabulary = Vocabulary::new(
    "xsd",
    "http://www.w3.org/2001/XMLSchema#",
    &[
        "string", "boolean", "integer", "int", "long", "decimal", "double", "float", "date",
        "dateTime", "anyURI",
    ],
);

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_SUB_CLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";

/// rdf:type as a named node
pub fn rdf_type() -> RdfResult<NamedNode> {
    NamedNode::new(RDF_TYPE)
}

/// rdfs:subClassOf as a named node
pub fn rdfs_sub_class_of() -> RdfResult<NamedNode> {
    NamedNode::new(RDFS_SUB_CLASS_OF)
}

/// Namespace manager with the built-in vocabularies registered
#[derive(Debug, Clone)]
pub struct NamespaceManager {
    /// Prefix → namespace IRI
    prefixes: IndexMap<String, String>,
}

impl NamespaceManager {
    /// Create a manager knowing rdf, rdfs, owl and xsd
    pub fn new() -> Self {
        let mut mgr = Self {
            prefixes: IndexMap::new(),
        };
        for vocabulary in [RDF, RDFS, OWL, XSD] {
            mgr.add_vocabulary(&vocabulary);
        }
        mgr
    }

    /// Add a prefix
    pub fn add_prefix(&mut self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.prefixes.insert(prefix.into(), iri.into());
    }

    /// Register a vocabulary under its preferred prefix
    pub fn add_vocabulary(&mut self, vocabulary: &Vocabulary) {
        self.add_prefix(vocabulary.prefix, vocabulary.namespace);
    }

    /// Get namespace IRI for a prefix
    pub fn get_iri(&self, prefix: &str) -> PrefixResult<&str> {
        self.prefixes
            .get(prefix)
            .map(|s| s.as_str())
            .ok_or_else(|| PrefixError::UnknownPrefix(prefix.to_string()))
    }

    /// Expand a compact IRI (prefix:local) to a full IRI
    ///
    /// Strings that already look like absolute IRIs are returned unchanged.
    pub fn expand(&self, compact_iri: &str) -> PrefixResult<String> {
        if compact_iri.contains("://") || compact_iri.starts_with("urn:") {
            return Ok(compact_iri.to_string());
        }
        match compact_iri.split_once(':') {
            Some((prefix, local)) => Ok(format!("{}{}", self.get_iri(prefix)?, local)),
            None => Err(PrefixError::InvalidIri(compact_iri.to_string())),
        }
    }

    /// Compact an IRI using the longest matching namespace
    pub fn compact(&self, iri: &str) -> Option<String> {
        self.prefixes
            .iter()
            .filter(|(_, namespace)| iri.starts_with(namespace.as_str()))
            .max_by_key(|(_, namespace)| namespace.len())
            .map(|(prefix, namespace)| format!("{}:{}", prefix, &iri[namespace.len()..]))
    }

    /// Registered (prefix, namespace) pairs in insertion order
    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.prefixes.iter().map(|(p, i)| (p.as_str(), i.as_str()))
    }
}

impl Default for NamespaceManager {
    fn default() -> Self {
        Self::new()
    }
}
