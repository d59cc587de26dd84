//! RDF type definitions
//!
//! Thin wrappers around the oxrdf primitives. Terms are totally ordered so
//! that mapped values, query results and trees come out deterministically.

use oxrdf::{BlankNode as OxBlankNode, Literal as OxLiteral, NamedNode as OxNamedNode};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

use super::namespace::{RDF_LANG_STRING, XSD};

/// RDF errors
#[derive(Error, Debug)]
pub enum RdfError {
    /// Invalid IRI
    #[error("Invalid IRI: {0}")]
    InvalidIri(String),

    /// Invalid blank node
    #[error("Invalid blank node: {0}")]
    InvalidBlankNode(String),

    /// Invalid literal
    #[error("Invalid literal: {0}")]
    InvalidLiteral(String),
}

pub type RdfResult<T> = Result<T, RdfError>;

/// Named node (IRI)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamedNode(OxNamedNode);

impl NamedNode {
    /// Create a new named node, validating the IRI
    pub fn new(iri: impl Into<String>) -> RdfResult<Self> {
        let iri = iri.into();
        OxNamedNode::new(iri.clone())
            .map(Self)
            .map_err(|e| RdfError::InvalidIri(format!("{iri}: {e}")))
    }

    /// Get the IRI string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Get the inner oxrdf NamedNode
    pub fn inner(&self) -> &OxNamedNode {
        &self.0
    }
}

impl fmt::Display for NamedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for NamedNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NamedNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl From<OxNamedNode> for NamedNode {
    fn from(node: OxNamedNode) -> Self {
        Self(node)
    }
}

/// Blank node (anonymous node)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlankNode(OxBlankNode);

impl BlankNode {
    /// Create a new blank node with a unique identifier
    pub fn new() -> Self {
        Self(OxBlankNode::default())
    }

    /// Create a blank node from an identifier
    pub fn from_id(id: &str) -> RdfResult<Self> {
        OxBlankNode::new(id)
            .map(Self)
            .map_err(|e| RdfError::InvalidBlankNode(e.to_string()))
    }

    /// Get the blank node identifier
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Default for BlankNode {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// RDF literal value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal(OxLiteral);

impl Literal {
    /// Create a simple literal (xsd:string)
    pub fn new_simple_literal(value: impl Into<String>) -> Self {
        Self(OxLiteral::new_simple_literal(value))
    }

    /// Create a literal with language tag
    pub fn new_language_tagged_literal(
        value: impl Into<String>,
        language: impl Into<String>,
    ) -> RdfResult<Self> {
        OxLiteral::new_language_tagged_literal(value, language)
            .map(Self)
            .map_err(|e| RdfError::InvalidLiteral(e.to_string()))
    }

    /// Create a typed literal
    pub fn new_typed_literal(value: impl Into<String>, datatype: NamedNode) -> Self {
        Self(OxLiteral::new_typed_literal(value, datatype.0))
    }

    /// Get the lexical value
    pub fn value(&self) -> &str {
        self.0.value()
    }

    /// Get the language tag if present
    pub fn language(&self) -> Option<&str> {
        self.0.language()
    }

    /// Datatype IRI as a string (rdf:langString for tagged literals)
    pub fn datatype_iri(&self) -> &str {
        if self.language().is_some() {
            RDF_LANG_STRING
        } else {
            self.0.datatype().as_str()
        }
    }

    /// Numeric value for xsd numeric datatypes
    pub fn as_f64(&self) -> Option<f64> {
        let datatype = self.datatype_iri();
        let numeric = ["integer", "decimal", "double", "float", "int", "long"]
            .iter()
            .any(|local| datatype.strip_prefix(XSD.namespace) == Some(*local));
        if numeric {
            self.value().parse().ok()
        } else {
            None
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialOrd for Literal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Numeric literals sort first, by value, then everything by lexical form
impl Ord for Literal {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_value = match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_value
            .then_with(|| self.value().cmp(other.value()))
            .then_with(|| self.datatype_iri().cmp(other.datatype_iri()))
            .then_with(|| self.language().cmp(&other.language()))
    }
}

impl From<OxLiteral> for Literal {
    fn from(lit: OxLiteral) -> Self {
        Self(lit)
    }
}

/// RDF subject (NamedNode or BlankNode)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfSubject {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
}

impl RdfSubject {
    /// The named node, if this subject is one
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            RdfSubject::NamedNode(n) => Some(n),
            RdfSubject::BlankNode(_) => None,
        }
    }
}

impl fmt::Display for RdfSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfSubject::NamedNode(n) => write!(f, "{}", n),
            RdfSubject::BlankNode(b) => write!(f, "{}", b),
        }
    }
}

impl From<NamedNode> for RdfSubject {
    fn from(node: NamedNode) -> Self {
        RdfSubject::NamedNode(node)
    }
}

impl From<BlankNode> for RdfSubject {
    fn from(node: BlankNode) -> Self {
        RdfSubject::BlankNode(node)
    }
}

/// RDF object (NamedNode, BlankNode, or Literal)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfObject {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
    /// Literal value
    Literal(Literal),
}

impl RdfObject {
    /// The named node, if this object is one
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            RdfObject::NamedNode(n) => Some(n),
            _ => None,
        }
    }

    /// The literal, if this object is one
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            RdfObject::Literal(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for RdfObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfObject::NamedNode(n) => write!(f, "{}", n),
            RdfObject::BlankNode(b) => write!(f, "{}", b),
            RdfObject::Literal(l) => write!(f, "{}", l),
        }
    }
}

impl From<NamedNode> for RdfObject {
    fn from(node: NamedNode) -> Self {
        RdfObject::NamedNode(node)
    }
}

impl From<BlankNode> for RdfObject {
    fn from(node: BlankNode) -> Self {
        RdfObject::BlankNode(node)
    }
}

impl From<Literal> for RdfObject {
    fn from(lit: Literal) -> Self {
        RdfObject::Literal(lit)
    }
}

/// RDF term (any RDF value), as bound to query variables
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RdfTerm {
    /// Named node (IRI)
    NamedNode(NamedNode),
    /// Blank node
    BlankNode(BlankNode),
    /// Literal value
    Literal(Literal),
}

impl RdfTerm {
    /// The named node, if this term is one
    pub fn as_named_node(&self) -> Option<&NamedNode> {
        match self {
            RdfTerm::NamedNode(n) => Some(n),
            _ => None,
        }
    }

    /// The literal, if this term is one
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            RdfTerm::Literal(l) => Some(l),
            _ => None,
        }
    }

    /// Subject view of this term (literals cannot be subjects)
    pub fn to_subject(&self) -> Option<RdfSubject> {
        match self {
            RdfTerm::NamedNode(n) => Some(RdfSubject::NamedNode(n.clone())),
            RdfTerm::BlankNode(b) => Some(RdfSubject::BlankNode(b.clone())),
            RdfTerm::Literal(_) => None,
        }
    }

    /// Object view of this term
    pub fn to_object(&self) -> RdfObject {
        match self {
            RdfTerm::NamedNode(n) => RdfObject::NamedNode(n.clone()),
            RdfTerm::BlankNode(b) => RdfObject::BlankNode(b.clone()),
            RdfTerm::Literal(l) => RdfObject::Literal(l.clone()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            RdfTerm::BlankNode(_) => 0,
            RdfTerm::NamedNode(_) => 1,
            RdfTerm::Literal(_) => 2,
        }
    }
}

impl fmt::Display for RdfTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdfTerm::NamedNode(n) => write!(f, "{}", n),
            RdfTerm::BlankNode(b) => write!(f, "{}", b),
            RdfTerm::Literal(l) => write!(f, "{}", l),
        }
    }
}

impl PartialOrd for RdfTerm {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// SPARQL ordering: blank nodes, then IRIs, then literals.
impl Ord for RdfTerm {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (RdfTerm::NamedNode(a), RdfTerm::NamedNode(b)) => a.cmp(b),
            (RdfTerm::BlankNode(a), RdfTerm::BlankNode(b)) => a.as_str().cmp(b.as_str()),
            (RdfTerm::Literal(a), RdfTerm::Literal(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<NamedNode> for RdfTerm {
    fn from(node: NamedNode) -> Self {
        RdfTerm::NamedNode(node)
    }
}

impl From<Literal> for RdfTerm {
    fn from(lit: Literal) -> Self {
        RdfTerm::Literal(lit)
    }
}

impl From<RdfSubject> for RdfTerm {
    fn from(subject: RdfSubject) -> Self {
        match subject {
            RdfSubject::NamedNode(n) => RdfTerm::NamedNode(n),
            RdfSubject::BlankNode(b) => RdfTerm::BlankNode(b),
        }
    }
}

impl From<RdfObject> for RdfTerm {
    fn from(object: RdfObject) -> Self {
        match object {
            RdfObject::NamedNode(n) => RdfTerm::NamedNode(n),
            RdfObject::BlankNode(b) => RdfTerm::BlankNode(b),
            RdfObject::Literal(l) => RdfTerm::Literal(l),
        }
    }
}

/// RDF triple (subject-predicate-object)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    pub subject: RdfSubject,
    pub predicate: NamedNode,
    pub object: RdfObject,
}

impl Triple {
    /// Create a new triple
    pub fn new(
        subject: impl Into<RdfSubject>,
        predicate: NamedNode,
        object: impl Into<RdfObject>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
        }
    }

    /// Place this triple in a graph
    pub fn in_graph(self, graph: Option<NamedNode>) -> Quad {
        Quad {
            subject: self.subject,
            predicate: self.predicate,
            object: self.object,
            graph,
        }
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// RDF quad (triple + named graph)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quad {
    pub subject: RdfSubject,
    pub predicate: NamedNode,
    pub object: RdfObject,
    /// Named graph (None = default graph)
    pub graph: Option<NamedNode>,
}

impl Quad {
    /// Create a new quad
    pub fn new(
        subject: impl Into<RdfSubject>,
        predicate: NamedNode,
        object: impl Into<RdfObject>,
        graph: Option<NamedNode>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate,
            object: object.into(),
            graph,
        }
    }

    /// Get the triple part (without graph)
    pub fn as_triple(&self) -> Triple {
        Triple {
            subject: self.subject.clone(),
            predicate: self.predicate.clone(),
            object: self.object.clone(),
        }
    }

    /// Sort key used wherever quads must be listed deterministically
    pub fn sort_key(&self) -> (Option<&str>, String, &str, RdfTerm) {
        (
            self.graph.as_ref().map(|g| g.as_str()),
            self.subject.to_string(),
            self.predicate.as_str(),
            RdfTerm::from(self.object.clone()),
        )
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(graph) = &self.graph {
            write!(
                f,
                "{} {} {} {} .",
                self.subject, self.predicate, self.object, graph
            )
        } else {
            write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
        }
    }
}

/// Which graphs a pattern looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphScope {
    /// Union of the default graph and every named graph
    Union,
    /// Only the default graph
    Default,
    /// One named graph
    Named(NamedNode),
}

impl GraphScope {
    /// Scope for an optional graph: `None` means the union
    pub fn from_graph(graph: Option<&NamedNode>) -> Self {
        match graph {
            Some(g) => GraphScope::Named(g.clone()),
            None => GraphScope::Union,
        }
    }

    /// Check whether a quad's graph is in scope
    pub fn contains(&self, graph: Option<&NamedNode>) -> bool {
        match self {
            GraphScope::Union => true,
            GraphScope::Default => graph.is_none(),
            GraphScope::Named(g) => graph == Some(g),
        }
    }
}

/// Quad pattern (None = wildcard)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuadPattern {
    pub subject: Option<RdfSubject>,
    pub predicate: Option<NamedNode>,
    pub object: Option<RdfObject>,
    pub graph: GraphScope,
}

impl QuadPattern {
    /// Pattern matching everything in every graph
    pub fn any() -> Self {
        Self {
            subject: None,
            predicate: None,
            object: None,
            graph: GraphScope::Union,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<RdfSubject>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_predicate(mut self, predicate: NamedNode) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_object(mut self, object: impl Into<RdfObject>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn in_scope(mut self, graph: GraphScope) -> Self {
        self.graph = graph;
        self
    }

    /// Check if a quad matches this pattern
    pub fn matches(&self, quad: &Quad) -> bool {
        if let Some(ref s) = self.subject {
            if s != &quad.subject {
                return false;
            }
        }
        if let Some(ref p) = self.predicate {
            if p != &quad.predicate {
                return false;
            }
        }
        if let Some(ref o) = self.object {
            if o != &quad.object {
                return false;
            }
        }
        self.graph.contains(quad.graph.as_ref())
    }
}
