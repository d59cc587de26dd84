//! Declarative class and property definitions
//!
//! A mapped type describes itself once through [`SparqlResource::definition`].
//! The definition is plain data; [`super::ResourceDescriptor::build`] checks
//! it against the referenced vocabularies and the generator registry.
//!
//! ```rust
//! use silex_sparql::mapping::{Datatype, PropertyDefinition, ResourceDefinition};
//! use silex_sparql::rdf::namespace::RDFS;
//! use silex_sparql::rdf::Vocabulary;
//!
//! const VOCAB: Vocabulary = Vocabulary::new("ex", "http://example.org/vocab#", &["Plot", "hasArea"]);
//!
//! let definition = ResourceDefinition::new("Plot")
//!     .ontology(VOCAB)
//!     .resource("Plot")
//!     .graph("plot")
//!     .uri_generator("name")
//!     .property(PropertyDefinition::data("name", RDFS, "label", Datatype::String).required())
//!     .property(PropertyDefinition::data("area", VOCAB, "hasArea", Datatype::Double));
//! assert_eq!(definition.properties().len(), 2);
//! ```

use std::any::TypeId;
use std::fmt;

use super::instance::{Datatype, ResourceInstance};
use super::MappingResult;
use crate::rdf::{NamedNode, Vocabulary};

/// A type persisted as RDF resources
pub trait SparqlResource: Sized + 'static {
    /// Class-level mapping definition
    fn definition() -> ResourceDefinition;

    fn uri(&self) -> Option<&NamedNode>;

    fn set_uri(&mut self, uri: NamedNode);

    /// Field values of this object
    fn to_instance(&self) -> ResourceInstance;

    /// Rebuild an object from loaded field values
    fn from_instance(instance: ResourceInstance) -> MappingResult<Self>;
}

/// Reference to another mapped type, used by object properties
#[derive(Clone, Copy)]
pub struct TargetRef {
    type_id: TypeId,
    type_name: &'static str,
    definition: fn() -> ResourceDefinition,
}

impl TargetRef {
    pub fn of<T: SparqlResource>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            definition: T::definition,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn definition(&self) -> ResourceDefinition {
        (self.definition)()
    }
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TargetRef").field(&self.type_name).finish()
    }
}

impl PartialEq for TargetRef {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TargetRef {}

/// Shape of a field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Data(Datatype),
    DataList(Datatype),
    /// Language-tagged string
    Label,
    Object(TargetRef),
    ObjectList(TargetRef),
}

impl FieldKind {
    pub fn is_list(&self) -> bool {
        matches!(self, FieldKind::DataList(_) | FieldKind::ObjectList(_))
    }

    /// Whether stored values are IRIs
    pub fn is_iri_valued(&self) -> bool {
        match self {
            FieldKind::Data(d) | FieldKind::DataList(d) => d.is_iri(),
            FieldKind::Label => false,
            FieldKind::Object(_) | FieldKind::ObjectList(_) => true,
        }
    }

    pub fn target(&self) -> Option<&TargetRef> {
        match self {
            FieldKind::Object(t) | FieldKind::ObjectList(t) => Some(t),
            _ => None,
        }
    }
}

/// One persisted field
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    pub(crate) field: String,
    pub(crate) ontology: Vocabulary,
    pub(crate) property: String,
    pub(crate) kind: FieldKind,
    pub(crate) required: bool,
    pub(crate) inverse: bool,
    pub(crate) cascade_delete: bool,
    pub(crate) ignore_update_if_null: bool,
}

impl PropertyDefinition {
    fn new(field: &str, ontology: Vocabulary, property: &str, kind: FieldKind) -> Self {
        Self {
            field: field.to_string(),
            ontology,
            property: property.to_string(),
            kind,
            required: false,
            inverse: false,
            cascade_delete: false,
            ignore_update_if_null: false,
        }
    }

    /// Single literal (or plain IRI with [`Datatype::Uri`])
    pub fn data(field: &str, ontology: Vocabulary, property: &str, datatype: Datatype) -> Self {
        Self::new(field, ontology, property, FieldKind::Data(datatype))
    }

    pub fn data_list(field: &str, ontology: Vocabulary, property: &str, datatype: Datatype) -> Self {
        Self::new(field, ontology, property, FieldKind::DataList(datatype))
    }

    /// Language-tagged label
    pub fn label(field: &str, ontology: Vocabulary, property: &str) -> Self {
        Self::new(field, ontology, property, FieldKind::Label)
    }

    /// Reference to another mapped resource
    pub fn object<T: SparqlResource>(field: &str, ontology: Vocabulary, property: &str) -> Self {
        Self::new(field, ontology, property, FieldKind::Object(TargetRef::of::<T>()))
    }

    pub fn object_list<T: SparqlResource>(
        field: &str,
        ontology: Vocabulary,
        property: &str,
    ) -> Self {
        Self::new(field, ontology, property, FieldKind::ObjectList(TargetRef::of::<T>()))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Stored as `value property subject` instead of `subject property value`
    pub fn inverse(mut self) -> Self {
        self.inverse = true;
        self
    }

    /// Delete referenced resources together with the owner
    pub fn cascade_delete(mut self) -> Self {
        self.cascade_delete = true;
        self
    }

    /// Keep stored values when an update leaves the field empty
    pub fn ignore_update_if_null(mut self) -> Self {
        self.ignore_update_if_null = true;
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }
}

/// Class-level definition
#[derive(Debug, Clone)]
pub struct ResourceDefinition {
    pub(crate) type_name: String,
    pub(crate) ontology: Option<Vocabulary>,
    pub(crate) resource: Option<String>,
    pub(crate) graph: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) uri_generator: String,
    pub(crate) properties: Vec<PropertyDefinition>,
}

impl ResourceDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ontology: None,
            resource: None,
            graph: None,
            prefix: None,
            uri_generator: "uuid".to_string(),
            properties: Vec::new(),
        }
    }

    /// Definition named after a Rust type
    pub fn of<T: 'static>() -> Self {
        let full = std::any::type_name::<T>();
        Self::new(full.rsplit("::").next().unwrap_or(full))
    }

    pub fn ontology(mut self, ontology: Vocabulary) -> Self {
        self.ontology = Some(ontology);
        self
    }

    /// Local name of the class in the ontology
    pub fn resource(mut self, local_name: &str) -> Self {
        self.resource = Some(local_name.to_string());
        self
    }

    /// Default graph, relative to the base graph or absolute
    pub fn graph(mut self, graph: &str) -> Self {
        self.graph = Some(graph.to_string());
        self
    }

    /// URI path segment used instead of the graph name when generating URIs
    pub fn prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_string());
        self
    }

    /// Registered generator name
    pub fn uri_generator(mut self, name: &str) -> Self {
        self.uri_generator = name.to_string();
        self
    }

    pub fn property(mut self, property: PropertyDefinition) -> Self {
        self.properties.push(property);
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }
}
