//! Object mapping
//!
//! Types implementing [`SparqlResource`] declare a [`ResourceDefinition`];
//! the [`DescriptorRegistry`] turns each definition into a validated
//! [`ResourceDescriptor`] once, and [`ObjectMapper`] / [`QueryTranslator`]
//! use descriptors to move instances in and out of the graph store.

mod definition;
mod descriptor;
mod instance;
mod mapper;
mod query;
mod registry;
pub mod uri;

pub use definition::{FieldKind, PropertyDefinition, ResourceDefinition, SparqlResource, TargetRef};
pub use descriptor::{
    DescriptorError, DescriptorResult, PropertyDescriptor, ResourceDescriptor, RESERVED_FIELDS,
};
pub use instance::{Datatype, FieldMap, FieldValue, ResourceInstance, Value};
pub use mapper::ObjectMapper;
pub use query::{
    ask_uri_used, QueryTranslator, SearchFilter, SearchRequest, SortField, COUNT_VAR, TYPE_VAR,
    URI_VAR,
};
pub use registry::DescriptorRegistry;
pub use uri::{FieldUriGenerator, UriError, UriGenerator, UriResult, UuidUriGenerator};

use thiserror::Error;

/// Conversion errors between objects and instances
#[derive(Error, Debug)]
pub enum MappingError {
    #[error("{type_name}: field '{field}' is missing")]
    MissingField { type_name: String, field: String },

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{0}: instance has no URI")]
    MissingUri(String),
}

pub type MappingResult<T> = Result<T, MappingError>;

/// Instance rejected before any write
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{type_name}: instance has no URI")]
    MissingUri { type_name: String },

    #[error("{type_name}: required fields without value: {}", fields.join(", "))]
    MissingRequired {
        type_name: String,
        fields: Vec<String>,
    },

    #[error("{type_name}: field '{field}': {reason}")]
    InvalidValue {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("{type_name}: unknown field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("{type_name}: {rdf_type} is not {expected} or one of its subclasses")]
    UnexpectedType {
        type_name: String,
        rdf_type: String,
        expected: String,
    },
}
