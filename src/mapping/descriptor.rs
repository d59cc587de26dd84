//! Class descriptors
//!
//! A [`ResourceDescriptor`] is the validated, resolved form of a
//! [`ResourceDefinition`]: IRIs instead of local names, the generator
//! instance instead of its name, and an index from field names to property
//! descriptors. It is built once per type (see
//! [`super::DescriptorRegistry`]) and shared behind an `Arc`.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use super::definition::{FieldKind, ResourceDefinition};
use super::instance::{Datatype, Value};
use super::uri::UriGenerator;
use crate::config::MapperConfig;
use crate::rdf::NamedNode;

/// Names the query translator binds itself
pub const RESERVED_FIELDS: &[&str] = &["uri", "rdfType", "count"];

/// Descriptor build errors
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("{type_name}: no ontology declared")]
    MissingOntology { type_name: String },

    #[error("{type_name}: no resource local name declared")]
    MissingResource { type_name: String },

    #[error("{type_name}: term '{term}' is not defined by ontology '{ontology}'")]
    UnknownTerm {
        type_name: String,
        ontology: String,
        term: String,
    },

    #[error("{type_name}: field '{field}' is declared twice")]
    DuplicateField { type_name: String, field: String },

    #[error("{type_name}: property {predicate} is bound to more than one field")]
    DuplicateProperty { type_name: String, predicate: String },

    #[error("{type_name}: '{field}' is not a usable field name")]
    InvalidFieldName { type_name: String, field: String },

    #[error("{type_name}: unknown URI generator '{generator}'")]
    UnknownGenerator { type_name: String, generator: String },

    #[error("{type_name}: URI generator '{generator}' reads undeclared field '{field}'")]
    GeneratorField {
        type_name: String,
        generator: String,
        field: String,
    },

    #[error("{type_name}: field '{field}' is a literal and cannot be inverse")]
    InverseLiteral { type_name: String, field: String },

    #[error("{type_name}: field '{field}' is not an object property and cannot cascade deletes")]
    CascadeOnLiteral { type_name: String, field: String },

    #[error("{type_name}: graph '{graph}' is not a valid IRI or path segment")]
    InvalidGraph { type_name: String, graph: String },

    #[error("{type_name}: field '{field}' targets an invalid type: {source}")]
    InvalidTarget {
        type_name: String,
        field: String,
        #[source]
        source: Box<DescriptorError>,
    },

    #[error("Descriptor registry lock poisoned")]
    Poisoned,
}

pub type DescriptorResult<T> = Result<T, DescriptorError>;

/// Resolved property of a mapped class
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    field: String,
    predicate: NamedNode,
    kind: FieldKind,
    /// rdf:type of the target class for object properties
    target_type: Option<NamedNode>,
    required: bool,
    inverse: bool,
    cascade_delete: bool,
    ignore_update_if_null: bool,
}

impl PropertyDescriptor {
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn predicate(&self) -> &NamedNode {
        &self.predicate
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn target_type(&self) -> Option<&NamedNode> {
        self.target_type.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    pub fn cascades_delete(&self) -> bool {
        self.cascade_delete
    }

    pub fn ignores_update_if_null(&self) -> bool {
        self.ignore_update_if_null
    }

    pub fn is_list(&self) -> bool {
        self.kind.is_list()
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, FieldKind::Label)
    }

    /// Check one value against the field kind
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match &self.kind {
            FieldKind::Data(datatype) | FieldKind::DataList(datatype) => datatype.check(value),
            FieldKind::Label => match value {
                Value::Literal(_) if value.language().is_some() => Ok(()),
                Value::Literal(_) => Datatype::String.check(value),
                Value::Iri(n) => Err(format!("expected a label, found IRI {}", n)),
            },
            FieldKind::Object(_) | FieldKind::ObjectList(_) => Datatype::Uri.check(value),
        }
    }
}

/// Resolved mapping of one class
pub struct ResourceDescriptor {
    type_id: TypeId,
    type_name: String,
    rdf_type: NamedNode,
    resource_name: String,
    graph: Option<String>,
    prefix: Option<String>,
    generator_name: String,
    generator: Arc<dyn UriGenerator>,
    properties: Vec<PropertyDescriptor>,
    by_field: HashMap<String, usize>,
}

impl std::fmt::Debug for ResourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceDescriptor")
            .field("type_name", &self.type_name)
            .field("rdf_type", &self.rdf_type)
            .field("graph", &self.graph)
            .field("generator", &self.generator_name)
            .field("properties", &self.properties)
            .finish()
    }
}

/// Resolve the class IRI of a definition
pub(crate) fn resolve_class(definition: &ResourceDefinition) -> DescriptorResult<NamedNode> {
    let type_name = definition.type_name.clone();
    let ontology = definition
        .ontology
        .ok_or_else(|| DescriptorError::MissingOntology {
            type_name: type_name.clone(),
        })?;
    let resource = definition
        .resource
        .as_deref()
        .ok_or_else(|| DescriptorError::MissingResource {
            type_name: type_name.clone(),
        })?;
    ontology
        .term(resource)
        .ok_or_else(|| DescriptorError::UnknownTerm {
            type_name,
            ontology: ontology.namespace.to_string(),
            term: resource.to_string(),
        })
}

fn is_absolute_iri(value: &str) -> bool {
    oxiri::Iri::parse(value).is_ok()
}

fn is_variable_name(field: &str) -> bool {
    let mut chars = field.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl ResourceDescriptor {
    /// Validate a definition and resolve it
    ///
    /// `generators` resolves generator names to instances.
    pub fn build<G>(
        type_id: TypeId,
        definition: ResourceDefinition,
        generators: G,
    ) -> DescriptorResult<Self>
    where
        G: Fn(&str) -> Option<Arc<dyn UriGenerator>>,
    {
        let type_name = definition.type_name.clone();
        let rdf_type = resolve_class(&definition)?;
        let resource_name = definition.resource.clone().unwrap_or_default();

        if let Some(graph) = &definition.graph {
            let valid = if is_absolute_iri(graph) {
                NamedNode::new(graph.as_str()).is_ok()
            } else {
                !graph.is_empty() && NamedNode::new(format!("http://localhost/{graph}")).is_ok()
            };
            if !valid {
                return Err(DescriptorError::InvalidGraph {
                    type_name,
                    graph: graph.clone(),
                });
            }
        }

        let mut properties = Vec::with_capacity(definition.properties.len());
        let mut by_field = HashMap::new();
        let mut bindings = HashSet::new();

        for property in definition.properties {
            let field = property.field.clone();
            if !is_variable_name(&field) || RESERVED_FIELDS.contains(&field.as_str()) {
                return Err(DescriptorError::InvalidFieldName { type_name, field });
            }
            if by_field.contains_key(&field) {
                return Err(DescriptorError::DuplicateField { type_name, field });
            }

            let predicate = property
                .ontology
                .term(&property.property)
                .ok_or_else(|| DescriptorError::UnknownTerm {
                    type_name: type_name.clone(),
                    ontology: property.ontology.namespace.to_string(),
                    term: property.property.clone(),
                })?;
            if !bindings.insert((predicate.clone(), property.inverse)) {
                return Err(DescriptorError::DuplicateProperty {
                    type_name,
                    predicate: predicate.to_string(),
                });
            }

            if property.inverse && !property.kind.is_iri_valued() {
                return Err(DescriptorError::InverseLiteral { type_name, field });
            }
            if property.cascade_delete && property.kind.target().is_none() {
                return Err(DescriptorError::CascadeOnLiteral { type_name, field });
            }

            let target_type = match property.kind.target() {
                Some(target) => Some(resolve_class(&target.definition()).map_err(|source| {
                    DescriptorError::InvalidTarget {
                        type_name: type_name.clone(),
                        field: field.clone(),
                        source: Box::new(source),
                    }
                })?),
                None => None,
            };

            by_field.insert(field.clone(), properties.len());
            properties.push(PropertyDescriptor {
                field,
                predicate,
                kind: property.kind,
                target_type,
                required: property.required,
                inverse: property.inverse,
                cascade_delete: property.cascade_delete,
                ignore_update_if_null: property.ignore_update_if_null,
            });
        }

        let generator_name = definition.uri_generator.clone();
        let generator =
            generators(&generator_name).ok_or_else(|| DescriptorError::UnknownGenerator {
                type_name: type_name.clone(),
                generator: generator_name.clone(),
            })?;
        if let Some(field) = generator.required_field() {
            if !by_field.contains_key(field) {
                return Err(DescriptorError::GeneratorField {
                    type_name,
                    generator: generator_name,
                    field: field.to_string(),
                });
            }
        }

        debug!(
            "Built descriptor for {} ({}, {} properties)",
            type_name,
            rdf_type,
            properties.len()
        );

        Ok(Self {
            type_id,
            type_name,
            rdf_type,
            resource_name,
            graph: definition.graph,
            prefix: definition.prefix,
            generator_name,
            generator,
            properties,
            by_field,
        })
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// rdf:type IRI of the class
    pub fn rdf_type(&self) -> &NamedNode {
        &self.rdf_type
    }

    pub fn generator(&self) -> &dyn UriGenerator {
        self.generator.as_ref()
    }

    pub fn generator_name(&self) -> &str {
        &self.generator_name
    }

    /// Properties in declaration order
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, field: &str) -> Option<&PropertyDescriptor> {
        self.by_field.get(field).map(|&i| &self.properties[i])
    }

    /// Fields that must hold a value
    pub fn required_fields(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.required)
    }

    /// Predicates written by this mapping, rdf:type excluded
    pub fn managed_predicates(&self) -> Vec<(&NamedNode, bool)> {
        self.properties
            .iter()
            .map(|p| (&p.predicate, p.inverse))
            .collect()
    }

    /// Default graph of the class
    ///
    /// Absolute graphs are used as-is; relative ones live under
    /// `{base_graph_uri}{keyword}/`. Classes without a graph use the store's
    /// default graph.
    pub fn default_graph(&self, config: &MapperConfig) -> DescriptorResult<Option<NamedNode>> {
        let Some(graph) = &self.graph else {
            return Ok(None);
        };
        let iri = if is_absolute_iri(graph) {
            graph.clone()
        } else {
            format!("{}{}/{}", config.base_graph(), config.default_graph_keyword, graph)
        };
        NamedNode::new(iri)
            .map(Some)
            .map_err(|_| DescriptorError::InvalidGraph {
                type_name: self.type_name.clone(),
                graph: graph.clone(),
            })
    }

    /// Prefix handed to the URI generator
    pub fn generation_prefix(&self, config: &MapperConfig) -> String {
        let base = config.generation_prefix.trim_end_matches('/');
        match (&self.prefix, &self.graph) {
            (Some(prefix), _) if is_absolute_iri(prefix) => prefix.clone(),
            (Some(prefix), _) => format!("{}/{}", base, prefix),
            (None, Some(graph)) if is_absolute_iri(graph) => graph.clone(),
            (None, Some(graph)) => format!("{}/{}", base, graph),
            (None, None) => format!("{}/{}", base, self.resource_name.to_lowercase()),
        }
    }
}
