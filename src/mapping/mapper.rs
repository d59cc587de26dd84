//! Instance ↔ quad conversion

use std::collections::BTreeSet;

use super::definition::FieldKind;
use super::descriptor::{PropertyDescriptor, ResourceDescriptor};
use super::instance::{FieldValue, ResourceInstance, Value};
use super::{MappingError, MappingResult, ValidationError};
use crate::rdf::namespace::RDF_TYPE;
use crate::rdf::{Literal, NamedNode, Quad, RdfObject, RdfSubject};

/// Converts instances of one mapped class to and from quads
pub struct ObjectMapper<'a> {
    descriptor: &'a ResourceDescriptor,
    default_language: &'a str,
}

impl<'a> ObjectMapper<'a> {
    pub fn new(descriptor: &'a ResourceDescriptor, default_language: &'a str) -> Self {
        Self {
            descriptor,
            default_language,
        }
    }

    /// Check field names, required fields and value kinds
    pub fn validate(&self, instance: &ResourceInstance) -> Result<(), ValidationError> {
        let type_name = self.descriptor.type_name();

        for (field, value) in &instance.fields {
            let property =
                self.descriptor
                    .property(field)
                    .ok_or_else(|| ValidationError::UnknownField {
                        type_name: type_name.to_string(),
                        field: field.clone(),
                    })?;
            if !property.is_list() && value.values().len() > 1 {
                return Err(ValidationError::InvalidValue {
                    type_name: type_name.to_string(),
                    field: field.clone(),
                    reason: format!("expected one value, found {}", value.values().len()),
                });
            }
            for v in value.values() {
                property
                    .check(v)
                    .map_err(|reason| ValidationError::InvalidValue {
                        type_name: type_name.to_string(),
                        field: field.clone(),
                        reason,
                    })?;
            }
        }

        let missing: Vec<String> = self
            .descriptor
            .required_fields()
            .filter(|p| instance.get(p.field()).map_or(true, FieldValue::is_empty))
            .map(|p| p.field().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingRequired {
                type_name: type_name.to_string(),
                fields: missing,
            });
        }
        Ok(())
    }

    /// Quads describing an instance: its type, then one quad per value
    pub fn to_quads(
        &self,
        instance: &ResourceInstance,
        graph: Option<&NamedNode>,
    ) -> MappingResult<Vec<Quad>> {
        let uri = instance
            .uri
            .as_ref()
            .ok_or_else(|| MappingError::MissingUri(self.descriptor.type_name().to_string()))?;
        let rdf_type = NamedNode::new(RDF_TYPE).map_err(|e| MappingError::InvalidValue {
            field: "rdfType".to_string(),
            reason: e.to_string(),
        })?;
        let class = instance
            .rdf_type
            .as_ref()
            .unwrap_or_else(|| self.descriptor.rdf_type());

        let mut quads = vec![Quad::new(uri.clone(), rdf_type, class.clone(), graph.cloned())];
        for property in self.descriptor.properties() {
            for value in instance.list(property.field()) {
                quads.push(self.value_quad(property, uri, value, graph)?);
            }
        }
        Ok(quads)
    }

    fn value_quad(
        &self,
        property: &PropertyDescriptor,
        uri: &NamedNode,
        value: &Value,
        graph: Option<&NamedNode>,
    ) -> MappingResult<Quad> {
        let predicate = property.predicate().clone();
        if property.is_inverse() {
            let subject = value.as_iri().ok_or_else(|| MappingError::InvalidValue {
                field: property.field().to_string(),
                reason: format!("inverse value {} is not an IRI", value),
            })?;
            return Ok(Quad::new(subject.clone(), predicate, uri.clone(), graph.cloned()));
        }

        let object = match value {
            Value::Literal(l) if property.is_label() && l.language().is_none() => {
                Literal::new_language_tagged_literal(l.value(), self.default_language)
                    .map(RdfObject::Literal)
                    .map_err(|e| MappingError::InvalidValue {
                        field: property.field().to_string(),
                        reason: e.to_string(),
                    })?
            }
            other => other.to_object(),
        };
        Ok(Quad::new(uri.clone(), predicate, object, graph.cloned()))
    }

    /// Rebuild an instance from the quads touching `uri`
    ///
    /// `quads` holds the subject's own quads plus the quads pointing at it
    /// for inverse properties. `language` overrides the default language for
    /// label selection.
    pub fn from_quads(
        &self,
        uri: &NamedNode,
        quads: &[Quad],
        language: Option<&str>,
    ) -> ResourceInstance {
        let language = language.unwrap_or(self.default_language);
        let mut instance = ResourceInstance::new(Some(uri.clone()));
        instance.rdf_type = self.concrete_type(uri, quads);

        for property in self.descriptor.properties() {
            let values = self.collect_values(property, uri, quads);
            if values.is_empty() {
                continue;
            }
            let value = if property.is_list() {
                FieldValue::List(values.into_iter().collect())
            } else if property.is_label() {
                match pick_label(&values, language) {
                    Some(v) => FieldValue::Single(v.clone()),
                    None => continue,
                }
            } else {
                match values.into_iter().next() {
                    Some(v) => FieldValue::Single(v),
                    None => continue,
                }
            };
            instance.fields.insert(property.field().to_string(), value);
        }
        instance
    }

    fn concrete_type(&self, uri: &NamedNode, quads: &[Quad]) -> Option<NamedNode> {
        let types: BTreeSet<&NamedNode> = quads
            .iter()
            .filter(|q| q.subject.as_named_node() == Some(uri) && q.predicate.as_str() == RDF_TYPE)
            .filter_map(|q| q.object.as_named_node())
            .collect();
        if types.contains(self.descriptor.rdf_type()) {
            Some(self.descriptor.rdf_type().clone())
        } else {
            types.into_iter().next().cloned()
        }
    }

    /// Sorted, deduplicated values of one property
    fn collect_values(
        &self,
        property: &PropertyDescriptor,
        uri: &NamedNode,
        quads: &[Quad],
    ) -> BTreeSet<Value> {
        let iri_valued = property.kind().is_iri_valued();
        quads
            .iter()
            .filter(|q| &q.predicate == property.predicate())
            .filter_map(|q| {
                if property.is_inverse() {
                    match (&q.subject, &q.object) {
                        (RdfSubject::NamedNode(s), RdfObject::NamedNode(o)) if o == uri => {
                            Some(Value::Iri(s.clone()))
                        }
                        _ => None,
                    }
                } else if q.subject.as_named_node() == Some(uri) {
                    Value::from_object(&q.object)
                } else {
                    None
                }
            })
            .filter(|v| v.as_iri().is_some() == iri_valued)
            .filter(|v| match property.kind() {
                FieldKind::Data(_) | FieldKind::DataList(_) => property.check(v).is_ok(),
                _ => true,
            })
            .collect()
    }
}

/// Requested language, then untagged, then anything
fn pick_label<'v>(values: &'v BTreeSet<Value>, language: &str) -> Option<&'v Value> {
    values
        .iter()
        .find(|v| v.language().is_some_and(|l| l.eq_ignore_ascii_case(language)))
        .or_else(|| values.iter().find(|v| v.language().is_none()))
        .or_else(|| values.iter().next())
}
