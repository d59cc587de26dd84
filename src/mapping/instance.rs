//! Instance values
//!
//! A [`ResourceInstance`] is the neutral form a mapped type converts to and
//! from: an optional URI, an optional concrete rdf:type and an ordered map of
//! field values.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use std::cmp::Ordering;
use std::fmt;

use crate::rdf::namespace::XSD;
use crate::rdf::{Literal, NamedNode, RdfObject, RdfResult, RdfTerm};

/// A single field value: a literal or a resource IRI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Literal(Literal),
    Iri(NamedNode),
}

impl Value {
    /// xsd:string literal
    pub fn string(value: impl Into<String>) -> Self {
        Value::Literal(Literal::new_simple_literal(value))
    }

    /// Language-tagged label
    pub fn label(value: impl Into<String>, language: &str) -> RdfResult<Self> {
        Literal::new_language_tagged_literal(value, language).map(Value::Literal)
    }

    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), "integer")
    }

    pub fn double(value: f64) -> Self {
        Self::typed(value.to_string(), "double")
    }

    pub fn boolean(value: bool) -> Self {
        Self::typed(value.to_string(), "boolean")
    }

    pub fn date(value: NaiveDate) -> Self {
        Self::typed(value.format("%Y-%m-%d").to_string(), "date")
    }

    pub fn date_time(value: DateTime<Utc>) -> Self {
        Self::typed(value.to_rfc3339(), "dateTime")
    }

    /// Resource reference
    pub fn iri(iri: &str) -> RdfResult<Self> {
        NamedNode::new(iri).map(Value::Iri)
    }

    fn typed(lexical: String, xsd_local: &str) -> Self {
        match NamedNode::new(XSD.iri(xsd_local)) {
            Ok(datatype) => Value::Literal(Literal::new_typed_literal(lexical, datatype)),
            Err(_) => Value::Literal(Literal::new_simple_literal(lexical)),
        }
    }

    /// Lexical form of a literal, or the IRI string
    pub fn as_str(&self) -> &str {
        match self {
            Value::Literal(l) => l.value(),
            Value::Iri(n) => n.as_str(),
        }
    }

    pub fn as_iri(&self) -> Option<&NamedNode> {
        match self {
            Value::Iri(n) => Some(n),
            Value::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Value::Literal(l) => Some(l),
            Value::Iri(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_literal().and_then(|l| l.value().parse().ok())
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_literal().and_then(|l| l.value().parse().ok())
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_literal().and_then(|l| match l.value() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        })
    }

    pub fn as_date_time(&self) -> Option<DateTime<Utc>> {
        self.as_literal()
            .and_then(|l| DateTime::parse_from_rfc3339(l.value()).ok())
            .map(|d| d.with_timezone(&Utc))
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        self.as_literal()
            .and_then(|l| NaiveDate::parse_from_str(l.value(), "%Y-%m-%d").ok())
    }

    /// Language tag of a label value
    pub fn language(&self) -> Option<&str> {
        self.as_literal().and_then(Literal::language)
    }

    pub fn to_object(&self) -> RdfObject {
        match self {
            Value::Literal(l) => RdfObject::Literal(l.clone()),
            Value::Iri(n) => RdfObject::NamedNode(n.clone()),
        }
    }

    pub fn to_term(&self) -> RdfTerm {
        match self {
            Value::Literal(l) => RdfTerm::Literal(l.clone()),
            Value::Iri(n) => RdfTerm::NamedNode(n.clone()),
        }
    }

    /// Value view of a stored object; blank nodes have none
    pub fn from_object(object: &RdfObject) -> Option<Self> {
        match object {
            RdfObject::Literal(l) => Some(Value::Literal(l.clone())),
            RdfObject::NamedNode(n) => Some(Value::Iri(n.clone())),
            RdfObject::BlankNode(_) => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_term())
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_term().cmp(&other.to_term())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::string(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::string(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::double(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::boolean(value)
    }
}

impl From<NamedNode> for Value {
    fn from(value: NamedNode) -> Self {
        Value::Iri(value)
    }
}

/// Literal datatypes a field can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    String,
    Integer,
    Decimal,
    Double,
    Boolean,
    Date,
    DateTime,
    /// Resource IRI without a mapped class
    Uri,
}

impl Datatype {
    /// xsd local names accepted for this datatype
    fn xsd_names(&self) -> &'static [&'static str] {
        match self {
            Datatype::String => &["string"],
            Datatype::Integer => &["integer", "int", "long"],
            Datatype::Decimal => &["decimal"],
            Datatype::Double => &["double", "float"],
            Datatype::Boolean => &["boolean"],
            Datatype::Date => &["date"],
            Datatype::DateTime => &["dateTime"],
            Datatype::Uri => &[],
        }
    }

    /// Whether values are IRIs rather than literals
    pub fn is_iri(&self) -> bool {
        matches!(self, Datatype::Uri)
    }

    /// Check a value against the datatype and its lexical space
    pub fn check(&self, value: &Value) -> Result<(), String> {
        let literal = match (self, value) {
            (Datatype::Uri, Value::Iri(_)) => return Ok(()),
            (Datatype::Uri, Value::Literal(l)) => {
                return Err(format!("expected an IRI, found literal {}", l))
            }
            (_, Value::Iri(n)) => return Err(format!("expected a literal, found IRI {}", n)),
            (_, Value::Literal(l)) => l,
        };

        let datatype = literal.datatype_iri();
        let accepted = self
            .xsd_names()
            .iter()
            .any(|local| datatype.strip_prefix(XSD.namespace) == Some(*local));
        if !accepted {
            return Err(format!("datatype {} does not match {:?}", datatype, self));
        }

        let lexical_ok = match self {
            Datatype::Integer => literal.value().parse::<i64>().is_ok(),
            Datatype::Decimal | Datatype::Double => literal.value().parse::<f64>().is_ok(),
            Datatype::Boolean => value.as_bool().is_some(),
            Datatype::Date => value.as_date().is_some(),
            Datatype::DateTime => value.as_date_time().is_some(),
            Datatype::String | Datatype::Uri => true,
        };
        if lexical_ok {
            Ok(())
        } else {
            Err(format!("'{}' is not a valid {:?}", literal.value(), self))
        }
    }
}

/// Value of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Single(Value),
    List(Vec<Value>),
}

impl FieldValue {
    /// All values, one for `Single`
    pub fn values(&self) -> &[Value] {
        match self {
            FieldValue::Single(v) => std::slice::from_ref(v),
            FieldValue::List(values) => values,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

/// Ordered field name → value map
pub type FieldMap = IndexMap<String, FieldValue>;

/// Neutral form of a mapped object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceInstance {
    pub uri: Option<NamedNode>,
    /// Concrete rdf:type when it is a subclass of the mapped class
    pub rdf_type: Option<NamedNode>,
    pub fields: FieldMap,
}

impl ResourceInstance {
    pub fn new(uri: Option<NamedNode>) -> Self {
        Self {
            uri,
            rdf_type: None,
            fields: FieldMap::new(),
        }
    }

    /// Set a single-valued field
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> &mut Self {
        self.fields
            .insert(field.to_string(), FieldValue::Single(value.into()));
        self
    }

    /// Set a single-valued field when a value is present
    pub fn set_opt<V: Into<Value>>(&mut self, field: &str, value: Option<V>) -> &mut Self {
        if let Some(value) = value {
            self.set(field, value);
        }
        self
    }

    /// Set a list field
    pub fn set_list<V: Into<Value>>(
        &mut self,
        field: &str,
        values: impl IntoIterator<Item = V>,
    ) -> &mut Self {
        let values = values.into_iter().map(Into::into).collect();
        self.fields
            .insert(field.to_string(), FieldValue::List(values));
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// First value of a field
    pub fn single(&self, field: &str) -> Option<&Value> {
        self.get(field).and_then(|v| v.values().first())
    }

    /// All values of a field, empty when absent
    pub fn list(&self, field: &str) -> &[Value] {
        self.get(field).map(FieldValue::values).unwrap_or(&[])
    }

    pub fn string(&self, field: &str) -> Option<String> {
        self.single(field).map(|v| v.as_str().to_string())
    }

    pub fn iri(&self, field: &str) -> Option<NamedNode> {
        self.single(field).and_then(Value::as_iri).cloned()
    }

    pub fn iris(&self, field: &str) -> Vec<NamedNode> {
        self.list(field)
            .iter()
            .filter_map(Value::as_iri)
            .cloned()
            .collect()
    }
}
