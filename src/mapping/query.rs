//! Query translation
//!
//! Turns a [`SearchRequest`] against one mapped class into SPARQL algebra,
//! and instances into change sets. Instance patterns are placed in
//! `GRAPH <g>` when a graph is given; the class hierarchy
//! (`?rdfType rdfs:subClassOf* <class>`) is always matched across graphs.

use regex::RegexBuilder;

use super::descriptor::{PropertyDescriptor, ResourceDescriptor};
use super::instance::{FieldValue, ResourceInstance, Value};
use super::mapper::ObjectMapper;
use super::{MappingError, MappingResult};
use crate::rdf::namespace::{RDFS_SUB_CLASS_OF, RDF_TYPE};
use crate::rdf::{ChangeSet, GraphScope, NamedNode, Quad, QuadPattern, RdfObject, RdfTerm};
use crate::sparql::{
    AskQuery, Expression, GraphPattern, OrderCondition, PredicatePattern, Projection, QueryError,
    QueryResult, SelectQuery, TermPattern,
};

/// Variable bound to the resource URI
pub const URI_VAR: &str = "uri";
/// Variable bound to the concrete rdf:type
pub const TYPE_VAR: &str = "rdfType";
/// Alias of the count projection
pub const COUNT_VAR: &str = "count";

/// Search condition on one field
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    Equals { field: String, value: Value },
    In { field: String, values: Vec<Value> },
    Regex {
        field: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// Restrict to the given resources
    Uris(Vec<NamedNode>),
}

impl SearchFilter {
    pub fn equals(field: &str, value: impl Into<Value>) -> Self {
        SearchFilter::Equals {
            field: field.to_string(),
            value: value.into(),
        }
    }

    /// Case-insensitive regex
    pub fn regex(field: &str, pattern: &str) -> Self {
        SearchFilter::Regex {
            field: field.to_string(),
            pattern: pattern.to_string(),
            case_insensitive: true,
        }
    }
}

/// Ordering on one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

impl SortField {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }
}

/// Filters, ordering and paging of a search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchRequest {
    pub filters: Vec<SearchFilter>,
    pub order_by: Vec<SortField>,
    /// Zero-based page index
    pub page: usize,
    /// None returns every match
    pub page_size: Option<usize>,
    /// Preferred label language (None = configured default)
    pub language: Option<String>,
}

impl SearchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: SearchFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, sort: SortField) -> Self {
        self.order_by.push(sort);
        self
    }

    pub fn page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = Some(page_size);
        self
    }

    pub fn language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }
}

/// Query and change-set builder for one mapped class
pub struct QueryTranslator<'a> {
    descriptor: &'a ResourceDescriptor,
    default_language: &'a str,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(descriptor: &'a ResourceDescriptor, default_language: &'a str) -> Self {
        Self {
            descriptor,
            default_language,
        }
    }

    /// Rows of `?uri ?rdfType` plus every single-valued field
    pub fn select(
        &self,
        request: &SearchRequest,
        graph: Option<&NamedNode>,
    ) -> QueryResult<SelectQuery> {
        let mut variables = vec![URI_VAR.to_string(), TYPE_VAR.to_string()];
        variables.extend(
            self.descriptor
                .properties()
                .iter()
                .filter(|p| !p.is_list())
                .map(|p| p.field().to_string()),
        );
        self.paged(variables, request, graph)
    }

    /// Distinct URIs of one page, in request order
    pub fn select_uris(
        &self,
        request: &SearchRequest,
        graph: Option<&NamedNode>,
    ) -> QueryResult<SelectQuery> {
        self.paged(vec![URI_VAR.to_string()], request, graph)
    }

    /// `COUNT(DISTINCT ?uri)` over every match
    pub fn count(
        &self,
        request: &SearchRequest,
        graph: Option<&NamedNode>,
    ) -> QueryResult<SelectQuery> {
        let mut query = SelectQuery::distinct(Vec::new(), self.where_clause(request, graph)?);
        query.distinct = false;
        query.projection = Projection::CountDistinct {
            variable: URI_VAR.to_string(),
            alias: COUNT_VAR.to_string(),
        };
        Ok(query)
    }

    /// Whether `uri` is typed with the class or one of its subclasses
    pub fn ask_uri_exists(&self, uri: &NamedNode, graph: Option<&NamedNode>) -> AskQuery {
        let typed = GraphPattern::triple(
            TermPattern::iri(uri),
            PredicatePattern::Iri(rdf_type()),
            TermPattern::var(TYPE_VAR),
        );
        AskQuery::new(vec![
            in_graph(graph, vec![typed]),
            self.class_hierarchy(TermPattern::var(TYPE_VAR)),
        ])
    }

    /// Whether `rdf_type` is the class or one of its subclasses
    pub fn ask_is_subclass(&self, rdf_type: &NamedNode) -> AskQuery {
        AskQuery::new(vec![self.class_hierarchy(TermPattern::iri(rdf_type))])
    }

    /// Quad patterns covering everything stored about `uri`
    ///
    /// Its own quads plus the quads pointing at it, which carry inverse
    /// properties.
    pub fn resource_patterns(uri: &NamedNode, graph: Option<&NamedNode>) -> [QuadPattern; 2] {
        let scope = scope(graph);
        [
            QuadPattern::any()
                .with_subject(uri.clone())
                .in_scope(scope.clone()),
            QuadPattern::any().with_object(uri.clone()).in_scope(scope),
        ]
    }

    /// Change set creating an instance
    pub fn insert(
        &self,
        instance: &ResourceInstance,
        graph: Option<&NamedNode>,
    ) -> MappingResult<ChangeSet> {
        let mut changes = ChangeSet::new();
        for quad in self.mapper().to_quads(instance, graph)? {
            changes.insert(quad);
        }
        Ok(changes)
    }

    /// Change set removing a resource given what is stored about it
    pub fn delete(stored: &[Quad]) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for quad in stored {
            changes.delete(quad.clone());
        }
        changes
    }

    /// Change set replacing stored values with the new instance's
    ///
    /// Only predicates managed by the mapping are touched. Fields flagged
    /// `ignore_update_if_null` keep their stored values when the new
    /// instance leaves them empty.
    pub fn update(
        &self,
        stored: &[Quad],
        instance: &ResourceInstance,
        graph: Option<&NamedNode>,
    ) -> MappingResult<ChangeSet> {
        let uri = instance
            .uri
            .as_ref()
            .ok_or_else(|| MappingError::MissingUri(self.descriptor.type_name().into()))?;

        let replaced: Vec<&PropertyDescriptor> = self
            .descriptor
            .properties()
            .iter()
            .filter(|p| {
                !(p.ignores_update_if_null()
                    && instance.get(p.field()).map_or(true, FieldValue::is_empty))
            })
            .collect();

        let mut changes = ChangeSet::new();
        for quad in stored {
            let own = quad.subject.as_named_node() == Some(uri);
            let pointing = matches!(&quad.object, RdfObject::NamedNode(o) if o == uri);
            let managed = (own && quad.predicate.as_str() == RDF_TYPE)
                || replaced.iter().any(|p| {
                    &quad.predicate == p.predicate()
                        && if p.is_inverse() { pointing } else { own }
                });
            if managed {
                changes.delete(quad.clone());
            }
        }

        for quad in self.mapper().to_quads(instance, graph)? {
            changes.insert(quad);
        }
        Ok(changes)
    }

    fn mapper(&self) -> ObjectMapper<'_> {
        ObjectMapper::new(self.descriptor, self.default_language)
    }

    fn paged(
        &self,
        variables: Vec<String>,
        request: &SearchRequest,
        graph: Option<&NamedNode>,
    ) -> QueryResult<SelectQuery> {
        let mut query = SelectQuery::distinct(variables, self.where_clause(request, graph)?);
        query.order_by = self.order(request)?;
        if let Some(size) = request.page_size {
            query.limit = Some(size);
            query.offset = Some(request.page.saturating_mul(size));
        }
        Ok(query)
    }

    fn where_clause(
        &self,
        request: &SearchRequest,
        graph: Option<&NamedNode>,
    ) -> QueryResult<Vec<GraphPattern>> {
        let language = request
            .language
            .as_deref()
            .unwrap_or(self.default_language);

        let mut instance = vec![GraphPattern::triple(
            TermPattern::var(URI_VAR),
            PredicatePattern::Iri(rdf_type()),
            TermPattern::var(TYPE_VAR),
        )];
        for property in self.descriptor.properties().iter().filter(|p| !p.is_list()) {
            let pattern = property_pattern(property);
            if property.is_label() {
                instance.push(GraphPattern::Optional(vec![
                    pattern,
                    GraphPattern::Filter(Expression::LangMatches {
                        variable: property.field().to_string(),
                        language: language.to_string(),
                    }),
                ]));
            } else if property.is_required() {
                instance.push(pattern);
            } else {
                instance.push(GraphPattern::Optional(vec![pattern]));
            }
        }

        let mut filters = Vec::new();
        let mut list_fields: Vec<&str> = Vec::new();
        for filter in &request.filters {
            let field = match filter {
                SearchFilter::Equals { field, .. }
                | SearchFilter::In { field, .. }
                | SearchFilter::Regex { field, .. } => Some(field.as_str()),
                SearchFilter::Uris(_) => None,
            };
            if let Some(property) = field.and_then(|f| self.descriptor.property(f)) {
                if property.is_list() && !list_fields.contains(&property.field()) {
                    list_fields.push(property.field());
                    instance.push(property_pattern(property));
                }
            }
            filters.push(GraphPattern::Filter(self.filter_expression(filter)?));
        }

        let mut patterns = vec![
            in_graph(graph, instance),
            self.class_hierarchy(TermPattern::var(TYPE_VAR)),
            GraphPattern::Filter(Expression::Not(Box::new(Expression::IsBlank(
                URI_VAR.to_string(),
            )))),
        ];
        patterns.extend(filters);
        Ok(patterns)
    }

    fn filter_expression(&self, filter: &SearchFilter) -> QueryResult<Expression> {
        Ok(match filter {
            SearchFilter::Equals { field, value } => Expression::Equal(
                TermPattern::var(self.variable(field)?),
                TermPattern::Term(value.to_term()),
            ),
            SearchFilter::In { field, values } => Expression::In(
                TermPattern::var(self.variable(field)?),
                values.iter().map(Value::to_term).collect(),
            ),
            SearchFilter::Regex {
                field,
                pattern,
                case_insensitive,
            } => {
                RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| QueryError::InvalidRegex {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?;
                Expression::Regex {
                    variable: self.variable(field)?,
                    pattern: pattern.clone(),
                    case_insensitive: *case_insensitive,
                }
            }
            SearchFilter::Uris(uris) => Expression::In(
                TermPattern::var(URI_VAR),
                uris.iter().cloned().map(RdfTerm::NamedNode).collect(),
            ),
        })
    }

    fn order(&self, request: &SearchRequest) -> QueryResult<Vec<OrderCondition>> {
        let mut order = Vec::with_capacity(request.order_by.len() + 1);
        for sort in &request.order_by {
            if self.descriptor.property(&sort.field).is_some_and(|p| p.is_list()) {
                return Err(QueryError::Unsupported(format!(
                    "ordering on list field '{}'",
                    sort.field
                )));
            }
            let variable = self.variable(&sort.field)?;
            order.push(OrderCondition {
                variable,
                descending: sort.descending,
            });
        }
        if !order.iter().any(|c| c.variable == URI_VAR) {
            order.push(OrderCondition::asc(URI_VAR));
        }
        Ok(order)
    }

    /// Variable bound to a field name
    fn variable(&self, field: &str) -> QueryResult<String> {
        if field == URI_VAR || field == TYPE_VAR || self.descriptor.property(field).is_some() {
            Ok(field.to_string())
        } else {
            Err(QueryError::UnknownField {
                type_name: self.descriptor.type_name().to_string(),
                field: field.to_string(),
            })
        }
    }

    fn class_hierarchy(&self, rdf_type: TermPattern) -> GraphPattern {
        GraphPattern::triple(
            rdf_type,
            PredicatePattern::ZeroOrMore(sub_class_of()),
            TermPattern::iri(self.descriptor.rdf_type()),
        )
    }
}

/// Whether anything is stored about `uri`, used to detect URI collisions
pub fn ask_uri_used(uri: &NamedNode) -> AskQuery {
    AskQuery::new(vec![GraphPattern::triple(
        TermPattern::iri(uri),
        PredicatePattern::Variable("p".to_string()),
        TermPattern::var("o"),
    )])
}

fn property_pattern(property: &PropertyDescriptor) -> GraphPattern {
    let predicate = PredicatePattern::Iri(property.predicate().clone());
    if property.is_inverse() {
        GraphPattern::triple(
            TermPattern::var(property.field()),
            predicate,
            TermPattern::var(URI_VAR),
        )
    } else {
        GraphPattern::triple(
            TermPattern::var(URI_VAR),
            predicate,
            TermPattern::var(property.field()),
        )
    }
}

fn in_graph(graph: Option<&NamedNode>, patterns: Vec<GraphPattern>) -> GraphPattern {
    match graph {
        Some(graph) => GraphPattern::Graph(graph.clone(), patterns),
        None => GraphPattern::Group(patterns),
    }
}

fn scope(graph: Option<&NamedNode>) -> GraphScope {
    match graph {
        Some(graph) => GraphScope::Named(graph.clone()),
        None => GraphScope::Union,
    }
}

// Both constants are valid IRIs.
fn rdf_type() -> NamedNode {
    NamedNode::from(oxrdf::NamedNode::new_unchecked(RDF_TYPE))
}

fn sub_class_of() -> NamedNode {
    NamedNode::from(oxrdf::NamedNode::new_unchecked(RDFS_SUB_CLASS_OF))
}
