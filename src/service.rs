//! Mapper service
//!
//! [`SparqlService`] is the entry point for application code: it owns the
//! graph store, the descriptor registry and the configuration, and exposes
//! CRUD, search and tree operations over [`SparqlResource`] types.
//!
//! Every write has a `stage_*` variant that only adds to a [`ChangeSet`], so
//! several writes (or a cross-store transaction) can be committed at once.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{ConfigError, MapperConfig};
use crate::document::DocumentError;
use crate::mapping::uri::generate_unique;
use crate::mapping::{
    ask_uri_used, DescriptorError, DescriptorRegistry, MappingError, ObjectMapper, QueryTranslator,
    ResourceDescriptor, ResourceInstance, SearchFilter, SearchRequest, SparqlResource, UriError,
    ValidationError, Value, COUNT_VAR, URI_VAR,
};
use crate::rdf::{
    ChangeSet, GraphScope, GraphStore, NamedNode, ParseError, Quad, QuadPattern, RdfError,
    RdfFormat, RdfParser, RdfStoreError,
};
use crate::sparql::QueryError;
use crate::transaction::{JournalError, TransactionError};
use crate::tree::{ResourceTree, TreeResolver};

/// Errors surfaced by the service
#[derive(Error, Debug)]
pub enum MapperError {
    #[error("RDF error: {0}")]
    Rdf(#[from] RdfError),

    #[error("Store error: {0}")]
    Store(#[from] RdfStoreError),

    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("URI error: {0}")]
    Uri(#[from] UriError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    /// Supplied URI is already in use
    #[error("URI already exists: {0}")]
    AlreadyExists(String),

    /// No resource of the requested type at this URI
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Several resources share a value expected to be unique
    #[error("{count} resources have {field} = {value}")]
    NotUnique {
        field: String,
        value: String,
        count: usize,
    },
}

pub type MapperResult<T> = Result<T, MapperError>;

/// One page of search results
#[derive(Debug, Clone, PartialEq)]
pub struct ListWithPagination<T> {
    pub items: Vec<T>,
    pub page: usize,
    /// None when every match was returned
    pub page_size: Option<usize>,
    /// Matches over all pages
    pub total: usize,
}

impl<T> ListWithPagination<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of pages, 1 when unpaged
    pub fn page_count(&self) -> usize {
        match self.page_size {
            Some(size) if size > 0 => self.total.div_ceil(size),
            _ => 1,
        }
    }
}

/// Resource organised in a hierarchy through one of its own fields
pub trait TreeResource: SparqlResource {
    /// Field holding the parent URI
    const PARENT_FIELD: &'static str;
}

/// Object mapper over a graph store
pub struct SparqlService {
    store: Arc<dyn GraphStore>,
    registry: Arc<DescriptorRegistry>,
    config: MapperConfig,
}

impl SparqlService {
    pub fn new(store: Arc<dyn GraphStore>, config: MapperConfig) -> Self {
        Self::with_registry(store, Arc::new(DescriptorRegistry::new()), config)
    }

    /// Share a registry between services
    pub fn with_registry(
        store: Arc<dyn GraphStore>,
        registry: Arc<DescriptorRegistry>,
        config: MapperConfig,
    ) -> Self {
        info!(
            "SPARQL service ready (base graph {}, generation prefix {})",
            config.base_graph(),
            config.generation_prefix
        );
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &dyn GraphStore {
        self.store.as_ref()
    }

    pub fn registry(&self) -> &DescriptorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    pub fn descriptor<T: SparqlResource>(&self) -> MapperResult<Arc<ResourceDescriptor>> {
        Ok(self.registry.get::<T>()?)
    }

    pub fn default_graph<T: SparqlResource>(&self) -> MapperResult<Option<NamedNode>> {
        Ok(self.descriptor::<T>()?.default_graph(&self.config)?)
    }

    pub fn generation_prefix<T: SparqlResource>(&self) -> MapperResult<String> {
        Ok(self.descriptor::<T>()?.generation_prefix(&self.config))
    }

    /// Whether `uri` is an instance of `T` (or of a subclass)
    pub fn uri_exists<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        uri: &NamedNode,
    ) -> MapperResult<bool> {
        let descriptor = self.descriptor::<T>()?;
        let graph = self.graph_for(&descriptor, graph)?;
        self.exists(&descriptor, graph.as_ref(), uri)
    }

    /// Insert one object, generating its URI when it has none
    pub fn create<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        object: &mut T,
    ) -> MapperResult<NamedNode> {
        match self.commit_creates(graph, std::slice::from_mut(object))?.pop() {
            Some(uri) => {
                info!("Created {}", uri);
                Ok(uri)
            }
            None => Err(ValidationError::MissingUri {
                type_name: self.descriptor::<T>()?.type_name().to_string(),
            }
            .into()),
        }
    }

    /// Insert several objects in one change set
    pub fn create_many<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        objects: &mut [T],
    ) -> MapperResult<Vec<NamedNode>> {
        let uris = self.commit_creates(graph, objects)?;
        info!("Created {} resources", uris.len());
        Ok(uris)
    }

    /// Validate `object` and add its insertion to `changes`
    ///
    /// URIs already staged in `changes` count as taken, so a batch never
    /// hands out the same generated URI twice. The URI is claimed in
    /// `changes`: applying them fails with [`RdfStoreError::SubjectInUse`]
    /// if another writer stored it in the meantime.
    pub fn stage_create<T: SparqlResource>(
        &self,
        changes: &mut ChangeSet,
        graph: Option<&NamedNode>,
        object: &mut T,
    ) -> MapperResult<NamedNode> {
        let descriptor = self.descriptor::<T>()?;
        let uri = self.stage_instance(changes, &descriptor, graph, object.to_instance())?;
        object.set_uri(uri.clone());
        Ok(uri)
    }

    /// Stage and apply creations, regenerating URIs taken by concurrent writers
    fn commit_creates<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        objects: &mut [T],
    ) -> MapperResult<Vec<NamedNode>> {
        let descriptor = self.descriptor::<T>()?;
        let instances: Vec<ResourceInstance> = objects.iter().map(T::to_instance).collect();
        let mut conflicts = 0u32;
        loop {
            let mut changes = ChangeSet::new();
            let uris = instances
                .iter()
                .map(|instance| {
                    self.stage_instance(&mut changes, &descriptor, graph, instance.clone())
                })
                .collect::<MapperResult<Vec<_>>>()?;

            match self.store.apply(&changes) {
                Ok(_) => {
                    for (object, uri) in objects.iter_mut().zip(&uris) {
                        object.set_uri(uri.clone());
                    }
                    return Ok(uris);
                }
                Err(RdfStoreError::SubjectInUse(uri)) => {
                    if instances.iter().any(|i| i.uri.as_ref() == Some(&uri)) {
                        return Err(MapperError::AlreadyExists(uri.to_string()));
                    }
                    conflicts += 1;
                    if conflicts > self.config.max_uri_retries {
                        return Err(UriError::Exhausted {
                            prefix: descriptor.generation_prefix(&self.config),
                            attempts: conflicts,
                        }
                        .into());
                    }
                    debug!("{} was stored by a concurrent writer, regenerating", uri);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn stage_instance(
        &self,
        changes: &mut ChangeSet,
        descriptor: &ResourceDescriptor,
        graph: Option<&NamedNode>,
        mut instance: ResourceInstance,
    ) -> MapperResult<NamedNode> {
        let graph = self.graph_for(descriptor, graph)?;
        self.mapper(descriptor).validate(&instance)?;
        self.check_type(descriptor, &instance)?;

        let uri = match instance.uri.clone() {
            Some(uri) => {
                if changes.inserts_subject(&uri) || self.uri_used(&uri)? {
                    return Err(MapperError::AlreadyExists(uri.to_string()));
                }
                uri
            }
            None => {
                let prefix = descriptor.generation_prefix(&self.config);
                let staged: &ChangeSet = changes;
                generate_unique(
                    descriptor.generator(),
                    &prefix,
                    &instance,
                    self.config.max_uri_retries,
                    |candidate| {
                        Ok::<_, MapperError>(
                            staged.inserts_subject(candidate) || self.uri_used(candidate)?,
                        )
                    },
                )?
            }
        };
        instance.uri = Some(uri.clone());

        changes.claim_subject(uri.clone());
        changes.extend(self.translator(descriptor).insert(&instance, graph.as_ref())?);
        debug!("Staged creation of {} ({})", uri, descriptor.type_name());
        Ok(uri)
    }

    /// Replace the stored values of an existing object
    pub fn update<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        object: &T,
    ) -> MapperResult<()> {
        let mut changes = ChangeSet::new();
        self.stage_update(&mut changes, graph, object)?;
        self.store.apply(&changes)?;
        Ok(())
    }

    /// Update several objects in one change set
    pub fn update_many<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        objects: &[T],
    ) -> MapperResult<()> {
        let mut changes = ChangeSet::new();
        for object in objects {
            self.stage_update(&mut changes, graph, object)?;
        }
        self.store.apply(&changes)?;
        info!("Updated {} resources", objects.len());
        Ok(())
    }

    pub fn stage_update<T: SparqlResource>(
        &self,
        changes: &mut ChangeSet,
        graph: Option<&NamedNode>,
        object: &T,
    ) -> MapperResult<()> {
        let descriptor = self.descriptor::<T>()?;
        let graph = self.graph_for(&descriptor, graph)?;
        let instance = object.to_instance();
        let uri = instance
            .uri
            .clone()
            .ok_or_else(|| ValidationError::MissingUri {
                type_name: descriptor.type_name().to_string(),
            })?;
        self.mapper(&descriptor).validate(&instance)?;
        self.check_type(&descriptor, &instance)?;
        if !self.exists(&descriptor, graph.as_ref(), &uri)? {
            return Err(MapperError::NotFound(uri.to_string()));
        }

        let stored = self.stored_quads(&uri, graph.as_ref())?;
        changes.extend(
            self.translator(&descriptor)
                .update(&stored, &instance, graph.as_ref())?,
        );
        debug!("Staged update of {}", uri);
        Ok(())
    }

    /// Delete a resource, following `cascade_delete` references
    pub fn delete<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        uri: &NamedNode,
    ) -> MapperResult<()> {
        let mut changes = ChangeSet::new();
        self.stage_delete::<T>(&mut changes, graph, uri)?;
        let applied = self.store.apply(&changes)?;
        info!("Deleted {} ({} quads)", uri, applied.removed.len());
        Ok(())
    }

    /// Delete several resources in one change set
    pub fn delete_many<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        uris: &[NamedNode],
    ) -> MapperResult<()> {
        let mut changes = ChangeSet::new();
        for uri in uris {
            self.stage_delete::<T>(&mut changes, graph, uri)?;
        }
        let applied = self.store.apply(&changes)?;
        info!("Deleted {} resources ({} quads)", uris.len(), applied.removed.len());
        Ok(())
    }

    /// Delete every `T` whose `field` points at `target`, returning how many
    pub fn delete_by_object_relation<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        field: &str,
        target: &NamedNode,
    ) -> MapperResult<usize> {
        let request = SearchRequest::new().filter(SearchFilter::equals(field, target.clone()));
        let uris = self.search_uris::<T>(graph, &request)?;
        self.delete_many::<T>(graph, &uris)?;
        Ok(uris.len())
    }

    pub fn stage_delete<T: SparqlResource>(
        &self,
        changes: &mut ChangeSet,
        graph: Option<&NamedNode>,
        uri: &NamedNode,
    ) -> MapperResult<()> {
        let descriptor = self.descriptor::<T>()?;
        let resolved = self.graph_for(&descriptor, graph)?;
        if !self.exists(&descriptor, resolved.as_ref(), uri)? {
            return Err(MapperError::NotFound(uri.to_string()));
        }
        let mut visited = HashSet::new();
        self.stage_delete_resource(changes, &descriptor, graph, uri, &mut visited)
    }

    fn stage_delete_resource(
        &self,
        changes: &mut ChangeSet,
        descriptor: &ResourceDescriptor,
        graph: Option<&NamedNode>,
        uri: &NamedNode,
        visited: &mut HashSet<NamedNode>,
    ) -> MapperResult<()> {
        if !visited.insert(uri.clone()) {
            return Ok(());
        }
        let resolved = self.graph_for(descriptor, graph)?;
        let stored = self.stored_quads(uri, resolved.as_ref())?;

        for property in descriptor.properties().iter().filter(|p| p.cascades_delete()) {
            let Some(target) = property.kind().target() else {
                continue;
            };
            let target = self.registry.get_target(target)?;
            let referenced: Vec<NamedNode> = stored
                .iter()
                .filter(|q| &q.predicate == property.predicate())
                .filter_map(|q| {
                    if property.is_inverse() {
                        (q.object.as_named_node() == Some(uri))
                            .then(|| q.subject.as_named_node().cloned())
                            .flatten()
                    } else {
                        (q.subject.as_named_node() == Some(uri))
                            .then(|| q.object.as_named_node().cloned())
                            .flatten()
                    }
                })
                .collect();

            for child in referenced {
                let child_graph = self.graph_for(&target, graph)?;
                if self.exists(&target, child_graph.as_ref(), &child)? {
                    debug!("Cascading delete from {} to {}", uri, child);
                    self.stage_delete_resource(changes, &target, graph, &child, visited)?;
                }
            }
        }

        changes.extend(QueryTranslator::delete(&stored));
        Ok(())
    }

    /// Load one object; None when `uri` is not an instance of `T`
    pub fn get_by_uri<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        uri: &NamedNode,
        language: Option<&str>,
    ) -> MapperResult<Option<T>> {
        let descriptor = self.descriptor::<T>()?;
        let graph = self.graph_for(&descriptor, graph)?;
        if !self.exists(&descriptor, graph.as_ref(), uri)? {
            return Ok(None);
        }
        Ok(Some(self.load(&descriptor, graph.as_ref(), uri, language)?))
    }

    /// Load several objects, skipping URIs that are not instances of `T`
    pub fn get_list_by_uris<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        uris: &[NamedNode],
        language: Option<&str>,
    ) -> MapperResult<Vec<T>> {
        let descriptor = self.descriptor::<T>()?;
        let graph = self.graph_for(&descriptor, graph)?;
        let mut objects = Vec::with_capacity(uris.len());
        for uri in uris {
            if self.exists(&descriptor, graph.as_ref(), uri)? {
                objects.push(self.load(&descriptor, graph.as_ref(), uri, language)?);
            }
        }
        Ok(objects)
    }

    /// The only `T` whose `field` holds `value`
    ///
    /// Fails with [`MapperError::NotUnique`] when several match.
    pub fn get_by_unique_property<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        field: &str,
        value: impl Into<Value>,
        language: Option<&str>,
    ) -> MapperResult<Option<T>> {
        let value = value.into();
        let request = SearchRequest::new().filter(SearchFilter::equals(field, value.clone()));
        let mut uris = self.search_uris::<T>(graph, &request)?;
        if uris.len() > 1 {
            return Err(MapperError::NotUnique {
                field: field.to_string(),
                value: value.to_string(),
                count: uris.len(),
            });
        }
        match uris.pop() {
            Some(uri) => {
                let descriptor = self.descriptor::<T>()?;
                let graph = self.graph_for(&descriptor, graph)?;
                Ok(Some(self.load(&descriptor, graph.as_ref(), &uri, language)?))
            }
            None => Ok(None),
        }
    }

    /// Whether some `T` has `value` in `field`
    pub fn exists_by_unique_property<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        field: &str,
        value: impl Into<Value>,
    ) -> MapperResult<bool> {
        let request = SearchRequest::new().filter(SearchFilter::equals(field, value));
        Ok(self.count::<T>(graph, &request)? > 0)
    }

    /// Filtered, ordered and paged search
    ///
    /// A page size of zero or none returns every match. A page starting past
    /// the last match is empty.
    pub fn search<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        request: &SearchRequest,
    ) -> MapperResult<ListWithPagination<T>> {
        let descriptor = self.descriptor::<T>()?;
        let graph = self.graph_for(&descriptor, graph)?;
        let mut request = request.clone();
        if request.page_size == Some(0) {
            request.page_size = None;
        }

        let total = self.count_matching(&descriptor, graph.as_ref(), &request)?;
        let past_end = request
            .page_size
            .is_some_and(|size| request.page.saturating_mul(size) >= total);

        let mut items = Vec::new();
        if !past_end {
            let query = self
                .translator(&descriptor)
                .select_uris(&request, graph.as_ref())?;
            for solution in self.store.select(&query)? {
                if let Some(uri) = solution.get_named(URI_VAR) {
                    items.push(self.load(
                        &descriptor,
                        graph.as_ref(),
                        uri,
                        request.language.as_deref(),
                    )?);
                }
            }
        }

        debug!(
            "Search on {} returned {} of {} matches",
            descriptor.type_name(),
            items.len(),
            total
        );
        Ok(ListWithPagination {
            items,
            page: request.page,
            page_size: request.page_size,
            total,
        })
    }

    /// Number of matches of a search, paging ignored
    pub fn count<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        request: &SearchRequest,
    ) -> MapperResult<usize> {
        let descriptor = self.descriptor::<T>()?;
        let graph = self.graph_for(&descriptor, graph)?;
        self.count_matching(&descriptor, graph.as_ref(), request)
    }

    /// Instances of `T` assembled through their parent field
    ///
    /// With a root only the nodes below it are kept; `exclude_root` drops
    /// the root itself and promotes its children.
    pub fn search_resource_tree<T: TreeResource + Clone>(
        &self,
        graph: Option<&NamedNode>,
        root: Option<&NamedNode>,
        exclude_root: bool,
    ) -> MapperResult<ResourceTree<T>> {
        let all = self.search::<T>(graph, &SearchRequest::new())?;
        let links = all
            .items
            .into_iter()
            .filter_map(|object| {
                let uri = object.uri()?.clone();
                let parent = object.to_instance().iri(T::PARENT_FIELD);
                Some((uri, parent, object))
            })
            .collect::<Vec<_>>();
        let tree = ResourceTree::from_parent_links(links);

        Ok(match root {
            Some(root) => tree.subtree(root, !exclude_root),
            None => tree,
        })
    }

    /// Hierarchy over the configured tree relation
    pub fn class_tree(
        &self,
        graph: Option<&NamedNode>,
        root: Option<&NamedNode>,
    ) -> MapperResult<ResourceTree<NamedNode>> {
        let resolver = TreeResolver::new(self.store.as_ref(), self.config.tree_relation()?)
            .in_graph(graph.cloned());
        Ok(match root {
            Some(root) => resolver.resolve(root)?,
            None => resolver.resolve_all()?,
        })
    }

    /// Parse RDF text into a graph, returning the number of new quads
    pub fn load_ontology(
        &self,
        graph: Option<&NamedNode>,
        input: &str,
        format: RdfFormat,
    ) -> MapperResult<usize> {
        let triples = RdfParser::parse(input, format)?;
        let parsed = triples.len();
        let mut changes = ChangeSet::new();
        for triple in triples {
            changes.insert(triple.in_graph(graph.cloned()));
        }
        let applied = self.store.apply(&changes)?;
        info!(
            "Loaded {} triples into {} ({} new)",
            parsed,
            graph.map_or_else(|| "the default graph".to_string(), |g| g.to_string()),
            applied.inserted.len()
        );
        Ok(applied.inserted.len())
    }

    pub fn clear_graph(&self, graph: &NamedNode) -> MapperResult<usize> {
        Ok(self.store.clear_graph(graph)?)
    }

    /// Move every quad of `from` into `to` in one change set
    pub fn rename_graph(&self, from: &NamedNode, to: &NamedNode) -> MapperResult<usize> {
        let pattern = QuadPattern::any().in_scope(GraphScope::Named(from.clone()));
        let mut changes = ChangeSet::new();
        for quad in self.store.quads(&pattern)? {
            changes.insert(quad.as_triple().in_graph(Some(to.clone())));
            changes.delete(quad);
        }
        let applied = self.store.apply(&changes)?;
        info!("Moved graph {} to {} ({} quads)", from, to, applied.removed.len());
        Ok(applied.removed.len())
    }

    fn mapper<'a>(&'a self, descriptor: &'a ResourceDescriptor) -> ObjectMapper<'a> {
        ObjectMapper::new(descriptor, &self.config.default_language)
    }

    fn translator<'a>(&'a self, descriptor: &'a ResourceDescriptor) -> QueryTranslator<'a> {
        QueryTranslator::new(descriptor, &self.config.default_language)
    }

    /// Explicit graph, else the class default
    fn graph_for(
        &self,
        descriptor: &ResourceDescriptor,
        graph: Option<&NamedNode>,
    ) -> MapperResult<Option<NamedNode>> {
        match graph {
            Some(graph) => Ok(Some(graph.clone())),
            None => Ok(descriptor.default_graph(&self.config)?),
        }
    }

    fn exists(
        &self,
        descriptor: &ResourceDescriptor,
        graph: Option<&NamedNode>,
        uri: &NamedNode,
    ) -> MapperResult<bool> {
        Ok(self
            .store
            .ask(&self.translator(descriptor).ask_uri_exists(uri, graph))?)
    }

    /// A declared type must be the mapped class or one of its subclasses
    fn check_type(
        &self,
        descriptor: &ResourceDescriptor,
        instance: &ResourceInstance,
    ) -> MapperResult<()> {
        let Some(rdf_type) = &instance.rdf_type else {
            return Ok(());
        };
        if rdf_type == descriptor.rdf_type()
            || self
                .store
                .ask(&self.translator(descriptor).ask_is_subclass(rdf_type))?
        {
            return Ok(());
        }
        Err(ValidationError::UnexpectedType {
            type_name: descriptor.type_name().to_string(),
            rdf_type: rdf_type.to_string(),
            expected: descriptor.rdf_type().to_string(),
        }
        .into())
    }

    fn search_uris<T: SparqlResource>(
        &self,
        graph: Option<&NamedNode>,
        request: &SearchRequest,
    ) -> MapperResult<Vec<NamedNode>> {
        let descriptor = self.descriptor::<T>()?;
        let graph = self.graph_for(&descriptor, graph)?;
        let query = self
            .translator(&descriptor)
            .select_uris(request, graph.as_ref())?;
        Ok(self
            .store
            .select(&query)?
            .iter()
            .filter_map(|solution| solution.get_named(URI_VAR).cloned())
            .collect())
    }

    /// Whether anything at all is stored with `uri` as subject
    fn uri_used(&self, uri: &NamedNode) -> MapperResult<bool> {
        Ok(self.store.ask(&ask_uri_used(uri))?)
    }

    fn stored_quads(&self, uri: &NamedNode, graph: Option<&NamedNode>) -> MapperResult<Vec<Quad>> {
        let mut quads = Vec::new();
        for pattern in QueryTranslator::resource_patterns(uri, graph) {
            quads.extend(self.store.quads(&pattern)?);
        }
        Ok(quads)
    }

    fn load<T: SparqlResource>(
        &self,
        descriptor: &ResourceDescriptor,
        graph: Option<&NamedNode>,
        uri: &NamedNode,
        language: Option<&str>,
    ) -> MapperResult<T> {
        let stored = self.stored_quads(uri, graph)?;
        let instance = self.mapper(descriptor).from_quads(uri, &stored, language);
        Ok(T::from_instance(instance)?)
    }

    fn count_matching(
        &self,
        descriptor: &ResourceDescriptor,
        graph: Option<&NamedNode>,
        request: &SearchRequest,
    ) -> MapperResult<usize> {
        let query = self.translator(descriptor).count(request, graph)?;
        let solutions = self.store.select(&query)?;
        let literal = solutions
            .first()
            .and_then(|s| s.get_literal(COUNT_VAR))
            .ok_or_else(|| QueryError::UnexpectedResult(format!("no ?{} binding", COUNT_VAR)))?;
        let count = literal.value().parse::<usize>().map_err(|e| {
            QueryError::UnexpectedResult(format!("count {}: {}", literal, e))
        })?;
        Ok(count)
    }
}
