//! Graph store abstraction
//!
//! [`GraphStore`] is the seam between the mapper and a triple store. The
//! in-memory implementation guards an [`RdfStore`] with a `RwLock` and
//! evaluates queries with [`SparqlExecutor`]. Every `apply` happens under one
//! write lock, so readers see a change set entirely or not at all.

use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use super::store::{AppliedChanges, ChangeSet, RdfStore, RdfStoreError, RdfStoreResult};
use super::types::{NamedNode, Quad, QuadPattern};
use crate::sparql::{AskQuery, QuerySolution, SelectQuery, SparqlExecutor};

/// Operations the mapper needs from a triple store
pub trait GraphStore: Send + Sync {
    /// Apply a change set atomically, reporting what actually changed
    ///
    /// Fails with [`RdfStoreError::SubjectInUse`], writing nothing, when a
    /// claimed subject is already described.
    fn apply(&self, changes: &ChangeSet) -> RdfStoreResult<AppliedChanges>;

    /// Evaluate a SELECT query
    fn select(&self, query: &SelectQuery) -> RdfStoreResult<Vec<QuerySolution>>;

    /// Evaluate an ASK query
    fn ask(&self, query: &AskQuery) -> RdfStoreResult<bool>;

    /// All quads matching a pattern
    fn quads(&self, pattern: &QuadPattern) -> RdfStoreResult<Vec<Quad>>;

    /// Drop a named graph, returning how many quads it held
    fn clear_graph(&self, graph: &NamedNode) -> RdfStoreResult<usize>;

    /// Total number of quads
    fn len(&self) -> RdfStoreResult<usize>;

    fn is_empty(&self) -> RdfStoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

/// Thread-safe in-memory graph store
#[derive(Clone, Default)]
pub struct MemoryGraphStore {
    inner: Arc<RwLock<RdfStore>>,
}

impl MemoryGraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing quad store
    pub fn from_store(store: RdfStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> RdfStoreResult<RdfStore> {
        Ok(self.inner.read().map_err(|_| RdfStoreError::Poisoned)?.clone())
    }
}

impl GraphStore for MemoryGraphStore {
    fn apply(&self, changes: &ChangeSet) -> RdfStoreResult<AppliedChanges> {
        if changes.is_empty() {
            return Ok(AppliedChanges::default());
        }
        debug!("SPARQL UPDATE\n{}", changes);
        let mut store = self.inner.write().map_err(|_| RdfStoreError::Poisoned)?;
        if let Some(subject) = store.claim_conflict(changes) {
            return Err(RdfStoreError::SubjectInUse(subject.clone()));
        }
        let applied = store.apply(changes);
        debug!(
            "Applied change set: {} inserted, {} removed",
            applied.inserted.len(),
            applied.removed.len()
        );
        Ok(applied)
    }

    fn select(&self, query: &SelectQuery) -> RdfStoreResult<Vec<QuerySolution>> {
        debug!("SPARQL SELECT\n{}", query);
        let store = self.inner.read().map_err(|_| RdfStoreError::Poisoned)?;
        Ok(SparqlExecutor::new(&store).select(query)?)
    }

    fn ask(&self, query: &AskQuery) -> RdfStoreResult<bool> {
        debug!("SPARQL ASK\n{}", query);
        let store = self.inner.read().map_err(|_| RdfStoreError::Poisoned)?;
        Ok(SparqlExecutor::new(&store).ask(query)?)
    }

    fn quads(&self, pattern: &QuadPattern) -> RdfStoreResult<Vec<Quad>> {
        let store = self.inner.read().map_err(|_| RdfStoreError::Poisoned)?;
        Ok(store.match_quads(pattern).into_iter().cloned().collect())
    }

    fn clear_graph(&self, graph: &NamedNode) -> RdfStoreResult<usize> {
        let mut store = self.inner.write().map_err(|_| RdfStoreError::Poisoned)?;
        let removed = store.clear_graph(graph);
        info!("Cleared graph {} ({} quads)", graph, removed);
        Ok(removed)
    }

    fn len(&self) -> RdfStoreResult<usize> {
        Ok(self.inner.read().map_err(|_| RdfStoreError::Poisoned)?.len())
    }
}
