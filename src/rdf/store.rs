//! In-memory quad store and change sets
//!
//! The store keeps a primary quad set plus subject, predicate and object
//! indexes. Lookups start from the smallest index bucket that the pattern
//! pins down and filter the rest.
//!
//! Writes go through [`ChangeSet`]: deletions first, then insertions, exactly
//! like a SPARQL `DELETE DATA` / `INSERT DATA` pair. Applying a change set
//! reports the quads that really changed, which is what a compensating
//! rollback needs.

use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt::{self, Write as _};
use thiserror::Error;

use super::types::{GraphScope, NamedNode, Quad, QuadPattern, RdfObject, RdfSubject};

/// RDF store errors
#[derive(Error, Debug)]
pub enum RdfStoreError {
    /// Lock poisoned by a panicking writer
    #[error("Store lock poisoned")]
    Poisoned,

    /// Store cannot accept the operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A subject claimed by the change set is already described
    #[error("Subject already in use: {0}")]
    SubjectInUse(NamedNode),

    /// Query evaluation error
    #[error("Query error: {0}")]
    Query(#[from] crate::sparql::QueryError),
}

pub type RdfStoreResult<T> = Result<T, RdfStoreError>;

/// Quad store with subject/predicate/object indices
#[derive(Clone, Default)]
pub struct RdfStore {
    /// All quads (primary storage)
    quads: FxHashSet<Quad>,
    subject_index: FxHashMap<RdfSubject, FxHashSet<Quad>>,
    predicate_index: FxHashMap<NamedNode, FxHashSet<Quad>>,
    object_index: FxHashMap<RdfObject, FxHashSet<Quad>>,
    /// Quad count per graph (None = default graph)
    graph_sizes: FxHashMap<Option<NamedNode>, usize>,
}

impl RdfStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a quad, returning false if it was already present
    pub fn insert(&mut self, quad: Quad) -> bool {
        if self.quads.contains(&quad) {
            return false;
        }
        self.subject_index
            .entry(quad.subject.clone())
            .or_default()
            .insert(quad.clone());
        self.predicate_index
            .entry(quad.predicate.clone())
            .or_default()
            .insert(quad.clone());
        self.object_index
            .entry(quad.object.clone())
            .or_default()
            .insert(quad.clone());
        *self.graph_sizes.entry(quad.graph.clone()).or_insert(0) += 1;
        self.quads.insert(quad);
        true
    }

    /// Remove a quad, returning false if it was absent
    pub fn remove(&mut self, quad: &Quad) -> bool {
        if !self.quads.remove(quad) {
            return false;
        }
        remove_from_index(&mut self.subject_index, &quad.subject, quad);
        remove_from_index(&mut self.predicate_index, &quad.predicate, quad);
        remove_from_index(&mut self.object_index, &quad.object, quad);
        if let Some(size) = self.graph_sizes.get_mut(&quad.graph) {
            *size -= 1;
            if *size == 0 {
                self.graph_sizes.remove(&quad.graph);
            }
        }
        true
    }

    /// Check whether a quad is stored
    pub fn contains(&self, quad: &Quad) -> bool {
        self.quads.contains(quad)
    }

    /// Number of quads across all graphs
    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }

    /// Named graphs currently holding at least one quad
    pub fn graphs(&self) -> Vec<NamedNode> {
        let mut graphs: Vec<NamedNode> = self.graph_sizes.keys().flatten().cloned().collect();
        graphs.sort();
        graphs
    }

    /// Number of quads in one graph
    pub fn graph_len(&self, graph: Option<&NamedNode>) -> usize {
        self.graph_sizes.get(&graph.cloned()).copied().unwrap_or(0)
    }

    /// All quads matching a pattern
    pub fn match_quads(&self, pattern: &QuadPattern) -> Vec<&Quad> {
        let mut candidates: Option<&FxHashSet<Quad>> = None;
        let mut narrowed = false;

        if let Some(subject) = &pattern.subject {
            narrowed = true;
            candidates = smallest(candidates, self.subject_index.get(subject));
            if candidates.is_none() {
                return Vec::new();
            }
        }
        if let Some(object) = &pattern.object {
            narrowed = true;
            match self.object_index.get(object) {
                Some(bucket) => candidates = smallest(candidates, Some(bucket)),
                None => return Vec::new(),
            }
        }
        if let Some(predicate) = &pattern.predicate {
            narrowed = true;
            match self.predicate_index.get(predicate) {
                Some(bucket) => candidates = smallest(candidates, Some(bucket)),
                None => return Vec::new(),
            }
        }

        let source = match candidates {
            Some(bucket) => bucket,
            None if narrowed => return Vec::new(),
            None => &self.quads,
        };
        source.iter().filter(|q| pattern.matches(q)).collect()
    }

    /// Apply a change set: deletions first, then insertions
    pub fn apply(&mut self, changes: &ChangeSet) -> AppliedChanges {
        let mut applied = AppliedChanges::default();
        for quad in &changes.deletes {
            if self.remove(quad) {
                applied.removed.push(quad.clone());
            }
        }
        for quad in &changes.inserts {
            if self.insert(quad.clone()) {
                applied.inserted.push(quad.clone());
            }
        }
        applied
    }

    /// Whether any quad has `subject` as its subject
    pub fn has_subject(&self, subject: &NamedNode) -> bool {
        self.subject_index
            .contains_key(&RdfSubject::NamedNode(subject.clone()))
    }

    /// First claimed subject of `changes` that is already described
    pub fn claim_conflict<'c>(&self, changes: &'c ChangeSet) -> Option<&'c NamedNode> {
        changes.claims.iter().find(|subject| self.has_subject(subject))
    }

    /// Remove every quad in a named graph, returning how many were dropped
    pub fn clear_graph(&mut self, graph: &NamedNode) -> usize {
        let pattern = QuadPattern::any().in_scope(GraphScope::Named(graph.clone()));
        let doomed: Vec<Quad> = self.match_quads(&pattern).into_iter().cloned().collect();
        for quad in &doomed {
            self.remove(quad);
        }
        doomed.len()
    }

    /// Iterate over every quad
    pub fn iter(&self) -> impl Iterator<Item = &Quad> {
        self.quads.iter()
    }
}

fn smallest<'a>(
    current: Option<&'a FxHashSet<Quad>>,
    next: Option<&'a FxHashSet<Quad>>,
) -> Option<&'a FxHashSet<Quad>> {
    match (current, next) {
        (Some(a), Some(b)) => Some(if b.len() < a.len() { b } else { a }),
        (None, b) => b,
        (a, None) => a,
    }
}

fn remove_from_index<K: std::hash::Hash + Eq>(
    index: &mut FxHashMap<K, FxHashSet<Quad>>,
    key: &K,
    quad: &Quad,
) {
    if let Some(bucket) = index.get_mut(key) {
        bucket.remove(quad);
        if bucket.is_empty() {
            index.remove(key);
        }
    }
}

/// Staged writes against a quad store
///
/// Claimed subjects must have no quads at all when the change set is
/// applied; a store checks them under the same lock as the write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub deletes: Vec<Quad>,
    pub inserts: Vec<Quad>,
    claims: Vec<NamedNode>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quad: Quad) {
        self.inserts.push(quad);
    }

    pub fn delete(&mut self, quad: Quad) {
        self.deletes.push(quad);
    }

    /// Require `subject` to be unused when the change set is applied
    pub fn claim_subject(&mut self, subject: NamedNode) {
        if !self.claims.contains(&subject) {
            self.claims.push(subject);
        }
    }

    pub fn claimed_subjects(&self) -> &[NamedNode] {
        &self.claims
    }

    /// Append another change set after this one
    pub fn extend(&mut self, other: ChangeSet) {
        self.deletes.extend(other.deletes);
        self.inserts.extend(other.inserts);
        for subject in other.claims {
            self.claim_subject(subject);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty() && self.inserts.is_empty()
    }

    /// Whether a staged insertion uses this subject
    pub fn inserts_subject(&self, subject: &NamedNode) -> bool {
        self.inserts
            .iter()
            .any(|q| q.subject.as_named_node() == Some(subject))
    }

    /// Render as a SPARQL 1.1 update request
    pub fn to_sparql_update(&self) -> String {
        let mut update = String::new();
        if !self.deletes.is_empty() {
            update.push_str("DELETE DATA {\n");
            write_quad_block(&mut update, &self.deletes);
            update.push('}');
        }
        if !self.inserts.is_empty() {
            if !update.is_empty() {
                update.push_str(" ;\n");
            }
            update.push_str("INSERT DATA {\n");
            write_quad_block(&mut update, &self.inserts);
            update.push('}');
        }
        update
    }
}

impl fmt::Display for ChangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sparql_update())
    }
}

fn write_quad_block(out: &mut String, quads: &[Quad]) {
    let mut sorted: Vec<&Quad> = quads.iter().collect();
    sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

    let mut current_graph: Option<&NamedNode> = None;
    for quad in sorted {
        if quad.graph.as_ref() != current_graph {
            if current_graph.is_some() {
                out.push_str("  }\n");
            }
            current_graph = quad.graph.as_ref();
            if let Some(graph) = current_graph {
                let _ = writeln!(out, "  GRAPH {} {{", graph);
            }
        }
        let indent = if current_graph.is_some() { "    " } else { "  " };
        let _ = writeln!(out, "{}{}", indent, quad.as_triple());
    }
    if current_graph.is_some() {
        out.push_str("  }\n");
    }
}

/// Quads a change set actually added or removed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedChanges {
    pub inserted: Vec<Quad>,
    pub removed: Vec<Quad>,
}

impl AppliedChanges {
    /// Change set restoring the state before these changes
    pub fn inverse(&self) -> ChangeSet {
        ChangeSet {
            deletes: self.inserted.clone(),
            inserts: self.removed.clone(),
            claims: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::Literal;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(format!("http://example.org/{s}")).unwrap()
    }

    fn quad(s: &str, p: &str, o: &str, g: Option<&str>) -> Quad {
        Quad::new(iri(s), iri(p), Literal::new_simple_literal(o), g.map(iri))
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut store = RdfStore::new();
        assert!(store.insert(quad("a", "name", "A", None)));
        assert!(!store.insert(quad("a", "name", "A", None)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_same_triple_in_two_graphs() {
        let mut store = RdfStore::new();
        store.insert(quad("a", "name", "A", Some("g1")));
        store.insert(quad("a", "name", "A", Some("g2")));
        assert_eq!(store.len(), 2);
        assert_eq!(store.graphs(), vec![iri("g1"), iri("g2")]);
        assert_eq!(store.graph_len(Some(&iri("g1"))), 1);
    }

    #[test]
    fn test_match_quads_uses_all_constraints() {
        let mut store = RdfStore::new();
        store.insert(quad("a", "name", "A", Some("g1")));
        store.insert(quad("a", "code", "X", Some("g1")));
        store.insert(quad("b", "name", "B", Some("g2")));

        let by_subject = QuadPattern::any().with_subject(iri("a"));
        assert_eq!(store.match_quads(&by_subject).len(), 2);

        let by_predicate_in_graph = QuadPattern::any()
            .with_predicate(iri("name"))
            .in_scope(GraphScope::Named(iri("g2")));
        assert_eq!(store.match_quads(&by_predicate_in_graph).len(), 1);

        let missing = QuadPattern::any().with_subject(iri("zzz"));
        assert!(store.match_quads(&missing).is_empty());
    }

    #[test]
    fn test_apply_reports_effective_changes_and_inverts() {
        let mut store = RdfStore::new();
        store.insert(quad("a", "name", "old", None));

        let mut changes = ChangeSet::new();
        changes.delete(quad("a", "name", "old", None));
        changes.delete(quad("a", "name", "never-there", None));
        changes.insert(quad("a", "name", "new", None));

        let applied = store.apply(&changes);
        assert_eq!(applied.removed, vec![quad("a", "name", "old", None)]);
        assert_eq!(applied.inserted, vec![quad("a", "name", "new", None)]);

        store.apply(&applied.inverse());
        assert!(store.contains(&quad("a", "name", "old", None)));
        assert!(!store.contains(&quad("a", "name", "new", None)));
    }

    #[test]
    fn test_clear_graph() {
        let mut store = RdfStore::new();
        store.insert(quad("a", "name", "A", Some("g1")));
        store.insert(quad("b", "name", "B", Some("g1")));
        store.insert(quad("c", "name", "C", None));
        assert_eq!(store.clear_graph(&iri("g1")), 2);
        assert_eq!(store.len(), 1);
        assert!(store.graphs().is_empty());
    }

    #[test]
    fn test_change_set_renders_update() {
        let mut changes = ChangeSet::new();
        changes.delete(quad("a", "name", "old", Some("g")));
        changes.insert(quad("a", "name", "new", Some("g")));
        let update = changes.to_sparql_update();
        assert!(update.starts_with("DELETE DATA {"));
        assert!(update.contains("GRAPH <http://example.org/g> {"));
        assert!(update.contains("INSERT DATA {"));
        assert!(update.contains("\"new\""));
    }

    #[test]
    fn test_claimed_subject_conflicts() {
        let mut store = RdfStore::new();
        store.insert(quad("a", "name", "A", Some("g1")));

        let mut changes = ChangeSet::new();
        changes.claim_subject(iri("b"));
        changes.insert(quad("b", "name", "B", None));
        assert!(store.claim_conflict(&changes).is_none());

        let mut other = ChangeSet::new();
        other.claim_subject(iri("a"));
        changes.extend(other);
        assert_eq!(changes.claimed_subjects(), &[iri("b"), iri("a")]);
        assert_eq!(store.claim_conflict(&changes), Some(&iri("a")));

        store.remove(&quad("a", "name", "A", Some("g1")));
        assert!(!store.has_subject(&iri("a")));
        assert!(store.claim_conflict(&changes).is_none());
    }
}
