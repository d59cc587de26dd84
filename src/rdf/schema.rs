//! Transitive hierarchy walking
//!
//! Computes closures over one predicate such as `rdfs:subClassOf`. Both
//! directions track visited nodes, so cyclic data terminates and a node is
//! never reported as its own ancestor or descendant.

use std::collections::VecDeque;

use indexmap::IndexSet;

use super::store::RdfStore;
use super::types::{GraphScope, NamedNode, QuadPattern, RdfTerm};

/// Walks `child predicate parent` edges
pub struct HierarchyWalker<'a> {
    store: &'a RdfStore,
    predicate: &'a NamedNode,
    scope: GraphScope,
}

impl<'a> HierarchyWalker<'a> {
    pub fn new(store: &'a RdfStore, predicate: &'a NamedNode, scope: GraphScope) -> Self {
        Self {
            store,
            predicate,
            scope,
        }
    }

    /// Direct parents (objects of `node predicate ?parent`)
    pub fn parents(&self, node: &RdfTerm) -> Vec<RdfTerm> {
        let Some(subject) = node.to_subject() else {
            return Vec::new();
        };
        let pattern = QuadPattern::any()
            .with_subject(subject)
            .with_predicate(self.predicate.clone())
            .in_scope(self.scope.clone());
        let mut parents: Vec<RdfTerm> = self
            .store
            .match_quads(&pattern)
            .into_iter()
            .map(|q| RdfTerm::from(q.object.clone()))
            .collect();
        parents.sort();
        parents.dedup();
        parents
    }

    /// Direct children (subjects of `?child predicate node`)
    pub fn children(&self, node: &RdfTerm) -> Vec<RdfTerm> {
        let pattern = QuadPattern::any()
            .with_predicate(self.predicate.clone())
            .with_object(node.to_object())
            .in_scope(self.scope.clone());
        let mut children: Vec<RdfTerm> = self
            .store
            .match_quads(&pattern)
            .into_iter()
            .map(|q| RdfTerm::from(q.subject.clone()))
            .collect();
        children.sort();
        children.dedup();
        children
    }

    /// Every ancestor, nearest first
    pub fn ancestors(&self, node: &RdfTerm) -> Vec<RdfTerm> {
        self.closure(node, |term| self.parents(term), None)
    }

    /// Every descendant, nearest first, optionally bounded in depth
    pub fn descendants(&self, node: &RdfTerm, max_depth: Option<usize>) -> Vec<RdfTerm> {
        self.closure(node, |term| self.children(term), max_depth)
    }

    /// Whether `node` reaches `ancestor` in zero or more steps
    pub fn reaches(&self, node: &RdfTerm, ancestor: &RdfTerm) -> bool {
        node == ancestor || self.ancestors(node).contains(ancestor)
    }

    /// Breadth-first closure; the start node is excluded even on cycles
    fn closure<F>(&self, start: &RdfTerm, next: F, max_depth: Option<usize>) -> Vec<RdfTerm>
    where
        F: Fn(&RdfTerm) -> Vec<RdfTerm>,
    {
        let mut visited: IndexSet<RdfTerm> = IndexSet::new();
        visited.insert(start.clone());
        let mut queue = VecDeque::from([(start.clone(), 0usize)]);

        while let Some((term, depth)) = queue.pop_front() {
            if max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for neighbour in next(&term) {
                if visited.insert(neighbour.clone()) {
                    queue.push_back((neighbour, depth + 1));
                }
            }
        }

        visited.into_iter().skip(1).collect()
    }

    /// Subjects and objects touching the predicate, in term order
    pub fn nodes(&self) -> Vec<RdfTerm> {
        let pattern = QuadPattern::any()
            .with_predicate(self.predicate.clone())
            .in_scope(self.scope.clone());
        let mut nodes: IndexSet<RdfTerm> = IndexSet::new();
        for quad in self.store.match_quads(&pattern) {
            nodes.insert(RdfTerm::from(quad.subject.clone()));
            nodes.insert(RdfTerm::from(quad.object.clone()));
        }
        let mut nodes: Vec<RdfTerm> = nodes.into_iter().collect();
        nodes.sort();
        nodes
    }
}

/// Term view of a named node
pub fn named(node: &NamedNode) -> RdfTerm {
    RdfTerm::NamedNode(node.clone())
}
