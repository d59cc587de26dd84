//! Hierarchy extraction from a graph store

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use indexmap::IndexSet;
use tracing::debug;

use super::ResourceTree;
use crate::rdf::{GraphScope, GraphStore, NamedNode, QuadPattern, RdfStoreResult};

/// Builds trees over a `?child relation ?parent` predicate
pub struct TreeResolver<'a> {
    store: &'a dyn GraphStore,
    relation: NamedNode,
    graph: Option<NamedNode>,
    max_depth: Option<usize>,
}

impl<'a> TreeResolver<'a> {
    pub fn new(store: &'a dyn GraphStore, relation: NamedNode) -> Self {
        Self {
            store,
            relation,
            graph: None,
            max_depth: None,
        }
    }

    /// Only follow links stored in this graph
    pub fn in_graph(mut self, graph: Option<NamedNode>) -> Self {
        self.graph = graph;
        self
    }

    /// Stop this many levels below the root
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    fn scope(&self) -> GraphScope {
        match &self.graph {
            Some(graph) => GraphScope::Named(graph.clone()),
            None => GraphScope::Union,
        }
    }

    /// Direct children of a node, sorted
    pub fn children(&self, parent: &NamedNode) -> RdfStoreResult<Vec<NamedNode>> {
        let pattern = QuadPattern::any()
            .with_predicate(self.relation.clone())
            .with_object(parent.clone())
            .in_scope(self.scope());
        let children: BTreeSet<NamedNode> = self
            .store
            .quads(&pattern)?
            .into_iter()
            .filter_map(|q| q.subject.as_named_node().cloned())
            .filter(|c| c != parent)
            .collect();
        Ok(children.into_iter().collect())
    }

    /// Breadth-first tree below `root`; values are the node URIs
    ///
    /// A node reachable through several parents hangs under the first one
    /// discovered.
    pub fn resolve(&self, root: &NamedNode) -> RdfStoreResult<ResourceTree<NamedNode>> {
        let mut visited: IndexSet<NamedNode> = IndexSet::new();
        visited.insert(root.clone());
        let mut links = vec![(root.clone(), None, root.clone())];
        let mut queue = VecDeque::from([(root.clone(), 0usize)]);

        while let Some((node, depth)) = queue.pop_front() {
            if self.max_depth.is_some_and(|max| depth >= max) {
                continue;
            }
            for child in self.children(&node)? {
                if visited.insert(child.clone()) {
                    links.push((child.clone(), Some(node.clone()), child.clone()));
                    queue.push_back((child, depth + 1));
                }
            }
        }

        debug!("Resolved {} nodes below {}", links.len() - 1, root);
        Ok(ResourceTree::from_parent_links(links))
    }

    /// Forest of every node touching the relation
    ///
    /// Nodes with several parents keep the smallest parent IRI.
    pub fn resolve_all(&self) -> RdfStoreResult<ResourceTree<NamedNode>> {
        let pattern = QuadPattern::any()
            .with_predicate(self.relation.clone())
            .in_scope(self.scope());

        let mut parents: BTreeMap<NamedNode, Option<NamedNode>> = BTreeMap::new();
        for quad in self.store.quads(&pattern)? {
            let (Some(child), Some(parent)) =
                (quad.subject.as_named_node(), quad.object.as_named_node())
            else {
                continue;
            };
            parents.entry(parent.clone()).or_insert(None);
            if child == parent {
                parents.entry(child.clone()).or_insert(None);
                continue;
            }
            let slot = parents.entry(child.clone()).or_insert(None);
            if slot.as_ref().map_or(true, |current| parent < current) {
                *slot = Some(parent.clone());
            }
        }

        debug!("Resolved forest of {} nodes over {}", parents.len(), self.relation);
        Ok(ResourceTree::from_parent_links(
            parents
                .into_iter()
                .map(|(uri, parent)| (uri.clone(), parent, uri)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::namespace::RDFS_SUB_CLASS_OF;
    use crate::rdf::{ChangeSet, MemoryGraphStore, Quad};

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(format!("http://e.org/{s}")).unwrap()
    }

    fn sub_class_of() -> NamedNode {
        NamedNode::new(RDFS_SUB_CLASS_OF).unwrap()
    }

    fn store(links: &[(&str, &str)], graph: Option<NamedNode>) -> MemoryGraphStore {
        let store = MemoryGraphStore::new();
        let mut changes = ChangeSet::new();
        for (child, parent) in links {
            changes.insert(Quad::new(iri(child), sub_class_of(), iri(parent), graph.clone()));
        }
        store.apply(&changes).unwrap();
        store
    }

    #[test]
    fn test_resolve_from_root() {
        let store = store(&[("b", "a"), ("c", "a"), ("d", "b"), ("z", "y")], None);
        let tree = TreeResolver::new(&store, sub_class_of()).resolve(&iri("a")).unwrap();
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.roots(), &[iri("a")]);
        assert_eq!(tree.descendants(&iri("a")), vec![iri("b"), iri("d"), iri("c")]);
        assert!(!tree.contains(&iri("z")));
    }

    #[test]
    fn test_max_depth() {
        let store = store(&[("b", "a"), ("c", "b"), ("d", "c")], None);
        let tree = TreeResolver::new(&store, sub_class_of())
            .max_depth(1)
            .resolve(&iri("a"))
            .unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_cycles_terminate() {
        let store = store(&[("b", "a"), ("a", "b"), ("a", "a")], None);
        let resolver = TreeResolver::new(&store, sub_class_of());
        let tree = resolver.resolve(&iri("a")).unwrap();
        assert_eq!(tree.len(), 2);
        assert!(!tree.descendants(&iri("a")).contains(&iri("a")));

        let forest = resolver.resolve_all().unwrap();
        assert_eq!(forest.len(), 2);
        assert_eq!(forest.roots().len(), 1);
    }

    #[test]
    fn test_resolve_all_keeps_smallest_parent() {
        let store = store(&[("d", "c"), ("d", "b"), ("b", "a"), ("c", "a"), ("z", "y")], None);
        let forest = TreeResolver::new(&store, sub_class_of()).resolve_all().unwrap();
        assert_eq!(forest.len(), 6);
        assert_eq!(forest.parent_of(&iri("d")).unwrap().uri, iri("b"));
        assert_eq!(forest.roots(), &[iri("a"), iri("y")]);
    }

    #[test]
    fn test_graph_scope() {
        let graph = iri("graph/ontology");
        let store = store(&[("b", "a")], Some(graph.clone()));
        let scoped = TreeResolver::new(&store, sub_class_of()).in_graph(Some(graph));
        assert_eq!(scoped.resolve(&iri("a")).unwrap().len(), 2);
        let other = TreeResolver::new(&store, sub_class_of()).in_graph(Some(iri("graph/other")));
        assert_eq!(other.resolve(&iri("a")).unwrap().len(), 1);
    }
}
