//! Resource trees
//!
//! [`ResourceTree`] arranges values keyed by URI into a forest from
//! child → parent links. [`TreeResolver`] extracts such links from a graph
//! store by walking a hierarchy relation such as `rdfs:subClassOf`.
//!
//! ```rust
//! use silex_sparql::rdf::NamedNode;
//! use silex_sparql::tree::ResourceTree;
//!
//! let iri = |s: &str| NamedNode::new(s).unwrap();
//! let tree = ResourceTree::from_parent_links(vec![
//!     (iri("http://e.org/a"), None, "a"),
//!     (iri("http://e.org/b"), Some(iri("http://e.org/a")), "b"),
//! ]);
//! assert_eq!(tree.list_roots().len(), 1);
//! assert_eq!(tree.list_children(&iri("http://e.org/a")).len(), 1);
//! ```

mod resolver;

pub use resolver::TreeResolver;

use indexmap::{IndexMap, IndexSet};

use crate::rdf::NamedNode;

/// A node and its links
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<T> {
    pub uri: NamedNode,
    pub value: T,
    pub parent: Option<NamedNode>,
    /// Children in insertion order
    pub children: Vec<NamedNode>,
}

/// Forest of values keyed by URI
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceTree<T> {
    nodes: IndexMap<NamedNode, TreeNode<T>>,
    roots: Vec<NamedNode>,
}

impl<T> Default for ResourceTree<T> {
    fn default() -> Self {
        Self {
            nodes: IndexMap::new(),
            roots: Vec::new(),
        }
    }
}

impl<T> ResourceTree<T> {
    /// Build from `(uri, parent, value)` links
    ///
    /// A node whose parent is unknown, or is itself, becomes a root. Later
    /// duplicates of a URI are ignored. A set of nodes that only point at
    /// each other has no root; the smallest URI of such a cycle is promoted
    /// so every node stays reachable.
    pub fn from_parent_links<I>(links: I) -> Self
    where
        I: IntoIterator<Item = (NamedNode, Option<NamedNode>, T)>,
    {
        let mut nodes: IndexMap<NamedNode, TreeNode<T>> = IndexMap::new();
        for (uri, parent, value) in links {
            if nodes.contains_key(&uri) {
                continue;
            }
            let parent = parent.filter(|p| p != &uri);
            nodes.insert(
                uri.clone(),
                TreeNode {
                    uri,
                    value,
                    parent,
                    children: Vec::new(),
                },
            );
        }

        let dangling: Vec<NamedNode> = nodes
            .values()
            .filter(|n| n.parent.as_ref().is_some_and(|p| !nodes.contains_key(p)))
            .map(|n| n.uri.clone())
            .collect();
        for uri in dangling {
            if let Some(node) = nodes.get_mut(&uri) {
                node.parent = None;
            }
        }

        let mut tree = Self {
            nodes,
            roots: Vec::new(),
        };
        tree.link();
        tree.break_cycles();
        tree
    }

    /// Rebuild children lists and roots from parent links
    fn link(&mut self) {
        for node in self.nodes.values_mut() {
            node.children.clear();
        }
        let links: Vec<(NamedNode, Option<NamedNode>)> = self
            .nodes
            .values()
            .map(|n| (n.uri.clone(), n.parent.clone()))
            .collect();
        self.roots.clear();
        for (uri, parent) in links {
            match parent.and_then(|p| self.nodes.get_mut(&p)) {
                Some(parent) => parent.children.push(uri),
                None => self.roots.push(uri),
            }
        }
    }

    fn break_cycles(&mut self) {
        loop {
            let mut reachable: IndexSet<NamedNode> = IndexSet::new();
            for root in &self.roots {
                reachable.insert(root.clone());
                reachable.extend(self.descendants(root));
            }
            let Some(orphan) = self
                .nodes
                .keys()
                .filter(|uri| !reachable.contains(*uri))
                .min()
                .cloned()
            else {
                return;
            };
            if let Some(node) = self.nodes.get_mut(&orphan) {
                node.parent = None;
            }
            self.link();
        }
    }

    /// Roots in insertion order
    pub fn roots(&self) -> &[NamedNode] {
        &self.roots
    }

    /// Root nodes
    pub fn list_roots(&self) -> Vec<&TreeNode<T>> {
        self.roots.iter().filter_map(|r| self.nodes.get(r)).collect()
    }

    /// Direct children of a node; empty for unknown URIs
    pub fn list_children(&self, uri: &NamedNode) -> Vec<&TreeNode<T>> {
        self.nodes
            .get(uri)
            .map(|n| n.children.iter().filter_map(|c| self.nodes.get(c)).collect())
            .unwrap_or_default()
    }

    pub fn get(&self, uri: &NamedNode) -> Option<&TreeNode<T>> {
        self.nodes.get(uri)
    }

    pub fn contains(&self, uri: &NamedNode) -> bool {
        self.nodes.contains_key(uri)
    }

    pub fn parent_of(&self, uri: &NamedNode) -> Option<&TreeNode<T>> {
        self.nodes
            .get(uri)
            .and_then(|n| n.parent.as_ref())
            .and_then(|p| self.nodes.get(p))
    }

    /// Every node below `uri`, depth-first; never includes `uri` itself
    pub fn descendants(&self, uri: &NamedNode) -> Vec<NamedNode> {
        let mut visited: IndexSet<NamedNode> = IndexSet::new();
        let mut stack: Vec<&NamedNode> = match self.nodes.get(uri) {
            Some(node) => node.children.iter().rev().collect(),
            None => return Vec::new(),
        };
        while let Some(current) = stack.pop() {
            if current == uri || !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(current) {
                stack.extend(node.children.iter().rev());
            }
        }
        visited.into_iter().collect()
    }

    /// Parent chain from the direct parent up to the root
    pub fn ancestors(&self, uri: &NamedNode) -> Vec<NamedNode> {
        let mut chain: IndexSet<NamedNode> = IndexSet::new();
        let mut current = self.parent_of(uri);
        while let Some(node) = current {
            if &node.uri == uri || !chain.insert(node.uri.clone()) {
                break;
            }
            current = self.parent_of(&node.uri);
        }
        chain.into_iter().collect()
    }

    /// Pre-order depth-first walk from every root, with the node depth
    pub fn traverse<F>(&self, mut handler: F)
    where
        F: FnMut(&TreeNode<T>, usize),
    {
        let mut visited: IndexSet<&NamedNode> = IndexSet::new();
        let mut stack: Vec<(&NamedNode, usize)> = self.roots.iter().rev().map(|r| (r, 0)).collect();
        while let Some((uri, depth)) = stack.pop() {
            if !visited.insert(uri) {
                continue;
            }
            if let Some(node) = self.nodes.get(uri) {
                handler(node, depth);
                stack.extend(node.children.iter().rev().map(|c| (c, depth + 1)));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Same shape with transformed values
    pub fn map_values<U, F>(self, mut f: F) -> ResourceTree<U>
    where
        F: FnMut(T) -> U,
    {
        ResourceTree {
            nodes: self
                .nodes
                .into_iter()
                .map(|(uri, node)| {
                    (
                        uri,
                        TreeNode {
                            uri: node.uri,
                            value: f(node.value),
                            parent: node.parent,
                            children: node.children,
                        },
                    )
                })
                .collect(),
            roots: self.roots,
        }
    }

    /// Values in insertion order
    pub fn into_values(self) -> Vec<T> {
        self.nodes.into_values().map(|n| n.value).collect()
    }
}

impl<T: Clone> ResourceTree<T> {
    /// Tree of the nodes below `root`
    ///
    /// With `include_root` the root is the single root of the result;
    /// otherwise its children are.
    pub fn subtree(&self, root: &NamedNode, include_root: bool) -> Self {
        let Some(root_node) = self.nodes.get(root) else {
            return Self::default();
        };
        let mut links = Vec::new();
        if include_root {
            links.push((root.clone(), None, root_node.value.clone()));
        }
        for uri in self.descendants(root) {
            if let Some(node) = self.nodes.get(&uri) {
                let parent = node
                    .parent
                    .clone()
                    .filter(|p| include_root || p != root);
                links.push((uri, parent, node.value.clone()));
            }
        }
        Self::from_parent_links(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> NamedNode {
        NamedNode::new(format!("http://e.org/{s}")).unwrap()
    }

    fn sample() -> ResourceTree<&'static str> {
        ResourceTree::from_parent_links(vec![
            (iri("a"), None, "a"),
            (iri("b"), Some(iri("a")), "b"),
            (iri("c"), Some(iri("a")), "c"),
            (iri("d"), Some(iri("b")), "d"),
            (iri("e"), Some(iri("missing")), "e"),
            (iri("f"), Some(iri("f")), "f"),
        ])
    }

    #[test]
    fn test_roots_and_children() {
        let tree = sample();
        let roots: Vec<&str> = tree.list_roots().iter().map(|n| n.value).collect();
        assert_eq!(roots, vec!["a", "e", "f"]);
        let children: Vec<&str> = tree.list_children(&iri("a")).iter().map(|n| n.value).collect();
        assert_eq!(children, vec!["b", "c"]);
        assert!(tree.list_children(&iri("zzz")).is_empty());
        assert_eq!(tree.parent_of(&iri("d")).unwrap().value, "b");
    }

    #[test]
    fn test_every_non_root_is_listed_once() {
        let tree = sample();
        let mut listed: Vec<NamedNode> = tree
            .nodes
            .keys()
            .flat_map(|uri| tree.list_children(uri))
            .map(|n| n.uri.clone())
            .collect();
        listed.sort();
        let mut expected: Vec<NamedNode> = tree
            .nodes
            .values()
            .filter(|n| n.parent.is_some())
            .map(|n| n.uri.clone())
            .collect();
        expected.sort();
        assert_eq!(listed, expected);
        assert_eq!(listed.len() + tree.roots().len(), tree.len());
    }

    #[test]
    fn test_descendants_and_ancestors() {
        let tree = sample();
        assert_eq!(tree.descendants(&iri("a")), vec![iri("b"), iri("d"), iri("c")]);
        assert_eq!(tree.ancestors(&iri("d")), vec![iri("b"), iri("a")]);
        assert!(tree.descendants(&iri("f")).is_empty());
    }

    #[test]
    fn test_cycle_gets_a_root() {
        let tree = ResourceTree::from_parent_links(vec![
            (iri("x"), Some(iri("y")), 1),
            (iri("y"), Some(iri("x")), 2),
        ]);
        assert_eq!(tree.roots(), &[iri("x")]);
        assert_eq!(tree.descendants(&iri("x")), vec![iri("y")]);
        assert!(!tree.descendants(&iri("y")).contains(&iri("y")));
    }

    #[test]
    fn test_traverse_is_preorder() {
        let tree = sample();
        let mut seen = Vec::new();
        tree.traverse(|node, depth| seen.push((node.value, depth)));
        assert_eq!(
            seen,
            vec![("a", 0), ("b", 1), ("d", 2), ("c", 1), ("e", 0), ("f", 0)]
        );
    }

    #[test]
    fn test_subtree_and_map() {
        let tree = sample();
        let with_root = tree.subtree(&iri("a"), true);
        assert_eq!(with_root.roots(), &[iri("a")]);
        assert_eq!(with_root.len(), 4);

        let without_root = tree.subtree(&iri("a"), false);
        assert_eq!(without_root.roots(), &[iri("b"), iri("c")]);
        assert_eq!(without_root.len(), 3);

        let lengths = without_root.map_values(|v| v.len());
        assert_eq!(lengths.into_values(), vec![1, 1, 1]);
    }
}
