//! SPARQL query results

use crate::rdf::{Literal, NamedNode, RdfTerm};
use std::collections::HashMap;

/// Query solution (variable bindings)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySolution {
    /// Variable name → RDF term bindings
    pub bindings: HashMap<String, RdfTerm>,
}

impl QuerySolution {
    /// Create an empty solution
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a binding
    pub fn get(&self, variable: &str) -> Option<&RdfTerm> {
        self.bindings.get(variable)
    }

    /// Get a binding that must be an IRI
    pub fn get_named(&self, variable: &str) -> Option<&NamedNode> {
        self.get(variable).and_then(RdfTerm::as_named_node)
    }

    /// Get a binding that must be a literal
    pub fn get_literal(&self, variable: &str) -> Option<&Literal> {
        self.get(variable).and_then(RdfTerm::as_literal)
    }

    /// Bind a variable, refusing to overwrite a different value
    ///
    /// Returns false when the variable is already bound to another term.
    pub fn bind(&mut self, variable: &str, term: RdfTerm) -> bool {
        match self.bindings.get(variable) {
            Some(existing) => existing == &term,
            None => {
                self.bindings.insert(variable.to_string(), term);
                true
            }
        }
    }

    /// Keep only the given variables
    pub fn project(&self, variables: &[String]) -> Self {
        let bindings = variables
            .iter()
            .filter_map(|v| self.bindings.get(v).map(|t| (v.clone(), t.clone())))
            .collect();
        Self { bindings }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_is_consistent() {
        let a = RdfTerm::Literal(Literal::new_simple_literal("a"));
        let b = RdfTerm::Literal(Literal::new_simple_literal("b"));
        let mut solution = QuerySolution::new();
        assert!(solution.bind("x", a.clone()));
        assert!(solution.bind("x", a));
        assert!(!solution.bind("x", b));
        assert_eq!(solution.get_literal("x").unwrap().value(), "a");
    }

    #[test]
    fn test_project() {
        let mut solution = QuerySolution::new();
        solution.bind("x", RdfTerm::Literal(Literal::new_simple_literal("1")));
        solution.bind("y", RdfTerm::Literal(Literal::new_simple_literal("2")));
        let projected = solution.project(&["y".to_string(), "z".to_string()]);
        assert_eq!(projected.bindings.len(), 1);
        assert!(projected.get("y").is_some());
    }
}
