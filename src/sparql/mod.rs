//! SPARQL algebra, rendering and evaluation
//!
//! The mapper never builds SPARQL by string concatenation. Queries are
//! assembled as [`SelectQuery`] / [`AskQuery`] values, rendered with
//! `Display` for logs and remote endpoints, and evaluated in memory by
//! [`SparqlExecutor`].
//!
//! # Example
//!
//! ```rust
//! use silex_sparql::rdf::{NamedNode, Quad, Literal, RdfStore};
//! use silex_sparql::sparql::{GraphPattern, PredicatePattern, SelectQuery, SparqlExecutor, TermPattern};
//!
//! let name = NamedNode::new("http://example.org/name").unwrap();
//! let mut store = RdfStore::new();
//! store.insert(Quad::new(
//!     NamedNode::new("http://example.org/p1").unwrap(),
//!     name.clone(),
//!     Literal::new_simple_literal("maize"),
//!     None,
//! ));
//!
//! let query = SelectQuery::distinct(
//!     vec!["s".into()],
//!     vec![GraphPattern::triple(TermPattern::var("s"), PredicatePattern::Iri(name), TermPattern::var("o"))],
//! );
//! let solutions = SparqlExecutor::new(&store).select(&query).unwrap();
//! assert_eq!(solutions.len(), 1);
//! ```

mod algebra;
mod executor;
mod parser;
mod results;

pub use algebra::{
    AskQuery, Expression, GraphPattern, OrderCondition, PredicatePattern, Projection, SelectQuery,
    TermPattern, TriplePatternExpr,
};
pub use executor::SparqlExecutor;
pub use parser::SparqlParser;
pub use results::QuerySolution;

use thiserror::Error;

/// Query building and evaluation errors
#[derive(Error, Debug)]
pub enum QueryError {
    /// Field name not declared by the mapped class
    #[error("Unknown field '{field}' on {type_name}")]
    UnknownField { type_name: String, field: String },

    /// Regular expression rejected by the regex engine
    #[error("Invalid regex '{pattern}': {reason}")]
    InvalidRegex { pattern: String, reason: String },

    /// Rendered text rejected by the SPARQL grammar
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Construct outside the supported subset
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Result set without the expected shape
    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),
}

pub type QueryResult<T> = Result<T, QueryError>;
