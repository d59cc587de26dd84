//! SPARQL syntax checking using the spargebra library
//!
//! Generated queries are plain text once logged or sent to a remote
//! endpoint; parsing them back is how the renderer is kept honest.

use spargebra::{Query, Update};

use super::{QueryError, QueryResult};

/// SPARQL parser
pub struct SparqlParser;

impl SparqlParser {
    /// Parse a SPARQL query string
    pub fn parse_query(query: &str) -> QueryResult<Query> {
        Query::parse(query, None).map_err(|e| QueryError::Syntax(e.to_string()))
    }

    /// Parse a SPARQL UPDATE string
    pub fn parse_update(update: &str) -> QueryResult<Update> {
        Update::parse(update, None).map_err(|e| QueryError::Syntax(e.to_string()))
    }
}
