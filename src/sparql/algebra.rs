//! Query algebra for the subset of SPARQL 1.1 the mapper generates
//!
//! Every value renders to SPARQL text through `Display`. The same values are
//! evaluated directly by [`super::SparqlExecutor`], so the text that is
//! logged is the query that ran.

use std::fmt::{self, Write as _};

use crate::rdf::{Literal, NamedNode, RdfTerm};

/// Subject or object position of a triple pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermPattern {
    Variable(String),
    Term(RdfTerm),
}

impl TermPattern {
    pub fn var(name: impl Into<String>) -> Self {
        TermPattern::Variable(name.into())
    }

    pub fn iri(node: &NamedNode) -> Self {
        TermPattern::Term(RdfTerm::NamedNode(node.clone()))
    }
}

impl fmt::Display for TermPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TermPattern::Variable(name) => write!(f, "?{}", name),
            TermPattern::Term(term) => write!(f, "{}", term),
        }
    }
}

/// Predicate position, including the property paths used for hierarchies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredicatePattern {
    Iri(NamedNode),
    Variable(String),
    /// `p*`
    ZeroOrMore(NamedNode),
    /// `p+`
    OneOrMore(NamedNode),
}

impl fmt::Display for PredicatePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicatePattern::Iri(p) => write!(f, "{}", p),
            PredicatePattern::Variable(name) => write!(f, "?{}", name),
            PredicatePattern::ZeroOrMore(p) => write!(f, "{}*", p),
            PredicatePattern::OneOrMore(p) => write!(f, "{}+", p),
        }
    }
}

/// A single triple pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriplePatternExpr {
    pub subject: TermPattern,
    pub predicate: PredicatePattern,
    pub object: TermPattern,
}

impl TriplePatternExpr {
    pub fn new(subject: TermPattern, predicate: PredicatePattern, object: TermPattern) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for TriplePatternExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Filter expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Equal(TermPattern, TermPattern),
    In(TermPattern, Vec<RdfTerm>),
    Regex {
        variable: String,
        pattern: String,
        case_insensitive: bool,
    },
    /// Untagged literals, or tags matching the language range
    LangMatches {
        variable: String,
        language: String,
    },
    Bound(String),
    IsBlank(String),
    Not(Box<Expression>),
    And(Vec<Expression>),
    Or(Vec<Expression>),
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Equal(a, b) => write!(f, "{} = {}", a, b),
            Expression::In(a, terms) => {
                let list: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
                write!(f, "{} IN ({})", a, list.join(", "))
            }
            Expression::Regex {
                variable,
                pattern,
                case_insensitive,
            } => {
                let pattern = Literal::new_simple_literal(pattern.as_str());
                if *case_insensitive {
                    write!(f, "REGEX(STR(?{}), {}, \"i\")", variable, pattern)
                } else {
                    write!(f, "REGEX(STR(?{}), {})", variable, pattern)
                }
            }
            Expression::LangMatches { variable, language } => write!(
                f,
                "(LANG(?{v}) = \"\" || LANGMATCHES(LANG(?{v}), {lang}))",
                v = variable,
                lang = Literal::new_simple_literal(language.as_str())
            ),
            Expression::Bound(variable) => write!(f, "BOUND(?{})", variable),
            Expression::IsBlank(variable) => write!(f, "isBlank(?{})", variable),
            Expression::Not(inner) => write!(f, "!({})", inner),
            Expression::And(parts) => write_joined(f, parts, " && ", "true"),
            Expression::Or(parts) => write_joined(f, parts, " || ", "false"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    parts: &[Expression],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    if parts.is_empty() {
        return f.write_str(empty);
    }
    let rendered: Vec<String> = parts.iter().map(|p| p.to_string()).collect();
    write!(f, "({})", rendered.join(separator))
}

/// Group graph pattern elements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphPattern {
    Triple(TriplePatternExpr),
    Optional(Vec<GraphPattern>),
    Graph(NamedNode, Vec<GraphPattern>),
    Group(Vec<GraphPattern>),
    Filter(Expression),
}

impl GraphPattern {
    pub fn triple(subject: TermPattern, predicate: PredicatePattern, object: TermPattern) -> Self {
        GraphPattern::Triple(TriplePatternExpr::new(subject, predicate, object))
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        match self {
            GraphPattern::Triple(t) => {
                let _ = writeln!(out, "{}{}", indent, t);
            }
            GraphPattern::Filter(e) => {
                let _ = writeln!(out, "{}FILTER({})", indent, e);
            }
            GraphPattern::Optional(inner) => {
                let _ = writeln!(out, "{}OPTIONAL {{", indent);
                write_group(out, inner, depth + 1);
                let _ = writeln!(out, "{}}}", indent);
            }
            GraphPattern::Graph(graph, inner) => {
                let _ = writeln!(out, "{}GRAPH {} {{", indent, graph);
                write_group(out, inner, depth + 1);
                let _ = writeln!(out, "{}}}", indent);
            }
            GraphPattern::Group(inner) => {
                let _ = writeln!(out, "{}{{", indent);
                write_group(out, inner, depth + 1);
                let _ = writeln!(out, "{}}}", indent);
            }
        }
    }
}

fn write_group(out: &mut String, patterns: &[GraphPattern], depth: usize) {
    for pattern in patterns {
        pattern.write(out, depth);
    }
}

/// ORDER BY condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCondition {
    pub variable: String,
    pub descending: bool,
}

impl OrderCondition {
    pub fn asc(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            descending: false,
        }
    }

    pub fn desc(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            descending: true,
        }
    }
}

impl fmt::Display for OrderCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = if self.descending { "DESC" } else { "ASC" };
        write!(f, "{}(?{})", direction, self.variable)
    }
}

/// SELECT clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Variables(Vec<String>),
    /// `(COUNT(DISTINCT ?variable) AS ?alias)`
    CountDistinct { variable: String, alias: String },
}

/// SELECT query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub distinct: bool,
    pub projection: Projection,
    pub pattern: Vec<GraphPattern>,
    pub order_by: Vec<OrderCondition>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SelectQuery {
    /// `SELECT DISTINCT` over the given variables
    pub fn distinct(variables: Vec<String>, pattern: Vec<GraphPattern>) -> Self {
        Self {
            distinct: true,
            projection: Projection::Variables(variables),
            pattern,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Projected variable names
    pub fn variables(&self) -> Vec<&str> {
        match &self.projection {
            Projection::Variables(vars) => vars.iter().map(|v| v.as_str()).collect(),
            Projection::CountDistinct { alias, .. } => vec![alias.as_str()],
        }
    }
}

impl fmt::Display for SelectQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("SELECT ");
        match &self.projection {
            Projection::Variables(vars) => {
                if self.distinct {
                    out.push_str("DISTINCT ");
                }
                if vars.is_empty() {
                    out.push('*');
                } else {
                    let vars: Vec<String> = vars.iter().map(|v| format!("?{}", v)).collect();
                    out.push_str(&vars.join(" "));
                }
            }
            Projection::CountDistinct { variable, alias } => {
                let _ = write!(out, "(COUNT(DISTINCT ?{}) AS ?{})", variable, alias);
            }
        }
        out.push_str("\nWHERE {\n");
        write_group(&mut out, &self.pattern, 1);
        out.push('}');
        if !self.order_by.is_empty() {
            let conditions: Vec<String> = self.order_by.iter().map(|c| c.to_string()).collect();
            let _ = write!(out, "\nORDER BY {}", conditions.join(" "));
        }
        if let Some(limit) = self.limit {
            let _ = write!(out, "\nLIMIT {}", limit);
        }
        if let Some(offset) = self.offset {
            let _ = write!(out, "\nOFFSET {}", offset);
        }
        f.write_str(&out)
    }
}

/// ASK query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskQuery {
    pub pattern: Vec<GraphPattern>,
}

impl AskQuery {
    pub fn new(pattern: Vec<GraphPattern>) -> Self {
        Self { pattern }
    }
}

impl fmt::Display for AskQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::from("ASK {\n");
        write_group(&mut out, &self.pattern, 1);
        out.push('}');
        f.write_str(&out)
    }
}
