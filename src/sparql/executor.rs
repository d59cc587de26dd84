//! In-memory evaluation of the query algebra
//!
//! Evaluation is substitution based: each group element extends the current
//! solutions. Filters are collected and applied once the whole group has been
//! evaluated, which is SPARQL's scoping rule for `FILTER`.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use regex::{Regex, RegexBuilder};
use tracing::trace;

use super::algebra::{
    AskQuery, Expression, GraphPattern, PredicatePattern, Projection, SelectQuery, TermPattern,
    TriplePatternExpr,
};
use super::results::QuerySolution;
use super::{QueryError, QueryResult};
use crate::rdf::namespace::XSD;
use crate::rdf::schema::HierarchyWalker;
use crate::rdf::{GraphScope, Literal, NamedNode, QuadPattern, RdfStore, RdfTerm};

/// SPARQL executor over an [`RdfStore`]
pub struct SparqlExecutor<'a> {
    store: &'a RdfStore,
    regexes: RefCell<HashMap<(String, bool), Regex>>,
}

impl<'a> SparqlExecutor<'a> {
    /// Create a new executor
    pub fn new(store: &'a RdfStore) -> Self {
        Self {
            store,
            regexes: RefCell::new(HashMap::new()),
        }
    }

    /// Evaluate a SELECT query
    pub fn select(&self, query: &SelectQuery) -> QueryResult<Vec<QuerySolution>> {
        let mut solutions =
            self.eval_group(&query.pattern, vec![QuerySolution::new()], &GraphScope::Union)?;
        trace!("{} raw solutions", solutions.len());

        if !query.order_by.is_empty() {
            solutions.sort_by(|a, b| {
                for condition in &query.order_by {
                    let ordering = compare_bindings(
                        a.get(&condition.variable),
                        b.get(&condition.variable),
                    );
                    let ordering = if condition.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let projected = match &query.projection {
            Projection::Variables(variables) => {
                let mut projected: Vec<QuerySolution> = if variables.is_empty() {
                    solutions
                } else {
                    solutions.iter().map(|s| s.project(variables)).collect()
                };
                if query.distinct {
                    let mut seen = HashSet::new();
                    projected.retain(|s| {
                        let mut key: Vec<(String, RdfTerm)> = s
                            .bindings
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone()))
                            .collect();
                        key.sort();
                        seen.insert(key)
                    });
                }
                projected
            }
            Projection::CountDistinct { variable, alias } => {
                let distinct: HashSet<&RdfTerm> =
                    solutions.iter().filter_map(|s| s.get(variable)).collect();
                let count = Literal::new_typed_literal(
                    distinct.len().to_string(),
                    NamedNode::new(XSD.iri("integer"))
                        .map_err(|e| QueryError::Unsupported(e.to_string()))?,
                );
                let mut solution = QuerySolution::new();
                solution.bind(alias, RdfTerm::Literal(count));
                vec![solution]
            }
        };

        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(projected.into_iter().skip(offset).take(limit).collect())
    }

    /// Evaluate an ASK query
    pub fn ask(&self, query: &AskQuery) -> QueryResult<bool> {
        let solutions =
            self.eval_group(&query.pattern, vec![QuerySolution::new()], &GraphScope::Union)?;
        Ok(!solutions.is_empty())
    }

    fn eval_group(
        &self,
        patterns: &[GraphPattern],
        input: Vec<QuerySolution>,
        scope: &GraphScope,
    ) -> QueryResult<Vec<QuerySolution>> {
        let mut solutions = input;
        let mut filters = Vec::new();

        for pattern in patterns {
            solutions = match pattern {
                GraphPattern::Triple(triple) => solutions
                    .iter()
                    .flat_map(|s| self.match_triple(triple, s, scope))
                    .collect(),
                GraphPattern::Optional(inner) => {
                    let mut joined = Vec::with_capacity(solutions.len());
                    for solution in solutions {
                        let extended = self.eval_group(inner, vec![solution.clone()], scope)?;
                        if extended.is_empty() {
                            joined.push(solution);
                        } else {
                            joined.extend(extended);
                        }
                    }
                    joined
                }
                GraphPattern::Graph(graph, inner) => {
                    self.eval_group(inner, solutions, &GraphScope::Named(graph.clone()))?
                }
                GraphPattern::Group(inner) => self.eval_group(inner, solutions, scope)?,
                GraphPattern::Filter(expression) => {
                    filters.push(expression);
                    solutions
                }
            };
        }

        if filters.is_empty() {
            return Ok(solutions);
        }
        let mut kept = Vec::with_capacity(solutions.len());
        for solution in solutions {
            let mut pass = true;
            for filter in &filters {
                if self.evaluate(filter, &solution)? != Some(true) {
                    pass = false;
                    break;
                }
            }
            if pass {
                kept.push(solution);
            }
        }
        Ok(kept)
    }

    fn match_triple(
        &self,
        triple: &TriplePatternExpr,
        solution: &QuerySolution,
        scope: &GraphScope,
    ) -> Vec<QuerySolution> {
        let subject = resolve(&triple.subject, solution);
        let object = resolve(&triple.object, solution);

        match &triple.predicate {
            PredicatePattern::Iri(predicate) => {
                self.match_simple(triple, solution, scope, subject, Some(predicate.clone()), object)
            }
            PredicatePattern::Variable(name) => match solution.get(name) {
                Some(RdfTerm::NamedNode(bound)) => self.match_simple(
                    triple,
                    solution,
                    scope,
                    subject,
                    Some(bound.clone()),
                    object,
                ),
                Some(_) => Vec::new(),
                None => self.match_simple(triple, solution, scope, subject, None, object),
            },
            PredicatePattern::ZeroOrMore(predicate) => {
                self.match_path(triple, solution, scope, subject, object, predicate, true)
            }
            PredicatePattern::OneOrMore(predicate) => {
                self.match_path(triple, solution, scope, subject, object, predicate, false)
            }
        }
    }

    fn match_simple(
        &self,
        triple: &TriplePatternExpr,
        solution: &QuerySolution,
        scope: &GraphScope,
        subject: Option<RdfTerm>,
        predicate: Option<NamedNode>,
        object: Option<RdfTerm>,
    ) -> Vec<QuerySolution> {
        let mut pattern = QuadPattern::any().in_scope(scope.clone());
        if let Some(subject) = &subject {
            match subject.to_subject() {
                Some(s) => pattern = pattern.with_subject(s),
                None => return Vec::new(),
            }
        }
        if let Some(predicate) = predicate {
            pattern = pattern.with_predicate(predicate);
        }
        if let Some(object) = &object {
            pattern = pattern.with_object(object.to_object());
        }

        let mut matches = Vec::new();
        for quad in self.store.match_quads(&pattern) {
            let mut extended = solution.clone();
            let bound = bind_pattern(&mut extended, &triple.subject, RdfTerm::from(quad.subject.clone()))
                && bind_predicate(&mut extended, &triple.predicate, &quad.predicate)
                && bind_pattern(&mut extended, &triple.object, RdfTerm::from(quad.object.clone()));
            if bound {
                matches.push(extended);
            }
        }
        matches
    }

    #[allow(clippy::too_many_arguments)]
    fn match_path(
        &self,
        triple: &TriplePatternExpr,
        solution: &QuerySolution,
        scope: &GraphScope,
        subject: Option<RdfTerm>,
        object: Option<RdfTerm>,
        predicate: &NamedNode,
        zero_length: bool,
    ) -> Vec<QuerySolution> {
        let walker = HierarchyWalker::new(self.store, predicate, scope.clone());

        let pairs: Vec<(RdfTerm, RdfTerm)> = match (subject, object) {
            (Some(s), Some(o)) => {
                let reachable = if zero_length {
                    walker.reaches(&s, &o)
                } else {
                    walker.ancestors(&s).contains(&o)
                };
                if reachable {
                    vec![(s, o)]
                } else {
                    Vec::new()
                }
            }
            (Some(s), None) => with_self(&s, walker.ancestors(&s), zero_length)
                .into_iter()
                .map(|o| (s.clone(), o))
                .collect(),
            (None, Some(o)) => with_self(&o, walker.descendants(&o, None), zero_length)
                .into_iter()
                .map(|s| (s, o.clone()))
                .collect(),
            (None, None) => walker
                .nodes()
                .into_iter()
                .flat_map(|s| {
                    with_self(&s, walker.ancestors(&s), zero_length)
                        .into_iter()
                        .map(move |o| (s.clone(), o))
                        .collect::<Vec<_>>()
                })
                .collect(),
        };

        pairs
            .into_iter()
            .filter_map(|(s, o)| {
                let mut extended = solution.clone();
                (bind_pattern(&mut extended, &triple.subject, s)
                    && bind_pattern(&mut extended, &triple.object, o))
                .then_some(extended)
            })
            .collect()
    }

    /// Three-valued evaluation: `None` is a SPARQL expression error
    fn evaluate(&self, expression: &Expression, solution: &QuerySolution) -> QueryResult<Option<bool>> {
        Ok(match expression {
            Expression::Equal(a, b) => match (resolve(a, solution), resolve(b, solution)) {
                (Some(a), Some(b)) => Some(terms_equal(&a, &b)),
                _ => None,
            },
            Expression::In(a, terms) => {
                resolve(a, solution).map(|a| terms.iter().any(|t| terms_equal(&a, t)))
            }
            Expression::Regex {
                variable,
                pattern,
                case_insensitive,
            } => match solution.get(variable) {
                Some(term) => {
                    let text = match term {
                        RdfTerm::NamedNode(n) => n.as_str(),
                        RdfTerm::Literal(l) => l.value(),
                        RdfTerm::BlankNode(_) => return Ok(None),
                    };
                    Some(self.regex(pattern, *case_insensitive)?.is_match(text))
                }
                None => None,
            },
            Expression::LangMatches { variable, language } => {
                solution.get_literal(variable).map(|literal| match literal.language() {
                    None => true,
                    Some(tag) => language_matches(tag, language),
                })
            }
            Expression::Bound(variable) => Some(solution.get(variable).is_some()),
            Expression::IsBlank(variable) => solution
                .get(variable)
                .map(|t| matches!(t, RdfTerm::BlankNode(_))),
            Expression::Not(inner) => self.evaluate(inner, solution)?.map(|b| !b),
            Expression::And(parts) => {
                let mut result = Some(true);
                for part in parts {
                    match self.evaluate(part, solution)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                result
            }
            Expression::Or(parts) => {
                let mut result = Some(false);
                for part in parts {
                    match self.evaluate(part, solution)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                result
            }
        })
    }

    fn regex(&self, pattern: &str, case_insensitive: bool) -> QueryResult<Regex> {
        let key = (pattern.to_string(), case_insensitive);
        if let Some(regex) = self.regexes.borrow().get(&key) {
            return Ok(regex.clone());
        }
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| QueryError::InvalidRegex {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
        self.regexes.borrow_mut().insert(key, regex.clone());
        Ok(regex)
    }
}

fn resolve(pattern: &TermPattern, solution: &QuerySolution) -> Option<RdfTerm> {
    match pattern {
        TermPattern::Variable(name) => solution.get(name).cloned(),
        TermPattern::Term(term) => Some(term.clone()),
    }
}

fn bind_pattern(solution: &mut QuerySolution, pattern: &TermPattern, term: RdfTerm) -> bool {
    match pattern {
        TermPattern::Variable(name) => solution.bind(name, term),
        TermPattern::Term(expected) => expected == &term,
    }
}

fn bind_predicate(solution: &mut QuerySolution, pattern: &PredicatePattern, predicate: &NamedNode) -> bool {
    match pattern {
        PredicatePattern::Variable(name) => solution.bind(name, RdfTerm::NamedNode(predicate.clone())),
        _ => true,
    }
}

fn with_self(start: &RdfTerm, mut reached: Vec<RdfTerm>, zero_length: bool) -> Vec<RdfTerm> {
    if zero_length {
        reached.insert(0, start.clone());
    }
    reached
}

fn terms_equal(a: &RdfTerm, b: &RdfTerm) -> bool {
    if let (Some(x), Some(y)) = (
        a.as_literal().and_then(Literal::as_f64),
        b.as_literal().and_then(Literal::as_f64),
    ) {
        return x == y;
    }
    a == b
}

/// RFC 4647 basic filtering, `*` matching any tag
fn language_matches(tag: &str, range: &str) -> bool {
    if range == "*" {
        return !tag.is_empty();
    }
    let tag = tag.to_ascii_lowercase();
    let range = range.to_ascii_lowercase();
    tag == range || tag.starts_with(&format!("{}-", range))
}

fn compare_bindings(a: Option<&RdfTerm>, b: Option<&RdfTerm>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.cmp(b),
    }
}
