//! Turtle and N-Triples support on top of rio

use std::io::BufRead;

use rio_api::formatter::TriplesFormatter;
use rio_api::model;
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, NTriplesParser, TurtleFormatter, TurtleParser};

use super::{ParseError, ParseResult, RdfFormat, SerializeError, SerializeResult};
use crate::rdf::namespace::XSD_STRING;
use crate::rdf::{BlankNode, Literal, NamedNode, RdfObject, RdfSubject, Triple};

pub(super) fn parse(reader: impl BufRead, format: RdfFormat) -> ParseResult<Vec<Triple>> {
    let mut triples = Vec::new();
    let mut on_triple = |t: model::Triple<'_>| -> Result<(), ParseError> {
        triples.push(Triple::new(
            convert_subject(t.subject)?,
            named(t.predicate)?,
            convert_object(t.object)?,
        ));
        Ok(())
    };
    match format {
        RdfFormat::Turtle => TurtleParser::new(reader, None).parse_all(&mut on_triple)?,
        RdfFormat::NTriples => NTriplesParser::new(reader).parse_all(&mut on_triple)?,
    }
    Ok(triples)
}

pub(super) fn serialize(triples: &[Triple], format: RdfFormat) -> SerializeResult<String> {
    let output = match format {
        RdfFormat::Turtle => {
            let mut formatter = TurtleFormatter::new(Vec::new());
            for triple in triples {
                write_triple(triple, |t| formatter.format(t))?;
            }
            formatter.finish()?
        }
        RdfFormat::NTriples => {
            let mut formatter = NTriplesFormatter::new(Vec::new());
            for triple in triples {
                write_triple(triple, |t| formatter.format(t))?;
            }
            formatter.finish()?
        }
    };
    String::from_utf8(output).map_err(|e| SerializeError::Serialize(e.to_string()))
}

fn write_triple<F>(triple: &Triple, mut sink: F) -> std::io::Result<()>
where
    F: FnMut(&model::Triple<'_>) -> std::io::Result<()>,
{
    let subject = match &triple.subject {
        RdfSubject::NamedNode(n) => model::Subject::NamedNode(model::NamedNode { iri: n.as_str() }),
        RdfSubject::BlankNode(b) => model::Subject::BlankNode(model::BlankNode { id: b.as_str() }),
    };
    let object = match &triple.object {
        RdfObject::NamedNode(n) => model::Term::NamedNode(model::NamedNode { iri: n.as_str() }),
        RdfObject::BlankNode(b) => model::Term::BlankNode(model::BlankNode { id: b.as_str() }),
        RdfObject::Literal(l) => model::Term::Literal(match l.language() {
            Some(language) => model::Literal::LanguageTaggedString {
                value: l.value(),
                language,
            },
            None if l.datatype_iri() == XSD_STRING => model::Literal::Simple { value: l.value() },
            None => model::Literal::Typed {
                value: l.value(),
                datatype: model::NamedNode {
                    iri: l.datatype_iri(),
                },
            },
        }),
    };
    sink(&model::Triple {
        subject,
        predicate: model::NamedNode {
            iri: triple.predicate.as_str(),
        },
        object,
    })
}

fn named(n: model::NamedNode<'_>) -> Result<NamedNode, ParseError> {
    NamedNode::new(n.iri).map_err(|e| ParseError::InvalidTerm(e.to_string()))
}

fn blank(b: model::BlankNode<'_>) -> Result<BlankNode, ParseError> {
    BlankNode::from_id(b.id).map_err(|e| ParseError::InvalidTerm(e.to_string()))
}

fn convert_subject(s: model::Subject<'_>) -> Result<RdfSubject, ParseError> {
    match s {
        model::Subject::NamedNode(n) => Ok(RdfSubject::NamedNode(named(n)?)),
        model::Subject::BlankNode(b) => Ok(RdfSubject::BlankNode(blank(b)?)),
        _ => Err(ParseError::InvalidTerm("quoted triple subject".to_string())),
    }
}

fn convert_object(o: model::Term<'_>) -> Result<RdfObject, ParseError> {
    match o {
        model::Term::NamedNode(n) => Ok(RdfObject::NamedNode(named(n)?)),
        model::Term::BlankNode(b) => Ok(RdfObject::BlankNode(blank(b)?)),
        model::Term::Literal(model::Literal::Simple { value }) => {
            Ok(RdfObject::Literal(Literal::new_simple_literal(value)))
        }
        model::Term::Literal(model::Literal::LanguageTaggedString { value, language }) => {
            Literal::new_language_tagged_literal(value, language)
                .map(RdfObject::Literal)
                .map_err(|e| ParseError::InvalidTerm(e.to_string()))
        }
        model::Term::Literal(model::Literal::Typed { value, datatype }) => Ok(RdfObject::Literal(
            Literal::new_typed_literal(value, named(datatype)?),
        )),
        _ => Err(ParseError::InvalidTerm("quoted triple object".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::super::{RdfParser, RdfSerializer};
    use super::*;

    const ONTOLOGY: &str = r#"
        @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
        @prefix ex: <http://example.org/> .
        ex:Plant rdfs:subClassOf ex:Organism ;
                 rdfs:label "Plant"@en, "Plante"@fr .
        ex:Organism rdfs:label "Organism" .
    "#;

    #[test]
    fn test_parse_turtle() {
        let triples = RdfParser::parse(ONTOLOGY, RdfFormat::Turtle).unwrap();
        assert_eq!(triples.len(), 4);
        assert!(triples
            .iter()
            .any(|t| t.object.as_literal().and_then(|l| l.language()) == Some("fr")));
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let result = RdfParser::parse("ex:a ex:b", RdfFormat::Turtle);
        assert!(matches!(result, Err(ParseError::Syntax(_))));
    }

    #[test]
    fn test_ntriples_output_reparses() {
        let triples = RdfParser::parse(ONTOLOGY, RdfFormat::Turtle).unwrap();
        let output = RdfSerializer::serialize(&triples, RdfFormat::NTriples).unwrap();
        let reparsed = RdfParser::parse(&output, RdfFormat::NTriples).unwrap();
        assert_eq!(reparsed.len(), triples.len());
        assert!(output.contains("\"Plante\"@fr"));
    }
}
