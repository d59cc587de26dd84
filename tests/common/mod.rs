//! Mapped types shared by the integration tests
#![allow(dead_code)]

use std::sync::Arc;

use silex_sparql::mapping::{
    Datatype, MappingResult, PropertyDefinition, ResourceDefinition, ResourceInstance,
    SparqlResource, Value,
};
use silex_sparql::rdf::namespace::RDFS;
use silex_sparql::rdf::{MemoryGraphStore, NamedNode, Vocabulary};
use silex_sparql::{MapperConfig, SparqlService};

pub const VOCAB: Vocabulary = Vocabulary::new(
    "ex",
    "http://example.org/vocab#",
    &[
        "Plot", "Microplot", "Site", "Sample", "hasArea", "hasSite", "hasTag", "hasSample",
        "hasCode",
    ],
);

pub fn vocab(local: &str) -> NamedNode {
    NamedNode::new(format!("{}{}", VOCAB.namespace, local)).unwrap()
}

pub fn service() -> SparqlService {
    SparqlService::new(Arc::new(MemoryGraphStore::new()), MapperConfig::default())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    pub uri: Option<NamedNode>,
    pub label: String,
    pub code: Option<String>,
}

impl Site {
    pub fn new(label: &str) -> Self {
        Self {
            uri: None,
            label: label.to_string(),
            code: None,
        }
    }
}

impl SparqlResource for Site {
    fn definition() -> ResourceDefinition {
        ResourceDefinition::new("Site")
            .ontology(VOCAB)
            .resource("Site")
            .graph("site")
            .property(PropertyDefinition::label("label", RDFS, "label").required())
            .property(PropertyDefinition::data("code", VOCAB, "hasCode", Datatype::String))
    }

    fn uri(&self) -> Option<&NamedNode> {
        self.uri.as_ref()
    }

    fn set_uri(&mut self, uri: NamedNode) {
        self.uri = Some(uri);
    }

    fn to_instance(&self) -> ResourceInstance {
        let mut instance = ResourceInstance::new(self.uri.clone());
        instance
            .set("label", self.label.as_str())
            .set_opt("code", self.code.as_deref());
        instance
    }

    fn from_instance(instance: ResourceInstance) -> MappingResult<Self> {
        Ok(Self {
            label: instance.string("label").unwrap_or_default(),
            code: instance.string("code"),
            uri: instance.uri,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub uri: Option<NamedNode>,
    pub code: Option<String>,
}

impl Sample {
    pub fn new(code: &str) -> Self {
        Self {
            uri: None,
            code: Some(code.to_string()),
        }
    }
}

impl SparqlResource for Sample {
    fn definition() -> ResourceDefinition {
        ResourceDefinition::new("Sample")
            .ontology(VOCAB)
            .resource("Sample")
            .graph("sample")
            .property(
                PropertyDefinition::data("code", VOCAB, "hasCode", Datatype::String).required(),
            )
    }

    fn uri(&self) -> Option<&NamedNode> {
        self.uri.as_ref()
    }

    fn set_uri(&mut self, uri: NamedNode) {
        self.uri = Some(uri);
    }

    fn to_instance(&self) -> ResourceInstance {
        let mut instance = ResourceInstance::new(self.uri.clone());
        instance.set_opt("code", self.code.as_deref());
        instance
    }

    fn from_instance(instance: ResourceInstance) -> MappingResult<Self> {
        Ok(Self {
            code: instance.string("code"),
            uri: instance.uri,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub uri: Option<NamedNode>,
    pub name: String,
    pub area: Option<f64>,
    pub site: Option<NamedNode>,
    pub tags: Vec<String>,
    pub samples: Vec<NamedNode>,
}

impl Plot {
    pub fn new(name: &str) -> Self {
        Self {
            uri: None,
            name: name.to_string(),
            area: None,
            site: None,
            tags: Vec::new(),
            samples: Vec::new(),
        }
    }
}

impl SparqlResource for Plot {
    fn definition() -> ResourceDefinition {
        ResourceDefinition::new("Plot")
            .ontology(VOCAB)
            .resource("Plot")
            .graph("plot")
            .uri_generator("name")
            .property(PropertyDefinition::data("name", RDFS, "label", Datatype::String).required())
            .property(PropertyDefinition::data("area", VOCAB, "hasArea", Datatype::Double))
            .property(
                PropertyDefinition::object::<Site>("site", VOCAB, "hasSite").ignore_update_if_null(),
            )
            .property(PropertyDefinition::data_list("tags", VOCAB, "hasTag", Datatype::String))
            .property(
                PropertyDefinition::object_list::<Sample>("samples", VOCAB, "hasSample")
                    .cascade_delete(),
            )
    }

    fn uri(&self) -> Option<&NamedNode> {
        self.uri.as_ref()
    }

    fn set_uri(&mut self, uri: NamedNode) {
        self.uri = Some(uri);
    }

    fn to_instance(&self) -> ResourceInstance {
        let mut instance = ResourceInstance::new(self.uri.clone());
        instance
            .set("name", self.name.as_str())
            .set_opt("area", self.area)
            .set_opt("site", self.site.clone())
            .set_list("tags", self.tags.iter().map(String::as_str))
            .set_list("samples", self.samples.clone());
        instance
    }

    fn from_instance(instance: ResourceInstance) -> MappingResult<Self> {
        Ok(Self {
            name: instance.string("name").unwrap_or_default(),
            area: instance.single("area").and_then(Value::as_f64),
            site: instance.iri("site"),
            tags: instance
                .list("tags")
                .iter()
                .map(|v| v.as_str().to_string())
                .collect(),
            samples: instance.iris("samples"),
            uri: instance.uri,
        })
    }
}
