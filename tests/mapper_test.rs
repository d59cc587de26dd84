//! Integration tests for the object mapper
//!
//! CRUD, search, validation, cascades and URI generation through
//! `SparqlService` over an in-memory graph store.

mod common;

use std::sync::Arc;

use common::{service, vocab, Plot, Sample, Site};
use silex_sparql::mapping::{
    SearchFilter, SearchRequest, SortField, UriError, ValidationError, Value,
};
use silex_sparql::rdf::namespace::{RDFS_LABEL, RDF_TYPE, RDFS_SUB_CLASS_OF};
use silex_sparql::rdf::{ChangeSet, Literal, MemoryGraphStore, NamedNode, Quad, RdfFormat};
use silex_sparql::{MapperConfig, MapperError, SparqlService};

fn iri(s: &str) -> NamedNode {
    NamedNode::new(s).unwrap()
}

fn create_site(service: &SparqlService, label: &str) -> NamedNode {
    service.create(None, &mut Site::new(label)).unwrap()
}

#[test]
fn test_crud_roundtrip() {
    let service = service();
    let site = create_site(&service, "Montpellier");
    assert!(site
        .as_str()
        .starts_with("http://opensilex.dev/id/site/"));

    let mut plot = Plot::new("Plot A");
    plot.area = Some(42.5);
    plot.site = Some(site.clone());
    plot.tags = vec!["irrigated".to_string(), "north".to_string()];
    let uri = service.create(None, &mut plot).unwrap();
    assert_eq!(uri.as_str(), "http://opensilex.dev/id/plot/plot-a");

    let loaded: Plot = service.get_by_uri(None, &uri, None).unwrap().unwrap();
    assert_eq!(loaded, plot);

    plot.area = Some(50.0);
    plot.tags = vec!["south".to_string()];
    service.update(None, &plot).unwrap();
    let loaded: Plot = service.get_by_uri(None, &uri, None).unwrap().unwrap();
    assert_eq!(loaded.area, Some(50.0));
    assert_eq!(loaded.tags, vec!["south".to_string()]);
    assert_eq!(loaded.site, Some(site.clone()));

    service.delete::<Plot>(None, &uri).unwrap();
    assert!(service.get_by_uri::<Plot>(None, &uri, None).unwrap().is_none());
    // the site is not cascaded
    assert!(service.uri_exists::<Site>(None, &site).unwrap());
}

#[test]
fn test_get_by_uri_checks_type() {
    let service = service();
    let site = create_site(&service, "Site");
    assert!(service.get_by_uri::<Plot>(None, &site, None).unwrap().is_none());
    assert!(!service.uri_exists::<Plot>(None, &site).unwrap());

    let plot = service.create(None, &mut Plot::new("P")).unwrap();
    let found: Vec<Plot> = service
        .get_list_by_uris(None, &[site, plot.clone(), iri("http://e.org/missing")], None)
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uri, Some(plot));
}

#[test]
fn test_uri_collisions_get_suffix() {
    let service = service();
    let uris: Vec<String> = (0..3)
        .map(|_| service.create(None, &mut Plot::new("Plot A")).unwrap())
        .map(|uri| uri.as_str().to_string())
        .collect();
    assert_eq!(
        uris,
        vec![
            "http://opensilex.dev/id/plot/plot-a",
            "http://opensilex.dev/id/plot/plot-a_1",
            "http://opensilex.dev/id/plot/plot-a_2",
        ]
    );
}

#[test]
fn test_retries_exhausted() {
    let config = MapperConfig {
        max_uri_retries: 1,
        ..MapperConfig::default()
    };
    let service = SparqlService::new(Arc::new(MemoryGraphStore::new()), config);
    service.create(None, &mut Plot::new("Plot A")).unwrap();
    service.create(None, &mut Plot::new("Plot A")).unwrap();

    let mut third = Plot::new("Plot A");
    assert!(matches!(
        service.create(None, &mut third),
        Err(MapperError::Uri(UriError::Exhausted { attempts: 2, .. }))
    ));
    assert!(third.uri.is_none());
}

#[test]
fn test_collision_with_foreign_resource() {
    let service = service();
    let mut changes = ChangeSet::new();
    changes.insert(Quad::new(
        iri("http://opensilex.dev/id/plot/taken"),
        iri(RDFS_LABEL),
        Literal::new_simple_literal("not a plot"),
        None,
    ));
    service.store().apply(&changes).unwrap();

    let uri = service.create(None, &mut Plot::new("Taken")).unwrap();
    assert_eq!(uri.as_str(), "http://opensilex.dev/id/plot/taken_1");
}

#[test]
fn test_validation_happens_before_write() {
    let service = service();
    let mut sample = Sample {
        uri: None,
        code: None,
    };
    let result = service.create(None, &mut sample);
    match result {
        Err(MapperError::Validation(ValidationError::MissingRequired { fields, .. })) => {
            assert_eq!(fields, vec!["code".to_string()]);
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
    assert!(sample.uri.is_none());
    assert!(service.store().is_empty().unwrap());

    let mut plots = vec![Plot::new("ok"), Plot::new("   ")];
    assert!(matches!(
        service.create_many(None, &mut plots),
        Err(MapperError::Uri(_))
    ));
    assert!(service.store().is_empty().unwrap());
}

#[test]
fn test_update_requires_existing_resource() {
    let service = service();
    let mut plot = Plot::new("Ghost");
    assert!(matches!(
        service.update(None, &plot),
        Err(MapperError::Validation(ValidationError::MissingUri { .. }))
    ));
    plot.uri = Some(iri("http://opensilex.dev/id/plot/ghost"));
    assert!(matches!(
        service.update(None, &plot),
        Err(MapperError::NotFound(_))
    ));
}

#[test]
fn test_ignore_update_if_null_keeps_stored_value() {
    let service = service();
    let site = create_site(&service, "Site");
    let mut plot = Plot::new("P");
    plot.site = Some(site.clone());
    plot.area = Some(1.0);
    let uri = service.create(None, &mut plot).unwrap();

    plot.site = None;
    plot.area = None;
    service.update(None, &plot).unwrap();

    let loaded: Plot = service.get_by_uri(None, &uri, None).unwrap().unwrap();
    assert_eq!(loaded.site, Some(site));
    assert_eq!(loaded.area, None);
}

#[test]
fn test_cascade_delete() {
    let service = service();
    let mut samples = vec![Sample::new("S1"), Sample::new("S2")];
    let sample_uris = service.create_many(None, &mut samples).unwrap();
    let kept = service.create(None, &mut Sample::new("S3")).unwrap();

    let mut plot = Plot::new("With samples");
    plot.samples = sample_uris.clone();
    let uri = service.create(None, &mut plot).unwrap();

    service.delete::<Plot>(None, &uri).unwrap();
    for sample in &sample_uris {
        assert!(!service.uri_exists::<Sample>(None, sample).unwrap());
    }
    assert!(service.uri_exists::<Sample>(None, &kept).unwrap());
}

#[test]
fn test_search_filters_and_order() {
    let service = service();
    let north = create_site(&service, "North");
    let south = create_site(&service, "South");
    for (name, area, site) in [
        ("alpha", 10.0, &north),
        ("beta", 30.0, &north),
        ("gamma", 20.0, &south),
        ("delta", 40.0, &south),
    ] {
        let mut plot = Plot::new(name);
        plot.area = Some(area);
        plot.site = Some(site.clone());
        service.create(None, &mut plot).unwrap();
    }

    let request = SearchRequest::new()
        .filter(SearchFilter::equals("site", north.clone()))
        .order_by(SortField::desc("area"));
    let result = service.search::<Plot>(None, &request).unwrap();
    let names: Vec<&str> = result.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["beta", "alpha"]);
    assert_eq!(result.total, 2);

    let request = SearchRequest::new()
        .filter(SearchFilter::In {
            field: "name".to_string(),
            values: vec![Value::string("gamma"), Value::string("alpha")],
        })
        .order_by(SortField::asc("name"));
    let result = service.search::<Plot>(None, &request).unwrap();
    let names: Vec<&str> = result.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "gamma"]);

    let request = SearchRequest::new().filter(SearchFilter::regex("name", "^(ALPHA|DELTA)$"));
    assert_eq!(service.count::<Plot>(None, &request).unwrap(), 2);

    let unknown = SearchRequest::new().order_by(SortField::asc("colour"));
    assert!(matches!(
        service.search::<Plot>(None, &unknown),
        Err(MapperError::Query(_))
    ));
    let bad_regex = SearchRequest::new().filter(SearchFilter::regex("name", "("));
    assert!(matches!(
        service.count::<Plot>(None, &bad_regex),
        Err(MapperError::Query(_))
    ));
}

#[test]
fn test_pagination_rules() {
    let service = service();
    let mut plots: Vec<Plot> = (0..7).map(|i| Plot::new(&format!("plot {i}"))).collect();
    service.create_many(None, &mut plots).unwrap();
    let ordered = |page: usize, size: usize| {
        SearchRequest::new()
            .order_by(SortField::asc("name"))
            .page(page, size)
    };

    let last = service.search::<Plot>(None, &ordered(2, 3)).unwrap();
    assert_eq!(last.items.len(), 1);
    assert_eq!(last.items[0].name, "plot 6");
    assert_eq!(last.total, 7);
    assert_eq!(last.page_count(), 3);

    let beyond = service.search::<Plot>(None, &ordered(3, 3)).unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 7);

    let unpaged = service.search::<Plot>(None, &SearchRequest::new()).unwrap();
    assert_eq!(unpaged.items.len(), 7);
    assert_eq!(unpaged.page_size, None);
}

#[test]
fn test_label_language_selection() {
    let service = service();
    let uri = create_site(&service, "Field");
    let graph = service.default_graph::<Site>().unwrap();

    let mut changes = ChangeSet::new();
    changes.insert(Quad::new(
        uri.clone(),
        iri(RDFS_LABEL),
        Literal::new_language_tagged_literal("Champ", "fr").unwrap(),
        graph,
    ));
    service.store().apply(&changes).unwrap();

    let english: Site = service.get_by_uri(None, &uri, None).unwrap().unwrap();
    assert_eq!(english.label, "Field");
    let french: Site = service.get_by_uri(None, &uri, Some("fr")).unwrap().unwrap();
    assert_eq!(french.label, "Champ");
}

#[test]
fn test_subclass_instances_are_found() {
    let service = service();
    let ontology = format!(
        "<{}> <{}> <{}> .\n",
        vocab("Microplot").as_str(),
        RDFS_SUB_CLASS_OF,
        vocab("Plot").as_str()
    );
    service
        .load_ontology(None, &ontology, RdfFormat::NTriples)
        .unwrap();

    let micro = iri("http://opensilex.dev/id/plot/micro-1");
    let graph = service.default_graph::<Plot>().unwrap();
    let mut changes = ChangeSet::new();
    changes.insert(Quad::new(micro.clone(), iri(RDF_TYPE), vocab("Microplot"), graph.clone()));
    changes.insert(Quad::new(
        micro.clone(),
        iri(RDFS_LABEL),
        Literal::new_simple_literal("micro 1"),
        graph,
    ));
    service.store().apply(&changes).unwrap();

    assert!(service.uri_exists::<Plot>(None, &micro).unwrap());
    assert_eq!(service.count::<Plot>(None, &SearchRequest::new()).unwrap(), 1);
    let loaded: Plot = service.get_by_uri(None, &micro, None).unwrap().unwrap();
    assert_eq!(loaded.name, "micro 1");
}

#[test]
fn test_explicit_graph_overrides_default() {
    let service = service();
    let graph = iri("http://opensilex.dev/set/experiment-1");
    let uri = service.create(Some(&graph), &mut Plot::new("Scoped")).unwrap();

    assert!(service.uri_exists::<Plot>(Some(&graph), &uri).unwrap());
    assert!(!service.uri_exists::<Plot>(None, &uri).unwrap());
    assert_eq!(service.clear_graph(&graph).unwrap(), 2);
    assert!(!service.uri_exists::<Plot>(Some(&graph), &uri).unwrap());
}

#[test]
fn test_descriptors_are_built_once() {
    let service = service();
    let first = service.descriptor::<Plot>().unwrap();
    let second = service.descriptor::<Plot>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(
        service.generation_prefix::<Plot>().unwrap(),
        "http://opensilex.dev/id/plot"
    );
}

#[test]
fn test_update_and_delete_many() {
    let service = service();
    let mut plots = vec![Plot::new("one"), Plot::new("two"), Plot::new("three")];
    let uris = service.create_many(None, &mut plots).unwrap();

    for (i, plot) in plots.iter_mut().enumerate() {
        plot.area = Some(i as f64 * 10.0);
    }
    service.update_many(None, &plots).unwrap();
    let loaded: Vec<Plot> = service.get_list_by_uris(None, &uris, None).unwrap();
    let areas: Vec<Option<f64>> = loaded.iter().map(|p| p.area).collect();
    assert_eq!(areas, vec![Some(0.0), Some(10.0), Some(20.0)]);

    // one missing resource aborts the whole batch
    let mut ghost = Plot::new("ghost");
    ghost.uri = Some(iri("http://opensilex.dev/id/plot/ghost"));
    plots[0].area = Some(99.0);
    let batch = vec![plots[0].clone(), ghost];
    assert!(matches!(
        service.update_many(None, &batch),
        Err(MapperError::NotFound(_))
    ));
    let first: Plot = service.get_by_uri(None, &uris[0], None).unwrap().unwrap();
    assert_eq!(first.area, Some(0.0));

    service.delete_many::<Plot>(None, &uris[..2]).unwrap();
    assert_eq!(service.count::<Plot>(None, &SearchRequest::new()).unwrap(), 1);
    assert!(service.uri_exists::<Plot>(None, &uris[2]).unwrap());
}

#[test]
fn test_get_by_unique_property() {
    let service = service();
    let mut with_code = Site::new("Coded");
    with_code.code = Some("MTP".to_string());
    let uri = service.create(None, &mut with_code).unwrap();

    let found: Site = service
        .get_by_unique_property(None, "code", "MTP", None)
        .unwrap()
        .unwrap();
    assert_eq!(found.uri, Some(uri));
    assert!(service
        .get_by_unique_property::<Site>(None, "code", "NONE", None)
        .unwrap()
        .is_none());
    assert!(service.exists_by_unique_property::<Site>(None, "code", "MTP").unwrap());
    assert!(!service.exists_by_unique_property::<Site>(None, "code", "NONE").unwrap());

    let mut twin = Site::new("Twin");
    twin.code = Some("MTP".to_string());
    service.create(None, &mut twin).unwrap();
    assert!(matches!(
        service.get_by_unique_property::<Site>(None, "code", "MTP", None),
        Err(MapperError::NotUnique { count: 2, .. })
    ));
}

#[test]
fn test_delete_by_object_relation() {
    let service = service();
    let north = create_site(&service, "North");
    let south = create_site(&service, "South");
    for (name, site) in [("a", &north), ("b", &north), ("c", &south)] {
        let mut plot = Plot::new(name);
        plot.site = Some(site.clone());
        service.create(None, &mut plot).unwrap();
    }

    assert_eq!(
        service
            .delete_by_object_relation::<Plot>(None, "site", &north)
            .unwrap(),
        2
    );
    let left = service.search::<Plot>(None, &SearchRequest::new()).unwrap();
    assert_eq!(left.items.len(), 1);
    assert_eq!(left.items[0].name, "c");
    assert!(service.uri_exists::<Site>(None, &north).unwrap());
}

#[test]
fn test_rename_graph() {
    let service = service();
    let draft = iri("http://opensilex.dev/set/draft");
    let published = iri("http://opensilex.dev/set/published");
    let uri = service.create(Some(&draft), &mut Plot::new("Moved")).unwrap();

    assert_eq!(service.rename_graph(&draft, &published).unwrap(), 2);
    assert!(!service.uri_exists::<Plot>(Some(&draft), &uri).unwrap());
    let moved: Plot = service
        .get_by_uri(Some(&published), &uri, None)
        .unwrap()
        .unwrap();
    assert_eq!(moved.name, "Moved");
    assert_eq!(service.store().len().unwrap(), 2);
}

#[test]
fn test_concurrent_creates_never_share_a_uri() {
    let service = service();
    let created = std::sync::Mutex::new(Vec::new());
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for _ in 0..10 {
                    let mut plot = Plot::new("Plot A");
                    let uri = service.create(None, &mut plot).unwrap();
                    created.lock().unwrap().push(uri);
                }
            });
        }
    });

    let mut uris = created.into_inner().unwrap();
    uris.sort();
    uris.dedup();
    assert_eq!(uris.len(), 80);
    assert_eq!(service.count::<Plot>(None, &SearchRequest::new()).unwrap(), 80);
    for uri in &uris {
        let plot: Plot = service.get_by_uri(None, uri, None).unwrap().unwrap();
        assert_eq!(plot.name, "Plot A");
    }
}
