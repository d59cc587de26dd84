//! Integration tests for cross-store transactions
//!
//! Verifies commit ordering, compensation, the inconsistency report and the
//! journal trail, with in-memory and on-disk stores.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{service, Plot};
use serde_json::json;
use silex_sparql::document::{
    open_store, Document, DocumentError, DocumentResult, DocumentSession, DocumentStore,
};
use silex_sparql::rdf::{
    AppliedChanges, ChangeSet, GraphStore, MemoryGraphStore, NamedNode, Quad, QuadPattern,
    RdfStoreError, RdfStoreResult,
};
use silex_sparql::sparql::{AskQuery, QuerySolution, SelectQuery};
use silex_sparql::{
    CrossStoreTransaction, MapperConfig, MemoryDocumentStore, SparqlResource, TransactionError,
    TransactionEvent, TransactionJournal,
};
use tempfile::TempDir;

/// Document store whose commits always fail
#[derive(Default)]
struct UnavailableDocuments {
    inner: MemoryDocumentStore,
}

impl DocumentStore for UnavailableDocuments {
    fn commit(&self, _session: &DocumentSession) -> DocumentResult<usize> {
        Err(DocumentError::Unavailable("connection refused".to_string()))
    }

    fn get(&self, collection: &str, uri: &NamedNode) -> DocumentResult<Option<Document>> {
        self.inner.get(collection, uri)
    }

    fn count(&self, collection: &str) -> DocumentResult<usize> {
        self.inner.count(collection)
    }

    fn list(&self, collection: &str) -> DocumentResult<Vec<Document>> {
        self.inner.list(collection)
    }
}

/// Graph store accepting a fixed number of change sets
struct LimitedGraph {
    inner: MemoryGraphStore,
    remaining: AtomicUsize,
}

impl LimitedGraph {
    fn new(applies: usize) -> Self {
        Self {
            inner: MemoryGraphStore::new(),
            remaining: AtomicUsize::new(applies),
        }
    }
}

impl GraphStore for LimitedGraph {
    fn apply(&self, changes: &ChangeSet) -> RdfStoreResult<AppliedChanges> {
        let allowed = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !allowed {
            return Err(RdfStoreError::Unavailable("store went away".to_string()));
        }
        self.inner.apply(changes)
    }

    fn select(&self, query: &SelectQuery) -> RdfStoreResult<Vec<QuerySolution>> {
        self.inner.select(query)
    }

    fn ask(&self, query: &AskQuery) -> RdfStoreResult<bool> {
        self.inner.ask(query)
    }

    fn quads(&self, pattern: &QuadPattern) -> RdfStoreResult<Vec<Quad>> {
        self.inner.quads(pattern)
    }

    fn clear_graph(&self, graph: &NamedNode) -> RdfStoreResult<usize> {
        self.inner.clear_graph(graph)
    }

    fn len(&self) -> RdfStoreResult<usize> {
        self.inner.len()
    }
}

#[test]
fn test_mapped_resource_and_document_commit_together() {
    let service = service();
    let documents = MemoryDocumentStore::new();
    let journal = TransactionJournal::in_memory();
    let transaction = CrossStoreTransaction::new(service.store(), &documents, &journal);

    let uri = transaction
        .execute(|ctx| {
            let mut plot = Plot::new("Plot A");
            let uri = service.stage_create(&mut ctx.graph, None, &mut plot)?;
            ctx.documents
                .insert(Document::new("plots", uri.clone(), json!({"file": "plot-a.csv"})));
            Ok(uri)
        })
        .unwrap();

    assert!(service.uri_exists::<Plot>(None, &uri).unwrap());
    let document = documents.get("plots", &uri).unwrap().unwrap();
    assert_eq!(document.body["file"], "plot-a.csv");
    assert!(journal.unfinished().unwrap().is_empty());
}

#[test]
fn test_validation_failure_rolls_back() {
    let service = service();
    let documents = MemoryDocumentStore::new();
    let journal = TransactionJournal::in_memory();
    let transaction = CrossStoreTransaction::new(service.store(), &documents, &journal);

    let result = transaction.execute(|ctx| {
        let mut good = Plot::new("good");
        service.stage_create(&mut ctx.graph, None, &mut good)?;
        let mut bad = Plot::new("?!");
        service.stage_create(&mut ctx.graph, None, &mut bad)?;
        Ok(())
    });
    assert!(matches!(result, Err(TransactionError::Operation(_))));
    assert!(service.store().is_empty().unwrap());

    let entries = journal.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(matches!(entries[1].event, TransactionEvent::RolledBack { .. }));
}

#[test]
fn test_document_failure_reverts_graph() {
    let graph = MemoryGraphStore::new();
    let documents = UnavailableDocuments::default();
    let journal = TransactionJournal::in_memory();
    let transaction = CrossStoreTransaction::new(&graph, &documents, &journal);

    let result = transaction.execute(|ctx| {
        let mut plot = Plot::new("A");
        plot.uri = Some(NamedNode::new("http://e.org/plot/a").unwrap());
        ctx.graph.insert(Quad::new(
            NamedNode::new("http://e.org/plot/a").unwrap(),
            NamedNode::new("http://e.org/name").unwrap(),
            NamedNode::new("http://e.org/value").unwrap(),
            None,
        ));
        ctx.documents
            .insert(Document::new("plots", plot.uri().unwrap().clone(), json!({})));
        Ok(ctx.id())
    });

    match result {
        Err(TransactionError::DocumentCommit {
            compensated: true,
            source: DocumentError::Unavailable(_),
        }) => {}
        other => panic!("expected a compensated document failure, got {:?}", other),
    }
    assert!(graph.is_empty().unwrap());

    let tx = journal.entries().unwrap()[0].tx;
    assert_eq!(
        journal.entries_for(tx).unwrap(),
        vec![
            TransactionEvent::Begin,
            TransactionEvent::GraphCommitted { inserted: 1, removed: 0 },
            TransactionEvent::DocumentCommitFailed {
                error: "Document store unavailable: connection refused".to_string()
            },
            TransactionEvent::Compensated,
        ]
    );
}

#[test]
fn test_failed_compensation_reports_both_causes() {
    let graph = LimitedGraph::new(1);
    let documents = UnavailableDocuments::default();
    let journal = TransactionJournal::in_memory();
    let transaction = CrossStoreTransaction::new(&graph, &documents, &journal);

    let result = transaction.execute(|ctx| {
        ctx.graph.insert(Quad::new(
            NamedNode::new("http://e.org/s").unwrap(),
            NamedNode::new("http://e.org/p").unwrap(),
            NamedNode::new("http://e.org/o").unwrap(),
            None,
        ));
        ctx.documents.delete("plots", NamedNode::new("http://e.org/s").unwrap());
        Ok(())
    });

    match result {
        Err(TransactionError::Inconsistent {
            document,
            compensation,
        }) => {
            assert!(matches!(document, DocumentError::Unavailable(_)));
            assert!(matches!(compensation, RdfStoreError::Unavailable(_)));
        }
        other => panic!("expected an inconsistency, got {:?}", other),
    }
    assert_eq!(graph.len().unwrap(), 1);

    let events: Vec<TransactionEvent> = journal
        .entries()
        .unwrap()
        .into_iter()
        .map(|e| e.event)
        .collect();
    assert!(matches!(
        events.last(),
        Some(TransactionEvent::Inconsistent { .. })
    ));
    assert!(journal.unfinished().unwrap().is_empty());
}

#[test]
fn test_graph_failure_skips_documents() {
    let graph = LimitedGraph::new(0);
    let documents = MemoryDocumentStore::new();
    let journal = TransactionJournal::in_memory();
    let transaction = CrossStoreTransaction::new(&graph, &documents, &journal);

    let result = transaction.execute(|ctx| {
        ctx.documents.insert(Document::new(
            "plots",
            NamedNode::new("http://e.org/s").unwrap(),
            json!({}),
        ));
        Ok(())
    });
    assert!(matches!(result, Err(TransactionError::GraphCommit(_))));
    assert_eq!(documents.count("plots").unwrap(), 0);
}

#[test]
fn test_uri_taken_during_transaction_fails_graph_commit() {
    let service = service();
    let documents = MemoryDocumentStore::new();
    let journal = TransactionJournal::in_memory();
    let transaction = CrossStoreTransaction::new(service.store(), &documents, &journal);

    let result = transaction.execute(|ctx| {
        let mut plot = Plot::new("Plot A");
        let uri = service.stage_create(&mut ctx.graph, None, &mut plot)?;
        // another writer stores the same generated URI first
        let other = service.create(None, &mut Plot::new("Plot A"))?;
        assert_eq!(other, uri);
        ctx.documents
            .insert(Document::new("plots", uri, json!({"owner": "transaction"})));
        Ok(())
    });

    assert!(matches!(
        result,
        Err(TransactionError::GraphCommit(RdfStoreError::SubjectInUse(_)))
    ));
    assert_eq!(documents.count("plots").unwrap(), 0);
    assert_eq!(service.store().len().unwrap(), 2);
}

#[test]
fn test_persistent_stores_and_journal() {
    let temp_dir = TempDir::new().unwrap();
    let config = MapperConfig::from_yaml_str(&format!(
        "documents:\n  path: {:?}\njournal:\n  path: {:?}\n  sync: true\n",
        temp_dir.path().join("documents"),
        temp_dir.path().join("journal"),
    ))
    .unwrap();
    let service = service();
    let uri;
    {
        let documents = open_store(&config.documents).unwrap();
        let journal = TransactionJournal::from_config(&config.journal).unwrap();
        let transaction =
            CrossStoreTransaction::new(service.store(), documents.as_ref(), &journal);

        uri = transaction
            .execute(|ctx| {
                let mut plot = Plot::new("Stored");
                let uri = service.stage_create(&mut ctx.graph, None, &mut plot)?;
                ctx.documents
                    .insert(Document::new("plots", uri.clone(), json!({"rows": 12})));
                Ok(uri)
            })
            .unwrap();

        // second insert of the same document fails and is compensated
        let result = transaction.execute(|ctx| {
            let mut plot = Plot::new("Other");
            service.stage_create(&mut ctx.graph, None, &mut plot)?;
            ctx.documents
                .insert(Document::new("plots", uri.clone(), json!({})));
            Ok(())
        });
        assert!(matches!(
            result,
            Err(TransactionError::DocumentCommit {
                compensated: true,
                ..
            })
        ));
        journal.flush().unwrap();
    }

    assert_eq!(
        service
            .count::<Plot>(None, &Default::default())
            .unwrap(),
        1
    );

    let documents = open_store(&config.documents).unwrap();
    assert_eq!(documents.get("plots", &uri).unwrap().unwrap().body, json!({"rows": 12}));

    let journal = TransactionJournal::from_config(&config.journal).unwrap();
    assert_eq!(journal.sequence().unwrap(), 7);
    assert!(journal.unfinished().unwrap().is_empty());

    let mut replayed = Vec::new();
    journal
        .replay(4, |sequence, entry| {
            replayed.push((sequence, entry.event.clone()));
            Ok(())
        })
        .unwrap();
    assert_eq!(replayed.len(), 4);
    assert_eq!(replayed[0], (4, TransactionEvent::Begin));
    assert_eq!(replayed[3].1, TransactionEvent::Compensated);
}

#[test]
fn test_concurrent_transactions() {
    let graph = Arc::new(MemoryGraphStore::new());
    let documents = Arc::new(MemoryDocumentStore::new());
    let journal = Arc::new(TransactionJournal::in_memory());

    std::thread::scope(|scope| {
        for t in 0..4 {
            let (graph, documents, journal) = (&graph, &documents, &journal);
            scope.spawn(move || {
                let transaction =
                    CrossStoreTransaction::new(graph.as_ref(), documents.as_ref(), journal.as_ref());
                for i in 0..10 {
                    let uri = NamedNode::new(format!("http://e.org/{t}/{i}")).unwrap();
                    transaction
                        .execute(|ctx| {
                            ctx.graph.insert(Quad::new(
                                uri.clone(),
                                NamedNode::new("http://e.org/p").unwrap(),
                                NamedNode::new("http://e.org/o").unwrap(),
                                None,
                            ));
                            ctx.documents.insert(Document::new("items", uri.clone(), json!(i)));
                            Ok(())
                        })
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(graph.len().unwrap(), 40);
    assert_eq!(documents.count("items").unwrap(), 40);
    assert_eq!(journal.sequence().unwrap(), 120);
    assert!(journal.unfinished().unwrap().is_empty());
}
