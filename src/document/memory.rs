//! In-memory document store

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;

use super::{check_session, Document, DocumentError, DocumentOp, DocumentResult, DocumentSession, DocumentStore};
use crate::rdf::NamedNode;

type Key = (String, String);

fn key(collection: &str, uri: &NamedNode) -> Key {
    (collection.to_string(), uri.as_str().to_string())
}

/// Document store kept in a `RwLock`'d ordered map
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: RwLock<BTreeMap<Key, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn commit(&self, session: &DocumentSession) -> DocumentResult<usize> {
        let mut documents = self.documents.write().map_err(|_| DocumentError::Poisoned)?;
        check_session(session, |collection, uri| {
            Ok(documents.contains_key(&key(collection, uri)))
        })?;

        for op in session.ops() {
            match op {
                DocumentOp::Insert(document) | DocumentOp::Update(document) => {
                    documents.insert(key(&document.collection, &document.uri), document.clone());
                }
                DocumentOp::Delete { collection, uri } => {
                    documents.remove(&key(collection, uri));
                }
            }
        }
        debug!("Committed document session {} ({} ops)", session.id(), session.ops().len());
        Ok(session.ops().len())
    }

    fn get(&self, collection: &str, uri: &NamedNode) -> DocumentResult<Option<Document>> {
        let documents = self.documents.read().map_err(|_| DocumentError::Poisoned)?;
        Ok(documents.get(&key(collection, uri)).cloned())
    }

    fn count(&self, collection: &str) -> DocumentResult<usize> {
        let documents = self.documents.read().map_err(|_| DocumentError::Poisoned)?;
        Ok(documents.keys().filter(|(c, _)| c == collection).count())
    }

    fn list(&self, collection: &str) -> DocumentResult<Vec<Document>> {
        let documents = self.documents.read().map_err(|_| DocumentError::Poisoned)?;
        Ok(documents
            .iter()
            .filter(|((c, _), _)| c == collection)
            .map(|(_, d)| d.clone())
            .collect())
    }
}
