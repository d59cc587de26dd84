//! Document store
//!
//! The document side of a cross-store transaction: JSON documents keyed by
//! collection and resource URI. Writes are staged in a [`DocumentSession`]
//! and committed atomically through [`DocumentStore::commit`].

mod memory;
mod rocks;

pub use memory::MemoryDocumentStore;
pub use rocks::RocksDocumentStore;

use std::collections::HashMap;

use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::config::DocumentConfig;
use crate::rdf::NamedNode;

/// Document store errors
#[derive(Error, Debug)]
pub enum DocumentError {
    /// RocksDB error
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Insert of a key that already exists
    #[error("Duplicate key: {collection}:{uri}")]
    DuplicateKey { collection: String, uri: String },

    /// Update or delete of a missing key
    #[error("Document not found: {collection}:{uri}")]
    NotFound { collection: String, uri: String },

    /// Column family error
    #[error("Column family error: {0}")]
    ColumnFamily(String),

    /// Stored key no longer parses
    #[error("Corrupt document key: {0}")]
    CorruptKey(String),

    #[error("Document store lock poisoned")]
    Poisoned,

    /// Store refused the operation
    #[error("Document store unavailable: {0}")]
    Unavailable(String),

    /// Collection name that cannot be stored
    #[error("Invalid collection name: {0:?}")]
    InvalidCollection(String),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// A JSON document attached to a resource
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub collection: String,
    pub uri: NamedNode,
    pub body: JsonValue,
}

impl Document {
    pub fn new(collection: impl Into<String>, uri: NamedNode, body: JsonValue) -> Self {
        Self {
            collection: collection.into(),
            uri,
            body,
        }
    }
}

/// Staged write
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOp {
    Insert(Document),
    Update(Document),
    Delete { collection: String, uri: NamedNode },
}

impl DocumentOp {
    pub fn collection(&self) -> &str {
        match self {
            DocumentOp::Insert(d) | DocumentOp::Update(d) => &d.collection,
            DocumentOp::Delete { collection, .. } => collection,
        }
    }

    pub fn uri(&self) -> &NamedNode {
        match self {
            DocumentOp::Insert(d) | DocumentOp::Update(d) => &d.uri,
            DocumentOp::Delete { uri, .. } => uri,
        }
    }
}

/// Writes committed together
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSession {
    id: Uuid,
    ops: Vec<DocumentOp>,
}

impl DocumentSession {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            ops: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ops(&self) -> &[DocumentOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn insert(&mut self, document: Document) -> &mut Self {
        self.ops.push(DocumentOp::Insert(document));
        self
    }

    pub fn update(&mut self, document: Document) -> &mut Self {
        self.ops.push(DocumentOp::Update(document));
        self
    }

    pub fn delete(&mut self, collection: impl Into<String>, uri: NamedNode) -> &mut Self {
        self.ops.push(DocumentOp::Delete {
            collection: collection.into(),
            uri,
        });
        self
    }
}

/// Operations the coordinator needs from a document store
pub trait DocumentStore: Send + Sync {
    /// Apply every operation of the session, or none
    fn commit(&self, session: &DocumentSession) -> DocumentResult<usize>;

    fn get(&self, collection: &str, uri: &NamedNode) -> DocumentResult<Option<Document>>;

    fn exists(&self, collection: &str, uri: &NamedNode) -> DocumentResult<bool> {
        Ok(self.get(collection, uri)?.is_some())
    }

    fn count(&self, collection: &str) -> DocumentResult<usize>;

    /// Documents of a collection, ordered by URI
    fn list(&self, collection: &str) -> DocumentResult<Vec<Document>>;
}

/// RocksDB store when a path is configured, in-memory otherwise
pub fn open_store(config: &DocumentConfig) -> DocumentResult<Box<dyn DocumentStore>> {
    Ok(match &config.path {
        Some(path) => Box::new(RocksDocumentStore::open(path)?),
        None => Box::new(MemoryDocumentStore::new()),
    })
}

/// Check a session against committed state plus its own earlier operations
pub(crate) fn check_session<F>(session: &DocumentSession, mut committed: F) -> DocumentResult<()>
where
    F: FnMut(&str, &NamedNode) -> DocumentResult<bool>,
{
    let mut staged: HashMap<(&str, &NamedNode), bool> = HashMap::new();
    for op in session.ops() {
        let key = (op.collection(), op.uri());
        if key.0.is_empty() || key.0.contains('\0') {
            return Err(DocumentError::InvalidCollection(key.0.to_string()));
        }
        let present = match staged.get(&key) {
            Some(&present) => present,
            None => committed(key.0, key.1)?,
        };
        let error = |duplicate: bool| {
            let collection = key.0.to_string();
            let uri = key.1.as_str().to_string();
            if duplicate {
                DocumentError::DuplicateKey { collection, uri }
            } else {
                DocumentError::NotFound { collection, uri }
            }
        };
        let after = match op {
            DocumentOp::Insert(_) if present => return Err(error(true)),
            DocumentOp::Insert(_) => true,
            DocumentOp::Update(_) if !present => return Err(error(false)),
            DocumentOp::Update(_) => true,
            DocumentOp::Delete { .. } if !present => return Err(error(false)),
            DocumentOp::Delete { .. } => false,
        };
        staged.insert(key, after);
    }
    Ok(())
}
