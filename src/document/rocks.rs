//! RocksDB document store
//!
//! Documents live in the `documents` column family under
//! `{collection}\0{uri}` keys; collection names never contain a NUL byte, so
//! a collection prefix only matches its own documents. A session is written
//! as one `WriteBatch`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rocksdb::{ColumnFamilyDescriptor, Direction, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{check_session, Document, DocumentError, DocumentOp, DocumentResult, DocumentSession, DocumentStore};
use crate::rdf::NamedNode;

const DOCUMENTS_CF: &str = "documents";
const KEY_SEPARATOR: u8 = 0;

/// Serialized document
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredDocument {
    collection: String,
    uri: String,
    body: serde_json::Value,
    created_at: i64,
    updated_at: i64,
}

impl StoredDocument {
    fn into_document(self) -> DocumentResult<Document> {
        let uri = NamedNode::new(self.uri.as_str())
            .map_err(|_| DocumentError::CorruptKey(format!("{}:{}", self.collection, self.uri)))?;
        Ok(Document::new(self.collection, uri, self.body))
    }
}

/// RocksDB-backed document store
pub struct RocksDocumentStore {
    db: Arc<DB>,
    /// Serializes commits so validation and write see the same state
    commit_lock: Mutex<()>,
}

impl RocksDocumentStore {
    /// Open or create a store
    pub fn open(path: impl AsRef<Path>) -> DocumentResult<Self> {
        let path = path.as_ref();
        info!("Opening document store at: {}", path.display());

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_wal_recovery_mode(rocksdb::DBRecoveryMode::PointInTime);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new("default", Options::default()),
            ColumnFamilyDescriptor::new(DOCUMENTS_CF, Self::document_cf_options()),
        ];
        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Mutex::new(()),
        })
    }

    /// Column family options for documents
    fn document_cf_options() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn collection_prefix(collection: &str) -> Vec<u8> {
        let mut prefix = Vec::with_capacity(collection.len() + 1);
        prefix.extend_from_slice(collection.as_bytes());
        prefix.push(KEY_SEPARATOR);
        prefix
    }

    fn key(collection: &str, uri: &NamedNode) -> Vec<u8> {
        let mut key = Self::collection_prefix(collection);
        key.extend_from_slice(uri.as_str().as_bytes());
        key
    }

    fn cf(&self) -> DocumentResult<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(DOCUMENTS_CF)
            .ok_or_else(|| DocumentError::ColumnFamily(DOCUMENTS_CF.to_string()))
    }

    fn load(&self, collection: &str, uri: &NamedNode) -> DocumentResult<Option<StoredDocument>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, Self::key(collection, uri))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Stored documents of a collection in key order
    fn scan(&self, collection: &str) -> DocumentResult<Vec<StoredDocument>> {
        let cf = self.cf()?;
        let prefix = Self::collection_prefix(collection);
        let mut documents = Vec::new();

        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            documents.push(serde_json::from_slice(&value)?);
        }
        Ok(documents)
    }

    /// Flush memtables to disk
    pub fn flush(&self) -> DocumentResult<()> {
        self.db.flush_cf(self.cf()?)?;
        Ok(())
    }
}

impl DocumentStore for RocksDocumentStore {
    fn commit(&self, session: &DocumentSession) -> DocumentResult<usize> {
        let _guard = self.commit_lock.lock().map_err(|_| DocumentError::Poisoned)?;
        check_session(session, |collection, uri| {
            Ok(self.load(collection, uri)?.is_some())
        })?;

        let cf = self.cf()?;
        let now = Utc::now().timestamp_millis();
        let mut batch = WriteBatch::default();
        for op in session.ops() {
            match op {
                DocumentOp::Insert(document) | DocumentOp::Update(document) => {
                    let created_at = match op {
                        DocumentOp::Update(_) => self
                            .load(&document.collection, &document.uri)?
                            .map_or(now, |d| d.created_at),
                        _ => now,
                    };
                    let stored = StoredDocument {
                        collection: document.collection.clone(),
                        uri: document.uri.as_str().to_string(),
                        body: document.body.clone(),
                        created_at,
                        updated_at: now,
                    };
                    batch.put_cf(
                        cf,
                        Self::key(&document.collection, &document.uri),
                        serde_json::to_vec(&stored)?,
                    );
                }
                DocumentOp::Delete { collection, uri } => {
                    batch.delete_cf(cf, Self::key(collection, uri));
                }
            }
        }
        self.db.write(batch)?;

        debug!("Committed document session {} ({} ops)", session.id(), session.ops().len());
        Ok(session.ops().len())
    }

    fn get(&self, collection: &str, uri: &NamedNode) -> DocumentResult<Option<Document>> {
        self.load(collection, uri)?
            .map(StoredDocument::into_document)
            .transpose()
    }

    fn count(&self, collection: &str) -> DocumentResult<usize> {
        Ok(self.scan(collection)?.len())
    }

    fn list(&self, collection: &str) -> DocumentResult<Vec<Document>> {
        self.scan(collection)?
            .into_iter()
            .map(StoredDocument::into_document)
            .collect()
    }
}
