//! Cross-store transaction coordinator
//!
//! Graph changes and document writes staged in one [`TransactionContext`]
//! are committed graph first, then documents. When the document commit
//! fails the applied graph changes are reverted with their inverse change
//! set. This is best effort: between the two commits readers can observe
//! the graph changes.

use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::journal::{JournalError, TransactionEvent, TransactionJournal};
use crate::document::{DocumentError, DocumentSession, DocumentStore};
use crate::rdf::{AppliedChanges, ChangeSet, GraphStore, RdfStoreError};

/// Transaction errors
#[derive(Error, Debug)]
pub enum TransactionError {
    /// The operation itself failed; nothing was written
    #[error("Transaction operation failed: {0}")]
    Operation(anyhow::Error),

    /// The graph store refused the changes; nothing was written
    #[error("Graph commit failed: {0}")]
    GraphCommit(#[source] RdfStoreError),

    /// The document commit failed after the graph commit
    #[error("Document commit failed (graph changes {}): {source}", graph_outcome(.compensated))]
    DocumentCommit {
        #[source]
        source: DocumentError,
        compensated: bool,
    },

    /// The document commit failed and the graph changes could not be reverted
    #[error("Stores are inconsistent: document commit failed ({document}), graph compensation failed ({compensation})")]
    Inconsistent {
        document: DocumentError,
        compensation: RdfStoreError,
    },

    /// The journal refused the opening entry
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),
}

pub type TransactionResult<T> = Result<T, TransactionError>;

fn graph_outcome(compensated: &bool) -> &'static str {
    if *compensated {
        "reverted"
    } else {
        "kept"
    }
}

/// Writes staged by one transaction
#[derive(Debug)]
pub struct TransactionContext {
    id: Uuid,
    pub graph: ChangeSet,
    pub documents: DocumentSession,
}

impl TransactionContext {
    fn new() -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            graph: ChangeSet::new(),
            documents: DocumentSession::new(id),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Runs operations against a graph store and a document store together
pub struct CrossStoreTransaction<'a> {
    graph: &'a dyn GraphStore,
    documents: &'a dyn DocumentStore,
    journal: &'a TransactionJournal,
}

impl<'a> CrossStoreTransaction<'a> {
    pub fn new(
        graph: &'a dyn GraphStore,
        documents: &'a dyn DocumentStore,
        journal: &'a TransactionJournal,
    ) -> Self {
        Self {
            graph,
            documents,
            journal,
        }
    }

    /// Stage writes with `operation`, then commit both stores
    ///
    /// Success is reported only once both commits went through.
    pub fn execute<R, F>(&self, operation: F) -> TransactionResult<R>
    where
        F: FnOnce(&mut TransactionContext) -> anyhow::Result<R>,
    {
        let mut ctx = TransactionContext::new();
        let tx = ctx.id;
        self.journal.append(tx, TransactionEvent::Begin)?;
        debug!("Transaction {} started", tx);

        let result = match operation(&mut ctx) {
            Ok(result) => result,
            Err(e) => {
                self.record(tx, TransactionEvent::RolledBack { reason: e.to_string() });
                info!("Transaction {} rolled back: {}", tx, e);
                return Err(TransactionError::Operation(e));
            }
        };

        let applied = match self.graph.apply(&ctx.graph) {
            Ok(applied) => applied,
            Err(e) => {
                self.record(tx, TransactionEvent::GraphCommitFailed { error: e.to_string() });
                self.record(tx, TransactionEvent::RolledBack { reason: e.to_string() });
                warn!("Transaction {} graph commit failed: {}", tx, e);
                return Err(TransactionError::GraphCommit(e));
            }
        };
        self.record(
            tx,
            TransactionEvent::GraphCommitted {
                inserted: applied.inserted.len(),
                removed: applied.removed.len(),
            },
        );

        if !ctx.documents.is_empty() {
            if let Err(e) = self.documents.commit(&ctx.documents) {
                return Err(self.compensate(tx, applied, e));
            }
        }

        self.record(tx, TransactionEvent::Committed);
        info!(
            "Transaction {} committed ({} quads inserted, {} removed, {} document ops)",
            tx,
            applied.inserted.len(),
            applied.removed.len(),
            ctx.documents.ops().len()
        );
        Ok(result)
    }

    fn compensate(
        &self,
        tx: Uuid,
        applied: AppliedChanges,
        document_error: DocumentError,
    ) -> TransactionError {
        self.record(
            tx,
            TransactionEvent::DocumentCommitFailed {
                error: document_error.to_string(),
            },
        );
        warn!("Transaction {} document commit failed: {}", tx, document_error);

        match self.graph.apply(&applied.inverse()) {
            Ok(_) => {
                self.record(tx, TransactionEvent::Compensated);
                info!("Transaction {} graph changes reverted", tx);
                TransactionError::DocumentCommit {
                    source: document_error,
                    compensated: true,
                }
            }
            Err(compensation) => {
                error!(
                    "Transaction {} left stores inconsistent: document commit failed ({}), graph compensation failed ({})",
                    tx, document_error, compensation
                );
                self.record(
                    tx,
                    TransactionEvent::Inconsistent {
                        document_error: document_error.to_string(),
                        compensation_error: compensation.to_string(),
                    },
                );
                TransactionError::Inconsistent {
                    document: document_error,
                    compensation,
                }
            }
        }
    }

    /// Journal an event after Begin; failures are logged, not raised
    fn record(&self, tx: Uuid, event: TransactionEvent) {
        if let Err(e) = self.journal.append(tx, event) {
            warn!("Transaction {} journal write failed: {}", tx, e);
        }
    }
}
