//! Cross-store transactions
//!
//! [`CrossStoreTransaction`] commits a graph change set and a document
//! session together, recording every step in a [`TransactionJournal`].

mod coordinator;
mod journal;

pub use coordinator::{CrossStoreTransaction, TransactionContext, TransactionError, TransactionResult};
pub use journal::{
    JournalEntry, JournalError, JournalRecord, JournalResult, TransactionEvent, TransactionJournal,
};
