//! Transaction journal
//!
//! Append-only audit trail of cross-store transactions. On disk every
//! record is a 4-byte little-endian length followed by a bincode
//! [`JournalRecord`]; the record checksum is the first four bytes of the
//! SHA-256 digest of the serialized entry.
//!
//! A record cut short by a crash can only sit at the end of the newest file;
//! opening the journal drops it and truncates the file back to the last
//! complete record.

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::JournalConfig;

/// Journal errors
#[derive(Error, Debug)]
pub enum JournalError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Checksum mismatch, oversized or torn record before the tail
    #[error("Journal corruption detected at sequence {0}")]
    Corruption(u64),

    /// Serialized record above the size limit
    #[error("Journal record too large: {0} bytes")]
    RecordTooLarge(usize),

    #[error("Journal lock poisoned")]
    Poisoned,
}

pub type JournalResult<T> = Result<T, JournalError>;

/// Largest serialized record accepted on write and on read
const MAX_RECORD_LEN: usize = 1 << 20;

/// Step of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionEvent {
    Begin,
    /// Operation failed or the graph commit was refused; nothing was written
    RolledBack { reason: String },
    GraphCommitFailed { error: String },
    GraphCommitted { inserted: usize, removed: usize },
    DocumentCommitFailed { error: String },
    /// Graph changes were undone after the document commit failed
    Compensated,
    /// Graph changes could not be undone
    Inconsistent {
        document_error: String,
        compensation_error: String,
    },
    Committed,
}

impl TransactionEvent {
    /// Whether no further event follows for the transaction
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionEvent::RolledBack { .. }
                | TransactionEvent::Compensated
                | TransactionEvent::Inconsistent { .. }
                | TransactionEvent::Committed
        )
    }
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub tx: Uuid,
    /// Unix time in milliseconds
    pub timestamp: i64,
    pub event: TransactionEvent,
}

/// Journal record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalRecord {
    /// Sequence number (monotonically increasing)
    pub sequence: u64,
    pub entry: JournalEntry,
    checksum: u32,
}

impl JournalRecord {
    fn new(sequence: u64, entry: JournalEntry) -> JournalResult<Self> {
        let checksum = Self::checksum_of(&entry)?;
        Ok(Self {
            sequence,
            entry,
            checksum,
        })
    }

    fn checksum_of(entry: &JournalEntry) -> JournalResult<u32> {
        let bytes = bincode::serialize(entry)?;
        let digest = Sha256::digest(&bytes);
        Ok(u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }

    fn verify_checksum(&self) -> JournalResult<bool> {
        Ok(self.checksum == Self::checksum_of(&self.entry)?)
    }
}

enum Backend {
    File {
        path: PathBuf,
        current_file: Option<BufWriter<File>>,
        sync_mode: bool,
    },
    Memory(Vec<JournalRecord>),
}

struct JournalState {
    sequence: u64,
    backend: Backend,
}

/// Append-only transaction log
pub struct TransactionJournal {
    state: Mutex<JournalState>,
}

impl TransactionJournal {
    /// Open a journal directory, continuing after its last record
    pub fn open(path: impl AsRef<Path>, sync_mode: bool) -> JournalResult<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let scan = read_records(&journal_files(&path)?)?;
        if let Some((file_path, valid_len)) = &scan.torn_tail {
            warn!(
                "Truncating torn journal record in {:?} at byte {}",
                file_path, valid_len
            );
            OpenOptions::new()
                .write(true)
                .open(file_path)?
                .set_len(*valid_len)?;
        }
        let sequence = scan.records.last().map_or(0, |r| r.sequence);
        info!("Opening journal at {:?}, sequence: {}", path, sequence);

        Ok(Self {
            state: Mutex::new(JournalState {
                sequence,
                backend: Backend::File {
                    path,
                    current_file: None,
                    sync_mode,
                },
            }),
        })
    }

    /// Journal kept in memory only
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(JournalState {
                sequence: 0,
                backend: Backend::Memory(Vec::new()),
            }),
        }
    }

    /// On-disk journal when a path is configured, in-memory otherwise
    pub fn from_config(config: &JournalConfig) -> JournalResult<Self> {
        match &config.path {
            Some(path) => Self::open(path, config.sync),
            None => Ok(Self::in_memory()),
        }
    }

    /// Append an event, returning its sequence number
    pub fn append(&self, tx: Uuid, event: TransactionEvent) -> JournalResult<u64> {
        let mut state = self.state.lock().map_err(|_| JournalError::Poisoned)?;
        let sequence = state.sequence + 1;
        let entry = JournalEntry {
            tx,
            timestamp: chrono::Utc::now().timestamp_millis(),
            event,
        };
        let record = JournalRecord::new(sequence, entry)?;

        match &mut state.backend {
            Backend::Memory(records) => records.push(record),
            Backend::File {
                path,
                current_file,
                sync_mode,
            } => {
                let data = bincode::serialize(&record)?;
                if data.len() > MAX_RECORD_LEN {
                    return Err(JournalError::RecordTooLarge(data.len()));
                }
                if current_file.is_none() {
                    let file_path = path.join(format!("journal-{:016x}.log", sequence));
                    debug!("Opening new journal file: {:?}", file_path);
                    let file = OpenOptions::new().create(true).append(true).open(file_path)?;
                    *current_file = Some(BufWriter::new(file));
                }
                if let Some(file) = current_file {
                    file.write_all(&(data.len() as u32).to_le_bytes())?;
                    file.write_all(&data)?;
                    if *sync_mode {
                        file.flush()?;
                        file.get_ref().sync_data()?;
                    }
                }
            }
        }

        state.sequence = sequence;
        Ok(sequence)
    }

    /// Force buffered records to disk
    pub fn flush(&self) -> JournalResult<()> {
        let mut state = self.state.lock().map_err(|_| JournalError::Poisoned)?;
        if let Backend::File {
            current_file: Some(file),
            ..
        } = &mut state.backend
        {
            file.flush()?;
        }
        Ok(())
    }

    /// Last sequence number written
    pub fn sequence(&self) -> JournalResult<u64> {
        Ok(self.state.lock().map_err(|_| JournalError::Poisoned)?.sequence)
    }

    fn records(&self) -> JournalResult<Vec<JournalRecord>> {
        let mut state = self.state.lock().map_err(|_| JournalError::Poisoned)?;
        match &mut state.backend {
            Backend::Memory(records) => Ok(records.clone()),
            Backend::File {
                path, current_file, ..
            } => {
                if let Some(file) = current_file {
                    file.flush()?;
                }
                Ok(read_records(&journal_files(path)?)?.records)
            }
        }
    }

    /// Feed every entry from `from_sequence` on to `callback`
    ///
    /// Returns the last sequence replayed.
    pub fn replay<F>(&self, from_sequence: u64, mut callback: F) -> JournalResult<u64>
    where
        F: FnMut(u64, &JournalEntry) -> JournalResult<()>,
    {
        info!("Replaying journal from sequence {}", from_sequence);
        let mut replayed = 0u64;
        let mut last_sequence = from_sequence;
        for record in self.records()? {
            if record.sequence < from_sequence {
                continue;
            }
            callback(record.sequence, &record.entry)?;
            replayed += 1;
            last_sequence = record.sequence;
        }
        info!("Replayed {} journal entries, last sequence: {}", replayed, last_sequence);
        Ok(last_sequence)
    }

    /// All entries in order
    pub fn entries(&self) -> JournalResult<Vec<JournalEntry>> {
        Ok(self.records()?.into_iter().map(|r| r.entry).collect())
    }

    /// Events of one transaction in order
    pub fn entries_for(&self, tx: Uuid) -> JournalResult<Vec<TransactionEvent>> {
        Ok(self
            .records()?
            .into_iter()
            .filter(|r| r.entry.tx == tx)
            .map(|r| r.entry.event)
            .collect())
    }

    /// Transactions without a terminal event, oldest first
    pub fn unfinished(&self) -> JournalResult<Vec<Uuid>> {
        let mut open: IndexMap<Uuid, bool> = IndexMap::new();
        for record in self.records()? {
            let finished = record.entry.event.is_terminal();
            let slot = open.entry(record.entry.tx).or_insert(false);
            *slot = *slot || finished;
        }
        Ok(open
            .into_iter()
            .filter(|(_, finished)| !finished)
            .map(|(tx, _)| tx)
            .collect())
    }
}

/// Journal files in sequence order
fn journal_files(path: &Path) -> JournalResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)?.flatten() {
        if let Some(filename) = entry.file_name().to_str() {
            if filename.starts_with("journal-") && filename.ends_with(".log") {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Records read back from disk
struct JournalScan {
    records: Vec<JournalRecord>,
    /// Newest file and the length of its complete records, when its last
    /// record is incomplete
    torn_tail: Option<(PathBuf, u64)>,
}

fn read_records(files: &[PathBuf]) -> JournalResult<JournalScan> {
    let mut records: Vec<JournalRecord> = Vec::new();
    let mut torn_tail = None;
    for (index, file_path) in files.iter().enumerate() {
        let newest = index + 1 == files.len();
        let mut reader = BufReader::new(File::open(file_path)?);
        let mut buf = Vec::new();
        let mut valid_len = 0u64;
        loop {
            let next_sequence = records.last().map_or(1, |r| r.sequence + 1);
            let mut len_bytes = [0u8; 4];
            let read = read_full(&mut reader, &mut len_bytes)?;
            if read == 0 {
                break;
            }
            let len = u32::from_le_bytes(len_bytes) as usize;
            let complete = if read < len_bytes.len() {
                false
            } else if len > MAX_RECORD_LEN {
                warn!("Journal record of {} bytes at sequence {}", len, next_sequence);
                return Err(JournalError::Corruption(next_sequence));
            } else {
                buf.resize(len, 0);
                read_full(&mut reader, &mut buf)? == len
            };
            if !complete {
                if !newest {
                    return Err(JournalError::Corruption(next_sequence));
                }
                torn_tail = Some((file_path.clone(), valid_len));
                break;
            }

            let record: JournalRecord = bincode::deserialize(&buf)?;
            if !record.verify_checksum()? {
                warn!("Journal corruption detected at sequence {}", record.sequence);
                return Err(JournalError::Corruption(record.sequence));
            }
            records.push(record);
            valid_len += (len_bytes.len() + len) as u64;
        }
    }
    Ok(JournalScan { records, torn_tail })
}

/// Read until `buf` is full or the input ends, returning the bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_trail() {
        let journal = TransactionJournal::in_memory();
        let tx = Uuid::new_v4();
        let other = Uuid::new_v4();
        journal.append(tx, TransactionEvent::Begin).unwrap();
        journal.append(other, TransactionEvent::Begin).unwrap();
        journal
            .append(tx, TransactionEvent::GraphCommitted { inserted: 2, removed: 0 })
            .unwrap();
        journal.append(tx, TransactionEvent::Committed).unwrap();

        assert_eq!(
            journal.entries_for(tx).unwrap(),
            vec![
                TransactionEvent::Begin,
                TransactionEvent::GraphCommitted { inserted: 2, removed: 0 },
                TransactionEvent::Committed,
            ]
        );
        assert_eq!(journal.unfinished().unwrap(), vec![other]);
        assert_eq!(journal.sequence().unwrap(), 4);
    }

    #[test]
    fn test_reopen_continues_sequence() {
        let temp_dir = TempDir::new().unwrap();
        let tx = Uuid::new_v4();
        {
            let journal = TransactionJournal::open(temp_dir.path(), false).unwrap();
            journal.append(tx, TransactionEvent::Begin).unwrap();
            journal
                .append(tx, TransactionEvent::RolledBack { reason: "boom".into() })
                .unwrap();
            journal.flush().unwrap();
        }

        let journal = TransactionJournal::open(temp_dir.path(), true).unwrap();
        assert_eq!(journal.sequence().unwrap(), 2);
        let next = Uuid::new_v4();
        assert_eq!(journal.append(next, TransactionEvent::Begin).unwrap(), 3);

        let mut seen = Vec::new();
        let last = journal
            .replay(2, |sequence, entry| {
                seen.push((sequence, entry.tx));
                Ok(())
            })
            .unwrap();
        assert_eq!(last, 3);
        assert_eq!(seen, vec![(2, tx), (3, next)]);
        assert_eq!(journal.unfinished().unwrap(), vec![next]);
    }

    #[test]
    fn test_corruption_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        {
            let journal = TransactionJournal::open(temp_dir.path(), true).unwrap();
            journal
                .append(Uuid::new_v4(), TransactionEvent::DocumentCommitFailed { error: "disk".into() })
                .unwrap();
        }
        let file = journal_files(temp_dir.path()).unwrap().remove(0);
        let mut bytes = std::fs::read(&file).unwrap();
        let checksum_byte = bytes.len() - 1;
        bytes[checksum_byte] ^= 0xff;
        std::fs::write(&file, bytes).unwrap();

        assert!(matches!(
            TransactionJournal::open(temp_dir.path(), true),
            Err(JournalError::Corruption(1))
        ));
    }

    #[test]
    fn test_torn_tail_is_truncated_on_open() {
        let temp_dir = TempDir::new().unwrap();
        let tx = Uuid::new_v4();
        {
            let journal = TransactionJournal::open(temp_dir.path(), true).unwrap();
            journal.append(tx, TransactionEvent::Begin).unwrap();
            journal.append(tx, TransactionEvent::Committed).unwrap();
        }
        let file = journal_files(temp_dir.path()).unwrap().remove(0);
        let complete_len = std::fs::metadata(&file).unwrap().len();
        {
            let mut torn = OpenOptions::new().append(true).open(&file).unwrap();
            torn.write_all(&100u32.to_le_bytes()).unwrap();
            torn.write_all(&[1, 2, 3]).unwrap();
        }

        let journal = TransactionJournal::open(temp_dir.path(), true).unwrap();
        assert_eq!(journal.sequence().unwrap(), 2);
        assert_eq!(std::fs::metadata(&file).unwrap().len(), complete_len);

        let next = Uuid::new_v4();
        assert_eq!(journal.append(next, TransactionEvent::Begin).unwrap(), 3);
        assert_eq!(journal.entries().unwrap().len(), 3);
        assert_eq!(journal.unfinished().unwrap(), vec![next]);
    }

    #[test]
    fn test_torn_length_prefix_is_truncated() {
        let temp_dir = TempDir::new().unwrap();
        {
            let journal = TransactionJournal::open(temp_dir.path(), true).unwrap();
            journal.append(Uuid::new_v4(), TransactionEvent::Begin).unwrap();
        }
        let file = journal_files(temp_dir.path()).unwrap().remove(0);
        {
            let mut torn = OpenOptions::new().append(true).open(&file).unwrap();
            torn.write_all(&[7, 0]).unwrap();
        }
        let journal = TransactionJournal::open(temp_dir.path(), false).unwrap();
        assert_eq!(journal.sequence().unwrap(), 1);
        assert_eq!(journal.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_oversized_record_length_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        {
            let journal = TransactionJournal::open(temp_dir.path(), true).unwrap();
            journal.append(Uuid::new_v4(), TransactionEvent::Begin).unwrap();
        }
        let file = journal_files(temp_dir.path()).unwrap().remove(0);
        {
            let mut garbage = OpenOptions::new().append(true).open(&file).unwrap();
            garbage.write_all(&u32::MAX.to_le_bytes()).unwrap();
            garbage.write_all(&[0; 16]).unwrap();
        }
        assert!(matches!(
            TransactionJournal::open(temp_dir.path(), true),
            Err(JournalError::Corruption(2))
        ));
    }

    #[test]
    fn test_oversized_entry_is_refused() {
        let journal_dir = TempDir::new().unwrap();
        let journal = TransactionJournal::open(journal_dir.path(), true).unwrap();
        let error = "x".repeat(MAX_RECORD_LEN);
        assert!(matches!(
            journal.append(Uuid::new_v4(), TransactionEvent::GraphCommitFailed { error }),
            Err(JournalError::RecordTooLarge(_))
        ));
        assert_eq!(journal.sequence().unwrap(), 0);
    }

    #[test]
    fn test_from_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = JournalConfig {
            path: Some(temp_dir.path().join("journal")),
            sync: true,
        };
        {
            let journal = TransactionJournal::from_config(&config).unwrap();
            journal.append(Uuid::new_v4(), TransactionEvent::Begin).unwrap();
        }
        let journal = TransactionJournal::from_config(&config).unwrap();
        assert_eq!(journal.sequence().unwrap(), 1);

        let memory = TransactionJournal::from_config(&JournalConfig::default()).unwrap();
        memory.append(Uuid::new_v4(), TransactionEvent::Begin).unwrap();
        assert_eq!(memory.entries().unwrap().len(), 1);
        assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    }
}
