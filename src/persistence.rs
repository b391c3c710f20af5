//! Append-only block log for the gamma ledger
//!
//! One JSON record per line, in acceptance order. Records are never
//! rewritten; the whole ledger state is rebuilt by replaying them.

use crate::error::{ChainError, Result};
use crate::genesis::Genesis;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const DATABASE_DIR: &str = "database";
const GENESIS_FILE: &str = "genesis.json";
const BLOCKS_DB_FILE: &str = "block.db";
const LOCK_FILE: &str = "LOCK";

/// A line of the log and the byte offset where it starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub offset: u64,
    pub line: String,
}

/// Abstraction for block log backends. A backend is owned by exactly one
/// ledger for its whole lifetime.
pub trait BlockStore: Send + Sync {
    /// Every record from the start of the log, in file order.
    fn read_records(&mut self) -> Result<Vec<StoredRecord>>;
    /// Appends one record and returns the offset it starts at.
    fn append(&mut self, line: &str) -> Result<u64>;
    /// Flushes buffered data to durable storage.
    fn sync(&mut self) -> Result<()>;
}

pub fn database_dir_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DATABASE_DIR)
}

pub fn genesis_file_path(data_dir: &Path) -> PathBuf {
    database_dir_path(data_dir).join(GENESIS_FILE)
}

pub fn blocks_db_file_path(data_dir: &Path) -> PathBuf {
    database_dir_path(data_dir).join(BLOCKS_DB_FILE)
}

pub fn is_data_dir_initialized(data_dir: &Path) -> bool {
    genesis_file_path(data_dir).exists() && blocks_db_file_path(data_dir).exists()
}

/// Creates `<data_dir>/database/` with the given genesis and an empty log.
/// Files already present are left alone.
pub fn init_data_dir(data_dir: &Path, genesis: &Genesis) -> Result<()> {
    fs::create_dir_all(database_dir_path(data_dir))?;

    let genesis_path = genesis_file_path(data_dir);
    if !genesis_path.exists() {
        fs::write(&genesis_path, genesis.to_json()?)?;
    }

    let blocks_path = blocks_db_file_path(data_dir);
    if !blocks_path.exists() {
        File::create(&blocks_path)?;
    }
    Ok(())
}

/// Newline-delimited log on disk, opened for read + append.
///
/// Holds an exclusive lock on the `LOCK` file next to the log until dropped,
/// so only one store per data directory can be open at a time.
#[derive(Debug)]
pub struct FileBlockStore {
    file: File,
    lock: File,
    path: PathBuf,
    len: u64,
}

impl FileBlockStore {
    pub fn open(path: &Path) -> Result<Self> {
        let lock_path = path
            .parent()
            .map_or_else(|| PathBuf::from(LOCK_FILE), |dir| dir.join(LOCK_FILE));
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| ChainError::Io(format!("Failed to create lock file {}: {}", lock_path.display(), e)))?;
        lock.try_lock_exclusive().map_err(|e| {
            ChainError::Io(format!("Block log {} is already in use: {}", path.display(), e))
        })?;

        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .open(path)
            .map_err(|e| ChainError::Io(format!("Failed to open block log {}: {}", path.display(), e)))?;
        let len = file.metadata()?.len();

        Ok(FileBlockStore {
            file,
            lock,
            path: path.to_path_buf(),
            len,
        })
    }

    /// Cuts the log back to `offset`, dropping whatever a failed write left.
    fn rollback(&mut self, offset: u64) -> Result<()> {
        self.file.set_len(offset).map_err(|e| {
            ChainError::Io(format!(
                "Failed to roll back block log {} to {}: {}",
                self.path.display(),
                offset,
                e
            ))
        })?;
        self.len = offset;
        Ok(())
    }
}

impl Drop for FileBlockStore {
    fn drop(&mut self) {
        let _ = self.lock.unlock();
    }
}

impl BlockStore for FileBlockStore {
    fn read_records(&mut self) -> Result<Vec<StoredRecord>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut reader = BufReader::new(&self.file);
        read_lines(&mut reader)
    }

    fn append(&mut self, line: &str) -> Result<u64> {
        let offset = self.len;
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line.as_bytes());
        buf.push(b'\n');

        if let Err(e) = self.file.write_all(&buf).and_then(|_| self.file.flush()) {
            // a short write leaves a fragment the next record would land on
            self.rollback(offset)?;
            return Err(ChainError::Io(format!(
                "Failed to append to block log {}: {}",
                self.path.display(),
                e
            )));
        }

        self.len += buf.len() as u64;
        Ok(offset)
    }

    fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}

/// Simple in-memory log useful for tests and ephemeral runs. Clones share the
/// same buffer, so a second ledger can replay what the first one wrote.
#[derive(Clone, Default)]
pub struct InMemoryBlockStore {
    pub bytes: Arc<Mutex<Vec<u8>>>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Result<String> {
        let bytes = self.bytes.lock().map_err(|_| ChainError::Io("Mutex poisoned".to_string()))?;
        String::from_utf8(bytes.clone())
            .map_err(|e| ChainError::Format(format!("Block log is not UTF-8: {}", e)))
    }
}

impl BlockStore for InMemoryBlockStore {
    fn read_records(&mut self) -> Result<Vec<StoredRecord>> {
        let bytes = self.bytes.lock().map_err(|_| ChainError::Io("Mutex poisoned".to_string()))?;
        let mut reader: &[u8] = &bytes;
        read_lines(&mut reader)
    }

    fn append(&mut self, line: &str) -> Result<u64> {
        let mut bytes = self.bytes.lock().map_err(|_| ChainError::Io("Mutex poisoned".to_string()))?;
        let offset = bytes.len() as u64;
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        Ok(offset)
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

fn read_lines<R: BufRead>(reader: &mut R) -> Result<Vec<StoredRecord>> {
    let mut records = Vec::new();
    let mut offset = 0u64;
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => {
                ChainError::Format(format!("Block record at offset {} is not UTF-8", offset))
            }
            _ => ChainError::Io(format!("Failed to read block log: {}", e)),
        })?;
        if read == 0 {
            break;
        }

        let record = line.strip_suffix('\n').unwrap_or(&line);
        records.push(StoredRecord {
            offset,
            line: record.to_string(),
        });
        offset += read as u64;
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_data_dir_creates_layout_once() {
        let dir = TempDir::new().unwrap();
        let genesis = Genesis::new("TGL", Default::default(), 5);
        init_data_dir(dir.path(), &genesis).unwrap();
        assert!(is_data_dir_initialized(dir.path()));

        let other = Genesis::new("OTHER", Default::default(), 9);
        init_data_dir(dir.path(), &other).unwrap();
        let on_disk = Genesis::load(&genesis_file_path(dir.path())).unwrap();
        assert_eq!(on_disk, genesis);
    }

    #[test]
    fn test_file_store_offsets() {
        let dir = TempDir::new().unwrap();
        init_data_dir(dir.path(), &Genesis::new("TGL", Default::default(), 0)).unwrap();
        let path = blocks_db_file_path(dir.path());

        let mut store = FileBlockStore::open(&path).unwrap();
        assert_eq!(store.append("{\"a\":1}").unwrap(), 0);
        assert_eq!(store.append("{\"b\":22}").unwrap(), 8);
        store.sync().unwrap();
        drop(store);

        let mut reopened = FileBlockStore::open(&path).unwrap();
        let records = reopened.read_records().unwrap();
        assert_eq!(
            records,
            vec![
                StoredRecord { offset: 0, line: "{\"a\":1}".to_string() },
                StoredRecord { offset: 8, line: "{\"b\":22}".to_string() },
            ]
        );
        assert_eq!(reopened.append("x").unwrap(), 17);
    }

    #[test]
    fn test_second_open_fails_while_first_is_alive() {
        let dir = TempDir::new().unwrap();
        init_data_dir(dir.path(), &Genesis::new("TGL", Default::default(), 0)).unwrap();
        let path = blocks_db_file_path(dir.path());

        let first = FileBlockStore::open(&path).unwrap();
        let err = FileBlockStore::open(&path).unwrap_err();
        assert!(err.is_io());

        drop(first);
        assert!(FileBlockStore::open(&path).is_ok());
    }

    #[test]
    fn test_rollback_drops_partial_record() {
        let dir = TempDir::new().unwrap();
        init_data_dir(dir.path(), &Genesis::new("TGL", Default::default(), 0)).unwrap();
        let path = blocks_db_file_path(dir.path());

        let mut store = FileBlockStore::open(&path).unwrap();
        store.append("{\"a\":1}").unwrap();
        // half of a record, as a short write would leave it
        store.file.write_all(b"{\"b\":").unwrap();
        store.rollback(8).unwrap();
        assert_eq!(store.append("{\"c\":3}").unwrap(), 8);

        let lines: Vec<String> = store.read_records().unwrap().into_iter().map(|r| r.line).collect();
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "{\"c\":3}".to_string()]);
        assert_eq!(fs::metadata(&path).unwrap().len(), 16);
    }

    #[test]
    fn test_invalid_utf8_record_is_format_error() {
        let mut reader: &[u8] = b"{}\n\xff\xfe\n";
        let err = read_lines(&mut reader).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_open_missing_log_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = FileBlockStore::open(&dir.path().join("nope.db")).unwrap_err();
        assert!(err.is_io());
    }

    #[test]
    fn test_in_memory_store_shares_buffer() {
        let mut store = InMemoryBlockStore::new();
        let mut view = store.clone();
        store.append("one").unwrap();
        store.append("two").unwrap();

        let records = view.read_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].offset, 4);
        assert_eq!(store.contents().unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_last_line_without_newline_is_read() {
        let mut reader: &[u8] = b"a\nbc";
        let records = read_lines(&mut reader).unwrap();
        assert_eq!(records[1], StoredRecord { offset: 2, line: "bc".to_string() });
    }
}
