//! File-backed store
//!
//! The whole snapshot lives in `<data_dir>/tabula.json`:
//!
//! ```text
//! tabula-store v1 crc32=<8 hex digits>
//! <snapshot JSON>
//! ```
//!
//! Writes go to a temporary file which is synced and renamed over the
//! previous snapshot, so a crash leaves either the old or the new state.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::checksum::{compute_checksum, verify_checksum};
use super::errors::{StoreError, StoreResult};
use super::snapshot::Snapshot;
use super::SnapshotAccess;

const FILE_NAME: &str = "tabula.json";
const HEADER_PREFIX: &str = "tabula-store v1 crc32=";

/// Durable JSON snapshot store
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: RwLock<Snapshot>,
}

impl FileStore {
    /// Open (or create) the store under `data_dir`
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(FILE_NAME);
        let state = if path.exists() {
            load_snapshot(&path)?
        } else {
            Snapshot::default()
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    /// Whether `data_dir` already holds a snapshot file
    pub fn exists(data_dir: impl AsRef<Path>) -> bool {
        data_dir.as_ref().join(FILE_NAME).exists()
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the current snapshot to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.write(|_| Ok(()))
    }

    fn persist(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(snapshot)?;
        let checksum = compute_checksum(&body);

        let tmp = self.path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp)?;
            writeln!(file, "{}{:08x}", HEADER_PREFIX, checksum)?;
            file.write_all(&body)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn load_snapshot(path: &Path) -> StoreResult<Snapshot> {
    let content = fs::read(path)?;
    if content.is_empty() {
        return Ok(Snapshot::default());
    }

    let newline = content
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| StoreError::Corrupted("missing header line".into()))?;
    let header = std::str::from_utf8(&content[..newline])
        .map_err(|_| StoreError::Corrupted("header is not UTF-8".into()))?;
    let digits = header
        .strip_prefix(HEADER_PREFIX)
        .ok_or_else(|| StoreError::Corrupted(format!("unrecognized header '{}'", header)))?;
    let expected = u32::from_str_radix(digits.trim(), 16)
        .map_err(|_| StoreError::Corrupted(format!("invalid checksum '{}'", digits)))?;

    let body = &content[newline + 1..];
    if !verify_checksum(body, expected) {
        return Err(StoreError::Corrupted(format!(
            "checksum mismatch in {}",
            path.display()
        )));
    }

    serde_json::from_slice(body).map_err(|e| StoreError::Corrupted(e.to_string()))
}

impl SnapshotAccess for FileStore {
    fn read<R>(&self, f: impl FnOnce(&Snapshot) -> R) -> StoreResult<R> {
        let state = self.state.read().map_err(|_| StoreError::poisoned())?;
        Ok(f(&state))
    }

    fn write<R>(&self, f: impl FnOnce(&mut Snapshot) -> StoreResult<R>) -> StoreResult<R> {
        let mut state = self.state.write().map_err(|_| StoreError::poisoned())?;
        let mut next = state.clone();
        let result = f(&mut next)?;
        self.persist(&next)?;
        *state = next;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ObjectSchema, Table};
    use crate::store::Store;
    use tempfile::TempDir;

    #[test]
    fn test_reopen_preserves_entities_and_ids() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store
                .create_schema(ObjectSchema::with_fields("s", &[("value", "int")]))
                .unwrap();
            store.create_table(Table::new("t", 1, vec![])).unwrap();
        }

        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get_schema(1).unwrap().unwrap().name, "s");
        let next = store.create_table(Table::new("u", 1, vec![])).unwrap();
        assert_eq!(next.id, 2);
    }

    #[test]
    fn test_corruption_detected() {
        let dir = TempDir::new().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.create_table(Table::new("payload", 1, vec![])).unwrap();
        }

        let path = dir.path().join(FILE_NAME);
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("payload", "pAyload")).unwrap();

        let err = FileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Corrupted(_)));
    }

    #[test]
    fn test_missing_header_is_corrupted() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(FILE_NAME), "{}").unwrap();
        assert!(matches!(
            FileStore::open(dir.path()).unwrap_err(),
            StoreError::Corrupted(_)
        ));
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let mut missing = Table::new("ghost", 1, vec![]);
        missing.id = 9;
        assert!(store.update_table(missing).is_err());
        assert!(store.list_tables().unwrap().is_empty());
    }
}
