//! Persistent callsite database.
//!
//! A raw binary sequence of native-endian 64-bit callsite hashes, one per
//! site that has already had a failure injected. No header, no framing.
//! The file is consumed once at the first injection decision and appended
//! to (and flushed) whenever a new site is observed, so deleting it resets
//! the test cycle. At the end of a run the in-memory callsite table equals
//! the file contents.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::table::{HashEntry, HashTable};

/// Size of one record on disk.
pub const RECORD_SIZE: usize = 8;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Unable to open '{}': {source}", path.display())]
    Open { path: PathBuf, source: io::Error },
    #[error("Unable to read database: {0}")]
    Read(io::Error),
    #[error("Unable to write database: {0}")]
    Write(io::Error),
}

pub struct Database {
    file: File,
}

impl Database {
    /// Opens (creating if absent) the database in append mode with read
    /// access, the moral equivalent of `fopen(path, "a+b")`.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|source| DatabaseError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { file })
    }

    /// Replays every stored record into `callsites`. Loading stops at a
    /// short record, and on a zero hash that is already present: a stream
    /// of zeros is what reading from a `/dev/full`-like file produces, so a
    /// duplicate zero is treated as end of data rather than inserted
    /// forever. Returns the number of records inserted.
    pub fn load_into(&mut self, callsites: &mut HashTable) -> Result<usize, DatabaseError> {
        let mut record = [0u8; RECORD_SIZE];
        let mut inserted = 0;
        loop {
            match self.file.read_exact(&mut record) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(DatabaseError::Read(err)),
            }
            let hash = u64::from_ne_bytes(record);
            if callsites.insert(Box::new(HashEntry::new(hash))) {
                inserted += 1;
            } else if hash == 0 {
                break;
            }
        }
        Ok(inserted)
    }

    /// Appends one record and flushes it, so the record survives even when
    /// the program under test crashes inside its error handler.
    pub fn append(&mut self, hash: u64) -> Result<(), DatabaseError> {
        self.file
            .write_all(&hash.to_ne_bytes())
            .and_then(|()| self.file.flush())
            .map_err(DatabaseError::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_TMP_ID: AtomicU64 = AtomicU64::new(0);

    fn temp_path(tag: &str) -> PathBuf {
        let id = NEXT_TMP_ID.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!(
            "failinj_db_{}_{}_{}.db",
            tag,
            std::process::id(),
            id
        ));
        path
    }

    #[test]
    fn append_then_load_round_trips() {
        let path = temp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let mut db = Database::open(&path).expect("open fresh database");
        db.append(0x1111).unwrap();
        db.append(0x2222).unwrap();
        drop(db);

        let mut table = HashTable::new();
        let mut db = Database::open(&path).expect("reopen database");
        assert_eq!(db.load_into(&mut table).unwrap(), 2);
        assert!(table.contains(0x1111));
        assert!(table.contains(0x2222));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn load_does_not_disturb_the_file() {
        let path = temp_path("pristine");
        let _ = std::fs::remove_file(&path);

        let mut db = Database::open(&path).unwrap();
        db.append(7).unwrap();
        drop(db);
        let before = std::fs::read(&path).unwrap();

        let mut table = HashTable::new();
        Database::open(&path)
            .unwrap()
            .load_into(&mut table)
            .unwrap();
        let after = std::fs::read(&path).unwrap();
        assert_eq!(before, after);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn append_goes_to_the_end_despite_prior_reads() {
        let path = temp_path("append");
        let _ = std::fs::remove_file(&path);

        let mut db = Database::open(&path).unwrap();
        db.append(1).unwrap();
        drop(db);

        let mut table = HashTable::new();
        let mut db = Database::open(&path).unwrap();
        db.load_into(&mut table).unwrap();
        db.append(2).unwrap();
        drop(db);

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 2 * RECORD_SIZE);
        assert_eq!(bytes[..RECORD_SIZE], 1u64.to_ne_bytes());
        assert_eq!(bytes[RECORD_SIZE..], 2u64.to_ne_bytes());

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn duplicate_zero_record_terminates_the_load() {
        let path = temp_path("zeros");
        std::fs::write(
            &path,
            [
                0u64.to_ne_bytes(),
                0u64.to_ne_bytes(),
                0xbeefu64.to_ne_bytes(),
            ]
            .concat(),
        )
        .unwrap();

        let mut table = HashTable::new();
        let inserted = Database::open(&path)
            .unwrap()
            .load_into(&mut table)
            .unwrap();
        // The first zero inserts, the second stops the load before 0xbeef.
        assert_eq!(inserted, 1);
        assert!(table.contains(0));
        assert!(!table.contains(0xbeef));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn short_trailing_record_ends_the_load() {
        let path = temp_path("short");
        let mut bytes = 0x4242u64.to_ne_bytes().to_vec();
        bytes.extend_from_slice(&[1, 2, 3]);
        std::fs::write(&path, bytes).unwrap();

        let mut table = HashTable::new();
        let inserted = Database::open(&path)
            .unwrap()
            .load_into(&mut table)
            .unwrap();
        assert_eq!(inserted, 1);
        assert!(table.contains(0x4242));

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn open_of_an_invalid_path_fails() {
        let err = Database::open(Path::new("/not/a/valid/path/123/database"))
            .err()
            .expect("open must fail");
        assert!(matches!(err, DatabaseError::Open { .. }));
        assert!(err.to_string().contains("Unable to open"));
    }
}
