//! Fixed-width chained hash tables.
//!
//! One table shape backs four logical stores: the set of already-injected
//! callsites, and the three shadow tables of live allocations, descriptors
//! and streams. The bucket count never changes and there is no per-bucket
//! locking; the abi crate serializes every operation behind one process-wide
//! mutex. Determinism matters more than throughput here: the table's cost is
//! dwarfed by the stack walk performed for every intercepted call.

/// Bucket count. Must stay a power of two for the mask below.
pub const TABLE_WIDTH: usize = 1024;
const TABLE_MASK: u64 = (TABLE_WIDTH as u64) - 1;

/// One tracked hash, optionally with the backtrace captured when the entry
/// was created. An entry is exclusively owned by the table holding it.
#[derive(Debug)]
pub struct HashEntry {
    pub hash: u64,
    pub backtrace: Option<String>,
    next: Option<Box<HashEntry>>,
}

impl HashEntry {
    #[must_use]
    pub fn new(hash: u64) -> Self {
        Self {
            hash,
            backtrace: None,
            next: None,
        }
    }

    #[must_use]
    pub fn with_backtrace(hash: u64, backtrace: String) -> Self {
        Self {
            hash,
            backtrace: Some(backtrace),
            next: None,
        }
    }
}

pub struct HashTable {
    buckets: [Option<Box<HashEntry>>; TABLE_WIDTH],
    len: usize,
}

impl HashTable {
    #[must_use]
    pub const fn new() -> Self {
        const EMPTY: Option<Box<HashEntry>> = None;
        Self {
            buckets: [EMPTY; TABLE_WIDTH],
            len: 0,
        }
    }

    /// Inserts `entry`, taking ownership. Returns `false` (dropping the
    /// entry) if an entry with the same hash is already present; a table
    /// never holds two entries with equal hash.
    pub fn insert(&mut self, mut entry: Box<HashEntry>) -> bool {
        entry.next = None;
        let bucket = (entry.hash & TABLE_MASK) as usize;
        let mut slot = &mut self.buckets[bucket];
        loop {
            match slot {
                Some(existing) => {
                    if existing.hash == entry.hash {
                        return false;
                    }
                    slot = &mut existing.next;
                }
                None => break,
            }
        }
        *slot = Some(entry);
        self.len += 1;
        true
    }

    /// Removes and returns the entry with `hash`, if present.
    pub fn pop(&mut self, hash: u64) -> Option<Box<HashEntry>> {
        let bucket = (hash & TABLE_MASK) as usize;
        let mut slot = &mut self.buckets[bucket];
        loop {
            if slot.as_ref().map(|entry| entry.hash) == Some(hash) {
                let mut found = slot.take()?;
                *slot = found.next.take();
                self.len -= 1;
                return Some(found);
            }
            match slot {
                Some(entry) => slot = &mut entry.next,
                None => return None,
            }
        }
    }

    #[must_use]
    pub fn contains(&self, hash: u64) -> bool {
        let bucket = (hash & TABLE_MASK) as usize;
        let mut slot = &self.buckets[bucket];
        while let Some(entry) = slot {
            if entry.hash == hash {
                return true;
            }
            slot = &entry.next;
        }
        false
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Removes every entry, in bucket order. Used by the end-of-process leak
    /// scan and by `fcloseall`, which drops the whole stream table at once.
    pub fn take_entries(&mut self) -> Vec<Box<HashEntry>> {
        let mut out = Vec::with_capacity(self.len);
        for bucket in &mut self.buckets {
            let mut slot = bucket.take();
            while let Some(mut entry) = slot {
                slot = entry.next.take();
                out.push(entry);
            }
        }
        self.len = 0;
        out
    }
}

impl Default for HashTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_equal_hash() {
        let mut table = HashTable::new();
        assert!(table.insert(Box::new(HashEntry::new(42))));
        assert!(!table.insert(Box::new(HashEntry::new(42))));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn colliding_hashes_chain_within_a_bucket() {
        let mut table = HashTable::new();
        // All three land in bucket 7.
        let width = TABLE_WIDTH as u64;
        for i in 0..3 {
            assert!(table.insert(Box::new(HashEntry::new(7 + i * width))));
        }
        assert_eq!(table.len(), 3);
        for i in 0..3 {
            assert!(table.contains(7 + i * width));
        }
    }

    #[test]
    fn pop_unlinks_from_the_middle_of_a_chain() {
        let mut table = HashTable::new();
        let width = TABLE_WIDTH as u64;
        for i in 0..3 {
            table.insert(Box::new(HashEntry::new(3 + i * width)));
        }
        let popped = table.pop(3 + width).expect("middle entry present");
        assert_eq!(popped.hash, 3 + width);
        assert!(table.contains(3));
        assert!(table.contains(3 + 2 * width));
        assert!(!table.contains(3 + width));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn pop_of_absent_hash_is_none() {
        let mut table = HashTable::new();
        table.insert(Box::new(HashEntry::new(9)));
        assert!(table.pop(10).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn reinsert_after_pop_succeeds() {
        let mut table = HashTable::new();
        table.insert(Box::new(HashEntry::new(5)));
        table.pop(5);
        assert!(table.insert(Box::new(HashEntry::new(5))));
    }

    #[test]
    fn take_entries_empties_the_table_and_keeps_backtraces() {
        let mut table = HashTable::new();
        table.insert(Box::new(HashEntry::with_backtrace(1, "    a+0x1\n".into())));
        table.insert(Box::new(HashEntry::new(2)));
        let mut entries = table.take_entries();
        entries.sort_by_key(|e| e.hash);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].backtrace.as_deref(), Some("    a+0x1\n"));
        assert!(table.is_empty());
        assert!(!table.contains(1));
    }

    #[test]
    fn zero_hash_is_an_ordinary_key() {
        let mut table = HashTable::new();
        assert!(table.insert(Box::new(HashEntry::new(0))));
        assert!(!table.insert(Box::new(HashEntry::new(0))));
        assert!(table.pop(0).is_some());
    }
}
