use std::hash::Hasher;

use fnv::FnvHasher;
use http::header::{HeaderName, HeaderValue};
use tracing::debug;

use super::{entry_size, STATIC_TABLE_LEN};

/// Number of hash buckets backing the dynamic table's name index.
///
/// The dynamic table holds at most a few dozen entries in typical
/// deployments; a larger array would only waste cache.
const NUM_BUCKETS: usize = 16;
const BUCKET_MASK: u64 = (NUM_BUCKETS - 1) as u64;

/// One live binding in the dynamic table.
///
/// Mirrors RFC 7541 §2.3.2: name, value, and the header's contribution to
/// the table's size accounting. `insertion_seq` and the two link fields
/// give the entry its place in the age-ordered list and in its hash
/// bucket chain; both are maintained exclusively by `DynamicTable`.
struct Entry {
    name: HeaderName,
    value: HeaderValue,
    hash: u64,
    insertion_seq: u64,
    next_in_bucket: Option<usize>,
    prev_in_list: Option<usize>,
    next_in_list: Option<usize>,
}

/// The HPACK dynamic table: an ordered, size-bounded dictionary of
/// recently emitted headers, kept in exact lockstep with the peer
/// decoder's own table.
///
/// Entries live in a `Vec` arena addressed by slot index. Age ordering is
/// an intrusive doubly linked list through that arena (oldest/newest
/// tracked directly rather than through a sentinel node, since Rust has
/// no convenient way to alias a sentinel's links into the same `Entry`
/// type as a real payload). Name lookups go through a small fixed array
/// of hash-bucket chains. Evicted entries are recycled through `free`
/// (the entry pool) instead of being dropped from the arena, so
/// steady-state eviction/insertion churn does not reallocate.
pub struct DynamicTable {
    entries: Vec<Option<Entry>>,
    free: Vec<usize>,
    buckets: [Option<usize>; NUM_BUCKETS],
    oldest: Option<usize>,
    newest: Option<usize>,
    /// Insertion sequence of the current newest entry, or `u64::MAX` when
    /// the table is empty (standing in for spec's sentinel seq). The next
    /// entry inserted takes `newest_seq - 1`.
    newest_seq: u64,
    current_size: usize,
    max_size: usize,
    len: usize,
}

/// A live dynamic-table entry, as seen by a caller outside this module.
#[derive(Debug, Clone, Copy)]
pub struct EntryRef {
    pub wire_index: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> DynamicTable {
        DynamicTable {
            entries: Vec::new(),
            free: Vec::new(),
            buckets: [None; NUM_BUCKETS],
            oldest: None,
            newest: None,
            newest_seq: u64::MAX,
            current_size: 0,
            max_size,
            len: 0,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the live entry whose name and value both equal the
    /// arguments byte-exact.
    ///
    /// Bucket entries are rejected cheapest-first: hash, then value,
    /// then name.
    pub fn lookup_name_and_value(&self, name: &HeaderName, value: &HeaderValue) -> Option<EntryRef> {
        let hash = hash_name(name);
        let mut cursor = self.buckets[bucket_index(hash)];

        while let Some(idx) = cursor {
            let entry = self.entries[idx].as_ref().expect("bucket points at vacant slot");

            if entry.hash == hash && entry.value == *value && entry.name == *name {
                return Some(EntryRef {
                    wire_index: self.wire_index_of(entry),
                });
            }

            cursor = entry.next_in_bucket;
        }

        None
    }

    /// Returns the wire index of any live entry with a matching name. If
    /// several match, the first one encountered in the bucket chain wins
    /// (implementation-defined, but always a live entry).
    pub fn lookup_name(&self, name: &HeaderName) -> Option<usize> {
        let hash = hash_name(name);
        let mut cursor = self.buckets[bucket_index(hash)];

        while let Some(idx) = cursor {
            let entry = self.entries[idx].as_ref().expect("bucket points at vacant slot");

            if entry.hash == hash && entry.name == *name {
                return Some(self.wire_index_of(entry));
            }

            cursor = entry.next_in_bucket;
        }

        None
    }

    /// Evicts oldest entries until `header_size` more bytes would fit.
    ///
    /// Caller must already know `header_size <= max_size`; this only
    /// makes room, it never refuses to.
    pub fn ensure_capacity(&mut self, header_size: usize) {
        debug_assert!(header_size <= self.max_size);

        while self.max_size - self.current_size < header_size {
            self.evict_oldest();
        }
    }

    /// Inserts a new binding as the newest entry. Pre: `ensure_capacity`
    /// was already called for `header_size` in the same logical step.
    pub fn insert(&mut self, name: HeaderName, value: HeaderValue, header_size: usize) {
        let hash = hash_name(&name);
        let seq = self.newest_seq.wrapping_sub(1);
        let bucket = bucket_index(hash);

        let entry = Entry {
            name,
            value,
            hash,
            insertion_seq: seq,
            next_in_bucket: self.buckets[bucket],
            prev_in_list: self.newest,
            next_in_list: None,
        };

        let idx = match self.free.pop() {
            Some(idx) => {
                self.entries[idx] = Some(entry);
                idx
            }
            None => {
                self.entries.push(Some(entry));
                self.entries.len() - 1
            }
        };

        self.buckets[bucket] = Some(idx);

        if let Some(newest) = self.newest {
            self.entries[newest]
                .as_mut()
                .expect("newest points at vacant slot")
                .next_in_list = Some(idx);
        } else {
            self.oldest = Some(idx);
        }

        self.newest = Some(idx);
        self.newest_seq = seq;
        self.current_size += header_size;
        self.len += 1;
    }

    /// Updates the size cap, evicting oldest entries until the table fits
    /// within it. The HPACK "Dynamic Table Size Update" wire signal is a
    /// transport-layer concern, not this table's (see DESIGN.md).
    pub fn set_max_size(&mut self, new_max: usize) {
        let old_max = self.max_size;
        self.max_size = new_max;

        while self.current_size > self.max_size {
            self.evict_oldest();
        }

        debug!(old_max, new_max, "dynamic table resized");
    }

    fn evict_oldest(&mut self) {
        let idx = self.oldest.expect("eviction requested on empty table");
        let entry = self.entries[idx].take().expect("oldest points at vacant slot");

        self.current_size -= entry_size(&entry.name, &entry.value);
        self.len -= 1;

        self.oldest = entry.next_in_list;
        match self.oldest {
            Some(next) => {
                self.entries[next]
                    .as_mut()
                    .expect("oldest points at vacant slot")
                    .prev_in_list = None;
            }
            None => self.newest = None,
        }

        self.unlink_from_bucket(idx, entry.hash, entry.next_in_bucket);
        self.free.push(idx);

        debug!(wire_hint = idx, "dynamic table eviction");
    }

    /// Removes `idx` from its hash bucket chain. `idx`'s own slot has
    /// already been vacated by the caller (eviction takes the entry
    /// before unlinking it), so `idx_next_in_bucket` carries the link
    /// that would otherwise have to be read back out of that slot; the
    /// walk below never dereferences `self.entries[idx]`.
    fn unlink_from_bucket(&mut self, idx: usize, hash: u64, idx_next_in_bucket: Option<usize>) {
        let bucket = bucket_index(hash);
        let mut cursor = self.buckets[bucket];
        let mut prev: Option<usize> = None;

        while let Some(cur) = cursor {
            if cur == idx {
                match prev {
                    Some(p) => {
                        self.entries[p].as_mut().unwrap().next_in_bucket = idx_next_in_bucket;
                    }
                    None => self.buckets[bucket] = idx_next_in_bucket,
                }
                return;
            }

            let next = self.entries[cur]
                .as_ref()
                .expect("bucket points at vacant slot")
                .next_in_bucket;

            prev = Some(cur);
            cursor = next;
        }

        unreachable!("evicted entry was not linked into its own bucket");
    }

    fn wire_index_of(&self, entry: &Entry) -> usize {
        (entry.insertion_seq - self.newest_seq) as usize + 1 + STATIC_TABLE_LEN
    }
}

fn bucket_index(hash: u64) -> usize {
    (hash & BUCKET_MASK) as usize
}

fn hash_name(name: &HeaderName) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(name.as_str().as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hv(s: &str) -> HeaderValue {
        HeaderValue::from_str(s).unwrap()
    }

    fn hn(s: &str) -> HeaderName {
        HeaderName::from_bytes(s.as_bytes()).unwrap()
    }

    #[test]
    fn insert_then_lookup_name_and_value() {
        let mut table = DynamicTable::new(4096);
        let name = hn("custom-key");
        let value = hv("custom-value");
        let size = entry_size(&name, &value);

        table.ensure_capacity(size);
        table.insert(name.clone(), value.clone(), size);

        let hit = table.lookup_name_and_value(&name, &value).unwrap();
        assert_eq!(hit.wire_index, STATIC_TABLE_LEN + 1);
        assert_eq!(table.current_size(), size);
    }

    #[test]
    fn eviction_drops_oldest_first() {
        // header_size("aaa", "bbb") == 3 + 3 + 32 == 38
        let mut table = DynamicTable::new(70);

        let n1 = hn("aaa");
        let v1 = hv("bbb");
        let s1 = entry_size(&n1, &v1);
        table.ensure_capacity(s1);
        table.insert(n1.clone(), v1.clone(), s1);

        let n2 = hn("ccc");
        let v2 = hv("ddd");
        let s2 = entry_size(&n2, &v2);
        table.ensure_capacity(s2);
        table.insert(n2.clone(), v2.clone(), s2);

        assert_eq!(table.current_size(), 38);
        assert_eq!(table.len(), 1);
        assert!(table.lookup_name_and_value(&n1, &v1).is_none());
        assert!(table.lookup_name_and_value(&n2, &v2).is_some());
    }

    #[test]
    fn set_max_size_evicts_from_oldest_end() {
        let mut table = DynamicTable::new(4096);
        for i in 0..5 {
            let n = hn(&format!("k{}", i));
            let v = hv("v");
            let s = entry_size(&n, &v);
            table.ensure_capacity(s);
            table.insert(n, v, s);
        }

        assert_eq!(table.len(), 5);
        table.set_max_size(33 * 2); // room for exactly the 2 newest entries
        assert_eq!(table.len(), 2);
        assert!(table.lookup_name(&hn("k0")).is_none());
        assert!(table.lookup_name(&hn("k3")).is_some());
        assert!(table.lookup_name(&hn("k4")).is_some());
    }

    #[test]
    fn wire_indices_are_dense_and_age_ordered() {
        let mut table = DynamicTable::new(4096);
        let mut indices = Vec::new();

        for i in 0..4 {
            let n = hn(&format!("k{}", i));
            let v = hv("v");
            let s = entry_size(&n, &v);
            table.ensure_capacity(s);
            table.insert(n.clone(), v.clone(), s);
            indices.push(table.lookup_name_and_value(&n, &v).unwrap().wire_index);
        }

        // Newest entry (k3) must sit at STATIC_TABLE_LEN + 1, each older
        // entry one further out.
        assert_eq!(indices[3], STATIC_TABLE_LEN + 1);
        assert_eq!(indices[2], STATIC_TABLE_LEN + 2);
        assert_eq!(indices[1], STATIC_TABLE_LEN + 3);
        assert_eq!(indices[0], STATIC_TABLE_LEN + 4);
    }

    #[test]
    fn current_size_never_exceeds_max_size() {
        fn prop(sizes: Vec<u8>) -> bool {
            let mut table = DynamicTable::new(200);
            for (i, sz) in sizes.into_iter().enumerate() {
                let name = hn(&format!("k{}", i % 37));
                let value = hv(&"v".repeat((sz as usize) % 100));
                let size = entry_size(&name, &value);
                table.ensure_capacity(size);
                table.insert(name, value, size);
            }
            table.current_size() <= table.max_size()
        }
        quickcheck::quickcheck(prop as fn(Vec<u8>) -> bool);
    }

    #[test]
    fn wire_indices_stay_dense_and_age_ordered_under_quickcheck() {
        fn prop(n: u8) -> quickcheck::TestResult {
            let n = (n % 20) as usize;
            if n == 0 {
                return quickcheck::TestResult::discard();
            }

            let mut table = DynamicTable::new(10_000);
            let mut names = Vec::new();
            for i in 0..n {
                let name = hn(&format!("k{}", i));
                let value = hv("v");
                let size = entry_size(&name, &value);
                table.ensure_capacity(size);
                table.insert(name.clone(), value, size);
                names.push(name);
            }

            for (age_from_newest, name) in names.iter().rev().enumerate() {
                let idx = table.lookup_name(name).unwrap();
                if idx != STATIC_TABLE_LEN + 1 + age_from_newest {
                    return quickcheck::TestResult::failed();
                }
            }
            quickcheck::TestResult::passed()
        }
        quickcheck::quickcheck(prop as fn(u8) -> quickcheck::TestResult);
    }

    #[test]
    fn shrinking_max_size_evicts_only_from_oldest_end() {
        fn prop(n: u8, shrink_to: u8) -> quickcheck::TestResult {
            let n = (n % 15) as usize + 1;
            let mut table = DynamicTable::new(10_000);
            let mut names = Vec::new();
            for i in 0..n {
                let name = hn(&format!("k{}", i));
                let value = hv("v");
                let size = entry_size(&name, &value);
                table.ensure_capacity(size);
                table.insert(name.clone(), value, size);
                names.push(name);
            }

            let new_max = (shrink_to as usize) % (table.current_size() + 1);
            table.set_max_size(new_max);

            // `names` is oldest-to-newest; survivors must form a suffix.
            let mut seen_present = false;
            for name in &names {
                let present = table.lookup_name(name).is_some();
                if present {
                    seen_present = true;
                } else if seen_present {
                    return quickcheck::TestResult::failed();
                }
            }
            quickcheck::TestResult::passed()
        }
        quickcheck::quickcheck(prop as fn(u8, u8) -> quickcheck::TestResult);
    }

    #[test]
    fn pool_recycles_evicted_slots() {
        let mut table = DynamicTable::new(38); // room for exactly one entry

        let n1 = hn("aaa");
        let v1 = hv("bbb");
        let s1 = entry_size(&n1, &v1);
        table.ensure_capacity(s1);
        table.insert(n1, v1, s1);
        assert_eq!(table.entries.len(), 1);

        let n2 = hn("ccc");
        let v2 = hv("ddd");
        let s2 = entry_size(&n2, &v2);
        table.ensure_capacity(s2); // evicts the first entry, freeing its slot
        table.insert(n2, v2, s2);

        // The arena did not grow: the freed slot was reused.
        assert_eq!(table.entries.len(), 1);
        assert!(table.free.is_empty());
    }
}
