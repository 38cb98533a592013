use std::collections::BTreeMap;

use finder_record::FileRecord;

pub const DEFAULT_CAPACITY: u64 = 10;

/// Field deciding whether two records are the same recent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupKey {
    #[default]
    FileName,
    FilePath,
}

impl DedupKey {
    pub fn key_of(self, record: &FileRecord) -> &str {
        match self {
            Self::FileName => &record.file_name,
            Self::FilePath => &record.file_path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Touch {
    Inserted {
        index: u64,
        evicted: Option<FileRecord>,
    },
    AlreadyPresent {
        index: u64,
    },
}

/// Recently opened files keyed by slot index.
///
/// Slots are handed out by a write cursor (`back`) that only moves forward.
/// Eviction drops the oldest occupied slot and never renumbers the rest, so
/// the map is sparse after a bulk load or a few evictions. Eviction fires when
/// the cursor is already past `capacity` at insert time, which lets the store
/// settle at `capacity + 1` live entries.
///
/// Records must carry a non-empty dedup key; this is not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecencyStore {
    slots: BTreeMap<u64, FileRecord>,
    front: u64,
    back: u64,
    capacity: u64,
    dedup: DedupKey,
}

impl Default for RecencyStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RecencyStore {
    pub fn new(capacity: u64) -> Self {
        Self {
            slots: BTreeMap::new(),
            front: 0,
            back: 0,
            capacity,
            dedup: DedupKey::default(),
        }
    }

    pub fn with_dedup(mut self, dedup: DedupKey) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn dedup(&self) -> DedupKey {
        self.dedup
    }

    pub fn front_index(&self) -> u64 {
        self.front
    }

    pub fn back_index(&self) -> u64 {
        self.back
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn index_of(&self, record: &FileRecord) -> Option<u64> {
        let key = self.dedup.key_of(record);
        self.slots
            .iter()
            .find(|(_, live)| self.dedup.key_of(live) == key)
            .map(|(index, _)| *index)
    }

    pub fn contains(&self, record: &FileRecord) -> bool {
        self.index_of(record).is_some()
    }

    /// Appends `record` unless a live slot already holds the same file.
    /// A repeated touch leaves the existing slot where it is.
    pub fn insert_or_touch(&mut self, record: FileRecord) -> Touch {
        if let Some(index) = self.index_of(&record) {
            return Touch::AlreadyPresent { index };
        }

        let evicted = if self.back > self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        let index = self.back;
        self.slots.insert(index, record);
        self.back += 1;

        Touch::Inserted { index, evicted }
    }

    pub fn with_inserted(&self, record: FileRecord) -> Self {
        let mut next = self.clone();
        next.insert_or_touch(record);
        next
    }

    /// Writes straight into `index`. Only meant for adopting a backend
    /// snapshot: no dedup, no eviction.
    pub fn set_at(&mut self, record: FileRecord, index: u64) {
        self.slots.insert(index, record);
        if index >= self.back {
            self.back = index + 1;
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.front = 0;
        self.back = 0;
    }

    pub fn replace_all<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (u64, FileRecord)>,
    {
        self.clear();
        for (index, record) in entries {
            self.set_at(record, index);
        }
        self.front = self.slots.keys().next().copied().unwrap_or(0);
    }

    pub fn items(&self) -> impl DoubleEndedIterator<Item = &FileRecord> + '_ {
        self.slots.values()
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = (u64, &FileRecord)> + '_ {
        self.slots.iter().map(|(index, record)| (*index, record))
    }

    fn evict_oldest(&mut self) -> Option<FileRecord> {
        let (index, record) = self.slots.pop_first()?;
        self.front = index + 1;
        Some(record)
    }
}
