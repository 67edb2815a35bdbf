//! Bounded per-entity baseline history.
//!
//! Each entity keeps a small window of tick-keyed value buffers, ordered by
//! tick, oldest evicted first. Evicted buffers are recycled so the steady
//! state allocates nothing.

/// A bounded, tick-ordered window of value buffers.
#[derive(Debug)]
pub struct BaselineWindow {
    capacity: usize,
    words: usize,
    entries: Vec<Entry>,
    spare: Vec<Vec<u32>>,
}

#[derive(Debug)]
struct Entry {
    tick: u64,
    buffer: Vec<u32>,
}

impl BaselineWindow {
    /// Creates a window holding up to `capacity` buffers of `words` words.
    #[must_use]
    pub fn new(capacity: usize, words: usize) -> Self {
        Self {
            capacity,
            words,
            entries: Vec::with_capacity(capacity),
            spare: Vec::with_capacity(capacity),
        }
    }

    /// Returns the number of retained baselines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no baseline is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a buffer for `tick`, replacing any existing entry at that
    /// tick and evicting the oldest entry when full.
    pub fn insert(&mut self, tick: u64, buffer: &[u32]) {
        let position = self.entries.partition_point(|e| e.tick < tick);
        if let Some(entry) = self.entries.get_mut(position) {
            if entry.tick == tick {
                entry.buffer.clear();
                entry.buffer.extend_from_slice(&buffer[..self.words.min(buffer.len())]);
                return;
            }
        }
        let mut storage = self.spare.pop().unwrap_or_else(|| Vec::with_capacity(self.words));
        storage.clear();
        storage.extend_from_slice(&buffer[..self.words.min(buffer.len())]);
        self.entries.insert(position, Entry { tick, buffer: storage });
        if self.entries.len() > self.capacity {
            let evicted = self.entries.remove(0);
            self.spare.push(evicted.buffer);
        }
    }

    /// Returns the buffer captured at exactly `tick`.
    #[must_use]
    pub fn get(&self, tick: u64) -> Option<&[u32]> {
        self.entries
            .binary_search_by(|e| e.tick.cmp(&tick))
            .ok()
            .map(|i| self.entries[i].buffer.as_slice())
    }

    /// Returns the newest retained tick.
    #[must_use]
    pub fn newest_tick(&self) -> Option<u64> {
        self.entries.last().map(|e| e.tick)
    }

    /// Returns the oldest retained tick.
    #[must_use]
    pub fn oldest_tick(&self) -> Option<u64> {
        self.entries.first().map(|e| e.tick)
    }

    /// Returns the retained ticks, oldest first.
    pub fn ticks(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|e| e.tick)
    }

    /// Drops every baseline older than `tick`, recycling storage.
    pub fn prune_older_than(&mut self, tick: u64) {
        while let Some(first) = self.entries.first() {
            if first.tick >= tick {
                break;
            }
            let evicted = self.entries.remove(0);
            self.spare.push(evicted.buffer);
        }
    }

    /// Drops every baseline, recycling storage.
    pub fn clear(&mut self) {
        while let Some(entry) = self.entries.pop() {
            self.spare.push(entry.buffer);
        }
    }
}
