use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use mapsmith_coords::TileKey;

use crate::pixels::PixelBuffer;
use crate::store::{TileStore, TileStoreError};

#[derive(Clone, Copy, Debug)]
pub struct TileCacheConfig {
    /// Maximum tiles held in memory before the least recently used is evicted.
    pub capacity: usize,
    /// Dirty tiles are written at least this often by [`TileCache::maintain`].
    pub flush_interval: Duration,
    /// Tiles untouched for this long are flushed and dropped by [`TileCache::maintain`].
    pub max_age: Duration,
}

impl Default for TileCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 32,
            flush_interval: Duration::from_secs(30),
            max_age: Duration::from_secs(15),
        }
    }
}

/// One cached tile. The buffer is shared with readers; a put replaces it wholesale.
#[derive(Clone, Debug)]
pub struct TileImage {
    pub pixels: Arc<PixelBuffer>,
    pub dirty: bool,
    pub last_touched: Instant,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PutReport {
    /// Tiles whose pixels differed from their previous version.
    pub changed: usize,
    /// Tiles written to the store by this call.
    pub written: usize,
    /// Pixels that differ from the previous versions; every painted pixel of a new tile.
    pub pixels_changed: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintainReport {
    pub flushed: usize,
    pub expired: usize,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TileCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub writes: u64,
    pub entries: usize,
    pub dirty: usize,
}

/// Changed pixel count, or `None` when the buffers are identical.
fn changed_pixels(old: &PixelBuffer, new: &PixelBuffer) -> Option<usize> {
    old.differs(new).then(|| old.diff_count(new))
}

pub struct TileCache {
    store: Arc<dyn TileStore>,
    config: TileCacheConfig,
    entries: RwLock<HashMap<TileKey, TileImage>>,
    order: Mutex<VecDeque<TileKey>>,
    last_flush: Mutex<Instant>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    writes: AtomicU64,
}

impl TileCache {
    pub fn new(store: Arc<dyn TileStore>, config: TileCacheConfig) -> Self {
        Self {
            store,
            config,
            entries: RwLock::new(HashMap::new()),
            order: Mutex::new(VecDeque::new()),
            last_flush: Mutex::new(Instant::now()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    #[inline]
    pub fn config(&self) -> TileCacheConfig {
        self.config
    }

    /// In-memory pixels of a tile, without touching disk.
    pub fn get(&self, key: &TileKey) -> Option<Arc<PixelBuffer>> {
        let found = self
            .entries
            .read()
            .ok()
            .and_then(|map| map.get(key).map(|t| Arc::clone(&t.pixels)));
        match found {
            Some(pixels) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.touch_key(key);
                Some(pixels)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.entries.read().unwrap().contains_key(key)
    }

    pub fn is_dirty(&self, key: &TileKey) -> bool {
        self.entries
            .read()
            .unwrap()
            .get(key)
            .is_some_and(|t| t.dirty)
    }

    /// Buffer a render should draw onto: in-memory copy, else stored tile, else blank.
    pub fn base_pixels(&self, key: &TileKey) -> PixelBuffer {
        if let Some(pixels) = self.get(key) {
            return (*pixels).clone();
        }
        self.stored_pixels(key).unwrap_or_else(PixelBuffer::tile)
    }

    fn stored_pixels(&self, key: &TileKey) -> Option<PixelBuffer> {
        match self.store.read_tile(key) {
            Ok(found) => found,
            Err(err) => {
                log::warn!(target: "tiles", "reading {} failed, starting blank: {}", key, err);
                None
            }
        }
    }

    /// Replaces each tile's pixels, marking it dirty if any pixel changed against the
    /// previous in-memory or stored version. A tile with no previous version is dirty.
    /// With `flush_to_disk`, every dirty tile is then written.
    pub fn put_all<I>(&self, tiles: I, flush_to_disk: bool) -> Result<PutReport, TileStoreError>
    where
        I: IntoIterator<Item = (TileKey, PixelBuffer)>,
    {
        let mut report = PutReport::default();
        for (key, pixels) in tiles {
            let previous = self
                .entries
                .read()
                .unwrap()
                .get(&key)
                .map(|t| (Arc::clone(&t.pixels), t.dirty));
            let (changed, was_dirty) = match previous {
                Some((old, dirty)) => (changed_pixels(&old, &pixels), dirty),
                None => match self.stored_pixels(&key) {
                    Some(old) => (changed_pixels(&old, &pixels), false),
                    None => (Some(pixels.painted_count()), false),
                },
            };
            let changed = match changed {
                Some(n) => {
                    report.changed += 1;
                    report.pixels_changed += n;
                    true
                }
                None => false,
            };
            let image = TileImage {
                pixels: Arc::new(pixels),
                dirty: was_dirty || changed,
                last_touched: Instant::now(),
            };
            self.entries.write().unwrap().insert(key, image);
            self.remove_from_order(&key);
            self.order.lock().unwrap().push_back(key);
        }
        if flush_to_disk {
            report.written = self.flush_to_disk(false)?;
        }
        self.enforce_capacity();
        Ok(report)
    }

    /// Writes dirty tiles (or all tiles with `force`). Returns how many were written.
    /// Every candidate is attempted; the first failure is returned afterwards.
    pub fn flush_to_disk(&self, force: bool) -> Result<usize, TileStoreError> {
        let candidates: Vec<(TileKey, Arc<PixelBuffer>)> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|(_, t)| force || t.dirty)
            .map(|(k, t)| (*k, Arc::clone(&t.pixels)))
            .collect();
        let mut written = 0;
        let mut first_err = None;
        for (key, pixels) in candidates {
            match self.store.write_tile(&key, &pixels) {
                Ok(()) => {
                    written += 1;
                    self.writes.fetch_add(1, Ordering::Relaxed);
                    let mut entries = self.entries.write().unwrap();
                    if let Some(t) = entries.get_mut(&key) {
                        // a newer put keeps its own dirty flag
                        if Arc::ptr_eq(&t.pixels, &pixels) {
                            t.dirty = false;
                        }
                    }
                }
                Err(err) => {
                    log::error!(target: "tiles", "writing {} failed: {}", key, err);
                    first_err.get_or_insert(err);
                }
            }
        }
        *self.last_flush.lock().unwrap() = Instant::now();
        if written > 0 {
            log::debug!(target: "tiles", "flushed {} tiles", written);
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(written),
        }
    }

    /// Drops every in-memory tile, flushing dirty ones first when `flush` is set.
    /// If that flush fails nothing is dropped.
    pub fn clear(&self, flush: bool) -> Result<(), TileStoreError> {
        if flush {
            self.flush_to_disk(false)?;
        }
        let evicted = {
            let mut entries = self.entries.write().unwrap();
            let len = entries.len() as u64;
            entries.clear();
            len
        };
        if evicted > 0 {
            self.evictions.fetch_add(evicted, Ordering::Relaxed);
        }
        self.order.lock().unwrap().clear();
        Ok(())
    }

    /// Periodic upkeep: flush when the flush interval has passed, then flush and
    /// drop tiles untouched for longer than the configured age.
    pub fn maintain(&self, now: Instant) -> Result<MaintainReport, TileStoreError> {
        let mut report = MaintainReport::default();
        let due = {
            let last = *self.last_flush.lock().unwrap();
            now.saturating_duration_since(last) >= self.config.flush_interval
        };
        if due {
            report.flushed = self.flush_to_disk(false)?;
        }
        let stale: Vec<TileKey> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|(_, t)| now.saturating_duration_since(t.last_touched) >= self.config.max_age)
            .map(|(k, _)| *k)
            .collect();
        for key in stale {
            if self.evict(&key) {
                report.expired += 1;
            }
        }
        Ok(report)
    }

    pub fn dirty_keys(&self) -> Vec<TileKey> {
        let mut keys: Vec<TileKey> = self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|(_, t)| t.dirty)
            .map(|(k, _)| *k)
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TileCacheStats {
        let (entries, dirty) = self
            .entries
            .read()
            .map(|m| (m.len(), m.values().filter(|t| t.dirty).count()))
            .unwrap_or((0, 0));
        TileCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            entries,
            dirty,
        }
    }

    /// Removes one tile, writing it first if dirty. A failed write keeps the tile.
    fn evict(&self, key: &TileKey) -> bool {
        let pending = self
            .entries
            .read()
            .unwrap()
            .get(key)
            .filter(|t| t.dirty)
            .map(|t| Arc::clone(&t.pixels));
        if let Some(pixels) = pending {
            if let Err(err) = self.store.write_tile(key, &pixels) {
                log::error!(target: "tiles", "keeping {} after failed write: {}", key, err);
                return false;
            }
            self.writes.fetch_add(1, Ordering::Relaxed);
        }
        let removed = self.entries.write().unwrap().remove(key);
        self.remove_from_order(key);
        if removed.is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    fn touch_key(&self, key: &TileKey) {
        if let Some(t) = self.entries.write().unwrap().get_mut(key) {
            t.last_touched = Instant::now();
        }
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            if let Some(entry) = order.remove(pos) {
                order.push_back(entry);
            }
        }
    }

    fn remove_from_order(&self, key: &TileKey) {
        let mut order = self.order.lock().unwrap();
        if let Some(pos) = order.iter().position(|k| k == key) {
            order.remove(pos);
        }
    }

    fn enforce_capacity(&self) {
        let mut victims: Vec<TileKey> = Vec::new();
        {
            let order = self.order.lock().unwrap();
            let excess = order.len().saturating_sub(self.config.capacity);
            victims.extend(order.iter().take(excess).copied());
        }
        for key in victims {
            self.evict(&key);
        }
    }
}
