//! Live-world change tracking and per-chunk render stamps.
#![forbid(unsafe_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::{HashMap, HashSet};
use mapsmith_coords::{BlockPos, ChunkPos, DimensionId, MapVariant, RegionPos};

/// Boxes covering more chunks than this (border included) are stored as one entry.
pub const MAX_CHUNK_UPDATES: i64 = 64;

/// Box entries kept before they are merged into their bounding box.
pub const MAX_BOXES: usize = 16;

/// Chunk mutation stamps a region keeps before [`ChangeMonitor::compact`]
/// folds them into one region-wide stamp.
pub const MAX_REGION_REVS: usize = 256;

#[derive(Default, Debug, Clone, Copy)]
pub struct MonitorStats {
    pub attached: Option<DimensionId>,
    pub rev_entries: usize,
    pub box_entries: usize,
    pub region_rev_entries: usize,
    pub rendered_entries: usize,
    pub region_entries: usize,
    pub events: u64,
    pub ignored: u64,
}

/// Large mutated area, inclusive chunk bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ChangeBox {
    dim: DimensionId,
    lo: ChunkPos,
    hi: ChunkPos,
    stamp: u64,
}

impl ChangeBox {
    #[inline]
    fn contains(&self, dim: DimensionId, pos: ChunkPos) -> bool {
        self.dim == dim
            && (self.lo.cx..=self.hi.cx).contains(&pos.cx)
            && (self.lo.cz..=self.hi.cz).contains(&pos.cz)
    }

    /// Chunk bounds shared with `region`, if any.
    fn clip(&self, region: RegionPos) -> Option<(ChunkPos, ChunkPos)> {
        let (rlo, rhi) = (region.min_chunk(), region.max_chunk());
        let lo = ChunkPos::new(self.lo.cx.max(rlo.cx), self.lo.cz.max(rlo.cz));
        let hi = ChunkPos::new(self.hi.cx.min(rhi.cx), self.hi.cz.min(rhi.cz));
        (lo.cx <= hi.cx && lo.cz <= hi.cz).then_some((lo, hi))
    }

    fn overlaps_region(&self, dim: DimensionId, region: RegionPos) -> bool {
        self.dim == dim && self.clip(region).is_some()
    }

    fn merge(self, other: ChangeBox) -> ChangeBox {
        ChangeBox {
            dim: self.dim,
            lo: ChunkPos::new(self.lo.cx.min(other.lo.cx), self.lo.cz.min(other.lo.cz)),
            hi: ChunkPos::new(self.hi.cx.max(other.hi.cx), self.hi.cz.max(other.hi.cz)),
            stamp: self.stamp.max(other.stamp),
        }
    }
}

#[derive(Default)]
struct Stamps {
    attached: Option<DimensionId>,
    // latest mutation affecting a chunk
    rev: HashMap<(DimensionId, ChunkPos), u64>,
    boxes: Vec<ChangeBox>,
    // latest mutation anywhere in a region, once its chunk stamps were folded
    region_rev: HashMap<(DimensionId, RegionPos), u64>,
    // last committed render of a chunk, per variant
    rendered: HashMap<(DimensionId, ChunkPos, MapVariant), u64>,
    // every chunk of the region rendered at or after this stamp
    region_rendered: HashMap<(DimensionId, RegionPos, MapVariant), u64>,
}

impl Stamps {
    fn mutation(&self, dim: DimensionId, pos: ChunkPos) -> Option<u64> {
        let chunk = self.rev.get(&(dim, pos)).copied();
        let region = self.region_rev.get(&(dim, pos.region())).copied();
        self.boxes
            .iter()
            .filter(|b| b.contains(dim, pos))
            .map(|b| b.stamp)
            .chain(chunk)
            .chain(region)
            .max()
    }

    fn rendered_at(&self, dim: DimensionId, pos: ChunkPos, variant: MapVariant) -> Option<u64> {
        let chunk = self.rendered.get(&(dim, pos, variant)).copied();
        let region = self
            .region_rendered
            .get(&(dim, pos.region(), variant))
            .copied();
        chunk.max(region)
    }

    fn is_stale(&self, dim: DimensionId, pos: ChunkPos, variant: MapVariant) -> bool {
        match self.rendered_at(dim, pos, variant) {
            None => true,
            Some(built) => built <= self.mutation(dim, pos).unwrap_or(0),
        }
    }

    fn push_box(&mut self, b: ChangeBox) {
        self.boxes.push(b);
        if self.boxes.len() > MAX_BOXES {
            let (same, other): (Vec<ChangeBox>, Vec<ChangeBox>) =
                self.boxes.drain(..).partition(|x| x.dim == b.dim);
            self.boxes = other;
            if let Some(hull) = same.into_iter().reduce(ChangeBox::merge) {
                self.boxes.push(hull);
            }
        }
    }

    /// Replaces the chunk stamps of a fully rendered region with one region stamp.
    fn promote(&mut self, dim: DimensionId, region: RegionPos, variant: MapVariant) {
        let mut floor = u64::MAX;
        for pos in region.chunks() {
            match self.rendered_at(dim, pos, variant) {
                Some(built) => floor = floor.min(built),
                None => return,
            }
        }
        let e = self.region_rendered.entry((dim, region, variant)).or_insert(0);
        *e = (*e).max(floor);
        for pos in region.chunks() {
            if self
                .rendered
                .get(&(dim, pos, variant))
                .is_some_and(|&built| built <= floor)
            {
                self.rendered.remove(&(dim, pos, variant));
            }
        }
    }
}

/// Receives world mutation notifications and decides which chunks need a fresh render.
///
/// Stamps come from one logical clock shared by mutations and renders, so a
/// chunk is current for a variant exactly when its render stamp is newer than
/// its latest mutation stamp.
pub struct ChangeMonitor {
    clock: AtomicU64,
    events: AtomicU64,
    ignored: AtomicU64,
    stamps: Mutex<Stamps>,
}

impl Default for ChangeMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeMonitor {
    pub fn new() -> Self {
        Self {
            clock: AtomicU64::new(0),
            events: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            stamps: Mutex::new(Stamps::default()),
        }
    }

    /// Next stamp of the logical clock. Strictly increasing.
    #[inline]
    pub fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Starts tracking a session in `dimension`, forgetting all earlier stamps.
    pub fn attach(&self, dimension: DimensionId) {
        let mut s = self.stamps.lock().unwrap();
        s.attached = Some(dimension);
        s.rev.clear();
        s.boxes.clear();
        s.region_rev.clear();
        s.rendered.clear();
        s.region_rendered.clear();
        log::info!(target: "monitor", "attached to {}", dimension);
    }

    pub fn detach(&self) {
        let mut s = self.stamps.lock().unwrap();
        if let Some(dim) = s.attached.take() {
            log::info!(target: "monitor", "detached from {}", dim);
        }
    }

    pub fn attached(&self) -> Option<DimensionId> {
        self.stamps.lock().unwrap().attached
    }

    pub fn on_cell_changed(&self, pos: BlockPos) {
        self.bump_box(pos.chunk(), pos.chunk());
    }

    pub fn on_light_changed(&self, pos: BlockPos) {
        self.bump_box(pos.chunk(), pos.chunk());
    }

    /// Inclusive box of cells; corners may be given in any order.
    pub fn on_cells_changed(&self, a: BlockPos, b: BlockPos) {
        let min = BlockPos::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z));
        let max = BlockPos::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z));
        self.bump_box(min.chunk(), max.chunk());
    }

    /// Stamps every chunk in `[lo, hi]` plus a one-chunk ring around it. Boxes
    /// over [`MAX_CHUNK_UPDATES`] chunks are recorded as a single entry.
    fn bump_box(&self, lo: ChunkPos, hi: ChunkPos) {
        let lo = ChunkPos::new(lo.cx.saturating_sub(1), lo.cz.saturating_sub(1));
        let hi = ChunkPos::new(hi.cx.saturating_add(1), hi.cz.saturating_add(1));
        let mut s = self.stamps.lock().unwrap();
        let Some(dim) = s.attached else {
            self.ignored.fetch_add(1, Ordering::Relaxed);
            return;
        };
        self.events.fetch_add(1, Ordering::Relaxed);
        let stamp = self.tick();
        let area = (i64::from(hi.cx) - i64::from(lo.cx) + 1) * (i64::from(hi.cz) - i64::from(lo.cz) + 1);
        if area > MAX_CHUNK_UPDATES {
            s.push_box(ChangeBox { dim, lo, hi, stamp });
            return;
        }
        for cx in lo.cx..=hi.cx {
            for cz in lo.cz..=hi.cz {
                s.rev.insert((dim, ChunkPos::new(cx, cz)), stamp);
            }
        }
    }

    pub fn last_mutation(&self, dimension: DimensionId, pos: ChunkPos) -> Option<u64> {
        self.stamps.lock().unwrap().mutation(dimension, pos)
    }

    pub fn last_rendered(
        &self,
        dimension: DimensionId,
        pos: ChunkPos,
        variant: MapVariant,
    ) -> Option<u64> {
        self.stamps
            .lock()
            .unwrap()
            .rendered_at(dimension, pos, variant)
    }

    /// True unless the chunk's last render for `variant` is newer than its latest mutation.
    pub fn needs_render(&self, dimension: DimensionId, pos: ChunkPos, variant: MapVariant) -> bool {
        self.stamps.lock().unwrap().is_stale(dimension, pos, variant)
    }

    /// Records renders taken at `stamp` (from [`ChangeMonitor::tick`] before the
    /// chunks were read). Older stamps never overwrite newer ones. A region
    /// whose every chunk now has a stamp is kept as a single entry.
    pub fn mark_rendered<I>(&self, dimension: DimensionId, variant: MapVariant, chunks: I, stamp: u64)
    where
        I: IntoIterator<Item = ChunkPos>,
    {
        let mut s = self.stamps.lock().unwrap();
        let mut touched: Vec<RegionPos> = Vec::new();
        for pos in chunks {
            if s.rendered_at(dimension, pos, variant).is_some_and(|built| built >= stamp) {
                continue;
            }
            s.rendered.insert((dimension, pos, variant), stamp);
            let region = pos.region();
            if !touched.contains(&region) {
                touched.push(region);
            }
        }
        for region in touched {
            s.promote(dimension, region, variant);
        }
    }

    /// Whether any chunk of `region` was mutated after its last render for `variant`.
    pub fn region_has_stale(
        &self,
        dimension: DimensionId,
        region: RegionPos,
        variant: MapVariant,
    ) -> bool {
        let s = self.stamps.lock().unwrap();
        let chunk_stale = s.rev.iter().any(|(&(dim, pos), &rev)| {
            dim == dimension
                && region.contains(pos)
                && s
                    .rendered_at(dimension, pos, variant)
                    .is_none_or(|built| built <= rev)
        });
        let region_stale = s.region_rev.get(&(dimension, region)).is_some_and(|&rev| {
            region.chunks().any(|pos| {
                s.rendered_at(dimension, pos, variant)
                    .is_none_or(|built| built <= rev)
            })
        });
        chunk_stale
            || region_stale
            || s.boxes.iter().filter(|b| b.dim == dimension).any(|b| {
                let Some((lo, hi)) = b.clip(region) else {
                    return false;
                };
                (lo.cx..=hi.cx).any(|cx| {
                    (lo.cz..=hi.cz).any(|cz| {
                        s.rendered_at(dimension, ChunkPos::new(cx, cz), variant)
                            .is_none_or(|built| built <= b.stamp)
                    })
                })
            })
    }

    /// Folds the chunk mutation stamps of busy regions into one stamp per region.
    ///
    /// Regions holding more than [`MAX_REGION_REVS`] chunk stamps get a single
    /// stamp at their latest mutation. This never hides a change: it can only
    /// mark more of the region for a fresh render.
    pub fn compact(&self) {
        let mut s = self.stamps.lock().unwrap();
        let mut per_region: HashMap<(DimensionId, RegionPos), (usize, u64)> = HashMap::new();
        for (&(dim, pos), &rev) in &s.rev {
            let e = per_region.entry((dim, pos.region())).or_insert((0, 0));
            e.0 += 1;
            e.1 = e.1.max(rev);
        }
        let folded: Vec<((DimensionId, RegionPos), u64)> = per_region
            .into_iter()
            .filter(|(_, (count, _))| *count > MAX_REGION_REVS)
            .map(|(key, (_, latest))| (key, latest))
            .collect();
        if folded.is_empty() {
            return;
        }
        let before = s.rev.len();
        for &((dim, region), latest) in &folded {
            let e = s.region_rev.entry((dim, region)).or_insert(0);
            *e = (*e).max(latest);
        }
        let regions: HashSet<(DimensionId, RegionPos)> = folded.iter().map(|(k, _)| *k).collect();
        s.rev.retain(|&(dim, pos), _| !regions.contains(&(dim, pos.region())));
        log::debug!(
            target: "monitor",
            "folded {} chunk stamps into {} region stamps",
            before - s.rev.len(),
            regions.len()
        );
    }

    pub fn stats(&self) -> MonitorStats {
        let s = self.stamps.lock().unwrap();
        MonitorStats {
            attached: s.attached,
            rev_entries: s.rev.len(),
            box_entries: s.boxes.len(),
            region_rev_entries: s.region_rev.len(),
            rendered_entries: s.rendered.len(),
            region_entries: s.region_rendered.len(),
            events: self.events.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }
}
