use std::sync::Arc;

use hashbrown::HashSet;
use mapsmith_coords::{BlockPos, DimensionId, MapVariant, RegionPos, TileKey};

use crate::context::MappingContext;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    pub dimension: DimensionId,
    pub variant: MapVariant,
    /// Usually the player's position; its region is rendered first.
    pub reference: BlockPos,
    /// Enqueue every region container, even ones with an up-to-date tile.
    pub include_all: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkItem {
    pub region: RegionPos,
    pub dimension: DimensionId,
    pub variant: MapVariant,
    /// Squared distance to the reference region, in region units.
    pub priority: i64,
}

impl WorkItem {
    #[inline]
    pub fn tile_key(&self) -> TileKey {
        TileKey::new(self.region, self.variant, self.dimension)
    }
}

/// LIFO queue of regions; the top item is the next to render.
#[derive(Clone, Debug, Default)]
pub struct WorkQueue {
    stack: Vec<WorkItem>,
    found: usize,
    region_files: usize,
    existing_tiles: usize,
}

impl WorkQueue {
    pub fn from_stack(stack: Vec<WorkItem>) -> Self {
        let found = stack.len();
        Self {
            stack,
            found,
            ..Self::default()
        }
    }

    fn with_counts(mut self, region_files: usize, existing_tiles: usize) -> Self {
        self.region_files = region_files;
        self.existing_tiles = existing_tiles;
        self
    }

    #[inline]
    pub fn pop(&mut self) -> Option<WorkItem> {
        self.stack.pop()
    }

    #[inline]
    pub fn peek(&self) -> Option<&WorkItem> {
        self.stack.last()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Items present when the scan finished.
    #[inline]
    pub fn found(&self) -> usize {
        self.found
    }

    /// Distinct region files the scan looked at.
    #[inline]
    pub fn region_files(&self) -> usize {
        self.region_files
    }

    /// How many of those regions already had a tile.
    #[inline]
    pub fn existing_tiles(&self) -> usize {
        self.existing_tiles
    }

    /// Completed fraction in percent.
    pub fn progress(&self) -> f32 {
        if self.found == 0 {
            return 100.0;
        }
        (self.found - self.stack.len()) as f32 * 100.0 / self.found as f32
    }

    /// Items in pop order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkItem> {
        self.stack.iter().rev()
    }
}

/// Diffs region containers against existing tiles to decide what to render.
pub struct RegionScanner {
    ctx: Arc<MappingContext>,
}

impl RegionScanner {
    pub fn new(ctx: Arc<MappingContext>) -> Self {
        Self { ctx }
    }

    pub fn scan(&self, req: &ScanRequest) -> WorkQueue {
        // Flush before clearing so nothing pending is lost.
        if let Err(err) = self.ctx.cache.clear(true) {
            log::error!(target: "scan", "tile flush before scan failed: {}", err);
        }

        let world = self.ctx.world();
        let names = match world.list_region_files(req.dimension) {
            Ok(Some(names)) => names,
            Ok(None) => {
                if let Err(err) = world.ensure_region_dir(req.dimension) {
                    log::warn!(target: "scan", "region directory for {} isn't usable: {}", req.dimension, err);
                }
                return WorkQueue::default();
            }
            Err(err) => {
                log::error!(target: "scan", "listing regions of {} failed: {}", req.dimension, err);
                return WorkQueue::default();
            }
        };

        let tiles = self.ctx.cache.store();
        let reference = req.reference.region();
        let mut seen: HashSet<RegionPos> = HashSet::new();
        let mut regions: Vec<RegionPos> = Vec::new();
        let mut valid_files = 0usize;
        let mut existing_tiles = 0usize;
        for name in &names {
            let Some(region) = RegionPos::from_filename(name) else {
                continue;
            };
            if !seen.insert(region) {
                continue;
            }
            valid_files += 1;
            let key = TileKey::new(region, req.variant, req.dimension);
            let has_tile = tiles.tile_exists(&key);
            if has_tile {
                existing_tiles += 1;
            }
            let wanted = req.include_all
                || if has_tile {
                    self.ctx
                        .monitor
                        .region_has_stale(req.dimension, region, req.variant)
                } else {
                    match world.chunk_count(req.dimension, region) {
                        Ok(n) => n > 0,
                        Err(err) => {
                            log::debug!(target: "scan", "skipping {}: {}", name, err);
                            false
                        }
                    }
                };
            if wanted {
                regions.push(region);
            }
        }

        if regions.is_empty() && valid_files != existing_tiles {
            log::warn!(
                target: "scan",
                "{} region files for {}, {} matching {} tiles, but nothing to do",
                valid_files,
                req.dimension,
                existing_tiles,
                req.variant
            );
        }

        regions.retain(|r| *r != reference);
        // farthest first, so the nearest pops first; ties descending by (rx, rz)
        regions.sort_by(|a, b| {
            b.distance_sq(reference)
                .cmp(&a.distance_sq(reference))
                .then_with(|| b.cmp(a))
        });
        regions.push(reference);

        let stack: Vec<WorkItem> = regions
            .into_iter()
            .map(|region| WorkItem {
                region,
                dimension: req.dimension,
                variant: req.variant,
                priority: region.distance_sq(reference),
            })
            .collect();
        log::info!(
            target: "scan",
            "{} {}: {} regions to render ({} files, {} tiles)",
            req.dimension,
            req.variant,
            stack.len(),
            valid_files,
            existing_tiles
        );
        WorkQueue::from_stack(stack).with_counts(valid_files, existing_tiles)
    }
}
