use hashbrown::{HashMap, HashSet};
use mapsmith_chunk::{ChunkSnapshot, SECTION_HEIGHT, is_air};
use mapsmith_coords::{CHUNK_SIZE, ChunkPos, MapVariant};
use mapsmith_tiles::{BLANK, Rgba};

const SIDE: usize = CHUNK_SIZE as usize;

/// The cell a map pixel is coloured from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnSample<'a> {
    /// Topmost non-fluid block; under water this is the floor.
    pub block: &'a str,
    /// Height of the visible surface (water surface when submerged).
    pub y: i32,
    pub water_depth: u32,
    pub sky_light: u8,
    pub block_light: u8,
    pub biome: Option<&'a str>,
}

/// Surface heights of the columns north (z-1), west (x-1) and north-west of a sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborContext {
    pub north: Option<i32>,
    pub west: Option<i32>,
    pub north_west: Option<i32>,
}

/// Turns one column sample into a pixel. Supplied by the embedding application.
pub trait CellColorizer: Send + Sync {
    fn color_of(
        &self,
        sample: &ColumnSample<'_>,
        neighbors: &NeighborContext,
        variant: MapVariant,
    ) -> Rgba;
}

/// Tiles produced by one render pass over a region. Surface passes also draw the night map.
pub fn task_variants(variant: MapVariant) -> Vec<MapVariant> {
    match variant {
        MapVariant::Day => vec![MapVariant::Day, MapVariant::Night],
        other => vec![other],
    }
}

#[inline]
fn is_water(name: &str) -> bool {
    matches!(name, "minecraft:water" | "minecraft:bubble_column")
}

/// Picks the cell visible from above in column `(lx, lz)` for `variant`.
///
/// Underground variants start below the first air cell found under the slice
/// ceiling and never look more than one section below the slice.
pub fn sample_column(
    chunk: &ChunkSnapshot,
    lx: usize,
    lz: usize,
    variant: MapVariant,
) -> Option<ColumnSample<'_>> {
    let (bottom, top) = chunk.y_bounds()?;
    let ceiling = variant.ceiling(top - 1);
    let surface = match variant {
        MapVariant::Underground { slice } => {
            let floor = slice.saturating_mul(SECTION_HEIGHT);
            let open = (floor..=ceiling)
                .rev()
                .find(|&y| is_air(chunk.block(lx, y, lz)))?;
            chunk
                .top_non_air(lx, lz, open)
                .filter(|&y| y >= floor.saturating_sub(SECTION_HEIGHT))?
        }
        _ => chunk.top_non_air(lx, lz, ceiling)?,
    };
    let mut y = surface;
    let mut water_depth = 0;
    while y > bottom && is_water(chunk.block(lx, y, lz)) {
        water_depth += 1;
        y -= 1;
    }
    Some(ColumnSample {
        block: chunk.block(lx, y, lz),
        y: surface,
        water_depth,
        sky_light: chunk.sky_light(lx, surface + 1, lz),
        block_light: chunk.block_light(lx, surface + 1, lz),
        biome: chunk.biome(lx, surface, lz),
    })
}

/// Snapshots kept alive while sweeping a region, including retained
/// neighbours that sit just outside it.
#[derive(Default)]
pub struct ChunkLookahead {
    chunks: HashMap<ChunkPos, ChunkSnapshot>,
    missing: HashSet<ChunkPos>,
}

impl ChunkLookahead {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: ChunkSnapshot) {
        self.missing.remove(&snapshot.pos);
        self.chunks.insert(snapshot.pos, snapshot);
    }

    pub fn mark_missing(&mut self, pos: ChunkPos) {
        self.missing.insert(pos);
    }

    /// Whether `pos` was already loaded or found unavailable.
    pub fn is_known(&self, pos: ChunkPos) -> bool {
        self.chunks.contains_key(&pos) || self.missing.contains(&pos)
    }

    #[inline]
    pub fn get(&self, pos: ChunkPos) -> Option<&ChunkSnapshot> {
        self.chunks.get(&pos)
    }

    /// Drops every column west of `cx`.
    pub fn evict_before(&mut self, cx: i32) {
        self.chunks.retain(|p, _| p.cx >= cx);
        self.missing.retain(|p| p.cx >= cx);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn retained(&self) -> usize {
        self.chunks.values().filter(|s| s.retain).count()
    }
}

fn neighbor_height(
    chunk: &ChunkSnapshot,
    heights: &[Option<i32>],
    lookahead: &ChunkLookahead,
    lx: i32,
    lz: i32,
    variant: MapVariant,
) -> Option<i32> {
    if lx >= 0 && lz >= 0 {
        return heights[lz as usize * SIDE + lx as usize];
    }
    let dx = if lx < 0 { -1 } else { 0 };
    let dz = if lz < 0 { -1 } else { 0 };
    let other = lookahead.get(chunk.pos.offset(dx, dz))?;
    let (ox, oz) = ChunkPos::local(lx, lz);
    sample_column(other, ox, oz, variant).map(|s| s.y)
}

/// Colours one chunk into a 16x16 block (z rows of x pixels).
/// Columns with nothing to show stay transparent.
pub fn render_chunk(
    chunk: &ChunkSnapshot,
    lookahead: &ChunkLookahead,
    variant: MapVariant,
    colorizer: &dyn CellColorizer,
) -> Vec<Rgba> {
    let mut samples = Vec::with_capacity(SIDE * SIDE);
    for lz in 0..SIDE {
        for lx in 0..SIDE {
            samples.push(sample_column(chunk, lx, lz, variant));
        }
    }
    let heights: Vec<Option<i32>> = samples.iter().map(|s| s.map(|s| s.y)).collect();
    let mut pixels = vec![BLANK; SIDE * SIDE];
    for lz in 0..SIDE as i32 {
        for lx in 0..SIDE as i32 {
            let idx = lz as usize * SIDE + lx as usize;
            let Some(sample) = samples[idx] else {
                continue;
            };
            let neighbors = NeighborContext {
                north: neighbor_height(chunk, &heights, lookahead, lx, lz - 1, variant),
                west: neighbor_height(chunk, &heights, lookahead, lx - 1, lz, variant),
                north_west: neighbor_height(chunk, &heights, lookahead, lx - 1, lz - 1, variant),
            };
            pixels[idx] = colorizer.color_of(&sample, &neighbors, variant);
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsmith_chunk::{AIR, ChunkSection};

    /// Encodes the sample height and whether a north neighbour was seen.
    struct HeightColorizer;

    impl CellColorizer for HeightColorizer {
        fn color_of(
            &self,
            sample: &ColumnSample<'_>,
            neighbors: &NeighborContext,
            _variant: MapVariant,
        ) -> Rgba {
            [
                sample.y as u8,
                sample.water_depth as u8,
                neighbors.north.map(|n| n as u8).unwrap_or(0),
                255,
            ]
        }
    }

    fn flat(pos: ChunkPos, height: i32) -> ChunkSnapshot {
        let mut s = ChunkSnapshot::new(pos);
        s.insert_section(ChunkSection::uniform(0, "minecraft:stone"));
        s.insert_section(ChunkSection::uniform(1, AIR));
        s.insert_section(ChunkSection::uniform(2, AIR));
        for x in 0..16 {
            for z in 0..16 {
                for y in 16..=height {
                    s.set_block(x, y, z, "minecraft:dirt");
                }
            }
        }
        s
    }

    #[test]
    fn surface_and_water_depth() {
        let mut s = flat(ChunkPos::new(0, 0), 20);
        s.set_block(4, 21, 4, "minecraft:water");
        s.set_block(4, 22, 4, "minecraft:water");
        let sample = sample_column(&s, 4, 4, MapVariant::Day).unwrap();
        assert_eq!(sample.y, 22);
        assert_eq!(sample.water_depth, 2);
        assert_eq!(sample.block, "minecraft:dirt");
        assert_eq!(sample_column(&s, 0, 0, MapVariant::Day).unwrap().y, 20);
    }

    #[test]
    fn underground_slice_finds_cave_floor() {
        let mut s = flat(ChunkPos::new(0, 0), 47);
        // carve a pocket at y 34..=36 in slice 2 (32..=47)
        for y in 34..=36 {
            s.set_block(1, y, 1, AIR);
        }
        let v = MapVariant::Underground { slice: 2 };
        assert_eq!(sample_column(&s, 1, 1, v).unwrap().y, 33);
        // solid slice has nothing to show
        assert!(sample_column(&s, 0, 0, v).is_none());
        // slice above the terrain shows the surface
        let low = flat(ChunkPos::new(0, 0), 20);
        assert_eq!(sample_column(&low, 0, 0, v).unwrap().y, 20);
    }

    #[test]
    fn extreme_slices_do_not_overflow() {
        let s = flat(ChunkPos::new(0, 0), 20);
        let high = MapVariant::Underground { slice: i32::MAX };
        let low = MapVariant::Underground { slice: i32::MIN };
        assert!(sample_column(&s, 0, 0, high).is_none());
        assert!(sample_column(&s, 0, 0, low).is_none());
    }

    #[test]
    fn empty_chunk_renders_blank() {
        let s = ChunkSnapshot::new(ChunkPos::new(0, 0));
        let px = render_chunk(&s, &ChunkLookahead::new(), MapVariant::Day, &HeightColorizer);
        assert!(px.iter().all(|p| *p == BLANK));
    }

    #[test]
    fn north_neighbor_comes_from_lookahead() {
        let here = flat(ChunkPos::new(0, 1), 20);
        let mut lookahead = ChunkLookahead::new();
        let px = render_chunk(&here, &lookahead, MapVariant::Day, &HeightColorizer);
        assert_eq!(px[3], [20, 0, 0, 255]);
        assert_eq!(px[16 + 3], [20, 0, 20, 255]);

        let mut north = flat(ChunkPos::new(0, 0), 25);
        north.retain = true;
        lookahead.insert(north);
        let px = render_chunk(&here, &lookahead, MapVariant::Day, &HeightColorizer);
        assert_eq!(px[3], [20, 0, 25, 255]);
        assert_eq!(lookahead.retained(), 1);
    }

    #[test]
    fn lookahead_evicts_old_columns() {
        let mut l = ChunkLookahead::new();
        l.insert(ChunkSnapshot::new(ChunkPos::new(0, 0)));
        l.insert(ChunkSnapshot::new(ChunkPos::new(1, 0)));
        l.mark_missing(ChunkPos::new(0, 5));
        assert!(l.is_known(ChunkPos::new(0, 5)));
        l.evict_before(1);
        assert_eq!(l.len(), 1);
        assert!(!l.is_known(ChunkPos::new(0, 5)));
        assert!(l.get(ChunkPos::new(1, 0)).is_some());
    }

    #[test]
    fn day_pass_also_draws_night() {
        assert_eq!(task_variants(MapVariant::Day), vec![MapVariant::Day, MapVariant::Night]);
        assert_eq!(task_variants(MapVariant::Topo), vec![MapVariant::Topo]);
    }
}
