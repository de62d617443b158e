use std::sync::Arc;

use mapsmith_coords::ChunkPos;

pub const AIR: &str = "minecraft:air";

/// Vertical cells per section.
pub const SECTION_HEIGHT: i32 = 16;

/// Cells in one 16x16x16 section.
pub const SECTION_CELLS: usize = 4096;

#[inline]
pub fn is_air(name: &str) -> bool {
    matches!(
        name,
        "minecraft:air" | "minecraft:cave_air" | "minecraft:void_air"
    )
}

/// One 16x16x16 slab of a chunk. Blocks and biomes are palette-indexed.
///
/// Block indices are `(y * 16 + z) * 16 + x`. An empty index vector means
/// every cell uses palette entry 0. Light arrays hold one nibble per cell,
/// low nibble first; biomes are stored on a 4x4x4 grid.
#[derive(Clone, Debug, Default)]
pub struct ChunkSection {
    pub y: i32,
    pub palette: Vec<Arc<str>>,
    pub indices: Vec<u16>,
    pub sky_light: Option<Box<[u8]>>,
    pub block_light: Option<Box<[u8]>>,
    pub biome_palette: Vec<Arc<str>>,
    pub biome_indices: Vec<u8>,
}

impl ChunkSection {
    pub fn uniform(y: i32, block: &str) -> Self {
        Self {
            y,
            palette: vec![Arc::from(block)],
            ..Self::default()
        }
    }

    pub fn from_palette(y: i32, palette: Vec<Arc<str>>, indices: Vec<u16>) -> Self {
        let mut indices = indices;
        if palette.len() <= 1 {
            indices.clear();
        } else if indices.len() != SECTION_CELLS {
            indices.resize(SECTION_CELLS, 0);
        }
        Self {
            y,
            palette,
            indices,
            ..Self::default()
        }
    }

    #[inline]
    pub fn idx(x: usize, y: usize, z: usize) -> usize {
        (y * 16 + z) * 16 + x
    }

    #[inline]
    pub fn block(&self, x: usize, y: usize, z: usize) -> &str {
        let pi = if self.indices.is_empty() {
            0
        } else {
            self.indices[Self::idx(x, y, z)] as usize
        };
        self.palette.get(pi).map(|s| s.as_ref()).unwrap_or(AIR)
    }

    /// Sets one cell, growing the palette when needed.
    pub fn set_block(&mut self, x: usize, y: usize, z: usize, block: &str) {
        let pi = match self.palette.iter().position(|p| p.as_ref() == block) {
            Some(i) => i,
            None => {
                self.palette.push(Arc::from(block));
                self.palette.len() - 1
            }
        };
        if self.indices.is_empty() {
            if pi == 0 {
                return;
            }
            self.indices = vec![0; SECTION_CELLS];
        }
        self.indices[Self::idx(x, y, z)] = pi as u16;
    }

    #[inline]
    fn nibble(arr: &[u8], i: usize) -> u8 {
        let b = arr.get(i >> 1).copied().unwrap_or(0);
        if i & 1 == 0 { b & 0x0F } else { b >> 4 }
    }

    #[inline]
    pub fn sky_light(&self, x: usize, y: usize, z: usize) -> Option<u8> {
        self.sky_light
            .as_deref()
            .map(|arr| Self::nibble(arr, Self::idx(x, y, z)))
    }

    #[inline]
    pub fn block_light(&self, x: usize, y: usize, z: usize) -> Option<u8> {
        self.block_light
            .as_deref()
            .map(|arr| Self::nibble(arr, Self::idx(x, y, z)))
    }

    pub fn biome(&self, x: usize, y: usize, z: usize) -> Option<&str> {
        let pi = if self.biome_indices.is_empty() {
            0
        } else {
            let i = ((y >> 2) * 4 + (z >> 2)) * 4 + (x >> 2);
            *self.biome_indices.get(i)? as usize
        };
        self.biome_palette.get(pi).map(|s| s.as_ref())
    }

    pub fn has_non_air(&self) -> bool {
        if self.indices.is_empty() {
            return self.palette.first().is_some_and(|p| !is_air(p));
        }
        self.indices
            .iter()
            .any(|&i| self.palette.get(i as usize).is_some_and(|p| !is_air(p)))
    }
}

/// Owned copy of one chunk's cell contents, detached from any session.
#[derive(Clone, Debug)]
pub struct ChunkSnapshot {
    pub pos: ChunkPos,
    /// Sorted by `y` ascending.
    sections: Vec<ChunkSection>,
    /// Logical stamp of the last render of this chunk for the variant being drawn.
    pub last_rendered: Option<u64>,
    /// Loaded only as neighbour context for slope lookups; never rendered itself.
    pub retain: bool,
}

impl ChunkSnapshot {
    pub fn new(pos: ChunkPos) -> Self {
        Self {
            pos,
            sections: Vec::new(),
            last_rendered: None,
            retain: false,
        }
    }

    pub fn with_sections(pos: ChunkPos, mut sections: Vec<ChunkSection>) -> Self {
        sections.sort_by_key(|s| s.y);
        sections.dedup_by_key(|s| s.y);
        Self {
            pos,
            sections,
            last_rendered: None,
            retain: false,
        }
    }

    pub fn insert_section(&mut self, section: ChunkSection) {
        match self.sections.binary_search_by_key(&section.y, |s| s.y) {
            Ok(i) => self.sections[i] = section,
            Err(i) => self.sections.insert(i, section),
        }
    }

    #[inline]
    pub fn sections(&self) -> &[ChunkSection] {
        &self.sections
    }

    #[inline]
    pub fn section(&self, sy: i32) -> Option<&ChunkSection> {
        self.sections
            .binary_search_by_key(&sy, |s| s.y)
            .ok()
            .map(|i| &self.sections[i])
    }

    pub fn section_mut_or_insert(&mut self, sy: i32) -> &mut ChunkSection {
        let i = match self.sections.binary_search_by_key(&sy, |s| s.y) {
            Ok(i) => i,
            Err(i) => {
                self.sections.insert(i, ChunkSection::uniform(sy, AIR));
                i
            }
        };
        &mut self.sections[i]
    }

    /// A chunk with no sections at all: an unloaded placeholder.
    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn has_non_air(&self) -> bool {
        self.sections.iter().any(ChunkSection::has_non_air)
    }

    /// Lowest and one-past-highest cell y covered by stored sections.
    pub fn y_bounds(&self) -> Option<(i32, i32)> {
        let lo = self.sections.first()?.y * SECTION_HEIGHT;
        let hi = (self.sections.last()?.y + 1) * SECTION_HEIGHT;
        Some((lo, hi))
    }

    #[inline]
    fn split_y(y: i32) -> (i32, usize) {
        (y.div_euclid(SECTION_HEIGHT), y.rem_euclid(SECTION_HEIGHT) as usize)
    }

    pub fn block(&self, lx: usize, y: i32, lz: usize) -> &str {
        let (sy, ly) = Self::split_y(y);
        self.section(sy)
            .map(|s| s.block(lx, ly, lz))
            .unwrap_or(AIR)
    }

    pub fn set_block(&mut self, lx: usize, y: i32, lz: usize, block: &str) {
        let (sy, ly) = Self::split_y(y);
        self.section_mut_or_insert(sy).set_block(lx, ly, lz, block);
    }

    /// Sky light; cells in missing sections or without stored light read as full daylight.
    pub fn sky_light(&self, lx: usize, y: i32, lz: usize) -> u8 {
        let (sy, ly) = Self::split_y(y);
        self.section(sy)
            .and_then(|s| s.sky_light(lx, ly, lz))
            .unwrap_or(15)
    }

    pub fn block_light(&self, lx: usize, y: i32, lz: usize) -> u8 {
        let (sy, ly) = Self::split_y(y);
        self.section(sy)
            .and_then(|s| s.block_light(lx, ly, lz))
            .unwrap_or(0)
    }

    pub fn biome(&self, lx: usize, y: i32, lz: usize) -> Option<&str> {
        let (sy, ly) = Self::split_y(y);
        self.section(sy).and_then(|s| s.biome(lx, ly, lz))
    }

    /// Highest non-air cell in a column at or below `ceiling` (inclusive).
    pub fn top_non_air(&self, lx: usize, lz: usize, ceiling: i32) -> Option<i32> {
        for section in self.sections.iter().rev() {
            let base = section.y * SECTION_HEIGHT;
            if base > ceiling || !section.has_non_air() {
                continue;
            }
            let top = (SECTION_HEIGHT - 1).min(ceiling - base);
            for ly in (0..=top).rev() {
                if !is_air(section.block(lx, ly as usize, lz)) {
                    return Some(base + ly);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_snapshot() -> ChunkSnapshot {
        let mut s = ChunkSnapshot::new(ChunkPos::new(0, 0));
        s.insert_section(ChunkSection::uniform(0, "minecraft:stone"));
        s.insert_section(ChunkSection::uniform(1, AIR));
        s.set_block(3, 20, 4, "minecraft:grass_block");
        s
    }

    #[test]
    fn top_non_air_respects_ceiling() {
        let s = make_snapshot();
        assert_eq!(s.top_non_air(3, 4, 319), Some(20));
        assert_eq!(s.top_non_air(3, 4, 19), Some(15));
        assert_eq!(s.top_non_air(0, 0, 319), Some(15));
        assert_eq!(s.top_non_air(0, 0, -1), None);
    }

    #[test]
    fn blocks_outside_sections_are_air() {
        let s = make_snapshot();
        assert_eq!(s.block(0, -20, 0), AIR);
        assert_eq!(s.block(3, 20, 4), "minecraft:grass_block");
        assert_eq!(s.sky_light(0, 500, 0), 15);
        assert_eq!(s.block_light(0, 500, 0), 0);
    }

    #[test]
    fn placeholder_is_sectionless() {
        assert!(ChunkSnapshot::new(ChunkPos::new(1, 1)).is_placeholder());
        assert!(!make_snapshot().is_placeholder());
    }

    #[test]
    fn light_nibbles_low_first() {
        let mut sec = ChunkSection::uniform(0, AIR);
        let mut light = vec![0u8; 2048];
        light[0] = 0xA3;
        sec.sky_light = Some(light.into_boxed_slice());
        assert_eq!(sec.sky_light(0, 0, 0), Some(3));
        assert_eq!(sec.sky_light(1, 0, 0), Some(10));
    }
}
