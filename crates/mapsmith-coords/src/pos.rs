use serde::{Deserialize, Serialize};

use crate::region::RegionPos;

/// Cells along one horizontal edge of a chunk.
pub const CHUNK_SIZE: i32 = 16;

const CHUNK_SHIFT: u32 = 4;

/// A terrain cell address in a dimension's native scale.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing this cell. Arithmetic shift, so negatives round toward -inf.
    #[inline]
    pub const fn chunk(self) -> ChunkPos {
        ChunkPos::new(self.x >> CHUNK_SHIFT, self.z >> CHUNK_SHIFT)
    }

    #[inline]
    pub const fn region(self) -> RegionPos {
        self.chunk().region()
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }
}

impl From<(i32, i32, i32)> for BlockPos {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl From<BlockPos> for (i32, i32, i32) {
    fn from(value: BlockPos) -> Self {
        (value.x, value.y, value.z)
    }
}

/// A 16x16 column of cells, addressed by `(x >> 4, z >> 4)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkPos {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    #[inline]
    pub const fn region(self) -> RegionPos {
        RegionPos::new(self.cx >> 5, self.cz >> 5)
    }

    /// Representative cell: the minimum corner at the given height.
    #[inline]
    pub const fn min_block(self, y: i32) -> BlockPos {
        BlockPos::new(self.cx << CHUNK_SHIFT, y, self.cz << CHUNK_SHIFT)
    }

    /// Chunk-local column coordinates of a cell, each in `0..16`.
    #[inline]
    pub const fn local(x: i32, z: i32) -> (usize, usize) {
        ((x & (CHUNK_SIZE - 1)) as usize, (z & (CHUNK_SIZE - 1)) as usize)
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cz: self.cz + dz,
        }
    }

    /// The chunk and its eight horizontal neighbours.
    pub fn neighbors(self) -> impl Iterator<Item = ChunkPos> {
        (-1..=1).flat_map(move |dz| (-1..=1).map(move |dx| self.offset(dx, dz)))
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkPos) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dz * dz
    }
}

impl From<(i32, i32)> for ChunkPos {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkPos> for (i32, i32) {
    fn from(value: ChunkPos) -> Self {
        (value.cx, value.cz)
    }
}

impl std::fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.cx, self.cz)
    }
}
