use serde::{Deserialize, Serialize};

use crate::pos::{CHUNK_SIZE, ChunkPos};

/// Chunks along one edge of a region.
pub const REGION_CHUNKS: i32 = 32;

/// Pixels along one edge of a region tile (one pixel per cell column).
pub const REGION_PIXELS: u32 = (REGION_CHUNKS * CHUNK_SIZE) as u32;

const REGION_SHIFT: u32 = 5;

/// A 32x32 block of chunks; the unit of work and of tile storage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub rx: i32,
    pub rz: i32,
}

impl RegionPos {
    #[inline]
    pub const fn new(rx: i32, rz: i32) -> Self {
        Self { rx, rz }
    }

    #[inline]
    pub const fn min_chunk(self) -> ChunkPos {
        ChunkPos::new(self.rx << REGION_SHIFT, self.rz << REGION_SHIFT)
    }

    #[inline]
    pub const fn max_chunk(self) -> ChunkPos {
        ChunkPos::new(
            (self.rx << REGION_SHIFT) + REGION_CHUNKS - 1,
            (self.rz << REGION_SHIFT) + REGION_CHUNKS - 1,
        )
    }

    #[inline]
    pub fn contains(self, chunk: ChunkPos) -> bool {
        chunk.region() == self
    }

    /// All 1024 chunks, x-major (x outer, z inner).
    pub fn chunks(self) -> impl Iterator<Item = ChunkPos> {
        let min = self.min_chunk();
        (0..REGION_CHUNKS).flat_map(move |dx| {
            (0..REGION_CHUNKS).map(move |dz| ChunkPos::new(min.cx + dx, min.cz + dz))
        })
    }

    /// Top-left pixel of `chunk` inside this region's tile, or `None` if outside.
    #[inline]
    pub fn pixel_offset(self, chunk: ChunkPos) -> Option<(u32, u32)> {
        if !self.contains(chunk) {
            return None;
        }
        let lx = chunk.cx.rem_euclid(REGION_CHUNKS) * CHUNK_SIZE;
        let lz = chunk.cz.rem_euclid(REGION_CHUNKS) * CHUNK_SIZE;
        Some((lx as u32, lz as u32))
    }

    /// Index of a chunk within the region container header (0..1024).
    #[inline]
    pub fn chunk_index(chunk: ChunkPos) -> usize {
        let lx = chunk.cx.rem_euclid(REGION_CHUNKS);
        let lz = chunk.cz.rem_euclid(REGION_CHUNKS);
        (lz * REGION_CHUNKS + lx) as usize
    }

    /// Squared planar distance in region units.
    #[inline]
    pub fn distance_sq(self, other: RegionPos) -> i64 {
        let dx = i64::from(self.rx - other.rx);
        let dz = i64::from(self.rz - other.rz);
        dx * dx + dz * dz
    }

    /// Parses a container name of the form `r.<x>.<z>.mca`.
    pub fn from_filename(name: &str) -> Option<Self> {
        let rest = name.strip_prefix("r.")?.strip_suffix(".mca")?;
        let (x, z) = rest.split_once('.')?;
        if x.is_empty() || z.is_empty() || z.contains('.') {
            return None;
        }
        Some(Self::new(x.parse().ok()?, z.parse().ok()?))
    }

    pub fn file_name(self) -> String {
        format!("r.{}.{}.mca", self.rx, self.rz)
    }
}

impl From<(i32, i32)> for RegionPos {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl std::fmt::Display for RegionPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.rx, self.rz)
    }
}
