//! Block, chunk and region addressing, per-dimension horizontal scale, and
//! tile keys.
#![forbid(unsafe_code)]

pub mod dimension;
pub mod pos;
pub mod region;
pub mod tile;

pub use dimension::{DimensionId, DimensionScale, reinterpret};
pub use pos::{BlockPos, CHUNK_SIZE, ChunkPos};
pub use region::{REGION_CHUNKS, REGION_PIXELS, RegionPos};
pub use tile::{MapVariant, ParseVariantError, SLICE_MAX, SLICE_MIN, TileKey};
