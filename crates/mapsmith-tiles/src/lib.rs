//! In-memory region tiles with pixel-diff dirty tracking and disk flush policy.
#![forbid(unsafe_code)]

mod cache;
mod pixels;
mod store;

pub use cache::{MaintainReport, PutReport, TileCache, TileCacheConfig, TileCacheStats, TileImage};
pub use pixels::{BLANK, PixelBuffer, Rgba};
pub use store::{MemoryTileStore, TileStore, TileStoreError};
