//! On-disk formats: Anvil region containers, NBT chunk decoding, PNG tiles.
#![forbid(unsafe_code)]

pub mod anvil;
pub mod layout;
pub mod nbt;
mod tiles;
mod world;

pub use anvil::{Compression, RegionHeader};
pub use layout::{region_dir, tile_path};
pub use nbt::AnvilDecoder;
pub use tiles::FsTileStore;
pub use world::AnvilWorldStore;
