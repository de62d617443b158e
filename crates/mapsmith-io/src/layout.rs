//! Directory layout of world saves and tile output.
use std::path::{Path, PathBuf};

use mapsmith_coords::{DimensionId, TileKey};

/// `<world>/region` for the overworld, `<world>/DIM<n>/region` otherwise.
pub fn region_dir(world: &Path, dimension: DimensionId) -> PathBuf {
    if dimension == DimensionId::OVERWORLD {
        world.join("region")
    } else {
        world.join(format!("DIM{}", dimension.0)).join("region")
    }
}

/// `<root>/DIM<n>/<variant>/<rx>,<rz>.png`
pub fn tile_path(root: &Path, key: &TileKey) -> PathBuf {
    root.join(format!("DIM{}", key.dimension.0))
        .join(key.variant.dir_name())
        .join(format!("{},{}.png", key.region.rx, key.region.rz))
}
