use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::HashMap;
use mapsmith_coords::TileKey;
use thiserror::Error;

use crate::pixels::PixelBuffer;

#[derive(Debug, Error)]
pub enum TileStoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode or decode tile {path}: {reason}")]
    Image { path: PathBuf, reason: String },
    #[error("tile {key} is {got_w}x{got_h}, expected {want}x{want}")]
    SizeMismatch {
        key: TileKey,
        got_w: u32,
        got_h: u32,
        want: u32,
    },
}

/// Persisted tile images.
pub trait TileStore: Send + Sync {
    fn read_tile(&self, key: &TileKey) -> Result<Option<PixelBuffer>, TileStoreError>;
    fn write_tile(&self, key: &TileKey, pixels: &PixelBuffer) -> Result<(), TileStoreError>;
    fn tile_exists(&self, key: &TileKey) -> bool;
}

/// Tile store kept entirely in memory.
#[derive(Default)]
pub struct MemoryTileStore {
    tiles: Mutex<HashMap<TileKey, PixelBuffer>>,
    writes: AtomicU64,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.tiles.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TileStore for MemoryTileStore {
    fn read_tile(&self, key: &TileKey) -> Result<Option<PixelBuffer>, TileStoreError> {
        Ok(self.tiles.lock().unwrap().get(key).cloned())
    }

    fn write_tile(&self, key: &TileKey, pixels: &PixelBuffer) -> Result<(), TileStoreError> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.tiles.lock().unwrap().insert(*key, pixels.clone());
        Ok(())
    }

    fn tile_exists(&self, key: &TileKey) -> bool {
        self.tiles.lock().unwrap().contains_key(key)
    }
}
