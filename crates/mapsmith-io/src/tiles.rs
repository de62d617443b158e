use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, ImageFormat, Rgba};
use mapsmith_coords::{REGION_PIXELS, TileKey};
use mapsmith_tiles::{PixelBuffer, TileStore, TileStoreError};

use crate::layout::tile_path;

/// PNG tiles under `<root>/DIM<n>/<variant>/<rx>,<rz>.png`.
pub struct FsTileStore {
    root: PathBuf,
}

impl FsTileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &TileKey) -> PathBuf {
        tile_path(&self.root, key)
    }
}

impl TileStore for FsTileStore {
    fn read_tile(&self, key: &TileKey) -> Result<Option<PixelBuffer>, TileStoreError> {
        let path = self.path_for(key);
        if !path.is_file() {
            return Ok(None);
        }
        let img = image::open(&path)
            .map_err(|e| TileStoreError::Image {
                path: path.clone(),
                reason: e.to_string(),
            })?
            .into_rgba8();
        let (w, h) = img.dimensions();
        if w != REGION_PIXELS || h != REGION_PIXELS {
            return Err(TileStoreError::SizeMismatch {
                key: *key,
                got_w: w,
                got_h: h,
                want: REGION_PIXELS,
            });
        }
        Ok(PixelBuffer::from_raw(w, h, img.into_raw()))
    }

    fn write_tile(&self, key: &TileKey, pixels: &PixelBuffer) -> Result<(), TileStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TileStoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let img: ImageBuffer<Rgba<u8>, &[u8]> =
            ImageBuffer::from_raw(pixels.width(), pixels.height(), pixels.as_raw()).ok_or_else(
                || TileStoreError::Image {
                    path: path.clone(),
                    reason: "pixel buffer length does not match its size".to_string(),
                },
            )?;
        img.save_with_format(&path, ImageFormat::Png)
            .map_err(|e| TileStoreError::Image {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        log::trace!(target: "tiles", "wrote {}", path.display());
        Ok(())
    }

    fn tile_exists(&self, key: &TileKey) -> bool {
        self.path_for(key).is_file()
    }
}
