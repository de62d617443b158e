use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use hashbrown::HashMap;
use mapsmith_chunk::{ChunkSourceError, RawChunkPayload, WorldStore};
use mapsmith_coords::{ChunkPos, DimensionId, RegionPos};

use crate::anvil::{RegionHeader, read_chunk_bytes};
use crate::layout::region_dir;

const HEADER_CACHE_LIMIT: usize = 64;

struct CachedHeader {
    modified: Option<SystemTime>,
    len: u64,
    header: Arc<RegionHeader>,
}

/// Region containers of a save directory.
///
/// Parsed headers are cached and re-read whenever the container's size or
/// modification time changes.
pub struct AnvilWorldStore {
    root: PathBuf,
    headers: Mutex<HashMap<PathBuf, CachedHeader>>,
}

impl AnvilWorldStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            headers: Mutex::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn container_path(&self, dimension: DimensionId, region: RegionPos) -> PathBuf {
        region_dir(&self.root, dimension).join(region.file_name())
    }

    fn header(&self, path: &Path, region: RegionPos) -> Result<Arc<RegionHeader>, ChunkSourceError> {
        let meta = fs::metadata(path).map_err(|e| ChunkSourceError::io(path, e))?;
        let modified = meta.modified().ok();
        let len = meta.len();
        {
            let headers = self.headers.lock().unwrap();
            if let Some(c) = headers.get(path) {
                if c.len == len && c.modified == modified {
                    return Ok(Arc::clone(&c.header));
                }
            }
        }
        let header = Arc::new(RegionHeader::read_from(region, path)?);
        let mut headers = self.headers.lock().unwrap();
        if headers.len() >= HEADER_CACHE_LIMIT {
            headers.clear();
        }
        headers.insert(
            path.to_path_buf(),
            CachedHeader {
                modified,
                len,
                header: Arc::clone(&header),
            },
        );
        Ok(header)
    }
}

impl WorldStore for AnvilWorldStore {
    fn region_container_exists(&self, dimension: DimensionId, region: RegionPos) -> bool {
        self.container_path(dimension, region).is_file()
    }

    fn chunk_count(
        &self,
        dimension: DimensionId,
        region: RegionPos,
    ) -> Result<usize, ChunkSourceError> {
        let path = self.container_path(dimension, region);
        if !path.is_file() {
            return Ok(0);
        }
        Ok(self.header(&path, region)?.chunk_count())
    }

    fn read_chunk(
        &self,
        dimension: DimensionId,
        pos: ChunkPos,
    ) -> Result<Option<RawChunkPayload>, ChunkSourceError> {
        let region = pos.region();
        let path = self.container_path(dimension, region);
        let header = self.header(&path, region)?;
        let timestamp = header.timestamp(pos);
        Ok(read_chunk_bytes(&path, &header, pos)?.map(|data| RawChunkPayload {
            pos,
            timestamp,
            data,
        }))
    }

    fn list_region_files(
        &self,
        dimension: DimensionId,
    ) -> Result<Option<Vec<String>>, ChunkSourceError> {
        let dir = region_dir(&self.root, dimension);
        if !dir.is_dir() {
            return Ok(None);
        }
        let entries = fs::read_dir(&dir).map_err(|e| ChunkSourceError::io(&dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ChunkSourceError::io(&dir, e))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(Some(names))
    }

    fn ensure_region_dir(&self, dimension: DimensionId) -> Result<(), ChunkSourceError> {
        let dir = region_dir(&self.root, dimension);
        fs::create_dir_all(&dir).map_err(|e| ChunkSourceError::io(&dir, e))
    }
}
