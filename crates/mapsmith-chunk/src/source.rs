use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mapsmith_coords::{ChunkPos, DimensionId, RegionPos};

use crate::error::ChunkSourceError;
use crate::snapshot::ChunkSnapshot;

/// The running world, if any. Implementations must be cheap and never touch disk.
pub trait LiveSession: Send + Sync {
    /// Dimension the session is currently in, or `None` when no world is loaded.
    fn current_dimension(&self) -> Option<DimensionId>;

    /// Whether background mapping is currently permitted.
    fn is_mapping_active(&self) -> bool;

    fn is_loaded(&self, pos: ChunkPos) -> bool;

    /// Owned copy of a resident chunk in the current dimension.
    fn loaded_chunk(&self, pos: ChunkPos) -> Option<ChunkSnapshot>;
}

/// Undecoded chunk bytes as stored in a region container (already decompressed).
#[derive(Clone, Debug)]
pub struct RawChunkPayload {
    pub pos: ChunkPos,
    pub timestamp: u32,
    pub data: Vec<u8>,
}

/// Persisted world data, organised as region containers per dimension.
pub trait WorldStore: Send + Sync {
    fn region_container_exists(&self, dimension: DimensionId, region: RegionPos) -> bool;

    /// Number of chunks stored in a container; zero when it does not exist.
    fn chunk_count(&self, dimension: DimensionId, region: RegionPos)
    -> Result<usize, ChunkSourceError>;

    /// `Ok(None)` when the container exists but holds no data for `pos`.
    fn read_chunk(
        &self,
        dimension: DimensionId,
        pos: ChunkPos,
    ) -> Result<Option<RawChunkPayload>, ChunkSourceError>;

    /// File names in the dimension's region directory; `Ok(None)` if the directory is missing.
    fn list_region_files(&self, dimension: DimensionId)
    -> Result<Option<Vec<String>>, ChunkSourceError>;

    fn ensure_region_dir(&self, dimension: DimensionId) -> Result<(), ChunkSourceError>;
}

/// Turns a stored payload into a snapshot. One implementation per storage format generation.
pub trait ChunkDecoder: Send + Sync {
    fn decode(&self, payload: &RawChunkPayload) -> Result<ChunkSnapshot, ChunkSourceError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SourceStats {
    pub live_hits: u64,
    pub store_hits: u64,
    pub unavailable: u64,
    pub errors: u64,
}

/// Acquires chunk snapshots from the live session first, falling back to disk.
pub struct ChunkDataSource {
    session: Arc<dyn LiveSession>,
    store: Arc<dyn WorldStore>,
    decoder: Arc<dyn ChunkDecoder>,
    live_hits: AtomicU64,
    store_hits: AtomicU64,
    unavailable: AtomicU64,
    errors: AtomicU64,
}

impl ChunkDataSource {
    pub fn new(
        session: Arc<dyn LiveSession>,
        store: Arc<dyn WorldStore>,
        decoder: Arc<dyn ChunkDecoder>,
    ) -> Self {
        Self {
            session,
            store,
            decoder,
            live_hits: AtomicU64::new(0),
            store_hits: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn session(&self) -> &Arc<dyn LiveSession> {
        &self.session
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn WorldStore> {
        &self.store
    }

    /// Resident, fully loaded chunk of `dimension`. Placeholders count as not loaded.
    pub fn try_from_live_session(
        &self,
        dimension: DimensionId,
        pos: ChunkPos,
    ) -> Option<ChunkSnapshot> {
        if self.session.current_dimension() != Some(dimension) || !self.session.is_loaded(pos) {
            return None;
        }
        self.session
            .loaded_chunk(pos)
            .filter(|snap| !snap.is_placeholder())
    }

    /// Reads and decodes a chunk from disk. A missing container yields `Ok(None)`
    /// and is never created here.
    pub fn try_from_persisted_store(
        &self,
        dimension: DimensionId,
        pos: ChunkPos,
    ) -> Result<Option<ChunkSnapshot>, ChunkSourceError> {
        if !self.store.region_container_exists(dimension, pos.region()) {
            return Ok(None);
        }
        let Some(payload) = self.store.read_chunk(dimension, pos)? else {
            return Ok(None);
        };
        let mut snap = self.decoder.decode(&payload)?;
        if snap.pos != pos {
            return Err(ChunkSourceError::decode(
                pos,
                format!("payload claims position {}", snap.pos),
            ));
        }
        snap.retain = false;
        Ok(Some(snap))
    }

    /// Live first, then disk. Failures are logged and reported as unavailable.
    pub fn acquire(&self, dimension: DimensionId, pos: ChunkPos) -> Option<ChunkSnapshot> {
        if let Some(snap) = self.try_from_live_session(dimension, pos) {
            self.live_hits.fetch_add(1, Ordering::Relaxed);
            return Some(snap);
        }
        match self.try_from_persisted_store(dimension, pos) {
            Ok(Some(snap)) => {
                self.store_hits.fetch_add(1, Ordering::Relaxed);
                Some(snap)
            }
            Ok(None) => {
                self.unavailable.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(err) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
                self.unavailable.fetch_add(1, Ordering::Relaxed);
                match err {
                    ChunkSourceError::Io { .. } => {
                        log::warn!(target: "chunks", "{} {}: {}", dimension, pos, err)
                    }
                    _ => log::debug!(target: "chunks", "{} {}: {}", dimension, pos, err),
                }
                None
            }
        }
    }

    pub fn stats(&self) -> SourceStats {
        SourceStats {
            live_hits: self.live_hits.load(Ordering::Relaxed),
            store_hits: self.store_hits.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
