use mapsmith_chunk::{ChunkSnapshot, LiveSession};
use mapsmith_coords::{ChunkPos, DimensionId};

/// Session for rendering a save with no game attached: every chunk comes from disk.
pub struct OfflineSession {
    dimension: DimensionId,
}

impl OfflineSession {
    pub fn new(dimension: DimensionId) -> Self {
        Self { dimension }
    }
}

impl LiveSession for OfflineSession {
    fn current_dimension(&self) -> Option<DimensionId> {
        Some(self.dimension)
    }

    fn is_mapping_active(&self) -> bool {
        true
    }

    fn is_loaded(&self, _pos: ChunkPos) -> bool {
        false
    }

    fn loaded_chunk(&self, _pos: ChunkPos) -> Option<ChunkSnapshot> {
        None
    }
}
