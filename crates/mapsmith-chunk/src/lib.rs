//! Chunk snapshots and the live-or-persisted chunk acquisition path.
#![forbid(unsafe_code)]

mod error;
mod snapshot;
mod source;

pub use error::ChunkSourceError;
pub use snapshot::{AIR, ChunkSection, ChunkSnapshot, SECTION_CELLS, SECTION_HEIGHT, is_air};
pub use source::{
    ChunkDataSource, ChunkDecoder, LiveSession, RawChunkPayload, SourceStats, WorldStore,
};
