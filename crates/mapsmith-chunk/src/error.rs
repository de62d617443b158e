use std::path::PathBuf;

use mapsmith_coords::{ChunkPos, RegionPos};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChunkSourceError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt region container ({region}): {reason}")]
    CorruptContainer { region: RegionPos, reason: String },
    #[error("cannot decode chunk {pos}: {reason}")]
    Decode { pos: ChunkPos, reason: String },
}

impl ChunkSourceError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn decode(pos: ChunkPos, reason: impl Into<String>) -> Self {
        Self::Decode {
            pos,
            reason: reason.into(),
        }
    }
}
