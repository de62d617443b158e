use serde::{Deserialize, Serialize};

use crate::pos::BlockPos;

/// Horizontal factor between a compressed dimension and a normal one.
pub const COMPRESSION_FACTOR: i32 = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DimensionScale {
    Normal,
    /// One cell here spans eight cells of a normal dimension on x and z.
    Compressed,
}

/// Opaque dimension tag. `-1` is the compressed dimension by convention.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionId(pub i32);

impl DimensionId {
    pub const OVERWORLD: DimensionId = DimensionId(0);
    pub const NETHER: DimensionId = DimensionId(-1);
    pub const END: DimensionId = DimensionId(1);

    #[inline]
    pub fn scale(self) -> DimensionScale {
        if self == Self::NETHER {
            DimensionScale::Compressed
        } else {
            DimensionScale::Normal
        }
    }
}

impl std::fmt::Display for DimensionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DIM{}", self.0)
    }
}

/// Maps a cell address from one dimension's scale into another's.
///
/// Compressed to normal multiplies x and z by 8. Normal to compressed divides
/// with truncation toward zero, so it is lossy for values not divisible by 8.
/// `y` is never scaled.
pub fn reinterpret(pos: BlockPos, from: DimensionId, to: DimensionId) -> BlockPos {
    match (from.scale(), to.scale()) {
        (DimensionScale::Compressed, DimensionScale::Normal) => BlockPos::new(
            pos.x.saturating_mul(COMPRESSION_FACTOR),
            pos.y,
            pos.z.saturating_mul(COMPRESSION_FACTOR),
        ),
        (DimensionScale::Normal, DimensionScale::Compressed) => BlockPos::new(
            pos.x / COMPRESSION_FACTOR,
            pos.y,
            pos.z / COMPRESSION_FACTOR,
        ),
        _ => pos,
    }
}
