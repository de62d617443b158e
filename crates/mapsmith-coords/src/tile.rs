use std::fmt;
use std::str::FromStr;

use crate::dimension::DimensionId;
use crate::region::RegionPos;

/// Lowest and highest underground slice; a slice is one section and section
/// indices are stored as a signed byte.
pub const SLICE_MIN: i32 = i8::MIN as i32;
pub const SLICE_MAX: i32 = i8::MAX as i32;

/// Which rendering of a region a tile holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MapVariant {
    Day,
    Night,
    Topo,
    /// Cave view cut at the top of section `slice` (cells `slice*16 ..= slice*16+15`).
    Underground { slice: i32 },
}

impl MapVariant {
    /// Directory name used for this variant's tiles.
    pub fn dir_name(self) -> String {
        match self {
            MapVariant::Day => "day".to_string(),
            MapVariant::Night => "night".to_string(),
            MapVariant::Topo => "topo".to_string(),
            MapVariant::Underground { slice } => slice.to_string(),
        }
    }

    /// Underground variant for `slice`, rejecting slices outside `SLICE_MIN..=SLICE_MAX`.
    pub fn underground(slice: i32) -> Result<Self, ParseVariantError> {
        if (SLICE_MIN..=SLICE_MAX).contains(&slice) {
            Ok(MapVariant::Underground { slice })
        } else {
            Err(ParseVariantError(format!("slice:{slice}")))
        }
    }

    #[inline]
    pub fn is_underground(self) -> bool {
        matches!(self, MapVariant::Underground { .. })
    }

    /// Highest cell y a column sample may start from.
    #[inline]
    pub fn ceiling(self, world_top: i32) -> i32 {
        match self {
            MapVariant::Underground { slice } => slice.saturating_mul(16).saturating_add(15).min(world_top),
            _ => world_top,
        }
    }
}

impl fmt::Display for MapVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapVariant::Underground { slice } => write!(f, "slice:{slice}"),
            other => f.write_str(&other.dir_name()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseVariantError(pub String);

impl fmt::Display for ParseVariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown map variant '{}' (expected day, night, topo or slice:N)",
            self.0
        )
    }
}

impl std::error::Error for ParseVariantError {}

impl FromStr for MapVariant {
    type Err = ParseVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(MapVariant::Day),
            "night" => Ok(MapVariant::Night),
            "topo" => Ok(MapVariant::Topo),
            other => other
                .strip_prefix("slice:")
                .and_then(|n| n.parse::<i32>().ok())
                .and_then(|slice| MapVariant::underground(slice).ok())
                .ok_or_else(|| ParseVariantError(s.to_string())),
        }
    }
}

/// Cache and storage key of one rendered tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub dimension: DimensionId,
    pub variant: MapVariant,
    pub region: RegionPos,
}

impl TileKey {
    #[inline]
    pub const fn new(region: RegionPos, variant: MapVariant, dimension: DimensionId) -> Self {
        Self {
            dimension,
            variant,
            region,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.dimension, self.variant, self.region)
    }
}
