//! NBT chunk decoding. One adapter per storage generation behind [`AnvilDecoder`].
use std::sync::Arc;

use fastnbt::{ByteArray, LongArray};
use mapsmith_chunk::{
    ChunkDecoder, ChunkSection, ChunkSnapshot, ChunkSourceError, RawChunkPayload, SECTION_CELLS,
};
use mapsmith_coords::ChunkPos;
use serde::Deserialize;

/// First data version with chunk data at the root instead of under `Level`.
pub const FLATTENED_ROOT_VERSION: i32 = 2844;

/// First data version with palettes instead of numeric block ids.
pub const FLATTENING_VERSION: i32 = 1451;

/// First data version whose packed longs never split a value across two longs.
pub const NON_SPANNING_VERSION: i32 = 2529;

#[derive(Deserialize)]
struct VersionTag {
    #[serde(rename = "DataVersion", default)]
    data_version: i32,
}

#[derive(Deserialize)]
struct PaletteEntry {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Deserialize)]
struct FlatChunk {
    #[serde(rename = "xPos")]
    x: i32,
    #[serde(rename = "zPos")]
    z: i32,
    #[serde(default)]
    sections: Vec<FlatSection>,
}

#[derive(Deserialize)]
struct FlatSection {
    #[serde(rename = "Y")]
    y: i8,
    block_states: Option<PalettedBlocks>,
    biomes: Option<PalettedBiomes>,
    #[serde(rename = "BlockLight")]
    block_light: Option<ByteArray>,
    #[serde(rename = "SkyLight")]
    sky_light: Option<ByteArray>,
}

#[derive(Deserialize)]
struct PalettedBlocks {
    palette: Vec<PaletteEntry>,
    data: Option<LongArray>,
}

#[derive(Deserialize)]
struct PalettedBiomes {
    palette: Vec<String>,
    data: Option<LongArray>,
}

#[derive(Deserialize)]
struct LegacyRoot {
    #[serde(rename = "Level")]
    level: LegacyLevel,
}

#[derive(Deserialize)]
struct LegacyLevel {
    #[serde(rename = "xPos")]
    x: i32,
    #[serde(rename = "zPos")]
    z: i32,
    #[serde(rename = "Sections", default)]
    sections: Vec<LegacySection>,
}

#[derive(Deserialize)]
struct LegacySection {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Palette")]
    palette: Option<Vec<PaletteEntry>>,
    #[serde(rename = "Blocks")]
    blocks: Option<ByteArray>,
    #[serde(rename = "BlockStates")]
    block_states: Option<LongArray>,
    #[serde(rename = "BlockLight")]
    block_light: Option<ByteArray>,
    #[serde(rename = "SkyLight")]
    sky_light: Option<ByteArray>,
}

/// Bits per entry for a palette of `len` entries, never below `min`.
fn bits_for(len: usize, min: u32) -> u32 {
    let needed = usize::BITS - len.saturating_sub(1).leading_zeros();
    needed.max(min)
}

/// Unpacks `count` values of `bits` width from packed longs. With `spanning`, values
/// may straddle two longs; otherwise each long holds `64 / bits` values and the
/// remaining high bits are padding.
pub fn unpack(data: &[i64], bits: u32, count: usize, spanning: bool) -> Option<Vec<u16>> {
    if bits == 0 || bits > 16 {
        return None;
    }
    let mask = (1u64 << bits) - 1;
    let mut out = Vec::with_capacity(count);
    if spanning {
        if data.len() * 64 < count * bits as usize {
            return None;
        }
        for i in 0..count {
            let bit = i * bits as usize;
            let word = bit / 64;
            let shift = (bit % 64) as u32;
            let mut v = (data[word] as u64) >> shift;
            if shift + bits > 64 {
                v |= (data[word + 1] as u64) << (64 - shift);
            }
            out.push((v & mask) as u16);
        }
    } else {
        let per_long = (64 / bits) as usize;
        if data.len() * per_long < count {
            return None;
        }
        for i in 0..count {
            let word = data[i / per_long] as u64;
            let shift = (i % per_long) as u32 * bits;
            out.push(((word >> shift) & mask) as u16);
        }
    }
    Some(out)
}

fn light(arr: Option<ByteArray>) -> Option<Box<[u8]>> {
    arr.filter(|a| a.len() == 2048)
        .map(|a| a.iter().map(|&b| b as u8).collect())
}

fn palette_names(entries: Vec<PaletteEntry>) -> Vec<Arc<str>> {
    entries.into_iter().map(|e| Arc::from(e.name)).collect()
}

/// Decodes Anvil chunk NBT of any supported data version.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnvilDecoder;

impl AnvilDecoder {
    pub fn new() -> Self {
        Self
    }

    fn decode_flat(&self, pos: ChunkPos, bytes: &[u8]) -> Result<ChunkSnapshot, ChunkSourceError> {
        let chunk: FlatChunk = fastnbt::from_bytes(bytes)
            .map_err(|e| ChunkSourceError::decode(pos, e.to_string()))?;
        let mut sections = Vec::with_capacity(chunk.sections.len());
        for s in chunk.sections {
            let y = i32::from(s.y);
            let mut section = match s.block_states {
                Some(states) => {
                    let palette = palette_names(states.palette);
                    let indices = match (&states.data, palette.len()) {
                        (Some(data), n) if n > 1 => {
                            unpack(data, bits_for(n, 4), SECTION_CELLS, false).ok_or_else(|| {
                                ChunkSourceError::decode(pos, format!("section {y} block data too short"))
                            })?
                        }
                        _ => Vec::new(),
                    };
                    ChunkSection::from_palette(y, palette, indices)
                }
                None => ChunkSection::uniform(y, mapsmith_chunk::AIR),
            };
            if let Some(biomes) = s.biomes {
                let n = biomes.palette.len();
                section.biome_palette = biomes.palette.into_iter().map(Arc::from).collect();
                if let (Some(data), true) = (&biomes.data, n > 1) {
                    section.biome_indices = unpack(data, bits_for(n, 1), 64, false)
                        .map(|v| v.into_iter().map(|b| b as u8).collect())
                        .unwrap_or_default();
                }
            }
            section.block_light = light(s.block_light);
            section.sky_light = light(s.sky_light);
            sections.push(section);
        }
        Ok(ChunkSnapshot::with_sections(ChunkPos::new(chunk.x, chunk.z), sections))
    }

    fn decode_legacy(
        &self,
        pos: ChunkPos,
        bytes: &[u8],
        version: i32,
    ) -> Result<ChunkSnapshot, ChunkSourceError> {
        let root: LegacyRoot = fastnbt::from_bytes(bytes)
            .map_err(|e| ChunkSourceError::decode(pos, e.to_string()))?;
        let level = root.level;
        let spanning = version < NON_SPANNING_VERSION;
        let mut sections = Vec::with_capacity(level.sections.len());
        for s in level.sections {
            let y = i32::from(s.y);
            let Some(entries) = s.palette else {
                if s.blocks.is_some() {
                    return Err(ChunkSourceError::decode(
                        pos,
                        format!("section {y} stores numeric block ids"),
                    ));
                }
                // light-only section above or below the world
                continue;
            };
            let palette = palette_names(entries);
            let indices = match (&s.block_states, palette.len()) {
                (Some(data), n) if n > 1 => unpack(data, bits_for(n, 4), SECTION_CELLS, spanning)
                    .ok_or_else(|| {
                        ChunkSourceError::decode(pos, format!("section {y} block data too short"))
                    })?,
                _ => Vec::new(),
            };
            let mut section = ChunkSection::from_palette(y, palette, indices);
            section.block_light = light(s.block_light);
            section.sky_light = light(s.sky_light);
            sections.push(section);
        }
        Ok(ChunkSnapshot::with_sections(ChunkPos::new(level.x, level.z), sections))
    }
}

impl ChunkDecoder for AnvilDecoder {
    fn decode(&self, payload: &RawChunkPayload) -> Result<ChunkSnapshot, ChunkSourceError> {
        let tag: VersionTag = fastnbt::from_bytes(&payload.data)
            .map_err(|e| ChunkSourceError::decode(payload.pos, e.to_string()))?;
        if tag.data_version >= FLATTENED_ROOT_VERSION {
            self.decode_flat(payload.pos, &payload.data)
        } else if tag.data_version < FLATTENING_VERSION {
            Err(ChunkSourceError::decode(
                payload.pos,
                format!("data version {} predates block palettes", tag.data_version),
            ))
        } else {
            self.decode_legacy(payload.pos, &payload.data, tag.data_version)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(values: &[u16], bits: u32, spanning: bool) -> Vec<i64> {
        let mut out: Vec<u64> = Vec::new();
        if spanning {
            out.resize((values.len() * bits as usize).div_ceil(64), 0);
            for (i, &v) in values.iter().enumerate() {
                let bit = i * bits as usize;
                let (word, shift) = (bit / 64, (bit % 64) as u32);
                out[word] |= (v as u64) << shift;
                if shift + bits > 64 {
                    out[word + 1] |= (v as u64) >> (64 - shift);
                }
            }
        } else {
            let per = (64 / bits) as usize;
            out.resize(values.len().div_ceil(per), 0);
            for (i, &v) in values.iter().enumerate() {
                out[i / per] |= (v as u64) << ((i % per) as u32 * bits);
            }
        }
        out.into_iter().map(|w| w as i64).collect()
    }

    #[test]
    fn bits_for_palettes() {
        assert_eq!(bits_for(2, 4), 4);
        assert_eq!(bits_for(17, 4), 5);
        assert_eq!(bits_for(2, 1), 1);
        assert_eq!(bits_for(3, 1), 2);
        assert_eq!(bits_for(64, 1), 6);
    }

    #[test]
    fn unpack_both_layouts() {
        let values: Vec<u16> = (0..4096).map(|i| (i * 7 % 31) as u16).collect();
        for spanning in [false, true] {
            let packed = pack(&values, 5, spanning);
            assert_eq!(unpack(&packed, 5, 4096, spanning).unwrap(), values);
        }
        // 5-bit non-spanning holds 12 per long
        assert_eq!(pack(&values, 5, false).len(), 342);
        assert_eq!(pack(&values, 5, true).len(), 320);
    }

    #[test]
    fn unpack_rejects_short_data() {
        assert!(unpack(&[0; 10], 4, 4096, false).is_none());
        assert!(unpack(&[0; 10], 4, 4096, true).is_none());
    }
}
