//! Anvil region containers (`r.<x>.<z>.mca`).
//!
//! Layout: a 4 KiB location table (1024 big-endian entries of 3-byte sector
//! offset + 1-byte sector count), a 4 KiB timestamp table, then chunk data in
//! 4 KiB sectors. Each chunk starts with a 4-byte length and a compression byte.
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::{GzDecoder, ZlibDecoder};
use mapsmith_chunk::ChunkSourceError;
use mapsmith_coords::{ChunkPos, RegionPos};

pub const SECTOR_SIZE: usize = 4096;
pub const HEADER_SIZE: usize = SECTOR_SIZE * 2;
pub const CHUNKS_PER_REGION: usize = 1024;

/// Set on the compression byte when the payload lives in a sibling `c.<x>.<z>.mcc` file.
const EXTERNAL_FLAG: u8 = 0x80;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zlib,
    None,
}

impl Compression {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b & !EXTERNAL_FLAG {
            1 => Some(Compression::Gzip),
            2 => Some(Compression::Zlib),
            3 => Some(Compression::None),
            _ => None,
        }
    }

    pub fn decompress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 4);
        match self {
            Compression::Gzip => {
                GzDecoder::new(data).read_to_end(&mut out)?;
            }
            Compression::Zlib => {
                ZlibDecoder::new(data).read_to_end(&mut out)?;
            }
            Compression::None => out.extend_from_slice(data),
        }
        Ok(out)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkLocation {
    pub sector: u32,
    pub count: u8,
}

impl ChunkLocation {
    #[inline]
    pub fn is_empty(self) -> bool {
        self.sector == 0 || self.count == 0
    }
}

/// Parsed location and timestamp tables.
#[derive(Clone, Debug)]
pub struct RegionHeader {
    pub region: RegionPos,
    pub locations: Box<[ChunkLocation]>,
    pub timestamps: Box<[u32]>,
}

impl RegionHeader {
    pub fn parse(region: RegionPos, bytes: &[u8]) -> Result<Self, ChunkSourceError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ChunkSourceError::CorruptContainer {
                region,
                reason: format!("header is {} bytes", bytes.len()),
            });
        }
        let word = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
        let locations = (0..CHUNKS_PER_REGION)
            .map(|i| {
                let raw = word(i * 4);
                ChunkLocation {
                    sector: raw >> 8,
                    count: (raw & 0xFF) as u8,
                }
            })
            .collect();
        let timestamps = (0..CHUNKS_PER_REGION)
            .map(|i| word(SECTOR_SIZE + i * 4))
            .collect();
        Ok(Self {
            region,
            locations,
            timestamps,
        })
    }

    pub fn read_from(region: RegionPos, path: &Path) -> Result<Self, ChunkSourceError> {
        let mut file = File::open(path).map_err(|e| ChunkSourceError::io(path, e))?;
        let mut buf = vec![0u8; HEADER_SIZE];
        let mut filled = 0;
        while filled < HEADER_SIZE {
            let n = file
                .read(&mut buf[filled..])
                .map_err(|e| ChunkSourceError::io(path, e))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        // An empty container has no chunks yet.
        if filled == 0 {
            return Ok(Self::empty(region));
        }
        Self::parse(region, &buf[..filled])
    }

    pub fn empty(region: RegionPos) -> Self {
        Self {
            region,
            locations: vec![ChunkLocation::default(); CHUNKS_PER_REGION].into_boxed_slice(),
            timestamps: vec![0; CHUNKS_PER_REGION].into_boxed_slice(),
        }
    }

    #[inline]
    pub fn location(&self, pos: ChunkPos) -> ChunkLocation {
        self.locations[RegionPos::chunk_index(pos)]
    }

    #[inline]
    pub fn timestamp(&self, pos: ChunkPos) -> u32 {
        self.timestamps[RegionPos::chunk_index(pos)]
    }

    pub fn chunk_count(&self) -> usize {
        self.locations.iter().filter(|l| !l.is_empty()).count()
    }
}

/// Reads and decompresses one chunk's NBT bytes. `Ok(None)` if the slot is empty.
pub fn read_chunk_bytes(
    path: &Path,
    header: &RegionHeader,
    pos: ChunkPos,
) -> Result<Option<Vec<u8>>, ChunkSourceError> {
    let loc = header.location(pos);
    if loc.is_empty() {
        return Ok(None);
    }
    let corrupt = |reason: String| ChunkSourceError::CorruptContainer {
        region: header.region,
        reason,
    };
    let mut file = File::open(path).map_err(|e| ChunkSourceError::io(path, e))?;
    file.seek(SeekFrom::Start(loc.sector as u64 * SECTOR_SIZE as u64))
        .map_err(|e| ChunkSourceError::io(path, e))?;
    let mut prefix = [0u8; 5];
    file.read_exact(&mut prefix)
        .map_err(|e| ChunkSourceError::io(path, e))?;
    let length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
    let kind = prefix[4];
    let compression = Compression::from_byte(kind)
        .ok_or_else(|| corrupt(format!("chunk {pos} has compression type {kind}")))?;

    let data = if kind & EXTERNAL_FLAG != 0 {
        let external = path.with_file_name(format!("c.{}.{}.mcc", pos.cx, pos.cz));
        std::fs::read(&external).map_err(|e| ChunkSourceError::io(&external, e))?
    } else {
        if length == 0 || length > loc.count as usize * SECTOR_SIZE {
            return Err(corrupt(format!(
                "chunk {pos} length {length} exceeds {} sectors",
                loc.count
            )));
        }
        let mut data = vec![0u8; length - 1];
        file.read_exact(&mut data)
            .map_err(|e| ChunkSourceError::io(path, e))?;
        data
    };
    compression
        .decompress(&data)
        .map(Some)
        .map_err(|e| ChunkSourceError::decode(pos, format!("decompression failed: {e}")))
}
