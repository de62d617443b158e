use std::fs;
use std::io::Write;
use std::path::Path;

use fastnbt::{ByteArray, LongArray};
use flate2::Compression;
use flate2::write::ZlibEncoder;
use mapsmith_chunk::{
    ChunkDataSource, ChunkDecoder, ChunkSnapshot, ChunkSourceError, LiveSession, RawChunkPayload,
    WorldStore,
};
use mapsmith_coords::{ChunkPos, DimensionId, MapVariant, RegionPos, TileKey};
use mapsmith_io::{AnvilDecoder, AnvilWorldStore, FsTileStore, RegionHeader};
use mapsmith_tiles::{PixelBuffer, TileStore};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
struct Entry {
    #[serde(rename = "Name")]
    name: String,
}

#[derive(Serialize)]
struct Blocks {
    palette: Vec<Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<LongArray>,
}

#[derive(Serialize)]
struct Biomes {
    palette: Vec<String>,
}

#[derive(Serialize)]
struct Section {
    #[serde(rename = "Y")]
    y: i8,
    block_states: Blocks,
    biomes: Biomes,
}

#[derive(Serialize)]
struct Chunk {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    #[serde(rename = "xPos")]
    x: i32,
    #[serde(rename = "zPos")]
    z: i32,
    sections: Vec<Section>,
}

#[derive(Serialize)]
struct NumericSection {
    #[serde(rename = "Y")]
    y: i8,
    #[serde(rename = "Blocks")]
    blocks: ByteArray,
}

#[derive(Serialize)]
struct NumericLevel {
    #[serde(rename = "xPos")]
    x: i32,
    #[serde(rename = "zPos")]
    z: i32,
    #[serde(rename = "Sections")]
    sections: Vec<NumericSection>,
}

#[derive(Serialize)]
struct NumericChunk {
    #[serde(rename = "DataVersion")]
    data_version: i32,
    #[serde(rename = "Level")]
    level: NumericLevel,
}

/// Pre-palette chunk whose section 0 is solid stone (block id 1).
fn numeric_chunk_nbt(pos: ChunkPos, data_version: i32) -> Vec<u8> {
    let chunk = NumericChunk {
        data_version,
        level: NumericLevel {
            x: pos.cx,
            z: pos.cz,
            sections: vec![NumericSection {
                y: 0,
                blocks: ByteArray::new(vec![1i8; 4096]),
            }],
        },
    };
    fastnbt::to_bytes(&chunk).unwrap()
}

/// Stone floor at section 0 with one grass block at local (2, 15, 3).
fn chunk_nbt(pos: ChunkPos) -> Vec<u8> {
    let mut values = vec![0u64; 4096];
    values[(15 * 16 + 3) * 16 + 2] = 1;
    // 4 bits per entry, 16 per long
    let longs: Vec<i64> = values
        .chunks(16)
        .map(|c| {
            c.iter()
                .enumerate()
                .fold(0u64, |acc, (i, v)| acc | (v << (i * 4))) as i64
        })
        .collect();
    let chunk = Chunk {
        data_version: 3465,
        x: pos.cx,
        z: pos.cz,
        sections: vec![
            Section {
                y: 0,
                block_states: Blocks {
                    palette: vec![
                        Entry { name: "minecraft:stone".into() },
                        Entry { name: "minecraft:grass_block".into() },
                    ],
                    data: Some(LongArray::new(longs)),
                },
                biomes: Biomes { palette: vec!["minecraft:plains".into()] },
            },
            Section {
                y: 1,
                block_states: Blocks {
                    palette: vec![Entry { name: "minecraft:air".into() }],
                    data: None,
                },
                biomes: Biomes { palette: vec!["minecraft:plains".into()] },
            },
        ],
    };
    fastnbt::to_bytes(&chunk).unwrap()
}

fn write_region(dir: &Path, region: RegionPos, chunks: &[ChunkPos]) {
    let mut header = vec![0u8; 8192];
    let mut body: Vec<u8> = Vec::new();
    let mut sector = 2u32;
    for &pos in chunks {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&chunk_nbt(pos)).unwrap();
        let compressed = enc.finish().unwrap();
        let mut record = Vec::new();
        record.extend_from_slice(&((compressed.len() + 1) as u32).to_be_bytes());
        record.push(2);
        record.extend_from_slice(&compressed);
        let sectors = record.len().div_ceil(4096) as u32;
        record.resize(sectors as usize * 4096, 0);
        let idx = RegionPos::chunk_index(pos);
        header[idx * 4..idx * 4 + 4].copy_from_slice(&((sector << 8) | sectors).to_be_bytes());
        header[4096 + idx * 4..4096 + idx * 4 + 4].copy_from_slice(&1234u32.to_be_bytes());
        body.extend_from_slice(&record);
        sector += sectors;
    }
    fs::create_dir_all(dir).unwrap();
    let mut bytes = header;
    bytes.extend_from_slice(&body);
    fs::write(dir.join(region.file_name()), bytes).unwrap();
}

struct NoSession;

impl LiveSession for NoSession {
    fn current_dimension(&self) -> Option<DimensionId> {
        None
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

#[test]
fn reads_chunk_from_container() {
    let tmp = tempfile::tempdir().unwrap();
    let region = RegionPos::new(-1, 0);
    let present = ChunkPos::new(-3, 5);
    write_region(&tmp.path().join("region"), region, &[present]);

    let store = AnvilWorldStore::new(tmp.path());
    assert!(store.region_container_exists(DimensionId::OVERWORLD, region));
    assert!(!store.region_container_exists(DimensionId::NETHER, region));
    assert_eq!(store.chunk_count(DimensionId::OVERWORLD, region).unwrap(), 1);
    assert_eq!(store.chunk_count(DimensionId::NETHER, region).unwrap(), 0);

    let payload = store
        .read_chunk(DimensionId::OVERWORLD, present)
        .unwrap()
        .expect("chunk present");
    assert_eq!(payload.timestamp, 1234);
    assert!(
        store
            .read_chunk(DimensionId::OVERWORLD, ChunkPos::new(-4, 5))
            .unwrap()
            .is_none()
    );

    let snap = AnvilDecoder::new().decode(&payload).unwrap();
    assert_eq!(snap.pos, present);
    assert_eq!(snap.block(2, 15, 3), "minecraft:grass_block");
    assert_eq!(snap.block(3, 15, 3), "minecraft:stone");
    assert_eq!(snap.block(2, 16, 3), "minecraft:air");
    assert_eq!(snap.top_non_air(2, 3, 319), Some(15));
    assert_eq!(snap.biome(0, 0, 0), Some("minecraft:plains"));
}

#[test]
fn data_source_over_anvil_store() {
    let tmp = tempfile::tempdir().unwrap();
    let region = RegionPos::new(0, 0);
    write_region(&tmp.path().join("DIM-1").join("region"), region, &[ChunkPos::new(1, 2)]);
    let source = ChunkDataSource::new(
        Arc::new(NoSession),
        Arc::new(AnvilWorldStore::new(tmp.path())),
        Arc::new(AnvilDecoder::new()),
    );
    assert!(source.acquire(DimensionId::NETHER, ChunkPos::new(1, 2)).is_some());
    assert!(source.acquire(DimensionId::NETHER, ChunkPos::new(2, 2)).is_none());
    assert!(source.acquire(DimensionId::NETHER, ChunkPos::new(99, 2)).is_none());
    assert_eq!(source.stats().store_hits, 1);
    assert_eq!(source.stats().errors, 0);
}

#[test]
fn region_listing_and_creation() {
    let tmp = tempfile::tempdir().unwrap();
    let store = AnvilWorldStore::new(tmp.path());
    assert!(store.list_region_files(DimensionId::OVERWORLD).unwrap().is_none());
    store.ensure_region_dir(DimensionId::OVERWORLD).unwrap();
    fs::write(tmp.path().join("region").join("r.0.1.mca"), b"").unwrap();
    fs::write(tmp.path().join("region").join("notes.txt"), b"x").unwrap();
    let names = store.list_region_files(DimensionId::OVERWORLD).unwrap().unwrap();
    assert_eq!(names, vec!["notes.txt".to_string(), "r.0.1.mca".to_string()]);

    // empty containers hold no chunks
    let header = RegionHeader::read_from(
        RegionPos::new(0, 1),
        &tmp.path().join("region").join("r.0.1.mca"),
    )
    .unwrap();
    assert_eq!(header.chunk_count(), 0);
    assert!(
        store
            .read_chunk(DimensionId::OVERWORLD, ChunkPos::new(0, 32))
            .unwrap()
            .is_none()
    );
}

#[test]
fn png_tiles_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let tiles = FsTileStore::new(tmp.path());
    let key = TileKey::new(RegionPos::new(2, -3), MapVariant::Night, DimensionId::OVERWORLD);
    assert!(!tiles.tile_exists(&key));
    assert!(tiles.read_tile(&key).unwrap().is_none());

    let mut pixels = PixelBuffer::tile();
    pixels.put_pixel(0, 0, [10, 20, 30, 255]);
    pixels.put_pixel(511, 511, [1, 2, 3, 128]);
    tiles.write_tile(&key, &pixels).unwrap();

    assert!(tmp.path().join("DIM0").join("night").join("2,-3.png").is_file());
    assert_eq!(tiles.read_tile(&key).unwrap(), Some(pixels));
}

#[test]
fn numeric_block_ids_are_rejected() {
    let pos = ChunkPos::new(4, -2);
    let decoder = AnvilDecoder::new();
    for version in [1343, 1631] {
        let payload = RawChunkPayload {
            pos,
            timestamp: 0,
            data: numeric_chunk_nbt(pos, version),
        };
        match decoder.decode(&payload) {
            Err(ChunkSourceError::Decode { pos: at, .. }) => assert_eq!(at, pos),
            Err(other) => panic!("unexpected error for {version}: {other}"),
            Ok(snap) => panic!("version {version} decoded to {} sections", snap.sections().len()),
        }
    }
}
