#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, bounded};
use hashbrown::HashMap;
use mapsmith_chunk::{
    AIR, ChunkDataSource, ChunkDecoder, ChunkSection, ChunkSnapshot, ChunkSourceError,
    LiveSession, RawChunkPayload, WorldStore,
};
use mapsmith_coords::{ChunkPos, DimensionId, MapVariant, RegionPos};
use mapsmith_monitor::ChangeMonitor;
use mapsmith_runtime::{CellColorizer, ColumnSample, MappingContext, NeighborContext};
use mapsmith_tiles::{MemoryTileStore, Rgba, TileCache, TileCacheConfig};

/// Session whose mapping check can be held on a gate once. Resident chunks
/// are given as terrain heights like [`MemoryWorld`].
pub struct TestSession {
    pub dim: Mutex<Option<DimensionId>>,
    pub active: AtomicBool,
    pub resident: Mutex<HashMap<ChunkPos, u8>>,
    gate: Mutex<Option<Receiver<()>>>,
}

impl TestSession {
    pub fn new(dim: DimensionId) -> Self {
        Self {
            dim: Mutex::new(Some(dim)),
            active: AtomicBool::new(true),
            resident: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
        }
    }

    pub fn load_chunk(&self, pos: ChunkPos, height: u8) {
        self.resident.lock().unwrap().insert(pos, height);
    }

    /// The next mapping check blocks until the returned sender fires or is dropped.
    pub fn arm_gate(&self) -> Sender<()> {
        let (tx, rx) = bounded(1);
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

impl LiveSession for TestSession {
    fn current_dimension(&self) -> Option<DimensionId> {
        *self.dim.lock().unwrap()
    }

    fn is_mapping_active(&self) -> bool {
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            let _ = rx.recv_timeout(Duration::from_secs(5));
        }
        self.active.load(Ordering::SeqCst)
    }

    fn is_loaded(&self, pos: ChunkPos) -> bool {
        self.resident.lock().unwrap().contains_key(&pos)
    }

    fn loaded_chunk(&self, pos: ChunkPos) -> Option<ChunkSnapshot> {
        let height = *self.resident.lock().unwrap().get(&pos)?;
        Some(height_chunk(pos, height))
    }
}

/// Stone from y 0 up to `height`, air above, within one section.
pub fn height_chunk(pos: ChunkPos, height: u8) -> ChunkSnapshot {
    let mut snap = ChunkSnapshot::with_sections(pos, vec![ChunkSection::uniform(0, AIR)]);
    for x in 0..16 {
        for z in 0..16 {
            for y in 0..=i32::from(height.min(15)) {
                snap.set_block(x, y, z, "minecraft:stone");
            }
        }
    }
    snap
}

/// World held in memory: one byte per chunk giving its terrain height (0..16).
pub struct MemoryWorld {
    pub chunks: Mutex<HashMap<ChunkPos, u8>>,
    pub files: Mutex<Vec<String>>,
    pub dir_exists: AtomicBool,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self {
            chunks: Mutex::new(HashMap::new()),
            files: Mutex::new(Vec::new()),
            dir_exists: AtomicBool::new(true),
        }
    }

    pub fn put_chunk(&self, pos: ChunkPos, height: u8) {
        self.chunks.lock().unwrap().insert(pos, height);
        let name = pos.region().file_name();
        let mut files = self.files.lock().unwrap();
        if !files.contains(&name) {
            files.push(name);
        }
    }

    pub fn add_file(&self, name: &str) {
        self.files.lock().unwrap().push(name.to_string());
    }
}

impl WorldStore for MemoryWorld {
    fn region_container_exists(&self, _dimension: DimensionId, region: RegionPos) -> bool {
        self.files.lock().unwrap().contains(&region.file_name())
    }

    fn chunk_count(
        &self,
        _dimension: DimensionId,
        region: RegionPos,
    ) -> Result<usize, ChunkSourceError> {
        Ok(self
            .chunks
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.region() == region)
            .count())
    }

    fn read_chunk(
        &self,
        _dimension: DimensionId,
        pos: ChunkPos,
    ) -> Result<Option<RawChunkPayload>, ChunkSourceError> {
        Ok(self.chunks.lock().unwrap().get(&pos).map(|&h| RawChunkPayload {
            pos,
            timestamp: 0,
            data: vec![h],
        }))
    }

    fn list_region_files(
        &self,
        _dimension: DimensionId,
    ) -> Result<Option<Vec<String>>, ChunkSourceError> {
        if !self.dir_exists.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.files.lock().unwrap().clone()))
    }

    fn ensure_region_dir(&self, _dimension: DimensionId) -> Result<(), ChunkSourceError> {
        self.dir_exists.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Payloads are a single height byte, see [`height_chunk`].
pub struct HeightDecoder;

impl ChunkDecoder for HeightDecoder {
    fn decode(&self, payload: &RawChunkPayload) -> Result<ChunkSnapshot, ChunkSourceError> {
        let height = *payload
            .data
            .first()
            .ok_or_else(|| ChunkSourceError::decode(payload.pos, "empty payload"))?;
        Ok(height_chunk(payload.pos, height))
    }
}

/// Colours a column by its height; panics once when armed.
#[derive(Default)]
pub struct HeightColorizer {
    pub panic_next: AtomicBool,
}

impl CellColorizer for HeightColorizer {
    fn color_of(
        &self,
        sample: &ColumnSample<'_>,
        _neighbors: &NeighborContext,
        variant: MapVariant,
    ) -> Rgba {
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("colorizer exploded");
        }
        let shade = if variant == MapVariant::Night { 1 } else { 0 };
        [sample.y as u8, shade, 0, 255]
    }
}

pub struct Harness {
    pub session: Arc<TestSession>,
    pub world: Arc<MemoryWorld>,
    pub tiles: Arc<MemoryTileStore>,
    pub ctx: Arc<MappingContext>,
}

pub fn harness() -> Harness {
    let session = Arc::new(TestSession::new(DimensionId::OVERWORLD));
    let world = Arc::new(MemoryWorld::new());
    let tiles = Arc::new(MemoryTileStore::new());
    let source = ChunkDataSource::new(session.clone(), world.clone(), Arc::new(HeightDecoder));
    let monitor = Arc::new(ChangeMonitor::new());
    monitor.attach(DimensionId::OVERWORLD);
    let cache = Arc::new(TileCache::new(tiles.clone(), TileCacheConfig::default()));
    let ctx = Arc::new(MappingContext::new(source, monitor, cache));
    Harness {
        session,
        world,
        tiles,
        ctx,
    }
}
