mod common;

use std::sync::atomic::Ordering;

use mapsmith_coords::{BlockPos, ChunkPos, DimensionId, MapVariant, RegionPos, TileKey};
use mapsmith_runtime::{RegionScanner, ScanRequest};
use mapsmith_tiles::{PixelBuffer, TileStore};

fn request(include_all: bool) -> ScanRequest {
    ScanRequest {
        dimension: DimensionId::OVERWORLD,
        variant: MapVariant::Day,
        reference: BlockPos::new(5, 70, 20),
        include_all,
    }
}

/// Regions at squared distances 0, 1, 4 and 9 from the origin region.
fn populate(h: &common::Harness) {
    for region in [(0, 0), (1, 0), (0, 2), (-3, 0)] {
        let min = RegionPos::new(region.0, region.1).min_chunk();
        h.world.put_chunk(min.offset(3, 3), 8);
    }
    h.world.add_file("r.1.0.mca");
    h.world.add_file("notes.txt");
    h.world.add_file("r.a.b.mca");
}

fn order(queue: &mapsmith_runtime::WorkQueue) -> Vec<RegionPos> {
    queue.iter().map(|item| item.region).collect()
}

fn store_tile(h: &common::Harness, region: RegionPos) {
    let key = TileKey::new(region, MapVariant::Day, DimensionId::OVERWORLD);
    h.tiles.write_tile(&key, &PixelBuffer::tile()).unwrap();
}

#[test]
fn nearest_region_pops_first() {
    let h = common::harness();
    populate(&h);
    let mut queue = RegionScanner::new(h.ctx.clone()).scan(&request(false));
    assert_eq!(
        order(&queue),
        vec![
            RegionPos::new(0, 0),
            RegionPos::new(1, 0),
            RegionPos::new(0, 2),
            RegionPos::new(-3, 0),
        ]
    );
    assert_eq!(queue.found(), 4);
    let first = queue.pop().unwrap();
    assert_eq!(first.priority, 0);
    assert_eq!(queue.pop().unwrap().priority, 1);
    assert_eq!(queue.pop().unwrap().priority, 4);
    assert_eq!(queue.pop().unwrap().priority, 9);
    assert!(queue.is_empty());
    assert_eq!(queue.progress(), 100.0);
}

#[test]
fn duplicate_names_enqueue_once() {
    let h = common::harness();
    populate(&h);
    h.world.add_file("r.0.2.mca");
    let queue = RegionScanner::new(h.ctx.clone()).scan(&request(true));
    let mut regions = order(&queue);
    let total = regions.len();
    regions.sort();
    regions.dedup();
    assert_eq!(regions.len(), total);
}

#[test]
fn existing_tiles_are_skipped_but_reference_stays() {
    let h = common::harness();
    populate(&h);
    store_tile(&h, RegionPos::new(0, 0));
    store_tile(&h, RegionPos::new(1, 0));
    let queue = RegionScanner::new(h.ctx.clone()).scan(&request(false));
    assert_eq!(
        order(&queue),
        vec![RegionPos::new(0, 0), RegionPos::new(0, 2), RegionPos::new(-3, 0)]
    );

    let all = RegionScanner::new(h.ctx.clone()).scan(&request(true));
    assert_eq!(all.len(), 4);
}

#[test]
fn stale_region_with_tile_is_rescanned() {
    let h = common::harness();
    populate(&h);
    store_tile(&h, RegionPos::new(1, 0));
    h.ctx.monitor.on_cell_changed(BlockPos::new(32 * 16 + 40, 64, 40));
    let queue = RegionScanner::new(h.ctx.clone()).scan(&request(false));
    assert!(order(&queue).contains(&RegionPos::new(1, 0)));
}

#[test]
fn empty_containers_are_skipped() {
    let h = common::harness();
    h.world.put_chunk(ChunkPos::new(2, 2), 4);
    h.world.add_file("r.5.5.mca");
    let queue = RegionScanner::new(h.ctx.clone()).scan(&request(false));
    assert_eq!(order(&queue), vec![RegionPos::new(0, 0)]);
}

#[test]
fn missing_region_dir_is_created_and_queue_is_empty() {
    let h = common::harness();
    h.world.dir_exists.store(false, Ordering::SeqCst);
    let queue = RegionScanner::new(h.ctx.clone()).scan(&request(true));
    assert!(queue.is_empty());
    assert_eq!(queue.found(), 0);
    assert!(h.world.dir_exists.load(Ordering::SeqCst));
}

#[test]
fn equal_distances_pop_in_ascending_order() {
    let h = common::harness();
    for (rx, rz) in [(1, 0), (0, 1), (-1, 0), (0, -1), (0, 0)] {
        let min = RegionPos::new(rx, rz).min_chunk();
        h.world.put_chunk(min.offset(1, 1), 5);
    }
    let mut queue = RegionScanner::new(h.ctx.clone()).scan(&request(false));
    let expected = vec![
        RegionPos::new(0, 0),
        RegionPos::new(-1, 0),
        RegionPos::new(0, -1),
        RegionPos::new(0, 1),
        RegionPos::new(1, 0),
    ];
    assert_eq!(order(&queue), expected);
    let mut popped = Vec::new();
    while let Some(item) = queue.pop() {
        popped.push(item.region);
    }
    assert_eq!(popped, expected);
}

#[test]
fn counts_files_and_tiles_when_nothing_is_queued() {
    let h = common::harness();
    // the reference region has a tile and nothing else has chunks
    h.world.put_chunk(ChunkPos::new(1, 1), 5);
    store_tile(&h, RegionPos::new(0, 0));
    h.world.add_file("r.4.4.mca");
    h.world.add_file("r.4.4.mca");
    let queue = RegionScanner::new(h.ctx.clone()).scan(&request(false));
    assert_eq!(order(&queue), vec![RegionPos::new(0, 0)]);
    assert_eq!(queue.region_files(), 2);
    assert_eq!(queue.existing_tiles(), 1);

    store_tile(&h, RegionPos::new(4, 4));
    let queue = RegionScanner::new(h.ctx.clone()).scan(&request(false));
    assert_eq!(queue.region_files(), 2);
    assert_eq!(queue.existing_tiles(), 2);
}
