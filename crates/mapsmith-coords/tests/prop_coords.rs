use mapsmith_coords::{BlockPos, ChunkPos, DimensionId, RegionPos, reinterpret};
use proptest::prelude::*;

fn coord() -> impl Strategy<Value = i32> {
    -30_000_000i32..=30_000_000
}

proptest! {
    // The chunk's min corner never exceeds the cell and is within 16 of it
    #[test]
    fn chunk_contains_block(x in coord(), y in -64i32..320, z in coord()) {
        let b = BlockPos::new(x, y, z);
        let min = b.chunk().min_block(y);
        prop_assert!(min.x <= x && x < min.x + 16);
        prop_assert!(min.z <= z && z < min.z + 16);
    }

    // Region of a block agrees with region of its chunk
    #[test]
    fn region_composes(x in coord(), z in coord()) {
        let b = BlockPos::new(x, 0, z);
        prop_assert_eq!(b.region(), b.chunk().region());
        let r = b.region();
        prop_assert!(r.contains(b.chunk()));
        let (px, pz) = r.pixel_offset(b.chunk()).unwrap();
        prop_assert!(px <= 496 && pz <= 496 && px % 16 == 0 && pz % 16 == 0);
    }

    // Compressed -> normal -> compressed is exact; y is untouched both ways
    #[test]
    fn compressed_round_trip(x in -3_000_000i32..3_000_000, y in -64i32..320, z in -3_000_000i32..3_000_000) {
        let p = BlockPos::new(x, y, z);
        let up = reinterpret(p, DimensionId::NETHER, DimensionId::OVERWORLD);
        prop_assert_eq!(up.y, y);
        prop_assert_eq!(reinterpret(up, DimensionId::OVERWORLD, DimensionId::NETHER), p);
    }

    // Filename and position agree
    #[test]
    fn filename_round_trip(rx in -100_000i32..100_000, rz in -100_000i32..100_000) {
        let r = RegionPos::new(rx, rz);
        prop_assert_eq!(RegionPos::from_filename(&r.file_name()), Some(r));
    }

    // Header index is unique within a region
    #[test]
    fn chunk_index_in_range(cx in coord(), cz in coord()) {
        let idx = RegionPos::chunk_index(ChunkPos::new(cx, cz));
        prop_assert!(idx < 1024);
    }
}
