use mapsmith_chunk::{AIR, ChunkSnapshot};
use mapsmith_coords::ChunkPos;
use proptest::prelude::*;

fn local() -> impl Strategy<Value = usize> {
    0usize..16
}

proptest! {
    // set_block then block reads back, and neighbours stay air
    #[test]
    fn set_then_get(x in local(), z in local(), y in -64i32..320, id in 0u8..8) {
        let mut snap = ChunkSnapshot::new(ChunkPos::new(0, 0));
        let name = format!("test:block_{id}");
        snap.set_block(x, y, z, &name);
        prop_assert_eq!(snap.block(x, y, z), name.as_str());
        prop_assert_eq!(snap.block((x + 1) % 16, y, z), AIR);
        prop_assert_eq!(snap.top_non_air(x, z, 400), Some(y));
    }

    // The column top never exceeds the ceiling
    #[test]
    fn top_bounded_by_ceiling(x in local(), z in local(), y in -64i32..320, ceiling in -80i32..330) {
        let mut snap = ChunkSnapshot::new(ChunkPos::new(0, 0));
        snap.set_block(x, y, z, "minecraft:stone");
        match snap.top_non_air(x, z, ceiling) {
            Some(top) => prop_assert!(top <= ceiling && top == y),
            None => prop_assert!(y > ceiling),
        }
    }
}
