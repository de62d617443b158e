use mapsmith_tiles::PixelBuffer;
use proptest::prelude::*;

fn edits() -> impl Strategy<Value = Vec<(u32, u32, [u8; 4])>> {
    prop::collection::vec((0u32..32, 0u32..32, any::<[u8; 4]>()), 0..40)
}

proptest! {
    // diff_count is symmetric and zero exactly when the buffers are equal
    #[test]
    fn diff_count_agrees_with_differs(a_edits in edits(), b_edits in edits()) {
        let mut a = PixelBuffer::new(32, 32);
        let mut b = PixelBuffer::new(32, 32);
        for (x, y, px) in a_edits { a.put_pixel(x, y, px); }
        for (x, y, px) in b_edits { b.put_pixel(x, y, px); }
        let n = a.diff_count(&b);
        prop_assert_eq!(n, b.diff_count(&a));
        prop_assert_eq!(n == 0, !a.differs(&b));
        prop_assert!(n <= 32 * 32);
    }

    // put_pixel then pixel reads back
    #[test]
    fn put_then_read(x in 0u32..32, y in 0u32..32, px in any::<[u8; 4]>()) {
        let mut a = PixelBuffer::new(32, 32);
        a.put_pixel(x, y, px);
        prop_assert_eq!(a.pixel(x, y), px);
    }
}
