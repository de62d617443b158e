use mapsmith_coords::{CHUNK_SIZE, REGION_PIXELS};
use rayon::prelude::*;

pub type Rgba = [u8; 4];

/// Fully transparent pixel; what an unrendered cell looks like.
pub const BLANK: Rgba = [0, 0, 0, 0];

/// Plain RGBA8 raster, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Blank region-sized buffer.
    pub fn tile() -> Self {
        Self::new(REGION_PIXELS, REGION_PIXELS)
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    #[inline]
    pub fn put_pixel(&mut self, x: u32, y: u32, rgba: Rgba) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Writes one chunk's 16x16 block of pixels (row-major, z rows) at `(ox, oy)`.
    pub fn blit_chunk(&mut self, ox: u32, oy: u32, block: &[Rgba]) {
        let side = CHUNK_SIZE as u32;
        debug_assert_eq!(block.len(), (side * side) as usize);
        for dz in 0..side {
            for dx in 0..side {
                if let Some(px) = block.get((dz * side + dx) as usize) {
                    self.put_pixel(ox + dx, oy + dz, *px);
                }
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }

    /// Cheap equality check; any size difference counts as different.
    #[inline]
    pub fn differs(&self, other: &PixelBuffer) -> bool {
        self.width != other.width || self.height != other.height || self.data != other.data
    }

    /// Number of pixels that differ. Size mismatch counts every pixel of the larger buffer.
    pub fn diff_count(&self, other: &PixelBuffer) -> usize {
        if self.width != other.width || self.height != other.height {
            let a = self.width as usize * self.height as usize;
            let b = other.width as usize * other.height as usize;
            return a.max(b);
        }
        let row = self.width as usize * 4;
        self.data
            .par_chunks(row)
            .zip(other.data.par_chunks(row))
            .map(|(a, b)| {
                a.chunks_exact(4)
                    .zip(b.chunks_exact(4))
                    .filter(|(pa, pb)| pa != pb)
                    .count()
            })
            .sum()
    }

    /// Number of pixels that are not [`BLANK`].
    pub fn painted_count(&self) -> usize {
        self.data
            .par_chunks(self.width.max(1) as usize * 4)
            .map(|row| row.chunks_exact(4).filter(|p| *p != BLANK).count())
            .sum()
    }
}
