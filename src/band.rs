//! Horizontal strip splitter: divides a page's pixel rectangle into `n`
//! contiguous, non-overlapping bands so worker threads can rasterize a
//! single page in parallel without aliasing each other's byte ranges.

use crate::geometry::{PageGeometry, Rect};

/// A horizontal strip of a page, with the byte offset into the shared frame
/// buffer at which its pixels begin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalBand {
    /// Float clip rectangle passed to the Parser's section draw.
    pub rect: Rect,
    pub width: i32,
    pub height: i32,
    /// `3 * width * height`.
    pub bytes: usize,
    /// Byte offset into the page's frame buffer.
    pub offset: usize,
}

/// Split `geometry` into `n` contiguous horizontal bands covering the full
/// page height. The last band absorbs any remainder from integer division.
///
/// Panics if `n == 0`; callers (the coordinator) always derive `n` from a
/// validated, non-zero pool size.
pub fn split_bounds(geometry: &PageGeometry, n: usize) -> Vec<HorizontalBand> {
    assert!(n > 0, "split count must be positive");

    let width = geometry.width;
    let total_height = geometry.height.max(0) as usize;
    let base_height = total_height / n;
    let mut bands = Vec::with_capacity(n);
    let mut offset = 0usize;
    let mut prefix_height = 0usize;

    for idx in 0..n {
        let height = if idx == n - 1 {
            total_height - base_height * (n - 1)
        } else {
            base_height
        };
        let bytes = 3 * width.max(0) as usize * height;
        let rect = Rect::new(
            geometry.base.x0,
            geometry.base.y0 + prefix_height as f64,
            geometry.base.x1,
            geometry.base.y0 + (prefix_height + height) as f64,
        );
        bands.push(HorizontalBand {
            rect,
            width,
            height: height as i32,
            bytes,
            offset,
        });
        offset += bytes;
        prefix_height += height;
    }

    bands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect as GRect;

    fn geometry(w: i32, h: i32) -> PageGeometry {
        PageGeometry::from_bounds(GRect::new(0.0, 0.0, w as f64, h as f64))
    }

    #[test]
    fn single_band_covers_whole_page() {
        let g = geometry(100, 200);
        let bands = split_bounds(&g, 1);
        assert_eq!(bands.len(), 1);
        assert_eq!(bands[0].height, 200);
        assert_eq!(bands[0].bytes, g.byte_size);
        assert_eq!(bands[0].offset, 0);
    }

    #[test]
    fn bands_are_contiguous_and_tile_the_page() {
        let g = geometry(100, 203);
        let n = 4;
        let bands = split_bounds(&g, n);
        assert_eq!(bands.len(), n);

        let total_bytes: usize = bands.iter().map(|b| b.bytes).sum();
        assert_eq!(total_bytes, g.byte_size);

        let total_height: i32 = bands.iter().map(|b| b.height).sum();
        assert_eq!(total_height, g.height);

        assert_eq!(bands[0].offset, 0);
        for w in bands.windows(2) {
            assert_eq!(w[0].offset + w[0].bytes, w[1].offset);
        }
    }

    #[test]
    fn last_band_absorbs_remainder() {
        let g = geometry(10, 10); // 10 / 3 = 3, remainder 1
        let bands = split_bounds(&g, 3);
        assert_eq!(bands[0].height, 3);
        assert_eq!(bands[1].height, 3);
        assert_eq!(bands[2].height, 4);
    }

    #[test]
    fn all_bands_share_full_width() {
        let g = geometry(77, 50);
        for band in split_bounds(&g, 5) {
            assert_eq!(band.width, 77);
        }
    }
}
