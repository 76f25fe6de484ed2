use crate::error::{CollageError, CollageResult};

/// An in-memory RGBA8 raster buffer (straight alpha, row-major).
///
/// Rasters are the unit of memory pressure in this crate: allocation is
/// fallible and reports [`CollageError::MemoryExhausted`] instead of
/// aborting, so the compose retry ladders can recover by downsampling.
/// Intermediates are scope-owned; dropping one is the "release".
#[derive(Clone, Debug, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Raster {
    /// Allocates a zeroed raster, failing softly when the allocator cannot
    /// satisfy the request.
    pub fn new(width: u32, height: u32) -> CollageResult<Self> {
        let len = byte_len(width, height)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|_| {
            CollageError::memory_exhausted(format!(
                "cannot allocate {width}x{height} raster ({len} bytes)"
            ))
        })?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wraps an existing RGBA8 buffer. The buffer length must be exactly
    /// `width * height * 4`.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> CollageResult<Self> {
        let len = byte_len(width, height)?;
        if data.len() != len {
            return Err(CollageError::validation(format!(
                "rgba8 buffer length {} does not match {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_rgba8(self) -> Vec<u8> {
        self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let off = ((y as usize * self.width as usize) + x as usize) * 4;
        [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]
    }

    /// Fills the whole raster with one color.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Draws `src` over this raster with its top-left corner at `(x, y)`,
    /// source-over per pixel. Pixels falling outside the destination are
    /// clipped.
    pub fn blit(&mut self, src: &Raster, x: u32, y: u32) {
        if x >= self.width || y >= self.height {
            return;
        }
        let copy_w = (src.width as usize).min((self.width - x) as usize);
        let copy_h = (src.height as usize).min((self.height - y) as usize);

        for row in 0..copy_h {
            let src_off = row * src.width as usize * 4;
            let dst_off = ((y as usize + row) * self.width as usize + x as usize) * 4;
            let src_row = &src.data[src_off..src_off + copy_w * 4];
            let dst_row = &mut self.data[dst_off..dst_off + copy_w * 4];
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                match s[3] {
                    255 => d.copy_from_slice(s),
                    0 => {}
                    _ => {
                        let out = over([d[0], d[1], d[2], d[3]], [s[0], s[1], s[2], s[3]]);
                        d.copy_from_slice(&out);
                    }
                }
            }
        }
    }
}

/// Source-over for straight-alpha RGBA8.
fn over(dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
    let sa = u16::from(src[3]);
    let inv = 255u16 - sa;

    let mut out = [0u8; 4];
    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), sa);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out[3] = (sa as u8).saturating_add(mul_div255(u16::from(dst[3]), inv));
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn byte_len(width: u32, height: u32) -> CollageResult<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| {
            CollageError::memory_exhausted(format!("raster {width}x{height} overflows usize"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Raster {
        let mut r = Raster::new(width, height).unwrap();
        r.fill(rgba);
        r
    }

    #[test]
    fn new_is_zeroed_with_exact_len() {
        let r = Raster::new(3, 2).unwrap();
        assert_eq!(r.data().len(), 3 * 2 * 4);
        assert!(r.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn from_rgba8_rejects_wrong_length() {
        assert!(Raster::from_rgba8(2, 2, vec![0; 15]).is_err());
    }

    #[test]
    fn fill_sets_every_pixel() {
        let r = solid(2, 2, [1, 2, 3, 255]);
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(r.pixel(x, y), [1, 2, 3, 255]);
            }
        }
    }

    #[test]
    fn blit_opaque_replaces_destination() {
        let mut dst = solid(4, 4, [0, 0, 0, 255]);
        let src = solid(2, 2, [200, 100, 50, 255]);
        dst.blit(&src, 1, 1);
        assert_eq!(dst.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(dst.pixel(1, 1), [200, 100, 50, 255]);
        assert_eq!(dst.pixel(2, 2), [200, 100, 50, 255]);
        assert_eq!(dst.pixel(3, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn blit_clips_to_destination_bounds() {
        let mut dst = solid(2, 2, [0, 0, 0, 255]);
        let src = solid(4, 4, [9, 9, 9, 255]);
        dst.blit(&src, 1, 1);
        assert_eq!(dst.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(dst.pixel(1, 1), [9, 9, 9, 255]);

        // fully outside is a no-op
        let before = dst.clone();
        dst.blit(&src, 5, 5);
        assert_eq!(dst, before);
    }

    #[test]
    fn blit_transparent_source_is_noop_and_half_alpha_blends() {
        let mut dst = solid(1, 1, [100, 100, 100, 255]);
        let clear = solid(1, 1, [255, 255, 255, 0]);
        dst.blit(&clear, 0, 0);
        assert_eq!(dst.pixel(0, 0), [100, 100, 100, 255]);

        let half = solid(1, 1, [255, 255, 255, 128]);
        dst.blit(&half, 0, 0);
        let px = dst.pixel(0, 0);
        assert!(px[0] > 100 && px[0] < 255);
        assert_eq!(px[3], 255);
    }
}
