use std::path::Path;

use crate::{
    error::{CollageError, CollageResult},
    raster::Raster,
};

/// The decode/transform boundary the composition pipeline runs against.
///
/// Everything here either allocates or touches a raster, so every method can
/// fail with [`CollageError::MemoryExhausted`]; the compose retry ladders
/// recover from that by downsampling. Tests swap this for a fake to script
/// sources and memory pressure.
pub trait RasterCodec {
    /// Intrinsic pixel dimensions of the image file, without a full decode.
    fn probe_dimensions(&self, path: &Path) -> CollageResult<(u32, u32)>;

    /// Decodes the file with the downsample factor applied natively, so the
    /// returned raster is already `factor` times smaller per dimension
    /// (minimum 1x1). An unreadable or structurally invalid file is
    /// [`CollageError::RegionDecode`].
    fn decode(&self, path: &Path, sample_factor: u32) -> CollageResult<Raster>;

    /// Resamples `src` to exactly `width` x `height`.
    fn scale(&self, src: &Raster, width: u32, height: u32) -> CollageResult<Raster>;

    /// Copies the `width` x `height` window at `(x, y)` out of `src`. The
    /// window must lie within `src`.
    fn crop(&self, src: &Raster, x: u32, y: u32, width: u32, height: u32) -> CollageResult<Raster>;

    /// Allocates the square output canvas.
    fn alloc_canvas(&self, side: u32) -> CollageResult<Raster>;
}

/// Production codec backed by the `image` crate.
///
/// An optional memory budget caps the size of any single raster this codec
/// produces; an allocation over the cap fails with `MemoryExhausted` exactly
/// like a real allocator refusal, which makes the downsample ladders
/// deterministic to exercise.
#[derive(Clone, Debug, Default)]
pub struct ImageCodec {
    max_alloc_bytes: Option<usize>,
}

impl ImageCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_memory_budget(max_alloc_bytes: usize) -> Self {
        Self {
            max_alloc_bytes: Some(max_alloc_bytes),
        }
    }

    fn charge(&self, width: u32, height: u32, what: &str) -> CollageResult<()> {
        let bytes = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if let Some(max) = self.max_alloc_bytes {
            if bytes > max {
                return Err(CollageError::memory_exhausted(format!(
                    "{what} raster {width}x{height} ({bytes} bytes) exceeds the {max}-byte budget"
                )));
            }
        }
        Ok(())
    }
}

impl RasterCodec for ImageCodec {
    fn probe_dimensions(&self, path: &Path) -> CollageResult<(u32, u32)> {
        image::ImageReader::open(path)
            .map_err(|e| {
                CollageError::region_decode(format!("open '{}': {e}", path.display()))
            })?
            .with_guessed_format()
            .map_err(|e| {
                CollageError::region_decode(format!("probe '{}': {e}", path.display()))
            })?
            .into_dimensions()
            .map_err(|e| {
                CollageError::region_decode(format!("probe '{}': {e}", path.display()))
            })
    }

    fn decode(&self, path: &Path, sample_factor: u32) -> CollageResult<Raster> {
        let img = image::ImageReader::open(path)
            .map_err(|e| {
                CollageError::region_decode(format!("open '{}': {e}", path.display()))
            })?
            .with_guessed_format()
            .map_err(|e| {
                CollageError::region_decode(format!("decode '{}': {e}", path.display()))
            })?
            .decode()
            .map_err(|e| {
                CollageError::region_decode(format!("decode '{}': {e}", path.display()))
            })?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        let factor = sample_factor.max(1);
        if factor == 1 {
            self.charge(width, height, "decoded")?;
            return Raster::from_rgba8(width, height, rgba.into_raw());
        }

        // Stride subsample, standing in for a decoder that applies the
        // factor natively.
        let out_w = (width / factor).max(1);
        let out_h = (height / factor).max(1);
        self.charge(out_w, out_h, "decoded")?;
        let mut out = Raster::new(out_w, out_h)?;
        let src = rgba.as_raw();
        for row in 0..out_h as usize {
            let src_y = (row * factor as usize).min(height as usize - 1);
            for col in 0..out_w as usize {
                let src_x = (col * factor as usize).min(width as usize - 1);
                let src_off = (src_y * width as usize + src_x) * 4;
                let dst_off = (row * out_w as usize + col) * 4;
                out.data_mut()[dst_off..dst_off + 4].copy_from_slice(&src[src_off..src_off + 4]);
            }
        }
        Ok(out)
    }

    fn scale(&self, src: &Raster, width: u32, height: u32) -> CollageResult<Raster> {
        if width == 0 || height == 0 {
            return Err(CollageError::validation("scale target must be non-empty"));
        }
        if src.width() == width && src.height() == height {
            return Ok(src.clone());
        }
        self.charge(width, height, "scaled")?;
        let buf = image::RgbaImage::from_raw(src.width(), src.height(), src.data().to_vec())
            .ok_or_else(|| {
                CollageError::validation("raster buffer does not match its dimensions")
            })?;
        let resized =
            image::imageops::resize(&buf, width, height, image::imageops::FilterType::Triangle);
        Raster::from_rgba8(width, height, resized.into_raw())
    }

    fn crop(&self, src: &Raster, x: u32, y: u32, width: u32, height: u32) -> CollageResult<Raster> {
        if width == 0 || height == 0 {
            return Err(CollageError::validation("crop window must be non-empty"));
        }
        let in_bounds = x
            .checked_add(width)
            .is_some_and(|right| right <= src.width())
            && y.checked_add(height)
                .is_some_and(|bottom| bottom <= src.height());
        if !in_bounds {
            return Err(CollageError::validation(format!(
                "crop window {width}x{height}+{x}+{y} exceeds source {}x{}",
                src.width(),
                src.height()
            )));
        }
        self.charge(width, height, "cropped")?;
        let mut out = Raster::new(width, height)?;
        let row_bytes = width as usize * 4;
        for row in 0..height as usize {
            let src_off = ((y as usize + row) * src.width() as usize + x as usize) * 4;
            let dst_off = row * row_bytes;
            out.data_mut()[dst_off..dst_off + row_bytes]
                .copy_from_slice(&src.data()[src_off..src_off + row_bytes]);
        }
        Ok(out)
    }

    fn alloc_canvas(&self, side: u32) -> CollageResult<Raster> {
        self.charge(side, side, "canvas")?;
        Raster::new(side, side)
    }
}
