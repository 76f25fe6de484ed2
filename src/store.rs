use std::path::PathBuf;

use anyhow::Context;

use crate::{error::CollageResult, raster::Raster};

/// The "save image, return a reference" collaborator the finished canvas is
/// handed to. The composer treats this as one opaque call.
pub trait CollageStore {
    fn insert(&self, raster: &Raster) -> CollageResult<PathBuf>;
}

/// Stores collages as timestamped PNG files under one directory.
pub struct DirectoryStore {
    dir: PathBuf,
    file_stem: String,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_stem: "collage".to_string(),
        }
    }

    pub fn with_file_stem(mut self, stem: impl Into<String>) -> Self {
        self.file_stem = stem.into();
        self
    }
}

impl CollageStore for DirectoryStore {
    fn insert(&self, raster: &Raster) -> CollageResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("create store directory '{}'", self.dir.display()))?;

        let stamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let path = self.dir.join(format!("{}-{stamp}.png", self.file_stem));

        image::save_buffer_with_format(
            &path,
            raster.data(),
            raster.width(),
            raster.height(),
            image::ColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .with_context(|| format!("encode collage to '{}'", path.display()))?;
        Ok(path)
    }
}
