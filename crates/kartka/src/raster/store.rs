//! Temporary on-disk staging for page rasters.

use super::RasterImage;
use crate::{KartkaError, Result};
use image::ImageFormat;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "kartka-page";
const FILE_EXTENSION: &str = "png";

/// Directory that holds staged page rasters while they are being recognized.
#[derive(Debug, Clone)]
pub struct RasterStore {
    dir: PathBuf,
}

impl RasterStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the raster to a uniquely named PNG and return a guard owning it.
    pub fn stage(&self, raster: RasterImage) -> Result<StagedRaster> {
        let page = raster.page_number();
        let path = self.dir.join(format!(
            "{FILE_PREFIX}{page}-{}.{FILE_EXTENSION}",
            uuid::Uuid::new_v4().simple()
        ));

        raster
            .image()
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| match e {
                image::ImageError::IoError(io) => KartkaError::Io(io),
                other => KartkaError::page_render_with_source(page, "failed to stage raster", other),
            })?;

        tracing::debug!(page, path = %path.display(), "Staged raster");
        Ok(StagedRaster { path, raster })
    }

    /// Paths of rasters currently staged in this store.
    pub fn staged_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if is_staged_raster(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Delete leftover staged rasters (e.g. from a crashed process). Returns how many were removed.
    pub fn purge(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.staged_files()? {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(KartkaError::Io(e)),
            }
        }
        if removed > 0 {
            tracing::info!(removed, dir = %self.dir.display(), "Purged stale rasters");
        }
        Ok(removed)
    }
}

fn is_staged_raster(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(FILE_PREFIX));
    let ext_matches = path.extension().and_then(|e| e.to_str()) == Some(FILE_EXTENSION);
    name_matches && ext_matches
}

/// A raster staged on disk. The file is removed when the guard is dropped,
/// whether recognition succeeded, failed or panicked.
#[derive(Debug)]
pub struct StagedRaster {
    path: PathBuf,
    raster: RasterImage,
}

impl StagedRaster {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn raster(&self) -> &RasterImage {
        &self.raster
    }

    pub fn page_number(&self) -> usize {
        self.raster.page_number()
    }
}

impl Drop for StagedRaster {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(page = self.raster.page_number(), "Removed staged raster"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged raster"),
        }
    }
}
