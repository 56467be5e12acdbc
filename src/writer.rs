use std::path::{Path, PathBuf};

use crate::encoding::GpsTagSet;
use crate::error::{GeotagError, Result};
use crate::exif::embed_gps_tags;

/// Receives the encoded GPS tags for one image.
///
/// Implementations own the container format; the geotagging core never opens
/// image files for writing.
pub trait TagWriter {
    fn write_tags(&mut self, image: &Path, tags: &GpsTagSet) -> Result<()>;
}

impl<T: TagWriter + ?Sized> TagWriter for &mut T {
    fn write_tags(&mut self, image: &Path, tags: &GpsTagSet) -> Result<()> {
        (**self).write_tags(image, tags)
    }
}

/// Embeds the GPS IFD into each JPEG in place.
///
/// The rewritten file goes to a temporary sibling first and is renamed over
/// the original, so a failed write never leaves a truncated image.
#[derive(Debug, Default)]
pub struct ExifGpsWriter {
    tagged: usize,
}

impl ExifGpsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tagged(&self) -> usize {
        self.tagged
    }

    fn temp_path(image: &Path) -> PathBuf {
        let mut name = image.as_os_str().to_owned();
        name.push(".geotag.tmp");
        PathBuf::from(name)
    }
}

impl TagWriter for ExifGpsWriter {
    fn write_tags(&mut self, image: &Path, tags: &GpsTagSet) -> Result<()> {
        let jpeg = std::fs::read(image)?;
        let tagged = embed_gps_tags(&jpeg, tags).map_err(|reason| GeotagError::ExifLayout {
            path: image.to_path_buf(),
            reason,
        })?;

        let temp = Self::temp_path(image);
        if let Err(e) = std::fs::write(&temp, &tagged).and_then(|_| std::fs::rename(&temp, image)) {
            std::fs::remove_file(&temp).ok();
            return Err(e.into());
        }
        log::debug!("Embedded GPS IFD in {}", image.display());
        self.tagged += 1;
        Ok(())
    }
}

/// Writes `<image>.gps.json` next to each image, rationals kept exact.
#[derive(Debug, Default)]
pub struct JsonSidecarWriter {
    written: Vec<PathBuf>,
}

impl JsonSidecarWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sidecar_path(image: &Path) -> PathBuf {
        let mut name = image.as_os_str().to_owned();
        name.push(".gps.json");
        PathBuf::from(name)
    }

    /// Sidecars produced so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

impl TagWriter for JsonSidecarWriter {
    fn write_tags(&mut self, image: &Path, tags: &GpsTagSet) -> Result<()> {
        let path = Self::sidecar_path(image);
        std::fs::write(&path, serde_json::to_vec_pretty(tags)?)?;
        log::debug!("Wrote {}", path.display());
        self.written.push(path);
        Ok(())
    }
}

/// Logs what would be written and touches nothing.
#[derive(Debug, Default)]
pub struct DryRunWriter;

impl TagWriter for DryRunWriter {
    fn write_tags(&mut self, image: &Path, tags: &GpsTagSet) -> Result<()> {
        log::info!(
            "[dry-run] {}: {} {} / {} {} alt {} dir {} roll {:?} pitch {:?}",
            image.display(),
            tags.latitude_ref,
            tags.latitude_degrees(),
            tags.longitude_ref,
            tags.longitude_degrees(),
            tags.altitude,
            tags.img_direction,
            tags.roll,
            tags.pitch
        );
        Ok(())
    }
}
