use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Frame, ImageFormat, Rgba, RgbaImage};
use serde::Serialize;
use tracing::{debug, info};

use crate::cache::StalenessCache;
use crate::config::SheetConfig;
use crate::error::{Result, SheetPackerError};
use crate::group::SheetGroup;
use crate::model::{ImageType, PlacementRecord, Rect, SheetRecord, SheetStats};

/// Background of formats without an alpha channel.
pub const OPAQUE_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Copy `src` into `canvas` with its top-left at (dx, dy), clipped to the canvas.
///
/// - blend: composite over the existing pixel (for opaque sheets) instead of replacing it
pub fn blit_rgba(src: &RgbaImage, canvas: &mut RgbaImage, dx: u32, dy: u32, blend: bool) {
    let (cw, ch) = canvas.dimensions();
    for (x, y, px) in src.enumerate_pixels() {
        let (tx, ty) = (dx + x, dy + y);
        if tx >= cw || ty >= ch {
            continue;
        }
        let out = if blend {
            over(*px, *canvas.get_pixel(tx, ty))
        } else {
            *px
        };
        canvas.put_pixel(tx, ty, out);
    }
}

/// Source-over onto an opaque destination.
fn over(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let a = src[3] as u32;
    let mix = |s: u8, d: u8| ((s as u32 * a + d as u32 * (255 - a) + 127) / 255) as u8;
    Rgba([
        mix(src[0], dst[0]),
        mix(src[1], dst[1]),
        mix(src[2], dst[2]),
        255,
    ])
}

/// Result of compositing one group.
#[derive(Debug, Clone, Serialize)]
pub struct SheetOutcome {
    pub record: SheetRecord,
    /// Absolute sheet path.
    pub path: PathBuf,
    /// False when the cached file was still fresh.
    pub written: bool,
    pub stats: SheetStats,
    pub placements: Vec<PlacementRecord>,
}

/// Paints packed groups and writes them under the configured output directory.
pub struct Compositor<'a> {
    config: &'a SheetConfig,
    cache: &'a StalenessCache,
    fingerprint: String,
}

impl<'a> Compositor<'a> {
    pub fn new(config: &'a SheetConfig, cache: &'a StalenessCache) -> Self {
        Self {
            config,
            cache,
            fingerprint: config.fingerprint(),
        }
    }

    /// Sheet path relative to the root (forward slashes) and absolute.
    pub fn sheet_paths(&self, group: &SheetGroup) -> (String, PathBuf) {
        let relative = group.relative_path(&self.fingerprint, &self.config.image_output_dir);
        let path = self
            .config
            .image_output_path()
            .join(group.filename(&self.fingerprint));
        (relative, path)
    }

    /// Paints, encodes and writes `group` unless its sheet is still fresh.
    ///
    /// Records and stats are returned either way. Any I/O or codec failure aborts this
    /// group only.
    pub fn composite(&self, group: &SheetGroup) -> Result<SheetOutcome> {
        if group.is_empty() {
            return Err(SheetPackerError::InvalidInput(format!(
                "sheet `{}` has no placed images",
                group.key()
            )));
        }
        let (relative, path) = self.sheet_paths(group);
        let (width, height) = group.sheet_size();
        let cells: Vec<Rect> = group.images().iter().filter_map(|d| d.placement()).collect();
        let mut outcome = SheetOutcome {
            record: SheetRecord {
                group_key: group.key().to_string(),
                relative_path: relative.clone(),
                width,
                height,
                format: group.image_type(),
            },
            path,
            written: false,
            stats: SheetStats::from_cells((width, height), &cells),
            placements: group.placement_records(&relative),
        };

        if !self.cache.needs_creation(&outcome.path) {
            debug!(group = group.key(), path = ?outcome.path, "sheet is fresh, skipping");
            return Ok(outcome);
        }

        let canvas = self.paint(group)?;
        let bytes = self.encode(group, &canvas)?;
        let dir = self.config.image_output_path();
        fs::create_dir_all(&dir).map_err(|source| SheetPackerError::OutputDir {
            path: dir.clone(),
            source,
        })?;
        fs::write(&outcome.path, bytes).map_err(|source| SheetPackerError::SheetWrite {
            group: group.key().to_string(),
            path: outcome.path.clone(),
            source,
        })?;
        info!(
            group = group.key(),
            path = %relative,
            width,
            height,
            images = group.len(),
            "wrote sheet"
        );
        outcome.written = true;
        Ok(outcome)
    }

    /// Allocates the sheet raster and copies every placed source into it. Margins stay
    /// background.
    pub fn paint(&self, group: &SheetGroup) -> Result<RgbaImage> {
        let (width, height) = group.sheet_size();
        let opaque = group.image_type().is_opaque();
        let background = if opaque {
            OPAQUE_BACKGROUND
        } else {
            Rgba([0, 0, 0, 0])
        };
        let mut canvas = RgbaImage::from_pixel(width, height, background);
        for desc in group.images() {
            let Some((dx, dy)) = desc.paint_origin() else {
                continue;
            };
            let src = image::open(desc.source_path())
                .map_err(|source| SheetPackerError::Decode {
                    path: desc.source_path().to_path_buf(),
                    source,
                })?
                .to_rgba8();
            blit_rgba(&src, &mut canvas, dx, dy, opaque);
        }
        Ok(canvas)
    }

    /// Encodes `canvas` in the group's format.
    pub fn encode(&self, group: &SheetGroup, canvas: &RgbaImage) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        let encode_err = |source| SheetPackerError::Encode {
            group: group.key().to_string(),
            source,
        };
        match group.image_type() {
            ImageType::Jpg => {
                let rgb = DynamicImage::ImageRgba8(canvas.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut buf, self.config.image_properties.jpg_quality)
                    .encode_image(&rgb)
                    .map_err(encode_err)?;
            }
            ImageType::Gif => {
                let mut encoder = GifEncoder::new(&mut buf);
                encoder
                    .encode_frame(Frame::new(canvas.clone()))
                    .map_err(encode_err)?;
            }
            ImageType::Png => canvas
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(encode_err)?,
        }
        Ok(buf.into_inner())
    }
}
