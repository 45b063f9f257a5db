//! Source image metadata.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use image::ImageReader;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SheetConfig;
use crate::error::{Result, SheetPackerError};
use crate::model::{Alignment, ImageType, Margin, Rect, Repeat};

/// Per-registration options.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImageParams {
    /// Sheet name; images sharing a name and type land on the same sheet.
    pub name: Option<String>,
    /// Forces the sheet type instead of the detected one.
    pub image_type: Option<ImageType>,
    /// `[top, right, bottom, left]`.
    pub margin: Option<[u32; 4]>,
    pub align: Option<Alignment>,
    pub repeat: Option<Repeat>,
}

/// Builds the group key: `name-type`, or just `type` when the name is empty.
pub fn group_key(name: Option<&str>, image_type: ImageType) -> String {
    match name {
        Some(n) if !n.is_empty() => format!("{}-{}", n, image_type.extension()),
        _ => image_type.extension().to_string(),
    }
}

/// One source image and its footprint on a sheet.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDescriptor {
    source_path: PathBuf,
    key: String,
    name: Option<String>,
    image_type: ImageType,
    group_key: String,
    original_width: u32,
    original_height: u32,
    margin: Margin,
    alignment: Option<Alignment>,
    repeat: Option<Repeat>,
    file_size: u64,
    #[serde(skip)]
    modified: Option<SystemTime>,
    placement: Option<Rect>,
}

impl ImageDescriptor {
    /// Validates `path` and reads its header.
    ///
    /// Checks, in order: the file exists and is non-empty, the header decodes to a size,
    /// the extension is accepted by `config`.
    pub fn open(path: &Path, params: &ImageParams, config: &SheetConfig) -> Result<Self> {
        let meta = fs::metadata(path).map_err(|_| SheetPackerError::MissingSource {
            path: path.to_path_buf(),
        })?;
        if !meta.is_file() || meta.len() == 0 {
            return Err(SheetPackerError::MissingSource {
                path: path.to_path_buf(),
            });
        }

        let unreadable = |reason: String| SheetPackerError::UnreadableHeader {
            path: path.to_path_buf(),
            reason,
        };
        let reader = ImageReader::open(path)
            .map_err(|e| unreadable(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| unreadable(e.to_string()))?;
        let format = reader.format();
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| unreadable(e.to_string()))?;
        debug!(?path, ?format, width, height, "read image header");

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if !config.accepts(&extension) {
            return Err(SheetPackerError::RejectedType {
                path: path.to_path_buf(),
                extension,
            });
        }
        let detected = format
            .and_then(ImageType::from_format)
            .or_else(|| extension.parse().ok())
            .ok_or_else(|| SheetPackerError::UnsupportedFormat {
                path: path.to_path_buf(),
            })?;

        let mut descriptor = Self::build(
            config.relative_key(path),
            width,
            height,
            detected,
            params,
        )?;
        descriptor.source_path =
            fs::canonicalize(path).map_err(|_| SheetPackerError::MissingSource {
                path: path.to_path_buf(),
            })?;
        descriptor.file_size = meta.len();
        descriptor.modified = meta.modified().ok();
        Ok(descriptor)
    }

    /// Builds a descriptor from dimensions alone (layout-only packing, tests).
    pub fn from_dimensions(
        key: impl Into<String>,
        width: u32,
        height: u32,
        image_type: ImageType,
        params: &ImageParams,
    ) -> Result<Self> {
        Self::build(key.into(), width, height, image_type, params)
    }

    fn build(
        key: String,
        width: u32,
        height: u32,
        detected: ImageType,
        params: &ImageParams,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SheetPackerError::InvalidInput(format!(
                "{}: image has no pixels ({}x{})",
                key, width, height
            )));
        }
        let margin = params.margin.map(Margin::from).unwrap_or_default();
        let padded = width
            .checked_add(margin.left)
            .and_then(|w| w.checked_add(margin.right))
            .zip(
                height
                    .checked_add(margin.top)
                    .and_then(|h| h.checked_add(margin.bottom)),
            );
        if padded.is_none() {
            return Err(SheetPackerError::InvalidInput(format!(
                "{}: margin {:?} overflows the cell size",
                key, margin
            )));
        }
        let image_type = params.image_type.unwrap_or(detected);
        let name = params.name.clone().filter(|n| !n.is_empty());
        Ok(Self {
            source_path: PathBuf::from(&key),
            group_key: group_key(name.as_deref(), image_type),
            key,
            name,
            image_type,
            original_width: width,
            original_height: height,
            margin,
            alignment: params.align,
            repeat: params.repeat,
            file_size: 0,
            modified: None,
            placement: None,
        })
    }

    /// Canonical path of the source file; the key itself for dimension-only descriptors.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
    pub fn image_type(&self) -> ImageType {
        self.image_type
    }
    pub fn group_key(&self) -> &str {
        &self.group_key
    }
    pub fn original_width(&self) -> u32 {
        self.original_width
    }
    pub fn original_height(&self) -> u32 {
        self.original_height
    }
    pub fn margin(&self) -> Margin {
        self.margin
    }
    pub fn alignment(&self) -> Option<Alignment> {
        self.alignment
    }
    pub fn repeat(&self) -> Option<Repeat> {
        self.repeat
    }
    pub fn file_size(&self) -> u64 {
        self.file_size
    }
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }
    pub fn placement(&self) -> Option<Rect> {
        self.placement
    }

    /// Width including margins.
    pub fn effective_width(&self) -> u32 {
        self.original_width.saturating_add(self.margin.horizontal())
    }

    /// Height including margins.
    pub fn effective_height(&self) -> u32 {
        self.original_height.saturating_add(self.margin.vertical())
    }

    pub fn area(&self) -> u64 {
        self.effective_width() as u64 * self.effective_height() as u64
    }

    pub fn is_tall(&self) -> bool {
        self.effective_height() > self.effective_width()
    }
    pub fn is_wide(&self) -> bool {
        self.effective_width() > self.effective_height()
    }
    pub fn is_square(&self) -> bool {
        self.effective_width() == self.effective_height()
    }

    pub fn longest_dimension(&self) -> u32 {
        self.effective_width().max(self.effective_height())
    }

    /// Short stable identifier of this source.
    pub fn id(&self) -> String {
        blake3::hash(self.key.as_bytes()).to_hex().as_str()[..12].to_string()
    }

    /// Top-left of the painted (non-margin) pixels, once placed.
    pub fn paint_origin(&self) -> Option<(u32, u32)> {
        self.placement
            .map(|p| (p.left() + self.margin.left, p.top() + self.margin.top))
    }

    pub(crate) fn set_placement(&mut self, placement: Option<Rect>) {
        self.placement = placement;
    }

    /// Grows the margin opposite `alignment` so the cell spans the group's longest side.
    pub(crate) fn snap_to(&mut self, longest_width: u32, longest_height: u32) {
        let Some(alignment) = self.alignment else {
            return;
        };
        let m = &mut self.margin;
        match alignment {
            Alignment::Left => {
                m.right = longest_width.saturating_sub(m.left.saturating_add(self.original_width));
            }
            Alignment::Right => {
                m.left = longest_width.saturating_sub(m.right.saturating_add(self.original_width));
            }
            Alignment::Top => {
                m.bottom =
                    longest_height.saturating_sub(m.top.saturating_add(self.original_height));
            }
            Alignment::Bottom => {
                m.top =
                    longest_height.saturating_sub(m.bottom.saturating_add(self.original_height));
            }
        }
    }
}
