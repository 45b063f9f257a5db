use std::path::Path;

use serde::Serialize;

use crate::descriptor::{ImageDescriptor, group_key};
use crate::error::{Result, SheetPackerError};
use crate::model::{ImageType, PlacementRecord, Rect, Repeat};

/// Every image sharing a `(name, type)` key; packed into one sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetGroup {
    key: String,
    name: Option<String>,
    image_type: ImageType,
    images: Vec<ImageDescriptor>,
    longest_width: u32,
    longest_height: u32,
    largest_area: u64,
    total_area: u64,
    repeat: Option<Repeat>,
}

impl SheetGroup {
    pub fn new(name: Option<&str>, image_type: ImageType) -> Self {
        let name = name.filter(|n| !n.is_empty()).map(String::from);
        Self {
            key: group_key(name.as_deref(), image_type),
            name,
            image_type,
            images: Vec::new(),
            longest_width: 0,
            longest_height: 0,
            largest_area: 0,
            total_area: 0,
            repeat: None,
        }
    }

    /// Starts a group keyed like `descriptor`.
    pub fn for_descriptor(descriptor: &ImageDescriptor) -> Self {
        Self::new(descriptor.name(), descriptor.image_type())
    }

    /// Appends `descriptor` and folds it into the running maxima.
    ///
    /// A group repeats along at most one axis; a descriptor asking for the other axis is
    /// rejected and the group is left untouched.
    pub fn add_image(&mut self, descriptor: ImageDescriptor) -> Result<()> {
        if descriptor.group_key() != self.key {
            return Err(SheetPackerError::InvalidInput(format!(
                "{} belongs to sheet `{}`, not `{}`",
                descriptor.key(),
                descriptor.group_key(),
                self.key
            )));
        }
        if let (Some(existing), Some(requested)) = (self.repeat, descriptor.repeat()) {
            if existing != requested {
                return Err(SheetPackerError::ConflictingRepeat {
                    group: self.key.clone(),
                    existing: existing.to_string(),
                    requested: requested.to_string(),
                });
            }
        }
        self.longest_width = self.longest_width.max(descriptor.effective_width());
        self.longest_height = self.longest_height.max(descriptor.effective_height());
        self.largest_area = self.largest_area.max(descriptor.area());
        self.total_area = self.total_area.saturating_add(descriptor.area());
        if let Some(r) = descriptor.repeat() {
            self.repeat = Some(r);
        }
        self.images.push(descriptor);
        Ok(())
    }

    /// Snaps aligned images to the longest side so they share one cell size on that axis.
    /// Must run once, after every image is added and before sorting.
    pub fn prepare(&mut self) {
        let (w, h) = (self.longest_width, self.longest_height);
        for image in &mut self.images {
            image.snap_to(w, h);
        }
    }

    /// Reorders the images; `order` is a permutation of indices.
    pub fn apply_order(&mut self, order: &[usize]) {
        debug_assert_eq!(order.len(), self.images.len());
        let mut slots: Vec<Option<ImageDescriptor>> = self.images.drain(..).map(Some).collect();
        self.images = order.iter().filter_map(|&i| slots[i].take()).collect();
    }

    /// Drops images the packer could not place.
    pub fn retain_placed(&mut self) -> Vec<ImageDescriptor> {
        let (placed, unplaced): (Vec<_>, Vec<_>) = self
            .images
            .drain(..)
            .partition(|d| d.placement().is_some());
        self.images = placed;
        unplaced
    }

    pub(crate) fn set_placement(&mut self, index: usize, rect: Option<Rect>) {
        if let Some(image) = self.images.get_mut(index) {
            image.set_placement(rect);
        }
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
    pub fn images(&self) -> &[ImageDescriptor] {
        &self.images
    }
    pub fn len(&self) -> usize {
        self.images.len()
    }
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
    pub fn longest_width(&self) -> u32 {
        self.longest_width
    }
    pub fn longest_height(&self) -> u32 {
        self.longest_height
    }
    pub fn longest_dimension(&self) -> u32 {
        self.longest_width.max(self.longest_height)
    }
    pub fn largest_area(&self) -> u64 {
        self.largest_area
    }
    pub fn total_area(&self) -> u64 {
        self.total_area
    }
    pub fn repeat(&self) -> Option<Repeat> {
        self.repeat
    }

    /// Size of the smallest raster enclosing every placed cell.
    pub fn sheet_size(&self) -> (u32, u32) {
        self.images
            .iter()
            .filter_map(|d| d.placement())
            .fold((0, 0), |(w, h), p| (w.max(p.right()), h.max(p.bottom())))
    }

    /// Identity hash of the sheet: configuration, key, and every image in packing order
    /// (source size and modification time included, so edited sources change the hash).
    pub fn hash(&self, config_fingerprint: &str) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(config_fingerprint.as_bytes());
        hasher.update(self.key.as_bytes());
        hasher.update(self.image_type.extension().as_bytes());
        for d in &self.images {
            hasher.update(d.key().as_bytes());
            hasher.update(&d.file_size().to_le_bytes());
            let mtime = d
                .modified()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|t| t.as_nanos())
                .unwrap_or(0);
            hasher.update(&mtime.to_le_bytes());
            let m = d.margin();
            for v in [
                d.original_width(),
                d.original_height(),
                m.top,
                m.right,
                m.bottom,
                m.left,
            ] {
                hasher.update(&v.to_le_bytes());
            }
            if let Some(p) = d.placement() {
                hasher.update(&p.left().to_le_bytes());
                hasher.update(&p.top().to_le_bytes());
            }
        }
        hasher.finalize().to_hex().as_str()[..32].to_string()
    }

    /// One record per placed image, pointing at `sheet` (path relative to the root).
    pub fn placement_records(&self, sheet: &str) -> Vec<PlacementRecord> {
        self.images
            .iter()
            .filter_map(|d| {
                let p = d.placement()?;
                Some(PlacementRecord {
                    key: d.key().to_string(),
                    id: d.id(),
                    group_key: self.key.clone(),
                    sheet: sheet.to_string(),
                    x: p.left(),
                    y: p.top(),
                    width: p.width(),
                    height: p.height(),
                    margin: d.margin(),
                })
            })
            .collect()
    }

    /// `<hash>.<ext>`
    pub fn filename(&self, config_fingerprint: &str) -> String {
        format!(
            "{}.{}",
            self.hash(config_fingerprint),
            self.image_type.extension()
        )
    }

    /// Sheet path relative to the root, with forward slashes.
    pub fn relative_path(&self, config_fingerprint: &str, output_dir: &Path) -> String {
        let filename = self.filename(config_fingerprint);
        let dir = output_dir.to_string_lossy().replace('\\', "/");
        let dir = dir.trim_end_matches('/');
        if dir.is_empty() || dir == "." {
            filename
        } else {
            format!("{}/{}", dir, filename)
        }
    }
}
