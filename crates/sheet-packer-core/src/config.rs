use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Order in which a group's images are fed to the packer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Largest packing area first.
    AreaDesc,
    /// Longest of width/height first.
    MaxSideDesc,
    NameAsc,
    /// Insertion order.
    None,
}

impl FromStr for SortOrder {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "area_desc" | "area" => Ok(Self::AreaDesc),
            "max_side_desc" | "longest_dimension" | "longest" => Ok(Self::MaxSideDesc),
            "name_asc" | "name" => Ok(Self::NameAsc),
            "none" => Ok(Self::None),
            _ => Err(()),
        }
    }
}

/// Packer variants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PackerKind {
    /// Binary split tree; splits along whichever axis leaves more slack.
    Tree,
    /// Same tree, but only ever splits into left/right strips (a single row).
    Horizontal,
}

impl FromStr for PackerKind {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tree" | "default" => Ok(Self::Tree),
            "horizontal" | "row" => Ok(Self::Horizontal),
            _ => Err(()),
        }
    }
}

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ImageProperties {
    /// JPEG quality, 1..=100.
    pub jpg_quality: u8,
}

impl Default for ImageProperties {
    fn default() -> Self {
        Self { jpg_quality: 75 }
    }
}

/// Sheet generation configuration.
/// Key notes:
///   - `sorter` and `packer` are resolved once here; unknown names fail at load time
///   - `cache_time_minutes == 0` rebuilds every sheet on every run
///   - `fingerprint()` feeds every sheet hash, so changing any option invalidates outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    /// Base directory; source keys and every output path are relative to it.
    pub root_dir: PathBuf,
    /// Where sheet images are written (relative to `root_dir`).
    pub image_output_dir: PathBuf,
    /// Generated template/CSS directory, swept together with the sheets when set.
    pub template_output_dir: Option<PathBuf>,
    /// Lower-case file extensions allowed as sources.
    pub accepted_types: BTreeSet<String>,
    /// Sheet lifetime in minutes. 0 disables the cache.
    pub cache_time_minutes: u64,
    /// Extent of the unbounded axis of the packing area.
    pub bounding_box_size: u32,
    pub sorter: SortOrder,
    pub packer: PackerKind,
    pub image_properties: ImageProperties,
    /// Process groups on the rayon pool when the crate is built with feature "parallel".
    pub parallel: bool,
    /// Optional overall deadline (milliseconds). Groups not started in time are skipped.
    pub deadline_ms: Option<u64>,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            image_output_dir: PathBuf::from("sprites"),
            template_output_dir: None,
            accepted_types: default_accepted_types(),
            cache_time_minutes: 0,
            bounding_box_size: 10_000,
            sorter: SortOrder::AreaDesc,
            packer: PackerKind::Tree,
            image_properties: ImageProperties::default(),
            parallel: false,
            deadline_ms: None,
        }
    }
}

fn default_accepted_types() -> BTreeSet<String> {
    ["png", "jpg", "jpeg", "gif"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl SheetConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - The bounding box has no extent
    /// - JPEG quality is outside 1..=100
    /// - No source type is accepted
    /// - The sheet directory escapes `root_dir`
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::SheetPackerError;

        if self.bounding_box_size == 0 {
            return Err(SheetPackerError::InvalidConfig(
                "bounding_box_size must be greater than 0".into(),
            ));
        }
        let q = self.image_properties.jpg_quality;
        if !(1..=100).contains(&q) {
            return Err(SheetPackerError::InvalidConfig(format!(
                "image_properties.jpg_quality ({}) must be within 1..=100",
                q
            )));
        }
        if self.accepted_types.is_empty() {
            return Err(SheetPackerError::InvalidConfig(
                "accepted_types must list at least one extension".into(),
            ));
        }
        if self.image_output_dir.is_absolute() {
            return Err(SheetPackerError::InvalidConfig(format!(
                "image_output_dir ({}) must be relative to root_dir",
                self.image_output_dir.display()
            )));
        }
        let swept = std::iter::once(("image_output_dir", &self.image_output_dir))
            .chain(self.template_output_dir.iter().map(|t| ("template_output_dir", t)));
        for (field, dir) in swept {
            if !is_below_root(dir) || dir == &self.root_dir {
                return Err(SheetPackerError::InvalidConfig(format!(
                    "{} ({}) must name a directory inside root_dir, not the root itself",
                    field,
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// `None` when caching is disabled.
    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.cache_time_minutes {
            0 => None,
            m => Some(Duration::from_secs(m.saturating_mul(60))),
        }
    }

    pub fn accepts(&self, extension: &str) -> bool {
        self.accepted_types
            .contains(extension.to_ascii_lowercase().as_str())
    }

    /// Absolute sheet directory.
    pub fn image_output_path(&self) -> PathBuf {
        self.root_dir.join(&self.image_output_dir)
    }

    /// Every directory the cache sweep may reclaim files from.
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.image_output_path()];
        if let Some(t) = &self.template_output_dir {
            let t = self.root_dir.join(t);
            if !dirs.contains(&t) {
                dirs.push(t);
            }
        }
        dirs
    }

    /// Path of `path` relative to `root_dir`, with forward slashes. Paths outside the
    /// root are kept whole.
    pub fn relative_key(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root_dir).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// Stable hash of every option. Run-only switches (`parallel`, `deadline_ms`) are excluded
    /// because they never change the pixels of a sheet.
    pub fn fingerprint(&self) -> String {
        let mut relevant = self.clone();
        relevant.parallel = false;
        relevant.deadline_ms = None;
        let bytes = serde_json::to_vec(&relevant).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }
}

/// Builder for `SheetConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct SheetConfigBuilder {
    cfg: SheetConfig,
}

impl SheetConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: SheetConfig::default(),
        }
    }
    pub fn root_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.root_dir = v.into();
        self
    }
    pub fn image_output_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.cfg.image_output_dir = v.into();
        self
    }
    pub fn template_output_dir(mut self, v: Option<PathBuf>) -> Self {
        self.cfg.template_output_dir = v;
        self
    }
    pub fn accepted_types<I, S>(mut self, v: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cfg.accepted_types = v
            .into_iter()
            .map(|s| s.as_ref().to_ascii_lowercase())
            .collect();
        self
    }
    pub fn cache_time_minutes(mut self, v: u64) -> Self {
        self.cfg.cache_time_minutes = v;
        self
    }
    pub fn bounding_box_size(mut self, v: u32) -> Self {
        self.cfg.bounding_box_size = v;
        self
    }
    pub fn sorter(mut self, v: SortOrder) -> Self {
        self.cfg.sorter = v;
        self
    }
    pub fn packer(mut self, v: PackerKind) -> Self {
        self.cfg.packer = v;
        self
    }
    pub fn jpg_quality(mut self, v: u8) -> Self {
        self.cfg.image_properties.jpg_quality = v;
        self
    }
    pub fn parallel(mut self, v: bool) -> Self {
        self.cfg.parallel = v;
        self
    }
    pub fn deadline_ms(mut self, v: Option<u64>) -> Self {
        self.cfg.deadline_ms = v;
        self
    }
    pub fn build(self) -> SheetConfig {
        self.cfg
    }
}

impl SheetConfig {
    /// Create a fluent builder for `SheetConfig`.
    pub fn builder() -> SheetConfigBuilder {
        SheetConfigBuilder::new()
    }
}

/// True when a relative `dir` ends strictly below the directory it is joined onto.
/// Absolute paths replace the root on join and are accepted here.
fn is_below_root(dir: &Path) -> bool {
    if dir.is_absolute() {
        return true;
    }
    let mut depth: i64 = 0;
    for c in dir.components() {
        match c {
            Component::Normal(_) => depth += 1,
            Component::ParentDir => depth -= 1,
            _ => {}
        }
    }
    depth > 0
}
