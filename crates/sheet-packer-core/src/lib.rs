//! Core library for packing many small images into sprite sheets.
//!
//! - Packing: binary split tree, first fit, left-first; a single-row horizontal variant
//! - Pipeline: `PackingEngine` registers sources, then sorts, packs, composites and caches each sheet
//! - Outputs: one `<hash>.<ext>` sheet per (name, type) group plus serde-serializable placement records
//!
//! Quick example:
//! ```ignore
//! use sheet_packer_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let cfg = SheetConfig::builder()
//!     .root_dir("public")
//!     .image_output_dir("sprites")
//!     .cache_time_minutes(60)
//!     .build();
//! let mut engine = PackingEngine::new(cfg)?;
//! engine.add_directory("public/icons", &ImageParams { name: Some("icons".into()), ..Default::default() })?;
//! let out = engine.process();
//! for p in out.placements() {
//!     println!("{} -> {} @ {},{}", p.key, p.sheet, p.x, p.y);
//! }
//! # Ok(()) }
//! ```

pub mod cache;
pub mod compositing;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod export;
pub mod group;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod sort;

pub use cache::*;
pub use compositing::*;
pub use config::*;
pub use descriptor::*;
pub use error::*;
pub use export::*;
pub use group::*;
pub use model::*;
pub use packer::*;
pub use pipeline::*;
pub use sort::SortStrategy;

/// Convenience prelude for common types and functions.
/// Importing `sheet_packer_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::cache::{StalenessCache, SweepReport};
    pub use crate::compositing::{Compositor, SheetOutcome};
    pub use crate::config::{PackerKind, SheetConfig, SheetConfigBuilder, SortOrder};
    pub use crate::descriptor::{ImageDescriptor, ImageParams};
    pub use crate::error::{Result, SheetPackerError};
    pub use crate::group::SheetGroup;
    pub use crate::model::{
        Alignment, ImageType, Margin, PlacementRecord, Rect, Repeat, SheetRecord, SheetStats,
    };
    pub use crate::packer::{Packer, tree::TreePacker};
    pub use crate::pipeline::{Layout, PackingEngine, ProcessOutput, RegisterReport};
    pub use crate::sort::SortStrategy;
}
