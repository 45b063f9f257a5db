use tracing::warn;

use crate::config::PackerKind;
use crate::error::SheetPackerError;
use crate::group::SheetGroup;
use crate::model::{Rect, Repeat};

pub mod tree;

use tree::{SplitPolicy, TreePacker};

/// A packer places rectangles into a bounding box.
///
/// Implementations must ensure no overlaps and keep every placement inside `bounds()`.
/// `pack` returns `None` if the rectangle cannot be placed.
pub trait Packer<K> {
    fn bounds(&self) -> Rect;
    fn can_pack(&self, width: u32, height: u32) -> bool;
    fn pack(&mut self, key: K, width: u32, height: u32) -> Option<Rect>;
    /// Every placement made so far, in tree order.
    fn placements(&self) -> Vec<(K, Rect)>;
}

impl PackerKind {
    /// Packer registered for this identifier, rooted at `bounds`.
    pub fn build<K: Clone + 'static>(&self, bounds: Rect) -> Box<dyn Packer<K>> {
        match self {
            PackerKind::Tree => Box::new(TreePacker::new(bounds, SplitPolicy::LargerSlack)),
            PackerKind::Horizontal => Box::new(TreePacker::new(bounds, SplitPolicy::Vertical)),
        }
    }

    /// Packing area for `group`. One axis is pinned to the group's longest image side,
    /// the other extends to `size`.
    ///
    /// - repeat-x sheets stack full-width strips: `longest_width` x `size`
    /// - repeat-y sheets line up full-height strips: `size` x `longest_height`
    /// - otherwise the longer of the two maxima is pinned
    /// - the horizontal packer always lays out a single row: `size` x `longest_height`
    pub fn bounding_box(&self, group: &SheetGroup, size: u32) -> Rect {
        let (lw, lh) = (group.longest_width(), group.longest_height());
        let (w, h) = match (self, group.repeat()) {
            (PackerKind::Horizontal, _) => (size, lh),
            (PackerKind::Tree, Some(Repeat::X)) => (lw, size),
            (PackerKind::Tree, Some(Repeat::Y)) => (size, lh),
            (PackerKind::Tree, None) if lw > lh => (lw, size),
            (PackerKind::Tree, None) => (size, lh),
        };
        Rect::with_size(0, 0, w, h)
    }
}

/// Packs `group` in its current order and records each placement on its descriptor.
///
/// Images that do not fit are reported and dropped from the group; the rest stay placed.
pub fn pack_group(group: &mut SheetGroup, kind: PackerKind, size: u32) -> Vec<SheetPackerError> {
    let bounds = kind.bounding_box(group, size);
    let mut packer: Box<dyn Packer<usize>> = kind.build(bounds);
    let mut errors = Vec::new();
    for (idx, image) in group.images().iter().enumerate() {
        let (w, h) = (image.effective_width(), image.effective_height());
        if packer.pack(idx, w, h).is_none() {
            warn!(group = group.key(), key = image.key(), w, h, "image does not fit the bounding box");
            errors.push(SheetPackerError::OutOfSpace {
                group: group.key().to_string(),
                key: image.key().to_string(),
                width: w,
                height: h,
                bounds: (bounds.width(), bounds.height()),
            });
        }
    }
    for (idx, rect) in packer.placements() {
        group.set_placement(idx, Some(rect));
    }
    group.retain_placed();
    errors
}
