use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Axis-aligned rectangle (pixels) stored as edges. `right`/`bottom` are exclusive,
/// so `width = right - left` and `height = bottom - top`.
///
/// Edges are only set through constructors; a rectangle is never partially updated.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
}

impl Rect {
    /// Builds a rectangle from its edges. Inverted edges collapse to an empty rectangle.
    pub fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right: right.max(left),
            bottom: bottom.max(top),
        }
    }

    /// Builds a rectangle from its top-left corner and size.
    pub fn with_size(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self::new(
            left,
            top,
            left.saturating_add(width),
            top.saturating_add(height),
        )
    }

    pub fn left(&self) -> u32 {
        self.left
    }
    pub fn top(&self) -> u32 {
        self.top
    }
    pub fn right(&self) -> u32 {
        self.right
    }
    pub fn bottom(&self) -> u32 {
        self.bottom
    }
    pub fn width(&self) -> u32 {
        self.right - self.left
    }
    pub fn height(&self) -> u32 {
        self.bottom - self.top
    }
    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    /// True if a `width`x`height` item fits inside this rectangle.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        width <= self.width() && height <= self.height()
    }

    /// True if a `width`x`height` item consumes this rectangle exactly.
    pub fn fits_exactly(&self, width: u32, height: u32) -> bool {
        width == self.width() && height == self.height()
    }

    /// Returns true if `r` is fully inside `self`.
    pub fn contains(&self, r: &Rect) -> bool {
        r.left >= self.left && r.top >= self.top && r.right <= self.right && r.bottom <= self.bottom
    }

    /// True if both rectangles share at least one pixel.
    pub fn intersects(&self, r: &Rect) -> bool {
        self.left < r.right && r.left < self.right && self.top < r.bottom && r.top < self.bottom
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "l:{} t:{} r:{} b:{}",
            self.left, self.top, self.right, self.bottom
        )
    }
}

/// Transparent padding around an image inside its packing cell. Never painted.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Margin {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

impl Margin {
    pub fn new(top: u32, right: u32, bottom: u32, left: u32) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    pub fn horizontal(&self) -> u32 {
        self.left.saturating_add(self.right)
    }

    pub fn vertical(&self) -> u32 {
        self.top.saturating_add(self.bottom)
    }
}

/// CSS order: `[top, right, bottom, left]`.
impl From<[u32; 4]> for Margin {
    fn from(m: [u32; 4]) -> Self {
        Self::new(m[0], m[1], m[2], m[3])
    }
}

/// Edge an image snaps to when its group is prepared.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Right,
    Top,
    Bottom,
}

impl FromStr for Alignment {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            _ => Err(()),
        }
    }
}

/// Background repeat axis requested for a sheet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    X,
    Y,
}

impl FromStr for Repeat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" | "repeat-x" => Ok(Self::X),
            "y" | "repeat-y" => Ok(Self::Y),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Repeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("x"),
            Self::Y => f.write_str("y"),
        }
    }
}

/// Raster formats a sheet can be written in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    Png,
    #[serde(alias = "jpeg")]
    Jpg,
    Gif,
}

impl ImageType {
    /// File extension used for sheets of this type.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpg => "jpg",
            Self::Gif => "gif",
        }
    }

    /// JPEG has no alpha channel; sheets are painted on an opaque canvas.
    pub fn is_opaque(&self) -> bool {
        matches!(self, Self::Jpg)
    }

    pub fn from_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(Self::Png),
            image::ImageFormat::Jpeg => Some(Self::Jpg),
            image::ImageFormat::Gif => Some(Self::Gif),
            _ => None,
        }
    }

    pub fn format(&self) -> image::ImageFormat {
        match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpg => image::ImageFormat::Jpeg,
            Self::Gif => image::ImageFormat::Gif,
        }
    }
}

impl FromStr for ImageType {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" | "png8" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "gif" => Ok(Self::Gif),
            _ => Err(()),
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Where one source image ended up. Consumed by CSS/markup generators.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementRecord {
    /// Source path relative to the configured root directory.
    pub key: String,
    /// Short stable identifier derived from `key` (usable as a CSS class suffix).
    pub id: String,
    pub group_key: String,
    /// Sheet file relative to the root directory.
    pub sheet: String,
    /// Top-left of the packing cell (margins included).
    pub x: u32,
    pub y: u32,
    /// Cell size (margins included).
    pub width: u32,
    pub height: u32,
    pub margin: Margin,
}

/// One generated sheet.
#[derive(Debug, Clone, Serialize)]
pub struct SheetRecord {
    pub group_key: String,
    pub relative_path: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageType,
}

/// Statistics about sheet packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Default)]
pub struct SheetStats {
    pub num_images: usize,
    /// Width * height of the painted sheet.
    pub sheet_area: u64,
    /// Sum of the packing cells (margins included).
    pub used_area: u64,
    /// used_area / sheet_area (0.0 to 1.0).
    pub occupancy: f64,
}

impl SheetStats {
    pub fn from_cells<'a>(sheet: (u32, u32), cells: impl IntoIterator<Item = &'a Rect>) -> Self {
        let sheet_area = sheet.0 as u64 * sheet.1 as u64;
        let mut num_images = 0;
        let mut used_area = 0u64;
        for cell in cells {
            num_images += 1;
            used_area += cell.area();
        }
        let occupancy = if sheet_area > 0 {
            used_area as f64 / sheet_area as f64
        } else {
            0.0
        };
        Self {
            num_images,
            sheet_area,
            used_area,
            occupancy,
        }
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.sheet_area.saturating_sub(self.used_area)
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Images: {}, Occupancy: {:.2}%, Sheet Area: {} px², Used Area: {} px²",
            self.num_images,
            self.occupancy * 100.0,
            self.sheet_area,
            self.used_area,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_derives_size_from_edges() {
        let r = Rect::new(10, 20, 40, 25);
        assert_eq!(r.width(), 30);
        assert_eq!(r.height(), 5);
        assert_eq!(r.area(), 150);
        assert_eq!(Rect::with_size(10, 20, 30, 5), r);
    }

    #[test]
    fn inverted_edges_collapse() {
        let r = Rect::new(10, 10, 5, 5);
        assert_eq!(r.width(), 0);
        assert_eq!(r.height(), 0);
    }

    #[test]
    fn intersects_excludes_touching_edges() {
        let a = Rect::with_size(0, 0, 10, 10);
        let b = Rect::with_size(10, 0, 10, 10);
        let c = Rect::with_size(9, 9, 2, 2);
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
        assert!(b.intersects(&c));
    }

    #[test]
    fn margin_from_css_order() {
        let m = Margin::from([1, 2, 3, 4]);
        assert_eq!((m.top, m.right, m.bottom, m.left), (1, 2, 3, 4));
        assert_eq!(m.horizontal(), 6);
        assert_eq!(m.vertical(), 4);
    }
}
