//! Packing order strategies.
//!
//! Every strategy is a stable sort over insertion order, so equal keys keep the order in
//! which images were registered and identical inputs always pack identically.

use std::cmp::Reverse;

use crate::config::SortOrder;
use crate::descriptor::ImageDescriptor;

/// Orders a group's images before packing. Must not mutate the descriptors.
pub trait SortStrategy: Sync {
    /// Returns a permutation of `0..images.len()`.
    fn order(&self, images: &[ImageDescriptor]) -> Vec<usize>;
}

pub struct AreaDesc;
pub struct MaxSideDesc;
pub struct NameAsc;
pub struct InsertionOrder;

impl SortStrategy for AreaDesc {
    fn order(&self, images: &[ImageDescriptor]) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..images.len()).collect();
        idx.sort_by_key(|&i| Reverse(images[i].area()));
        idx
    }
}

impl SortStrategy for MaxSideDesc {
    fn order(&self, images: &[ImageDescriptor]) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..images.len()).collect();
        idx.sort_by_key(|&i| Reverse(images[i].longest_dimension()));
        idx
    }
}

impl SortStrategy for NameAsc {
    fn order(&self, images: &[ImageDescriptor]) -> Vec<usize> {
        let mut idx: Vec<usize> = (0..images.len()).collect();
        idx.sort_by(|&a, &b| images[a].key().cmp(images[b].key()));
        idx
    }
}

impl SortStrategy for InsertionOrder {
    fn order(&self, images: &[ImageDescriptor]) -> Vec<usize> {
        (0..images.len()).collect()
    }
}

impl SortOrder {
    /// Strategy registered for this identifier.
    pub fn strategy(&self) -> &'static dyn SortStrategy {
        match self {
            SortOrder::AreaDesc => &AreaDesc,
            SortOrder::MaxSideDesc => &MaxSideDesc,
            SortOrder::NameAsc => &NameAsc,
            SortOrder::None => &InsertionOrder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ImageParams;
    use crate::model::ImageType;

    fn images(sizes: &[(&str, u32, u32)]) -> Vec<ImageDescriptor> {
        sizes
            .iter()
            .map(|&(k, w, h)| {
                ImageDescriptor::from_dimensions(k, w, h, ImageType::Png, &ImageParams::default())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn area_desc_keeps_insertion_order_on_ties() {
        let imgs = images(&[("a", 10, 10), ("b", 20, 20), ("c", 5, 20), ("d", 20, 5)]);
        assert_eq!(AreaDesc.order(&imgs), vec![1, 0, 2, 3]);
    }

    #[test]
    fn max_side_desc_uses_longest_dimension() {
        let imgs = images(&[("a", 10, 10), ("b", 3, 40), ("c", 40, 3), ("d", 30, 30)]);
        assert_eq!(MaxSideDesc.order(&imgs), vec![1, 2, 3, 0]);
    }

    #[test]
    fn name_and_insertion_orders() {
        let imgs = images(&[("b", 1, 1), ("a", 1, 1), ("c", 1, 1)]);
        assert_eq!(NameAsc.order(&imgs), vec![1, 0, 2]);
        assert_eq!(InsertionOrder.order(&imgs), vec![0, 1, 2]);
    }

    #[test]
    fn ordering_is_deterministic() {
        let imgs = images(&[("a", 7, 3), ("b", 3, 7), ("c", 21, 1), ("d", 1, 21)]);
        let first = SortOrder::AreaDesc.strategy().order(&imgs);
        for _ in 0..4 {
            assert_eq!(SortOrder::AreaDesc.strategy().order(&imgs), first);
        }
    }
}
