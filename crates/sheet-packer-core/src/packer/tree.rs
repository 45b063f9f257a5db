use super::Packer;
use crate::model::Rect;
use tracing::trace;

/// How a free leaf is divided around a new item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitPolicy {
    /// Cut vertically when the horizontal slack is larger, horizontally otherwise.
    LargerSlack,
    /// Always cut into left/right strips.
    Vertical,
}

/// Split-tree node. A split's two children exactly partition its rectangle.
#[derive(Debug, Clone)]
pub enum Node<K> {
    Leaf {
        rect: Rect,
        /// Placed key and the rectangle it occupies (top-left aligned in `rect`).
        item: Option<(K, Rect)>,
    },
    Split {
        rect: Rect,
        children: Box<[Node<K>; 2]>,
    },
}

impl<K: Clone> Node<K> {
    fn empty(rect: Rect) -> Self {
        Node::Leaf { rect, item: None }
    }

    pub fn rect(&self) -> Rect {
        match self {
            Node::Leaf { rect, .. } | Node::Split { rect, .. } => *rect,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { children, .. } => 1 + children[0].depth().max(children[1].depth()),
        }
    }

    /// Left-first depth-first search; the first leaf that takes the item wins.
    fn insert(&mut self, key: &K, w: u32, h: u32, policy: SplitPolicy) -> Option<Rect> {
        let rect = match self {
            Node::Split { children, .. } => {
                let [first, second] = &mut **children;
                return first
                    .insert(key, w, h, policy)
                    .or_else(|| second.insert(key, w, h, policy));
            }
            Node::Leaf { item: Some(_), .. } => return None,
            Node::Leaf { rect, item: None } => *rect,
        };
        if !rect.fits(w, h) {
            return None;
        }
        // A vertical-only packer cannot cut a strip narrower than its item, so a strip of
        // exactly the item's width takes it and keeps the slack below.
        let takes_leaf = rect.fits_exactly(w, h)
            || (policy == SplitPolicy::Vertical && rect.width() == w);
        if takes_leaf {
            let placed = Rect::with_size(rect.left(), rect.top(), w, h);
            *self = Node::Leaf {
                rect,
                item: Some((key.clone(), placed)),
            };
            return Some(placed);
        }

        let (near, far) = split(rect, w, h, policy);
        trace!(%rect, %near, %far, "split leaf");
        let mut first = Node::empty(near);
        let placed = first.insert(key, w, h, policy);
        *self = Node::Split {
            rect,
            children: Box::new([first, Node::empty(far)]),
        };
        placed
    }

    fn can_fit(&self, w: u32, h: u32) -> bool {
        match self {
            Node::Split { children, .. } => children[0].can_fit(w, h) || children[1].can_fit(w, h),
            Node::Leaf { item: Some(_), .. } => false,
            Node::Leaf { rect, item: None } => rect.fits(w, h),
        }
    }

    fn collect(&self, out: &mut Vec<(K, Rect)>) {
        match self {
            Node::Leaf { item: Some(i), .. } => out.push(i.clone()),
            Node::Leaf { item: None, .. } => {}
            Node::Split { children, .. } => {
                children[0].collect(out);
                children[1].collect(out);
            }
        }
    }
}

/// Returns `(near, far)`: `near` is the strip sized to the item along the cut axis.
fn split(rect: Rect, w: u32, h: u32, policy: SplitPolicy) -> (Rect, Rect) {
    let dw = rect.width() - w;
    let dh = rect.height() - h;
    let vertical = match policy {
        SplitPolicy::Vertical => true,
        SplitPolicy::LargerSlack => dw > dh,
    };
    let (l, t, r, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
    if vertical {
        (Rect::new(l, t, l + w, b), Rect::new(l + w, t, r, b))
    } else {
        (Rect::new(l, t, r, t + h), Rect::new(l, t + h, r, b))
    }
}

/// Binary split-tree packer rooted at a fixed bounding box.
pub struct TreePacker<K> {
    root: Node<K>,
    policy: SplitPolicy,
}

impl<K: Clone> TreePacker<K> {
    pub fn new(bounds: Rect, policy: SplitPolicy) -> Self {
        Self {
            root: Node::empty(bounds),
            policy,
        }
    }

    pub fn root(&self) -> &Node<K> {
        &self.root
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }
}

impl<K: Clone> Packer<K> for TreePacker<K> {
    fn bounds(&self) -> Rect {
        self.root.rect()
    }

    fn can_pack(&self, width: u32, height: u32) -> bool {
        self.root.can_fit(width, height)
    }

    fn pack(&mut self, key: K, width: u32, height: u32) -> Option<Rect> {
        self.root.insert(&key, width, height, self.policy)
    }

    fn placements(&self) -> Vec<(K, Rect)> {
        let mut out = Vec::new();
        self.root.collect(&mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_fit_consumes_root() {
        let mut p: TreePacker<&str> = TreePacker::new(Rect::with_size(0, 0, 8, 8), SplitPolicy::LargerSlack);
        assert_eq!(p.pack("a", 8, 8), Some(Rect::with_size(0, 0, 8, 8)));
        assert_eq!(p.depth(), 1);
        assert_eq!(p.pack("b", 1, 1), None);
    }

    #[test]
    fn split_prefers_axis_with_more_slack() {
        // dw = 90 > dh = 0: vertical cut, item takes the left strip.
        let (near, far) = split(Rect::with_size(0, 0, 100, 10), 10, 10, SplitPolicy::LargerSlack);
        assert_eq!(near, Rect::new(0, 0, 10, 10));
        assert_eq!(far, Rect::new(10, 0, 100, 10));
        // dw = dh: horizontal cut.
        let (near, far) = split(Rect::with_size(0, 0, 20, 20), 10, 10, SplitPolicy::LargerSlack);
        assert_eq!(near, Rect::new(0, 0, 20, 10));
        assert_eq!(far, Rect::new(0, 10, 20, 20));
    }

    #[test]
    fn children_partition_parent() {
        let mut p: TreePacker<u32> = TreePacker::new(Rect::with_size(0, 0, 64, 64), SplitPolicy::LargerSlack);
        for (i, (w, h)) in [(20, 30), (10, 10), (40, 5)].into_iter().enumerate() {
            p.pack(i as u32, w, h);
        }
        fn check(n: &Node<u32>) {
            if let Node::Split { rect, children } = n {
                let (a, b) = (children[0].rect(), children[1].rect());
                assert!(rect.contains(&a) && rect.contains(&b));
                assert!(!a.intersects(&b));
                assert_eq!(a.area() + b.area(), rect.area());
                check(&children[0]);
                check(&children[1]);
            }
        }
        check(p.root());
    }

    #[test]
    fn vertical_policy_keeps_a_single_row() {
        let mut p: TreePacker<u32> = TreePacker::new(Rect::with_size(0, 0, 1000, 30), SplitPolicy::Vertical);
        assert_eq!(p.pack(0, 20, 30), Some(Rect::with_size(0, 0, 20, 30)));
        assert_eq!(p.pack(1, 10, 12), Some(Rect::with_size(20, 0, 10, 12)));
        assert_eq!(p.pack(2, 5, 30), Some(Rect::with_size(30, 0, 5, 30)));
        assert!(p.placements().iter().all(|(_, r)| r.top() == 0));
    }

    #[test]
    fn can_pack_does_not_place() {
        let mut p: TreePacker<u32> = TreePacker::new(Rect::with_size(0, 0, 10, 10), SplitPolicy::LargerSlack);
        assert!(p.can_pack(10, 10));
        assert!(!p.can_pack(11, 1));
        assert!(p.placements().is_empty());
        p.pack(0, 10, 10);
        assert!(!p.can_pack(1, 1));
    }
}
