//! Layout - flexbox geometry for terminal cells
//!
//! # Architecture
//!
//! ```text
//! LayoutTree ──► measure (bottom-up) ──► arrange (top-down) ──► absolute pass
//!                                                                    │
//!                               LayoutCache ◄── Layout { boxes } ◄───┘
//! ```
//!
//! [`LayoutEngine::layout`] writes the result back into the tree's nodes and
//! returns it as a flat list of boxes. Layout never fails: a node that cannot
//! be measured gets a zero size.
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::layout::*;
//!
//! let mut tree = LayoutTree::new(LayoutNode::new("root", "box").with_style(Style::row()));
//! let root = tree.root().unwrap();
//! tree.add_child(root, LayoutNode::new("title", "text").with_text("Hello"));
//!
//! let engine = LayoutEngine::new(64);
//! let layout = engine.layout(&mut tree, Constraints::loose(Size::new(80, 24)));
//! ```

mod absolute;
mod cache;
mod flex;
mod node;
mod text_measure;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{Rect, Size};

pub use absolute::apply_absolute_layout;
pub use cache::{LayoutCache, Signature, signature};
pub use flex::distribute;
pub use node::*;
pub use text_measure::{char_width, measure_text, string_width, truncate_text};

/// Final geometry for one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutBox {
    pub node: NodeId,
    pub id: String,
    pub rect: Rect,
    pub measured: Size,
}

/// Output of one layout call, in tree pre-order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Layout {
    pub boxes: Vec<LayoutBox>,
    /// Extent of everything laid out, within the constraints.
    pub content_size: Size,
}

impl Layout {
    pub fn rect(&self, id: &str) -> Option<Rect> {
        self.boxes.iter().find(|b| b.id == id).map(|b| b.rect)
    }
}

/// Memoizing front end to the layout passes. Safe to share across threads.
pub struct LayoutEngine {
    cache: Mutex<LayoutCache>,
}

impl LayoutEngine {
    pub fn new(cache_capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LayoutCache::new(cache_capacity)),
        }
    }

    pub fn layout(&self, tree: &mut LayoutTree, constraints: Constraints) -> Layout {
        let sig = signature(tree, constraints);

        if let Some(hit) = self.cache.lock().get(sig) {
            write_back(tree, &hit);
            return hit;
        }

        let layout = compute_layout(tree, constraints);
        self.cache.lock().insert(sig, layout.clone());
        layout
    }

    pub fn invalidate_all(&self) {
        self.cache.lock().invalidate_all();
    }

    pub fn invalidate_node(&self, id: &str) {
        let dropped = self.cache.lock().invalidate_node(id);
        log::trace!("layout cache: dropped {dropped} entries for {id}");
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }

    /// (hits, misses)
    pub fn cache_stats(&self) -> (u64, u64) {
        self.cache.lock().stats()
    }
}

/// Run measure, arrange and the absolute pass without touching any cache.
pub fn compute_layout(tree: &mut LayoutTree, constraints: Constraints) -> Layout {
    let Some(root) = tree.root() else {
        return Layout::default();
    };
    let max = constraints.max_size();

    flex::measure(tree, root, max);
    let size = constraints.clamp(flex::root_size(tree, root, max));
    flex::arrange(tree, root, Rect::new(0, 0, size.width, size.height), max);
    apply_absolute_layout(tree, max);

    let boxes: Vec<LayoutBox> = tree
        .preorder()
        .into_iter()
        .map(|id| {
            let node = tree.node(id);
            LayoutBox {
                node: id,
                id: node.id.clone(),
                rect: node.rect,
                measured: node.measured,
            }
        })
        .collect();

    let (right, bottom) = boxes.iter().fold((0u16, 0u16), |(r, b), bx| {
        (r.max(bx.rect.right()), b.max(bx.rect.bottom()))
    });
    let content_size = constraints.clamp(Size::new(right, bottom));

    Layout { boxes, content_size }
}

fn write_back(tree: &mut LayoutTree, layout: &Layout) {
    for bx in &layout.boxes {
        if let Some(node) = tree.get_mut(bx.node) {
            node.rect = bx.rect;
            node.measured = bx.measured;
        }
    }
    for bx in &layout.boxes {
        let origin = tree
            .get(bx.node)
            .and_then(|n| n.parent())
            .and_then(|p| tree.get(p))
            .map(|p| (p.rect.x, p.rect.y))
            .unwrap_or((0, 0));
        if let Some(node) = tree.get_mut(bx.node) {
            node.position.x = bx.rect.x.saturating_sub(origin.0);
            node.position.y = bx.rect.y.saturating_sub(origin.1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flex_child(id: &str, basis: u16, grow: f32) -> LayoutNode {
        LayoutNode::new(id, "box").with_style(Style {
            basis: Dimension::Cells(basis),
            grow,
            ..Default::default()
        })
    }

    fn setup() -> LayoutTree {
        let mut tree = LayoutTree::new(LayoutNode::new("root", "box").with_style(Style {
            gap: 2,
            width: Dimension::Cells(84),
            ..Style::row()
        }));
        let root = tree.root().unwrap();
        tree.add_child(root, flex_child("a", 10, 1.0));
        tree.add_child(root, flex_child("b", 20, 0.0));
        tree.add_child(root, flex_child("c", 30, 1.0));
        tree
    }

    #[test]
    fn test_flex_grow_example() {
        let mut tree = setup();
        let layout = compute_layout(&mut tree, Constraints::loose(Size::new(100, 10)));
        let widths: Vec<u16> = ["a", "b", "c"]
            .iter()
            .map(|id| layout.rect(id).unwrap().width)
            .collect();
        assert_eq!(widths, vec![20, 20, 40]);
        assert_eq!(layout.rect("b").unwrap().x, 22);
        assert_eq!(layout.rect("c").unwrap().x, 44);
    }

    #[test]
    fn test_sizes_within_constraints() {
        let cases = [
            Constraints::new(0, 50, 0, 5),
            Constraints::new(90, 120, 8, 8),
            Constraints::tight(Size::new(30, 3)),
            Constraints::loose(Size::new(200, 40)),
        ];
        for c in cases {
            let mut tree = setup();
            let layout = compute_layout(&mut tree, c);
            let root = layout.rect("root").unwrap();
            assert!(root.width >= c.min_width && root.width <= c.max_width, "{c:?}");
            assert!(root.height >= c.min_height && root.height <= c.max_height, "{c:?}");
            assert!(layout.content_size.width <= c.max_width);
            assert!(layout.content_size.height <= c.max_height);
            for bx in &layout.boxes {
                assert!(bx.rect.width <= c.max_width && bx.rect.height <= c.max_height);
            }
        }
    }

    #[test]
    fn test_unbounded_root_uses_measured_size() {
        let mut tree = LayoutTree::new(LayoutNode::new("root", "box"));
        let root = tree.root().unwrap();
        tree.add_child(root, LayoutNode::new("line1", "text").with_text("hello"));
        tree.add_child(root, LayoutNode::new("line2", "text").with_text("hi"));
        let layout = compute_layout(&mut tree, Constraints::unbounded());
        assert_eq!(layout.rect("root").unwrap().size(), Size::new(5, 2));
        assert_eq!(layout.rect("line2").unwrap(), Rect::new(0, 1, 5, 1));
    }

    #[test]
    fn test_percent_width() {
        let mut tree = LayoutTree::new(LayoutNode::new("root", "box").with_style(Style::row()));
        let root = tree.root().unwrap();
        tree.add_child(
            root,
            LayoutNode::new("half", "box").with_style(Style {
                width: Dimension::Percent(50.0),
                ..Default::default()
            }),
        );
        let layout = compute_layout(&mut tree, Constraints::tight(Size::new(60, 10)));
        assert_eq!(layout.rect("half").unwrap().width, 30);
    }

    #[test]
    fn test_engine_caches_and_invalidates() {
        let engine = LayoutEngine::new(4);
        let c = Constraints::loose(Size::new(100, 10));

        let mut tree = setup();
        let first = engine.layout(&mut tree, c);
        let mut again = setup();
        let second = engine.layout(&mut again, c);
        assert_eq!(first, second);
        assert_eq!(engine.cache_stats(), (1, 1));
        assert_eq!(again.rect_of("c"), Some(Rect::new(44, 0, 40, 10)));

        engine.invalidate_node("b");
        assert_eq!(engine.cached_entries(), 0);
        engine.layout(&mut tree, c);
        engine.layout(&mut tree, Constraints::loose(Size::new(90, 10)));
        assert_eq!(engine.cached_entries(), 2);
        engine.invalidate_all();
        assert_eq!(engine.cached_entries(), 0);
    }
}
