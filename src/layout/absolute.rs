//! Absolute (out-of-flow) positioning.
//!
//! Runs after the flex passes. Each absolute node is placed against its
//! parent's final box: `left`/`top` measure from the parent origin,
//! `right`/`bottom` from the parent's far edge. When both offsets on an axis
//! are given, `right`/`bottom` wins. The node's flowed descendants are then
//! arranged inside it; nested absolute nodes get their own turn.
//!
//! The result only depends on the parent box and the measured size, so
//! running the pass again over a laid-out tree changes nothing.

use crate::types::{Rect, Size};

use super::flex::arrange;
use super::node::{LayoutTree, NodeId};

pub fn apply_absolute_layout(tree: &mut LayoutTree, limit: Size) {
    for id in tree.preorder() {
        if tree.node(id).style.is_absolute() {
            place(tree, id, limit);
        }
    }
}

fn place(tree: &mut LayoutTree, id: NodeId, limit: Size) {
    let Some(parent) = tree.node(id).parent() else {
        // An absolute root has nothing to be relative to.
        return;
    };
    let container = tree.node(parent).rect;
    let node = tree.node(id);
    let style = &node.style;

    let width = style.width.resolve(container.width).unwrap_or(node.measured.width);
    let height = style.height.resolve(container.height).unwrap_or(node.measured.height);

    let x = axis_start(container.x, container.right(), width, style.offsets.left, style.offsets.right);
    let y = axis_start(container.y, container.bottom(), height, style.offsets.top, style.offsets.bottom);

    arrange(tree, id, Rect::new(x, y, width, height), limit);
}

/// Start coordinate on one axis. The far-edge offset takes precedence.
fn axis_start(origin: u16, far: u16, size: u16, near_offset: Option<u16>, far_offset: Option<u16>) -> u16 {
    match far_offset {
        Some(off) => far.saturating_sub(off).saturating_sub(size),
        None => origin.saturating_add(near_offset.unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::flex::{arrange, measure};
    use crate::layout::node::{Dimension, LayoutNode, Offsets, PositionMode, Style};

    fn setup(offsets: Offsets) -> (LayoutTree, NodeId, NodeId) {
        let mut tree = LayoutTree::new(LayoutNode::new("root", "box"));
        let root = tree.root().unwrap();
        let body = tree.add_child(
            root,
            LayoutNode::new("body", "box").with_style(Style {
                width: Dimension::Cells(40),
                height: Dimension::Cells(20),
                ..Default::default()
            }),
        );
        let overlay = tree.add_child(
            body,
            LayoutNode::new("overlay", "box").with_style(Style {
                width: Dimension::Cells(10),
                height: Dimension::Cells(4),
                position: PositionMode::Absolute,
                offsets,
                ..Default::default()
            }),
        );
        tree.add_child(
            overlay,
            LayoutNode::new("label", "text").with_text("ok"),
        );
        let limit = Size::new(80, 24);
        measure(&mut tree, root, limit);
        arrange(&mut tree, root, Rect::new(0, 0, 80, 24), limit);
        (tree, body, overlay)
    }

    #[test]
    fn test_left_top_offsets() {
        let (mut tree, _, overlay) = setup(Offsets {
            left: Some(3),
            top: Some(2),
            ..Default::default()
        });
        apply_absolute_layout(&mut tree, Size::new(80, 24));
        assert_eq!(tree.node(overlay).rect, Rect::new(3, 2, 10, 4));
    }

    #[test]
    fn test_right_bottom_take_precedence() {
        let (mut tree, _, overlay) = setup(Offsets {
            left: Some(3),
            top: Some(2),
            right: Some(1),
            bottom: Some(1),
        });
        apply_absolute_layout(&mut tree, Size::new(80, 24));
        // body is 40x20 at origin: x = 40 - 1 - 10, y = 20 - 1 - 4
        assert_eq!(tree.node(overlay).rect, Rect::new(29, 15, 10, 4));
    }

    #[test]
    fn test_descendants_follow_absolute_parent() {
        let (mut tree, _, overlay) = setup(Offsets {
            left: Some(5),
            top: Some(5),
            ..Default::default()
        });
        apply_absolute_layout(&mut tree, Size::new(80, 24));
        let label = tree.find("label").unwrap();
        assert_eq!(tree.node(label).rect.x, 5);
        assert_eq!(tree.node(label).rect.y, 5);
        assert_eq!(tree.node(label).parent(), Some(overlay));
    }

    #[test]
    fn test_idempotent() {
        let (mut tree, _, _) = setup(Offsets {
            right: Some(2),
            top: Some(1),
            ..Default::default()
        });
        let limit = Size::new(80, 24);
        apply_absolute_layout(&mut tree, limit);
        let first: Vec<Rect> = tree.iter().map(|(_, n)| n.rect).collect();
        apply_absolute_layout(&mut tree, limit);
        let second: Vec<Rect> = tree.iter().map(|(_, n)| n.rect).collect();
        assert_eq!(first, second);
    }
}
