//! Flexbox passes.
//!
//! # Algorithm
//!
//! 1. **Measure** (bottom-up): leaves report content size plus padding,
//!    containers sum their flowed children along the main axis (plus gaps)
//!    and take the widest child on the cross axis. Explicit sizes win.
//! 2. **Arrange** (top-down): each container resolves child bases, grows or
//!    shrinks them into its inner main size, places them per `justify`, then
//!    aligns them on the cross axis and recurses.
//!
//! Absolutely positioned children are skipped by both flows here and placed
//! afterwards by [`super::absolute`].
//!
//! Arithmetic saturates. Nothing here can fail; impossible sizes clamp to zero.

use crate::types::{Point, Rect, Size};

use super::node::{Align, Content, Justify, LayoutTree, NodeId, UNBOUNDED};
use super::text_measure::measure_text;

// =============================================================================
// MEASURE
// =============================================================================

/// Measure `id` and its subtree against the space its parent offers.
pub(crate) fn measure(tree: &mut LayoutTree, id: NodeId, avail: Size) -> Size {
    let (style, content, children) = {
        let node = tree.node(id);
        (node.style.clone(), node.content.clone(), node.children().to_vec())
    };

    let explicit_w = style.width.resolve(avail.width);
    let explicit_h = style.height.resolve(avail.height);
    let pad = style.padding;

    let inner_avail = Size::new(
        explicit_w.unwrap_or(avail.width).saturating_sub(pad.horizontal()),
        explicit_h.unwrap_or(avail.height).saturating_sub(pad.vertical()),
    );

    let mut main_sum: u16 = 0;
    let mut cross_max: u16 = 0;
    let mut flowed: usize = 0;

    for &child in &children {
        let child_size = measure(tree, child, inner_avail);
        let child_style = &tree.node(child).style;
        if child_style.is_absolute() {
            continue;
        }
        let (main, cross) = if style.is_row() {
            (child_size.width, child_size.height)
        } else {
            (child_size.height, child_size.width)
        };
        let main_dim = if style.is_row() { inner_avail.width } else { inner_avail.height };
        let basis = child_style.basis.resolve(main_dim).unwrap_or(main);
        main_sum = main_sum.saturating_add(basis);
        cross_max = cross_max.max(cross);
        flowed += 1;
    }
    if flowed > 1 {
        let gaps = u16::try_from(flowed - 1).unwrap_or(u16::MAX);
        main_sum = main_sum.saturating_add(style.gap.saturating_mul(gaps));
    }

    let intrinsic = if flowed > 0 {
        if style.is_row() {
            Size::new(main_sum, cross_max)
        } else {
            Size::new(cross_max, main_sum)
        }
    } else {
        match &content {
            Content::None => Size::ZERO,
            Content::Text(text) => measure_text(text),
            Content::Fixed(size) => *size,
        }
    };

    let size = Size::new(
        explicit_w.unwrap_or(intrinsic.width.saturating_add(pad.horizontal())),
        explicit_h.unwrap_or(intrinsic.height.saturating_add(pad.vertical())),
    );
    tree.node_mut(id).measured = size;
    size
}

// =============================================================================
// DISTRIBUTION
// =============================================================================

/// Grow or shrink `bases` so they fill `main` along with `gap`s between them.
///
/// Free space is split in proportion to the weights with cumulative rounding,
/// so the shares always add up to exactly the free space. Shrinking floors
/// each item at zero.
pub fn distribute(bases: &[u16], grows: &[f32], shrinks: &[f32], gap: u16, main: u16) -> Vec<u16> {
    let n = bases.len();
    let mut sizes = bases.to_vec();
    if n == 0 {
        return sizes;
    }

    let fixed: i64 = bases.iter().map(|&b| b as i64).sum::<i64>() + gap as i64 * (n as i64 - 1);
    let free = main as i64 - fixed;

    let (weights, growing) = if free > 0 {
        (grows, true)
    } else if free < 0 {
        (shrinks, false)
    } else {
        return sizes;
    };

    let total: f64 = weights.iter().take(n).map(|&w| w as f64).sum();
    if total <= 0.0 {
        return sizes;
    }

    let amount = free.unsigned_abs() as f64;
    let mut acc = 0.0f64;
    let mut given: i64 = 0;
    for (i, size) in sizes.iter_mut().enumerate() {
        let weight = weights.get(i).copied().unwrap_or(0.0) as f64;
        acc += weight / total * amount;
        let upto = acc.round() as i64;
        let share = (upto - given).max(0);
        given = upto;

        let share = share.min(u16::MAX as i64) as u16;
        *size = if growing {
            size.saturating_add(share)
        } else {
            size.saturating_sub(share)
        };
    }
    sizes
}

/// Main-axis offset of item `index` contributed by `justify`, given the
/// space left over after sizes and gaps.
pub(crate) fn justify_offset(justify: Justify, index: usize, count: usize, remaining: u16) -> u16 {
    let rem = remaining as u32;
    let i = index as u32;
    let n = count.max(1) as u32;
    let offset = match justify {
        Justify::Start => 0,
        Justify::Center => rem / 2,
        Justify::End => rem,
        Justify::SpaceBetween => {
            if n > 1 { rem * i / (n - 1) } else { 0 }
        }
        Justify::SpaceAround => rem * (2 * i + 1) / (2 * n),
        Justify::SpaceEvenly => rem * (i + 1) / (n + 1),
    };
    offset as u16
}

fn cross_offset(align: Align, line: u16, size: u16) -> u16 {
    match align {
        Align::Center => line.saturating_sub(size) / 2,
        Align::End => line.saturating_sub(size),
        Align::Start | Align::Stretch => 0,
    }
}

// =============================================================================
// ARRANGE
// =============================================================================

/// Place `id` at `rect` and lay out its flowed descendants.
///
/// `limit` caps every box so no output exceeds the call's constraints.
pub(crate) fn arrange(tree: &mut LayoutTree, id: NodeId, rect: Rect, limit: Size) {
    let rect = Rect::new(rect.x, rect.y, rect.width.min(limit.width), rect.height.min(limit.height));
    let parent_origin = tree
        .node(id)
        .parent()
        .map(|p| tree.node(p).rect)
        .map(|r| Point::new(r.x, r.y))
        .unwrap_or_default();
    {
        let node = tree.node_mut(id);
        node.rect = rect;
        node.position = Point::new(
            rect.x.saturating_sub(parent_origin.x),
            rect.y.saturating_sub(parent_origin.y),
        );
    }

    let style = tree.node(id).style.clone();
    let flowed: Vec<NodeId> = tree
        .node(id)
        .children()
        .iter()
        .copied()
        .filter(|&c| !tree.node(c).style.is_absolute())
        .collect();
    if flowed.is_empty() {
        return;
    }

    let pad = style.padding;
    let inner = Rect::new(
        rect.x.saturating_add(pad.left),
        rect.y.saturating_add(pad.top),
        rect.width.saturating_sub(pad.horizontal()),
        rect.height.saturating_sub(pad.vertical()),
    );
    let is_row = style.is_row();
    let (main_size, cross_size) = if is_row {
        (inner.width, inner.height)
    } else {
        (inner.height, inner.width)
    };

    let mut bases = Vec::with_capacity(flowed.len());
    let mut grows = Vec::with_capacity(flowed.len());
    let mut shrinks = Vec::with_capacity(flowed.len());
    for &child in &flowed {
        let node = tree.node(child);
        let cs = &node.style;
        let explicit_main = if is_row {
            cs.width.resolve(inner.width)
        } else {
            cs.height.resolve(inner.height)
        };
        let measured_main = if is_row { node.measured.width } else { node.measured.height };
        let basis = cs
            .basis
            .resolve(main_size)
            .or(explicit_main)
            .unwrap_or(measured_main);
        bases.push(basis);
        grows.push(cs.grow_weight());
        shrinks.push(cs.shrink_weight());
    }

    let sizes = distribute(&bases, &grows, &shrinks, style.gap, main_size);
    let count = flowed.len();
    let gaps = u32::try_from(count.saturating_sub(1)).unwrap_or(u32::MAX);
    let used: u32 = sizes
        .iter()
        .map(|&s| s as u32)
        .fold(0u32, u32::saturating_add)
        .saturating_add((style.gap as u32).saturating_mul(gaps));
    let remaining = (main_size as u32).saturating_sub(used).min(u16::MAX as u32) as u16;

    let mut cursor: u32 = 0;
    for (i, &child) in flowed.iter().enumerate() {
        let main = sizes[i];
        let (cross, align) = {
            let node = tree.node(child);
            let cs = &node.style;
            let align = cs.align_self.unwrap_or(style.align_items);
            let explicit_cross = if is_row {
                cs.height.resolve(inner.height)
            } else {
                cs.width.resolve(inner.width)
            };
            let measured_cross = if is_row { node.measured.height } else { node.measured.width };
            let cross = match (explicit_cross, align) {
                (Some(c), _) => c,
                (None, Align::Stretch) => cross_size,
                (None, _) => measured_cross,
            };
            (cross.min(cross_size), align)
        };

        let main_pos = cursor + justify_offset(style.justify, i, count, remaining) as u32;
        let main_pos = main_pos.min(u16::MAX as u32) as u16;
        let cross_pos = cross_offset(align, cross_size, cross);

        let child_rect = if is_row {
            Rect::new(
                inner.x.saturating_add(main_pos),
                inner.y.saturating_add(cross_pos),
                main,
                cross,
            )
        } else {
            Rect::new(
                inner.x.saturating_add(cross_pos),
                inner.y.saturating_add(main_pos),
                cross,
                main,
            )
        };
        arrange(tree, child, child_rect, limit);

        cursor += main as u32 + style.gap as u32;
    }
}

/// Size for the root box: explicit, else the constraint maximum, else the
/// measured size when the maximum is unbounded.
pub(crate) fn root_size(tree: &LayoutTree, root: NodeId, max: Size) -> Size {
    let node = tree.node(root);
    let pick = |explicit: Option<u16>, bound: u16, measured: u16| match explicit {
        Some(v) => v,
        None if bound == UNBOUNDED => measured,
        None => bound,
    };
    Size::new(
        pick(node.style.width.resolve(max.width), max.width, node.measured.width),
        pick(node.style.height.resolve(max.height), max.height, node.measured.height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::node::{Dimension, Edges, LayoutNode, Style};

    fn sized(id: &str, w: u16, h: u16) -> LayoutNode {
        LayoutNode::new(id, "box").with_style(Style {
            width: Dimension::Cells(w),
            height: Dimension::Cells(h),
            ..Default::default()
        })
    }

    #[test]
    fn test_distribute_grow() {
        let sizes = distribute(&[10, 20, 30], &[1.0, 0.0, 1.0], &[1.0; 3], 2, 84);
        assert_eq!(sizes, vec![20, 20, 40]);
    }

    #[test]
    fn test_distribute_shrink_floors_at_zero() {
        let sizes = distribute(&[2, 50], &[0.0; 2], &[1.0, 1.0], 0, 10);
        assert_eq!(sizes, vec![0, 29]);
    }

    #[test]
    fn test_distribute_rounding_sums_exactly() {
        let sizes = distribute(&[0, 0, 0], &[1.0, 1.0, 1.0], &[1.0; 3], 0, 10);
        assert_eq!(sizes.iter().map(|&s| s as u32).sum::<u32>(), 10);
    }

    #[test]
    fn test_distribute_no_weights() {
        let sizes = distribute(&[10, 10], &[0.0, 0.0], &[0.0, 0.0], 0, 50);
        assert_eq!(sizes, vec![10, 10]);
    }

    #[test]
    fn test_justify_offsets() {
        // 3 items, 12 cells left over
        assert_eq!(justify_offset(Justify::SpaceBetween, 0, 3, 12), 0);
        assert_eq!(justify_offset(Justify::SpaceBetween, 2, 3, 12), 12);
        assert_eq!(justify_offset(Justify::SpaceAround, 0, 3, 12), 2);
        assert_eq!(justify_offset(Justify::SpaceAround, 2, 3, 12), 10);
        assert_eq!(justify_offset(Justify::SpaceEvenly, 0, 3, 12), 3);
        assert_eq!(justify_offset(Justify::SpaceEvenly, 2, 3, 12), 9);
        assert_eq!(justify_offset(Justify::Center, 1, 3, 12), 6);
        assert_eq!(justify_offset(Justify::End, 0, 3, 12), 12);
    }

    #[test]
    fn test_measure_row_with_gap_and_padding() {
        let mut tree = LayoutTree::new(LayoutNode::new("root", "box").with_style(Style {
            gap: 1,
            padding: Edges::all(1),
            ..Style::row()
        }));
        let root = tree.root().unwrap();
        tree.add_child(root, sized("a", 3, 2));
        tree.add_child(root, sized("b", 4, 5));
        let size = measure(&mut tree, root, Size::new(80, 24));
        assert_eq!(size, Size::new(3 + 1 + 4 + 2, 5 + 2));
    }

    #[test]
    fn test_measure_more_children_than_cells_saturates() {
        let mut tree = LayoutTree::new(LayoutNode::new("root", "box").with_style(Style {
            gap: 1,
            ..Style::row()
        }));
        let root = tree.root().unwrap();
        for i in 0..(u16::MAX as usize + 2) {
            tree.add_child(root, sized(&format!("c{i}"), 0, 1));
        }
        let size = measure(&mut tree, root, Size::new(80, 24));
        assert_eq!(size, Size::new(u16::MAX, 1));
    }

    #[test]
    fn test_measure_text_leaf() {
        let mut tree = LayoutTree::new(LayoutNode::new("t", "text").with_text("hello\nhi"));
        let root = tree.root().unwrap();
        assert_eq!(measure(&mut tree, root, Size::new(80, 24)), Size::new(5, 2));
    }

    #[test]
    fn test_arrange_cross_alignment() {
        let mut tree = LayoutTree::new(LayoutNode::new("root", "box").with_style(Style {
            align_items: Align::Center,
            ..Style::row()
        }));
        let root = tree.root().unwrap();
        let a = tree.add_child(root, sized("a", 4, 2));
        let b = tree.add_child(
            root,
            sized("b", 4, 2).with_style(Style {
                width: Dimension::Cells(4),
                align_self: Some(Align::Stretch),
                ..Default::default()
            }),
        );
        measure(&mut tree, root, Size::new(20, 10));
        arrange(&mut tree, root, Rect::new(0, 0, 20, 10), Size::new(20, 10));

        assert_eq!(tree.node(a).rect, Rect::new(0, 4, 4, 2));
        assert_eq!(tree.node(b).rect, Rect::new(4, 0, 4, 10));
        assert_eq!(tree.node(b).position, Point::new(4, 0));
    }
}
