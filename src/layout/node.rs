//! Layout tree: arena of nodes, styles and box constraints.
//!
//! Parents own their ordered child lists. The parent link on each node is a
//! plain index used for lookups only. Structural changes rebuild the tree.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Rect, Size};

/// Marker for "no upper bound" in [`Constraints`].
pub const UNBOUNDED: u16 = u16::MAX;

// =============================================================================
// STYLE ENUMS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    #[default]
    Auto,
    Cells(u16),
    Percent(f32),
}

impl Dimension {
    /// Resolve against the parent's size. `Auto`, and percentages of an
    /// unbounded parent, resolve to nothing.
    pub fn resolve(self, parent: u16) -> Option<u16> {
        match self {
            Dimension::Auto => None,
            Dimension::Cells(n) => Some(n),
            Dimension::Percent(_) if parent == UNBOUNDED => None,
            Dimension::Percent(p) => {
                let p = if p.is_finite() { p.max(0.0) } else { 0.0 };
                Some((parent as f32 * p / 100.0).floor().min(UNBOUNDED as f32) as u16)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlexDirection {
    Row,
    #[default]
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Justify {
    #[default]
    Start,
    Center,
    End,
    SpaceBetween,
    SpaceAround,
    SpaceEvenly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Align {
    Start,
    Center,
    End,
    #[default]
    Stretch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    #[default]
    Relative,
    Absolute,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Edges {
    pub top: u16,
    pub right: u16,
    pub bottom: u16,
    pub left: u16,
}

impl Edges {
    pub const fn all(n: u16) -> Self {
        Self { top: n, right: n, bottom: n, left: n }
    }

    pub fn horizontal(&self) -> u16 {
        self.left.saturating_add(self.right)
    }

    pub fn vertical(&self) -> u16 {
        self.top.saturating_add(self.bottom)
    }
}

/// Offsets for absolutely positioned nodes. Relative nodes ignore them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Offsets {
    pub left: Option<u16>,
    pub top: Option<u16>,
    pub right: Option<u16>,
    pub bottom: Option<u16>,
}

// =============================================================================
// STYLE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub direction: FlexDirection,
    pub grow: f32,
    pub shrink: f32,
    pub basis: Dimension,
    pub width: Dimension,
    pub height: Dimension,
    pub gap: u16,
    pub justify: Justify,
    pub align_items: Align,
    pub align_self: Option<Align>,
    pub padding: Edges,
    pub position: PositionMode,
    pub offsets: Offsets,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            direction: FlexDirection::Column,
            grow: 0.0,
            shrink: 1.0,
            basis: Dimension::Auto,
            width: Dimension::Auto,
            height: Dimension::Auto,
            gap: 0,
            justify: Justify::Start,
            align_items: Align::Stretch,
            align_self: None,
            padding: Edges::default(),
            position: PositionMode::Relative,
            offsets: Offsets::default(),
        }
    }
}

impl Style {
    pub fn row() -> Self {
        Self { direction: FlexDirection::Row, ..Default::default() }
    }

    pub fn column() -> Self {
        Self::default()
    }

    pub fn is_row(&self) -> bool {
        self.direction == FlexDirection::Row
    }

    pub fn is_absolute(&self) -> bool {
        self.position == PositionMode::Absolute
    }

    /// Negative or non-finite weights count as zero.
    pub(crate) fn grow_weight(&self) -> f32 {
        if self.grow.is_finite() { self.grow.max(0.0) } else { 0.0 }
    }

    pub(crate) fn shrink_weight(&self) -> f32 {
        if self.shrink.is_finite() { self.shrink.max(0.0) } else { 0.0 }
    }
}

// =============================================================================
// CONSTRAINTS
// =============================================================================

/// Box constraints for one layout call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constraints {
    pub min_width: u16,
    pub max_width: u16,
    pub min_height: u16,
    pub max_height: u16,
}

impl Constraints {
    pub const fn new(min_width: u16, max_width: u16, min_height: u16, max_height: u16) -> Self {
        Self { min_width, max_width, min_height, max_height }
    }

    /// Exactly this size.
    pub const fn tight(size: Size) -> Self {
        Self::new(size.width, size.width, size.height, size.height)
    }

    /// Anything up to this size.
    pub const fn loose(size: Size) -> Self {
        Self::new(0, size.width, 0, size.height)
    }

    pub const fn unbounded() -> Self {
        Self::new(0, UNBOUNDED, 0, UNBOUNDED)
    }

    pub fn max_size(&self) -> Size {
        Size::new(self.max_width, self.max_height)
    }

    /// Clamp into `[min, max]`. An inverted pair is treated as `max`.
    pub fn clamp(&self, size: Size) -> Size {
        let width = size.width.max(self.min_width).min(self.max_width);
        let height = size.height.max(self.min_height).min(self.max_height);
        Size::new(width, height)
    }
}

// =============================================================================
// NODES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// What a leaf contributes to measurement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Content {
    #[default]
    None,
    Text(String),
    Fixed(Size),
}

#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub id: String,
    pub type_tag: String,
    pub style: Style,
    pub content: Content,

    parent: Option<NodeId>,
    children: Vec<NodeId>,

    /// Desired size from the measure pass.
    pub measured: Size,
    /// Offset from the parent's origin.
    pub position: Point,
    /// Final box in absolute coordinates.
    pub rect: Rect,
}

impl LayoutNode {
    pub fn new(id: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_tag: type_tag.into(),
            style: Style::default(),
            content: Content::None,
            parent: None,
            children: Vec::new(),
            measured: Size::ZERO,
            position: Point::default(),
            rect: Rect::default(),
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_content(Content::Text(text.into()))
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-backed layout tree. Node 0 is the root.
#[derive(Debug, Clone, Default)]
pub struct LayoutTree {
    nodes: Vec<LayoutNode>,
}

impl LayoutTree {
    pub fn new(root: LayoutNode) -> Self {
        let mut root = root;
        root.parent = None;
        root.children.clear();
        Self { nodes: vec![root] }
    }

    pub fn root(&self) -> Option<NodeId> {
        if self.nodes.is_empty() { None } else { Some(NodeId(0)) }
    }

    /// Append `node` as the last child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: LayoutNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        let mut node = node;
        node.parent = Some(parent);
        node.children.clear();
        self.nodes.push(node);
        self.nodes[parent.0].children.push(id);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&LayoutNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut LayoutNode> {
        self.nodes.get_mut(id.0)
    }

    pub(crate) fn node(&self, id: NodeId) -> &LayoutNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut LayoutNode {
        &mut self.nodes[id.0]
    }

    pub fn find(&self, id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.id == id).map(NodeId)
    }

    pub fn rect_of(&self, id: &str) -> Option<Rect> {
        self.find(id).map(|n| self.node(n).rect)
    }

    /// Nodes in pre-order (parents before children, siblings in order).
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let Some(root) = self.root() else { return out };
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &child in self.node(id).children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &LayoutNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }
}
