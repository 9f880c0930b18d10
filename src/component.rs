//! Component capabilities.
//!
//! A widget implements [`Component`] plus whichever capability traits apply.
//! The runtime asks each component once per pass which capabilities it has
//! (`as_measurable`, `as_focusable`, ...) instead of probing ad hoc.
//!
//! ```text
//! Component ─┬─ Measurable   → layout leaf size
//!            ├─ Focusable    → focus tree membership
//!            ├─ Paintable    → render step
//!            └─ ActionTarget → dispatcher target
//! ```

use std::sync::Arc;

use crate::action::Action;
use crate::error::{EngineError, Result};
use crate::layout::Style;
use crate::renderer::Buffer;
use crate::state::ComponentState;
use crate::types::{Rect, Size};

pub trait Component: Send + Sync {
    fn id(&self) -> &str;

    fn type_tag(&self) -> &str;

    fn is_disabled(&self) -> bool {
        false
    }

    fn is_visible(&self) -> bool {
        true
    }

    /// Current props and state, captured into snapshots.
    fn state(&self) -> ComponentState;

    /// Put the component back into a previously captured state (undo/redo).
    fn restore(&self, _state: &ComponentState) {}

    fn as_measurable(&self) -> Option<&dyn Measurable> {
        None
    }

    fn as_focusable(&self) -> Option<&dyn Focusable> {
        None
    }

    fn as_paintable(&self) -> Option<&dyn Paintable> {
        None
    }

    fn as_action_target(&self) -> Option<&dyn ActionTarget> {
        None
    }
}

pub trait Measurable {
    /// Desired content size given the space available.
    fn measure(&self, available: Size) -> Size;
}

pub trait Focusable {
    fn is_focusable(&self) -> bool {
        true
    }

    fn on_focus_changed(&self, _focused: bool) {}
}

pub trait Paintable {
    fn paint(&self, buffer: &mut Buffer, area: Rect);
}

/// Receives dispatched actions. `Ok(true)` means handled.
pub trait ActionTarget: Send + Sync {
    fn handle_action(&self, action: &Action) -> Result<bool>;
}

impl<F> ActionTarget for F
where
    F: Fn(&Action) -> Result<bool> + Send + Sync,
{
    fn handle_action(&self, action: &Action) -> Result<bool> {
        self(action)
    }
}

/// Dispatcher target that routes to a component's [`ActionTarget`]
/// capability and refuses actions while the component is disabled.
pub struct ComponentTarget {
    component: Arc<dyn Component>,
}

impl ComponentTarget {
    pub fn new(component: Arc<dyn Component>) -> Self {
        Self { component }
    }
}

impl ActionTarget for ComponentTarget {
    fn handle_action(&self, action: &Action) -> Result<bool> {
        if self.component.is_disabled() {
            return Err(EngineError::NotAllowed(format!(
                "{} is disabled",
                self.component.id()
            )));
        }
        match self.component.as_action_target() {
            Some(target) => target.handle_action(action),
            None => Ok(false),
        }
    }
}

/// A component with its layout style and children, ready to mount.
#[derive(Clone)]
pub struct Element {
    pub component: Arc<dyn Component>,
    pub style: Style,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(component: Arc<dyn Component>) -> Self {
        Self {
            component,
            style: Style::default(),
            children: Vec::new(),
        }
    }

    pub fn with_style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Element>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn id(&self) -> &str {
        self.component.id()
    }

    /// Visit this element and its descendants in tree order with their parent id.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Element, Option<&'a str>)) {
        fn go<'a>(
            el: &'a Element,
            parent: Option<&'a str>,
            visit: &mut impl FnMut(&'a Element, Option<&'a str>),
        ) {
            visit(el, parent);
            for child in &el.children {
                go(child, Some(el.id()), visit);
            }
        }
        go(self, None, visit);
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.component.id())
            .field("type", &self.component.type_tag())
            .field("children", &self.children)
            .finish()
    }
}
