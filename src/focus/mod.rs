//! Focus System - keyboard navigation and focus state
//!
//! Manages:
//! - A stack of [`FocusScope`]s, each with its own focused id and focus path
//! - An overlay stack of [`FocusTrap`]s restricting navigation to a subtree
//! - Sequential (Tab/Shift+Tab) and geometric (arrow) navigation
//! - Focus history for restoration after blur or closing a trap
//!
//! Nothing here returns errors. Every navigation call reports whether focus
//! landed somewhere; an empty focusable set is simply `false`.
//!
//! # Example
//!
//! ```ignore
//! use spark_runtime::focus::{FocusManager, FocusNode};
//!
//! let mut focus = FocusManager::new();
//! focus.set_tree(vec![
//!     FocusNode::container("root", None),
//!     FocusNode::focusable("name", Some("root")),
//!     FocusNode::focusable("email", Some("root")),
//! ]);
//! focus.focus_next();
//! assert_eq!(focus.focused(), Some("name"));
//! ```

mod scope;
mod spatial;

use std::collections::{HashMap, VecDeque};

use crate::types::{Direction, Rect};

pub use scope::{FocusScope, FocusTrap, TrapKind};
pub use spatial::find_best_candidate;

const MAX_HISTORY: usize = 10;

/// Id of the scope that is always at the bottom of the stack.
pub const ROOT_SCOPE: &str = "root";

/// One entry of the focus tree, in tree order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusNode {
    pub id: String,
    pub parent: Option<String>,
    pub focusable: bool,
}

impl FocusNode {
    pub fn focusable(id: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            parent: parent.map(str::to_string),
            focusable: true,
        }
    }

    pub fn container(id: impl Into<String>, parent: Option<&str>) -> Self {
        Self {
            id: id.into(),
            parent: parent.map(str::to_string),
            focusable: false,
        }
    }
}

/// Focused id before and after a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusChange {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug)]
pub struct FocusManager {
    nodes: Vec<FocusNode>,
    index: HashMap<String, usize>,
    geometry: HashMap<String, Rect>,
    scopes: Vec<FocusScope>,
    traps: Vec<FocusTrap>,
    history: VecDeque<String>,
    changes: Vec<FocusChange>,
}

impl Default for FocusManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FocusManager {
    pub fn new() -> Self {
        let mut root = FocusScope::new(ROOT_SCOPE, "", false);
        root.active = true;
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            geometry: HashMap::new(),
            scopes: vec![root],
            traps: Vec::new(),
            history: VecDeque::new(),
            changes: Vec::new(),
        }
    }

    // =========================================================================
    // TREE
    // =========================================================================

    /// Replace the whole focus tree. Scope focusable lists are rebuilt, and
    /// focus on ids that disappeared is dropped.
    pub fn set_tree(&mut self, nodes: Vec<FocusNode>) {
        self.index = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
        self.nodes = nodes;

        let root_id = self.nodes.first().map(|n| n.id.clone()).unwrap_or_default();
        if let Some(root) = self.scopes.first_mut() {
            root.root_id = root_id;
        }

        let before = self.focused().map(str::to_string);
        let mut scopes = std::mem::take(&mut self.scopes);
        scopes.retain(|s| s.id == ROOT_SCOPE || self.index.contains_key(&s.root_id));
        for scope in &mut scopes {
            self.refresh_scope(scope);
        }
        self.scopes = scopes;
        self.mark_active_scope();

        let dropped = self.traps.len();
        self.traps.retain(|t| self.index.contains_key(&t.root));
        if self.traps.len() != dropped {
            log::debug!("focus: dropped {} traps whose root left the tree", dropped - self.traps.len());
        }

        self.history.retain(|id| self.index.contains_key(id));
        let after = self.focused().map(str::to_string);
        if before != after {
            self.changes.push(FocusChange { from: before, to: after });
        }
    }

    pub fn set_geometry(&mut self, geometry: HashMap<String, Rect>) {
        self.geometry = geometry;
    }

    pub fn set_rect(&mut self, id: impl Into<String>, rect: Rect) {
        self.geometry.insert(id.into(), rect);
    }

    fn refresh_scope(&self, scope: &mut FocusScope) {
        scope.focusables = self
            .nodes
            .iter()
            .filter(|n| n.focusable && self.is_within(&n.id, &scope.root_id))
            .map(|n| n.id.clone())
            .collect();
        if let Some(focused) = &scope.focused {
            if !scope.focusables.contains(focused) {
                scope.focused = None;
            }
        }
        scope.focus_path = match &scope.focused {
            Some(id) => self.path_between(&scope.root_id, id),
            None => Vec::new(),
        };
    }

    /// True when `id` is `ancestor` or sits below it.
    pub fn is_within(&self, id: &str, ancestor: &str) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self
                .index
                .get(cur)
                .and_then(|&i| self.nodes[i].parent.as_deref());
        }
        false
    }

    fn path_between(&self, root: &str, id: &str) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(cur) = current {
            path.push(cur.to_string());
            if cur == root {
                break;
            }
            current = self
                .index
                .get(cur)
                .and_then(|&i| self.nodes[i].parent.as_deref());
        }
        path.reverse();
        path
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn focused(&self) -> Option<&str> {
        self.active_scope().and_then(|s| s.focused.as_deref())
    }

    pub fn is_focused(&self, id: &str) -> bool {
        self.focused() == Some(id)
    }

    pub fn focus_path(&self) -> &[String] {
        self.active_scope().map(|s| s.focus_path.as_slice()).unwrap_or(&[])
    }

    pub fn active_scope(&self) -> Option<&FocusScope> {
        self.scopes.last()
    }

    pub fn scopes(&self) -> &[FocusScope] {
        &self.scopes
    }

    pub fn is_focusable(&self, id: &str) -> bool {
        self.effective_focusables().iter().any(|f| f == id)
    }

    /// Focusable ids navigation may currently visit: the active scope's list,
    /// narrowed to the active trap's subtree if there is one.
    pub fn effective_focusables(&self) -> Vec<String> {
        let Some(scope) = self.active_scope() else {
            return Vec::new();
        };
        match self.active_trap() {
            Some(trap) => scope
                .focusables
                .iter()
                .filter(|id| self.is_within(id, &trap.root))
                .cloned()
                .collect(),
            None => scope.focusables.clone(),
        }
    }

    /// Focus changes since the last call, oldest first.
    pub fn take_changes(&mut self) -> Vec<FocusChange> {
        std::mem::take(&mut self.changes)
    }

    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    // =========================================================================
    // NAVIGATION
    // =========================================================================

    pub fn focus_next(&mut self) -> bool {
        self.step(1)
    }

    pub fn focus_prev(&mut self) -> bool {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> bool {
        let focusables = self.effective_focusables();
        if focusables.is_empty() {
            return false;
        }
        let len = focusables.len() as isize;
        let next = match self.focused().and_then(|f| focusables.iter().position(|id| id == f)) {
            Some(pos) => (pos as isize + delta).rem_euclid(len) as usize,
            None if delta > 0 => 0,
            None => focusables.len() - 1,
        };
        self.set_focus(focusables[next].clone());
        true
    }

    pub fn focus_first(&mut self) -> bool {
        match self.effective_focusables().into_iter().next() {
            Some(id) => {
                self.set_focus(id);
                true
            }
            None => false,
        }
    }

    pub fn focus_last(&mut self) -> bool {
        match self.effective_focusables().pop() {
            Some(id) => {
                self.set_focus(id);
                true
            }
            None => false,
        }
    }

    /// Focus `id` directly. False, with focus untouched, if it is not
    /// reachable under the current scope and trap.
    pub fn focus_specific(&mut self, id: &str) -> bool {
        if !self.is_focusable(id) {
            return false;
        }
        self.set_focus(id.to_string());
        true
    }

    /// Geometric move. With nothing focused this focuses the first entry.
    pub fn focus_direction(&mut self, direction: Direction) -> bool {
        let focusables = self.effective_focusables();
        if focusables.is_empty() {
            return false;
        }
        let Some(current) = self.focused().map(str::to_string) else {
            return self.focus_first();
        };
        let Some(&from) = self.geometry.get(&current) else {
            return false;
        };

        let candidates = focusables
            .iter()
            .filter(|id| **id != current)
            .filter_map(|id| self.geometry.get(id).map(|r| (id.as_str(), *r)));
        let Some(best) = find_best_candidate(from, direction, candidates).map(str::to_string) else {
            return false;
        };
        self.set_focus(best);
        true
    }

    /// Clear focus in the active scope. False if nothing was focused.
    pub fn blur(&mut self) -> bool {
        let Some(current) = self.focused().map(str::to_string) else {
            return false;
        };
        self.remember(current.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.focused = None;
            scope.focus_path.clear();
        }
        self.changes.push(FocusChange { from: Some(current), to: None });
        true
    }

    /// Return focus to the most recent history entry that is still reachable.
    pub fn restore_focus(&mut self) -> bool {
        while let Some(id) = self.history.pop_back() {
            if self.is_focusable(&id) {
                self.apply_focus(id);
                return true;
            }
        }
        false
    }

    fn set_focus(&mut self, id: String) {
        if self.focused() == Some(id.as_str()) {
            return;
        }
        if let Some(current) = self.focused().map(str::to_string) {
            self.remember(current);
        }
        self.apply_focus(id);
    }

    fn apply_focus(&mut self, id: String) {
        let from = self.focused().map(str::to_string);
        if from.as_deref() == Some(id.as_str()) {
            return;
        }
        let Some(root_id) = self.active_scope().map(|s| s.root_id.clone()) else {
            return;
        };
        let path = self.path_between(&root_id, &id);
        if let Some(scope) = self.scopes.last_mut() {
            scope.focused = Some(id.clone());
            scope.focus_path = path;
        }
        log::trace!("focus: {from:?} -> {id}");
        self.changes.push(FocusChange { from, to: Some(id) });
    }

    fn remember(&mut self, id: String) {
        if self.history.back() == Some(&id) {
            return;
        }
        self.history.push_back(id);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }
    }

    // =========================================================================
    // SCOPES
    // =========================================================================

    /// Open a scope rooted at `root_id` and focus its first focusable.
    pub fn push_scope(&mut self, id: impl Into<String>, root_id: impl Into<String>, modal: bool) {
        let before = self.focused().map(str::to_string);
        let mut scope = FocusScope::new(id, root_id, modal);
        self.refresh_scope(&mut scope);
        self.scopes.push(scope);
        self.mark_active_scope();

        let first = self.effective_focusables().into_iter().next();
        if let Some(first) = first {
            if let Some(prev) = before.clone() {
                self.remember(prev);
            }
            self.apply_focus(first);
        } else if before.is_some() {
            self.changes.push(FocusChange { from: before, to: None });
        }
    }

    /// Close the active scope. The root scope stays.
    pub fn pop_scope(&mut self) -> Option<FocusScope> {
        if self.scopes.len() <= 1 {
            return None;
        }
        let before = self.focused().map(str::to_string);
        let mut popped = self.scopes.pop()?;
        popped.active = false;
        self.mark_active_scope();

        let after = self.focused().map(str::to_string);
        if before != after {
            self.changes.push(FocusChange { from: before, to: after });
        }
        Some(popped)
    }

    fn mark_active_scope(&mut self) {
        let top = self.scopes.len().saturating_sub(1);
        for (i, scope) in self.scopes.iter_mut().enumerate() {
            scope.active = i == top;
        }
    }

    // =========================================================================
    // TRAPS
    // =========================================================================

    pub fn active_trap(&self) -> Option<&FocusTrap> {
        self.traps.last()
    }

    pub fn traps(&self) -> &[FocusTrap] {
        &self.traps
    }

    /// Active means top of the stack, checked on every call.
    pub fn is_trap_active(&self, id: &str) -> bool {
        self.active_trap().is_some_and(|t| t.id == id)
    }

    /// Push a trap. Focus moves inside it if it is currently outside.
    pub fn push_trap(&mut self, trap: FocusTrap) -> bool {
        if !self.index.contains_key(&trap.root) {
            log::debug!("focus: trap {} has unknown root {}", trap.id, trap.root);
            return false;
        }
        self.traps.push(trap);
        self.settle_into_trap();
        true
    }

    /// Pop the top trap; the previous one becomes active again.
    pub fn pop_trap(&mut self) -> Option<FocusTrap> {
        let trap = self.traps.pop()?;
        self.after_trap_removed();
        Some(trap)
    }

    /// Remove a trap anywhere in the stack.
    pub fn remove_trap(&mut self, id: &str) -> Option<FocusTrap> {
        let pos = self.traps.iter().position(|t| t.id == id)?;
        let was_top = pos + 1 == self.traps.len();
        let trap = self.traps.remove(pos);
        if was_top {
            self.after_trap_removed();
        }
        Some(trap)
    }

    fn settle_into_trap(&mut self) {
        let inside = self.focused().is_some_and(|f| self.is_focusable(f));
        if !inside {
            self.focus_first();
        }
    }

    fn after_trap_removed(&mut self) {
        if self.focused().is_some_and(|f| self.is_focusable(f)) {
            return;
        }
        if !self.restore_focus() {
            self.focus_first();
        }
    }
}
