//! State Module - snapshots, diffs and undo history
//!
//! - **Snapshot** - independent copy of every component's observable state
//! - **Diff** - added/removed/changed ids with per-field detail
//! - **StateTracker** - current snapshot, bounded undo/redo, change subscribers
//!
//! # Example
//!
//! ```ignore
//! let tracker = StateTracker::new(100).with_source(move || capture(&components));
//!
//! let before = tracker.before_action();
//! dispatcher.dispatch(&action)?;
//! tracker.after_action(before);   // records history only if something changed
//!
//! tracker.undo();
//! ```

mod diff;
mod snapshot;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::types::SubscriptionId;

pub use diff::{Diff, compute_diff};
pub use snapshot::{ComponentState, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Update,
    Undo,
    Redo,
}

/// Delivered to subscribers after every committed change.
#[derive(Debug, Clone)]
pub struct StateChange {
    pub kind: ChangeKind,
    pub diff: Diff,
    pub current: Snapshot,
}

pub type StateSubscriber = Arc<dyn Fn(&StateChange) + Send + Sync>;
pub type SnapshotSource = Arc<dyn Fn() -> Snapshot + Send + Sync>;

struct History {
    current: Snapshot,
    past: VecDeque<Snapshot>,
    future: Vec<Snapshot>,
    capacity: usize,
}

pub struct StateTracker {
    history: RwLock<History>,
    source: RwLock<Option<SnapshotSource>>,
    subscribers: RwLock<Vec<(SubscriptionId, StateSubscriber)>>,
    next_id: AtomicU64,
}

impl StateTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: RwLock::new(History {
                current: Snapshot::new(),
                past: VecDeque::new(),
                future: Vec::new(),
                capacity: capacity.max(1),
            }),
            source: RwLock::new(None),
            subscribers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Where fresh snapshots come from in [`after_action`](Self::after_action).
    pub fn with_source(self, source: impl Fn() -> Snapshot + Send + Sync + 'static) -> Self {
        self.set_source(source);
        self
    }

    pub fn set_source(&self, source: impl Fn() -> Snapshot + Send + Sync + 'static) {
        *self.source.write() = Some(Arc::new(source));
    }

    /// Capture from the source, or copy the current snapshot if there is none.
    pub fn capture(&self) -> Snapshot {
        let source = self.source.read().clone();
        match source {
            Some(source) => source(),
            None => self.current(),
        }
    }

    pub fn current(&self) -> Snapshot {
        self.history.read().current.clone()
    }

    /// Replace the current snapshot without touching history or notifying.
    pub fn reset(&self, snapshot: Snapshot) {
        let mut history = self.history.write();
        history.current = snapshot;
        history.past.clear();
        history.future.clear();
    }

    // =========================================================================
    // RECORDING
    // =========================================================================

    /// Fresh capture of the live state just before an action runs. Changes
    /// made outside a bracketed action are not folded into its history entry.
    pub fn before_action(&self) -> Snapshot {
        self.capture()
    }

    /// Capture the state after an action. If it differs from `before`,
    /// `before` goes onto the undo stack and the redo stack is cleared.
    /// Returns whether anything was recorded.
    pub fn after_action(&self, before: Snapshot) -> bool {
        let fresh = self.capture();
        self.record(before, fresh)
    }

    /// Install `snapshot` as current, recording the previous state if it differs.
    pub fn commit(&self, snapshot: Snapshot) -> bool {
        let before = self.current();
        self.record(before, snapshot)
    }

    fn record(&self, before: Snapshot, fresh: Snapshot) -> bool {
        let change = {
            let mut history = self.history.write();
            if before.same_content(&fresh) {
                history.current = fresh;
                None
            } else {
                let diff = compute_diff(&before, &fresh);
                history.past.push_back(before);
                while history.past.len() > history.capacity {
                    history.past.pop_front();
                }
                history.future.clear();
                history.current = fresh.clone();
                Some(StateChange {
                    kind: ChangeKind::Update,
                    diff,
                    current: fresh,
                })
            }
        };
        match change {
            Some(change) => {
                self.notify(&change);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // UNDO / REDO
    // =========================================================================

    pub fn undo(&self) -> bool {
        let change = {
            let mut history = self.history.write();
            let Some(previous) = history.past.pop_back() else {
                return false;
            };
            let current = std::mem::replace(&mut history.current, previous);
            let diff = compute_diff(&current, &history.current);
            history.future.push(current);
            StateChange {
                kind: ChangeKind::Undo,
                diff,
                current: history.current.clone(),
            }
        };
        self.notify(&change);
        true
    }

    pub fn redo(&self) -> bool {
        let change = {
            let mut history = self.history.write();
            let Some(next) = history.future.pop() else {
                return false;
            };
            let current = std::mem::replace(&mut history.current, next);
            let diff = compute_diff(&current, &history.current);
            history.past.push_back(current);
            while history.past.len() > history.capacity {
                history.past.pop_front();
            }
            StateChange {
                kind: ChangeKind::Redo,
                diff,
                current: history.current.clone(),
            }
        };
        self.notify(&change);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.history.read().past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.history.read().future.is_empty()
    }

    /// Number of undo entries.
    pub fn history_len(&self) -> usize {
        self.history.read().past.len()
    }

    pub fn clear_history(&self) {
        let mut history = self.history.write();
        history.past.clear();
        history.future.clear();
    }

    // =========================================================================
    // SUBSCRIBERS
    // =========================================================================

    pub fn subscribe(&self, f: impl Fn(&StateChange) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push((id, Arc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    /// Runs with no tracker lock held, so subscribers may read the tracker.
    fn notify(&self, change: &StateChange) {
        let subs: Vec<StateSubscriber> = self.subscribers.read().iter().map(|(_, f)| f.clone()).collect();
        for sub in subs {
            sub(change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn snap_with(value: &str) -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert("field", ComponentState::new("input").with_state("value", value));
        snap
    }

    fn setup() -> (Arc<StateTracker>, Arc<Mutex<String>>) {
        let live = Arc::new(Mutex::new(String::new()));
        let source = live.clone();
        let tracker = StateTracker::new(3).with_source(move || snap_with(&source.lock()));
        tracker.reset(snap_with(""));
        (Arc::new(tracker), live)
    }

    #[test]
    fn test_bracket_records_change() {
        let (tracker, live) = setup();
        let before = tracker.before_action();
        live.lock().push('a');
        assert!(tracker.after_action(before));
        assert_eq!(tracker.history_len(), 1);
        assert_eq!(
            tracker.current().get("field").unwrap().get_state("value"),
            Some(&json!("a"))
        );
    }

    #[test]
    fn test_unchanged_records_nothing() {
        let (tracker, _) = setup();
        let before = tracker.before_action();
        assert!(!tracker.after_action(before));
        assert_eq!(tracker.history_len(), 0);
    }

    #[test]
    fn test_undo_redo_undo() {
        let (tracker, live) = setup();
        for ch in ['a', 'b'] {
            let before = tracker.before_action();
            live.lock().push(ch);
            tracker.after_action(before);
        }
        let pre_undo = tracker.current();

        assert!(tracker.undo());
        let after_undo = tracker.current();
        assert!(tracker.redo());
        assert!(tracker.current().same_content(&pre_undo));
        assert!(tracker.undo());
        assert!(tracker.current().same_content(&after_undo));
        assert_eq!(
            after_undo.get("field").unwrap().get_state("value"),
            Some(&json!("a"))
        );
    }

    #[test]
    fn test_undo_keeps_changes_made_between_actions() {
        let (tracker, live) = setup();
        live.lock().push('a');

        let before = tracker.before_action();
        live.lock().push('b');
        assert!(tracker.after_action(before));

        assert!(tracker.undo());
        assert_eq!(
            tracker.current().get("field").unwrap().get_state("value"),
            Some(&json!("a"))
        );
    }

    #[test]
    fn test_empty_stacks() {
        let tracker = StateTracker::new(10);
        assert!(!tracker.undo());
        assert!(!tracker.redo());
        assert!(!tracker.can_undo());
        assert!(!tracker.can_redo());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (tracker, live) = setup();
        for ch in "abcde".chars() {
            let before = tracker.before_action();
            live.lock().push(ch);
            tracker.after_action(before);
        }
        assert_eq!(tracker.history_len(), 3);
        while tracker.undo() {}
        assert_eq!(
            tracker.current().get("field").unwrap().get_state("value"),
            Some(&json!("ab"))
        );
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let (tracker, live) = setup();
        let before = tracker.before_action();
        live.lock().push('a');
        tracker.after_action(before);
        tracker.undo();
        assert!(tracker.can_redo());

        assert!(tracker.commit(snap_with("z")));
        assert!(!tracker.can_redo());
    }

    #[test]
    fn test_subscribers_in_order() {
        let (tracker, live) = setup();
        let log = Arc::new(Mutex::new(Vec::new()));
        let l1 = log.clone();
        let first = tracker.subscribe(move |c| l1.lock().push((1, c.kind)));
        let l2 = log.clone();
        tracker.subscribe(move |c| l2.lock().push((2, c.kind)));

        let before = tracker.before_action();
        live.lock().push('a');
        tracker.after_action(before);
        tracker.undo();
        tracker.redo();

        assert_eq!(
            *log.lock(),
            vec![
                (1, ChangeKind::Update),
                (2, ChangeKind::Update),
                (1, ChangeKind::Undo),
                (2, ChangeKind::Undo),
                (1, ChangeKind::Redo),
                (2, ChangeKind::Redo),
            ]
        );

        assert!(tracker.unsubscribe(first));
        assert!(!tracker.unsubscribe(first));
    }

    #[test]
    fn test_subscriber_can_read_tracker() {
        let (tracker, live) = setup();
        let seen = Arc::new(Mutex::new(0usize));
        let (t, s) = (Arc::downgrade(&tracker), seen.clone());
        tracker.subscribe(move |_| {
            if let Some(t) = t.upgrade() {
                *s.lock() = t.history_len();
            }
        });
        let before = tracker.before_action();
        live.lock().push('q');
        tracker.after_action(before);
        assert_eq!(*seen.lock(), 1);
    }
}
