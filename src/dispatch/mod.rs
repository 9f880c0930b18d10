//! Action Dispatcher - priority-ordered routing
//!
//! Resolution order for one [`Dispatcher::dispatch`] call, first "handled"
//! wins:
//!
//! ```text
//! 1. subscribers for the action's type (registration order)
//! 2. the registered target named by action.target
//! 3. the default handler
//! ```
//!
//! The registries are read once at the start of a call, so a dispatch sees
//! one consistent view even if another thread registers concurrently.
//! Handlers run with no registry lock held and may register or dispatch
//! themselves.
//!
//! An action nobody handles is not an error: `dispatch` returns `Ok(false)`
//! and the caller decides what that means.

mod composite;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::action::{Action, ActionType};
use crate::component::ActionTarget;
use crate::error::{EngineError, Result};
use crate::types::SubscriptionId;

pub use composite::{
    Bounded, Concurrent, Fallback, FnUnit, Retry, Sequential, Timeout, Unit, UnitRef, bounded,
    concurrent, fallback, retry, sequential, timeout, unit_fn,
};

/// Subscriber callback. `Ok(true)` stops the chain.
pub type Handler = Arc<dyn Fn(&Action) -> Result<bool> + Send + Sync>;

pub struct Dispatcher {
    subscribers: RwLock<HashMap<ActionType, Vec<(SubscriptionId, Handler)>>>,
    targets: RwLock<HashMap<String, Arc<dyn ActionTarget>>>,
    default_handler: RwLock<Option<Handler>>,
    next_id: AtomicU64,
    unhandled: AtomicU64,
    log_unhandled: AtomicBool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            targets: RwLock::new(HashMap::new()),
            default_handler: RwLock::new(None),
            next_id: AtomicU64::new(0),
            unhandled: AtomicU64::new(0),
            log_unhandled: AtomicBool::new(true),
        }
    }

    pub fn set_log_unhandled(&self, enabled: bool) {
        self.log_unhandled.store(enabled, Ordering::Relaxed);
    }

    // =========================================================================
    // REGISTRATION
    // =========================================================================

    /// Subscribe to every action of one type.
    pub fn subscribe<F>(&self, action_type: ActionType, handler: F) -> SubscriptionId
    where
        F: Fn(&Action) -> Result<bool> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .write()
            .entry(action_type)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.write();
        let mut removed = false;
        for list in subs.values_mut() {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id);
            removed |= list.len() != before;
        }
        subs.retain(|_, list| !list.is_empty());
        removed
    }

    /// Register (or replace) the target for `id`.
    pub fn register_target(&self, id: impl Into<String>, target: Arc<dyn ActionTarget>) {
        self.targets.write().insert(id.into(), target);
    }

    pub fn unregister_target(&self, id: &str) -> bool {
        self.targets.write().remove(id).is_some()
    }

    pub fn has_target(&self, id: &str) -> bool {
        self.targets.read().contains_key(id)
    }

    pub fn clear_targets(&self) {
        self.targets.write().clear();
    }

    pub fn set_default_handler<F>(&self, handler: F)
    where
        F: Fn(&Action) -> Result<bool> + Send + Sync + 'static,
    {
        *self.default_handler.write() = Some(Arc::new(handler));
    }

    pub fn clear_default_handler(&self) {
        *self.default_handler.write() = None;
    }

    // =========================================================================
    // DISPATCH
    // =========================================================================

    /// Route `action` through subscribers, target, then default handler.
    ///
    /// Returns `Ok(true)` if something handled it and `Ok(false)` if nothing
    /// did. A handler error stops the chain and is returned as is.
    pub fn dispatch(&self, action: &Action) -> Result<bool> {
        let subscribers: Vec<Handler> = self
            .subscribers
            .read()
            .get(&action.action_type)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default();
        let target = action
            .target
            .as_deref()
            .and_then(|t| self.targets.read().get(t).cloned());
        let default = self.default_handler.read().clone();

        for handler in subscribers {
            if handler(action)? {
                return Ok(true);
            }
        }

        if let Some(target) = target {
            if target.handle_action(action)? {
                return Ok(true);
            }
        } else if let Some(t) = &action.target {
            log::debug!("dispatch: no target registered for {t}");
        }

        if let Some(default) = default {
            if default(action)? {
                return Ok(true);
            }
        }

        self.unhandled.fetch_add(1, Ordering::Relaxed);
        if self.log_unhandled.load(Ordering::Relaxed) {
            log::debug!(
                "unhandled action {:?} (target: {:?}, source: {:?})",
                action.action_type,
                action.target,
                action.source
            );
        }
        Ok(false)
    }

    /// Number of actions that went unhandled so far.
    pub fn unhandled_count(&self) -> u64 {
        self.unhandled.load(Ordering::Relaxed)
    }

    /// Wrap a dispatch of `action` as a composable unit. An unhandled
    /// action counts as a failure so it can trigger a fallback or retry.
    pub fn unit(self: &Arc<Self>, action: Action) -> UnitRef {
        Arc::new(DispatchUnit {
            dispatcher: self.clone(),
            action,
        })
    }
}

struct DispatchUnit {
    dispatcher: Arc<Dispatcher>,
    action: Action,
}

#[async_trait]
impl Unit for DispatchUnit {
    async fn run(&self, _cancel: &CancellationToken) -> Result<()> {
        if self.dispatcher.dispatch(&self.action)? {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!(
                "handler for {:?}",
                self.action.action_type
            )))
        }
    }

    fn name(&self) -> &str {
        "dispatch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Payload;
    use crate::error::ErrorKind;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn setup() -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
        (Dispatcher::new(), Arc::new(Mutex::new(Vec::new())))
    }

    fn recording_target(log: &Arc<Mutex<Vec<String>>>, name: &str, handled: bool) -> Arc<dyn ActionTarget> {
        let log = log.clone();
        let name = name.to_string();
        Arc::new(move |_: &Action| {
            log.lock().push(name.clone());
            Ok(handled)
        })
    }

    #[test]
    fn test_subscriber_preempts_target() {
        let (dispatcher, log) = setup();
        let l = log.clone();
        dispatcher.subscribe(ActionType::Submit, move |_| {
            l.lock().push("global".into());
            Ok(true)
        });
        dispatcher.register_target("t1", recording_target(&log, "t1", true));

        let handled = dispatcher
            .dispatch(&Action::new(ActionType::Submit).with_target("t1"))
            .unwrap();
        assert!(handled);
        assert_eq!(*log.lock(), vec!["global"]);
    }

    #[test]
    fn test_order_subscribers_target_default() {
        let (dispatcher, log) = setup();
        let l = log.clone();
        dispatcher.subscribe(ActionType::Submit, move |_| {
            l.lock().push("sub".into());
            Ok(false)
        });
        dispatcher.register_target("t1", recording_target(&log, "t1", false));
        let l = log.clone();
        dispatcher.set_default_handler(move |_| {
            l.lock().push("default".into());
            Ok(true)
        });

        let handled = dispatcher
            .dispatch(&Action::new(ActionType::Submit).with_target("t1"))
            .unwrap();
        assert!(handled);
        assert_eq!(*log.lock(), vec!["sub", "t1", "default"]);
    }

    #[test]
    fn test_subscribers_run_in_registration_order() {
        let (dispatcher, log) = setup();
        for name in ["first", "second", "third"] {
            let l = log.clone();
            dispatcher.subscribe(ActionType::Redraw, move |_| {
                l.lock().push(name.into());
                Ok(name == "second")
            });
        }
        assert!(dispatcher.dispatch(&Action::new(ActionType::Redraw)).unwrap());
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_unhandled_is_not_an_error() {
        let (dispatcher, _) = setup();
        assert!(!dispatcher.dispatch(&Action::new(ActionType::Tick)).unwrap());
        assert!(!dispatcher
            .dispatch(&Action::new(ActionType::Submit).with_target("nobody"))
            .unwrap());
        assert_eq!(dispatcher.unhandled_count(), 2);
    }

    #[test]
    fn test_handler_error_stops_chain() {
        let (dispatcher, log) = setup();
        dispatcher.subscribe(ActionType::InputChar, |a| a.expect_char().map(|_| false));
        dispatcher.set_default_handler({
            let l = log.clone();
            move |_| {
                l.lock().push("default".into());
                Ok(true)
            }
        });
        let bad = Action::new(ActionType::InputChar).with_payload(Payload::Text("x".into()));
        let err = dispatcher.dispatch(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPayload);
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_unsubscribe_and_unregister() {
        let (dispatcher, log) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let id = dispatcher.subscribe(ActionType::Quit, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        });
        assert!(dispatcher.dispatch(&Action::new(ActionType::Quit)).unwrap());
        assert!(dispatcher.unsubscribe(id));
        assert!(!dispatcher.unsubscribe(id));
        assert!(!dispatcher.dispatch(&Action::new(ActionType::Quit)).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        dispatcher.register_target("t", recording_target(&log, "t", true));
        assert!(dispatcher.has_target("t"));
        assert!(dispatcher.unregister_target("t"));
        assert!(!dispatcher.has_target("t"));
    }

    #[test]
    fn test_handler_may_reenter() {
        let dispatcher = Arc::new(Dispatcher::new());
        let weak = Arc::downgrade(&dispatcher);
        dispatcher.subscribe(ActionType::Submit, move |_| {
            let d = weak.upgrade().unwrap();
            d.register_target("late", Arc::new(|_: &Action| Ok(true)));
            Ok(false)
        });
        dispatcher.dispatch(&Action::new(ActionType::Submit)).unwrap();
        assert!(dispatcher.has_target("late"));
    }

    #[tokio::test]
    async fn test_dispatch_unit() {
        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.register_target("ok", Arc::new(|_: &Action| Ok(true)));
        let token = CancellationToken::new();

        let handled = dispatcher.unit(Action::new(ActionType::Submit).with_target("ok"));
        assert!(handled.run(&token).await.is_ok());

        let missing = dispatcher.unit(Action::new(ActionType::Submit).with_target("missing"));
        let err = missing.run(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
