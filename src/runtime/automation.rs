//! Automation - programmatic control with parity to human input
//!
//! Everything here ends in [`Runtime::dispatch`], so a test script and a
//! user at the keyboard exercise the same code paths and produce the same
//! history entries.
//!
//! Selectors:
//!
//! | Form            | Matches                                   |
//! |-----------------|-------------------------------------------|
//! | `#name`         | component id `name`                       |
//! | `input`         | every component with type tag `input`     |
//! | `[label=Name]`  | a prop or state key equal to the value    |

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use crate::action::{Action, ActionType, Payload};
use crate::error::{EngineError, Result};
use crate::input::MouseButton;
use crate::state::{ComponentState, Snapshot, StateChange};
use crate::types::{Direction, SubscriptionId};

use super::Runtime;

const SOURCE: &str = "automation";

// =============================================================================
// SELECTOR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Id(String),
    Type(String),
    Attr { key: String, value: String },
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let invalid = || EngineError::InvalidPayload {
            expected: "selector",
            actual: text.to_string(),
        };

        if let Some(id) = text.strip_prefix('#') {
            return if is_word(id) { Ok(Self::Id(id.to_string())) } else { Err(invalid()) };
        }
        if let Some(inner) = text.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
            let (key, value) = inner.split_once('=').ok_or_else(invalid)?;
            let key = key.trim();
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            if !is_word(key) {
                return Err(invalid());
            }
            return Ok(Self::Attr {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
        if is_word(text) {
            Ok(Self::Type(text.to_string()))
        } else {
            Err(invalid())
        }
    }

    pub fn matches(&self, id: &str, state: &ComponentState) -> bool {
        match self {
            Self::Id(want) => id == want,
            Self::Type(tag) => state.component_type == *tag,
            Self::Attr { key, value } => match key.as_str() {
                "visible" => state.visible.to_string() == *value,
                "disabled" => state.disabled.to_string() == *value,
                _ => state
                    .get_prop(key)
                    .or_else(|| state.get_state(key))
                    .is_some_and(|v| value_text(v) == *value),
            },
        }
    }
}

impl FromStr for Selector {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "#{id}"),
            Self::Type(tag) => f.write_str(tag),
            Self::Attr { key, value } => write!(f, "[{key}={value}]"),
        }
    }
}

fn is_word(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// =============================================================================
// AUTOMATION
// =============================================================================

#[derive(Clone)]
pub struct Automation {
    runtime: Arc<Runtime>,
}

impl Automation {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        Self { runtime }
    }

    // ---- Lookup ----

    /// Ids matching `selector`, in tree order.
    pub fn find(&self, selector: &str) -> Result<Vec<String>> {
        let selector = Selector::parse(selector)?;
        let snapshot = self.runtime.capture();
        Ok(self
            .runtime
            .component_ids()
            .into_iter()
            .filter(|id| snapshot.get(id).is_some_and(|s| selector.matches(id, s)))
            .collect())
    }

    pub fn find_one(&self, selector: &str) -> Result<String> {
        self.find(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NotFound(selector.to_string()))
    }

    /// One state value of the first component matching `selector`.
    pub fn query_state(&self, selector: &str, key: &str) -> Result<Value> {
        let id = self.find_one(selector)?;
        self.runtime
            .capture()
            .get(&id)
            .and_then(|s| s.get_state(key).cloned())
            .ok_or_else(|| EngineError::NotFound(format!("{id}.{key}")))
    }

    pub fn focused(&self) -> Option<String> {
        self.runtime.focused()
    }

    // ---- Actions ----

    /// Dispatch with an up-front check that a named target exists.
    pub fn dispatch(&self, action: Action) -> Result<bool> {
        if let Some(target) = &action.target {
            if !self.runtime.dispatcher().has_target(target) {
                return Err(EngineError::NotFound(target.clone()));
            }
        }
        let action = match action.source {
            Some(_) => action,
            None => action.with_source(SOURCE),
        };
        self.runtime.dispatch(&action)
    }

    pub fn focus(&self, selector: &str) -> Result<bool> {
        let id = self.find_one(selector)?;
        Ok(self.runtime.with_focus(|f| f.focus_specific(&id)))
    }

    /// Left click at the center of the component, focusing it first.
    pub fn click(&self, selector: &str) -> Result<bool> {
        let id = self.find_one(selector)?;
        let rect = self
            .runtime
            .layout()
            .rect(&id)
            .ok_or_else(|| EngineError::NotFound(format!("layout for {id}")))?;
        self.runtime.with_focus(|f| f.focus_specific(&id));

        let mut action = Action::new(ActionType::Click)
            .with_payload(Payload::Mouse {
                position: rect.center(),
                button: Some(MouseButton::Left),
            })
            .with_source(SOURCE);
        if self.runtime.dispatcher().has_target(&id) {
            action = action.with_target(id);
        }
        self.runtime.dispatch(&action)
    }

    /// Type `text` into the component one character at a time. Returns how
    /// many characters were accepted.
    pub fn input_text(&self, selector: &str, text: &str) -> Result<usize> {
        let id = self.find_one(selector)?;
        if !self.runtime.dispatcher().has_target(&id) {
            return Err(EngineError::NotFound(id));
        }
        self.runtime.with_focus(|f| f.focus_specific(&id));

        let mut accepted = 0;
        for ch in text.chars() {
            let action = Action::input_char(ch).with_target(id.clone()).with_source(SOURCE);
            if self.runtime.dispatch(&action)? {
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    pub fn navigate(&self, direction: Direction) -> Result<bool> {
        let action = Action::new(ActionType::from_direction(direction)).with_source(SOURCE);
        self.runtime.dispatch(&action)
    }

    // ---- Observation ----

    /// Poll until `condition` holds for a fresh snapshot, or fail with
    /// `Timeout` once `timeout` has passed.
    pub async fn wait_for(
        &self,
        condition: impl Fn(&Snapshot) -> bool,
        timeout: Duration,
    ) -> Result<Snapshot> {
        let deadline = Instant::now() + timeout;
        let poll = self.runtime.config().wait_poll();
        loop {
            let snapshot = self.runtime.capture();
            if condition(&snapshot) {
                return Ok(snapshot);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(EngineError::Timeout(timeout));
            }
            tokio::time::sleep(poll.min(deadline - now)).await;
        }
    }

    pub fn subscribe(&self, f: impl Fn(&StateChange) + Send + Sync + 'static) -> SubscriptionId {
        self.runtime.state().subscribe(f)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.runtime.state().unsubscribe(id)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.runtime.capture()
    }

    /// Snapshot in its structured map form.
    pub fn export(&self) -> Result<Value> {
        self.snapshot().to_map()
    }

    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<()> {
        self.snapshot().save(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::runtime::tests::setup;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_selector_forms() {
        assert_eq!(Selector::parse("#name").unwrap(), Selector::Id("name".into()));
        assert_eq!(Selector::parse("input").unwrap(), Selector::Type("input".into()));
        assert_eq!(
            Selector::parse("[label = \"Full Name\"]").unwrap(),
            Selector::Attr {
                key: "label".into(),
                value: "Full Name".into()
            }
        );
        assert_eq!("#a".parse::<Selector>().unwrap().to_string(), "#a");
    }

    #[test]
    fn test_invalid_selectors() {
        for bad in ["", "#", "[label]", "[=x]", "two words"] {
            let err = Selector::parse(bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidPayload, "{bad}");
        }
    }

    #[test]
    fn test_find() {
        let (runtime, _, _, _) = setup();
        let auto = runtime.automation();
        assert_eq!(auto.find("input").unwrap(), vec!["a", "b"]);
        assert_eq!(auto.find("[label=b]").unwrap(), vec!["b"]);
        assert_eq!(auto.find("[disabled=false]").unwrap().len(), 3);
        assert!(auto.find("#missing").unwrap().is_empty());
        assert_eq!(auto.find_one("#missing").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_input_text_and_query() {
        let (runtime, _, a, _) = setup();
        let auto = runtime.automation();
        assert_eq!(auto.input_text("#a", "hi").unwrap(), 2);
        assert_eq!(*a.value.lock(), "hi");
        assert_eq!(auto.focused().as_deref(), Some("a"));
        assert_eq!(auto.query_state("#a", "value").unwrap(), json!("hi"));
        assert_eq!(auto.query_state("[value=hi]", "value").unwrap(), json!("hi"));
        assert_eq!(auto.query_state("#a", "nope").unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(runtime.state().history_len(), 2);
    }

    #[test]
    fn test_dispatch_unknown_target() {
        let (runtime, _, _, _) = setup();
        let err = runtime
            .automation()
            .dispatch(Action::input_char('x').with_target("ghost"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_click_and_navigate() {
        let (runtime, _, _, _) = setup();
        let auto = runtime.automation();
        auto.click("#b").unwrap();
        assert_eq!(auto.focused().as_deref(), Some("b"));

        assert!(auto.navigate(Direction::Up).unwrap());
        assert_eq!(auto.focused().as_deref(), Some("a"));
        assert!(!auto.navigate(Direction::Up).unwrap());
    }

    #[tokio::test]
    async fn test_wait_for_sees_later_change() {
        let (runtime, _, _, _) = setup();
        let auto = runtime.automation();
        let typist = auto.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            typist.input_text("#b", "ok").unwrap();
        });

        let snapshot = auto
            .wait_for(
                |s| s.get("b").and_then(|c| c.get_state("value")) == Some(&json!("ok")),
                Duration::from_secs(2),
            )
            .await
            .unwrap();
        assert_eq!(snapshot.focused(), Some("b"));
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let (runtime, _, _, _) = setup();
        let err = runtime
            .automation()
            .wait_for(|s| s.components.is_empty(), Duration::from_millis(30))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_subscribe_and_export() {
        let (runtime, _, _, _) = setup();
        let auto = runtime.automation();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let id = auto.subscribe(move |change| s.lock().push(change.diff.changed.clone()));

        auto.input_text("#a", "z").unwrap();
        assert_eq!(seen.lock().len(), 1);
        assert!(seen.lock()[0].contains(&"a".to_string()));
        assert!(auto.unsubscribe(id));

        let map = auto.export().unwrap();
        assert_eq!(map["components"]["a"]["state"]["value"], json!("z"));
    }

    #[test]
    fn test_save_snapshot() {
        let (runtime, _, _, _) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.json");
        runtime.automation().save_snapshot(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap();
        assert!(loaded.get("root").is_some());
    }
}
