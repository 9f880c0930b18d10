//! Snapshot comparison.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::snapshot::{ComponentState, Snapshot};

/// What changed between two snapshots. Derived only.
///
/// Field names are `type`, `rect`, `visible`, `disabled`, `props.<key>` and
/// `state.<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Diff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub changed: Vec<String>,
    pub fields: BTreeMap<String, Vec<String>>,
    pub focus_changed: bool,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty() && !self.focus_changed
    }

    pub fn changed_fields(&self, id: &str) -> &[String] {
        self.fields.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub fn compute_diff(before: &Snapshot, after: &Snapshot) -> Diff {
    let mut diff = Diff::default();

    for (id, new) in &after.components {
        match before.components.get(id) {
            None => diff.added.push(id.clone()),
            Some(old) => {
                let fields = changed_fields(old, new);
                if !fields.is_empty() {
                    diff.changed.push(id.clone());
                    diff.fields.insert(id.clone(), fields);
                }
            }
        }
    }
    for id in before.components.keys() {
        if !after.components.contains_key(id) {
            diff.removed.push(id.clone());
        }
    }

    diff.focus_changed = before.focus_path != after.focus_path;
    diff
}

fn changed_fields(old: &ComponentState, new: &ComponentState) -> Vec<String> {
    let mut fields = Vec::new();
    if old.component_type != new.component_type {
        fields.push("type".to_string());
    }
    if old.rect != new.rect {
        fields.push("rect".to_string());
    }
    if old.visible != new.visible {
        fields.push("visible".to_string());
    }
    if old.disabled != new.disabled {
        fields.push("disabled".to_string());
    }
    map_changes("props", &old.props, &new.props, &mut fields);
    map_changes("state", &old.state, &new.state, &mut fields);
    fields
}

fn map_changes(
    prefix: &str,
    old: &BTreeMap<String, Value>,
    new: &BTreeMap<String, Value>,
    out: &mut Vec<String>,
) {
    let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for key in keys {
        if old.get(key) != new.get(key) {
            out.push(format!("{prefix}.{key}"));
        }
    }
}
