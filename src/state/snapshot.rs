//! Point-in-time UI state.
//!
//! A [`Snapshot`] owns all of its data, so a clone is fully independent of
//! the live components it was captured from. Snapshots serialize to a JSON
//! document with the same shape as the struct.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::Rect;

use super::diff::{Diff, compute_diff};

/// Observable state of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentState {
    #[serde(rename = "type")]
    pub component_type: String,
    #[serde(default)]
    pub props: BTreeMap<String, Value>,
    #[serde(default)]
    pub state: BTreeMap<String, Value>,
    #[serde(default)]
    pub rect: Rect,
    pub visible: bool,
    pub disabled: bool,
}

impl ComponentState {
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            props: BTreeMap::new(),
            state: BTreeMap::new(),
            rect: Rect::default(),
            visible: true,
            disabled: false,
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_state(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.state.insert(key.into(), value.into());
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn get_state(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn get_prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentState>,
    #[serde(default)]
    pub focus_path: Vec<String>,
    #[serde(default)]
    pub modal_stack: Vec<String>,
    #[serde(default)]
    pub dirty_regions: Vec<Rect>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            components: BTreeMap::new(),
            focus_path: Vec::new(),
            modal_stack: Vec::new(),
            dirty_regions: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, id: impl Into<String>, state: ComponentState) {
        self.components.insert(id.into(), state);
    }

    pub fn get(&self, id: &str) -> Option<&ComponentState> {
        self.components.get(id)
    }

    pub fn focused(&self) -> Option<&str> {
        self.focus_path.last().map(String::as_str)
    }

    /// Equal in everything a user could observe: components, focus, modals
    /// and metadata. Timestamps and dirty regions are ignored.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.components == other.components
            && self.focus_path == other.focus_path
            && self.modal_stack == other.modal_stack
            && self.metadata == other.metadata
    }

    pub fn diff(&self, after: &Snapshot) -> Diff {
        compute_diff(self, after)
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    /// Introspection form of the snapshot.
    pub fn to_map(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Write to `<path>.tmp`, sync, then rename over `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let tmp = tmp_path(path);
        let json = self.to_json()?;

        let mut file = File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, path)?;
        log::debug!("snapshot saved to {}", path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = fs::read_to_string(path)?;
        Self::from_json(&source)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
