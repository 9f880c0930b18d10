//! Runtime Core - one update/render cycle over every subsystem
//!
//! ```text
//!            ┌──────────── InputReader (blocking task) ────────────┐
//!            │ Platform::read_input → InputDecoder → bounded queue │
//!            └──────────────────────────┬──────────────────────────┘
//!                                       ▼
//! Start ──► loop { update: drain queue → Keymap → dispatch (bracketed by
//!                          StateTracker before/after)
//!                  render: relayout → paint → DiffRenderer → Platform }
//!       ──► Stop: cancel token, wait for tasks, Platform::close
//! ```
//!
//! The runtime owns every subsystem; nothing is process-global. Built-in
//! subscribers cover focus navigation, undo/redo, resize and quit. Actions
//! nobody claims fall through to the default handler, which forwards them to
//! the focused component (or the component under the mouse).
//!
//! # Example
//!
//! ```ignore
//! let platform = Arc::new(TerminalPlatform::from_config(&config));
//! let runtime = Runtime::new(config, platform)?;
//! runtime.mount(app())?;
//! runtime.run().await?;
//! ```

mod automation;
mod recovery;
mod spawner;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::action::{Action, ActionCategory, ActionType, Payload};
use crate::component::{ActionTarget, Component, ComponentTarget, Element};
use crate::config::RuntimeConfig;
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, Result};
use crate::focus::{FocusManager, FocusNode};
use crate::input::{Backpressure, InputReader, Keymap, RawInput};
use crate::layout::{Constraints, Content, Layout, LayoutEngine, LayoutNode, LayoutTree, NodeId};
use crate::platform::Platform;
use crate::renderer::{Buffer, DiffRenderer};
use crate::state::{Snapshot, StateTracker};
use crate::types::{Point, Size};

pub use automation::{Automation, Selector};
pub use recovery::{CrashReport, install_panic_hook, panic_message};
pub use spawner::TaskSpawner;

// =============================================================================
// SHARED STATE
// =============================================================================

/// Mounted components in tree order.
#[derive(Default)]
struct Registry {
    by_id: HashMap<String, Arc<dyn Component>>,
    order: Vec<String>,
}

/// The parts built-in handlers and the snapshot source need.
struct Shared {
    components: RwLock<Registry>,
    focus: RwLock<FocusManager>,
    layout: RwLock<Layout>,
    size: RwLock<Size>,
}

impl Shared {
    fn component(&self, id: &str) -> Option<Arc<dyn Component>> {
        self.components.read().by_id.get(id).cloned()
    }

    fn capture(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        {
            let registry = self.components.read();
            let layout = self.layout.read();
            for id in &registry.order {
                let Some(component) = registry.by_id.get(id) else { continue };
                let mut state = component.state();
                state.rect = layout.rect(id).unwrap_or_default();
                state.visible = component.is_visible();
                state.disabled = component.is_disabled();
                snapshot.insert(id.clone(), state);
            }
        }
        let focus = self.focus.read();
        snapshot.focus_path = focus.focus_path().to_vec();
        snapshot.modal_stack = focus.traps().iter().map(|t| t.id.clone()).collect();
        snapshot
    }

    /// Deliver pending focus changes to the components involved.
    fn notify_focus(&self) {
        let changes = self.focus.write().take_changes();
        for change in changes {
            if let Some(from) = change.from.as_deref().and_then(|id| self.component(id)) {
                if let Some(f) = from.as_focusable() {
                    f.on_focus_changed(false);
                }
            }
            if let Some(to) = change.to.as_deref().and_then(|id| self.component(id)) {
                if let Some(f) = to.as_focusable() {
                    f.on_focus_changed(true);
                }
            }
        }
    }

    /// Topmost visible component containing `point`.
    fn hit_test(&self, point: Point) -> Option<String> {
        let registry = self.components.read();
        let layout = self.layout.read();
        layout
            .boxes
            .iter()
            .rev()
            .find(|b| {
                b.rect.contains(point)
                    && registry.by_id.get(&b.id).is_some_and(|c| c.is_visible())
            })
            .map(|b| b.id.clone())
    }

    /// Push a snapshot back into the live components and focus.
    fn restore(&self, snapshot: &Snapshot) {
        let components: Vec<_> = {
            let registry = self.components.read();
            snapshot
                .components
                .iter()
                .filter_map(|(id, state)| registry.by_id.get(id).map(|c| (c.clone(), state.clone())))
                .collect()
        };
        for (component, state) in components {
            component.restore(&state);
        }
        {
            let mut focus = self.focus.write();
            match snapshot.focused() {
                Some(id) => {
                    focus.focus_specific(id);
                }
                None => {
                    focus.blur();
                }
            }
        }
        self.notify_focus();
    }
}

fn content_of(component: &dyn Component, available: Size) -> Content {
    match component.as_measurable() {
        Some(m) => Content::Fixed(m.measure(available)),
        None => Content::None,
    }
}

fn is_focusable(component: &dyn Component) -> bool {
    component.is_visible()
        && !component.is_disabled()
        && component.as_focusable().is_some_and(|f| f.is_focusable())
}

// =============================================================================
// RUNTIME
// =============================================================================

pub struct Runtime {
    config: RuntimeConfig,
    platform: Arc<dyn Platform>,
    shared: Arc<Shared>,
    engine: LayoutEngine,
    tree: RwLock<Option<LayoutTree>>,
    dispatcher: Arc<Dispatcher>,
    keymap: RwLock<Keymap>,
    state: Arc<StateTracker>,
    renderer: Mutex<DiffRenderer>,
    backpressure: Backpressure,
    input_tx: mpsc::Sender<RawInput>,
    input_rx: Mutex<mpsc::Receiver<RawInput>>,
    spawner: TaskSpawner,
    running: Arc<AtomicBool>,
    /// Ids registered as dispatcher targets by the last mount.
    mounted_targets: Mutex<Vec<String>>,
    frames: AtomicU64,
    skipped_frames: AtomicU64,
}

impl Runtime {
    pub fn new(config: RuntimeConfig, platform: Arc<dyn Platform>) -> Result<Self> {
        config.validate()?;
        let size = platform.size()?;

        let shared = Arc::new(Shared {
            components: RwLock::new(Registry::default()),
            focus: RwLock::new(FocusManager::new()),
            layout: RwLock::new(Layout::default()),
            size: RwLock::new(size),
        });

        let state = {
            let shared = shared.clone();
            Arc::new(StateTracker::new(config.history_capacity).with_source(move || shared.capture()))
        };

        let dispatcher = Arc::new(Dispatcher::new());
        dispatcher.set_log_unhandled(config.log_unhandled);

        let (input_tx, input_rx) = mpsc::channel(config.input_queue_capacity);

        let runtime = Self {
            engine: LayoutEngine::new(config.layout_cache_capacity),
            platform,
            shared,
            tree: RwLock::new(None),
            dispatcher,
            keymap: RwLock::new(Keymap::with_defaults()),
            state,
            renderer: Mutex::new(DiffRenderer::new()),
            backpressure: Backpressure::new(),
            input_tx,
            input_rx: Mutex::new(input_rx),
            spawner: TaskSpawner::new(),
            running: Arc::new(AtomicBool::new(true)),
            mounted_targets: Mutex::new(Vec::new()),
            frames: AtomicU64::new(0),
            skipped_frames: AtomicU64::new(0),
            config,
        };
        runtime.install_builtins();
        Ok(runtime)
    }

    // =========================================================================
    // BUILT-IN HANDLERS
    // =========================================================================

    fn install_builtins(&self) {
        use ActionType::*;

        for action_type in [FocusNext, FocusPrev, FocusFirst, FocusLast, FocusUp, FocusDown, FocusLeft, FocusRight] {
            let shared = self.shared.clone();
            self.dispatcher.subscribe(action_type, move |action| {
                let moved = {
                    let mut focus = shared.focus.write();
                    match action.action_type {
                        FocusNext => focus.focus_next(),
                        FocusPrev => focus.focus_prev(),
                        FocusFirst => focus.focus_first(),
                        FocusLast => focus.focus_last(),
                        other => other
                            .focus_direction()
                            .is_some_and(|d| focus.focus_direction(d)),
                    }
                };
                shared.notify_focus();
                Ok(moved)
            });
        }

        // Nothing to undo lets the action reach the focused component.
        for action_type in [Undo, Redo] {
            let shared = self.shared.clone();
            let state = self.state.clone();
            self.dispatcher.subscribe(action_type, move |action| {
                let moved = match action.action_type {
                    Undo => state.undo(),
                    _ => state.redo(),
                };
                if moved {
                    shared.restore(&state.current());
                }
                Ok(moved)
            });
        }

        let shared = self.shared.clone();
        self.dispatcher.subscribe(Resize, move |action| match &action.payload {
            Payload::Size(size) => {
                *shared.size.write() = *size;
                log::debug!("resized to {}x{}", size.width, size.height);
                Ok(true)
            }
            other => Err(EngineError::InvalidPayload {
                expected: "size",
                actual: other.kind_name().to_string(),
            }),
        });

        let running = self.running.clone();
        let token = self.spawner.token();
        self.dispatcher.subscribe(Quit, move |_| {
            log::info!("quit requested");
            running.store(false, Ordering::SeqCst);
            token.cancel();
            Ok(true)
        });

        let shared = self.shared.clone();
        self.dispatcher.set_default_handler(move |action| {
            // A named target was already tried by the dispatcher.
            if action.target.is_some() {
                return Ok(false);
            }
            let id = match action.payload.position() {
                Some(point) if action.action_type.category() == ActionCategory::Mouse => {
                    let Some(hit) = shared.hit_test(point) else {
                        return Ok(false);
                    };
                    if matches!(action.action_type, Click | MouseDown) {
                        let focused = shared.focus.write().focus_specific(&hit);
                        if focused {
                            shared.notify_focus();
                        }
                    }
                    hit
                }
                _ => match shared.focus.read().focused() {
                    Some(id) => id.to_string(),
                    None => return Ok(false),
                },
            };
            let Some(component) = shared.component(&id) else {
                return Ok(false);
            };
            if component.is_disabled() {
                return Ok(false);
            }
            ComponentTarget::new(component).handle_action(action)
        });
    }

    // =========================================================================
    // MOUNT
    // =========================================================================

    /// Replace the component tree. Layout and focus trees are rebuilt from
    /// scratch, dispatcher targets re-registered, history cleared.
    pub fn mount(&self, root: Element) -> Result<()> {
        let size = *self.shared.size.read();
        let mut registry = Registry::default();
        let mut focus_nodes = Vec::new();
        let mut tree: Option<LayoutTree> = None;
        let mut node_ids: HashMap<String, NodeId> = HashMap::new();
        let mut duplicate: Option<String> = None;

        root.walk(&mut |el, parent| {
            let id = el.id().to_string();
            if registry.by_id.contains_key(&id) {
                duplicate.get_or_insert(id);
                return;
            }
            let component = el.component.clone();
            let node = LayoutNode::new(id.clone(), component.type_tag())
                .with_style(el.style.clone())
                .with_content(content_of(component.as_ref(), size));

            let node_id = match (parent.and_then(|p| node_ids.get(p).copied()), tree.as_mut()) {
                (Some(parent_node), Some(tree)) => Some(tree.add_child(parent_node, node)),
                _ => {
                    let new_tree = LayoutTree::new(node);
                    let root = new_tree.root();
                    tree = Some(new_tree);
                    root
                }
            };
            if let Some(node_id) = node_id {
                node_ids.insert(id.clone(), node_id);
            }

            focus_nodes.push(if is_focusable(component.as_ref()) {
                FocusNode::focusable(id.clone(), parent)
            } else {
                FocusNode::container(id.clone(), parent)
            });
            registry.order.push(id.clone());
            registry.by_id.insert(id, component);
        });

        if let Some(id) = duplicate {
            return Err(EngineError::NotAllowed(format!("duplicate component id {id}")));
        }

        {
            let mut mounted = self.mounted_targets.lock();
            for id in mounted.drain(..) {
                self.dispatcher.unregister_target(&id);
            }
            for id in &registry.order {
                if let Some(component) = registry.by_id.get(id) {
                    if component.as_action_target().is_some() {
                        self.dispatcher
                            .register_target(id.clone(), Arc::new(ComponentTarget::new(component.clone())));
                        mounted.push(id.clone());
                    }
                }
            }
        }

        let count = registry.order.len();
        *self.shared.components.write() = registry;
        self.shared.focus.write().set_tree(focus_nodes);
        self.shared.notify_focus();

        *self.tree.write() = tree;
        self.engine.invalidate_all();
        self.relayout();
        self.renderer.lock().invalidate();

        self.state.reset(self.state.capture());
        log::info!("mounted {count} components");
        Ok(())
    }

    /// Refresh leaf sizes and recompute layout for the current terminal size.
    pub fn relayout(&self) -> Layout {
        let size = *self.shared.size.read();
        let layout = {
            let mut guard = self.tree.write();
            let Some(tree) = guard.as_mut() else {
                return Layout::default();
            };

            let mut changed = Vec::new();
            {
                let registry = self.shared.components.read();
                for node_id in tree.preorder() {
                    let Some(node) = tree.get_mut(node_id) else { continue };
                    let Some(component) = registry.by_id.get(&node.id) else { continue };
                    let content = content_of(component.as_ref(), size);
                    if content != node.content {
                        node.content = content;
                        changed.push(node.id.clone());
                    }
                }
            }
            for id in &changed {
                self.engine.invalidate_node(id);
            }
            self.engine.layout(tree, Constraints::tight(size))
        };

        let geometry = layout.boxes.iter().map(|b| (b.id.clone(), b.rect)).collect();
        self.shared.focus.write().set_geometry(geometry);
        *self.shared.layout.write() = layout.clone();
        layout
    }

    // =========================================================================
    // UPDATE
    // =========================================================================

    /// Dispatch one action. Anything but undo/redo is bracketed by the state
    /// tracker, so a change it causes becomes one history entry.
    pub fn dispatch(&self, action: &Action) -> Result<bool> {
        if action.action_type.is_history() {
            return self.dispatcher.dispatch(action);
        }
        let before = self.state.before_action();
        let result = self.dispatcher.dispatch(action);
        self.state.after_action(before);
        result
    }

    /// Drain queued input and dispatch what it maps to. Returns the number
    /// of actions dispatched.
    pub fn update(&self) -> usize {
        let inputs: Vec<RawInput> = {
            let mut rx = self.input_rx.lock();
            std::iter::from_fn(|| rx.try_recv().ok()).collect()
        };

        let mut dispatched = 0;
        for raw in inputs {
            let Some(action) = self.keymap.read().translate(&raw) else {
                continue;
            };
            dispatched += 1;
            if let Err(e) = self.dispatch(&action) {
                log::warn!("{:?} failed: {e}", action.action_type);
            }
        }
        dispatched
    }

    /// Queue raw input as if the platform had produced it.
    pub fn inject_input(&self, input: RawInput) -> Result<()> {
        self.input_tx.try_send(input).map_err(|e| {
            if matches!(e, mpsc::error::TrySendError::Full(_)) {
                self.backpressure.raise();
            }
            EngineError::NotAllowed(format!("input queue: {e}"))
        })
    }

    // =========================================================================
    // RENDER
    // =========================================================================

    /// Paint every visible component and write the changed cells. Returns
    /// false when the frame was skipped because the input queue backed up.
    pub fn render(&self) -> Result<bool> {
        if self.backpressure.take() {
            self.skipped_frames.fetch_add(1, Ordering::Relaxed);
            log::trace!("input queue backed up, skipping frame");
            return Ok(false);
        }

        let size = *self.shared.size.read();
        let layout = self.relayout();
        let mut buffer = Buffer::new(size.width, size.height);

        let paintables: Vec<_> = {
            let registry = self.shared.components.read();
            layout
                .boxes
                .iter()
                .filter_map(|b| registry.by_id.get(&b.id).map(|c| (c.clone(), b.rect)))
                .collect()
        };
        for (component, rect) in paintables {
            if !component.is_visible() {
                continue;
            }
            let Some(painter) = component.as_paintable() else { continue };
            if let Some(area) = rect.intersect(&buffer.area()) {
                painter.paint(&mut buffer, area);
            }
        }

        let output = self.renderer.lock().render(&buffer);
        if let Some(output) = output {
            self.platform.write_string(&output)?;
        }
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Start → repeat { update; render } → stop. Returns after `stop`, a
    /// `Quit` action, or a task panic. The terminal is restored either way.
    /// A stopped runtime cannot be started again.
    pub async fn run(&self) -> Result<()> {
        if self.config.install_panic_hook {
            install_panic_hook(&self.config);
        }
        self.platform.init()?;
        if let Ok(size) = self.platform.size() {
            *self.shared.size.write() = size;
        }
        self.start_input();
        log::info!("runtime started");

        let result = self.main_loop().await;

        if let Err(e) = self.spawner.shutdown(self.config.shutdown_timeout()).await {
            log::warn!("shutdown incomplete: {e}");
        }
        let closed = self.platform.close();
        log::info!(
            "runtime stopped after {} frames ({} skipped)",
            self.frames(),
            self.skipped_frames()
        );
        result?;
        if let Some(panic) = self.spawner.take_panic() {
            return Err(panic);
        }
        closed?;
        Ok(())
    }

    async fn main_loop(&self) -> Result<()> {
        let token = self.spawner.token();
        let mut ticker = tokio::time::interval(self.config.tick_rate());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while self.is_running() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = token.cancelled() => break,
            }
            self.update();
            if !self.is_running() {
                break;
            }
            self.render()?;
        }
        Ok(())
    }

    fn start_input(&self) {
        let reader = InputReader::new(
            self.platform.clone(),
            self.input_tx.clone(),
            self.backpressure.clone(),
            self.config.input_poll(),
            self.config.input_push_timeout(),
        );
        let handle = tokio::runtime::Handle::current();
        self.spawner.spawn_blocking("input", move |token| reader.run(token, handle));
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.spawner.token().cancel();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && !self.spawner.is_cancelled()
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn state(&self) -> &Arc<StateTracker> {
        &self.state
    }

    pub fn spawner(&self) -> &TaskSpawner {
        &self.spawner
    }

    pub fn backpressure(&self) -> &Backpressure {
        &self.backpressure
    }

    pub fn with_keymap<R>(&self, f: impl FnOnce(&mut Keymap) -> R) -> R {
        f(&mut self.keymap.write())
    }

    /// Mutate focus directly. Components are told about the change afterwards.
    pub fn with_focus<R>(&self, f: impl FnOnce(&mut FocusManager) -> R) -> R {
        let result = f(&mut self.shared.focus.write());
        self.shared.notify_focus();
        result
    }

    pub fn focused(&self) -> Option<String> {
        self.shared.focus.read().focused().map(str::to_string)
    }

    pub fn component(&self, id: &str) -> Option<Arc<dyn Component>> {
        self.shared.component(id)
    }

    /// Mounted component ids in tree order.
    pub fn component_ids(&self) -> Vec<String> {
        self.shared.components.read().order.clone()
    }

    pub fn layout(&self) -> Layout {
        self.shared.layout.read().clone()
    }

    pub fn size(&self) -> Size {
        *self.shared.size.read()
    }

    /// Fresh snapshot of the live UI.
    pub fn capture(&self) -> Snapshot {
        self.shared.capture()
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn skipped_frames(&self) -> u64 {
        self.skipped_frames.load(Ordering::Relaxed)
    }

    pub fn automation(self: &Arc<Self>) -> Automation {
        Automation::new(self.clone())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::component::{Focusable, Measurable, Paintable};
    use crate::input::{KeyCode, KeyEvent, Modifier};
    use crate::layout::Style;
    use crate::platform::HeadlessPlatform;
    use crate::renderer::CellStyle;
    use crate::state::ComponentState;
    use crate::types::Rect;
    use serde_json::Value;
    use std::time::Duration;

    pub(crate) struct Field {
        id: String,
        pub(crate) value: Mutex<String>,
        pub(crate) focused: AtomicBool,
        pub(crate) disabled: AtomicBool,
    }

    impl Field {
        pub(crate) fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                value: Mutex::new(String::new()),
                focused: AtomicBool::new(false),
                disabled: AtomicBool::new(false),
            })
        }
    }

    impl Component for Field {
        fn id(&self) -> &str {
            &self.id
        }
        fn type_tag(&self) -> &str {
            "input"
        }
        fn is_disabled(&self) -> bool {
            self.disabled.load(Ordering::SeqCst)
        }
        fn state(&self) -> ComponentState {
            ComponentState::new("input")
                .with_prop("label", self.id.clone())
                .with_state("value", self.value.lock().clone())
        }
        fn restore(&self, state: &ComponentState) {
            if let Some(Value::String(v)) = state.get_state("value") {
                *self.value.lock() = v.clone();
            }
        }
        fn as_measurable(&self) -> Option<&dyn Measurable> {
            Some(self)
        }
        fn as_focusable(&self) -> Option<&dyn Focusable> {
            Some(self)
        }
        fn as_paintable(&self) -> Option<&dyn Paintable> {
            Some(self)
        }
        fn as_action_target(&self) -> Option<&dyn ActionTarget> {
            Some(self)
        }
    }

    impl Measurable for Field {
        fn measure(&self, _available: Size) -> Size {
            Size::new(10, 1)
        }
    }

    impl Focusable for Field {
        fn on_focus_changed(&self, focused: bool) {
            self.focused.store(focused, Ordering::SeqCst);
        }
    }

    impl Paintable for Field {
        fn paint(&self, buffer: &mut Buffer, area: Rect) {
            buffer.set_string(area.x, area.y, &self.value.lock(), CellStyle::default(), area.width);
        }
    }

    impl ActionTarget for Field {
        fn handle_action(&self, action: &Action) -> Result<bool> {
            match action.action_type {
                ActionType::InputChar => {
                    self.value.lock().push(action.expect_char()?);
                    Ok(true)
                }
                ActionType::DeleteBackward => Ok(self.value.lock().pop().is_some()),
                _ => Ok(false),
            }
        }
    }

    pub(crate) struct Panel {
        id: String,
    }

    impl Panel {
        pub(crate) fn new(id: &str) -> Arc<Self> {
            Arc::new(Self { id: id.to_string() })
        }
    }

    impl Component for Panel {
        fn id(&self) -> &str {
            &self.id
        }
        fn type_tag(&self) -> &str {
            "panel"
        }
        fn state(&self) -> ComponentState {
            ComponentState::new("panel")
        }
    }

    /// root (column) ─┬─ a
    ///                └─ b
    pub(crate) fn setup_with(config: RuntimeConfig) -> (Arc<Runtime>, Arc<HeadlessPlatform>, Arc<Field>, Arc<Field>) {
        let platform = Arc::new(HeadlessPlatform::new(20, 5));
        let runtime = Arc::new(Runtime::new(config, platform.clone()).unwrap());
        let a = Field::new("a");
        let b = Field::new("b");
        runtime
            .mount(
                Element::new(Panel::new("root"))
                    .with_style(Style::column())
                    .child(Element::new(a.clone()))
                    .child(Element::new(b.clone())),
            )
            .unwrap();
        (runtime, platform, a, b)
    }

    pub(crate) fn setup() -> (Arc<Runtime>, Arc<HeadlessPlatform>, Arc<Field>, Arc<Field>) {
        setup_with(RuntimeConfig::default())
    }

    #[test]
    fn test_mount_builds_every_tree() {
        let (runtime, _, _, _) = setup();
        assert_eq!(runtime.component_ids(), vec!["root", "a", "b"]);
        assert!(runtime.dispatcher().has_target("a"));
        assert!(!runtime.dispatcher().has_target("root"));

        let layout = runtime.layout();
        assert_eq!(layout.rect("root"), Some(Rect::new(0, 0, 20, 5)));
        assert_eq!(layout.rect("a"), Some(Rect::new(0, 0, 20, 1)));
        assert_eq!(layout.rect("b"), Some(Rect::new(0, 1, 20, 1)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let platform = Arc::new(HeadlessPlatform::new(20, 5));
        let runtime = Runtime::new(RuntimeConfig::default(), platform).unwrap();
        let err = runtime
            .mount(Element::new(Panel::new("root")).child(Element::new(Field::new("root"))))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotAllowed);
    }

    #[test]
    fn test_focus_actions_notify_components() {
        let (runtime, _, a, b) = setup();
        assert!(runtime.dispatch(&Action::new(ActionType::FocusNext)).unwrap());
        assert_eq!(runtime.focused().as_deref(), Some("a"));
        assert!(a.focused.load(Ordering::SeqCst));

        runtime.dispatch(&Action::new(ActionType::FocusDown)).unwrap();
        assert_eq!(runtime.focused().as_deref(), Some("b"));
        assert!(!a.focused.load(Ordering::SeqCst));
        assert!(b.focused.load(Ordering::SeqCst));
    }

    #[test]
    fn test_default_handler_reaches_focused() {
        let (runtime, _, a, _) = setup();
        assert!(!runtime.dispatch(&Action::input_char('x')).unwrap());

        runtime.with_focus(|f| f.focus_specific("a"));
        assert!(runtime.dispatch(&Action::input_char('x')).unwrap());
        assert_eq!(*a.value.lock(), "x");
    }

    #[test]
    fn test_click_focuses_hit_component() {
        let (runtime, _, _, b) = setup();
        let click = Action::new(ActionType::Click).with_payload(Payload::Mouse {
            position: Point::new(3, 1),
            button: None,
        });
        runtime.dispatch(&click).unwrap();
        assert_eq!(runtime.focused().as_deref(), Some("b"));
        assert!(b.focused.load(Ordering::SeqCst));
    }

    #[test]
    fn test_undo_redo_restores_components() {
        let (runtime, _, a, _) = setup();
        runtime.with_focus(|f| f.focus_specific("a"));
        runtime.dispatch(&Action::input_char('x')).unwrap();
        runtime.dispatch(&Action::input_char('y')).unwrap();
        assert_eq!(runtime.state().history_len(), 2);

        assert!(runtime.dispatch(&Action::new(ActionType::Undo)).unwrap());
        assert_eq!(*a.value.lock(), "x");
        assert!(runtime.dispatch(&Action::new(ActionType::Redo)).unwrap());
        assert_eq!(*a.value.lock(), "xy");
        assert_eq!(runtime.state().history_len(), 2);
    }

    #[test]
    fn test_undo_leaves_earlier_focus_alone() {
        let (runtime, _, a, _) = setup();
        runtime.with_focus(|f| f.focus_specific("a"));
        runtime.dispatch(&Action::input_char('x')).unwrap();

        assert!(runtime.dispatch(&Action::new(ActionType::Undo)).unwrap());
        assert_eq!(*a.value.lock(), "");
        assert_eq!(runtime.focused().as_deref(), Some("a"));
        assert!(a.focused.load(Ordering::SeqCst));
    }

    #[test]
    fn test_disabled_target_is_not_allowed() {
        let (runtime, _, a, _) = setup();
        a.disabled.store(true, Ordering::SeqCst);
        let err = runtime
            .dispatch(&Action::input_char('x').with_target("a"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotAllowed);
    }

    #[test]
    fn test_render_writes_only_changes() {
        let (runtime, platform, a, _) = setup();
        *a.value.lock() = "hello".into();
        assert!(runtime.render().unwrap());
        assert!(platform.take_output().contains("hello"));

        assert!(runtime.render().unwrap());
        assert_eq!(platform.take_output(), "");
        assert_eq!(runtime.frames(), 2);
    }

    #[test]
    fn test_update_drains_injected_input() {
        let (runtime, _, a, _) = setup();
        runtime.with_focus(|f| f.focus_specific("a"));
        runtime
            .inject_input(RawInput::Key(KeyEvent::new(KeyCode::Char('q'), Modifier::NONE)))
            .unwrap();
        assert_eq!(runtime.update(), 1);
        assert_eq!(*a.value.lock(), "q");
        assert_eq!(runtime.update(), 0);
    }

    #[test]
    fn test_full_queue_skips_a_frame() {
        let config = RuntimeConfig {
            input_queue_capacity: 1,
            ..RuntimeConfig::default()
        };
        let (runtime, _, _, _) = setup_with(config);
        let key = RawInput::Focus(true);
        runtime.inject_input(key.clone()).unwrap();
        assert!(runtime.inject_input(key).is_err());

        assert!(!runtime.render().unwrap());
        assert_eq!(runtime.skipped_frames(), 1);
        assert!(runtime.render().unwrap());
    }

    #[test]
    fn test_resize_relayouts() {
        let (runtime, _, _, _) = setup();
        runtime
            .dispatch(&Action::new(ActionType::Resize).with_payload(Payload::Size(Size::new(30, 6))))
            .unwrap();
        runtime.render().unwrap();
        assert_eq!(runtime.layout().rect("a"), Some(Rect::new(0, 0, 30, 1)));
    }

    #[test]
    fn test_quit_stops() {
        let (runtime, _, _, _) = setup();
        assert!(runtime.is_running());
        runtime.dispatch(&Action::new(ActionType::Quit)).unwrap();
        assert!(!runtime.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_task_panic_fails_run() {
        let config = RuntimeConfig {
            tick_rate_ms: 5,
            input_poll_ms: 5,
            install_panic_hook: false,
            ..RuntimeConfig::default()
        };
        let (runtime, platform, _, _) = setup_with(config);
        runtime.spawner().spawn("worker", |_| async {
            panic!("worker failed");
        });

        let err = tokio::time::timeout(Duration::from_secs(5), runtime.run())
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Panicked);
        assert!(err.to_string().contains("worker failed"));
        assert!(!runtime.is_running());
        assert!(!platform.is_initialized());
    }
}
