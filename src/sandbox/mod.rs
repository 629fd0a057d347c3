//! Widget sandbox runtime.
//!
//! "Sandbox" here scopes naming, not capabilities: each item gets a
//! stylesheet rewritten under its unique attribute selector and a content
//! instance built by a pre-registered [`ContentHandler`] from a restricted
//! binding set (container handle, item id, merged globals, sources).
//! Handler failures are caught at the item boundary; the item degrades to
//! inert instead of failing the grid.

mod style;

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::error::GridError;
use crate::registry::{ItemId, WidgetPayload};
use crate::surface::Surface;

pub use style::scope_stylesheet;

/// Namespace value map, one per tier (surface-wide or per-item).
pub type GlobalMap = Map<String, Value>;

/// Handler key used when a payload carries script source but no `kind`.
pub const DEFAULT_HANDLER_KIND: &str = "script";

/// Opaque token identifying the widget's content container on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHandle {
    pub item: ItemId,
}

/// Restricted binding set handed to a content handler.
///
/// This is everything a widget implementation may see: no registry, no
/// surface, no other items.
pub struct WidgetBindings<'a> {
    pub item_id: ItemId,
    pub container: ContainerHandle,
    pub globals: &'a GlobalMap,
    pub markup: Option<&'a str>,
    pub script: Option<&'a str>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

/// Live widget content with an optional lifecycle-end operation.
pub trait WidgetInstance {
    fn teardown(&mut self) {}
}

/// Host-registered widget implementation, keyed by payload `kind`.
pub trait ContentHandler {
    fn instantiate(
        &self,
        bindings: WidgetBindings<'_>,
    ) -> std::result::Result<Box<dyn WidgetInstance>, HandlerError>;
}

struct SandboxState {
    instance: Option<Box<dyn WidgetInstance>>,
}

/// Outcome of a successful initialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxOutcome {
    /// A live instance (and possibly a style node) is attached.
    Instantiated,
    /// Only passive content (markup/style) was attached; no handler ran.
    Passive,
}

/// Owns all per-item sandbox state, the handler registry, and both global
/// namespace tiers.
#[derive(Default)]
pub struct SandboxRuntime {
    handlers: HashMap<String, Box<dyn ContentHandler>>,
    states: HashMap<ItemId, SandboxState>,
    surface_globals: GlobalMap,
    item_globals: HashMap<ItemId, GlobalMap>,
}

impl SandboxRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler(&mut self, kind: impl Into<String>, handler: Box<dyn ContentHandler>) {
        self.handlers.insert(kind.into(), handler);
    }

    pub fn set_surface_globals(&mut self, globals: GlobalMap) {
        self.surface_globals = globals;
    }

    pub fn surface_globals(&self) -> &GlobalMap {
        &self.surface_globals
    }

    pub fn set_item_globals(&mut self, id: ItemId, globals: GlobalMap) {
        self.item_globals.insert(id, globals);
    }

    pub fn item_globals(&self, id: ItemId) -> Option<&GlobalMap> {
        self.item_globals.get(&id)
    }

    /// Merge the two tiers fresh; per-item entries shadow surface-wide
    /// entries. Never cached — mutations of either tier are visible to the
    /// next (re)initialization.
    pub fn merged_globals(&self, id: ItemId) -> GlobalMap {
        let mut merged = self.surface_globals.clone();
        if let Some(item_tier) = self.item_globals.get(&id) {
            for (key, value) in item_tier {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    pub fn is_sandboxed(&self, id: ItemId) -> bool {
        self.states
            .get(&id)
            .map(|state| state.instance.is_some())
            .unwrap_or(false)
    }

    /// Build (or rebuild) the sandbox for an item.
    ///
    /// Any existing sandbox for the id is torn down first, so teardown
    /// always happens-before the next initialization. On a handler error
    /// the style node stays attached and the error is returned for the
    /// engine to log; the item is left for the caller to mark inert.
    pub fn initialize(
        &mut self,
        id: ItemId,
        payload: &WidgetPayload,
        surface: &mut dyn Surface,
    ) -> std::result::Result<SandboxOutcome, GridError> {
        self.teardown(id, surface);

        if let Some(css) = payload.css.as_deref() {
            if !css.trim().is_empty() {
                let scope = item_scope_selector(id);
                surface.inject_style(id, &scope_stylesheet(css, &scope));
            }
        }
        self.states.insert(id, SandboxState { instance: None });

        let Some(kind) = handler_kind(payload) else {
            return Ok(SandboxOutcome::Passive);
        };

        let Some(handler) = self.handlers.get(kind) else {
            return Err(GridError::HandlerMissing(kind.to_string()));
        };

        let merged = self.merged_globals(id);
        let bindings = WidgetBindings {
            item_id: id,
            container: ContainerHandle { item: id },
            globals: &merged,
            markup: payload.html.as_deref(),
            script: payload.js.as_deref(),
        };

        match handler.instantiate(bindings) {
            Ok(instance) => {
                if let Some(state) = self.states.get_mut(&id) {
                    state.instance = Some(instance);
                }
                Ok(SandboxOutcome::Instantiated)
            }
            Err(err) => Err(GridError::Handler {
                item: id,
                message: err.to_string(),
            }),
        }
    }

    /// Tear down an item's sandbox: lifecycle-end on the instance first,
    /// then the style node. Idempotent; unknown ids are a no-op.
    pub fn teardown(&mut self, id: ItemId, surface: &mut dyn Surface) {
        let Some(mut state) = self.states.remove(&id) else {
            return;
        };
        if let Some(instance) = state.instance.as_mut() {
            instance.teardown();
        }
        surface.remove_style(id);
    }

    /// Drop the per-item globals tier for a removed item.
    pub fn forget_item(&mut self, id: ItemId) {
        self.item_globals.remove(&id);
    }

    /// Tear down every sandbox and both per-item maps; the surface-tier
    /// globals survive unless the caller replaces them.
    pub fn clear(&mut self, surface: &mut dyn Surface) {
        let ids: Vec<ItemId> = self.states.keys().copied().collect();
        for id in ids {
            self.teardown(id, surface);
        }
        self.item_globals.clear();
    }
}

/// Attribute selector uniquely scoping one item's styles.
pub fn item_scope_selector(id: ItemId) -> String {
    format!("[data-grid-item=\"{id}\"]")
}

fn handler_kind(payload: &WidgetPayload) -> Option<&str> {
    payload
        .kind
        .as_deref()
        .or_else(|| payload.js.as_ref().map(|_| DEFAULT_HANDLER_KIND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingInstance {
        teardowns: Rc<Cell<u32>>,
    }

    impl WidgetInstance for CountingInstance {
        fn teardown(&mut self) {
            self.teardowns.set(self.teardowns.get() + 1);
        }
    }

    struct CountingHandler {
        teardowns: Rc<Cell<u32>>,
    }

    impl ContentHandler for CountingHandler {
        fn instantiate(
            &self,
            _bindings: WidgetBindings<'_>,
        ) -> std::result::Result<Box<dyn WidgetInstance>, HandlerError> {
            Ok(Box::new(CountingInstance {
                teardowns: self.teardowns.clone(),
            }))
        }
    }

    struct FailingHandler;

    impl ContentHandler for FailingHandler {
        fn instantiate(
            &self,
            _bindings: WidgetBindings<'_>,
        ) -> std::result::Result<Box<dyn WidgetInstance>, HandlerError> {
            Err(HandlerError("boom".to_string()))
        }
    }

    fn script_payload(js: &str) -> WidgetPayload {
        WidgetPayload {
            js: Some(js.to_string()),
            ..WidgetPayload::default()
        }
    }

    #[test]
    fn initialize_then_teardown_invokes_lifecycle_end() {
        let teardowns = Rc::new(Cell::new(0));
        let mut runtime = SandboxRuntime::new();
        runtime.register_handler(
            DEFAULT_HANDLER_KIND,
            Box::new(CountingHandler {
                teardowns: teardowns.clone(),
            }),
        );
        let mut surface = RecordingSurface::new(600.0);

        let outcome = runtime
            .initialize(1, &script_payload("tick()"), &mut surface)
            .unwrap();
        assert_eq!(outcome, SandboxOutcome::Instantiated);
        assert!(runtime.is_sandboxed(1));

        runtime.teardown(1, &mut surface);
        assert_eq!(teardowns.get(), 1);
        assert!(!runtime.is_sandboxed(1));
    }

    #[test]
    fn teardown_is_idempotent() {
        let teardowns = Rc::new(Cell::new(0));
        let mut runtime = SandboxRuntime::new();
        runtime.register_handler(
            DEFAULT_HANDLER_KIND,
            Box::new(CountingHandler {
                teardowns: teardowns.clone(),
            }),
        );
        let mut surface = RecordingSurface::new(600.0);
        runtime
            .initialize(1, &script_payload("tick()"), &mut surface)
            .unwrap();

        runtime.teardown(1, &mut surface);
        runtime.teardown(1, &mut surface);
        assert_eq!(teardowns.get(), 1);
    }

    #[test]
    fn reinitialize_tears_down_first() {
        let teardowns = Rc::new(Cell::new(0));
        let mut runtime = SandboxRuntime::new();
        runtime.register_handler(
            DEFAULT_HANDLER_KIND,
            Box::new(CountingHandler {
                teardowns: teardowns.clone(),
            }),
        );
        let mut surface = RecordingSurface::new(600.0);

        runtime
            .initialize(1, &script_payload("tick()"), &mut surface)
            .unwrap();
        runtime
            .initialize(1, &script_payload("tock()"), &mut surface)
            .unwrap();
        assert_eq!(teardowns.get(), 1);
        assert!(runtime.is_sandboxed(1));
    }

    #[test]
    fn handler_error_leaves_style_attached() {
        let mut runtime = SandboxRuntime::new();
        runtime.register_handler(DEFAULT_HANDLER_KIND, Box::new(FailingHandler));
        let mut surface = RecordingSurface::new(600.0);

        let payload = WidgetPayload {
            css: Some(".a { color: red }".to_string()),
            js: Some("boom".to_string()),
            ..WidgetPayload::default()
        };
        let err = runtime.initialize(1, &payload, &mut surface).unwrap_err();
        assert!(matches!(err, GridError::Handler { item: 1, .. }));
        assert!(surface.style_of(1).is_some());
        assert!(!runtime.is_sandboxed(1));
    }

    #[test]
    fn missing_handler_is_reported() {
        let mut runtime = SandboxRuntime::new();
        let mut surface = RecordingSurface::new(600.0);
        let payload = WidgetPayload {
            kind: Some("gauge".to_string()),
            ..WidgetPayload::default()
        };
        let err = runtime.initialize(1, &payload, &mut surface).unwrap_err();
        assert!(matches!(err, GridError::HandlerMissing(kind) if kind == "gauge"));
    }

    #[test]
    fn item_tier_shadows_surface_tier() {
        let mut runtime = SandboxRuntime::new();
        let mut surface_tier = GlobalMap::new();
        surface_tier.insert("theme".into(), json!("dark"));
        surface_tier.insert("locale".into(), json!("en"));
        runtime.set_surface_globals(surface_tier);

        let mut item_tier = GlobalMap::new();
        item_tier.insert("theme".into(), json!("light"));
        runtime.set_item_globals(7, item_tier);

        let merged = runtime.merged_globals(7);
        assert_eq!(merged["theme"], json!("light"));
        assert_eq!(merged["locale"], json!("en"));
    }

    #[test]
    fn merge_reflects_later_tier_mutations() {
        let mut runtime = SandboxRuntime::new();
        let mut surface_tier = GlobalMap::new();
        surface_tier.insert("theme".into(), json!("dark"));
        runtime.set_surface_globals(surface_tier);
        assert_eq!(runtime.merged_globals(1)["theme"], json!("dark"));

        let mut replaced = GlobalMap::new();
        replaced.insert("theme".into(), json!("solarized"));
        runtime.set_surface_globals(replaced);
        assert_eq!(runtime.merged_globals(1)["theme"], json!("solarized"));
    }
}
