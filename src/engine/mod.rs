//! The engine aggregate.
//!
//! `GridEngine` owns the item registry, the sandbox runtime, the load
//! queue, both gesture machines, and the surface handle; every registry
//! mutation it performs ends in a layout-application step that writes the
//! changed placements to the surface. Multiple engines are independently
//! constructible — there is no ambient state.

pub mod audit;
pub mod driver;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::json;

use crate::document::{ImportedDocument, LayoutDocument, WidgetEntry, decode_document, parse_document};
use crate::gesture::{
    GestureEffect, PointerEvent, PointerMachine, TouchEvent, TouchMachine,
};
use crate::geometry::{CellPos, CellSize, SurfaceMetrics, SurfacePoint};
use crate::loader::{LoadProgress, LoadQueue, ResourceFetcher, ResourceRequest, ResourceSlot};
use crate::logging::{LogLevel, Logger, event_with_fields, json_kv};
use crate::metrics::EngineMetrics;
use crate::registry::{GridItem, ItemId, ItemRegistry, ItemState, MoveOutcome, WidgetPayload};
use crate::sandbox::{ContentHandler, GlobalMap, SandboxRuntime};
use crate::surface::{LoadIndicator, Surface};

use audit::{EngineAudit, EngineAuditEvent, EngineAuditStage, NullEngineAudit};

const LOG_TARGET: &str = "gridboard::engine";

/// Configuration knobs for a running engine.
#[derive(Clone)]
pub struct EngineConfig {
    /// Optional structured logger.
    pub logger: Option<Logger>,
    /// Metrics accumulator shared with diagnostic consumers.
    pub metrics: Option<Arc<Mutex<EngineMetrics>>>,
    /// Interval between metrics snapshot emissions. Zero disables them.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
    /// Lifecycle audit sink.
    pub audit: Arc<dyn EngineAudit>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(5),
            metrics_target: "gridboard::engine.metrics".to_string(),
            audit: Arc::new(NullEngineAudit),
        }
    }
}

impl EngineConfig {
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(EngineMetrics::new())));
        }
    }

    pub fn metrics_handle(&self) -> Option<Arc<Mutex<EngineMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}

/// Raw input events a host feeds into [`GridEngine::dispatch`].
///
/// The engine enriches them with registry state (the dragged item's
/// current cell) and routes them to the matching gesture machine; the two
/// machines are mutually exclusive per modality.
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    DragStart { id: ItemId, at: SurfacePoint },
    DragOver { at: SurfacePoint },
    Drop { at: SurfacePoint },
    DragEnd,
    TouchStart { id: ItemId, at: SurfacePoint, now_ms: u64 },
    TouchMove { at: SurfacePoint, now_ms: u64 },
    TouchEnd { now_ms: u64 },
    TouchCancel { now_ms: u64 },
    Tick { now_ms: u64 },
}

/// Interactive grid layout engine bound to one rendering surface.
pub struct GridEngine<S: Surface> {
    registry: ItemRegistry,
    sandbox: SandboxRuntime,
    loads: LoadQueue,
    pointer: PointerMachine,
    touch: TouchMachine,
    surface: S,
    metrics: SurfaceMetrics,
    config: EngineConfig,
    start_instant: Instant,
    last_metrics_emit: Option<Instant>,
}

impl<S: Surface> GridEngine<S> {
    pub fn new(surface: S) -> Self {
        let mut engine = Self {
            registry: ItemRegistry::new(),
            sandbox: SandboxRuntime::new(),
            loads: LoadQueue::new(),
            pointer: PointerMachine::new(),
            touch: TouchMachine::new(),
            surface,
            metrics: SurfaceMetrics::default(),
            config: EngineConfig::default(),
            start_instant: Instant::now(),
            last_metrics_emit: None,
        };
        engine.refresh_metrics();
        engine.log(
            LogLevel::Info,
            "engine_initialized",
            [
                json_kv("grid_width", json!(engine.registry.grid_width())),
                json_kv("cell_px", json!(engine.metrics.cell_px)),
                json_kv("gap_px", json!(engine.metrics.gap_px)),
            ],
        );
        engine.audit(EngineAuditStage::EngineInitialized, Vec::new());
        engine
    }

    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn grid_width(&self) -> u16 {
        self.registry.grid_width()
    }

    pub fn surface_metrics(&self) -> SurfaceMetrics {
        self.metrics
    }

    pub fn items(&self) -> &[GridItem] {
        self.registry.items()
    }

    pub fn item(&self, id: ItemId) -> Option<&GridItem> {
        self.registry.get(id)
    }

    /// Register a content handler under a payload `kind`.
    pub fn register_handler(&mut self, kind: impl Into<String>, handler: Box<dyn ContentHandler>) {
        self.sandbox.register_handler(kind, handler);
    }

    /// Replace the surface-tier globals exposed to widget sandboxes.
    pub fn set_surface_globals(&mut self, globals: GlobalMap) {
        self.sandbox.set_surface_globals(globals);
    }

    /// Insert a widget. The solver assigns a position unless one is given;
    /// content (inline or remote) is attached and sandboxed afterwards.
    /// Never fails: a bad payload degrades to an inert item.
    pub fn add_item(
        &mut self,
        size: CellSize,
        payload: Option<WidgetPayload>,
        item_globals: Option<GlobalMap>,
        position: Option<CellPos>,
    ) -> ItemId {
        let id = self.registry.insert(size, payload.clone(), position);
        self.record_metric(|m| m.record_placement());

        let label = payload
            .as_ref()
            .and_then(|p| p.text.clone())
            .unwrap_or_default();
        self.surface.attach_item(id, &label);
        if let Some(globals) = item_globals {
            self.sandbox.set_item_globals(id, globals);
        }
        self.apply_layout();

        if let Some(payload) = payload {
            if let Some(html) = payload.html.as_deref() {
                self.surface.set_markup(id, html);
            }
            if payload.has_remote_refs() {
                self.surface.set_indicator(id, LoadIndicator::Loading);
                self.loads.enqueue(id, payload);
            } else if payload.has_content() {
                self.init_sandbox(id, &payload);
            }
        }

        let position = self.registry.get(id).map(|item| item.position);
        self.log(
            LogLevel::Info,
            "item_added",
            [
                json_kv("item", json!(id)),
                json_kv("cols", json!(size.cols)),
                json_kv("rows", json!(size.rows)),
                json_kv("x", json!(position.map(|p| p.x))),
                json_kv("y", json!(position.map(|p| p.y))),
            ],
        );
        self.audit(
            EngineAuditStage::ItemInserted,
            vec![("item".to_string(), json!(id))],
        );
        id
    }

    /// Remove an item: cancel its pending load, tear down its sandbox,
    /// detach it, re-apply layout. Unknown ids are a no-op.
    pub fn remove_item(&mut self, id: ItemId) {
        self.loads.cancel(id);
        let Some(_item) = self.registry.remove(id) else {
            return;
        };
        self.sandbox.teardown(id, &mut self.surface);
        self.sandbox.forget_item(id);
        self.surface.detach_item(id);
        self.apply_layout();
        self.log(LogLevel::Info, "item_removed", [json_kv("item", json!(id))]);
        self.audit(
            EngineAuditStage::ItemRemoved,
            vec![("item".to_string(), json!(id))],
        );
    }

    /// Reposition an item, resolving conflicts (see the registry for the
    /// exact displacement semantics). Ends in a layout application when
    /// anything changed.
    pub fn move_item(&mut self, id: ItemId, x: i32, y: i32) -> MoveOutcome {
        let outcome = self.registry.move_to(id, x, y);
        match &outcome {
            MoveOutcome::Committed => {
                self.record_metric(|m| m.record_move());
                self.apply_layout();
                self.log(
                    LogLevel::Debug,
                    "item_moved",
                    [json_kv("item", json!(id)), json_kv("x", json!(x)), json_kv("y", json!(y))],
                );
                self.audit(
                    EngineAuditStage::ItemMoved,
                    vec![("item".to_string(), json!(id))],
                );
            }
            MoveOutcome::Displaced { relocated } => {
                let count = relocated.len();
                self.record_metric(|m| {
                    m.record_move();
                    m.record_conflict_relocations(count);
                });
                self.apply_layout();
                self.log(
                    LogLevel::Debug,
                    "conflicts_relocated",
                    [
                        json_kv("item", json!(id)),
                        json_kv("relocated", json!(count)),
                    ],
                );
                self.audit(
                    EngineAuditStage::ConflictsRelocated,
                    vec![
                        ("item".to_string(), json!(id)),
                        ("relocated".to_string(), json!(count)),
                    ],
                );
            }
            MoveOutcome::OutOfBounds | MoveOutcome::UnknownItem => {
                self.log(
                    LogLevel::Debug,
                    "move_rejected",
                    [
                        json_kv("item", json!(id)),
                        json_kv("x", json!(x)),
                        json_kv("y", json!(y)),
                    ],
                );
            }
        }
        outcome
    }

    /// React to a surface resize: refresh metrics, recompute the column
    /// count, and relocate only the items whose footprint no longer fits.
    pub fn resize(&mut self) {
        self.refresh_metrics();
        let new_width = self.registry.grid_width();
        let relocated = self.registry.reflow(new_width);
        for _ in &relocated {
            self.record_metric(|m| m.record_placement());
        }
        self.apply_layout();
        self.log(
            LogLevel::Info,
            "resized",
            [
                json_kv("grid_width", json!(new_width)),
                json_kv("relocated", json!(relocated.len())),
            ],
        );
        self.audit(
            EngineAuditStage::SurfaceResized,
            vec![("relocated".to_string(), json!(relocated.len()))],
        );
    }

    /// Feed one raw input event through the matching gesture machine and
    /// apply the effects it requests.
    pub fn dispatch(&mut self, event: InputEvent) {
        self.record_metric(|m| m.record_event());
        let metrics = self.metrics;

        let effects = match event {
            InputEvent::DragStart { id, at } => match self.origin_cell(id) {
                Some(origin_cell) => self.pointer.handle(
                    &PointerEvent::DragStart { id, origin_cell, at },
                    &metrics,
                ),
                None => Vec::new(),
            },
            InputEvent::DragOver { at } => {
                self.pointer.handle(&PointerEvent::DragOver { at }, &metrics)
            }
            InputEvent::Drop { at } => self.pointer.handle(&PointerEvent::Drop { at }, &metrics),
            InputEvent::DragEnd => self.pointer.handle(&PointerEvent::DragEnd, &metrics),
            InputEvent::TouchStart { id, at, now_ms } => match self.origin_cell(id) {
                Some(origin_cell) => self.touch.handle(
                    &TouchEvent::Start { id, origin_cell, at, now_ms },
                    &metrics,
                ),
                None => Vec::new(),
            },
            InputEvent::TouchMove { at, now_ms } => {
                self.touch.handle(&TouchEvent::Move { at, now_ms }, &metrics)
            }
            InputEvent::TouchEnd { now_ms } => {
                self.touch.handle(&TouchEvent::End { now_ms }, &metrics)
            }
            InputEvent::TouchCancel { now_ms } => {
                self.touch.handle(&TouchEvent::Cancel { now_ms }, &metrics)
            }
            InputEvent::Tick { now_ms } => {
                self.touch.handle(&TouchEvent::Tick { now_ms }, &metrics)
            }
        };

        self.apply_effects(effects);
        self.maybe_emit_metrics();
    }

    /// Export the current surface as a pretty-printed layout document.
    pub fn export_layout(&self) -> String {
        let widgets = self
            .registry
            .items()
            .iter()
            .map(|item| WidgetEntry {
                size: item.size,
                widget_data: item.payload.clone(),
                widget_globals: self
                    .sandbox
                    .item_globals(item.id)
                    .cloned()
                    .unwrap_or_default(),
                position: Some(item.position),
            })
            .collect();

        LayoutDocument {
            exposed_globals: self.sandbox.surface_globals().clone(),
            widgets,
        }
        .to_pretty_json()
    }

    /// Import a layout document, replacing the whole surface.
    ///
    /// Returns `false` on failure with a logged message. Unparseable JSON
    /// fails before any mutation; a parseable document with a malformed
    /// `widgets` field fails *after* the destructive clear, so the caller
    /// must treat `false` as "state may have been reset".
    pub fn import_layout(&mut self, json: &str) -> bool {
        let value = match parse_document(json) {
            Ok(value) => value,
            Err(err) => {
                self.log(
                    LogLevel::Warn,
                    "import_failed",
                    [json_kv("error", json!(err.to_string()))],
                );
                self.audit(EngineAuditStage::ImportRejected, Vec::new());
                return false;
            }
        };

        self.clear_all();

        let ImportedDocument {
            exposed_globals,
            widgets,
        } = match decode_document(value) {
            Ok(doc) => doc,
            Err(message) => {
                self.log(
                    LogLevel::Warn,
                    "import_failed",
                    [json_kv("error", json!(message))],
                );
                self.audit(EngineAuditStage::ImportRejected, Vec::new());
                return false;
            }
        };

        if let Some(globals) = exposed_globals {
            self.sandbox.set_surface_globals(globals);
        }

        let count = widgets.len();
        for entry in widgets {
            let globals = if entry.widget_globals.is_empty() {
                None
            } else {
                Some(entry.widget_globals)
            };
            self.add_item(entry.size, entry.widget_data, globals, entry.position);
        }

        self.log(
            LogLevel::Info,
            "import_completed",
            [json_kv("widgets", json!(count))],
        );
        self.audit(
            EngineAuditStage::ImportApplied,
            vec![("widgets".to_string(), json!(count))],
        );
        true
    }

    /// Tear everything down and rebuild from a snapshot of the current
    /// items; ids renumber from 1 but size/payload/position/item globals
    /// survive.
    pub fn reset_all(&mut self) {
        let backup: Vec<(CellSize, Option<WidgetPayload>, Option<GlobalMap>, CellPos)> = self
            .registry
            .items()
            .iter()
            .map(|item| {
                (
                    item.size,
                    item.payload.clone(),
                    self.sandbox.item_globals(item.id).cloned(),
                    item.position,
                )
            })
            .collect();

        self.clear_all();
        for (size, payload, globals, position) in backup {
            self.add_item(size, payload, globals, Some(position));
        }
        self.audit(EngineAuditStage::SurfaceReset, Vec::new());
    }

    /// Fetches the host should perform for pending loads.
    pub fn take_resource_requests(&mut self) -> Vec<ResourceRequest> {
        self.loads.take_requests()
    }

    /// Feed one fetch result back in. Results for removed items are
    /// dropped harmlessly.
    pub fn resolve_resource(
        &mut self,
        item: ItemId,
        slot: ResourceSlot,
        result: std::result::Result<String, String>,
    ) {
        match self.loads.resolve(item, slot, result) {
            LoadProgress::Ignored | LoadProgress::Pending => {}
            LoadProgress::Complete(payload) => {
                self.surface.clear_indicator(item);
                if let Some(html) = payload.html.as_deref() {
                    self.surface.set_markup(item, html);
                }
                let changed = self.registry.set_payload(item, payload.clone());
                if changed || !self.sandbox.is_sandboxed(item) {
                    self.init_sandbox(item, &payload);
                }
                self.log(
                    LogLevel::Info,
                    "load_completed",
                    [json_kv("item", json!(item))],
                );
                self.audit(
                    EngineAuditStage::LoadCompleted,
                    vec![("item".to_string(), json!(item))],
                );
            }
            LoadProgress::Failed { message } => {
                self.surface.set_indicator(item, LoadIndicator::Failed);
                self.log(
                    LogLevel::Warn,
                    "load_failed",
                    [
                        json_kv("item", json!(item)),
                        json_kv("error", json!(message)),
                    ],
                );
                self.audit(
                    EngineAuditStage::LoadFailed,
                    vec![("item".to_string(), json!(item))],
                );
            }
        }
    }

    /// Drive every pending load through a synchronous fetcher. Hosts with
    /// their own scheduler use `take_resource_requests`/`resolve_resource`
    /// instead.
    pub fn pump_loads(&mut self, fetcher: &mut dyn ResourceFetcher) {
        for request in self.take_resource_requests() {
            let result = fetcher.fetch(&request.url);
            self.resolve_resource(request.item, request.slot, result);
        }
    }

    fn origin_cell(&self, id: ItemId) -> Option<CellPos> {
        self.registry.get(id).map(|item| item.position)
    }

    fn apply_effects(&mut self, effects: Vec<GestureEffect>) {
        for effect in effects {
            match effect {
                GestureEffect::MarkDragging(id) => self.surface.mark_dragging(id),
                GestureEffect::UnmarkDragging(id) => self.surface.unmark_dragging(id),
                GestureEffect::DragVisual { id, dx, dy } => {
                    self.surface.set_drag_visual(id, dx, dy)
                }
                GestureEffect::ClearVisual(id) => self.surface.clear_drag_visual(id),
                GestureEffect::Move { id, x, y } => {
                    self.record_metric(|m| m.record_command());
                    self.move_item(id, x, y);
                }
                GestureEffect::ReassertLayout => self.reassert_layout(),
            }
        }
    }

    fn init_sandbox(&mut self, id: ItemId, payload: &WidgetPayload) {
        match self.sandbox.initialize(id, payload, &mut self.surface) {
            Ok(outcome) => {
                use crate::sandbox::SandboxOutcome;
                if outcome == SandboxOutcome::Instantiated {
                    self.registry.set_state(id, ItemState::Sandboxed);
                }
                self.audit(
                    EngineAuditStage::SandboxInitialized,
                    vec![("item".to_string(), json!(id))],
                );
            }
            Err(err) => {
                self.registry.set_state(id, ItemState::Inert);
                self.log(
                    LogLevel::Warn,
                    "sandbox_error",
                    [
                        json_kv("item", json!(id)),
                        json_kv("error", json!(err.to_string())),
                    ],
                );
                self.audit(
                    EngineAuditStage::SandboxFailed,
                    vec![("item".to_string(), json!(id))],
                );
            }
        }
    }

    /// Write only the placements that changed since the last application.
    fn apply_layout(&mut self) {
        let dirty = self.registry.take_dirty_placements();
        if dirty.is_empty() {
            return;
        }
        let writes = dirty.len();
        for (id, rect) in dirty {
            self.surface.apply_placement(id, rect);
        }
        self.record_metric(|m| m.record_layout_writes(writes));
        self.audit(
            EngineAuditStage::LayoutApplied,
            vec![("writes".to_string(), json!(writes))],
        );
    }

    /// Re-write every placement, overwriting any transient visual offsets
    /// (the touch machine's settle step).
    fn reassert_layout(&mut self) {
        let placements: Vec<_> = self
            .registry
            .items()
            .iter()
            .map(|item| (item.id, item.rect()))
            .collect();
        for (id, rect) in placements {
            self.surface.apply_placement(id, rect);
        }
    }

    fn clear_all(&mut self) {
        self.loads.clear();
        let removed = self.registry.clear();
        for item in &removed {
            self.sandbox.teardown(item.id, &mut self.surface);
            self.surface.detach_item(item.id);
        }
        self.sandbox.clear(&mut self.surface);
    }

    fn refresh_metrics(&mut self) {
        let width_px = self.surface.width_px();
        let config = self.surface.config();
        self.metrics = SurfaceMetrics::for_surface(width_px, config.cell_px, config.gap_px);
        self.registry
            .set_grid_width(self.metrics.grid_width(width_px));
    }

    fn record_metric(&self, update: impl FnOnce(&mut EngineMetrics)) {
        if let Some(metrics) = self.config.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                update(&mut guard);
            }
        }
    }

    fn maybe_emit_metrics(&mut self) {
        if self.config.metrics.is_none() || self.config.metrics_interval.is_zero() {
            return;
        }

        let now = Instant::now();
        match self.last_metrics_emit {
            Some(last) if now.duration_since(last) < self.config.metrics_interval => return,
            _ => self.last_metrics_emit = Some(now),
        }

        let uptime = now.duration_since(self.start_instant);
        if let (Some(logger), Some(metrics)) =
            (self.config.logger.as_ref(), self.config.metrics.as_ref())
        {
            if let Ok(guard) = metrics.lock() {
                let event = guard.snapshot(uptime).to_log_event(&self.config.metrics_target);
                let _ = logger.log_event(event);
            }
        }
    }

    fn log<I>(&self, level: LogLevel, message: &str, fields: I)
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        if let Some(logger) = self.config.logger.as_ref() {
            let event = event_with_fields(level, LOG_TARGET, message, fields);
            let _ = logger.log_event(event);
        }
    }

    fn audit(&self, stage: EngineAuditStage, details: Vec<(String, serde_json::Value)>) {
        self.config
            .audit
            .record(EngineAuditEvent::with_details(stage, details));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::{HandlerError, WidgetBindings, WidgetInstance};
    use crate::surface::{RecordingSurface, SurfaceConfig};
    use std::cell::Cell;
    use std::rc::Rc;

    struct NullInstance;

    impl WidgetInstance for NullInstance {}

    struct CountingHandler {
        built: Rc<Cell<u32>>,
    }

    impl ContentHandler for CountingHandler {
        fn instantiate(
            &self,
            _bindings: WidgetBindings<'_>,
        ) -> std::result::Result<Box<dyn WidgetInstance>, HandlerError> {
            self.built.set(self.built.get() + 1);
            Ok(Box::new(NullInstance))
        }
    }

    struct FailingHandler;

    impl ContentHandler for FailingHandler {
        fn instantiate(
            &self,
            _bindings: WidgetBindings<'_>,
        ) -> std::result::Result<Box<dyn WidgetInstance>, HandlerError> {
            Err(HandlerError("no dice".to_string()))
        }
    }

    /// 600px surface configured for 100px cells, no gap: six columns.
    /// (An unconfigured 600px surface would fall under the narrow-surface
    /// breakpoint and get 80px cells instead.)
    fn engine() -> GridEngine<RecordingSurface> {
        GridEngine::new(RecordingSurface::with_config(
            600.0,
            SurfaceConfig {
                cell_px: Some(100.0),
                gap_px: Some(0.0),
            },
        ))
    }

    fn script_payload(js: &str) -> WidgetPayload {
        WidgetPayload {
            js: Some(js.to_string()),
            ..WidgetPayload::default()
        }
    }

    #[test]
    fn inserts_place_row_major_and_write_layout() {
        let mut engine = engine();
        assert_eq!(engine.grid_width(), 6);

        let a = engine.add_item(CellSize::new(2, 1), None, None, None);
        let b = engine.add_item(CellSize::new(2, 1), None, None, None);
        let c = engine.add_item(CellSize::new(4, 2), None, None, None);

        assert_eq!(engine.item(a).unwrap().position, CellPos::new(0, 0));
        assert_eq!(engine.item(b).unwrap().position, CellPos::new(2, 0));
        assert_eq!(engine.item(c).unwrap().position, CellPos::new(0, 1));
        // One placement write per insert: unchanged items are not rewritten.
        assert_eq!(engine.surface().placement_writes(), 3);
    }

    #[test]
    fn pointer_drag_moves_item() {
        let mut engine = engine();
        let a = engine.add_item(CellSize::new(2, 1), None, None, None);

        engine.dispatch(InputEvent::DragStart {
            id: a,
            at: SurfacePoint::new(20.0, 20.0),
        });
        assert!(engine.surface().is_drag_marked(a));

        engine.dispatch(InputEvent::DragOver {
            at: SurfacePoint::new(230.0, 20.0),
        });
        assert_eq!(engine.surface().drag_of(a), Some((210.0, 0.0)));

        engine.dispatch(InputEvent::Drop {
            at: SurfacePoint::new(230.0, 125.0),
        });
        assert_eq!(engine.item(a).unwrap().position, CellPos::new(2, 1));
        assert_eq!(engine.surface().drag_of(a), None);
        assert!(!engine.surface().is_drag_marked(a));
        // The dragend that follows a completed drop is a no-op.
        engine.dispatch(InputEvent::DragEnd);
        assert_eq!(engine.item(a).unwrap().position, CellPos::new(2, 1));
    }

    #[test]
    fn touch_long_press_then_release_commits_move() {
        let mut engine = engine();
        let a = engine.add_item(CellSize::new(1, 1), None, None, None);

        engine.dispatch(InputEvent::TouchStart {
            id: a,
            at: SurfacePoint::new(10.0, 10.0),
            now_ms: 0,
        });
        engine.dispatch(InputEvent::Tick { now_ms: 400 });
        assert!(engine.surface().is_drag_marked(a));

        engine.dispatch(InputEvent::TouchMove {
            at: SurfacePoint::new(130.0, 10.0),
            now_ms: 450,
        });
        engine.dispatch(InputEvent::TouchEnd { now_ms: 470 });

        assert_eq!(engine.item(a).unwrap().position, CellPos::new(1, 0));
        assert!(!engine.surface().is_drag_marked(a));
    }

    #[test]
    fn tap_does_not_move_anything() {
        let mut engine = engine();
        let a = engine.add_item(CellSize::new(1, 1), None, None, None);

        engine.dispatch(InputEvent::TouchStart {
            id: a,
            at: SurfacePoint::new(10.0, 10.0),
            now_ms: 0,
        });
        engine.dispatch(InputEvent::TouchEnd { now_ms: 100 });
        assert_eq!(engine.item(a).unwrap().position, CellPos::new(0, 0));
    }

    #[test]
    fn out_of_bounds_drop_leaves_position_unchanged() {
        let mut engine = engine();
        let a = engine.add_item(CellSize::new(2, 1), None, None, None);

        engine.dispatch(InputEvent::DragStart {
            id: a,
            at: SurfacePoint::new(0.0, 0.0),
        });
        engine.dispatch(InputEvent::Drop {
            at: SurfacePoint::new(-200.0, 0.0),
        });
        assert_eq!(engine.item(a).unwrap().position, CellPos::new(0, 0));
    }

    #[test]
    fn shrink_reflows_only_overflowing_items() {
        let mut engine = engine();
        let small = engine.add_item(CellSize::new(2, 1), None, None, Some(CellPos::new(0, 0)));
        let wide = engine.add_item(CellSize::new(4, 2), None, None, Some(CellPos::new(2, 0)));

        engine.surface_mut().set_width_px(400.0);
        engine.resize();

        assert_eq!(engine.grid_width(), 4);
        assert_eq!(engine.item(small).unwrap().position, CellPos::new(0, 0));
        assert_eq!(engine.item(wide).unwrap().position, CellPos::new(0, 2));
    }

    #[test]
    fn export_import_round_trips() {
        let mut engine = engine();
        let mut surface_tier = GlobalMap::new();
        surface_tier.insert("theme".into(), json!("dark"));
        engine.set_surface_globals(surface_tier);

        let mut item_tier = GlobalMap::new();
        item_tier.insert("unit".into(), json!("C"));
        engine.add_item(
            CellSize::new(2, 1),
            Some(WidgetPayload {
                text: Some("Weather".into()),
                html: Some("<div>21C</div>".into()),
                ..WidgetPayload::default()
            }),
            Some(item_tier),
            None,
        );
        engine.add_item(CellSize::new(1, 1), None, None, None);

        let exported = engine.export_layout();
        let mut restored = GridEngine::new(RecordingSurface::with_config(
            600.0,
            SurfaceConfig {
                cell_px: Some(100.0),
                gap_px: Some(0.0),
            },
        ));
        assert!(restored.import_layout(&exported));

        assert_eq!(restored.items().len(), 2);
        let first = &restored.items()[0];
        assert_eq!(first.id, 1);
        assert_eq!(first.size, CellSize::new(2, 1));
        assert_eq!(first.position, CellPos::new(0, 0));
        assert_eq!(
            first.payload.as_ref().unwrap().text.as_deref(),
            Some("Weather")
        );
        assert_eq!(restored.export_layout(), exported);
    }

    #[test]
    fn import_with_bad_widgets_clears_state_and_fails() {
        let mut engine = engine();
        engine.add_item(CellSize::new(2, 1), None, None, None);

        assert!(!engine.import_layout(r#"{"widgets": "not-an-array"}"#));
        assert!(engine.items().is_empty());
        assert!(engine.surface().attached_ids().is_empty());

        let exported = engine.export_layout();
        assert!(exported.contains("\"widgets\": []"));
    }

    #[test]
    fn import_of_invalid_json_leaves_state_untouched() {
        let mut engine = engine();
        engine.add_item(CellSize::new(2, 1), None, None, None);

        assert!(!engine.import_layout("{definitely not json"));
        assert_eq!(engine.items().len(), 1);
    }

    #[test]
    fn reset_rebuilds_with_renumbered_ids() {
        let mut engine = engine();
        let a = engine.add_item(CellSize::new(1, 1), None, None, None);
        engine.remove_item(a);
        let b = engine.add_item(CellSize::new(2, 1), None, None, Some(CellPos::new(3, 2)));
        assert_eq!(b, 2);

        engine.reset_all();
        assert_eq!(engine.items().len(), 1);
        let rebuilt = &engine.items()[0];
        assert_eq!(rebuilt.id, 1);
        assert_eq!(rebuilt.position, CellPos::new(3, 2));
    }

    #[test]
    fn handler_failure_degrades_item_to_inert() {
        let mut engine = engine();
        engine.register_handler("script", Box::new(FailingHandler));
        let a = engine.add_item(CellSize::new(1, 1), Some(script_payload("boom")), None, None);

        let item = engine.item(a).unwrap();
        assert_eq!(item.state, ItemState::Inert);
        assert_eq!(item.position, CellPos::new(0, 0));
        // The inert item still participates in layout.
        let b = engine.add_item(CellSize::new(1, 1), None, None, None);
        assert_eq!(engine.item(b).unwrap().position, CellPos::new(1, 0));
    }

    #[test]
    fn successful_handler_marks_item_sandboxed() {
        let built = Rc::new(Cell::new(0));
        let mut engine = engine();
        engine.register_handler("script", Box::new(CountingHandler { built: built.clone() }));
        let a = engine.add_item(CellSize::new(1, 1), Some(script_payload("ok")), None, None);

        assert_eq!(engine.item(a).unwrap().state, ItemState::Sandboxed);
        assert_eq!(built.get(), 1);
    }

    #[test]
    fn remote_load_failure_shows_persistent_indicator() {
        let mut engine = engine();
        let a = engine.add_item(
            CellSize::new(1, 1),
            Some(WidgetPayload {
                html_url: Some("https://example.test/w.html".into()),
                ..WidgetPayload::default()
            }),
            None,
            None,
        );
        assert_eq!(engine.surface().indicator_of(a), Some(LoadIndicator::Loading));

        let requests = engine.take_resource_requests();
        assert_eq!(requests.len(), 1);
        engine.resolve_resource(a, requests[0].slot, Err("404".into()));

        assert_eq!(engine.surface().indicator_of(a), Some(LoadIndicator::Failed));
        // Still movable.
        assert_eq!(engine.move_item(a, 2, 0), MoveOutcome::Committed);
    }

    #[test]
    fn remote_load_completion_installs_content() {
        let built = Rc::new(Cell::new(0));
        let mut engine = engine();
        engine.register_handler("script", Box::new(CountingHandler { built: built.clone() }));
        let a = engine.add_item(
            CellSize::new(1, 1),
            Some(WidgetPayload {
                html_url: Some("https://example.test/w.html".into()),
                js_url: Some("https://example.test/w.js".into()),
                ..WidgetPayload::default()
            }),
            None,
            None,
        );

        for request in engine.take_resource_requests() {
            let body = match request.slot {
                ResourceSlot::Markup => "<div>hi</div>",
                ResourceSlot::Script => "run()",
                ResourceSlot::Style => unreachable!("no style slot requested"),
            };
            engine.resolve_resource(a, request.slot, Ok(body.to_string()));
        }

        assert_eq!(engine.surface().indicator_of(a), None);
        assert_eq!(engine.surface().markup_of(a), Some("<div>hi</div>"));
        assert_eq!(engine.item(a).unwrap().state, ItemState::Sandboxed);
        assert_eq!(built.get(), 1);
    }

    #[test]
    fn removal_cancels_pending_load() {
        let mut engine = engine();
        let a = engine.add_item(
            CellSize::new(1, 1),
            Some(WidgetPayload {
                html_url: Some("https://example.test/w.html".into()),
                ..WidgetPayload::default()
            }),
            None,
            None,
        );
        engine.remove_item(a);

        // The late resolve is dropped without touching anything.
        engine.resolve_resource(a, ResourceSlot::Markup, Ok("<div/>".into()));
        assert!(engine.items().is_empty());
        assert!(engine.surface().attached_ids().is_empty());
    }
}
