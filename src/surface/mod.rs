//! Rendering-surface collaborator interface.
//!
//! The engine never talks to a concrete surface; it drives this trait.
//! [`RecordingSurface`] is the in-memory implementation used by tests and
//! headless hosts, and `TermSurface` (see `term`) adapts a terminal.

mod term;

use std::collections::BTreeMap;

use crate::geometry::CellRect;
use crate::registry::ItemId;

pub use term::TermSurface;

/// Resource-load indicator shown inside an item's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadIndicator {
    Loading,
    Failed,
}

/// Style-derived configuration reads; `None` means "not configured" and
/// falls back to the fixed defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SurfaceConfig {
    pub cell_px: Option<f64>,
    pub gap_px: Option<f64>,
}

/// Host rendering surface.
///
/// All methods are infallible by contract: a surface that can fail I/O
/// buffers internally and reports problems through its own flush path.
pub trait Surface {
    /// Attach a new item element with its label strip.
    fn attach_item(&mut self, id: ItemId, label: &str);

    /// Detach an item element; idempotent.
    fn detach_item(&mut self, id: ItemId);

    /// Write an item's grid placement.
    fn apply_placement(&mut self, id: ItemId, rect: CellRect);

    /// Mark an item as the active drag subject (opacity/scale styling).
    fn mark_dragging(&mut self, id: ItemId);

    /// Remove the drag-subject marking; idempotent.
    fn unmark_dragging(&mut self, id: ItemId);

    /// Transient drag feedback: pixel translation applied on top of the
    /// item's placement.
    fn set_drag_visual(&mut self, id: ItemId, dx: f64, dy: f64);

    /// Drop any transient drag feedback; idempotent.
    fn clear_drag_visual(&mut self, id: ItemId);

    /// Replace the item's content markup.
    fn set_markup(&mut self, id: ItemId, markup: &str);

    /// Show a load indicator inside the item's container.
    fn set_indicator(&mut self, id: ItemId, indicator: LoadIndicator);

    /// Remove the load indicator; idempotent.
    fn clear_indicator(&mut self, id: ItemId);

    /// Attach an item-tagged style node; replaces any prior node for the id.
    fn inject_style(&mut self, id: ItemId, css: &str);

    /// Remove the item's style node; idempotent.
    fn remove_style(&mut self, id: ItemId);

    /// Current surface width in pixels.
    fn width_px(&self) -> f64;

    /// Style-derived cell metrics, if the surface exposes any.
    fn config(&self) -> SurfaceConfig;
}

#[derive(Debug, Clone, Default)]
struct RecordedItem {
    label: String,
    markup: Option<String>,
    placement: Option<CellRect>,
    drag: Option<(f64, f64)>,
    drag_marked: bool,
    indicator: Option<LoadIndicator>,
}

/// In-memory surface that records every write for inspection.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    width_px: f64,
    config: SurfaceConfig,
    items: BTreeMap<ItemId, RecordedItem>,
    styles: BTreeMap<ItemId, String>,
    placement_writes: usize,
}

impl RecordingSurface {
    pub fn new(width_px: f64) -> Self {
        Self {
            width_px,
            ..Self::default()
        }
    }

    pub fn with_config(width_px: f64, config: SurfaceConfig) -> Self {
        Self {
            width_px,
            config,
            ..Self::default()
        }
    }

    /// Simulate a host-driven resize.
    pub fn set_width_px(&mut self, width_px: f64) {
        self.width_px = width_px;
    }

    pub fn is_attached(&self, id: ItemId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn attached_ids(&self) -> Vec<ItemId> {
        self.items.keys().copied().collect()
    }

    pub fn placement_of(&self, id: ItemId) -> Option<CellRect> {
        self.items.get(&id).and_then(|item| item.placement)
    }

    pub fn label_of(&self, id: ItemId) -> Option<&str> {
        self.items.get(&id).map(|item| item.label.as_str())
    }

    pub fn markup_of(&self, id: ItemId) -> Option<&str> {
        self.items.get(&id).and_then(|item| item.markup.as_deref())
    }

    pub fn drag_of(&self, id: ItemId) -> Option<(f64, f64)> {
        self.items.get(&id).and_then(|item| item.drag)
    }

    pub fn is_drag_marked(&self, id: ItemId) -> bool {
        self.items.get(&id).map(|item| item.drag_marked).unwrap_or(false)
    }

    pub fn indicator_of(&self, id: ItemId) -> Option<LoadIndicator> {
        self.items.get(&id).and_then(|item| item.indicator)
    }

    pub fn style_of(&self, id: ItemId) -> Option<&str> {
        self.styles.get(&id).map(String::as_str)
    }

    /// Total `apply_placement` calls; tests use this to assert that layout
    /// application only writes dirty placements.
    pub fn placement_writes(&self) -> usize {
        self.placement_writes
    }
}

impl Surface for RecordingSurface {
    fn attach_item(&mut self, id: ItemId, label: &str) {
        self.items.insert(
            id,
            RecordedItem {
                label: label.to_string(),
                ..RecordedItem::default()
            },
        );
    }

    fn detach_item(&mut self, id: ItemId) {
        self.items.remove(&id);
    }

    fn apply_placement(&mut self, id: ItemId, rect: CellRect) {
        self.placement_writes += 1;
        if let Some(item) = self.items.get_mut(&id) {
            item.placement = Some(rect);
        }
    }

    fn mark_dragging(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.drag_marked = true;
        }
    }

    fn unmark_dragging(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.drag_marked = false;
        }
    }

    fn set_drag_visual(&mut self, id: ItemId, dx: f64, dy: f64) {
        if let Some(item) = self.items.get_mut(&id) {
            item.drag = Some((dx, dy));
        }
    }

    fn clear_drag_visual(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.drag = None;
        }
    }

    fn set_markup(&mut self, id: ItemId, markup: &str) {
        if let Some(item) = self.items.get_mut(&id) {
            item.markup = Some(markup.to_string());
        }
    }

    fn set_indicator(&mut self, id: ItemId, indicator: LoadIndicator) {
        if let Some(item) = self.items.get_mut(&id) {
            item.indicator = Some(indicator);
        }
    }

    fn clear_indicator(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.indicator = None;
        }
    }

    fn inject_style(&mut self, id: ItemId, css: &str) {
        self.styles.insert(id, css.to_string());
    }

    fn remove_style(&mut self, id: ItemId) {
        self.styles.remove(&id);
    }

    fn width_px(&self) -> f64 {
        self.width_px
    }

    fn config(&self) -> SurfaceConfig {
        self.config
    }
}
