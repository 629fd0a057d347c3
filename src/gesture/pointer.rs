use crate::geometry::{CellPos, SurfaceMetrics, SurfacePoint};
use crate::registry::ItemId;

use super::GestureEffect;

/// Native drag events as delivered by the surface. `DragStart` is only
/// emitted from an item's drag handle, carrying the item's current cell so
/// the machine can stay registry-free.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerEvent {
    DragStart {
        id: ItemId,
        origin_cell: CellPos,
        at: SurfacePoint,
    },
    DragOver {
        at: SurfacePoint,
    },
    Drop {
        at: SurfacePoint,
    },
    DragEnd,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PointerState {
    Idle,
    Dragging {
        id: ItemId,
        origin_cell: CellPos,
        start: SurfacePoint,
    },
}

/// `idle -> dragging -> idle` machine for native pointer drags.
///
/// Drag-over events apply visual-only translation; the drop computes the
/// target cell from the item's rendered offset and issues the single move
/// command. A dragend without a drop returns to idle without mutation.
#[derive(Debug, Default)]
pub struct PointerMachine {
    state: PointerState,
}

impl Default for PointerState {
    fn default() -> Self {
        Self::Idle
    }
}

impl PointerMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PointerState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, PointerState::Dragging { .. })
    }

    pub fn handle(&mut self, event: &PointerEvent, metrics: &SurfaceMetrics) -> Vec<GestureEffect> {
        match (&self.state, event) {
            (PointerState::Idle, PointerEvent::DragStart { id, origin_cell, at }) => {
                self.state = PointerState::Dragging {
                    id: *id,
                    origin_cell: *origin_cell,
                    start: *at,
                };
                vec![GestureEffect::MarkDragging(*id)]
            }
            (PointerState::Dragging { id, start, .. }, PointerEvent::DragOver { at }) => {
                vec![GestureEffect::DragVisual {
                    id: *id,
                    dx: at.x - start.x,
                    dy: at.y - start.y,
                }]
            }
            (PointerState::Dragging { id, origin_cell, start }, PointerEvent::Drop { at }) => {
                let id = *id;
                let x = i32::from(origin_cell.x) + metrics.cell_delta(at.x - start.x);
                let y = i32::from(origin_cell.y) + metrics.cell_delta(at.y - start.y);
                self.state = PointerState::Idle;
                vec![
                    GestureEffect::ClearVisual(id),
                    GestureEffect::UnmarkDragging(id),
                    GestureEffect::Move { id, x, y },
                ]
            }
            (PointerState::Dragging { id, .. }, PointerEvent::DragEnd) => {
                let id = *id;
                self.state = PointerState::Idle;
                vec![
                    GestureEffect::ClearVisual(id),
                    GestureEffect::UnmarkDragging(id),
                ]
            }
            // Drag-over/drop/end while idle (e.g. the dragend that follows
            // a completed drop) carry no state to act on.
            _ => Vec::new(),
        }
    }
}
