use crate::geometry::{CellPos, SurfaceMetrics, SurfacePoint};
use crate::registry::ItemId;

use super::GestureEffect;

/// Delay before a held touch becomes a drag.
pub const LONG_PRESS_MS: u64 = 400;
/// Minimum interval between processed move events.
pub const MOVE_THROTTLE_MS: u64 = 16;
/// Moves shorter than this are treated as finger jitter.
pub const JITTER_THRESHOLD_PX: f64 = 5.0;

/// Touch events as delivered by the surface, with event timestamps in
/// milliseconds. `Tick` lets the long-press gate fire between touches.
#[derive(Debug, Clone, PartialEq)]
pub enum TouchEvent {
    Start {
        id: ItemId,
        origin_cell: CellPos,
        at: SurfacePoint,
        now_ms: u64,
    },
    Move {
        at: SurfacePoint,
        now_ms: u64,
    },
    End {
        now_ms: u64,
    },
    Cancel {
        now_ms: u64,
    },
    Tick {
        now_ms: u64,
    },
}

impl TouchEvent {
    fn timestamp(&self) -> u64 {
        match self {
            TouchEvent::Start { now_ms, .. }
            | TouchEvent::Move { now_ms, .. }
            | TouchEvent::End { now_ms }
            | TouchEvent::Cancel { now_ms }
            | TouchEvent::Tick { now_ms } => *now_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TouchState {
    Idle,
    /// Touch down, long-press gate armed.
    Pending {
        id: ItemId,
        origin_cell: CellPos,
        start: SurfacePoint,
        armed_at_ms: u64,
    },
    Dragging {
        id: ItemId,
        origin_cell: CellPos,
        start: SurfacePoint,
        last_move_ms: u64,
        offset: (f64, f64),
    },
}

impl Default for TouchState {
    fn default() -> Self {
        Self::Idle
    }
}

/// `idle -> pending -> dragging -> idle` machine for touch input.
///
/// The long-press gate is evaluated against event timestamps: any event at
/// or past the 400 ms deadline promotes `pending` to `dragging` before the
/// event itself is processed, which models the original timer without a
/// clock dependency. A move before the deadline cancels the gate (scroll),
/// and a release while `pending` is a tap — neither mutates anything.
#[derive(Debug, Default)]
pub struct TouchMachine {
    state: TouchState,
}

impl TouchMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TouchState {
        &self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, TouchState::Dragging { .. })
    }

    pub fn handle(&mut self, event: &TouchEvent, metrics: &SurfaceMetrics) -> Vec<GestureEffect> {
        let mut effects = Vec::new();

        // A move before the deadline is a scroll and must not promote, so
        // the gate only fires here for events at or past the deadline.
        if let TouchState::Pending {
            id,
            origin_cell,
            start,
            armed_at_ms,
        } = self.state
        {
            let fires = event.timestamp() >= armed_at_ms + LONG_PRESS_MS;
            let cancels = matches!(event, TouchEvent::Move { .. }) && !fires;
            if fires {
                self.state = TouchState::Dragging {
                    id,
                    origin_cell,
                    start,
                    last_move_ms: 0,
                    offset: (0.0, 0.0),
                };
                effects.push(GestureEffect::MarkDragging(id));
            } else if cancels {
                self.state = TouchState::Idle;
                return effects;
            }
        }

        match (&mut self.state, event) {
            (TouchState::Idle, TouchEvent::Start { id, origin_cell, at, now_ms }) => {
                self.state = TouchState::Pending {
                    id: *id,
                    origin_cell: *origin_cell,
                    start: *at,
                    armed_at_ms: *now_ms,
                };
            }
            (
                TouchState::Dragging {
                    id,
                    start,
                    last_move_ms,
                    offset,
                    ..
                },
                TouchEvent::Move { at, now_ms },
            ) => {
                if now_ms.saturating_sub(*last_move_ms) < MOVE_THROTTLE_MS {
                    return effects;
                }
                *last_move_ms = *now_ms;

                let dx = at.x - start.x;
                let dy = at.y - start.y;
                if (dx * dx + dy * dy).sqrt() < JITTER_THRESHOLD_PX {
                    return effects;
                }
                *offset = (dx, dy);
                effects.push(GestureEffect::DragVisual {
                    id: *id,
                    dx,
                    dy,
                });
            }
            (
                TouchState::Dragging { id, origin_cell, offset, .. },
                TouchEvent::End { .. } | TouchEvent::Cancel { .. },
            ) => {
                let id = *id;
                let x = i32::from(origin_cell.x) + metrics.cell_delta(offset.0);
                let y = i32::from(origin_cell.y) + metrics.cell_delta(offset.1);
                self.state = TouchState::Idle;
                effects.extend([
                    GestureEffect::ClearVisual(id),
                    GestureEffect::UnmarkDragging(id),
                    GestureEffect::Move { id, x, y },
                    GestureEffect::ReassertLayout,
                ]);
            }
            (TouchState::Pending { .. }, TouchEvent::End { .. } | TouchEvent::Cancel { .. }) => {
                // Tap or short touch: clear the gate, mutate nothing.
                self.state = TouchState::Idle;
            }
            _ => {}
        }

        effects
    }
}
