//! Gesture state machines.
//!
//! Two independent finite state machines translate raw input streams into
//! placement commands: one for native pointer drags, one for touch with a
//! long-press gate. Both are pure over timestamped synthetic events — they
//! never touch the registry or the surface. Each transition yields a list
//! of [`GestureEffect`]s the engine interprets: visual feedback ops plus
//! at most one `Move` command.

mod pointer;
mod touch;

use crate::registry::ItemId;

pub use pointer::{PointerEvent, PointerMachine, PointerState};
pub use touch::{
    JITTER_THRESHOLD_PX, LONG_PRESS_MS, MOVE_THROTTLE_MS, TouchEvent, TouchMachine, TouchState,
};

/// Side effects requested by a gesture transition.
#[derive(Debug, Clone, PartialEq)]
pub enum GestureEffect {
    /// Mark the item visually as the drag subject (opacity/scale).
    MarkDragging(ItemId),
    /// Remove the drag-subject marking.
    UnmarkDragging(ItemId),
    /// Apply a transient pixel translation on top of the placement.
    DragVisual { id: ItemId, dx: f64, dy: f64 },
    /// Drop the transient translation.
    ClearVisual(ItemId),
    /// Issue the placement command `move_to(id, x, y)`.
    Move { id: ItemId, x: i32, y: i32 },
    /// Re-apply the authoritative layout, overwriting any visual offsets
    /// left behind by the gesture (the touch machine's settle step).
    ReassertLayout,
}
