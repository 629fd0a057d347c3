use std::collections::HashMap;

use blake3::Hash;
use serde::{Deserialize, Serialize};

use crate::geometry::{CellPos, CellRect, CellSize};
use crate::layout::{OccupancyGrid, find_position};

/// Monotonically increasing item identifier, assigned from 1 and never
/// reused within an engine's lifetime.
pub type ItemId = u32;

/// Opaque widget content descriptor carried by an item.
///
/// Sources may be supplied inline (`html`/`css`/`js`) or by reference
/// (`*_url`); `kind` names the pre-registered content handler that turns
/// the script source into a live instance. Field names match the layout
/// document schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub css_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl WidgetPayload {
    /// Whether any content slot references a remote resource.
    pub fn has_remote_refs(&self) -> bool {
        self.html_url.is_some() || self.css_url.is_some() || self.js_url.is_some()
    }

    /// Whether the payload carries anything a sandbox could act on.
    pub fn has_content(&self) -> bool {
        self.html.is_some() || self.css.is_some() || self.js.is_some()
    }

    pub fn digest(&self) -> Hash {
        let mut hasher = blake3::Hasher::new();
        for slot in [
            &self.kind,
            &self.html,
            &self.html_url,
            &self.css,
            &self.css_url,
            &self.js,
            &self.js_url,
            &self.text,
        ] {
            match slot {
                Some(value) => {
                    hasher.update(&[1]);
                    hasher.update(value.as_bytes());
                }
                None => {
                    hasher.update(&[0]);
                }
            }
        }
        hasher.finalize()
    }
}

/// Registry-level item lifecycle.
///
/// `absent -> Placed -> (Sandboxed | Inert) -> removed`; re-initialization
/// goes through a full teardown and lands back in `Sandboxed` or `Inert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Placed on the grid, no live sandbox.
    Placed,
    /// Placed with a live content instance.
    Sandboxed,
    /// Placed but content failed to initialize; visible, non-interactive.
    Inert,
}

/// A placed rectangular unit occupying a fixed cell footprint.
#[derive(Debug, Clone)]
pub struct GridItem {
    pub id: ItemId,
    pub size: CellSize,
    pub position: CellPos,
    pub payload: Option<WidgetPayload>,
    pub state: ItemState,
    payload_digest: Option<Hash>,
}

impl GridItem {
    pub fn rect(&self) -> CellRect {
        CellRect::new(self.position, self.size)
    }
}

/// Result of a `move_to` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Id not present; nothing changed.
    UnknownItem,
    /// Target was out of bounds; position unchanged.
    OutOfBounds,
    /// Target footprint was free; committed directly.
    Committed,
    /// Target was occupied; the item took the cell anyway and each listed
    /// neighbor was relocated by the solver.
    Displaced { relocated: Vec<(ItemId, CellPos)> },
}

/// The ordered set of placed items and the placement dirty set.
///
/// Other components read and mutate items exclusively through this type;
/// occupancy snapshots are recomputed from it on demand.
#[derive(Debug, Default)]
pub struct ItemRegistry {
    items: Vec<GridItem>,
    next_id: ItemId,
    grid_width: u16,
    applied: HashMap<ItemId, CellRect>,
}

impl ItemRegistry {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
            grid_width: 0,
            applied: HashMap::new(),
        }
    }

    pub fn grid_width(&self) -> u16 {
        self.grid_width
    }

    /// Update the logical column count without relocating anything; resize
    /// reflow is a separate, explicit pass.
    pub fn set_grid_width(&mut self, width: u16) {
        self.grid_width = width;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[GridItem] {
        &self.items
    }

    pub fn get(&self, id: ItemId) -> Option<&GridItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Occupancy snapshot of every item, optionally excluding one id.
    pub fn occupancy_excluding(&self, exclude: Option<ItemId>) -> OccupancyGrid {
        OccupancyGrid::capture(
            self.grid_width,
            self.items
                .iter()
                .filter(|item| Some(item.id) != exclude)
                .map(|item| (item.id, item.rect())),
        )
    }

    pub fn occupancy(&self) -> OccupancyGrid {
        self.occupancy_excluding(None)
    }

    /// Append a new item; the solver picks the position unless the caller
    /// supplies one. Returns the assigned id.
    pub fn insert(
        &mut self,
        size: CellSize,
        payload: Option<WidgetPayload>,
        position: Option<CellPos>,
    ) -> ItemId {
        let id = self.next_id;
        self.next_id += 1;

        let position = position.unwrap_or_else(|| find_position(size, &self.occupancy(), 0));
        let payload_digest = payload.as_ref().map(WidgetPayload::digest);
        self.items.push(GridItem {
            id,
            size,
            position,
            payload,
            state: ItemState::Placed,
            payload_digest,
        });
        id
    }

    /// Remove an item, returning it for teardown. Unknown ids are a no-op.
    pub fn remove(&mut self, id: ItemId) -> Option<GridItem> {
        let index = self.items.iter().position(|item| item.id == id)?;
        self.applied.remove(&id);
        Some(self.items.remove(index))
    }

    /// Drop every item and restart the id counter. Returns the removed
    /// items in display order so the caller can tear down sandboxes.
    pub fn clear(&mut self) -> Vec<GridItem> {
        self.next_id = 1;
        self.applied.clear();
        std::mem::take(&mut self.items)
    }

    pub fn set_state(&mut self, id: ItemId, state: ItemState) {
        if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
            item.state = state;
        }
    }

    /// Replace an item's payload. Returns `true` when the content digest
    /// changed, i.e. the sandbox needs a rebuild.
    pub fn set_payload(&mut self, id: ItemId, payload: WidgetPayload) -> bool {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return false;
        };
        let digest = payload.digest();
        let changed = item.payload_digest != Some(digest);
        item.payload = Some(payload);
        item.payload_digest = Some(digest);
        changed
    }

    /// Reposition an item, resolving collisions.
    ///
    /// Out-of-bounds targets are rejected without mutation. A free target
    /// commits directly. An occupied target commits anyway — overlap is
    /// allowed to persist transiently — and every other item whose box now
    /// overlaps the moved item is relocated by the solver, scanning from
    /// two rows above its prior row (clamped to 0) so conflicts are pushed
    /// downward while keeping their column bias. The pass runs once per
    /// neighbor and does not cascade; dense grids can retain residual
    /// overlaps until a later move disturbs them.
    pub fn move_to(&mut self, id: ItemId, x: i32, y: i32) -> MoveOutcome {
        let Some(index) = self.items.iter().position(|item| item.id == id) else {
            return MoveOutcome::UnknownItem;
        };
        let size = self.items[index].size;

        if x < 0 || y < 0 || x + i32::from(size.cols) > i32::from(self.grid_width) {
            return MoveOutcome::OutOfBounds;
        }
        let target = CellPos::new(x as u16, y as u16);
        let target_rect = CellRect::new(target, size);

        let free = self.occupancy_excluding(Some(id)).fits(target.x, target.y, size);
        self.items[index].position = target;
        if free {
            return MoveOutcome::Committed;
        }

        let conflicts: Vec<ItemId> = self
            .items
            .iter()
            .filter(|other| other.id != id && other.rect().overlaps(&target_rect))
            .map(|other| other.id)
            .collect();

        let mut relocated = Vec::with_capacity(conflicts.len());
        for conflict_id in conflicts {
            // Fresh snapshot per relocation: earlier relocations in the same
            // pass are visible, and the conflict's own old footprint still
            // counts as occupied while its new cell is chosen.
            let Some(conflict) = self.get(conflict_id) else {
                continue;
            };
            let start_row = conflict.position.y.saturating_sub(2);
            let size = conflict.size;
            let pos = find_position(size, &self.occupancy(), start_row);
            if let Some(item) = self.items.iter_mut().find(|item| item.id == conflict_id) {
                item.position = pos;
            }
            relocated.push((conflict_id, pos));
        }

        MoveOutcome::Displaced { relocated }
    }

    /// Relocate items whose footprint exceeds the new grid width.
    ///
    /// Each overflowing item is re-solved from row 0 against a fresh
    /// snapshot; non-overflowing items keep their positions. Returns the
    /// relocations performed, in display order.
    pub fn reflow(&mut self, new_width: u16) -> Vec<(ItemId, CellPos)> {
        self.grid_width = new_width;

        let overflowing: Vec<ItemId> = self
            .items
            .iter()
            .filter(|item| item.rect().right() > new_width)
            .map(|item| item.id)
            .collect();

        let mut relocated = Vec::with_capacity(overflowing.len());
        for id in overflowing {
            let Some(item) = self.get(id) else {
                continue;
            };
            let size = item.size;
            let pos = find_position(size, &self.occupancy(), 0);
            if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
                item.position = pos;
            }
            relocated.push((id, pos));
        }
        relocated
    }

    /// Placements that changed since the last call, in display order.
    ///
    /// The layout-application step consumes this so only moved items are
    /// written to the surface.
    pub fn take_dirty_placements(&mut self) -> Vec<(ItemId, CellRect)> {
        let mut dirty = Vec::new();
        for item in &self.items {
            let rect = item.rect();
            if self.applied.get(&item.id) != Some(&rect) {
                dirty.push((item.id, rect));
            }
        }
        for (id, rect) in &dirty {
            self.applied.insert(*id, *rect);
        }
        dirty
    }

    /// Whether any item overlaps another; used by tests and diagnostics.
    pub fn has_overlaps(&self) -> bool {
        for (i, a) in self.items.iter().enumerate() {
            for b in &self.items[i + 1..] {
                if a.rect().overlaps(&b.rect()) {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(width: u16) -> ItemRegistry {
        let mut registry = ItemRegistry::new();
        registry.set_grid_width(width);
        registry
    }

    #[test]
    fn insert_assigns_row_major_positions() {
        let mut registry = registry(6);
        let a = registry.insert(CellSize::new(2, 1), None, None);
        let b = registry.insert(CellSize::new(2, 1), None, None);
        let c = registry.insert(CellSize::new(4, 2), None, None);

        assert_eq!(registry.get(a).unwrap().position, CellPos::new(0, 0));
        assert_eq!(registry.get(b).unwrap().position, CellPos::new(2, 0));
        assert_eq!(registry.get(c).unwrap().position, CellPos::new(0, 1));
        assert!(!registry.has_overlaps());
    }

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let mut registry = registry(4);
        let a = registry.insert(CellSize::new(1, 1), None, None);
        let b = registry.insert(CellSize::new(1, 1), None, None);
        registry.remove(a);
        let c = registry.insert(CellSize::new(1, 1), None, None);
        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut registry = registry(4);
        registry.insert(CellSize::new(1, 1), None, None);
        assert!(registry.remove(99).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn move_out_of_bounds_is_rejected() {
        let mut registry = registry(4);
        let id = registry.insert(CellSize::new(2, 1), None, None);

        assert_eq!(registry.move_to(id, -1, 0), MoveOutcome::OutOfBounds);
        assert_eq!(registry.move_to(id, 3, 0), MoveOutcome::OutOfBounds);
        assert_eq!(registry.move_to(id, 0, -2), MoveOutcome::OutOfBounds);
        assert_eq!(registry.get(id).unwrap().position, CellPos::new(0, 0));
    }

    #[test]
    fn move_to_free_cell_commits() {
        let mut registry = registry(6);
        let id = registry.insert(CellSize::new(2, 1), None, None);
        assert_eq!(registry.move_to(id, 3, 2), MoveOutcome::Committed);
        assert_eq!(registry.get(id).unwrap().position, CellPos::new(3, 2));
        assert!(!registry.has_overlaps());
    }

    #[test]
    fn move_onto_equal_footprint_displaces_occupant() {
        let mut registry = registry(6);
        let a = registry.insert(CellSize::new(2, 1), None, None); // (0,0)
        let b = registry.insert(CellSize::new(2, 1), None, None); // (2,0)

        let outcome = registry.move_to(b, 0, 0);
        let MoveOutcome::Displaced { relocated } = outcome else {
            panic!("expected displacement, got {outcome:?}");
        };

        assert_eq!(registry.get(b).unwrap().position, CellPos::new(0, 0));
        assert_eq!(relocated.len(), 1);
        assert_eq!(relocated[0].0, a);
        // First free cell scanning from max(0, 0 - 2) = 0: (2, 0).
        assert_eq!(registry.get(a).unwrap().position, CellPos::new(2, 0));
        assert!(!registry.has_overlaps());
    }

    #[test]
    fn displaced_neighbor_keeps_column_bias_downward() {
        let mut registry = registry(4);
        let a = registry.insert(CellSize::new(4, 1), None, None); // row 0
        let b = registry.insert(CellSize::new(4, 1), None, None); // row 1
        let c = registry.insert(CellSize::new(4, 1), None, None); // row 2

        // Drop c onto b's row; b rescans from row max(0, 1-2)=0. Rows 0 and
        // 1 are taken (a, then c plus b's own still-stamped cells), and row
        // 2 opened up when c left it.
        let outcome = registry.move_to(c, 0, 1);
        assert!(matches!(outcome, MoveOutcome::Displaced { .. }));
        assert_eq!(registry.get(c).unwrap().position, CellPos::new(0, 1));
        assert_eq!(registry.get(b).unwrap().position, CellPos::new(0, 2));
        assert_eq!(registry.get(a).unwrap().position, CellPos::new(0, 0));
        assert!(!registry.has_overlaps());
    }

    #[test]
    fn resolution_is_single_pass() {
        // The relocation pass never re-checks relocated items against each
        // other beyond the per-relocation snapshot; what it does guarantee
        // is that each relocation lands on cells free at that instant.
        let mut registry = registry(4);
        let mover = registry.insert(CellSize::new(2, 2), None, None); // (0,0)
        registry.insert(CellSize::new(2, 2), None, None); // (2,0)
        registry.insert(CellSize::new(2, 2), None, None); // (0,2)

        let outcome = registry.move_to(mover, 2, 0);
        let MoveOutcome::Displaced { relocated } = outcome else {
            panic!("expected displacement");
        };
        assert_eq!(relocated.len(), 1);
        assert_eq!(registry.get(mover).unwrap().position, CellPos::new(2, 0));
        assert!(!registry.has_overlaps());
    }

    #[test]
    fn reflow_moves_only_overflowing_items() {
        let mut registry = registry(6);
        let wide = registry.insert(CellSize::new(4, 2), None, Some(CellPos::new(2, 0)));
        let small = registry.insert(CellSize::new(2, 1), None, Some(CellPos::new(0, 0)));

        let relocated = registry.reflow(4);
        assert_eq!(relocated.len(), 1);
        assert_eq!(relocated[0].0, wide);
        // Re-solved from row 0: (0,0)-(1,0) taken by `small`, own old cells
        // still stamped at x=2, so the wide item drops below both.
        assert_eq!(registry.get(wide).unwrap().position, CellPos::new(0, 2));
        assert_eq!(registry.get(small).unwrap().position, CellPos::new(0, 0));
        assert!(!registry.has_overlaps());
    }

    #[test]
    fn dirty_placements_track_changes_only() {
        let mut registry = registry(6);
        let a = registry.insert(CellSize::new(2, 1), None, None);
        let b = registry.insert(CellSize::new(2, 1), None, None);

        let first = registry.take_dirty_placements();
        assert_eq!(first.len(), 2);
        assert!(registry.take_dirty_placements().is_empty());

        registry.move_to(a, 4, 0);
        let dirty = registry.take_dirty_placements();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].0, a);
        assert_eq!(registry.get(b).unwrap().position, CellPos::new(2, 0));
    }

    #[test]
    fn payload_digest_detects_changes() {
        let mut registry = registry(6);
        let payload = WidgetPayload {
            js: Some("tick()".into()),
            ..WidgetPayload::default()
        };
        let id = registry.insert(CellSize::new(1, 1), Some(payload.clone()), None);

        assert!(!registry.set_payload(id, payload.clone()));
        let changed = WidgetPayload {
            js: Some("tock()".into()),
            ..payload
        };
        assert!(registry.set_payload(id, changed));
    }

    #[test]
    fn clear_resets_counter() {
        let mut registry = registry(6);
        registry.insert(CellSize::new(1, 1), None, None);
        registry.insert(CellSize::new(1, 1), None, None);
        let removed = registry.clear();
        assert_eq!(removed.len(), 2);
        let next = registry.insert(CellSize::new(1, 1), None, None);
        assert_eq!(next, 1);
    }
}
