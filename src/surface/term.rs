use std::collections::BTreeMap;
use std::io::Write;

use crate::error::Result;
use crate::geometry::CellRect;
use crate::registry::ItemId;
use crate::render::{AnsiRenderer, ItemSprite};

use super::{LoadIndicator, Surface, SurfaceConfig};

/// Logical pixels per grid cell in the terminal's coordinate mapping.
///
/// The engine works in square logical pixels; the terminal maps one grid
/// cell to `cell_cols x cell_rows` characters, so the driver converts
/// character coordinates into this space before dispatching events.
pub const TERM_CELL_PX: f64 = 100.0;

#[derive(Debug, Clone, Default)]
struct TermItem {
    label: String,
    placement: Option<CellRect>,
    drag_px: Option<(f64, f64)>,
    dragging: bool,
    indicator: Option<LoadIndicator>,
}

/// Terminal-backed surface for the demo driver.
///
/// Writes are buffered in memory; [`TermSurface::flush`] draws the current
/// state through the ANSI renderer. Sandbox style nodes have no terminal
/// counterpart and are tracked only so removal stays observable.
pub struct TermSurface {
    term_cols: u16,
    term_rows: u16,
    renderer: AnsiRenderer,
    items: BTreeMap<ItemId, TermItem>,
    styles: BTreeMap<ItemId, String>,
    dirty: bool,
}

impl TermSurface {
    pub fn new(term_cols: u16, term_rows: u16) -> Self {
        Self {
            term_cols,
            term_rows,
            renderer: AnsiRenderer::with_default(),
            items: BTreeMap::new(),
            styles: BTreeMap::new(),
            dirty: true,
        }
    }

    pub fn set_terminal_size(&mut self, cols: u16, rows: u16) {
        self.term_cols = cols;
        self.term_rows = rows;
        self.dirty = true;
    }

    fn cell_cols(&self) -> u16 {
        self.renderer.settings().cell_cols
    }

    fn cell_rows(&self) -> u16 {
        self.renderer.settings().cell_rows
    }

    /// Convert a terminal character position into engine pixel space.
    pub fn char_to_px(&self, col: u16, row: u16) -> (f64, f64) {
        (
            f64::from(col) / f64::from(self.cell_cols()) * TERM_CELL_PX,
            f64::from(row) / f64::from(self.cell_rows()) * TERM_CELL_PX,
        )
    }

    /// The item whose label border sits under the given character cell;
    /// the top border row acts as the drag handle.
    pub fn handle_at(&self, col: u16, row: u16) -> Option<ItemId> {
        self.items.iter().find_map(|(id, item)| {
            let rect = item.placement?;
            let left = rect.pos.x * self.cell_cols();
            let right = rect.right() * self.cell_cols();
            let top = rect.pos.y * self.cell_rows();
            (row == top && col >= left && col < right).then_some(*id)
        })
    }

    pub fn needs_flush(&self) -> bool {
        self.dirty
    }

    /// Draw the buffered state. Items that start below the visible rows
    /// are skipped.
    pub fn flush(&mut self, writer: &mut impl Write) -> Result<()> {
        let visible_rows = i32::from(self.term_rows);
        let sprites: Vec<ItemSprite<'_>> = self
            .items
            .values()
            .filter_map(|item| {
                let rect = item.placement?;
                if i32::from(rect.pos.y) * i32::from(self.renderer.settings().cell_rows)
                    >= visible_rows
                {
                    return None;
                }
                let offset = item
                    .drag_px
                    .map(|(dx, dy)| {
                        (
                            (dx / TERM_CELL_PX * f64::from(self.cell_cols())).round() as i32,
                            (dy / TERM_CELL_PX * f64::from(self.cell_rows())).round() as i32,
                        )
                    })
                    .unwrap_or((0, 0));
                Some(ItemSprite {
                    rect,
                    label: &item.label,
                    offset,
                    dragging: item.dragging,
                    indicator: item.indicator,
                })
            })
            .collect();
        self.renderer.render(writer, &sprites)?;
        self.dirty = false;
        Ok(())
    }
}

impl Surface for TermSurface {
    fn attach_item(&mut self, id: ItemId, label: &str) {
        self.items.insert(
            id,
            TermItem {
                label: label.to_string(),
                ..TermItem::default()
            },
        );
        self.dirty = true;
    }

    fn detach_item(&mut self, id: ItemId) {
        self.items.remove(&id);
        self.dirty = true;
    }

    fn apply_placement(&mut self, id: ItemId, rect: CellRect) {
        if let Some(item) = self.items.get_mut(&id) {
            item.placement = Some(rect);
            item.drag_px = None;
            self.dirty = true;
        }
    }

    fn mark_dragging(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.dragging = true;
            self.dirty = true;
        }
    }

    fn unmark_dragging(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.dragging = false;
            self.dirty = true;
        }
    }

    fn set_drag_visual(&mut self, id: ItemId, dx: f64, dy: f64) {
        if let Some(item) = self.items.get_mut(&id) {
            item.drag_px = Some((dx, dy));
            self.dirty = true;
        }
    }

    fn clear_drag_visual(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.drag_px = None;
            self.dirty = true;
        }
    }

    fn set_markup(&mut self, _id: ItemId, _markup: &str) {
        // Markup has no terminal rendering; widgets draw via handlers.
    }

    fn set_indicator(&mut self, id: ItemId, indicator: LoadIndicator) {
        if let Some(item) = self.items.get_mut(&id) {
            item.indicator = Some(indicator);
            self.dirty = true;
        }
    }

    fn clear_indicator(&mut self, id: ItemId) {
        if let Some(item) = self.items.get_mut(&id) {
            item.indicator = None;
            self.dirty = true;
        }
    }

    fn inject_style(&mut self, id: ItemId, css: &str) {
        self.styles.insert(id, css.to_string());
    }

    fn remove_style(&mut self, id: ItemId) {
        self.styles.remove(&id);
    }

    fn width_px(&self) -> f64 {
        f64::from(self.term_cols) / f64::from(self.cell_cols()) * TERM_CELL_PX
    }

    fn config(&self) -> SurfaceConfig {
        SurfaceConfig {
            cell_px: Some(TERM_CELL_PX),
            gap_px: Some(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CellPos, CellSize};

    #[test]
    fn grid_width_follows_terminal_columns() {
        // 80 columns at 12 chars per cell: 6 whole cells.
        let surface = TermSurface::new(80, 24);
        assert!((surface.width_px() - 80.0 / 12.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn handle_is_the_top_border_row() {
        let mut surface = TermSurface::new(80, 24);
        surface.attach_item(1, "w");
        surface.apply_placement(1, CellRect::new(CellPos::new(1, 1), CellSize::new(2, 1)));

        // Cell (1,1) spans chars 12..36 horizontally, top border at row 5.
        assert_eq!(surface.handle_at(12, 5), Some(1));
        assert_eq!(surface.handle_at(35, 5), Some(1));
        assert_eq!(surface.handle_at(12, 6), None);
        assert_eq!(surface.handle_at(11, 5), None);
    }

    #[test]
    fn flush_clears_dirty() {
        let mut surface = TermSurface::new(80, 24);
        surface.attach_item(1, "w");
        surface.apply_placement(1, CellRect::new(CellPos::new(0, 0), CellSize::new(1, 1)));
        assert!(surface.needs_flush());

        let mut out = Vec::new();
        surface.flush(&mut out).unwrap();
        assert!(!surface.needs_flush());
        assert!(!out.is_empty());
    }
}
