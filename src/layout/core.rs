use crate::geometry::{CellPos, CellRect, CellSize};
use crate::registry::ItemId;

/// Disposable snapshot of which cells are taken by which item.
///
/// Always recomputed from the current item set before a placement or
/// collision decision; never incrementally maintained. Rows grow lazily as
/// items are stamped below the current height.
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    width: u16,
    rows: Vec<Vec<Option<ItemId>>>,
}

impl OccupancyGrid {
    pub fn new(width: u16) -> Self {
        Self {
            width,
            rows: Vec::new(),
        }
    }

    /// Snapshot the footprints of every `(id, rect)` pair.
    pub fn capture(width: u16, footprints: impl IntoIterator<Item = (ItemId, CellRect)>) -> Self {
        let mut grid = Self::new(width);
        for (id, rect) in footprints {
            grid.occupy(id, rect);
        }
        grid
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    /// Number of rows currently materialised.
    pub fn height(&self) -> u16 {
        self.rows.len() as u16
    }

    pub fn occupant(&self, x: u16, y: u16) -> Option<ItemId> {
        self.rows
            .get(usize::from(y))
            .and_then(|row| row.get(usize::from(x)))
            .copied()
            .flatten()
    }

    /// Stamp an item's footprint, growing rows as needed. Cells beyond the
    /// grid width are ignored rather than rejected; the solver never offers
    /// such a placement, so stray cells only occur for footprints that a
    /// pending reflow is about to relocate.
    pub fn occupy(&mut self, id: ItemId, rect: CellRect) {
        let width = self.width;
        for y in rect.pos.y..rect.bottom() {
            let row = self.row_mut(y);
            for x in rect.pos.x..rect.right() {
                if x < width {
                    row[usize::from(x)] = Some(id);
                }
            }
        }
    }

    /// Whether a footprint of `size` anchored at `(x, y)` fits the grid
    /// width and covers only free cells.
    pub fn fits(&self, x: u16, y: u16, size: CellSize) -> bool {
        if x.saturating_add(size.cols) > self.width {
            return false;
        }
        for dy in 0..size.rows {
            for dx in 0..size.cols {
                if self.occupant(x + dx, y + dy).is_some() {
                    return false;
                }
            }
        }
        true
    }

    fn row_mut(&mut self, y: u16) -> &mut Vec<Option<ItemId>> {
        let width = usize::from(self.width);
        let needed = usize::from(y) + 1;
        if self.rows.len() < needed {
            self.rows.resize_with(needed, || vec![None; width]);
        }
        &mut self.rows[usize::from(y)]
    }
}

/// First free top-left cell for a footprint of `size`.
///
/// Row-major scan from `start_row` through one row past the current height,
/// wrapping to `[0, start_row)` before giving up; the final fallback grows
/// the grid downward at `(0, height)`. Never fails, and the first-fit bias
/// makes the result deterministic for a given snapshot.
pub fn find_position(size: CellSize, occupancy: &OccupancyGrid, start_row: u16) -> CellPos {
    let height = occupancy.height();

    for y in start_row..=height {
        if let Some(x) = scan_row(size, occupancy, y) {
            return CellPos::new(x, y);
        }
    }

    for y in 0..start_row {
        if let Some(x) = scan_row(size, occupancy, y) {
            return CellPos::new(x, y);
        }
    }

    CellPos::new(0, height)
}

fn scan_row(size: CellSize, occupancy: &OccupancyGrid, y: u16) -> Option<u16> {
    (0..occupancy.width()).find(|&x| occupancy.fits(x, y, size))
}
