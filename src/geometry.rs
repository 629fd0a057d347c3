use serde::{Deserialize, Serialize};

/// Item footprint measured in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSize {
    pub cols: u16,
    pub rows: u16,
}

impl CellSize {
    pub const fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    /// Preset footprints offered to hosts: 1×1, 2×1, 2×2, 4×2.
    pub const PRESETS: [CellSize; 4] = [
        CellSize::new(1, 1),
        CellSize::new(2, 1),
        CellSize::new(2, 2),
        CellSize::new(4, 2),
    ];
}

/// Top-left cell of a placed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellPos {
    pub x: u16,
    pub y: u16,
}

impl CellPos {
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned cell rectangle derived from an item's position and size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub pos: CellPos,
    pub size: CellSize,
}

impl CellRect {
    pub const fn new(pos: CellPos, size: CellSize) -> Self {
        Self { pos, size }
    }

    pub fn right(&self) -> u16 {
        self.pos.x.saturating_add(self.size.cols)
    }

    pub fn bottom(&self) -> u16 {
        self.pos.y.saturating_add(self.size.rows)
    }

    /// Strict AABB intersection: touching edges do not overlap.
    pub fn overlaps(&self, other: &CellRect) -> bool {
        self.pos.x < other.right()
            && self.right() > other.pos.x
            && self.pos.y < other.bottom()
            && self.bottom() > other.pos.y
    }

    pub fn contains_cell(&self, x: u16, y: u16) -> bool {
        x >= self.pos.x && x < self.right() && y >= self.pos.y && y < self.bottom()
    }
}

/// Point in surface pixel space, as delivered by pointer/touch events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SurfacePoint {
    pub x: f64,
    pub y: f64,
}

impl SurfacePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Fallback cell edge when the surface exposes no configuration.
pub const DEFAULT_CELL_PX: f64 = 100.0;
/// Fallback inter-cell gap.
pub const DEFAULT_GAP_PX: f64 = 0.0;
/// Surfaces at or below this width get the reduced cell edge.
pub const NARROW_SURFACE_PX: f64 = 768.0;
/// Cell edge used below the narrow-surface breakpoint.
pub const NARROW_CELL_PX: f64 = 80.0;

/// Pixel metrics of the surface grid.
///
/// Values come from the surface's configuration reads; absent values fall
/// back to the fixed defaults, so constructing metrics never fails.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMetrics {
    pub cell_px: f64,
    pub gap_px: f64,
}

impl Default for SurfaceMetrics {
    fn default() -> Self {
        Self {
            cell_px: DEFAULT_CELL_PX,
            gap_px: DEFAULT_GAP_PX,
        }
    }
}

impl SurfaceMetrics {
    pub fn new(cell_px: Option<f64>, gap_px: Option<f64>) -> Self {
        Self {
            cell_px: cell_px.unwrap_or(DEFAULT_CELL_PX),
            gap_px: gap_px.unwrap_or(DEFAULT_GAP_PX),
        }
    }

    /// Metrics for a surface of the given pixel width, applying the
    /// narrow-surface default when no explicit cell size is configured.
    pub fn for_surface(surface_px: f64, cell_px: Option<f64>, gap_px: Option<f64>) -> Self {
        let fallback = if surface_px <= NARROW_SURFACE_PX {
            NARROW_CELL_PX
        } else {
            DEFAULT_CELL_PX
        };
        Self {
            cell_px: cell_px.unwrap_or(fallback),
            gap_px: gap_px.unwrap_or(DEFAULT_GAP_PX),
        }
    }

    fn pitch(&self) -> f64 {
        let pitch = self.cell_px + self.gap_px;
        if pitch > 0.0 { pitch } else { DEFAULT_CELL_PX }
    }

    /// Logical column count for a surface of the given pixel width.
    pub fn grid_width(&self, surface_px: f64) -> u16 {
        let cols = (surface_px / self.pitch()).floor();
        if cols <= 0.0 { 0 } else { cols as u16 }
    }

    /// Nearest whole-cell delta for a pixel offset accumulated during a drag.
    pub fn cell_delta(&self, px_offset: f64) -> i32 {
        (px_offset / self.pitch()).round() as i32
    }

    /// Pixel origin of a cell position.
    pub fn cell_origin(&self, pos: CellPos) -> SurfacePoint {
        SurfacePoint::new(f64::from(pos.x) * self.pitch(), f64::from(pos.y) * self.pitch())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_excludes_touching_edges() {
        let a = CellRect::new(CellPos::new(0, 0), CellSize::new(2, 1));
        let b = CellRect::new(CellPos::new(2, 0), CellSize::new(2, 1));
        assert!(!a.overlaps(&b));

        let c = CellRect::new(CellPos::new(1, 0), CellSize::new(2, 1));
        assert!(a.overlaps(&c));
    }

    #[test]
    fn grid_width_floors() {
        let metrics = SurfaceMetrics::new(Some(100.0), Some(20.0));
        assert_eq!(metrics.grid_width(650.0), 5);
        assert_eq!(metrics.grid_width(599.0), 4);
    }

    #[test]
    fn defaults_apply_when_unconfigured() {
        let metrics = SurfaceMetrics::new(None, None);
        assert_eq!(metrics.cell_px, DEFAULT_CELL_PX);
        assert_eq!(metrics.gap_px, DEFAULT_GAP_PX);
        assert_eq!(metrics.grid_width(600.0), 6);
    }

    #[test]
    fn narrow_surface_shrinks_default_cell() {
        let metrics = SurfaceMetrics::for_surface(640.0, None, None);
        assert_eq!(metrics.cell_px, NARROW_CELL_PX);
        assert_eq!(metrics.grid_width(640.0), 8);

        let wide = SurfaceMetrics::for_surface(1200.0, None, None);
        assert_eq!(wide.cell_px, DEFAULT_CELL_PX);
    }

    #[test]
    fn cell_delta_rounds_to_nearest() {
        let metrics = SurfaceMetrics::default();
        assert_eq!(metrics.cell_delta(49.0), 0);
        assert_eq!(metrics.cell_delta(51.0), 1);
        assert_eq!(metrics.cell_delta(-149.0), -1);
        assert_eq!(metrics.cell_delta(-151.0), -2);
    }
}
