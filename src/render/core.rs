use std::io::Write;

use crate::error::Result;
use crate::geometry::CellRect;
use crate::surface::LoadIndicator;
use crate::width::display_width;

/// Renderer runtime parameters: how many terminal characters one grid
/// cell spans on each axis.
#[derive(Debug, Clone)]
pub struct RendererSettings {
    pub cell_cols: u16,
    pub cell_rows: u16,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            cell_cols: 12,
            cell_rows: 5,
        }
    }
}

/// Everything the renderer needs to draw one item.
#[derive(Debug, Clone)]
pub struct ItemSprite<'a> {
    pub rect: CellRect,
    pub label: &'a str,
    /// Character offset applied on top of the placement (drag feedback).
    pub offset: (i32, i32),
    pub dragging: bool,
    pub indicator: Option<LoadIndicator>,
}

/// ANSI escape code renderer drawing item boxes onto a terminal.
pub struct AnsiRenderer {
    settings: RendererSettings,
}

impl AnsiRenderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self { settings }
    }

    pub fn with_default() -> Self {
        Self::new(RendererSettings::default())
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn render(&mut self, writer: &mut impl Write, sprites: &[ItemSprite<'_>]) -> Result<()> {
        write!(writer, "\x1b[2J")?;
        for sprite in sprites {
            self.render_sprite(writer, sprite)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn render_sprite(&self, writer: &mut impl Write, sprite: &ItemSprite<'_>) -> Result<()> {
        let cols = i32::from(sprite.rect.size.cols) * i32::from(self.settings.cell_cols);
        let rows = i32::from(sprite.rect.size.rows) * i32::from(self.settings.cell_rows);
        let left = i32::from(sprite.rect.pos.x) * i32::from(self.settings.cell_cols) + sprite.offset.0;
        let top = i32::from(sprite.rect.pos.y) * i32::from(self.settings.cell_rows) + sprite.offset.1;
        if cols < 2 || rows < 2 {
            return Ok(());
        }

        let inner = (cols - 2) as usize;
        let title = fit_width(sprite.label, inner);
        let (open, close) = if sprite.dragging { ("╔", "╗") } else { ("┌", "┐") };
        let horiz = if sprite.dragging { "═" } else { "─" };

        move_to(writer, left, top)?;
        if title.trim().is_empty() {
            write!(writer, "{open}{}{close}", horiz.repeat(inner))?;
        } else {
            write!(writer, "{open}{title}{close}")?;
        }

        let body_text = match sprite.indicator {
            Some(LoadIndicator::Loading) => Some("Loading..."),
            Some(LoadIndicator::Failed) => Some("Load Failed"),
            None => None,
        };

        for row in 1..rows - 1 {
            let content = if row == rows / 2 {
                body_text.map(|text| fit_width(text, inner)).unwrap_or_else(|| " ".repeat(inner))
            } else {
                " ".repeat(inner)
            };
            move_to(writer, left, top + row)?;
            write!(writer, "│{content}│")?;
        }

        move_to(writer, left, top + rows - 1)?;
        let bottom = if sprite.dragging { "╚" } else { "└" };
        let bottom_close = if sprite.dragging { "╝" } else { "┘" };
        write!(writer, "{bottom}{}{bottom_close}", horiz.repeat(inner))?;
        Ok(())
    }
}

fn move_to(writer: &mut impl Write, left: i32, top: i32) -> Result<()> {
    // Off-screen coordinates (transient drag offsets) are clamped to the
    // first row/column; ANSI addressing is 1-based.
    let row = top.max(0) + 1;
    let col = left.max(0) + 1;
    write!(writer, "\x1b[{row};{col}H")?;
    Ok(())
}

/// Truncate or pad `text` to exactly `width` display columns.
pub fn fit_width(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let mut candidate = out.clone();
        candidate.push(ch);
        let candidate_width = display_width(&candidate);
        if candidate_width > width {
            break;
        }
        out = candidate;
        used = candidate_width;
    }
    while used < width {
        out.push(' ');
        used += 1;
    }
    out
}
