use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event as CrosstermEvent, KeyCode,
    MouseButton, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use thiserror::Error;

use crate::error::GridError;
use crate::geometry::SurfacePoint;
use crate::surface::TermSurface;

use super::{GridEngine, InputEvent};

pub type DriverResult<T> = std::result::Result<T, CliDriverError>;

#[derive(Debug, Error)]
pub enum CliDriverError {
    #[error("engine error: {0}")]
    Engine(#[from] GridError),
    #[error("terminal error: {0}")]
    Terminal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Terminal driver owning a [`GridEngine`] over a [`TermSurface`].
///
/// Manages raw mode, the alternate screen, and mouse capture; maps mouse
/// press/drag/release onto the pointer gesture machine (the top border of
/// an item is its drag handle) and feeds periodic ticks so timed gesture
/// state can advance. `q` or `Esc` exits.
pub struct CliDriver {
    engine: GridEngine<TermSurface>,
    tick_interval: Duration,
}

impl CliDriver {
    pub fn new(engine: GridEngine<TermSurface>) -> Self {
        Self {
            engine,
            tick_interval: Duration::from_millis(50),
        }
    }

    pub fn engine_mut(&mut self) -> &mut GridEngine<TermSurface> {
        &mut self.engine
    }

    pub fn run(mut self) -> DriverResult<()> {
        let mut stdout = io::stdout();
        self.enter(&mut stdout)?;
        let result = self.run_inner(&mut stdout);
        self.exit(&mut stdout);
        result
    }

    fn run_inner(&mut self, stdout: &mut impl Write) -> DriverResult<()> {
        let (cols, rows) = terminal::size()?;
        self.engine.surface_mut().set_terminal_size(cols, rows);
        self.engine.resize();

        let started = Instant::now();
        let mut last_tick = Instant::now();

        loop {
            let timeout = self
                .tick_interval
                .checked_sub(last_tick.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout)? {
                match event::read()? {
                    CrosstermEvent::Key(key) => {
                        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                            break;
                        }
                    }
                    CrosstermEvent::Mouse(mouse) => {
                        self.handle_mouse(mouse, started);
                    }
                    CrosstermEvent::Resize(new_cols, new_rows) => {
                        self.engine
                            .surface_mut()
                            .set_terminal_size(new_cols, new_rows);
                        self.engine.resize();
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= self.tick_interval {
                last_tick = Instant::now();
                self.engine.dispatch(InputEvent::Tick {
                    now_ms: started.elapsed().as_millis() as u64,
                });
            }

            if self.engine.surface().needs_flush() {
                self.engine.surface_mut().flush(stdout)?;
            }
        }

        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent, _started: Instant) {
        let (px, py) = self
            .engine
            .surface()
            .char_to_px(mouse.column, mouse.row);
        let at = SurfacePoint::new(px, py);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(id) = self.engine.surface().handle_at(mouse.column, mouse.row) {
                    self.engine.dispatch(InputEvent::DragStart { id, at });
                }
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                self.engine.dispatch(InputEvent::DragOver { at });
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.engine.dispatch(InputEvent::Drop { at });
                self.engine.dispatch(InputEvent::DragEnd);
            }
            _ => {}
        }
    }

    fn enter(&self, stdout: &mut impl Write) -> DriverResult<()> {
        terminal::enable_raw_mode().map_err(|err| CliDriverError::Terminal(err.to_string()))?;
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableMouseCapture,
            Hide,
            Clear(ClearType::All)
        )?;
        Ok(())
    }

    fn exit(&self, stdout: &mut impl Write) {
        execute!(stdout, Show, DisableMouseCapture, LeaveAlternateScreen).ok();
        terminal::disable_raw_mode().ok();
    }
}
