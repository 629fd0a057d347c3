//! Terminal rendering for the demo surface.

mod core;

pub use core::{AnsiRenderer, ItemSprite, RendererSettings, fit_width};
