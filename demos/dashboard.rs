//! Terminal dashboard demo.
//!
//! Drag items by their top border with the mouse; `q` or `Esc` exits.
//! Run with: `cargo run --example dashboard`

use gridboard::{
    CellSize, CliDriver, ContentHandler, GridEngine, HandlerError, TermSurface, WidgetBindings,
    WidgetInstance, WidgetPayload,
};

struct TickerInstance;

impl WidgetInstance for TickerInstance {}

struct TickerHandler;

impl ContentHandler for TickerHandler {
    fn instantiate(
        &self,
        bindings: WidgetBindings<'_>,
    ) -> Result<Box<dyn WidgetInstance>, HandlerError> {
        if bindings.script.is_none() {
            return Err(HandlerError("ticker widget needs script source".into()));
        }
        Ok(Box::new(TickerInstance))
    }
}

fn labelled(text: &str) -> Option<WidgetPayload> {
    Some(WidgetPayload {
        text: Some(text.to_string()),
        ..WidgetPayload::default()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = GridEngine::new(TermSurface::new(80, 24));
    engine.register_handler("ticker", Box::new(TickerHandler));

    engine.add_item(CellSize::new(2, 1), labelled("Clock"), None, None);
    engine.add_item(CellSize::new(2, 1), labelled("Weather"), None, None);
    engine.add_item(CellSize::new(4, 2), labelled("Activity"), None, None);
    engine.add_item(
        CellSize::new(1, 1),
        Some(WidgetPayload {
            text: Some("Ticker".to_string()),
            kind: Some("ticker".to_string()),
            js: Some("tick()".to_string()),
            ..WidgetPayload::default()
        }),
        None,
        None,
    );

    CliDriver::new(engine).run()?;
    Ok(())
}
