//! Interactive rectangular-grid layout engine for a visual surface.
//!
//! `gridboard` places fixed-size widgets onto a virtual grid without
//! overlap, repositions them through pointer and touch gesture state
//! machines, reflows the grid when the surface resizes, and hosts widget
//! content behind a scoped content-handler boundary. The engine drives an
//! abstract [`Surface`]; ship the in-memory [`RecordingSurface`] for
//! headless hosts and tests, or [`TermSurface`] + [`CliDriver`] for a
//! terminal demo.

pub mod document;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod layout;
pub mod loader;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod render;
pub mod sandbox;
pub mod surface;
pub mod width;

pub use document::{ImportedDocument, LayoutDocument, WidgetEntry};
pub use engine::audit::{EngineAudit, EngineAuditEvent, EngineAuditStage, NullEngineAudit};
pub use engine::driver::{CliDriver, CliDriverError, DriverResult};
pub use engine::{EngineConfig, GridEngine, InputEvent};
pub use error::{GridError, Result};
pub use geometry::{CellPos, CellRect, CellSize, SurfaceMetrics, SurfacePoint};
pub use gesture::{
    GestureEffect, JITTER_THRESHOLD_PX, LONG_PRESS_MS, MOVE_THROTTLE_MS, PointerEvent,
    PointerMachine, PointerState, TouchEvent, TouchMachine, TouchState,
};
pub use layout::{OccupancyGrid, find_position};
pub use loader::{LoadProgress, LoadQueue, ResourceFetcher, ResourceRequest, ResourceSlot};
pub use logging::{
    FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, LoggingResult,
};
pub use metrics::{EngineMetrics, MetricSnapshot};
pub use registry::{GridItem, ItemId, ItemRegistry, ItemState, MoveOutcome, WidgetPayload};
pub use sandbox::{
    ContainerHandle, ContentHandler, DEFAULT_HANDLER_KIND, GlobalMap, HandlerError,
    SandboxOutcome, SandboxRuntime, WidgetBindings, WidgetInstance, scope_stylesheet,
};
pub use surface::{LoadIndicator, RecordingSurface, Surface, SurfaceConfig, TermSurface};
pub use width::display_width;
