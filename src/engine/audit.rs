//! Engine lifecycle audit hooks.
//!
//! Lightweight instrumentation so hosts can observe the engine's major
//! transitions. Records carry a stage identifier plus structured metadata
//! so downstream code can log, buffer, or visualize the progression
//! without contorting the engine itself.

use std::time::SystemTime;

use serde_json::Value;

/// Distinct checkpoints emitted by `GridEngine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineAuditStage {
    /// Engine bound to a surface and metrics resolved.
    EngineInitialized,
    /// An item was inserted and placed.
    ItemInserted,
    /// An item was removed and its sandbox torn down.
    ItemRemoved,
    /// A placement command was committed (directly or with displacement).
    ItemMoved,
    /// Conflicting neighbors were relocated by the solver.
    ConflictsRelocated,
    /// Dirty placements were written to the surface.
    LayoutApplied,
    /// The surface width changed and overflowing items reflowed.
    SurfaceResized,
    /// A sandbox finished initializing.
    SandboxInitialized,
    /// A sandbox failed to initialize; its item went inert.
    SandboxFailed,
    /// A resource load completed and the payload was installed.
    LoadCompleted,
    /// A resource load failed; the item keeps an error indicator.
    LoadFailed,
    /// An import replaced the whole surface.
    ImportApplied,
    /// An import was rejected.
    ImportRejected,
    /// A bulk reset rebuilt the surface.
    SurfaceReset,
}

/// Structured audit entry.
#[derive(Debug, Clone)]
pub struct EngineAuditEvent {
    pub timestamp: SystemTime,
    pub stage: EngineAuditStage,
    pub details: Vec<(String, Value)>,
}

impl EngineAuditEvent {
    pub fn new(stage: EngineAuditStage) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details: Vec::new(),
        }
    }

    pub fn with_details(stage: EngineAuditStage, details: Vec<(String, Value)>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            stage,
            details,
        }
    }
}

/// Trait implemented by any audit sink.
pub trait EngineAudit: Send + Sync {
    fn record(&self, event: EngineAuditEvent);
}

/// Default no-op implementation used when auditing is disabled.
#[derive(Debug, Default)]
pub struct NullEngineAudit;

impl EngineAudit for NullEngineAudit {
    fn record(&self, _event: EngineAuditEvent) {}
}
