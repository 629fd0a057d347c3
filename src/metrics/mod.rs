use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

/// Counters accumulated by a running engine.
#[derive(Debug, Default, Clone)]
pub struct EngineMetrics {
    events: u64,
    commands: u64,
    placements: u64,
    moves: u64,
    conflict_relocations: u64,
    layout_writes: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// One raw input event dispatched to a gesture machine.
    pub fn record_event(&mut self) {
        self.events = self.events.saturating_add(1);
    }

    /// One placement command produced by a gesture.
    pub fn record_command(&mut self) {
        self.commands = self.commands.saturating_add(1);
    }

    /// One solver-assigned placement (insert, reflow, or relocation).
    pub fn record_placement(&mut self) {
        self.placements = self.placements.saturating_add(1);
    }

    pub fn record_move(&mut self) {
        self.moves = self.moves.saturating_add(1);
    }

    pub fn record_conflict_relocations(&mut self, count: usize) {
        if count > 0 {
            self.conflict_relocations = self.conflict_relocations.saturating_add(count as u64);
        }
    }

    /// Dirty placements written to the surface in one layout application.
    pub fn record_layout_writes(&mut self, count: usize) {
        if count > 0 {
            self.layout_writes = self.layout_writes.saturating_add(count as u64);
        }
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            events: self.events,
            commands: self.commands,
            placements: self.placements,
            moves: self.moves,
            conflict_relocations: self.conflict_relocations,
            layout_writes: self.layout_writes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub events: u64,
    pub commands: u64,
    pub placements: u64,
    pub moves: u64,
    pub conflict_relocations: u64,
    pub layout_writes: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        let mut fields = LogFields::new();
        fields.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        fields.insert("events".to_string(), json!(self.events));
        fields.insert("commands".to_string(), json!(self.commands));
        fields.insert("placements".to_string(), json!(self.placements));
        fields.insert("moves".to_string(), json!(self.moves));
        fields.insert(
            "conflict_relocations".to_string(),
            json!(self.conflict_relocations),
        );
        fields.insert("layout_writes".to_string(), json!(self.layout_writes));
        LogEvent::with_fields(LogLevel::Info, target, "engine_metrics", fields)
    }
}
