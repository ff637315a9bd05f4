//! Append-only diagnostics log of notable engine transitions. This is
//! developer-facing telemetry the bin can dump as JSON; the queued game
//! events live in `events`, not here.

use serde::Serialize;

use crate::engine::Engine;

#[derive(Debug, Clone, Serialize)]
pub struct DiagEvent {
    pub sequence: u32,
    pub frame: u64,
    pub label: String,
}

#[derive(Serialize)]
pub struct EngineEventLog<'a> {
    pub total: usize,
    pub events: &'a [DiagEvent],
}

impl Engine {
    pub(crate) fn note(&mut self, label: String) {
        let sequence = self.diag.len() as u32;
        self.diag.push(DiagEvent {
            sequence,
            frame: self.frame,
            label,
        });
    }

    pub fn diag_events(&self) -> &[DiagEvent] {
        &self.diag
    }

    pub fn event_log(&self) -> EngineEventLog<'_> {
        EngineEventLog {
            total: self.diag.len(),
            events: &self.diag,
        }
    }
}
