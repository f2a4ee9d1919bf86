//! Query trace hooks.
//!
//! Tracers observe evaluation; they never influence it. Events are emitted at
//! expression and rule-resolution boundaries.

use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Kind of trace event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceOp {
    /// A query or rule body starts.
    Enter,
    /// A query or rule body produced a result.
    Exit,
    /// An expression is about to be evaluated.
    Eval,
    /// Backtracking into an expression for another solution.
    Redo,
    /// An expression or body has no (more) solutions.
    Fail,
    /// Free-form message, e.g. from the `trace` builtin.
    Note,
}

impl fmt::Display for TraceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Enter => "Enter",
            Self::Exit => "Exit",
            Self::Eval => "Eval",
            Self::Redo => "Redo",
            Self::Fail => "Fail",
            Self::Note => "Note",
        };
        f.pad(s)
    }
}

/// One structured trace event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Kind of event.
    pub op: TraceOp,
    /// Identifier of the (sub)query emitting the event.
    pub query_id: u64,
    /// Identifier of the enclosing query; equal to `query_id` at the top level.
    pub parent_id: u64,
    /// Rule path or `query` for the top-level body.
    pub location: String,
    /// Human-readable detail.
    pub message: String,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<5} q{}<-q{} {} {}",
            self.op, self.query_id, self.parent_id, self.location, self.message
        )
    }
}

/// Observer of evaluation events.
pub trait QueryTracer: Send + Sync {
    /// Returning false lets the evaluator skip building events.
    fn enabled(&self) -> bool {
        true
    }

    fn trace(&self, event: &TraceEvent);
}

/// Tracer that keeps every event in memory.
#[derive(Debug, Default)]
pub struct BufferTracer {
    events: Mutex<Vec<TraceEvent>>,
}

impl BufferTracer {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected events.
    #[must_use]
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Collected events of one kind.
    #[must_use]
    pub fn events_of(&self, op: TraceOp) -> Vec<TraceEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.op == op)
            .collect()
    }

    /// Drops every recorded event.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl QueryTracer for BufferTracer {
    fn trace(&self, event: &TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(op: TraceOp) -> TraceEvent {
        TraceEvent {
            op,
            query_id: 1,
            parent_id: 0,
            location: "data.test.p".to_string(),
            message: "x = 1".to_string(),
        }
    }

    #[test]
    fn test_buffer_tracer_collects_in_order() {
        let tracer = BufferTracer::new();
        tracer.trace(&event(TraceOp::Enter));
        tracer.trace(&event(TraceOp::Eval));
        tracer.trace(&event(TraceOp::Exit));

        let ops: Vec<TraceOp> = tracer.events().iter().map(|e| e.op).collect();
        assert_eq!(ops, vec![TraceOp::Enter, TraceOp::Eval, TraceOp::Exit]);
        assert_eq!(tracer.events_of(TraceOp::Eval).len(), 1);

        tracer.clear();
        assert!(tracer.events().is_empty());
    }

    #[test]
    fn test_event_display_and_serde() {
        let e = event(TraceOp::Note);
        assert_eq!(e.to_string(), "Note  q1<-q0 data.test.p x = 1");
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["op"], "note");
    }
}
