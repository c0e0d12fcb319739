use std::collections::VecDeque;

use super::event::TelemetryEvent;
use super::metrics::{compute_snapshot, TelemetrySnapshot};

const MAX_EVENTS: usize = 10_000;

#[derive(Debug, Default)]
pub struct TelemetryRecorder {
    buffer: VecDeque<TelemetryEvent>,
}

impl TelemetryRecorder {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn record(&mut self, event: TelemetryEvent) {
        if self.buffer.len() >= MAX_EVENTS {
            self.buffer.pop_front();
        }
        self.buffer.push_back(event);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        compute_snapshot(&self.buffer)
    }

    pub fn events(&self) -> impl Iterator<Item = &TelemetryEvent> {
        self.buffer.iter()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Outcome;
    use uuid::Uuid;

    #[test]
    fn ring_buffer_is_bounded() {
        let mut rec = TelemetryRecorder::new();
        for _ in 0..MAX_EVENTS + 5 {
            rec.record(TelemetryEvent::EncodingFailed);
        }
        assert_eq!(rec.len(), MAX_EVENTS);
    }

    #[test]
    fn acceptance_rate() {
        let mut rec = TelemetryRecorder::new();
        for outcome in [Outcome::Accepted, Outcome::Ignored, Outcome::TimedOut, Outcome::Accepted] {
            rec.record(TelemetryEvent::SessionResolved {
                session_id: Uuid::new_v4(),
                outcome,
                response_ms: 100,
            });
        }
        let snap = rec.snapshot();
        assert_eq!(snap.feedback.total, 4);
        assert_eq!(snap.feedback.acceptance_rate, 0.5);
        assert_eq!(snap.feedback.avg_response_ms, 100.0);
    }
}
