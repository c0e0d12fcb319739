//! In-process telemetry.
//!
//! # SAFETY INVARIANT
//! Telemetry is a READ-ONLY side-effect layer.
//! It must **NEVER** be read inside decision logic (fusion, model, rules, sessions).
//!
//! # PRIVACY INVARIANT
//! Events must **NEVER** contain user content (window titles, file paths, descriptions).
//! Only ids, category ids, counts and durations are allowed.

pub mod event;
pub mod metrics;
pub mod recorder;

pub use event::TelemetryEvent;
pub use metrics::TelemetrySnapshot;
pub use recorder::TelemetryRecorder;
