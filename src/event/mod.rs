//! Alert types shared between the detectors and the delivery path

mod event_types;

pub use event_types::{Alert, AlertKind, Severity};
