//! Observability for the casting gate.
//!
//! - `metrics` - Prometheus metric definitions and recorder setup

pub mod metrics;
