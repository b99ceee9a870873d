//! Observability setup for Wayfinder: structured logging and optional
//! OpenTelemetry span export.

pub mod tracing_setup;
