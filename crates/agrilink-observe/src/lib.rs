//! Observability setup for AgriLink: tracing subscriber initialization
//! with optional OpenTelemetry export.

pub mod tracing_setup;
