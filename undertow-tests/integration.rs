//! Integration tests for Undertow
//!
//! These tests drive the adapter against simulated swarms whose metadata
//! arrives late and whose bytes arrive in irregular chunks, through both the
//! async and the blocking surfaces.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/blocking_surface.rs"]
mod blocking_surface;
#[path = "integration/read_properties.rs"]
mod read_properties;
#[path = "integration/readiness.rs"]
mod readiness;
#[path = "integration/selection.rs"]
mod selection;
#[path = "integration/short_reads.rs"]
mod short_reads;
