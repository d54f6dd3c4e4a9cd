//! Test scenarios for integration testing
//!
//! - lifecycle: set up / tear down against a live server
//! - assertions: helper behavior end to end
//! - clients: per-variant wire behavior

pub mod assertions;
