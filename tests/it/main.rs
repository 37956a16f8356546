//! Single test binary entry point.
//!
//! All tests compile into one binary to keep linking to a single pass.
//!
//! Structure:
//! - helpers: grid builders and row fixtures
//! - integration: multi-component workflows through `GridEngine`
//! - unit: single-component tests

mod helpers;
mod integration;
mod unit;
