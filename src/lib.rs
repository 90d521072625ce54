//! Dashboard-to-e-paper rendering server.
//!
//! Captures a rendered dashboard page with a headless browser, then resizes,
//! reorients, and dithers the screenshot down to the small fixed palette an
//! e-paper panel can physically display.

pub mod config;
pub mod render;
pub mod web;
