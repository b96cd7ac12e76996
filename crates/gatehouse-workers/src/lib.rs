//! gatehouse-workers — the consumers on the hardware side of the bus.
//!
//! Exactly one process owns the physical access controller and one owns
//! the directory tenant; everything else reaches them through the
//! file-backed bus. Each worker decodes the operation payload, drives its
//! device or tenant through a client trait, and reports a structured
//! `{status, data?, error?}` outcome. Device timeouts are retried with
//! bounded attempts here; the bus itself never retries.

pub mod board;
pub mod config;
pub mod directory;
