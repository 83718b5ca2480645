//! Records which application is in the foreground every second and turns that stream into
//! durable hourly usage.
//!
//! Raw observations are appended to a small SQLite log, periodically rolled up into per hour,
//! per application totals, and reported from there.

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod rollup;
pub mod summary;
pub mod tracker;
pub mod utils;
