//!  Storage is organized through [database::Database].
//!  The basic idea is:
//!   - There is a single SQLite file owned by a dedicated storage thread.
//!   - Every sampled second lands in the `records` table first.
//!   - Rollups fold `records` into `hourly_records`, which keeps per hour, per application
//!     durations forever.

pub mod database;
pub mod entities;
pub mod migrations;
pub mod raw_events;
pub mod record_event;
pub mod registry;
