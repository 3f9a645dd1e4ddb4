//! Time subsystem.
//!
//! Per-frame delta time, total time and frames-per-second.

mod time_keeper;

pub use time_keeper::TimeKeeper;
