//! # TuitionBell Scheduler
//!
//! Fires the notification engine once a day. Tokio timers only: the loop
//! sleeps until the next cron match, runs the engine, logs the outcome and
//! goes back to sleep.
//!
//! ```text
//! DailyTrigger ("0 9 * * *")
//!   └── sleep until next match → NotificationEngine::run_now() → log
//! ```

pub mod cron;
pub mod daily;

pub use daily::{DailyTrigger, run_and_log, spawn_daily};
