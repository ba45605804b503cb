//! Daily trigger — the scheduled entry point into the notification engine.
//!
//! Unlike the HTTP trigger nobody waits on the result here, so every outcome
//! (including an aborted run) ends up in the logs and nowhere else.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, TimeZone};

use tuitionbell_core::config::ScheduleConfig;
use tuitionbell_core::{NotificationRunResult, Result};
use tuitionbell_notify::NotificationEngine;

use crate::cron;

/// When the daily run fires.
#[derive(Debug, Clone)]
pub struct DailyTrigger {
    expression: String,
}

impl DailyTrigger {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            expression: config.cron_expression(),
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Next fire time strictly after `after`.
    pub fn next_after<Tz: TimeZone>(&self, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
        cron::next_run_from_cron(&self.expression, after)
    }
}

/// Run the engine once against `reference` and log what happened.
pub async fn run_and_log(
    engine: &NotificationEngine,
    reference: DateTime<FixedOffset>,
) -> Option<NotificationRunResult> {
    match engine.run(reference).await {
        Ok(result) => {
            for outcome in &result.results {
                match (&outcome.kind, &outcome.error) {
                    (Some(kind), _) => tracing::info!("📣 {} → {kind}", outcome.student),
                    (None, Some(error)) => tracing::warn!("📣 {} → {error}", outcome.student),
                    (None, None) => {}
                }
            }
            Some(result)
        }
        Err(e) => {
            tracing::error!("❌ Scheduled notification run failed: {e}");
            None
        }
    }
}

/// Scheduler loop. Meant to be handed to `tokio::spawn`; never returns
/// unless the trigger can't produce a next fire time.
pub async fn spawn_daily(engine: Arc<NotificationEngine>, trigger: DailyTrigger) {
    tracing::info!("⏰ Scheduler started ({})", trigger.expression());

    loop {
        let now = Local::now();
        let Some(next) = trigger.next_after(now) else {
            tracing::error!("❌ No upcoming run for '{}' — scheduler stopped", trigger.expression());
            return;
        };
        tracing::info!("⏰ Next notification run at {}", next.format("%Y-%m-%d %H:%M %Z"));

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;

        run_and_log(&engine, Local::now().fixed_offset()).await;
    }
}
