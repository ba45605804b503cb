//! Lightweight cron expression parser.
//! Supports: "MIN HOUR DOM MON DOW" (5-field, no seconds)
//! Minute and hour are `*` or a single number; day/month/weekday must be `*`.
//! Example: "0 9 * * *" = every day at 9:00

use chrono::{DateTime, Duration, TimeZone, Timelike};

/// Parse a simple cron expression and compute the next run time strictly after `after`.
pub fn next_run_from_cron<Tz: TimeZone>(expression: &str, after: DateTime<Tz>) -> Option<DateTime<Tz>> {
    let parts: Vec<&str> = expression.split_whitespace().collect();
    if parts.len() != 5 {
        tracing::warn!(
            "Invalid cron expression: '{}' (need 5 fields: MIN HOUR DOM MON DOW)",
            expression
        );
        return None;
    }

    if parts[2..].iter().any(|f| *f != "*") {
        tracing::warn!("Unsupported cron expression: '{}' (day fields must be '*')", expression);
        return None;
    }

    let minutes = parse_field(parts[0], 0, 59)?;
    let hours = parse_field(parts[1], 0, 23)?;

    // Next whole minute after `after`
    let mut candidate = after + Duration::minutes(1);
    candidate = candidate
        .with_second(0)
        .and_then(|c| c.with_nanosecond(0))
        .unwrap_or(candidate);

    // Try up to 48 hours ahead
    for _ in 0..(48 * 60) {
        if minutes.contains(&candidate.minute()) && hours.contains(&candidate.hour()) {
            return Some(candidate);
        }
        candidate += Duration::minutes(1);
    }

    None
}

/// Parse a cron field into a list of matching values.
fn parse_field(field: &str, min: u32, max: u32) -> Option<Vec<u32>> {
    if field == "*" {
        return Some((min..=max).collect());
    }

    // Single number
    let n: u32 = field.parse().ok()?;
    if n >= min && n <= max {
        Some(vec![n])
    } else {
        None
    }
}
