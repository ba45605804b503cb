//! Due-date classification.

use chrono::NaiveDate;
use tuitionbell_core::NotificationKind;

/// Signed whole days from `today` to `due`. Negative once the date has passed.
pub fn days_until(due: NaiveDate, today: NaiveDate) -> i64 {
    (due - today).num_days()
}

/// Map a day distance to a contact type. Any distance not listed gets nothing.
pub fn classify(days_diff: i64) -> Option<NotificationKind> {
    match days_diff {
        7 | 3 | 1 => Some(NotificationKind::Reminder),
        0 => Some(NotificationKind::Due),
        -1 | -3 | -7 => Some(NotificationKind::Overdue),
        _ => None,
    }
}
