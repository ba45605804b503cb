//! Email rendering.

use tuitionbell_core::{NotificationKind, OutgoingEmail, Student};

/// Build the parent email for a classified student from the literal record fields.
pub fn compose(student: &Student, kind: NotificationKind) -> OutgoingEmail {
    OutgoingEmail {
        to: student.email.clone(),
        subject: format!("Payment {} for {}", kind, student.name),
        body: format!(
            "Dear {},\n\nThis is a {} notification for {}'s payment due on {}.",
            student.parent_name, kind, student.name, student.next_due_date
        ),
    }
}
