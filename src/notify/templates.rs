//! Subject lines and HTML bodies for swap notifications.

use super::EmailMessage;
use crate::domain::ShiftRecord;

/// Which notification is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapNotice {
    /// A match was accepted and is waiting to be finalized.
    Accepted,
    /// Ownership was swapped; the schedule has changed.
    Completed,
}

fn describe(shift: &ShiftRecord) -> String {
    let mut line = format!(
        "{} {}&ndash;{} ({})",
        shift.date.format("%A %d %B %Y"),
        shift.start_time.format("%H:%M"),
        shift.end_time.format("%H:%M"),
        shift.shift_type(),
    );
    if let Some(truck) = &shift.truck_name {
        line.push_str(&format!(", truck {}", escape(truck)));
    }
    line
}

fn escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders the email for one party.
///
/// `given_up` is the shift this recipient offered, `taken_on` the shift
/// they receive in return.
#[must_use]
pub fn render(notice: SwapNotice, to: &str, given_up: &ShiftRecord, taken_on: &ShiftRecord) -> EmailMessage {
    let (subject, intro) = match notice {
        SwapNotice::Accepted => (
            "Your shift swap has been accepted",
            "A shift swap you are part of has been accepted. It will take effect once it is finalized.",
        ),
        SwapNotice::Completed => (
            "Shift swap confirmed: your schedule has changed",
            "Your shift swap is complete and your schedule has been updated.",
        ),
    };

    let html = format!(
        "<html><body>\
         <p>{intro}</p>\
         <table>\
         <tr><td><strong>You give up</strong></td><td>{}</td></tr>\
         <tr><td><strong>You work instead</strong></td><td>{}</td></tr>\
         </table>\
         <p>ShiftFlex</p>\
         </body></html>",
        describe(given_up),
        describe(taken_on),
    );

    EmailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        html,
    }
}
