//! Payment markers inside a booking's free-text notes.
//!
//! Older monitoring views learn a booking's payment status by searching the
//! notes for a marker substring. Records written now carry a structured
//! `payment_status`, but the notes keep exactly one marker so those readers
//! keep working. Matching is ASCII case-insensitive and position-independent.

use super::booking::{PaymentMethod, PaymentStatus};
use std::ops::Range;

pub const UNPAID_MARKER: &str = "Payment: Unpaid";
pub const PARTIAL_MARKER: &str = "Payment: Partial";
pub const PAID_MARKER: &str = "Payment: Paid";

const SEPARATOR: &str = " | ";

/// Marker text written for a status.
pub fn marker_for(status: PaymentStatus, method: Option<PaymentMethod>) -> String {
    match (status, method) {
        (PaymentStatus::Unpaid, _) => UNPAID_MARKER.to_string(),
        (PaymentStatus::Partial, _) => PARTIAL_MARKER.to_string(),
        (PaymentStatus::Paid, Some(method)) => format!("{} via {}", PAID_MARKER, method.label()),
        (PaymentStatus::Paid, None) => PAID_MARKER.to_string(),
    }
}

/// Status recorded in `notes`, if any marker is present.
///
/// A paid marker or a bare "paid via <method>" wins over anything else.
pub fn read_status(notes: &str) -> Option<PaymentStatus> {
    let ranges = marker_ranges(notes);
    let statuses: Vec<PaymentStatus> = ranges.iter().map(|(_, status)| *status).collect();
    if statuses.contains(&PaymentStatus::Paid) {
        Some(PaymentStatus::Paid)
    } else if statuses.contains(&PaymentStatus::Partial) {
        Some(PaymentStatus::Partial)
    } else if statuses.contains(&PaymentStatus::Unpaid) {
        Some(PaymentStatus::Unpaid)
    } else {
        None
    }
}

/// Rewrites `notes` so it carries exactly one marker for `status`.
///
/// The first existing marker is replaced in place; any further markers are
/// dropped. With no marker present the new one is appended.
pub fn write_status(notes: &str, status: PaymentStatus, method: Option<PaymentMethod>) -> String {
    let marker = marker_for(status, method);
    let ranges = marker_ranges(notes);

    let Some(((first, _), rest)) = ranges.split_first() else {
        return if notes.trim().is_empty() {
            marker
        } else {
            format!("{}{}{}", notes.trim_end(), SEPARATOR, marker)
        };
    };

    let mut out = String::with_capacity(notes.len() + marker.len());
    out.push_str(&notes[..first.start]);
    out.push_str(&marker);
    let mut cursor = first.end;
    for (range, _) in rest {
        let mut start = range.start;
        if notes[cursor..start].ends_with(SEPARATOR) {
            start -= SEPARATOR.len();
        }
        out.push_str(&notes[cursor..start]);
        cursor = range.end;
    }
    out.push_str(&notes[cursor..]);
    out
}

fn patterns() -> Vec<(String, PaymentStatus)> {
    let mut patterns = Vec::new();
    for method in PaymentMethod::ALL {
        patterns.push((
            format!("{} via {}", PAID_MARKER, method.label()).to_ascii_lowercase(),
            PaymentStatus::Paid,
        ));
        patterns.push((
            format!("paid via {}", method.label()).to_ascii_lowercase(),
            PaymentStatus::Paid,
        ));
    }
    patterns.push((PARTIAL_MARKER.to_ascii_lowercase(), PaymentStatus::Partial));
    patterns.push((UNPAID_MARKER.to_ascii_lowercase(), PaymentStatus::Unpaid));
    patterns.push((PAID_MARKER.to_ascii_lowercase(), PaymentStatus::Paid));
    patterns
}

// ASCII lowercasing keeps byte offsets aligned with the original text.
fn marker_ranges(notes: &str) -> Vec<(Range<usize>, PaymentStatus)> {
    let haystack = notes.to_ascii_lowercase();
    let patterns = patterns();
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < haystack.len() {
        if !haystack.is_char_boundary(i) {
            i += 1;
            continue;
        }
        if !starts_word(&haystack, i) {
            i += 1;
            continue;
        }
        let hit = patterns.iter().find(|(pattern, _)| {
            haystack[i..].starts_with(pattern.as_str()) && ends_word(&haystack, i + pattern.len())
        });
        match hit {
            Some((pattern, status)) => {
                ranges.push((i..i + pattern.len(), *status));
                i += pattern.len();
            }
            None => i += 1,
        }
    }
    ranges
}

// a marker must not be glued to surrounding letters or digits
fn starts_word(haystack: &str, at: usize) -> bool {
    haystack[..at]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric())
}

fn ends_word(haystack: &str, at: usize) -> bool {
    haystack[at..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric())
}
