use chrono::Duration;

use crate::catalog::{self, ALTERNATIVE_SLOT_COUNT, ALTERNATIVE_START_MINUTE};
use crate::model::*;

// ── Retrospective conflict scan ──────────────────────────────────

/// Walk a project's bookings and report same-day overlaps between
/// chronologically adjacent pairs.
///
/// Only adjacent pairs are compared: with three bookings 08:00–10:00,
/// 09:00–11:00, 10:30–12:00 the first/second overlap is reported but a
/// first/third overlap would not be. The write-path conflict check is
/// all-pairs, so this scan only ever sees data that predates it.
pub fn detect_conflicts(bookings: &[Booking]) -> Vec<ConflictResolution> {
    let active: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled)
        .collect();

    let mut resolutions = Vec::new();
    // `bookings` is sorted by (date, start minute); each day is a run.
    let mut i = 0;
    while i < active.len() {
        let day = active[i].scheduled_date;
        let mut j = i;
        while j + 1 < active.len() && active[j + 1].scheduled_date == day {
            let (current, next) = (active[j], active[j + 1]);
            if current.span().end > next.span().start {
                resolutions.push(resolve(current, next));
            }
            j += 1;
        }
        i = j + 1;
    }
    resolutions
}

/// Build the remediation proposal for one conflicting pair: the second
/// booking gets one alternative slot per day offset 1..=7 from the first
/// booking's date, all at 08:00.
fn resolve(first: &Booking, second: &Booking) -> ConflictResolution {
    let first_name = catalog::profile(first.service).display_name;
    let alternatives = (1..=ALTERNATIVE_SLOT_COUNT)
        .map(|offset| AlternativeSlot {
            date: first.scheduled_date + Duration::days(offset),
            start_minute: ALTERNATIVE_START_MINUTE,
            reason: format!("إعادة جدولة لتجنب التعارض مع خدمة {first_name}"),
        })
        .collect();

    ConflictResolution {
        first: first.clone(),
        second: second.clone(),
        resolution: ResolutionKind::Reschedule,
        alternatives,
        impact: impact_summary(first, second),
    }
}

/// Descriptive only — names the two services and their combined estimated
/// cost; nothing downstream decides on it.
fn impact_summary(first: &Booking, second: &Booking) -> String {
    let total = first.estimated_cost + second.estimated_cost;
    format!(
        "تعارض زمني بين {} و{} بتكلفة تقديرية مشتركة {total} ريال",
        catalog::profile(first.service).display_name,
        catalog::profile(second.service).display_name,
    )
}
