use chrono::{Datelike, NaiveDate};

use crate::model::*;

use super::EngineError;

/// Non-cancelled bookings on the same calendar date whose interval overlaps
/// the candidate span. Empty result = no conflict. Bookings on other dates
/// are never compared, even when a duration runs past midnight.
pub(crate) fn conflicts_on(state: &ProjectState, date: NaiveDate, span: &DaySpan) -> Vec<Booking> {
    state
        .on_date(date)
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled)
        .filter(|b| b.span().overlaps(span))
        .cloned()
        .collect()
}

pub(crate) fn validate_schedule(
    date: NaiveDate,
    start_minute: Minutes,
    duration_min: Minutes,
) -> Result<(), EngineError> {
    use crate::limits::*;
    if date.year() < MIN_SCHEDULE_YEAR || date.year() > MAX_SCHEDULE_YEAR {
        return Err(EngineError::LimitExceeded("scheduled date out of range"));
    }
    if !(0..24 * 60).contains(&start_minute) {
        return Err(EngineError::LimitExceeded("start time out of range"));
    }
    if duration_min <= 0 || duration_min > MAX_DURATION_MIN {
        return Err(EngineError::LimitExceeded("duration out of range"));
    }
    Ok(())
}

pub(crate) fn validate_text(value: &str, what: &'static str) -> Result<(), EngineError> {
    if value.len() > crate::limits::MAX_TEXT_LEN {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}
