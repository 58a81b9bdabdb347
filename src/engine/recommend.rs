use std::collections::HashSet;

use chrono::{Duration, NaiveDate};

use crate::catalog::{
    self, DAYS_SAVED_PER_RECOMMENDATION, EFFICIENCY_PCT, RECOMMENDATION_LEAD_DAYS,
    RECOMMENDATION_ORDER, SAVINGS_PER_RECOMMENDATION, WEATHER_ADVICE, WEATHER_IMPACT,
};
use crate::model::*;

// ── Scheduling recommender ───────────────────────────────────────
//
// Greedy placement over the fixed catalog order. Not an optimizer: dates
// advance by per-type buffers and the benefit figures are count-derived
// placeholders.

/// Propose slots for every service type the project has not booked yet.
/// Pure: `today` is a parameter so callers control the clock.
pub fn recommend(bookings: &[Booking], today: NaiveDate) -> SchedulingRecommendation {
    let booked: HashSet<ServiceType> = bookings
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled)
        .map(|b| b.service)
        .collect();

    let mut date = today + Duration::days(RECOMMENDATION_LEAD_DAYS);
    let mut slots = Vec::new();
    for service in RECOMMENDATION_ORDER {
        if booked.contains(&service) {
            continue;
        }
        let p = catalog::profile(service);
        slots.push(RecommendedSlot {
            service,
            date,
            start_minute: p.optimal_start_minute,
            priority: p.priority,
            justification: p.justification,
            depends_on: p.depends_on.to_vec(),
        });
        date += Duration::days(p.buffer_days);
    }

    let count = slots.len() as f64;
    let weather = slots
        .iter()
        .map(|s| WeatherNote {
            service: s.service,
            impact: WEATHER_IMPACT,
            advice: WEATHER_ADVICE,
        })
        .collect();

    SchedulingRecommendation {
        slots,
        estimate: OptimizationEstimate {
            cost_savings: count * SAVINGS_PER_RECOMMENDATION,
            days_saved: count * DAYS_SAVED_PER_RECOMMENDATION,
            efficiency_pct: EFFICIENCY_PCT,
        },
        weather,
    }
}
