use chrono::{Local, NaiveDate};

use crate::catalog;
use crate::model::*;

use super::conflict::conflicts_on;
use super::{Engine, dependencies, recommend, resolver};

impl Engine {
    /// All bookings for a project, scheduled date ascending. Unknown
    /// projects yield an empty list — advisory reads never error.
    pub async fn bookings_for_project(&self, project_id: &str) -> Vec<Booking> {
        let Some(ps) = self.get_project(project_id) else {
            return Vec::new();
        };
        let guard = ps.read().await;
        guard.bookings.clone()
    }

    /// Display-ready calendar projection. Pure mapping, no filtering:
    /// cancelled bookings stay visible with their status carried through.
    pub async fn calendar_events(&self, project_id: &str) -> Vec<CalendarEvent> {
        let Some(ps) = self.get_project(project_id) else {
            return Vec::new();
        };
        let guard = ps.read().await;
        guard.bookings.iter().map(to_calendar_event).collect()
    }

    /// Probe a candidate slot without writing. Empty = free to book.
    pub async fn check_booking_conflicts(
        &self,
        project_id: &str,
        date: NaiveDate,
        start_minute: Minutes,
        duration_min: Minutes,
    ) -> Vec<Booking> {
        if duration_min <= 0 {
            return Vec::new();
        }
        let Some(ps) = self.get_project(project_id) else {
            return Vec::new();
        };
        let guard = ps.read().await;
        conflicts_on(&guard, date, &DaySpan::new(start_minute, start_minute + duration_min))
    }

    /// Retrospective same-day overlap scan with remediation proposals.
    pub async fn manage_booking_conflicts(&self, project_id: &str) -> Vec<ConflictResolution> {
        let Some(ps) = self.get_project(project_id) else {
            return Vec::new();
        };
        let guard = ps.read().await;
        resolver::detect_conflicts(&guard.bookings)
    }

    /// Bookings plus their dependency edges and advisory adjustments.
    pub async fn project_timeline(&self, project_id: &str) -> TimelineSync {
        let Some(ps) = self.get_project(project_id) else {
            return TimelineSync {
                bookings: Vec::new(),
                dependencies: Vec::new(),
                adjustments: Vec::new(),
            };
        };
        let guard = ps.read().await;
        let dependencies = dependencies::compute_dependencies(&guard.bookings);
        let adjustments = dependencies::timeline_adjustments(&guard.bookings, &dependencies);
        TimelineSync {
            bookings: guard.bookings.clone(),
            dependencies,
            adjustments,
        }
    }

    /// Suggested slots for every service type not yet booked, anchored at
    /// the local calendar date.
    pub async fn recommend_schedule(&self, project_id: &str) -> SchedulingRecommendation {
        let today = Local::now().date_naive();
        let Some(ps) = self.get_project(project_id) else {
            return recommend::recommend(&[], today);
        };
        let guard = ps.read().await;
        recommend::recommend(&guard.bookings, today)
    }
}

fn to_calendar_event(booking: &Booking) -> CalendarEvent {
    let profile = catalog::profile(booking.service);
    CalendarEvent {
        booking_id: booking.id,
        title: format!("{} - {}", profile.display_name, booking.provider_name),
        start: booking.starts_at(),
        end: booking.ends_at(),
        color: profile.color,
        status: booking.status,
        location: booking.location.clone(),
        estimated_cost: booking.estimated_cost,
    }
}
