use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes from midnight of the owning calendar date — the only time-of-day type.
pub type Minutes = i64;

/// Half-open interval `[start, end)` in minutes from midnight.
///
/// A booking lives entirely inside its scheduled date; spans are only ever
/// compared between bookings on the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySpan {
    pub start: Minutes,
    pub end: Minutes,
}

impl DaySpan {
    pub fn new(start: Minutes, end: Minutes) -> Self {
        debug_assert!(start < end, "DaySpan start must be before end");
        Self { start, end }
    }

    pub fn duration_min(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &DaySpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// The five bookable service categories. Closed set; everything that varies
/// per category lives in `crate::catalog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    EquipmentRental,
    WasteManagement,
    ConcreteSupply,
    DesignOffice,
    Insurance,
}

impl ServiceType {
    pub const ALL: [ServiceType; 5] = [
        ServiceType::EquipmentRental,
        ServiceType::WasteManagement,
        ServiceType::ConcreteSupply,
        ServiceType::DesignOffice,
        ServiceType::Insurance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceType::EquipmentRental => "equipment-rental",
            ServiceType::WasteManagement => "waste-management",
            ServiceType::ConcreteSupply => "concrete-supply",
            ServiceType::DesignOffice => "design-office",
            ServiceType::Insurance => "insurance",
        }
    }

    pub fn parse(s: &str) -> Option<ServiceType> {
        match s {
            "equipment-rental" => Some(ServiceType::EquipmentRental),
            "waste-management" => Some(ServiceType::WasteManagement),
            "concrete-supply" => Some(ServiceType::ConcreteSupply),
            "design-office" => Some(ServiceType::DesignOffice),
            "insurance" => Some(ServiceType::Insurance),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Booking lifecycle. `Completed` and `Cancelled` are terminal — the engine
/// rejects any transition out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<BookingStatus> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

/// One scheduled engagement of a service provider for a project.
/// Never hard-deleted; cancellation is the soft terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub project_id: String,
    pub service: ServiceType,
    pub provider_id: String,
    pub provider_name: String,
    /// Service-specific payload, raw JSON text (validated at the boundary).
    pub details: Option<String>,
    pub scheduled_date: NaiveDate,
    pub start_minute: Minutes,
    pub duration_min: Minutes,
    pub location: String,
    pub instructions: Option<String>,
    pub estimated_cost: f64,
    pub actual_cost: Option<f64>,
    pub status: BookingStatus,
    pub completion_notes: Option<String>,
    pub rating: Option<u8>,
    pub review: Option<String>,
}

impl Booking {
    /// Effective interval `[start, start + duration)` within the scheduled
    /// date. The conflict detector and the calendar projection both use this.
    pub fn span(&self) -> DaySpan {
        DaySpan::new(self.start_minute, self.start_minute + self.duration_min)
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.scheduled_date.and_time(NaiveTime::MIN) + Duration::minutes(self.start_minute)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.starts_at() + Duration::minutes(self.duration_min)
    }
}

/// Inputs for booking creation. `id` may be supplied by the client (any
/// Postgres client can mint a ULID) or left to the engine; `duration_min`
/// falls back to the service-type default from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingRequest {
    pub id: Option<Ulid>,
    pub project_id: String,
    pub service: ServiceType,
    pub provider_id: String,
    pub provider_name: String,
    pub scheduled_date: NaiveDate,
    pub start_minute: Minutes,
    pub duration_min: Option<Minutes>,
    pub location: String,
    pub instructions: Option<String>,
    pub details: Option<String>,
    pub estimated_cost: f64,
}

/// All bookings of one project, sorted by (scheduled_date, start_minute).
#[derive(Debug, Clone)]
pub struct ProjectState {
    pub project_id: String,
    pub bookings: Vec<Booking>,
}

impl ProjectState {
    pub fn new(project_id: String) -> Self {
        Self {
            project_id,
            bookings: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by (date, start minute).
    pub fn insert_booking(&mut self, booking: Booking) {
        let key = (booking.scheduled_date, booking.start_minute);
        let pos = self
            .bookings
            .binary_search_by_key(&key, |b| (b.scheduled_date, b.start_minute))
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn find(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn find_mut(&mut self, id: Ulid) -> Option<&mut Booking> {
        self.bookings.iter_mut().find(|b| b.id == id)
    }

    /// Bookings on the given calendar date, as a contiguous slice of the
    /// sorted list. Uses binary search to skip other dates.
    pub fn on_date(&self, date: NaiveDate) -> &[Booking] {
        let lo = self.bookings.partition_point(|b| b.scheduled_date < date);
        let hi = self.bookings.partition_point(|b| b.scheduled_date <= date);
        &self.bookings[lo..hi]
    }
}

/// The WAL record format — flat, no nesting. A `BookingCreated` carries the
/// full record, so compaction can collapse any history to one event per
/// booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        booking: Booking,
    },
    BookingStatusChanged {
        id: Ulid,
        project_id: String,
        status: BookingStatus,
        notes: Option<String>,
        actual_cost: Option<f64>,
    },
    BookingCancelled {
        id: Ulid,
        project_id: String,
        reason: String,
    },
    BookingReviewed {
        id: Ulid,
        project_id: String,
        rating: u8,
        review: String,
    },
}

impl Event {
    pub fn project_id(&self) -> &str {
        match self {
            Event::BookingCreated { booking } => &booking.project_id,
            Event::BookingStatusChanged { project_id, .. }
            | Event::BookingCancelled { project_id, .. }
            | Event::BookingReviewed { project_id, .. } => project_id,
        }
    }
}

// ── Derived read models (computed on demand, never persisted) ─────

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarEvent {
    pub booking_id: Ulid,
    /// "{service display name} - {provider name}"
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: &'static str,
    pub status: BookingStatus,
    pub location: String,
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionKind {
    Reschedule,
}

impl ResolutionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionKind::Reschedule => "reschedule",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlternativeSlot {
    pub date: NaiveDate,
    pub start_minute: Minutes,
    pub reason: String,
}

/// A detected overlap between two same-day bookings, with remediation
/// suggestions for the second one.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictResolution {
    pub first: Booking,
    pub second: Booking,
    pub resolution: ResolutionKind,
    pub alternatives: Vec<AlternativeSlot>,
    pub impact: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDependencies {
    pub booking_id: Ulid,
    pub depends_on: Vec<Ulid>,
    /// Inverse edges are never populated; consumers read `depends_on` only.
    pub blocks: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineAdjustment {
    pub booking_id: Ulid,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSync {
    pub bookings: Vec<Booking>,
    pub dependencies: Vec<BookingDependencies>,
    pub adjustments: Vec<TimelineAdjustment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecommendedSlot {
    pub service: ServiceType,
    pub date: NaiveDate,
    pub start_minute: Minutes,
    pub priority: Priority,
    pub justification: &'static str,
    pub depends_on: Vec<ServiceType>,
}

/// Placeholder figures — count-derived, not a schedule simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationEstimate {
    pub cost_savings: f64,
    pub days_saved: f64,
    pub efficiency_pct: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeatherNote {
    pub service: ServiceType,
    pub impact: &'static str,
    pub advice: [&'static str; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulingRecommendation {
    pub slots: Vec<RecommendedSlot>,
    pub estimate: OptimizationEstimate,
    pub weather: Vec<WeatherNote>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn booking(date_s: &str, start_minute: Minutes, duration_min: Minutes) -> Booking {
        Booking {
            id: Ulid::new(),
            project_id: "p1".into(),
            service: ServiceType::EquipmentRental,
            provider_id: "prov".into(),
            provider_name: "مؤسسة المعدات".into(),
            details: None,
            scheduled_date: date(date_s),
            start_minute,
            duration_min,
            location: "الرياض".into(),
            instructions: None,
            estimated_cost: 1000.0,
            actual_cost: None,
            status: BookingStatus::Pending,
            completion_notes: None,
            rating: None,
            review: None,
        }
    }

    #[test]
    fn span_basics() {
        let s = DaySpan::new(480, 720);
        assert_eq!(s.duration_min(), 240);
    }

    #[test]
    fn span_overlap_half_open() {
        let a = DaySpan::new(480, 720); // 08:00–12:00
        let b = DaySpan::new(600, 840); // 10:00–14:00
        let c = DaySpan::new(720, 960); // 12:00–16:00, starts exactly at a's end
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
        assert!(!c.overlaps(&a));
    }

    #[test]
    fn booking_interval_uses_duration() {
        let b = booking("2025-07-10", 14 * 60, 4 * 60);
        assert_eq!(b.span(), DaySpan::new(840, 1080));
        assert_eq!(
            b.starts_at(),
            date("2025-07-10").and_hms_opt(14, 0, 0).unwrap()
        );
        assert_eq!(b.ends_at(), date("2025-07-10").and_hms_opt(18, 0, 0).unwrap());
    }

    #[test]
    fn insert_keeps_date_then_time_order() {
        let mut ps = ProjectState::new("p1".into());
        ps.insert_booking(booking("2025-06-05", 600, 60));
        ps.insert_booking(booking("2025-06-01", 900, 60));
        ps.insert_booking(booking("2025-06-01", 480, 60));
        let keys: Vec<_> = ps
            .bookings
            .iter()
            .map(|b| (b.scheduled_date, b.start_minute))
            .collect();
        assert_eq!(
            keys,
            vec![
                (date("2025-06-01"), 480),
                (date("2025-06-01"), 900),
                (date("2025-06-05"), 600),
            ]
        );
    }

    #[test]
    fn on_date_returns_contiguous_slice() {
        let mut ps = ProjectState::new("p1".into());
        ps.insert_booking(booking("2025-06-01", 480, 60));
        ps.insert_booking(booking("2025-06-02", 480, 60));
        ps.insert_booking(booking("2025-06-02", 600, 60));
        ps.insert_booking(booking("2025-06-03", 480, 60));

        let day = ps.on_date(date("2025-06-02"));
        assert_eq!(day.len(), 2);
        assert!(day.iter().all(|b| b.scheduled_date == date("2025-06-02")));
        assert!(ps.on_date(date("2025-06-04")).is_empty());
    }

    #[test]
    fn midnight_crossing_span_stays_inside_owning_date() {
        // 22:00 + 4h runs past 24:00 numerically; it still belongs to its
        // scheduled date and is never compared against the next day.
        let b = booking("2025-06-01", 22 * 60, 4 * 60);
        assert_eq!(b.span(), DaySpan::new(1320, 1560));
        assert_eq!(b.ends_at(), date("2025-06-02").and_hms_opt(2, 0, 0).unwrap());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::BookingCreated {
            booking: booking("2025-06-01", 480, 240),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn terminal_statuses() {
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(!BookingStatus::InProgress.is_terminal());
    }

    #[test]
    fn service_type_round_trips_through_tags() {
        for s in ServiceType::ALL {
            assert_eq!(ServiceType::parse(s.as_str()), Some(s));
        }
        assert_eq!(ServiceType::parse("landscaping"), None);
    }
}
