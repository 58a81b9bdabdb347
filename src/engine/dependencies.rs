use crate::catalog;
use crate::model::*;

// ── Dependency calculator ────────────────────────────────────────
//
// Edges are derived from the service-type taxonomy alone, never from
// per-project configuration:
//   concrete-supply   ← equipment-rental dated on or before its own date
//   waste-management  ← equipment-rental and concrete-supply dated strictly
//                       before its own date
// All other types have no computed dependencies.

/// One `depends_on` list per non-cancelled booking, in schedule order.
/// Deterministic: same input list, same edges.
pub fn compute_dependencies(bookings: &[Booking]) -> Vec<BookingDependencies> {
    let active: Vec<&Booking> = bookings
        .iter()
        .filter(|b| b.status != BookingStatus::Cancelled)
        .collect();

    active
        .iter()
        .map(|b| BookingDependencies {
            booking_id: b.id,
            depends_on: depends_on(b, &active),
            blocks: Vec::new(),
        })
        .collect()
}

fn depends_on(booking: &Booking, all: &[&Booking]) -> Vec<ulid::Ulid> {
    match booking.service {
        ServiceType::ConcreteSupply => all
            .iter()
            .filter(|o| {
                o.service == ServiceType::EquipmentRental
                    && o.scheduled_date <= booking.scheduled_date
            })
            .map(|o| o.id)
            .collect(),
        ServiceType::WasteManagement => all
            .iter()
            .filter(|o| {
                matches!(
                    o.service,
                    ServiceType::EquipmentRental | ServiceType::ConcreteSupply
                ) && o.scheduled_date < booking.scheduled_date
            })
            .map(|o| o.id)
            .collect(),
        _ => Vec::new(),
    }
}

/// Advisory notes for the timeline view. The only ordering tension the rule
/// table permits is a booking sharing its calendar date with one of its
/// dependencies; suggest a one-day gap for those.
pub fn timeline_adjustments(
    bookings: &[Booking],
    dependencies: &[BookingDependencies],
) -> Vec<TimelineAdjustment> {
    let mut adjustments = Vec::new();
    for deps in dependencies {
        let Some(booking) = bookings.iter().find(|b| b.id == deps.booking_id) else {
            continue;
        };
        let same_day = deps.depends_on.iter().any(|dep_id| {
            bookings
                .iter()
                .any(|b| b.id == *dep_id && b.scheduled_date == booking.scheduled_date)
        });
        if same_day {
            adjustments.push(TimelineAdjustment {
                booking_id: booking.id,
                note: format!(
                    "خدمة {} مجدولة في نفس يوم خدمة تعتمد عليها، يفضل ترك يوم فاصل",
                    catalog::profile(booking.service).display_name
                ),
            });
        }
    }
    adjustments
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ulid::Ulid;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn booking(service: ServiceType, date_s: &str) -> Booking {
        Booking {
            id: Ulid::new(),
            project_id: "p1".into(),
            service,
            provider_id: "prov".into(),
            provider_name: "مزود".into(),
            details: None,
            scheduled_date: date(date_s),
            start_minute: 8 * 60,
            duration_min: 120,
            location: "الدمام".into(),
            instructions: None,
            estimated_cost: 800.0,
            actual_cost: None,
            status: BookingStatus::Pending,
            completion_notes: None,
            rating: None,
            review: None,
        }
    }

    fn sorted(mut bookings: Vec<Booking>) -> Vec<Booking> {
        bookings.sort_by_key(|b| (b.scheduled_date, b.start_minute));
        bookings
    }

    #[test]
    fn concrete_depends_on_equipment_on_or_before() {
        let equip_before = booking(ServiceType::EquipmentRental, "2025-06-01");
        let equip_same = booking(ServiceType::EquipmentRental, "2025-06-03");
        let equip_after = booking(ServiceType::EquipmentRental, "2025-06-05");
        let concrete = booking(ServiceType::ConcreteSupply, "2025-06-03");

        let all = sorted(vec![
            equip_before.clone(),
            equip_same.clone(),
            equip_after.clone(),
            concrete.clone(),
        ]);
        let deps = compute_dependencies(&all);
        let concrete_deps = deps.iter().find(|d| d.booking_id == concrete.id).unwrap();

        assert!(concrete_deps.depends_on.contains(&equip_before.id));
        assert!(concrete_deps.depends_on.contains(&equip_same.id)); // on-or-before
        assert!(!concrete_deps.depends_on.contains(&equip_after.id));
    }

    #[test]
    fn waste_depends_on_strictly_earlier_equipment_and_concrete() {
        let equip = booking(ServiceType::EquipmentRental, "2025-06-01");
        let concrete = booking(ServiceType::ConcreteSupply, "2025-06-02");
        let concrete_same_day = booking(ServiceType::ConcreteSupply, "2025-06-04");
        let waste = booking(ServiceType::WasteManagement, "2025-06-04");

        let all = sorted(vec![
            equip.clone(),
            concrete.clone(),
            concrete_same_day.clone(),
            waste.clone(),
        ]);
        let deps = compute_dependencies(&all);
        let waste_deps = deps.iter().find(|d| d.booking_id == waste.id).unwrap();

        assert!(waste_deps.depends_on.contains(&equip.id));
        assert!(waste_deps.depends_on.contains(&concrete.id));
        // same-day is not "strictly before"
        assert!(!waste_deps.depends_on.contains(&concrete_same_day.id));
    }

    #[test]
    fn other_services_have_no_dependencies() {
        let all = sorted(vec![
            booking(ServiceType::EquipmentRental, "2025-06-01"),
            booking(ServiceType::DesignOffice, "2025-06-02"),
            booking(ServiceType::Insurance, "2025-06-03"),
        ]);
        for deps in compute_dependencies(&all) {
            assert!(deps.depends_on.is_empty());
        }
    }

    #[test]
    fn blocks_lists_stay_empty() {
        let all = sorted(vec![
            booking(ServiceType::EquipmentRental, "2025-06-01"),
            booking(ServiceType::ConcreteSupply, "2025-06-02"),
            booking(ServiceType::WasteManagement, "2025-06-03"),
        ]);
        for deps in compute_dependencies(&all) {
            assert!(deps.blocks.is_empty());
        }
    }

    #[test]
    fn dependencies_are_deterministic() {
        let all = sorted(vec![
            booking(ServiceType::EquipmentRental, "2025-06-01"),
            booking(ServiceType::ConcreteSupply, "2025-06-02"),
            booking(ServiceType::WasteManagement, "2025-06-05"),
        ]);
        assert_eq!(compute_dependencies(&all), compute_dependencies(&all));
    }

    #[test]
    fn cancelled_bookings_excluded_from_graph() {
        let mut equip = booking(ServiceType::EquipmentRental, "2025-06-01");
        equip.status = BookingStatus::Cancelled;
        let concrete = booking(ServiceType::ConcreteSupply, "2025-06-02");

        let all = sorted(vec![equip.clone(), concrete.clone()]);
        let deps = compute_dependencies(&all);
        assert_eq!(deps.len(), 1); // cancelled booking has no node
        assert!(deps[0].depends_on.is_empty()); // and is no dependency either
    }

    #[test]
    fn same_day_dependency_yields_adjustment() {
        let equip = booking(ServiceType::EquipmentRental, "2025-06-03");
        let concrete = booking(ServiceType::ConcreteSupply, "2025-06-03");

        let all = sorted(vec![equip.clone(), concrete.clone()]);
        let deps = compute_dependencies(&all);
        let adjustments = timeline_adjustments(&all, &deps);
        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].booking_id, concrete.id);

        // With a day between them, no adjustment.
        let spaced = sorted(vec![
            booking(ServiceType::EquipmentRental, "2025-06-01"),
            booking(ServiceType::ConcreteSupply, "2025-06-03"),
        ]);
        let deps = compute_dependencies(&spaced);
        assert!(timeline_adjustments(&spaced, &deps).is_empty());
    }
}
