//! Static per-service-type configuration. Everything the scheduler, the
//! conflict resolver, and the calendar projection vary by service category
//! lives in this one table so the rules are auditable in one place.

use crate::model::{Minutes, Priority, ServiceType};

pub struct ServiceProfile {
    pub service: ServiceType,
    /// Applied when a booking request omits its duration.
    pub default_duration_min: Minutes,
    /// Time of day the recommender slots this service at.
    pub optimal_start_minute: Minutes,
    pub priority: Priority,
    /// Days the recommender skips forward after placing this service.
    pub buffer_days: i64,
    /// Type-level prerequisites, used by the recommender.
    pub depends_on: &'static [ServiceType],
    pub display_name: &'static str,
    pub color: &'static str,
    pub justification: &'static str,
}

const MIN_PER_HOUR: Minutes = 60;

static PROFILES: [ServiceProfile; 5] = [
    ServiceProfile {
        service: ServiceType::EquipmentRental,
        default_duration_min: 8 * MIN_PER_HOUR,
        optimal_start_minute: 7 * MIN_PER_HOUR,
        priority: Priority::High,
        buffer_days: 1,
        depends_on: &[],
        display_name: "تأجير المعدات",
        color: "#F59E0B",
        justification: "حجز المعدات مبكراً لضمان توفرها في موقع العمل",
    },
    ServiceProfile {
        service: ServiceType::WasteManagement,
        default_duration_min: 4 * MIN_PER_HOUR,
        optimal_start_minute: 14 * MIN_PER_HOUR,
        priority: Priority::Medium,
        buffer_days: 1,
        depends_on: &[ServiceType::EquipmentRental, ServiceType::ConcreteSupply],
        display_name: "إدارة النفايات",
        color: "#10B981",
        justification: "ترتيب حاوية النفايات بعد اكتمال أعمال الصب",
    },
    ServiceProfile {
        service: ServiceType::ConcreteSupply,
        default_duration_min: 6 * MIN_PER_HOUR,
        optimal_start_minute: 6 * MIN_PER_HOUR,
        priority: Priority::High,
        buffer_days: 2,
        depends_on: &[ServiceType::DesignOffice, ServiceType::EquipmentRental],
        display_name: "توريد الخرسانة",
        color: "#6B7280",
        justification: "جدولة صب الخرسانة بعد تجهيز المعدات في الموقع",
    },
    ServiceProfile {
        service: ServiceType::DesignOffice,
        default_duration_min: 2 * MIN_PER_HOUR,
        optimal_start_minute: 10 * MIN_PER_HOUR,
        priority: Priority::High,
        buffer_days: 7,
        depends_on: &[],
        display_name: "مكتب التصميم",
        color: "#3B82F6",
        justification: "البدء بالتصاميم الهندسية قبل أي أعمال تنفيذية",
    },
    ServiceProfile {
        service: ServiceType::Insurance,
        default_duration_min: MIN_PER_HOUR,
        optimal_start_minute: 9 * MIN_PER_HOUR,
        priority: Priority::Low,
        buffer_days: 0,
        depends_on: &[],
        display_name: "التأمين",
        color: "#8B5CF6",
        justification: "إصدار وثيقة التأمين قبل انطلاق الأعمال في الموقع",
    },
];

/// Order the recommender walks the catalog in.
pub const RECOMMENDATION_ORDER: [ServiceType; 5] = [
    ServiceType::DesignOffice,
    ServiceType::EquipmentRental,
    ServiceType::ConcreteSupply,
    ServiceType::WasteManagement,
    ServiceType::Insurance,
];

/// The recommender starts this many days from today.
pub const RECOMMENDATION_LEAD_DAYS: i64 = 2;

/// Alternative slots proposed per detected conflict, one per day offset.
pub const ALTERNATIVE_SLOT_COUNT: i64 = 7;

/// All alternative slots are proposed at 08:00.
pub const ALTERNATIVE_START_MINUTE: Minutes = 8 * MIN_PER_HOUR;

// Placeholder optimization figures — count-derived, not simulated.
pub const SAVINGS_PER_RECOMMENDATION: f64 = 500.0;
pub const DAYS_SAVED_PER_RECOMMENDATION: f64 = 0.5;
pub const EFFICIENCY_PCT: u32 = 85;

// Static weather note — no weather data is consulted.
pub const WEATHER_IMPACT: &str = "متوسط";
pub const WEATHER_ADVICE: [&str; 2] = [
    "يفضل إنجاز الأعمال الخارجية في الصباح الباكر",
    "مراجعة حالة الطقس قبل الموعد بيوم واحد",
];

pub fn profile(service: ServiceType) -> &'static ServiceProfile {
    let idx = match service {
        ServiceType::EquipmentRental => 0,
        ServiceType::WasteManagement => 1,
        ServiceType::ConcreteSupply => 2,
        ServiceType::DesignOffice => 3,
        ServiceType::Insurance => 4,
    };
    &PROFILES[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_lookup_is_consistent() {
        for s in ServiceType::ALL {
            assert_eq!(profile(s).service, s);
        }
    }

    #[test]
    fn default_durations() {
        assert_eq!(profile(ServiceType::EquipmentRental).default_duration_min, 480);
        assert_eq!(profile(ServiceType::WasteManagement).default_duration_min, 240);
        assert_eq!(profile(ServiceType::ConcreteSupply).default_duration_min, 360);
        assert_eq!(profile(ServiceType::DesignOffice).default_duration_min, 120);
        assert_eq!(profile(ServiceType::Insurance).default_duration_min, 60);
    }

    #[test]
    fn optimal_start_times() {
        assert_eq!(profile(ServiceType::DesignOffice).optimal_start_minute, 600);
        assert_eq!(profile(ServiceType::EquipmentRental).optimal_start_minute, 420);
        assert_eq!(profile(ServiceType::ConcreteSupply).optimal_start_minute, 360);
        assert_eq!(profile(ServiceType::WasteManagement).optimal_start_minute, 840);
        assert_eq!(profile(ServiceType::Insurance).optimal_start_minute, 540);
    }

    #[test]
    fn priorities_and_buffers() {
        assert_eq!(profile(ServiceType::DesignOffice).priority, Priority::High);
        assert_eq!(profile(ServiceType::EquipmentRental).priority, Priority::High);
        assert_eq!(profile(ServiceType::ConcreteSupply).priority, Priority::High);
        assert_eq!(profile(ServiceType::WasteManagement).priority, Priority::Medium);
        assert_eq!(profile(ServiceType::Insurance).priority, Priority::Low);

        assert_eq!(profile(ServiceType::DesignOffice).buffer_days, 7);
        assert_eq!(profile(ServiceType::EquipmentRental).buffer_days, 1);
        assert_eq!(profile(ServiceType::ConcreteSupply).buffer_days, 2);
        assert_eq!(profile(ServiceType::WasteManagement).buffer_days, 1);
        assert_eq!(profile(ServiceType::Insurance).buffer_days, 0);
    }

    #[test]
    fn dependency_table() {
        assert_eq!(
            profile(ServiceType::ConcreteSupply).depends_on,
            &[ServiceType::DesignOffice, ServiceType::EquipmentRental]
        );
        assert_eq!(
            profile(ServiceType::WasteManagement).depends_on,
            &[ServiceType::EquipmentRental, ServiceType::ConcreteSupply]
        );
        assert!(profile(ServiceType::EquipmentRental).depends_on.is_empty());
        assert!(profile(ServiceType::DesignOffice).depends_on.is_empty());
        assert!(profile(ServiceType::Insurance).depends_on.is_empty());
    }

    #[test]
    fn colors_are_distinct_hex() {
        let mut seen = std::collections::HashSet::new();
        for s in ServiceType::ALL {
            let c = profile(s).color;
            assert!(c.starts_with('#') && c.len() == 7, "bad color {c}");
            assert!(seen.insert(c), "duplicate color {c}");
        }
    }

    #[test]
    fn recommendation_order_covers_every_service_once() {
        let mut seen = std::collections::HashSet::new();
        for s in RECOMMENDATION_ORDER {
            assert!(seen.insert(s));
        }
        assert_eq!(seen.len(), ServiceType::ALL.len());
    }
}
