//! Hard guard-rails. Every externally supplied value is checked against one
//! of these before it can reach the WAL.

use crate::model::Minutes;

pub const MAX_TENANTS: usize = 64;
pub const MAX_TENANT_NAME_LEN: usize = 256;

pub const MAX_PROJECTS_PER_TENANT: usize = 10_000;
pub const MAX_BOOKINGS_PER_PROJECT: usize = 10_000;

/// project_id, provider_id, provider_name.
pub const MAX_NAME_LEN: usize = 256;
/// location, instructions, notes, review, reason, details payload.
pub const MAX_TEXT_LEN: usize = 4_096;

/// A booking never spans more than one full day. The conflict check is
/// date-scoped, so longer durations would silently escape it entirely.
pub const MAX_DURATION_MIN: Minutes = 24 * 60;

pub const MIN_SCHEDULE_YEAR: i32 = 2000;
pub const MAX_SCHEDULE_YEAR: i32 = 2100;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

pub const MAX_COST: f64 = 1_000_000_000.0;
