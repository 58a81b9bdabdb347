//! tanseeq — booking coordination for construction projects.
//!
//! One server owns the booking table for a fleet of projects: creation is
//! conflict-checked under a per-project write lock, the lifecycle is a
//! closed status machine, and the read side serves conflict analysis,
//! dependency ordering, schedule recommendations, and calendar projections.
//! Clients speak the PostgreSQL wire protocol; the `database` connection
//! parameter selects the tenant.

pub mod auth;
pub mod catalog;
pub mod compactor;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod sql;
pub mod tenant;
pub mod tls;
pub mod wal;
pub mod wire;
