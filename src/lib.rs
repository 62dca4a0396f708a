//! paddock — a multi-tenant reservation engine for pet-boarding resources
//! (kennels, runs, suites, grooming tables, staff slots), speaking the
//! PostgreSQL wire protocol.
//!
//! Each tenant gets its own [`engine::Engine`] with a private write-ahead
//! log. The engine serializes booking writes per resource, so no two
//! occupying reservations can ever overlap on one physical unit.

mod auth;
pub mod category;
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
