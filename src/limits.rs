//! Hard limits protecting the engine from pathological input.

use std::time::Duration;

/// Maximum bookable units a single tenant may register.
pub const MAX_RESOURCES_PER_TENANT: usize = 10_000;

/// Maximum reservations (any status) held on one resource.
pub const MAX_RESERVATIONS_PER_RESOURCE: usize = 50_000;

/// Maximum reservations waiting in the unassigned pool.
pub const MAX_UNASSIGNED_PER_TENANT: usize = 10_000;

/// Maximum items in one batch-allocation request.
pub const MAX_BATCH_SIZE: usize = 100;

/// Maximum length of a category string in a query or batch item.
pub const MAX_CATEGORY_LEN: usize = 64;

/// Longest stay a single reservation may cover, in nights.
pub const MAX_STAY_NIGHTS: i64 = 366;

/// Widest availability / free-window query, in days.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 3_660;

/// Calendar years accepted on any date. Anything outside is a typo.
pub const MIN_VALID_YEAR: i32 = 2000;
pub const MAX_VALID_YEAR: i32 = 2100;

/// Bound on acquiring a resource's write lock before a booking attempt
/// fails with a retryable timeout instead of queueing indefinitely.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

pub const MAX_TENANTS: usize = 256;
pub const MAX_TENANT_NAME_LEN: usize = 256;
