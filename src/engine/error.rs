use ulid::Ulid;

use crate::model::ReservationStatus;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// An occupying reservation already holds an overlapping stay.
    Conflict {
        resource_id: Ulid,
        reservation_id: Ulid,
    },
    /// Capacity-N resource is fully saturated somewhere in the stay.
    CapacityExceeded {
        resource_id: Ulid,
        capacity: u32,
    },
    /// Batch allocation found no free unit for a category.
    NoResourceFree {
        category: String,
    },
    Inactive(Ulid),
    /// Resource still referenced by reservations; deactivate instead.
    InUse(Ulid),
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
    Validation(&'static str),
    /// Write lock not acquired within limits::LOCK_TIMEOUT. Retryable.
    LockTimeout(Ulid),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    /// Safe to retry as-is (with backoff); everything else either needs a
    /// different request or a re-queried availability picture first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::LockTimeout(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict {
                resource_id,
                reservation_id,
            } => write!(
                f,
                "conflict on resource {resource_id}: overlapping reservation {reservation_id}"
            ),
            EngineError::CapacityExceeded {
                resource_id,
                capacity,
            } => write!(
                f,
                "resource {resource_id} at capacity {capacity}: all slots occupied"
            ),
            EngineError::NoResourceFree { category } => {
                write!(f, "no available resource for category: {category}")
            }
            EngineError::Inactive(id) => write!(f, "resource {id} is inactive"),
            EngineError::InUse(id) => {
                write!(f, "resource {id} has reservations; deactivate it instead")
            }
            EngineError::InvalidTransition { from, to } => {
                write!(f, "invalid status transition: {from} -> {to}")
            }
            EngineError::Validation(msg) => write!(f, "validation: {msg}"),
            EngineError::LockTimeout(id) => {
                write!(f, "timed out waiting for lock on resource {id}")
            }
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
