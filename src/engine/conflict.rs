use chrono::Datelike;

use crate::model::*;

use super::availability::saturated_spans;
use super::EngineError;

/// Validate a stay about to be booked.
pub(crate) fn validate_stay(stay: &Stay) -> Result<(), EngineError> {
    use crate::limits::*;
    if stay.check_in >= stay.check_out {
        return Err(EngineError::Validation("check-in must be before check-out"));
    }
    if stay.check_in.year() < MIN_VALID_YEAR || stay.check_out.year() > MAX_VALID_YEAR {
        return Err(EngineError::Validation("date out of accepted range"));
    }
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// Validate a read-side query window. Wider than a bookable stay, but
/// still bounded.
pub(crate) fn validate_window(window: &Stay) -> Result<(), EngineError> {
    use crate::limits::*;
    if window.check_in >= window.check_out {
        return Err(EngineError::Validation("window start must be before end"));
    }
    if window.check_in.year() < MIN_VALID_YEAR || window.check_out.year() > MAX_VALID_YEAR {
        return Err(EngineError::Validation("date out of accepted range"));
    }
    if window.nights() > MAX_QUERY_WINDOW_DAYS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// The conflict predicate: would `stay` collide with occupying reservations
/// already on this resource? Must be called with the resource's write lock
/// held when deciding a booking — that lock is what turns check-then-insert
/// into an atomic unit.
pub(crate) fn check_no_conflict(rs: &ResourceState, stay: &Stay) -> Result<(), EngineError> {
    if rs.capacity <= 1 {
        // Fast path: any overlapping occupying reservation is a conflict.
        for r in rs.overlapping(stay) {
            if r.status.is_occupying() {
                return Err(EngineError::Conflict {
                    resource_id: rs.id,
                    reservation_id: r.id,
                });
            }
        }
    } else {
        // Capacity > 1: count overlapping occupants via the sweep line.
        let mut occupied: Vec<Stay> = rs
            .overlapping(stay)
            .filter(|r| r.status.is_occupying())
            .map(|r| r.stay)
            .collect();
        occupied.sort_by_key(|s| s.check_in);
        for sat in saturated_spans(&occupied, rs.capacity) {
            if sat.overlaps(stay) {
                return Err(EngineError::CapacityExceeded {
                    resource_id: rs.id,
                    capacity: rs.capacity,
                });
            }
        }
    }
    Ok(())
}
