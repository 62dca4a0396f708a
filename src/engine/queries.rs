use ulid::Ulid;

use crate::category;
use crate::model::*;

use super::availability::free_windows;
use super::conflict::{check_no_conflict, validate_window};
use super::{Engine, EngineError, SharedResourceState};

impl Engine {
    /// Availability: every active resource of the resolved category with no
    /// conflicting occupying reservation over the window. Pure read under
    /// per-resource read locks — the result is a hint, not a hold; a booking
    /// racing in after this returns can still legitimately win the unit.
    ///
    /// Unknown categories resolve to the empty set and yield an empty list.
    /// Result is sorted by resource id so callers (and the batch allocator)
    /// get reproducible picks.
    pub async fn find_available(
        &self,
        requested: &str,
        window: Stay,
    ) -> Result<Vec<ResourceSummary>, EngineError> {
        validate_window(&window)?;
        if requested.len() > crate::limits::MAX_CATEGORY_LEN {
            return Err(EngineError::LimitExceeded("category string too long"));
        }
        let types = category::resolve(requested);
        if types.is_empty() {
            return Ok(Vec::new());
        }

        // Snapshot the Arcs first; never hold map shards across an await.
        let arcs: Vec<SharedResourceState> =
            self.state.iter().map(|e| e.value().clone()).collect();

        let mut free = Vec::new();
        for rs_arc in arcs {
            let guard = rs_arc.read().await;
            if !guard.active || !types.contains(&guard.rtype) {
                continue;
            }
            if check_no_conflict(&guard, &window).is_ok() {
                free.push(ResourceSummary {
                    id: guard.id,
                    rtype: guard.rtype,
                });
            }
        }
        free.sort_by_key(|r| r.id);
        Ok(free)
    }

    /// Free date sub-ranges of `window` on one resource. Missing resources
    /// yield an empty result, not an error, to match the read-path contract.
    pub async fn free_windows(
        &self,
        resource_id: Ulid,
        window: Stay,
    ) -> Result<Vec<Stay>, EngineError> {
        validate_window(&window)?;
        let rs = match self.get_resource(&resource_id) {
            Some(rs) => rs,
            None => return Ok(Vec::new()),
        };
        let guard = rs.read().await;
        Ok(free_windows(&guard, &window))
    }

    pub async fn list_resources(&self) -> Vec<ResourceInfo> {
        let arcs: Vec<SharedResourceState> =
            self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(arcs.len());
        for rs_arc in arcs {
            let guard = rs_arc.read().await;
            out.push(ResourceInfo {
                id: guard.id,
                rtype: guard.rtype,
                capacity: guard.capacity,
                active: guard.active,
            });
        }
        out.sort_by_key(|r| r.id);
        out
    }

    /// Reservations on one resource, or — with `None` — every reservation
    /// in the tenant including the unassigned pool.
    pub async fn get_reservations(
        &self,
        resource_id: Option<Ulid>,
    ) -> Result<Vec<ReservationInfo>, EngineError> {
        let mut out = Vec::new();
        match resource_id {
            Some(rid) => {
                let rs = match self.get_resource(&rid) {
                    Some(rs) => rs,
                    None => return Ok(Vec::new()),
                };
                let guard = rs.read().await;
                for r in &guard.reservations {
                    out.push(to_info(r, Some(rid)));
                }
            }
            None => {
                let arcs: Vec<SharedResourceState> =
                    self.state.iter().map(|e| e.value().clone()).collect();
                for rs_arc in arcs {
                    let guard = rs_arc.read().await;
                    for r in &guard.reservations {
                        out.push(to_info(r, Some(guard.id)));
                    }
                }
                for entry in self.unassigned.iter() {
                    out.push(to_info(entry.value(), None));
                }
            }
        }
        out.sort_by_key(|r| r.id);
        Ok(out)
    }
}

fn to_info(r: &Reservation, resource_id: Option<Ulid>) -> ReservationInfo {
    ReservationInfo {
        id: r.id,
        resource_id,
        pet_id: r.pet_id,
        customer_id: r.customer_id,
        service_id: r.service_id,
        stay: r.stay,
        status: r.status,
    }
}
