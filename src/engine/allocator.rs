//! Batch allocation for multi-pet orders.
//!
//! One order, several pets, each wanting a category: the allocator picks a
//! distinct concrete unit per pet and commits every reservation or none.
//! Sequential per-pet lookups without batch-level exclusion could hand the
//! same kennel to two pets in one order; the claimed set below is what
//! prevents that, unconditionally — two items never share a unit even when
//! their stays don't overlap.

use std::collections::{HashMap, HashSet};

use tokio::sync::OwnedRwLockWriteGuard;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_stay};
use super::{apply_to_resource, Engine, EngineError};

impl Engine {
    /// Allocate and book the whole batch atomically.
    ///
    /// Items are processed in submission order; each picks the lowest-id
    /// available resource of its category not already claimed by an earlier
    /// item (deterministic, reproducible). Two-phase commit: provisional
    /// selection first, then every chosen unit is write-locked in sorted id
    /// order and every item re-verified before anything is appended. Any
    /// item without a unit — or any conflict surfacing at commit time —
    /// fails the whole batch with nothing persisted.
    pub async fn book_batch(
        &self,
        requests: Vec<BookingRequest>,
    ) -> Result<Vec<BatchAssignment>, EngineError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }
        if requests.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }
        let mut seen_ids = HashSet::new();
        for req in &requests {
            validate_stay(&req.stay)?;
            if req.category.len() > MAX_CATEGORY_LEN {
                return Err(EngineError::LimitExceeded("category string too long"));
            }
            if !seen_ids.insert(req.id) || self.reservation_index.contains_key(&req.id) {
                return Err(EngineError::AlreadyExists(req.id));
            }
        }

        // Phase 1: provisional selection. find_available is sorted by id,
        // so the first unclaimed hit is the lowest-id free unit.
        let mut claimed: HashSet<Ulid> = HashSet::new();
        let mut choices: Vec<Ulid> = Vec::with_capacity(requests.len());
        for req in &requests {
            let free = self.find_available(&req.category, req.stay).await?;
            let pick = free
                .iter()
                .map(|r| r.id)
                .find(|id| !claimed.contains(id))
                .ok_or_else(|| EngineError::NoResourceFree {
                    category: req.category.clone(),
                })?;
            claimed.insert(pick);
            choices.push(pick);
        }

        // Phase 2: write locks on all chosen units in sorted id order
        // (never two orders both holding one lock while waiting on the
        // other), then re-verify against committed state. Items claimed
        // distinct units, so there is nothing intra-batch to check.
        let mut lock_order = choices.clone();
        lock_order.sort();

        let mut guards: Vec<OwnedRwLockWriteGuard<ResourceState>> =
            Vec::with_capacity(lock_order.len());
        let mut guard_idx: HashMap<Ulid, usize> = HashMap::new();
        for rid in &lock_order {
            let guard = self.lock_resource_write(rid).await?;
            if !guard.active {
                return Err(EngineError::Inactive(*rid));
            }
            if guard.reservations.len() >= MAX_RESERVATIONS_PER_RESOURCE {
                return Err(EngineError::LimitExceeded(
                    "too many reservations on resource",
                ));
            }
            guard_idx.insert(*rid, guards.len());
            guards.push(guard);
        }

        for (req, rid) in requests.iter().zip(&choices) {
            check_no_conflict(&guards[guard_idx[rid]], &req.stay)?;
        }

        // Phase 3: all verified — commit every booking.
        let mut assignments = Vec::with_capacity(requests.len());
        for (req, rid) in requests.iter().zip(&choices) {
            let event = Event::ReservationBooked {
                id: req.id,
                resource_id: Some(*rid),
                pet_id: req.pet_id,
                customer_id: req.customer_id,
                service_id: req.service_id,
                stay: req.stay,
                status: ReservationStatus::Confirmed,
            };
            self.wal_append(&event).await?;
            apply_to_resource(&mut guards[guard_idx[rid]], &event, &self.reservation_index);
            self.notify.send(*rid, &event);
            assignments.push(BatchAssignment {
                reservation_id: req.id,
                pet_id: req.pet_id,
                resource_id: *rid,
            });
        }

        Ok(assignments)
    }
}
