use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_stay};
use super::{Engine, EngineError};

impl Engine {
    // ── Resource catalog (admin CRUD) ────────────────────────

    pub async fn create_resource(
        &self,
        id: Ulid,
        rtype: ResourceType,
        capacity: u32,
        active: bool,
    ) -> Result<(), EngineError> {
        if self.state.len() >= MAX_RESOURCES_PER_TENANT {
            return Err(EngineError::LimitExceeded("too many resources"));
        }
        if capacity == 0 {
            return Err(EngineError::Validation("capacity must be at least 1"));
        }
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let event = Event::ResourceCreated {
            id,
            rtype,
            capacity,
            active,
        };
        self.wal_append(&event).await?;
        let rs = ResourceState::new(id, rtype, capacity, active);
        self.state.insert(id, Arc::new(RwLock::new(rs)));
        self.notify.send(id, &event);
        Ok(())
    }

    pub async fn update_resource(
        &self,
        id: Ulid,
        capacity: Option<u32>,
        active: Option<bool>,
    ) -> Result<(), EngineError> {
        if capacity == Some(0) {
            return Err(EngineError::Validation("capacity must be at least 1"));
        }
        let mut guard = self.lock_resource_write(&id).await?;

        let event = Event::ResourceUpdated {
            id,
            capacity: capacity.unwrap_or(guard.capacity),
            active: active.unwrap_or(guard.active),
        };
        self.persist_and_apply(id, &mut guard, &event).await
    }

    /// Hard delete. Refused while any reservation — historical included —
    /// still references the unit; `active = false` is the way to retire one.
    pub async fn delete_resource(&self, id: Ulid) -> Result<(), EngineError> {
        let guard = self.lock_resource_write(&id).await?;
        if !guard.reservations.is_empty() {
            return Err(EngineError::InUse(id));
        }

        // Hold the write lock through the removal so a booking waiting on
        // this unit re-checks liveness and fails instead of landing on a
        // ghost.
        let event = Event::ResourceDeleted { id };
        self.wal_append(&event).await?;
        self.state.remove(&id);
        drop(guard);
        self.notify.send(id, &event);
        Ok(())
    }

    // ── Booking coordinator ──────────────────────────────────

    /// The single write path that creates a reservation. With a resource,
    /// the conflict re-check and the insert happen under that resource's
    /// write lock, so no concurrent `book` can slip between them; the WAL
    /// fsync is the commit point and nothing is applied on failure.
    ///
    /// `resource_id: None` books into the unassigned pool (no occupancy).
    #[allow(clippy::too_many_arguments)]
    pub async fn book(
        &self,
        id: Ulid,
        resource_id: Option<Ulid>,
        pet_id: Ulid,
        customer_id: Ulid,
        service_id: Ulid,
        stay: Stay,
        status: ReservationStatus,
    ) -> Result<Reservation, EngineError> {
        validate_stay(&stay)?;
        if !status.is_occupying() {
            return Err(EngineError::Validation(
                "new reservations must start in an occupying status",
            ));
        }
        if self.reservation_index.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }

        let reservation = Reservation {
            id,
            pet_id,
            customer_id,
            service_id,
            stay,
            status,
        };

        match resource_id {
            Some(rid) => {
                let mut guard = self.lock_resource_write(&rid).await?;
                if !guard.active {
                    return Err(EngineError::Inactive(rid));
                }
                if guard.reservations.len() >= MAX_RESERVATIONS_PER_RESOURCE {
                    return Err(EngineError::LimitExceeded(
                        "too many reservations on resource",
                    ));
                }

                check_no_conflict(&guard, &stay)?;

                let event = Event::ReservationBooked {
                    id,
                    resource_id: Some(rid),
                    pet_id,
                    customer_id,
                    service_id,
                    stay,
                    status,
                };
                self.persist_and_apply(rid, &mut guard, &event).await?;
                Ok(reservation)
            }
            None => {
                if self.unassigned.len() >= MAX_UNASSIGNED_PER_TENANT {
                    return Err(EngineError::LimitExceeded(
                        "too many unassigned reservations",
                    ));
                }
                let event = Event::ReservationBooked {
                    id,
                    resource_id: None,
                    pet_id,
                    customer_id,
                    service_id,
                    stay,
                    status,
                };
                self.wal_append(&event).await?;
                self.unassigned.insert(id, reservation.clone());
                self.reservation_index.insert(id, None);
                Ok(reservation)
            }
        }
    }

    /// Assign an unassigned reservation to a resource, or move an assigned
    /// one. The target is conflict-checked under its write lock; a move
    /// locks both units in sorted id order so two crossing moves cannot
    /// deadlock.
    pub async fn assign(&self, id: Ulid, to: Ulid) -> Result<(), EngineError> {
        match self.locate_reservation(&id)? {
            None => self.assign_from_pool(id, to).await,
            Some(from) if from == to => Ok(()),
            Some(from) => self.move_between(id, from, to).await,
        }
    }

    async fn assign_from_pool(&self, id: Ulid, to: Ulid) -> Result<(), EngineError> {
        let mut guard = self.lock_resource_write(&to).await?;
        if !guard.active {
            return Err(EngineError::Inactive(to));
        }
        if guard.reservations.len() >= MAX_RESERVATIONS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded(
                "too many reservations on resource",
            ));
        }

        // Claim the reservation first; a concurrent assign of the same id
        // loses this race and sees NotFound. Put it back on any failure.
        let Some((_, reservation)) = self.unassigned.remove(&id) else {
            return Err(EngineError::NotFound(id));
        };

        let result = async {
            if !reservation.status.is_occupying() {
                return Err(EngineError::Validation(
                    "only occupying reservations can be assigned",
                ));
            }
            check_no_conflict(&guard, &reservation.stay)?;
            let event = Event::ReservationAssigned {
                id,
                resource_id: to,
            };
            self.wal_append(&event).await?;
            Ok(event)
        }
        .await;

        match result {
            Ok(event) => {
                guard.insert_reservation(reservation);
                self.reservation_index.insert(id, Some(to));
                self.notify.send(to, &event);
                Ok(())
            }
            Err(e) => {
                self.unassigned.insert(id, reservation);
                Err(e)
            }
        }
    }

    async fn move_between(&self, id: Ulid, from: Ulid, to: Ulid) -> Result<(), EngineError> {
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let guard_a = self.lock_resource_write(&first).await?;
        let guard_b = self.lock_resource_write(&second).await?;
        let (mut from_guard, mut to_guard) = if from < to {
            (guard_a, guard_b)
        } else {
            (guard_b, guard_a)
        };

        if !to_guard.active {
            return Err(EngineError::Inactive(to));
        }
        if to_guard.reservations.len() >= MAX_RESERVATIONS_PER_RESOURCE {
            return Err(EngineError::LimitExceeded(
                "too many reservations on resource",
            ));
        }
        let reservation = from_guard
            .reservation(id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;
        if !reservation.status.is_occupying() {
            return Err(EngineError::Validation(
                "only occupying reservations can be moved",
            ));
        }
        check_no_conflict(&to_guard, &reservation.stay)?;

        let event = Event::ReservationAssigned {
            id,
            resource_id: to,
        };
        self.wal_append(&event).await?;
        from_guard.remove_reservation(id);
        to_guard.insert_reservation(reservation);
        self.reservation_index.insert(id, Some(to));
        self.notify.send(to, &event);
        Ok(())
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Status transition per the lifecycle table. Moving out of an occupying
    /// status is what frees the resource for the same interval.
    pub async fn update_status(
        &self,
        id: Ulid,
        status: ReservationStatus,
    ) -> Result<(), EngineError> {
        match self.locate_reservation(&id)? {
            Some(rid) => {
                let mut guard = self.lock_resource_write(&rid).await?;
                let current = guard
                    .reservation(id)
                    .ok_or(EngineError::NotFound(id))?
                    .status;
                if !current.can_transition_to(status) {
                    return Err(EngineError::InvalidTransition {
                        from: current,
                        to: status,
                    });
                }
                let event = Event::ReservationStatusChanged { id, status };
                self.persist_and_apply(rid, &mut guard, &event).await
            }
            None => {
                let current = self
                    .unassigned
                    .get(&id)
                    .map(|e| e.value().status)
                    .ok_or(EngineError::NotFound(id))?;
                if !current.can_transition_to(status) {
                    return Err(EngineError::InvalidTransition {
                        from: current,
                        to: status,
                    });
                }
                let event = Event::ReservationStatusChanged { id, status };
                self.wal_append(&event).await?;
                if let Some(mut r) = self.unassigned.get_mut(&id) {
                    r.status = status;
                }
                Ok(())
            }
        }
    }

    pub async fn cancel(&self, id: Ulid) -> Result<(), EngineError> {
        self.update_status(id, ReservationStatus::Cancelled).await
    }
}
