mod allocator;
mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::{free_windows, merge_overlapping, saturated_spans, subtract_intervals};
pub use error::EngineError;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, OwnedRwLockWriteGuard, RwLock};
use ulid::Ulid;

use crate::limits;
use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedResourceState = Arc<RwLock<ResourceState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// One tenant's booking engine: the resource catalog, every reservation,
/// and the tenant's WAL.
pub struct Engine {
    pub state: DashMap<Ulid, SharedResourceState>,
    /// Reservations created without a resource; assignment moves them out.
    pub(super) unassigned: DashMap<Ulid, Reservation>,
    /// reservation id → Some(owning resource) or None (unassigned pool).
    pub(super) reservation_index: DashMap<Ulid, Option<Ulid>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
}

/// Apply a resource-scoped event to a ResourceState (no locking — caller
/// holds the lock).
fn apply_to_resource(
    rs: &mut ResourceState,
    event: &Event,
    index: &DashMap<Ulid, Option<Ulid>>,
) {
    match event {
        Event::ReservationBooked {
            id,
            resource_id: Some(resource_id),
            pet_id,
            customer_id,
            service_id,
            stay,
            status,
        } => {
            rs.insert_reservation(Reservation {
                id: *id,
                pet_id: *pet_id,
                customer_id: *customer_id,
                service_id: *service_id,
                stay: *stay,
                status: *status,
            });
            index.insert(*id, Some(*resource_id));
        }
        Event::ReservationStatusChanged { id, status } => {
            if let Some(r) = rs.reservation_mut(*id) {
                r.status = *status;
            }
        }
        Event::ResourceUpdated { capacity, active, .. } => {
            rs.capacity = *capacity;
            rs.active = *active;
        }
        // Everything else (create/delete, unassigned pool, moves) is
        // handled at the engine level, not per resource.
        _ => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf, notify: Arc<NotifyHub>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: DashMap::new(),
            unassigned: DashMap::new(),
            reservation_index: DashMap::new(),
            wal_tx,
            notify,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context (e.g. lazy tenant
        // creation).
        for event in &events {
            engine.replay_event(event);
        }

        Ok(engine)
    }

    fn replay_event(&self, event: &Event) {
        match event {
            Event::ResourceCreated {
                id,
                rtype,
                capacity,
                active,
            } => {
                let rs = ResourceState::new(*id, *rtype, *capacity, *active);
                self.state.insert(*id, Arc::new(RwLock::new(rs)));
            }
            Event::ResourceDeleted { id } => {
                self.state.remove(id);
            }
            Event::ReservationBooked {
                id,
                resource_id: None,
                pet_id,
                customer_id,
                service_id,
                stay,
                status,
            } => {
                self.unassigned.insert(
                    *id,
                    Reservation {
                        id: *id,
                        pet_id: *pet_id,
                        customer_id: *customer_id,
                        service_id: *service_id,
                        stay: *stay,
                        status: *status,
                    },
                );
                self.reservation_index.insert(*id, None);
            }
            Event::ReservationAssigned { id, resource_id } => {
                let moved = match self.reservation_index.get(id).map(|e| *e.value()) {
                    Some(None) => self.unassigned.remove(id).map(|(_, r)| r),
                    Some(Some(old_rid)) => self.state.get(&old_rid).and_then(|entry| {
                        let rs_arc = entry.value().clone();
                        let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                        guard.remove_reservation(*id)
                    }),
                    None => None,
                };
                if let Some(moved) = moved
                    && let Some(entry) = self.state.get(resource_id) {
                        let rs_arc = entry.value().clone();
                        let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                        guard.insert_reservation(moved);
                        self.reservation_index.insert(*id, Some(*resource_id));
                    }
            }
            Event::ReservationStatusChanged { id, status } => {
                match self.reservation_index.get(id).map(|e| *e.value()) {
                    Some(None) => {
                        if let Some(mut r) = self.unassigned.get_mut(id) {
                            r.status = *status;
                        }
                    }
                    Some(Some(rid)) => {
                        if let Some(entry) = self.state.get(&rid) {
                            let rs_arc = entry.value().clone();
                            let mut guard =
                                rs_arc.try_write().expect("replay: uncontended write");
                            apply_to_resource(&mut guard, event, &self.reservation_index);
                        }
                    }
                    None => {}
                }
            }
            Event::ResourceUpdated { id, .. } => {
                if let Some(entry) = self.state.get(id) {
                    let rs_arc = entry.value().clone();
                    let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                    apply_to_resource(&mut guard, event, &self.reservation_index);
                }
            }
            Event::ReservationBooked {
                resource_id: Some(rid),
                ..
            } => {
                if let Some(entry) = self.state.get(rid) {
                    let rs_arc = entry.value().clone();
                    let mut guard = rs_arc.try_write().expect("replay: uncontended write");
                    apply_to_resource(&mut guard, event, &self.reservation_index);
                }
            }
        }
    }

    /// Write event to WAL via the background group-commit writer. The fsync
    /// acknowledgement is the commit point for every mutation.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub fn get_resource(&self, id: &Ulid) -> Option<SharedResourceState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    /// Where a reservation currently lives: Some(resource) or None for the
    /// unassigned pool. Errors if the id is unknown.
    pub fn locate_reservation(&self, id: &Ulid) -> Result<Option<Ulid>, EngineError> {
        self.reservation_index
            .get(id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(*id))
    }

    /// Acquire a resource's write lock within the bounded window. A timeout
    /// is a retryable error, not an indefinite queue — this is what bounds
    /// worst-case booking latency under contention.
    pub(super) async fn lock_resource_write(
        &self,
        resource_id: &Ulid,
    ) -> Result<OwnedRwLockWriteGuard<ResourceState>, EngineError> {
        let rs = self
            .get_resource(resource_id)
            .ok_or(EngineError::NotFound(*resource_id))?;
        let guard = tokio::time::timeout(limits::LOCK_TIMEOUT, rs.write_owned())
            .await
            .map_err(|_| EngineError::LockTimeout(*resource_id))?;
        // The resource may have been deleted while we waited on the lock.
        if !self.state.contains_key(resource_id) {
            return Err(EngineError::NotFound(*resource_id));
        }
        Ok(guard)
    }

    /// WAL-append + apply + notify in one call, for resource-scoped events.
    pub(super) async fn persist_and_apply(
        &self,
        resource_id: Ulid,
        rs: &mut ResourceState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_resource(rs, event, &self.reservation_index);
        self.notify.send(resource_id, event);
        Ok(())
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();

        // TODO: age out terminal reservations past a retention horizon here
        // instead of carrying every historical row forever.
        let arcs: Vec<SharedResourceState> =
            self.state.iter().map(|e| e.value().clone()).collect();
        for rs_arc in arcs {
            let guard = rs_arc.read().await;
            events.push(Event::ResourceCreated {
                id: guard.id,
                rtype: guard.rtype,
                capacity: guard.capacity,
                active: guard.active,
            });
            for r in &guard.reservations {
                events.push(Event::ReservationBooked {
                    id: r.id,
                    resource_id: Some(guard.id),
                    pet_id: r.pet_id,
                    customer_id: r.customer_id,
                    service_id: r.service_id,
                    stay: r.stay,
                    status: r.status,
                });
            }
        }
        for entry in self.unassigned.iter() {
            let r = entry.value();
            events.push(Event::ReservationBooked {
                id: r.id,
                resource_id: None,
                pet_id: r.pet_id,
                customer_id: r.customer_id,
                service_id: r.service_id,
                stay: r.stay,
                status: r.status,
            });
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact {
                events,
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
