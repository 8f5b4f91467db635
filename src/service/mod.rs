mod bookings;
mod contracts;
mod customers;
mod error;
mod facilities;
mod overlap;

pub use bookings::NewBooking;
pub use contracts::ContractPatch;
pub use customers::CustomerFields;
pub use error::ServiceError;
pub use facilities::FacilityFields;
pub use overlap::{merge_overlapping, subtract_intervals};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::email::Mailer;
use crate::model::*;
use crate::wal::Wal;

pub type SharedFacilityState = Arc<RwLock<FacilityState>>;
pub type SharedCustomer = Arc<RwLock<Customer>>;
pub type SharedContract = Arc<RwLock<BookingContract>>;

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
                            metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                                .record(batch.len() as f64);
                            let flush_start = std::time::Instant::now();
                            let result = flush_batch(&mut wal, &mut batch);
                            metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                                .record(flush_start.elapsed().as_secs_f64());
                            respond_batch(&mut batch, &result);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                        .record(batch.len() as f64);
                    let flush_start = std::time::Instant::now();
                    let result = flush_batch(&mut wal, &mut batch);
                    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                        .record(flush_start.elapsed().as_secs_f64());
                    respond_batch(&mut batch, &result);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(wal: &mut Wal, batch: &mut [(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
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

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
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

/// Application service over the booking document store.
///
/// Documents live in DashMaps keyed by ULID; facilities carry their booking
/// calendar so availability checks and commits happen under one write lock.
/// Every mutation is WAL-appended before it is applied in memory.
pub struct Service {
    pub(super) customers: DashMap<Ulid, SharedCustomer>,
    pub(super) facilities: DashMap<Ulid, SharedFacilityState>,
    pub(super) contracts: DashMap<Ulid, SharedContract>,
    /// Reverse lookup: booking id → facility id.
    pub(super) booking_to_facility: DashMap<Ulid, Ulid>,
    /// One contract per booking.
    pub(super) contract_by_booking: DashMap<Ulid, Ulid>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) mailer: Arc<dyn Mailer>,
}

impl Service {
    pub fn new(wal_path: PathBuf, mailer: Arc<dyn Mailer>) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let service = Self {
            customers: DashMap::new(),
            facilities: DashMap::new(),
            contracts: DashMap::new(),
            booking_to_facility: DashMap::new(),
            contract_by_booking: DashMap::new(),
            wal_tx,
            mailer,
        };

        // Replay events — we're the sole owner of these Arcs, so try_write
        // always succeeds instantly (no contention). Never use blocking_write
        // here because this may run inside an async context.
        for event in events {
            service.apply_replayed(event);
        }

        Ok(service)
    }

    fn apply_replayed(&self, event: Event) {
        match event {
            Event::CustomerPut(c) => {
                if let Some(entry) = self.customers.get(&c.id) {
                    let arc = entry.value().clone();
                    drop(entry);
                    *arc.try_write().expect("replay: uncontended write") = c;
                } else {
                    self.customers.insert(c.id, Arc::new(RwLock::new(c)));
                }
            }
            Event::CustomerDeleted { id } => {
                self.customers.remove(&id);
            }
            Event::FacilityPut(f) => {
                if let Some(entry) = self.facilities.get(&f.id) {
                    let arc = entry.value().clone();
                    drop(entry);
                    arc.try_write().expect("replay: uncontended write").facility = f;
                } else {
                    self.facilities
                        .insert(f.id, Arc::new(RwLock::new(FacilityState::new(f))));
                }
            }
            Event::FacilityDeleted { id } => {
                if let Some((_, state)) = self.facilities.remove(&id) {
                    let guard = state.try_read().expect("replay: uncontended read");
                    for b in &guard.bookings {
                        self.booking_to_facility.remove(&b.id);
                    }
                }
            }
            Event::BookingPut(b) => {
                if let Some(entry) = self.facilities.get(&b.facility_id) {
                    let arc = entry.value().clone();
                    drop(entry);
                    self.booking_to_facility.insert(b.id, b.facility_id);
                    arc.try_write()
                        .expect("replay: uncontended write")
                        .upsert_booking(b);
                }
            }
            Event::ContractPut(ct) => {
                self.contract_by_booking.insert(ct.booking_id, ct.id);
                if let Some(entry) = self.contracts.get(&ct.id) {
                    let arc = entry.value().clone();
                    drop(entry);
                    *arc.try_write().expect("replay: uncontended write") = ct;
                } else {
                    self.contracts.insert(ct.id, Arc::new(RwLock::new(ct)));
                }
            }
        }
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), ServiceError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| ServiceError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| ServiceError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| ServiceError::WalError(e.to_string()))
    }

    pub(super) fn get_facility_state(&self, id: &Ulid) -> Option<SharedFacilityState> {
        self.facilities.get(id).map(|e| e.value().clone())
    }

    pub fn facility_for_booking(&self, booking_id: &Ulid) -> Option<Ulid> {
        self.booking_to_facility.get(booking_id).map(|e| *e.value())
    }

    /// Lookup booking → facility, get facility state, acquire write lock.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<FacilityState>, ServiceError> {
        let facility_id = self
            .facility_for_booking(booking_id)
            .ok_or(ServiceError::NotFound(*booking_id))?;
        let state = self
            .get_facility_state(&facility_id)
            .ok_or(ServiceError::NotFound(facility_id))?;
        Ok(state.write_owned().await)
    }

    pub(super) async fn resolve_contract_write(
        &self,
        contract_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<BookingContract>, ServiceError> {
        let arc = self
            .contracts
            .get(contract_id)
            .map(|e| e.value().clone())
            .ok_or(ServiceError::NotFound(*contract_id))?;
        Ok(arc.write_owned().await)
    }

    /// Compact the WAL by rewriting it with only the events needed to
    /// recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), ServiceError> {
        let mut events = Vec::new();

        // Snapshot the Arcs first — never hold a DashMap shard across an await.
        let customers: Vec<SharedCustomer> =
            self.customers.iter().map(|e| e.value().clone()).collect();
        let facilities: Vec<SharedFacilityState> =
            self.facilities.iter().map(|e| e.value().clone()).collect();
        let contracts: Vec<SharedContract> =
            self.contracts.iter().map(|e| e.value().clone()).collect();

        for arc in customers {
            let guard = arc.read().await;
            events.push(Event::CustomerPut(guard.clone()));
        }
        for arc in facilities {
            let guard = arc.read().await;
            events.push(Event::FacilityPut(guard.facility.clone()));
            for b in &guard.bookings {
                events.push(Event::BookingPut(b.clone()));
            }
        }
        for arc in contracts {
            let guard = arc.read().await;
            events.push(Event::ContractPut(guard.clone()));
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| ServiceError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| ServiceError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| ServiceError::WalError(e.to_string()))
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
