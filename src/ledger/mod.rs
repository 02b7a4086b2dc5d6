mod mutations;
mod queries;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::config::ScheduleConfig;
use crate::error::{Error, NotFound};
use crate::limits::MAX_RESOURCES;
use crate::model::*;
use crate::slots::SlotIndex;
use crate::store::BookingStore;
use crate::wal::Wal;

pub type SharedBook = Arc<RwLock<ResourceBook>>;

/// One table and its bookings, kept sorted by `(day, start slot)`.
#[derive(Debug, Clone)]
pub struct ResourceBook {
    pub resource: Resource,
    bookings: Vec<Booking>,
}

impl ResourceBook {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            bookings: Vec::new(),
        }
    }

    /// Insert maintaining sort order. Bookings whose start label is not in
    /// the index sort after everything else on their day.
    pub fn insert(&mut self, slots: &SlotIndex, booking: Booking) {
        let key = sort_key(slots, &booking);
        let pos = self
            .bookings
            .binary_search_by(|b| sort_key(slots, b).cmp(&key))
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove(&mut self, id: Ulid) -> Option<Booking> {
        let pos = self.bookings.iter().position(|b| b.id == id)?;
        Some(self.bookings.remove(pos))
    }

    pub fn get(&self, id: Ulid) -> Option<&Booking> {
        self.bookings.iter().find(|b| b.id == id)
    }

    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    /// Contiguous run of bookings on `day`.
    pub fn on_day(&self, day: &str) -> &[Booking] {
        let from = self.bookings.partition_point(|b| b.day() < day);
        let to = self.bookings.partition_point(|b| b.day() <= day);
        &self.bookings[from..to]
    }

    pub fn len(&self) -> usize {
        self.bookings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.is_empty()
    }
}

fn sort_key<'a>(slots: &SlotIndex, booking: &'a Booking) -> (&'a str, usize) {
    (
        booking.day(),
        slots.index_of(booking.start_slot()).unwrap_or(usize::MAX),
    )
}

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
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        tracing::error!("WAL flush failed for {} events: {e}", batch.len());
    }
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
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
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

/// The authoritative booking store.
///
/// Every mutation takes the affected table's write lock, re-validates and
/// re-runs the conflict check against the locked state, makes the event
/// durable in the WAL, and only then applies it. Two clients racing for the
/// same slot are serialized on that lock; the loser gets `Error::Conflict`.
pub struct Ledger {
    config: Arc<ScheduleConfig>,
    books: DashMap<Ulid, SharedBook>,
    /// Reverse lookup: booking id → table id.
    booking_to_resource: DashMap<Ulid, Ulid>,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Mutations hold this shared; compaction holds it exclusively so no
    /// append can land between the state snapshot and the log swap.
    commit_gate: RwLock<()>,
    max_resources: usize,
}

impl Ledger {
    /// Open the ledger at `wal_path`, replaying whatever is already there.
    /// Spawns the WAL writer, so this must run inside a tokio runtime.
    pub fn open(wal_path: PathBuf, config: Arc<ScheduleConfig>) -> io::Result<Self> {
        let events = Wal::recover(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let ledger = Self {
            config,
            books: DashMap::new(),
            booking_to_resource: DashMap::new(),
            wal_tx,
            commit_gate: RwLock::new(()),
            max_resources: MAX_RESOURCES,
        };

        // Sole owner of every lock during replay, so try_write always succeeds.
        // Never blocking_write here: this may run inside an async context.
        for event in &events {
            match event {
                Event::ResourceCreated { id, label, capacity, location } => {
                    let resource = Resource {
                        id: *id,
                        label: label.clone(),
                        capacity: *capacity,
                        location: location.clone(),
                    };
                    ledger.books.insert(*id, Arc::new(RwLock::new(ResourceBook::new(resource))));
                }
                Event::BookingCreated { booking } => ledger.replay_insert(booking),
                Event::BookingUpdated { previous_resource_id, booking } => {
                    ledger.replay_remove(*previous_resource_id, booking.id);
                    ledger.replay_insert(booking);
                }
                Event::BookingCancelled { id, resource_id } => ledger.replay_remove(*resource_id, *id),
            }
        }

        let total: usize = ledger.booking_to_resource.len();
        metrics::gauge!(crate::observability::BOOKINGS_ACTIVE).set(total as f64);
        tracing::info!(
            "ledger opened: {} events replayed, {} tables, {total} bookings",
            events.len(),
            ledger.books.len()
        );
        Ok(ledger)
    }

    fn replay_insert(&self, booking: &Booking) {
        let Some(book) = self.get_book(&booking.resource_id()) else {
            tracing::warn!(booking = %booking.id, "replay: booking on unknown table skipped");
            return;
        };
        let mut guard = book.try_write().expect("replay: uncontended write");
        guard.insert(&self.config.slots, booking.clone());
        self.booking_to_resource.insert(booking.id, booking.resource_id());
    }

    fn replay_remove(&self, resource_id: Ulid, id: Ulid) {
        if let Some(book) = self.get_book(&resource_id) {
            let mut guard = book.try_write().expect("replay: uncontended write");
            guard.remove(id);
        }
        self.booking_to_resource.remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn set_max_resources(&mut self, max: usize) {
        self.max_resources = max;
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn get_book(&self, resource_id: &Ulid) -> Option<SharedBook> {
        self.books.get(resource_id).map(|e| e.value().clone())
    }

    pub fn resource_for_booking(&self, id: &Ulid) -> Option<Ulid> {
        self.booking_to_resource.get(id).map(|e| *e.value())
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), Error> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| Error::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| Error::Storage("WAL writer dropped response".into()))?
            .map_err(|e| Error::Storage(e.to_string()))
    }

    /// Lookup booking → table, then take that table's write lock.
    async fn resolve_booking_write(
        &self,
        id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<ResourceBook>), Error> {
        let resource_id = self
            .resource_for_booking(id)
            .ok_or(NotFound::Booking(*id))?;
        let book = self
            .get_book(&resource_id)
            .ok_or(NotFound::Resource(resource_id))?;
        let guard = book.write_owned().await;
        // The booking may have moved tables while we waited for the lock.
        if guard.get(*id).is_none() {
            return Err(NotFound::Booking(*id).into());
        }
        Ok((resource_id, guard))
    }
}

#[async_trait]
impl BookingStore for Ledger {
    async fn list_resources(&self) -> Result<Vec<Resource>, Error> {
        Ok(Ledger::list_resources(self).await)
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        Ok(Ledger::list_bookings(self).await)
    }

    async fn create_booking(&self, details: BookingDetails) -> Result<Booking, Error> {
        Ledger::create_booking(self, details).await
    }

    async fn update_booking(&self, id: Ulid, details: BookingDetails) -> Result<Booking, Error> {
        Ledger::update_booking(self, id, details).await
    }

    async fn delete_booking(&self, id: Ulid) -> Result<(), Error> {
        Ledger::cancel_booking(self, id).await.map(|_| ())
    }
}
