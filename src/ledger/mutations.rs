use std::sync::Arc;

use tokio::sync::{oneshot, RwLock};
use ulid::Ulid;

use crate::engine::{check_no_conflict, validate_against_resource, validate_details};
use crate::error::{Error, NotFound, ValidationError};
use crate::limits::*;
use crate::model::*;

use super::{Ledger, ResourceBook, WalCommand};

impl Ledger {
    pub async fn create_resource(&self, label: String, capacity: u32) -> Result<Resource, Error> {
        self.add_resource(label, capacity, None).await
    }

    /// Create a table, optionally tagged with where it sits.
    pub async fn add_resource(
        &self,
        label: String,
        capacity: u32,
        location: Option<String>,
    ) -> Result<Resource, Error> {
        if label.trim().is_empty() {
            return Err(ValidationError::Required("table label".into()).into());
        }
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(ValidationError::TooLong {
                field: "table label".into(),
                max: MAX_LABEL_LEN,
            }
            .into());
        }
        if capacity == 0 {
            return Err(ValidationError::NoGuests.into());
        }
        let location = location.filter(|l| !l.trim().is_empty());
        if location.as_ref().is_some_and(|l| l.chars().count() > MAX_LOCATION_LEN) {
            return Err(ValidationError::TooLong {
                field: "table location".into(),
                max: MAX_LOCATION_LEN,
            }
            .into());
        }

        // Exclusive so the count check and the insert cannot interleave
        // with another creation.
        let _gate = self.commit_gate.write().await;
        if self.books.len() >= self.max_resources {
            return Err(Error::LimitExceeded("too many tables".into()));
        }

        let resource = Resource {
            id: Ulid::new(),
            label,
            capacity,
            location,
        };
        let event = Event::ResourceCreated {
            id: resource.id,
            label: resource.label.clone(),
            capacity,
            location: resource.location.clone(),
        };
        self.wal_append(&event).await?;
        self.books
            .insert(resource.id, Arc::new(RwLock::new(ResourceBook::new(resource.clone()))));
        tracing::info!(table = %resource.id, label = %resource.label, capacity, "table created");
        Ok(resource)
    }

    pub async fn create_booking(&self, details: BookingDetails) -> Result<Booking, Error> {
        let _gate = self.commit_gate.read().await;
        validate_details(&self.config, &details)?;
        let book = self
            .get_book(&details.resource_id)
            .ok_or(ValidationError::UnknownResource(details.resource_id))?;
        let mut guard = book.write().await;
        validate_against_resource(&details, std::slice::from_ref(&guard.resource))?;
        if guard.len() >= MAX_BOOKINGS_PER_RESOURCE {
            return Err(Error::LimitExceeded("too many bookings on table".into()));
        }

        check_no_conflict(&self.config.slots, &details, guard.on_day(&details.day), None)
            .inspect_err(count_commit_conflict)?;

        let booking = Booking {
            id: Ulid::new(),
            details,
        };
        let event = Event::BookingCreated {
            booking: booking.clone(),
        };
        self.wal_append(&event).await?;
        guard.insert(&self.config.slots, booking.clone());
        self.booking_to_resource.insert(booking.id, booking.resource_id());
        metrics::gauge!(crate::observability::BOOKINGS_ACTIVE).increment(1.0);
        tracing::debug!(booking = %booking.id, table = %booking.resource_id(), "booking created");
        Ok(booking)
    }

    /// Replace a booking's details, possibly moving it to another table.
    pub async fn update_booking(&self, id: Ulid, details: BookingDetails) -> Result<Booking, Error> {
        let _gate = self.commit_gate.read().await;
        validate_details(&self.config, &details)?;
        let target_id = details.resource_id;
        let target = self
            .get_book(&target_id)
            .ok_or(ValidationError::UnknownResource(target_id))?;

        let (current_id, mut current) = self.resolve_booking_write(&id).await?;
        if current_id == target_id {
            validate_against_resource(&details, std::slice::from_ref(&current.resource))?;
            check_no_conflict(&self.config.slots, &details, current.on_day(&details.day), Some(id))
                .inspect_err(count_commit_conflict)?;

            let booking = Booking { id, details };
            let event = Event::BookingUpdated {
                previous_resource_id: current_id,
                booking: booking.clone(),
            };
            self.wal_append(&event).await?;
            current.remove(id);
            current.insert(&self.config.slots, booking.clone());
            tracing::debug!(booking = %id, "booking updated");
            return Ok(booking);
        }

        // Moving tables: both locks, always taken in id order. Release the
        // one we hold first if the order requires it.
        let (mut current, mut target) = if current_id < target_id {
            let target = target.write_owned().await;
            (current, target)
        } else {
            drop(current);
            let target = target.write_owned().await;
            let book = self
                .get_book(&current_id)
                .ok_or(NotFound::Resource(current_id))?;
            let current = book.write_owned().await;
            (current, target)
        };
        if current.get(id).is_none() {
            return Err(NotFound::Booking(id).into());
        }

        validate_against_resource(&details, std::slice::from_ref(&target.resource))?;
        if target.len() >= MAX_BOOKINGS_PER_RESOURCE {
            return Err(Error::LimitExceeded("too many bookings on table".into()));
        }
        check_no_conflict(&self.config.slots, &details, target.on_day(&details.day), Some(id))
            .inspect_err(count_commit_conflict)?;

        let booking = Booking { id, details };
        let event = Event::BookingUpdated {
            previous_resource_id: current_id,
            booking: booking.clone(),
        };
        self.wal_append(&event).await?;
        current.remove(id);
        target.insert(&self.config.slots, booking.clone());
        self.booking_to_resource.insert(id, target_id);
        tracing::debug!(booking = %id, from = %current_id, to = %target_id, "booking moved");
        Ok(booking)
    }

    /// Remove a booking; its slots are free again immediately.
    pub async fn cancel_booking(&self, id: Ulid) -> Result<Booking, Error> {
        let _gate = self.commit_gate.read().await;
        let (resource_id, mut guard) = self.resolve_booking_write(&id).await?;
        let event = Event::BookingCancelled { id, resource_id };
        self.wal_append(&event).await?;
        let removed = guard.remove(id).ok_or(NotFound::Booking(id))?;
        self.booking_to_resource.remove(&id);
        metrics::gauge!(crate::observability::BOOKINGS_ACTIVE).decrement(1.0);
        tracing::debug!(booking = %id, "booking cancelled");
        Ok(removed)
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), Error> {
        let _gate = self.commit_gate.write().await;
        let books: Vec<_> = self.books.iter().map(|e| e.value().clone()).collect();
        let mut events = Vec::new();
        for book in books {
            let guard = book.read().await;
            events.push(Event::ResourceCreated {
                id: guard.resource.id,
                label: guard.resource.label.clone(),
                capacity: guard.resource.capacity,
                location: guard.resource.location.clone(),
            });
            for booking in guard.bookings() {
                events.push(Event::BookingCreated {
                    booking: booking.clone(),
                });
            }
        }

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| Error::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| Error::Storage("WAL writer dropped response".into()))?
            .map_err(|e| Error::Storage(e.to_string()))
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

fn count_commit_conflict(err: &Error) {
    if matches!(err, Error::Conflict(_)) {
        metrics::counter!(crate::observability::CONFLICTS_TOTAL, "stage" => "commit").increment(1);
    }
}
