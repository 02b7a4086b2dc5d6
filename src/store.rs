use std::sync::Arc;

use async_trait::async_trait;
use ulid::Ulid;

use crate::error::Error;
use crate::model::*;

/// The external booking store, reached through request/response calls.
///
/// Implementations may or may not re-check conflicts; callers run
/// `detect_conflict` themselves before mutating.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn list_resources(&self) -> Result<Vec<Resource>, Error>;

    /// All bookings, every day and table.
    async fn list_bookings(&self) -> Result<Vec<Booking>, Error>;

    /// Persist a new booking; the store assigns its id.
    async fn create_booking(&self, details: BookingDetails) -> Result<Booking, Error>;

    async fn update_booking(&self, id: Ulid, details: BookingDetails) -> Result<Booking, Error>;

    async fn delete_booking(&self, id: Ulid) -> Result<(), Error>;
}

#[async_trait]
impl<S: BookingStore + ?Sized> BookingStore for Arc<S> {
    async fn list_resources(&self) -> Result<Vec<Resource>, Error> {
        (**self).list_resources().await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        (**self).list_bookings().await
    }

    async fn create_booking(&self, details: BookingDetails) -> Result<Booking, Error> {
        (**self).create_booking(details).await
    }

    async fn update_booking(&self, id: Ulid, details: BookingDetails) -> Result<Booking, Error> {
        (**self).update_booking(id, details).await
    }

    async fn delete_booking(&self, id: Ulid) -> Result<(), Error> {
        (**self).delete_booking(id).await
    }
}
