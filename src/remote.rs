use async_trait::async_trait;
use tokio::net::TcpStream;
use ulid::Ulid;

use crate::error::Error;
use crate::model::*;
use crate::store::BookingStore;
use crate::wire::{self, Request, Response};

/// `BookingStore` backed by a ledger server. Opens a fresh connection per call.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    addr: String,
}

impl RemoteStore {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, req: Request) -> Result<Response, Error> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| Error::Transport(format!("connect {}: {e}", self.addr)))?;
        let mut lines = wire::client_framed(stream);
        match wire::round_trip(&mut lines, &req).await? {
            Response::Error { error } => Err(from_server(error)),
            resp => Ok(resp),
        }
    }

    pub async fn create_resource(&self, label: String, capacity: u32) -> Result<Resource, Error> {
        self.add_resource(label, capacity, None).await
    }

    pub async fn add_resource(
        &self,
        label: String,
        capacity: u32,
        location: Option<String>,
    ) -> Result<Resource, Error> {
        let req = Request::CreateResource { label, capacity, location };
        match self.call(req).await? {
            Response::Resource { resource } => Ok(resource),
            other => Err(unexpected("resource", &other)),
        }
    }
}

/// Server-side storage trouble is a transport problem from where we sit.
fn from_server(error: Error) -> Error {
    match error {
        Error::Storage(msg) => Error::Transport(format!("server storage: {msg}")),
        other => other,
    }
}

fn unexpected(wanted: &str, got: &Response) -> Error {
    Error::Transport(format!("expected {wanted} response, got {got:?}"))
}

#[async_trait]
impl BookingStore for RemoteStore {
    async fn list_resources(&self) -> Result<Vec<Resource>, Error> {
        match self.call(Request::ListResources).await? {
            Response::Resources { resources } => Ok(resources),
            other => Err(unexpected("resources", &other)),
        }
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, Error> {
        match self.call(Request::ListBookings).await? {
            Response::Bookings { bookings } => Ok(bookings),
            other => Err(unexpected("bookings", &other)),
        }
    }

    async fn create_booking(&self, details: BookingDetails) -> Result<Booking, Error> {
        match self.call(Request::CreateBooking { details }).await? {
            Response::Booking { booking } => Ok(booking),
            other => Err(unexpected("booking", &other)),
        }
    }

    async fn update_booking(&self, id: Ulid, details: BookingDetails) -> Result<Booking, Error> {
        match self.call(Request::UpdateBooking { id, details }).await? {
            Response::Booking { booking } => Ok(booking),
            other => Err(unexpected("booking", &other)),
        }
    }

    async fn delete_booking(&self, id: Ulid) -> Result<(), Error> {
        match self.call(Request::DeleteBooking { id }).await? {
            Response::Deleted { .. } => Ok(()),
            other => Err(unexpected("deleted", &other)),
        }
    }
}
