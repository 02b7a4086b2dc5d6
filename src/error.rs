use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::lifecycle::{BookingPhase, Step};
use crate::model::SlotRange;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Conflict(Box<ConflictInfo>),

    #[error("not found: {0}")]
    NotFound(#[from] NotFound),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("cannot {step} a booking that is {from}")]
    Lifecycle { from: BookingPhase, step: Step },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short, stable name for the error kind (metrics labels, logs).
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation",
            Error::Conflict(_) => "conflict",
            Error::NotFound(_) => "not_found",
            Error::Transport(_) => "transport",
            Error::Storage(_) => "storage",
            Error::LimitExceeded(_) => "limit_exceeded",
            Error::Lifecycle { .. } => "lifecycle",
            Error::Config(_) => "config",
        }
    }
}

impl From<ConflictInfo> for Error {
    fn from(info: ConflictInfo) -> Self {
        Error::Conflict(Box::new(info))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(String),

    #[error("must have at least 1 guest")]
    NoGuests,

    #[error("party of {guests} exceeds capacity {capacity} of table {table}")]
    OverCapacity {
        table: String,
        guests: u32,
        capacity: u32,
    },

    #[error("duration must be positive")]
    ZeroDuration,

    #[error("unknown time slot: {0}")]
    UnknownSlot(String),

    #[error("unknown day: {0}")]
    UnknownDay(String),

    #[error("unknown table: {0}")]
    UnknownResource(Ulid),

    #[error("duration of {minutes} min exceeds the {max} min maximum")]
    DurationTooLong { minutes: u32, max: u32 },

    #[error("booking at {start} for {minutes} min runs past the last slot")]
    OutOfRange { start: String, minutes: u32 },

    #[error("{field} longer than {max} characters")]
    TooLong { field: String, max: usize },
}

/// The existing booking a candidate collided with, enough for a readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[error("This time slot conflicts with an existing booking for {customer_name} at {start_slot}")]
pub struct ConflictInfo {
    pub booking_id: Ulid,
    pub customer_name: String,
    pub start_slot: String,
    pub range: SlotRange,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum NotFound {
    #[error("time slot {0}")]
    Slot(String),

    #[error("booking {0}")]
    Booking(Ulid),

    #[error("table {0}")]
    Resource(Ulid),
}
