use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::slots::Minutes;

/// Half-open range of slot indices `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: usize,
    pub end: usize,
}

impl SlotRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start < end, "SlotRange start must be before end");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Touching ranges (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &SlotRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.end
    }

    pub fn iter(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

/// A bookable table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub label: String,
    pub capacity: u32,
    /// Where in the room the table sits, e.g. "window" or "patio".
    #[serde(default)]
    pub location: Option<String>,
}

/// Everything about a booking except its identity. A candidate that has not
/// been persisted yet is just this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub resource_id: Ulid,
    pub day: String,
    pub start_slot: String,
    pub duration_minutes: Minutes,
    pub customer_name: String,
    pub customer_phone: String,
    pub guest_count: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub details: BookingDetails,
}

impl Booking {
    pub fn resource_id(&self) -> Ulid {
        self.details.resource_id
    }

    pub fn day(&self) -> &str {
        &self.details.day
    }

    pub fn start_slot(&self) -> &str {
        &self.details.start_slot
    }
}

/// The WAL record format. Flat, one variant per committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ResourceCreated {
        id: Ulid,
        label: String,
        capacity: u32,
        location: Option<String>,
    },
    BookingCreated {
        booking: Booking,
    },
    BookingUpdated {
        /// Table the booking sat on before the update.
        previous_resource_id: Ulid,
        booking: Booking,
    },
    BookingCancelled {
        id: Ulid,
        resource_id: Ulid,
    },
}
