use ulid::Ulid;

use crate::error::{ConflictInfo, Error};
use crate::model::*;
use crate::slots::SlotIndex;

use super::occupancy::{occupied_slots, stored_range};

/// Outcome of a conflict scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<'a> {
    Free,
    Conflict(&'a Booking),
}

impl Verdict<'_> {
    pub fn is_free(&self) -> bool {
        matches!(self, Verdict::Free)
    }
}

/// Scan `existing` for a booking that overlaps `candidate` on the same table and day.
///
/// `exclude` skips one booking by id, so a booking being edited in place does
/// not collide with its own previous version. The first overlap in input
/// order is reported; ranges that merely touch are not a conflict.
pub fn detect_conflict<'a>(
    slots: &SlotIndex,
    candidate: &BookingDetails,
    existing: &'a [Booking],
    exclude: Option<Ulid>,
) -> Result<Verdict<'a>, Error> {
    let range = occupied_slots(slots, candidate)?;

    let same_table_and_day = existing.iter().filter(|b| {
        b.resource_id() == candidate.resource_id
            && b.day() == candidate.day
            && Some(b.id) != exclude
    });
    for other in same_table_and_day {
        if range.overlaps(&stored_range(slots, other)?) {
            return Ok(Verdict::Conflict(other));
        }
    }
    Ok(Verdict::Free)
}

/// [`detect_conflict`] as a `Result`: a conflicting verdict becomes `Error::Conflict`.
pub fn check_no_conflict(
    slots: &SlotIndex,
    candidate: &BookingDetails,
    existing: &[Booking],
    exclude: Option<Ulid>,
) -> Result<(), Error> {
    match detect_conflict(slots, candidate, existing, exclude)? {
        Verdict::Free => Ok(()),
        Verdict::Conflict(other) => Err(conflict_info(slots, other)?.into()),
    }
}

/// What a caller needs to tell the user who they collided with.
pub fn conflict_info(slots: &SlotIndex, other: &Booking) -> Result<ConflictInfo, Error> {
    Ok(ConflictInfo {
        booking_id: other.id,
        customer_name: other.details.customer_name.clone(),
        start_slot: other.details.start_slot.clone(),
        range: stored_range(slots, other)?,
    })
}
