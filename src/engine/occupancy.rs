use ulid::Ulid;

use crate::error::{Error, NotFound, ValidationError};
use crate::model::*;
use crate::slots::{Minutes, SlotIndex};

/// Slot range reserved by a booking starting at `start_slot` for `duration` minutes.
///
/// The range is never clamped: an unknown start label, a zero duration or a
/// range running past the last slot are validation errors.
pub fn range_of(slots: &SlotIndex, start_slot: &str, duration: Minutes) -> Result<SlotRange, Error> {
    let start = slots
        .index_of(start_slot)
        .ok_or_else(|| ValidationError::UnknownSlot(start_slot.to_string()))?;
    if duration == 0 {
        return Err(ValidationError::ZeroDuration.into());
    }
    let end = start + slots.slots_for(duration);
    if end > slots.len() {
        return Err(ValidationError::OutOfRange {
            start: start_slot.to_string(),
            minutes: duration,
        }
        .into());
    }
    Ok(SlotRange::new(start, end))
}

pub fn occupied_slots(slots: &SlotIndex, details: &BookingDetails) -> Result<SlotRange, Error> {
    range_of(slots, &details.start_slot, details.duration_minutes)
}

/// Range of a booking that already came out of the store.
///
/// Stored data that no longer fits the slot index means the index was
/// reconfigured underneath existing bookings; that is not something a user
/// can fix, so it is logged and reported as a missing slot.
pub(crate) fn stored_range(slots: &SlotIndex, booking: &Booking) -> Result<SlotRange, Error> {
    occupied_slots(slots, &booking.details).map_err(|e| {
        tracing::error!(
            booking = %booking.id,
            start_slot = %booking.details.start_slot,
            duration = booking.details.duration_minutes,
            "stored booking does not fit the slot index: {e}"
        );
        Error::NotFound(NotFound::Slot(booking.details.start_slot.clone()))
    })
}

/// Who, if anyone, holds `slot_label` on a table.
///
/// `bookings` is expected to be a single day's snapshot; bookings on other
/// tables are skipped.
pub fn find_occupant<'a>(
    slots: &SlotIndex,
    resource_id: Ulid,
    slot_label: &str,
    bookings: &'a [Booking],
) -> Result<Option<&'a Booking>, Error> {
    let index = slots
        .index_of(slot_label)
        .ok_or_else(|| NotFound::Slot(slot_label.to_string()))?;
    for booking in bookings.iter().filter(|b| b.resource_id() == resource_id) {
        if stored_range(slots, booking)?.contains(index) {
            return Ok(Some(booking));
        }
    }
    Ok(None)
}

/// Every start label at which a booking of `duration` minutes fits on the
/// table without running off the end of the day or hitting another booking.
pub fn free_starts<'a>(
    slots: &'a SlotIndex,
    resource_id: Ulid,
    day: &str,
    duration: Minutes,
    bookings: &[Booking],
    exclude: Option<Ulid>,
) -> Result<Vec<&'a str>, Error> {
    if duration == 0 {
        return Err(ValidationError::ZeroDuration.into());
    }
    let needed = slots.slots_for(duration);
    if needed > slots.len() {
        return Ok(Vec::new());
    }

    let mut taken = vec![false; slots.len()];
    for booking in bookings {
        if booking.resource_id() != resource_id || booking.day() != day || Some(booking.id) == exclude {
            continue;
        }
        for i in stored_range(slots, booking)?.iter() {
            taken[i] = true;
        }
    }

    // Sliding window over the taken flags: a start is free when the
    // `needed` cells from it are all untaken.
    let mut free = Vec::new();
    let mut run = 0usize;
    for (i, &t) in taken.iter().enumerate() {
        run = if t { 0 } else { run + 1 };
        if run >= needed {
            let start = i + 1 - needed;
            if let Some(label) = slots.label(start) {
                free.push(label);
            }
        }
    }

    Ok(free)
}
