//! Occupancy engine: pure functions over a snapshot of bookings.
//!
//! Nothing here performs I/O or holds state between calls. Callers hand in
//! the slot index and whatever bookings they currently know about; the
//! ledger re-runs the same checks under its resource lock at commit time.

mod conflict;
mod grid;
mod occupancy;
mod validate;

pub use conflict::{check_no_conflict, conflict_info, detect_conflict, Verdict};
pub use grid::{Cell, GridRow, OccupancyGrid};
pub use occupancy::{find_occupant, free_starts, occupied_slots, range_of};
pub use validate::{validate_against_resource, validate_details};
