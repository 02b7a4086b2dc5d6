use ulid::Ulid;

use crate::error::Error;
use crate::model::*;
use crate::slots::SlotIndex;

use super::occupancy::stored_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Free,
    /// First slot of a booking.
    Start(Ulid),
    /// Any later slot of a booking.
    Continued(Ulid),
}

impl Cell {
    pub fn booking_id(&self) -> Option<Ulid> {
        match self {
            Cell::Free => None,
            Cell::Start(id) | Cell::Continued(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridRow {
    pub resource_id: Ulid,
    pub cells: Vec<Cell>,
}

/// One day's occupancy: a row per table, a cell per slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    pub day: String,
    pub rows: Vec<GridRow>,
}

impl OccupancyGrid {
    /// Lay every booking for `day` onto its table's row.
    ///
    /// Bookings on unknown tables are ignored. If two stored bookings claim
    /// the same cell the earlier one in `bookings` keeps it.
    pub fn build(
        slots: &SlotIndex,
        day: &str,
        resources: &[Resource],
        bookings: &[Booking],
    ) -> Result<Self, Error> {
        let mut rows: Vec<GridRow> = resources
            .iter()
            .map(|r| GridRow {
                resource_id: r.id,
                cells: vec![Cell::Free; slots.len()],
            })
            .collect();

        for booking in bookings.iter().filter(|b| b.day() == day) {
            let Some(row) = rows.iter_mut().find(|r| r.resource_id == booking.resource_id()) else {
                tracing::debug!(booking = %booking.id, "booking on unknown table left off the grid");
                continue;
            };
            let range = stored_range(slots, booking)?;
            for i in range.iter() {
                if let Some(holder) = row.cells[i].booking_id() {
                    tracing::warn!(
                        slot = i,
                        kept = %holder,
                        dropped = %booking.id,
                        "overlapping bookings in stored data"
                    );
                    continue;
                }
                row.cells[i] = if i == range.start {
                    Cell::Start(booking.id)
                } else {
                    Cell::Continued(booking.id)
                };
            }
        }

        Ok(Self {
            day: day.to_string(),
            rows,
        })
    }

    pub fn row(&self, resource_id: Ulid) -> Option<&GridRow> {
        self.rows.iter().find(|r| r.resource_id == resource_id)
    }

    pub fn cell(&self, resource_id: Ulid, slot: usize) -> Option<Cell> {
        self.row(resource_id).and_then(|r| r.cells.get(slot).copied())
    }

    /// Free cells across all tables.
    pub fn free_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.cells.iter())
            .filter(|c| **c == Cell::Free)
            .count()
    }
}
