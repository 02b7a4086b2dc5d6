use std::fmt;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::Error;
use crate::model::{Booking, BookingDetails};

/// Where a single booking is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingPhase {
    /// Filled in, not yet submitted.
    Proposed,
    /// Rejected by the conflict check; back to the form for correction.
    Conflicted,
    /// Persisted by the store.
    Committed,
    /// A committed booking reopened for changes.
    Edited,
    /// Removed from the active set. Terminal.
    Cancelled,
}

/// User-triggered transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Step {
    Reject,
    Revise,
    Commit,
    Edit,
    Cancel,
}

impl BookingPhase {
    pub fn advance(self, step: Step) -> Result<BookingPhase, Error> {
        use BookingPhase::*;
        let next = match (self, step) {
            (Proposed | Edited, Step::Reject) => Conflicted,
            (Conflicted, Step::Revise) => Proposed,
            (Proposed | Edited, Step::Commit) => Committed,
            (Committed, Step::Edit) => Edited,
            (Committed | Edited, Step::Cancel) => Cancelled,
            (from, step) => return Err(Error::Lifecycle { from, step }),
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        self == BookingPhase::Cancelled
    }
}

impl fmt::Display for BookingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BookingPhase::Proposed => "proposed",
            BookingPhase::Conflicted => "conflicted",
            BookingPhase::Committed => "committed",
            BookingPhase::Edited => "being edited",
            BookingPhase::Cancelled => "cancelled",
        })
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Reject => "reject",
            Step::Revise => "revise",
            Step::Commit => "commit",
            Step::Edit => "edit",
            Step::Cancel => "cancel",
        })
    }
}

/// A booking as the user is working on it: the form contents plus its phase.
///
/// `id` is set once the store has accepted the booking, and it doubles as the
/// id excluded from conflict scans while the booking is edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub details: BookingDetails,
    id: Option<Ulid>,
    phase: BookingPhase,
}

impl Draft {
    pub fn new(details: BookingDetails) -> Self {
        Self {
            details,
            id: None,
            phase: BookingPhase::Proposed,
        }
    }

    /// Reopen a committed booking.
    pub fn edit(booking: &Booking) -> Self {
        Self {
            details: booking.details.clone(),
            id: Some(booking.id),
            phase: BookingPhase::Edited,
        }
    }

    pub fn id(&self) -> Option<Ulid> {
        self.id
    }

    pub fn phase(&self) -> BookingPhase {
        self.phase
    }

    /// Booking to leave out of conflict scans: only set while editing.
    pub fn exclude_id(&self) -> Option<Ulid> {
        self.id
    }

    pub(crate) fn apply(&mut self, step: Step) -> Result<(), Error> {
        self.phase = self.phase.advance(step)?;
        Ok(())
    }

    pub(crate) fn committed(&mut self, booking: &Booking) -> Result<(), Error> {
        self.apply(Step::Commit)?;
        self.id = Some(booking.id);
        self.details = booking.details.clone();
        Ok(())
    }

    /// Take the committed booking back into edit mode.
    pub fn reopen(&mut self) -> Result<(), Error> {
        self.apply(Step::Edit)
    }
}
