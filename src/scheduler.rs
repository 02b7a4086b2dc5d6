use std::sync::Arc;

use ulid::Ulid;

use crate::config::ScheduleConfig;
use crate::engine::{
    conflict_info, detect_conflict, find_occupant, free_starts, validate_against_resource,
    validate_details, OccupancyGrid, Verdict,
};
use crate::error::Error;
use crate::lifecycle::{BookingPhase, Draft, Step};
use crate::model::*;
use crate::store::BookingStore;

/// Everything the store knew at one moment.
#[derive(Debug, Clone)]
pub struct Snapshot {
    config: Arc<ScheduleConfig>,
    pub resources: Vec<Resource>,
    pub bookings: Vec<Booking>,
}

impl Snapshot {
    pub fn for_day(&self, day: &str) -> Vec<Booking> {
        self.bookings.iter().filter(|b| b.day() == day).cloned().collect()
    }

    pub fn grid(&self, day: &str) -> Result<OccupancyGrid, Error> {
        OccupancyGrid::build(&self.config.slots, day, &self.resources, &self.bookings)
    }

    pub fn find_occupant(
        &self,
        resource_id: Ulid,
        day: &str,
        slot_label: &str,
    ) -> Result<Option<Booking>, Error> {
        let bookings = self.for_day(day);
        Ok(find_occupant(&self.config.slots, resource_id, slot_label, &bookings)?.cloned())
    }

    pub fn free_starts(
        &self,
        resource_id: Ulid,
        day: &str,
        duration_minutes: u32,
        exclude: Option<Ulid>,
    ) -> Result<Vec<String>, Error> {
        let starts = free_starts(
            &self.config.slots,
            resource_id,
            day,
            duration_minutes,
            &self.bookings,
            exclude,
        )?;
        Ok(starts.into_iter().map(str::to_string).collect())
    }
}

/// Drives drafts through their lifecycle against a store.
///
/// Validation and the conflict pre-check run locally on a fresh snapshot, so
/// an obviously bad booking never reaches the store. The store may still
/// refuse on its own check; that refusal is treated like a local one.
pub struct Scheduler<S> {
    config: Arc<ScheduleConfig>,
    store: S,
}

impl<S: BookingStore> Scheduler<S> {
    pub fn new(config: Arc<ScheduleConfig>, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn snapshot(&self) -> Result<Snapshot, Error> {
        Ok(Snapshot {
            config: self.config.clone(),
            resources: self.store.list_resources().await?,
            bookings: self.store.list_bookings().await?,
        })
    }

    /// Commit a proposed or edited draft. A conflicted draft is revised first.
    pub async fn submit(&self, draft: &mut Draft) -> Result<Booking, Error> {
        if draft.phase() == BookingPhase::Conflicted {
            draft.apply(Step::Revise)?;
        }
        draft.phase().advance(Step::Commit)?;
        validate_details(&self.config, &draft.details)?;

        let snapshot = self.snapshot().await?;
        validate_against_resource(&draft.details, &snapshot.resources)?;
        if let Verdict::Conflict(other) = detect_conflict(
            &self.config.slots,
            &draft.details,
            &snapshot.bookings,
            draft.exclude_id(),
        )? {
            let info = conflict_info(&self.config.slots, other)?;
            metrics::counter!(crate::observability::CONFLICTS_TOTAL, "stage" => "precheck")
                .increment(1);
            tracing::debug!(with = %info.booking_id, "draft conflicts locally");
            draft.apply(Step::Reject)?;
            return Err(info.into());
        }

        let stored = match draft.id() {
            None => self.store.create_booking(draft.details.clone()).await,
            Some(id) => self.store.update_booking(id, draft.details.clone()).await,
        };
        let booking = match stored {
            Ok(booking) => booking,
            Err(err @ Error::Conflict(_)) => {
                tracing::debug!("store refused draft: {err}");
                draft.apply(Step::Reject)?;
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        draft.committed(&booking)?;
        Ok(booking)
    }

    /// Delete a committed booking. Its slots are free for the next snapshot.
    pub async fn cancel(&self, draft: &mut Draft) -> Result<(), Error> {
        draft.phase().advance(Step::Cancel)?;
        let id = draft.id().ok_or_else(|| Error::Lifecycle {
            from: draft.phase(),
            step: Step::Cancel,
        })?;
        self.store.delete_booking(id).await?;
        draft.apply(Step::Cancel)
    }
}
