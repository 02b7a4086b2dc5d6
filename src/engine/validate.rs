use crate::config::ScheduleConfig;
use crate::error::{Error, ValidationError};
use crate::limits::*;
use crate::model::*;

use super::occupancy::occupied_slots;

/// Field-level checks that need nothing but the schedule configuration.
pub fn validate_details(config: &ScheduleConfig, details: &BookingDetails) -> Result<(), Error> {
    if details.customer_name.trim().is_empty() {
        return Err(ValidationError::Required("customer name".into()).into());
    }
    if details.customer_phone.trim().is_empty() {
        return Err(ValidationError::Required("customer phone".into()).into());
    }
    check_len("customer name", &details.customer_name, MAX_NAME_LEN)?;
    check_len("customer phone", &details.customer_phone, MAX_PHONE_LEN)?;
    if let Some(notes) = &details.notes {
        check_len("notes", notes, MAX_NOTES_LEN)?;
    }
    if details.guest_count == 0 {
        return Err(ValidationError::NoGuests.into());
    }
    if details.day.is_empty() {
        return Err(ValidationError::Required("day".into()).into());
    }
    if !config.is_day(&details.day) {
        return Err(ValidationError::UnknownDay(details.day.clone()).into());
    }
    if details.start_slot.is_empty() {
        return Err(ValidationError::Required("time slot".into()).into());
    }
    if details.duration_minutes > config.max_duration {
        return Err(ValidationError::DurationTooLong {
            minutes: details.duration_minutes,
            max: config.max_duration,
        }
        .into());
    }
    occupied_slots(&config.slots, details)?;
    Ok(())
}

/// The table must exist and seat the whole party.
pub fn validate_against_resource(details: &BookingDetails, resources: &[Resource]) -> Result<(), Error> {
    let resource = resources
        .iter()
        .find(|r| r.id == details.resource_id)
        .ok_or(ValidationError::UnknownResource(details.resource_id))?;
    if details.guest_count > resource.capacity {
        return Err(ValidationError::OverCapacity {
            table: resource.label.clone(),
            guests: details.guest_count,
            capacity: resource.capacity,
        }
        .into());
    }
    Ok(())
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), Error> {
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }
        .into());
    }
    Ok(())
}
