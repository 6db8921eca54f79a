//! Bulk slot generation from date/time ranges.

use chrono::{NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use studiodesk_core::{DomainError, DomainResult};

/// Availability for one day, e.g. 2026-04-04 09:00-12:00.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// One generated slot's time bounds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotWindow {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

fn minute_of_day(t: NaiveTime) -> u32 {
    t.num_seconds_from_midnight() / 60
}

fn time_at(minute: u32) -> DomainResult<NaiveTime> {
    NaiveTime::from_hms_opt(minute / 60, minute % 60, 0)
        .ok_or_else(|| DomainError::invariant("slot time out of range"))
}

/// Expand windows into back-to-back slots of `duration_minutes`, separated by
/// `buffer_minutes`. A slot is emitted only if it ends within its window.
pub fn expand_slots(
    windows: &[AvailabilityWindow],
    duration_minutes: u32,
    buffer_minutes: u32,
) -> DomainResult<Vec<SlotWindow>> {
    if duration_minutes == 0 {
        return Err(DomainError::validation(
            "slot duration must be at least one minute",
        ));
    }

    let mut slots = Vec::new();
    for window in windows {
        let start = minute_of_day(window.start);
        let end = minute_of_day(window.end);
        if end <= start {
            return Err(DomainError::validation(format!(
                "end time must be after start time on {}",
                window.date
            )));
        }

        let mut cur = start;
        while cur + duration_minutes <= end {
            let slot_end = cur + duration_minutes;
            slots.push(SlotWindow {
                date: window.date,
                start: time_at(cur)?,
                end: time_at(slot_end)?,
            });
            cur = slot_end + buffer_minutes;
        }
    }
    Ok(slots)
}
