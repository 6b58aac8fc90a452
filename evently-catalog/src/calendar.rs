use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use crate::availability::{BookingStatusRecord, SlotStatus};
use crate::error::CatalogError;
use crate::event::{Event, EventKind};
use crate::schedule::last_day_of_month;

/// One calendar month, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    pub year: i32,
    pub month: u32,
    first: NaiveDate,
    last: NaiveDate,
}

impl MonthWindow {
    pub fn new(year: i32, month: u32) -> Result<Self, CatalogError> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| CatalogError::InvalidWindow(format!("{}-{:02}", year, month)))?;
        let last = last_day_of_month(first)
            .ok_or_else(|| CatalogError::InvalidWindow(format!("{}-{:02}", year, month)))?;
        Ok(Self { year, month, first, last })
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    pub fn last_day(&self) -> NaiveDate {
        self.last
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.first && date <= self.last
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarEntry {
    pub event_id: Uuid,
    pub title: String,
    pub kind: EventKind,
    pub status: SlotStatus,
}

/// Read-side view of a company's month: every date with at least one active
/// event, each event annotated with its booking status on that date.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub days: BTreeMap<NaiveDate, Vec<CalendarEntry>>,
}

impl CalendarMonth {
    pub fn booked_count(&self) -> usize {
        self.days
            .values()
            .flatten()
            .filter(|e| e.status == SlotStatus::Booked)
            .count()
    }
}

/// Expand every event, keep the dates inside `window` and group by date.
/// `records` is keyed by event id; events without a record are available.
pub fn project(
    events: &[Event],
    records: &HashMap<Uuid, BookingStatusRecord>,
    window: MonthWindow,
    today: NaiveDate,
) -> CalendarMonth {
    let mut days: BTreeMap<NaiveDate, Vec<CalendarEntry>> = BTreeMap::new();

    for event in events {
        let record = records.get(&event.id);
        for date in event.dates(today).range(window.first_day()..=window.last_day()) {
            let status = record.map(|r| r.status_on(*date)).unwrap_or_default();
            days.entry(*date).or_default().push(CalendarEntry {
                event_id: event.id,
                title: event.title.clone(),
                kind: event.kind,
                status,
            });
        }
    }

    for entries in days.values_mut() {
        entries.sort_by(|a, b| a.title.cmp(&b.title).then(a.event_id.cmp(&b.event_id)));
    }

    CalendarMonth {
        year: window.year,
        month: window.month,
        days,
    }
}
