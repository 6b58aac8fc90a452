use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    Available,
    Booked,
}

/// The single authoritative status map for one (company, event) pair.
///
/// `version` increases on every write; stores compare it before replacing
/// the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingStatusRecord {
    pub company_id: Uuid,
    pub event_id: Uuid,
    pub statuses: BTreeMap<NaiveDate, SlotStatus>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl BookingStatusRecord {
    pub fn new(company_id: Uuid, event_id: Uuid) -> Self {
        Self {
            company_id,
            event_id,
            statuses: BTreeMap::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Missing entries are available.
    pub fn status_on(&self, date: NaiveDate) -> SlotStatus {
        self.statuses.get(&date).copied().unwrap_or_default()
    }

    pub fn is_booked(&self, date: NaiveDate) -> bool {
        self.status_on(date) == SlotStatus::Booked
    }

    /// Returns true when the stored status actually changed.
    pub fn set(&mut self, date: NaiveDate, status: SlotStatus) -> bool {
        let previous = self.statuses.insert(date, status).unwrap_or_default();
        if previous == status {
            return false;
        }
        self.version += 1;
        self.updated_at = Utc::now();
        true
    }

    pub fn booked_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.statuses
            .iter()
            .filter(|(_, s)| **s == SlotStatus::Booked)
            .map(|(d, _)| *d)
    }
}
