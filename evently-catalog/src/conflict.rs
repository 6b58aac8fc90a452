use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::event::Event;

/// How many conflicting dates a UI shows before "and N more".
pub const DEFAULT_PREVIEW_LIMIT: usize = 5;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConflictingEvent {
    pub event_id: Uuid,
    pub title: String,
    pub dates: Vec<NaiveDate>,
}

/// Result of intersecting candidate dates with a company's other experiences.
/// Always carries the full list; `preview` is for display only.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub conflicting_dates: Vec<NaiveDate>,
    pub conflicts_with: Vec<ConflictingEvent>,
}

impl ConflictReport {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn preview(&self, limit: usize) -> (&[NaiveDate], usize) {
        let shown = self.conflicting_dates.len().min(limit);
        (
            &self.conflicting_dates[..shown],
            self.conflicting_dates.len() - shown,
        )
    }
}

/// Intersect `candidate` with the expanded dates of every experience in
/// `existing`, skipping `exclude` (the event being edited).
///
/// Single-date events never take part in conflicts.
pub fn find_conflicts(
    candidate: &BTreeSet<NaiveDate>,
    existing: &[Event],
    exclude: Option<Uuid>,
    today: NaiveDate,
) -> ConflictReport {
    let mut all = BTreeSet::new();
    let mut conflicts_with = Vec::new();

    for event in existing {
        if !event.is_experience() || Some(event.id) == exclude {
            continue;
        }

        let overlap: Vec<NaiveDate> = event
            .dates(today)
            .intersection(candidate)
            .copied()
            .collect();

        if overlap.is_empty() {
            continue;
        }

        all.extend(overlap.iter().copied());
        conflicts_with.push(ConflictingEvent {
            event_id: event.id,
            title: event.title.clone(),
            dates: overlap,
        });
    }

    ConflictReport {
        has_conflict: !all.is_empty(),
        conflicting_dates: all.into_iter().collect(),
        conflicts_with,
    }
}

/// Conflict check carried into a store write so the check and the write
/// happen under the same lock or transaction.
#[derive(Debug, Clone)]
pub struct ConflictGuard {
    pub company_id: Uuid,
    pub candidate: BTreeSet<NaiveDate>,
    pub exclude: Option<Uuid>,
    pub today: NaiveDate,
}

impl ConflictGuard {
    /// `None` for single-date events, which are never checked.
    pub fn for_event(event: &Event, exclude: Option<Uuid>, today: NaiveDate) -> Option<Self> {
        if !event.is_experience() {
            return None;
        }
        Some(Self {
            company_id: event.company_id,
            candidate: event.dates(today),
            exclude,
            today,
        })
    }

    pub fn check(&self, existing: &[Event]) -> ConflictReport {
        find_conflicts(&self.candidate, existing, self.exclude, self.today)
    }
}
