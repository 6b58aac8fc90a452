use chrono::NaiveDate;
use evently_catalog::{
    find_conflicts, project, CalendarMonth, ConflictReport, DateConfiguration, MonthWindow,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::repository::DocumentStore;
use crate::{CoreError, CoreResult};

/// Read-side availability: conflict checks, booking-status lookups and the
/// calendar projection.
pub struct AvailabilityService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Compare `candidate` with every other experience of the company.
    ///
    /// Fails closed: when the company's events cannot be loaded the error is
    /// returned and callers must not treat the dates as free.
    pub async fn check_conflicts(
        &self,
        company_id: Uuid,
        candidate: &BTreeSet<NaiveDate>,
        exclude: Option<Uuid>,
    ) -> CoreResult<ConflictReport> {
        let events = self.store.list_events_by_company(company_id).await.map_err(|e| {
            warn!(%company_id, "Conflict check could not load events: {}", e);
            e
        })?;

        let report = find_conflicts(candidate, &events, exclude, self.today());
        debug!(
            %company_id,
            candidates = candidate.len(),
            conflicts = report.conflicting_dates.len(),
            "Conflict check"
        );
        Ok(report)
    }

    /// Validate a configuration and check it, as the edit form does before submit.
    pub async fn preview_conflicts(
        &self,
        company_id: Uuid,
        configuration: &DateConfiguration,
        exclude: Option<Uuid>,
    ) -> CoreResult<ConflictReport> {
        configuration.validate()?;
        let candidate = configuration.expand(self.today());
        self.check_conflicts(company_id, &candidate, exclude).await
    }

    /// Point lookup. No record, or no entry for the date, means not booked.
    pub async fn is_booked(&self, company_id: Uuid, event_id: Uuid, date: NaiveDate) -> CoreResult<bool> {
        let record = self.store.get_booking_status_record(company_id, event_id).await?;
        Ok(record.is_some_and(|r| r.is_booked(date)))
    }

    /// Which of `dates` are booked, per event. One store read per event.
    pub async fn booked_dates(
        &self,
        company_id: Uuid,
        event_ids: &[Uuid],
        dates: &BTreeSet<NaiveDate>,
    ) -> CoreResult<BTreeMap<Uuid, BTreeSet<NaiveDate>>> {
        let mut booked = BTreeMap::new();
        for event_id in event_ids {
            let Some(record) = self.store.get_booking_status_record(company_id, *event_id).await? else {
                continue;
            };
            let hits: BTreeSet<NaiveDate> = dates.iter().copied().filter(|d| record.is_booked(*d)).collect();
            if !hits.is_empty() {
                booked.insert(*event_id, hits);
            }
        }
        Ok(booked)
    }

    pub async fn calendar(&self, company_id: Uuid, year: i32, month: u32) -> CoreResult<CalendarMonth> {
        let window = MonthWindow::new(year, month)?;

        self.store
            .get_company(company_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("company {}", company_id)))?;

        let events = self.store.list_events_by_company(company_id).await?;
        let mut records = HashMap::new();
        for event in &events {
            if let Some(record) = self.store.get_booking_status_record(company_id, event.id).await? {
                records.insert(event.id, record);
            }
        }

        Ok(project(&events, &records, window, self.today()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::memory::MemoryStore;
    use crate::repository::{BookingRepository, CompanyRepository, EventRepository};
    use evently_catalog::{Company, Event, EventDraft, EventKind};
    use evently_order::{Booking, BookingRequest, BookingStatus};
    use evently_shared::Masked;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn experience(company_id: Uuid, title: &str, config: DateConfiguration) -> Event {
        Event::from_draft(
            company_id,
            EventDraft {
                kind: EventKind::Experience,
                title: title.to_string(),
                description: String::new(),
                location: String::new(),
                price: 2500,
                currency: "USD".to_string(),
                category: None,
                max_attendees: 6,
                tags: vec![],
                image_url: None,
                start_time: None,
                date_configuration: config,
                seat_tiers: vec![],
            },
        )
    }

    async fn setup() -> (Arc<MemoryStore>, AvailabilityService, Company, Event) {
        let store = Arc::new(MemoryStore::new());
        let company = Company::new("Trails".to_string(), "owner-1".to_string());
        store.create_company(&company).await.unwrap();

        let a = experience(
            company.id,
            "A",
            DateConfiguration::Selected {
                dates: vec![date(2025, 6, 1), date(2025, 6, 2)],
            },
        );
        store.create_event(&a, None).await.unwrap();

        let service = AvailabilityService::new(store.clone(), Arc::new(FixedClock(date(2025, 5, 1))));
        (store, service, company, a)
    }

    #[tokio::test]
    async fn test_range_overlapping_selected_dates_conflicts() {
        let (_store, service, company, _a) = setup().await;
        let b = DateConfiguration::Range {
            start: date(2025, 6, 2),
            end: date(2025, 6, 3),
        };

        let report = service.preview_conflicts(company.id, &b, None).await.unwrap();
        assert!(report.has_conflict);
        assert_eq!(report.conflicting_dates, vec![date(2025, 6, 2)]);
    }

    #[tokio::test]
    async fn test_disjoint_and_excluded_do_not_conflict() {
        let (_store, service, company, a) = setup().await;

        let later = DateConfiguration::Range {
            start: date(2025, 6, 3),
            end: date(2025, 6, 9),
        };
        assert!(!service.preview_conflicts(company.id, &later, None).await.unwrap().has_conflict);

        let same = a.date_configuration.clone();
        assert!(!service.preview_conflicts(company.id, &same, Some(a.id)).await.unwrap().has_conflict);
    }

    #[tokio::test]
    async fn test_conflict_check_fails_closed() {
        let (store, service, company, _a) = setup().await;
        store.set_available(false);

        let candidate: BTreeSet<_> = [date(2025, 7, 1)].into_iter().collect();
        let result = service.check_conflicts(company.id, &candidate, None).await;
        assert!(matches!(result, Err(CoreError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_missing_status_entry_is_not_booked() {
        let (_store, service, company, a) = setup().await;
        assert!(!service.is_booked(company.id, a.id, date(2025, 6, 1)).await.unwrap());
        assert!(!service.is_booked(company.id, Uuid::new_v4(), date(2025, 6, 1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_confirmed_booking_shows_in_lookup_and_calendar() {
        let (store, service, company, a) = setup().await;
        let booking = Booking::quote(
            &a,
            "user-9",
            BookingRequest {
                date: date(2025, 6, 2),
                time: None,
                attendees: 1,
                tier: None,
                name: "Kim".to_string(),
                email: Masked::new("kim@example.com".to_string()),
                phone: None,
                notes: None,
            },
            date(2025, 5, 1),
        )
        .unwrap();
        store.create_booking(&booking).await.unwrap();
        store
            .update_booking_status(booking.id, BookingStatus::Pending, BookingStatus::Confirmed)
            .await
            .unwrap();

        assert!(service.is_booked(company.id, a.id, date(2025, 6, 2)).await.unwrap());

        let dates: BTreeSet<_> = [date(2025, 6, 1), date(2025, 6, 2)].into_iter().collect();
        let booked = service.booked_dates(company.id, &[a.id], &dates).await.unwrap();
        assert_eq!(booked[&a.id].iter().copied().collect::<Vec<_>>(), vec![date(2025, 6, 2)]);

        let calendar = service.calendar(company.id, 2025, 6).await.unwrap();
        assert_eq!(calendar.days.len(), 2);
        assert_eq!(calendar.booked_count(), 1);
    }

    #[tokio::test]
    async fn test_calendar_rejects_bad_month() {
        let (_store, service, company, _a) = setup().await;
        assert!(matches!(
            service.calendar(company.id, 2025, 0).await,
            Err(CoreError::Validation(_))
        ));
    }
}
