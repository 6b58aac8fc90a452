use chrono::{NaiveDate, Utc};
use evently_catalog::{Company, ConflictGuard, Event, EventDraft};
use evently_shared::models::EventCreatedEvent;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::publisher::{emit, EventPublisher};
use crate::repository::DocumentStore;
use crate::session::AuthSession;
use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCompany {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
}

/// Companies and their events. Every write checks ownership through the
/// caller's session.
pub struct CatalogService {
    store: Arc<dyn DocumentStore>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn DocumentStore>, publisher: Arc<dyn EventPublisher>, clock: Arc<dyn Clock>) -> Self {
        Self { store, publisher, clock }
    }

    pub async fn create_company(&self, session: &AuthSession, request: NewCompany) -> CoreResult<Company> {
        session.require_operator()?;

        let mut company = Company::new(request.name.trim().to_string(), session.user_id.clone());
        company.description = request.description;
        company.contact_email = request.contact_email;
        company.validate()?;

        self.store.create_company(&company).await?;
        info!(company_id = %company.id, owner = %session.user_id, "Company created");
        Ok(company)
    }

    pub async fn get_company(&self, company_id: Uuid) -> CoreResult<Company> {
        self.store
            .get_company(company_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("company {}", company_id)))
    }

    pub async fn my_companies(&self, session: &AuthSession) -> CoreResult<Vec<Company>> {
        self.store.list_companies_by_owner(&session.user_id).await
    }

    pub async fn list_events(&self, company_id: Uuid) -> CoreResult<Vec<Event>> {
        self.store.list_events_by_company(company_id).await
    }

    pub async fn get_event(&self, event_id: Uuid) -> CoreResult<Event> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("event {}", event_id)))
    }

    /// Dates the event is available on, anchored on today.
    pub async fn event_dates(&self, event_id: Uuid) -> CoreResult<BTreeSet<NaiveDate>> {
        let event = self.get_event(event_id).await?;
        Ok(event.dates(self.clock.today()))
    }

    /// Validate, then write with the conflict check inside the same store
    /// operation. Overlaps are refused with `CoreError::Conflict`.
    pub async fn create_event(
        &self,
        session: &AuthSession,
        company_id: Uuid,
        draft: EventDraft,
    ) -> CoreResult<Event> {
        let company = self.get_company(company_id).await?;
        session.require_manage(&company)?;
        draft.validate()?;

        let today = self.clock.today();
        let event = Event::from_draft(company_id, draft);
        let guard = ConflictGuard::for_event(&event, None, today);

        self.store
            .create_event(&event, guard.as_ref())
            .await
            .inspect_err(|e| log_refused("create", company_id, e))?;

        info!(event_id = %event.id, %company_id, kind = event.kind.as_str(), "Event created");
        emit(
            self.publisher.as_ref(),
            &EventCreatedEvent {
                event_id: event.id,
                company_id,
                kind: event.kind.as_str().to_string(),
                date_count: event.dates(today).len(),
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;

        Ok(event)
    }

    pub async fn update_event(&self, session: &AuthSession, event_id: Uuid, draft: EventDraft) -> CoreResult<Event> {
        let mut event = self.get_event(event_id).await?;
        let company = self.get_company(event.company_id).await?;
        session.require_manage(&company)?;
        draft.validate()?;

        event.apply(draft);
        let guard = ConflictGuard::for_event(&event, Some(event.id), self.clock.today());

        self.store
            .update_event(&event, guard.as_ref())
            .await
            .inspect_err(|e| log_refused("update", company.id, e))?;

        info!(%event_id, "Event updated");
        Ok(event)
    }

    pub async fn delete_event(&self, session: &AuthSession, event_id: Uuid) -> CoreResult<()> {
        let event = self.get_event(event_id).await?;
        let company = self.get_company(event.company_id).await?;
        session.require_manage(&company)?;

        if !self.store.delete_event(event_id).await? {
            return Err(CoreError::NotFound(format!("event {}", event_id)));
        }
        info!(%event_id, company_id = %company.id, "Event deleted");
        Ok(())
    }
}

fn log_refused(action: &str, company_id: Uuid, err: &CoreError) {
    if let CoreError::Conflict(report) = err {
        warn!(
            %company_id,
            dates = report.conflicting_dates.len(),
            "Refused event {}: date conflict",
            action
        );
    }
}
