use chrono::Utc;
use evently_order::{Booking, BookingRequest, BookingStatus, PaymentStatus};
use evently_shared::models::{BookingCreatedEvent, BookingStatusChangedEvent, PaymentRecordedEvent};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::publisher::{emit, EventPublisher};
use crate::repository::DocumentStore;
use crate::session::AuthSession;
use crate::{CoreError, CoreResult};

/// Booking creation, lifecycle transitions and payment callbacks.
pub struct BookingService {
    store: Arc<dyn DocumentStore>,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
}

impl BookingService {
    pub fn new(store: Arc<dyn DocumentStore>, publisher: Arc<dyn EventPublisher>, clock: Arc<dyn Clock>) -> Self {
        Self { store, publisher, clock }
    }

    pub async fn create_booking(
        &self,
        session: &AuthSession,
        event_id: Uuid,
        request: BookingRequest,
    ) -> CoreResult<Booking> {
        let event = self
            .store
            .get_event(event_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("event {}", event_id)))?;

        let booking = Booking::quote(&event, &session.user_id, request, self.clock.today())?;

        self.store.create_booking(&booking).await.inspect_err(|e| {
            if let CoreError::SlotTaken(date) = e {
                warn!(%event_id, %date, "Refused booking: date already booked");
            }
        })?;

        info!(
            booking_id = %booking.id,
            %event_id,
            date = %booking.date,
            attendees = booking.attendees,
            "Booking created"
        );
        emit(
            self.publisher.as_ref(),
            &BookingCreatedEvent {
                booking_id: booking.id,
                event_id,
                company_id: booking.company_id,
                date: booking.date,
                attendees: booking.attendees,
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;

        Ok(booking)
    }

    /// Visible to the customer who booked and to whoever manages the company.
    pub async fn get_booking(&self, session: &AuthSession, booking_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        if booking.is_customer(&session.user_id) || self.manages(session, booking.company_id).await? {
            Ok(booking)
        } else {
            Err(CoreError::Forbidden(format!("booking {}", booking_id)))
        }
    }

    pub async fn list_for_company(&self, session: &AuthSession, company_id: Uuid) -> CoreResult<Vec<Booking>> {
        if !self.manages(session, company_id).await? {
            return Err(CoreError::Forbidden(format!("company {}", company_id)));
        }
        self.store.list_bookings_by_company(company_id).await
    }

    pub async fn list_for_customer(&self, session: &AuthSession) -> CoreResult<Vec<Booking>> {
        self.store.list_bookings_by_customer(&session.user_id).await
    }

    /// Operator-driven lifecycle change. The customer who booked may only cancel.
    pub async fn transition(
        &self,
        session: &AuthSession,
        booking_id: Uuid,
        next: BookingStatus,
    ) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;

        let is_manager = self.manages(session, booking.company_id).await?;
        let may_cancel = booking.is_customer(&session.user_id) && next == BookingStatus::Cancelled;
        if !is_manager && !may_cancel {
            return Err(CoreError::Forbidden(format!(
                "{} may not move booking {} to {}",
                session.user_id, booking_id, next
            )));
        }

        if !booking.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition(format!("{} → {}", booking.status, next)));
        }

        let previous = booking.status;
        let updated = self.store.update_booking_status(booking_id, previous, next).await?;

        info!(%booking_id, from = %previous, to = %next, by = %session.user_id, "Booking status changed");
        emit(
            self.publisher.as_ref(),
            &BookingStatusChangedEvent {
                booking_id,
                event_id: updated.event_id,
                company_id: updated.company_id,
                from: previous.to_string(),
                to: next.to_string(),
                changed_by: session.user_id.clone(),
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;

        Ok(updated)
    }

    /// Record what the payment provider reports. Re-delivery of the current
    /// status is accepted and changes nothing. A payment for a date another
    /// booking already holds is still recorded and published as a clash.
    pub async fn record_payment(
        &self,
        booking_id: Uuid,
        status: PaymentStatus,
        reference: Option<String>,
    ) -> CoreResult<Booking> {
        let booking = self.load(booking_id).await?;
        if booking.payment_status == status {
            return Ok(booking);
        }

        let previous = booking.payment_status;
        let update = self
            .store
            .update_payment_status(booking_id, previous, status, reference)
            .await?;
        let updated = update.booking;

        if update.slot_clash {
            warn!(
                %booking_id,
                date = %updated.date,
                reference = ?updated.payment_reference,
                "Payment captured for a date held by another booking"
            );
        } else {
            info!(%booking_id, from = %previous, to = %status, "Payment status recorded");
        }
        emit(
            self.publisher.as_ref(),
            &PaymentRecordedEvent {
                booking_id,
                event_id: updated.event_id,
                company_id: updated.company_id,
                date: updated.date,
                from: previous.to_string(),
                to: status.to_string(),
                reference: updated.payment_reference.clone(),
                slot_clash: update.slot_clash,
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;

        Ok(updated)
    }

    async fn load(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", booking_id)))
    }

    async fn manages(&self, session: &AuthSession, company_id: Uuid) -> CoreResult<bool> {
        if session.is_admin() {
            return Ok(true);
        }
        Ok(self
            .store
            .get_company(company_id)
            .await?
            .is_some_and(|c| session.can_manage(&c)))
    }
}
