use std::sync::Arc;

use crate::availability::AvailabilityService;
use crate::bookings::BookingService;
use crate::catalog::CatalogService;
use crate::clock::Clock;
use crate::messaging::MessagingService;
use crate::publisher::EventPublisher;
use crate::repository::DocumentStore;

#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_message_length: usize,
    pub conflict_preview_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_message_length: 4000,
            conflict_preview_limit: evently_catalog::conflict::DEFAULT_PREVIEW_LIMIT,
        }
    }
}

/// All application services over one store, wired once at startup.
pub struct Services {
    pub catalog: CatalogService,
    pub availability: AvailabilityService,
    pub bookings: BookingService,
    pub messaging: MessagingService,
    pub limits: Limits,
}

impl Services {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        publisher: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        limits: Limits,
    ) -> Self {
        Self {
            catalog: CatalogService::new(store.clone(), publisher.clone(), clock.clone()),
            availability: AvailabilityService::new(store.clone(), clock.clone()),
            bookings: BookingService::new(store.clone(), publisher.clone(), clock),
            messaging: MessagingService::new(store, publisher, limits.max_message_length),
            limits,
        }
    }
}
