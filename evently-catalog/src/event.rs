use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

use crate::error::{CatalogError, FieldError};
use crate::schedule::DateConfiguration;

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LEN: usize = 40;
/// Upper bound for a unit price in minor currency units.
pub const MAX_PRICE: i64 = 1_000_000_000;

/// Single fixed-date event, or an experience bookable across many dates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Event,
    Experience,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Event => "event",
            EventKind::Experience => "experience",
        }
    }
}

/// Optional seat-capacity tier (e.g. "VIP", "General").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatTier {
    pub name: String,
    pub price: i64,
    pub capacity: u32,
}

/// Company owning events. `event_count` is advisory: it is maintained in the
/// same store write as event inserts and deletes, the event list stays the
/// source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub owner_user_id: String,
    pub event_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Company {
    pub fn new(name: String, owner_user_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            description: None,
            contact_email: None,
            owner_user_id,
            event_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner_user_id == user_id
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(FieldError::new("name", "name is required"));
        } else if self.name.chars().count() > MAX_TITLE_LEN {
            errors.push(FieldError::new("name", "name is too long"));
        }
        if let Some(email) = &self.contact_email {
            if !email.contains('@') {
                errors.push(FieldError::new("contact_email", "not a valid email address"));
            }
        }
        CatalogError::from_fields(errors)
    }
}

/// Everything an operator submits when creating or editing an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    pub kind: EventKind,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    pub price: i64,
    pub currency: String,
    #[serde(default)]
    pub category: Option<String>,
    pub max_attendees: u32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    pub date_configuration: DateConfiguration,
    #[serde(default)]
    pub seat_tiers: Vec<SeatTier>,
}

impl EventDraft {
    /// Collect every field-level problem before anything is written.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push(FieldError::new("title", "title is required"));
        } else if title.chars().count() > MAX_TITLE_LEN {
            errors.push(FieldError::new(
                "title",
                format!("title may be at most {} characters", MAX_TITLE_LEN),
            ));
        }

        if self.price < 0 {
            errors.push(FieldError::new("price", "price must not be negative"));
        } else if self.price > MAX_PRICE {
            errors.push(FieldError::new(
                "price",
                format!("price may be at most {}", MAX_PRICE),
            ));
        }

        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            errors.push(FieldError::new(
                "currency",
                "currency must be a three-letter ISO 4217 code",
            ));
        }

        if self.max_attendees == 0 {
            errors.push(FieldError::new("max_attendees", "capacity must be at least 1"));
        }

        if self.tags.len() > MAX_TAGS {
            errors.push(FieldError::new(
                "tags",
                format!("at most {} tags are allowed", MAX_TAGS),
            ));
        }
        if self
            .tags
            .iter()
            .any(|t| t.trim().is_empty() || t.chars().count() > MAX_TAG_LEN)
        {
            errors.push(FieldError::new(
                "tags",
                format!("tags must be non-empty and at most {} characters", MAX_TAG_LEN),
            ));
        }

        self.validate_tiers(&mut errors);

        if let Err(CatalogError::Validation(fields)) = self.date_configuration.validate() {
            errors.extend(fields);
        }

        if self.kind == EventKind::Event {
            match &self.date_configuration {
                DateConfiguration::Selected { dates } if dates.len() <= 1 => {}
                _ => errors.push(FieldError::new(
                    "date_configuration",
                    "a single event takes exactly one selected date",
                )),
            }
        }

        CatalogError::from_fields(errors)
    }

    fn validate_tiers(&self, errors: &mut Vec<FieldError>) {
        if self.seat_tiers.is_empty() {
            return;
        }

        let mut names = HashSet::new();
        let mut total: u64 = 0;
        for tier in &self.seat_tiers {
            let name = tier.name.trim();
            if name.is_empty() {
                errors.push(FieldError::new("seat_tiers.name", "tier name is required"));
            } else if !names.insert(name.to_lowercase()) {
                errors.push(FieldError::new(
                    "seat_tiers.name",
                    format!("duplicate tier '{}'", name),
                ));
            }
            if tier.capacity == 0 {
                errors.push(FieldError::new(
                    "seat_tiers.capacity",
                    "tier capacity must be at least 1",
                ));
            }
            if tier.price < 0 {
                errors.push(FieldError::new("seat_tiers.price", "tier price must not be negative"));
            } else if tier.price > MAX_PRICE {
                errors.push(FieldError::new(
                    "seat_tiers.price",
                    format!("tier price may be at most {}", MAX_PRICE),
                ));
            }
            total += u64::from(tier.capacity);
        }

        if total > u64::from(self.max_attendees) {
            errors.push(FieldError::new(
                "seat_tiers.capacity",
                "tier capacities exceed max_attendees",
            ));
        }
    }
}

/// An event or experience owned by exactly one company.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub company_id: Uuid,
    pub kind: EventKind,
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: i64,
    pub currency: String,
    pub category: Option<String>,
    pub max_attendees: u32,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub start_time: Option<NaiveTime>,
    pub date_configuration: DateConfiguration,
    pub seat_tiers: Vec<SeatTier>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn from_draft(company_id: Uuid, draft: EventDraft) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            company_id,
            kind: draft.kind,
            title: draft.title.trim().to_string(),
            description: draft.description,
            location: draft.location,
            price: draft.price,
            currency: draft.currency,
            category: draft.category,
            max_attendees: draft.max_attendees,
            tags: draft.tags,
            image_url: draft.image_url,
            start_time: draft.start_time,
            date_configuration: draft.date_configuration,
            seat_tiers: draft.seat_tiers,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the editable fields, keeping identity and ownership.
    pub fn apply(&mut self, draft: EventDraft) {
        self.kind = draft.kind;
        self.title = draft.title.trim().to_string();
        self.description = draft.description;
        self.location = draft.location;
        self.price = draft.price;
        self.currency = draft.currency;
        self.category = draft.category;
        self.max_attendees = draft.max_attendees;
        self.tags = draft.tags;
        self.image_url = draft.image_url;
        self.start_time = draft.start_time;
        self.date_configuration = draft.date_configuration;
        self.seat_tiers = draft.seat_tiers;
        self.updated_at = Utc::now();
    }

    pub fn is_experience(&self) -> bool {
        self.kind == EventKind::Experience
    }

    pub fn dates(&self, today: NaiveDate) -> BTreeSet<NaiveDate> {
        self.date_configuration.expand(today)
    }

    pub fn offers_date(&self, date: NaiveDate, today: NaiveDate) -> bool {
        self.dates(today).contains(&date)
    }

    pub fn tier(&self, name: &str) -> Option<&SeatTier> {
        self.seat_tiers
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> EventDraft {
        EventDraft {
            kind: EventKind::Experience,
            title: "  Sunset Kayak Tour ".to_string(),
            description: "Two hours on the bay".to_string(),
            location: "Harbour".to_string(),
            price: 4500,
            currency: "EUR".to_string(),
            category: Some("outdoor".to_string()),
            max_attendees: 12,
            tags: vec!["water".to_string()],
            image_url: None,
            start_time: None,
            date_configuration: DateConfiguration::Range {
                start: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
                end: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
            },
            seat_tiers: vec![],
        }
    }

    #[test]
    fn test_valid_draft_builds_event() {
        let d = draft();
        d.validate().unwrap();

        let company_id = Uuid::new_v4();
        let event = Event::from_draft(company_id, d);
        assert_eq!(event.title, "Sunset Kayak Tour");
        assert_eq!(event.company_id, company_id);
        assert!(event.is_experience());
        assert_eq!(event.dates(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).len(), 30);
    }

    #[test]
    fn test_validation_reports_every_field() {
        let mut d = draft();
        d.title = "   ".to_string();
        d.currency = "eur".to_string();
        d.max_attendees = 0;

        let err = d.validate().unwrap_err();
        let fields: Vec<_> = err.fields().iter().map(|f| f.field.as_str()).collect();
        assert!(fields.contains(&"title"));
        assert!(fields.contains(&"currency"));
        assert!(fields.contains(&"max_attendees"));
    }

    #[test]
    fn test_tiers_must_fit_capacity() {
        let mut d = draft();
        d.seat_tiers = vec![
            SeatTier { name: "VIP".to_string(), price: 9000, capacity: 4 },
            SeatTier { name: "General".to_string(), price: 4500, capacity: 10 },
        ];
        assert!(d.validate().is_err());

        d.seat_tiers[1].capacity = 8;
        assert!(d.validate().is_ok());

        let event = Event::from_draft(Uuid::new_v4(), d);
        assert_eq!(event.tier("vip").map(|t| t.price), Some(9000));
    }

    #[test]
    fn test_duplicate_tier_names_rejected() {
        let mut d = draft();
        d.seat_tiers = vec![
            SeatTier { name: "VIP".to_string(), price: 9000, capacity: 2 },
            SeatTier { name: "vip".to_string(), price: 8000, capacity: 2 },
        ];
        let err = d.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate tier"));
    }

    #[test]
    fn test_prices_are_bounded() {
        let mut d = draft();
        d.price = MAX_PRICE;
        assert!(d.validate().is_ok());

        d.price = i64::MAX / 2 + 1;
        d.seat_tiers = vec![SeatTier { name: "VIP".to_string(), price: MAX_PRICE + 1, capacity: 2 }];
        let err = d.validate().unwrap_err();
        let fields: Vec<_> = err.fields().iter().map(|f| f.field.as_str()).collect();
        assert!(fields.contains(&"price"));
        assert!(fields.contains(&"seat_tiers.price"));
    }

    #[test]
    fn test_single_event_needs_one_date() {
        let mut d = draft();
        d.kind = EventKind::Event;
        assert!(d.validate().is_err());

        d.date_configuration = DateConfiguration::Selected {
            dates: vec![NaiveDate::from_ymd_opt(2025, 7, 4).unwrap()],
        };
        assert!(d.validate().is_ok());
    }
}
