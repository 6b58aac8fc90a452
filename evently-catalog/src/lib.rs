pub mod error;
pub mod schedule;
pub mod event;
pub mod availability;
pub mod conflict;
pub mod calendar;

pub use error::{CatalogError, FieldError};
pub use schedule::{DateConfiguration, MonthOverflow};
pub use event::{Company, Event, EventDraft, EventKind, SeatTier};
pub use availability::{BookingStatusRecord, SlotStatus};
pub use conflict::{find_conflicts, ConflictGuard, ConflictReport, ConflictingEvent};
pub use calendar::{project, CalendarEntry, CalendarMonth, MonthWindow};
