use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use evently_catalog::{BookingStatusRecord, Company, ConflictGuard, Event, SlotStatus};
use evently_core::repository::{
    BookingRepository, BookingStatusRepository, CompanyRepository, ConversationRepository, EventRepository,
    PaymentUpdate,
};
use evently_core::{CoreError, CoreResult};
use evently_order::{Booking, BookingStatus, Conversation, Message, PaymentStatus};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use std::collections::BTreeMap;
use tracing::error;
use uuid::Uuid;

/// Postgres-backed document store. Each aggregate is one JSONB `doc` column
/// plus the indexed columns the queries filter on.
///
/// Writes that must be atomic with a read (guarded event writes, booking
/// transitions) lock the owning company row with `FOR UPDATE`, so they
/// serialize per company.
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn db_err(e: sqlx::Error) -> CoreError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
            CoreError::Connectivity(e.to_string())
        }
        other => {
            error!("Database error: {}", other);
            CoreError::InternalError("database error".to_string())
        }
    }
}

#[derive(sqlx::FromRow)]
struct CompanyRow {
    doc: Json<Company>,
    event_count: i32,
}

impl CompanyRow {
    fn into_company(self) -> Company {
        let mut company = self.doc.0;
        company.event_count = self.event_count.max(0) as u32;
        company
    }
}

type Doc<T> = (Json<T>,);

#[derive(sqlx::FromRow)]
struct StatusRow {
    statuses: Json<BTreeMap<NaiveDate, SlotStatus>>,
    version: i64,
    updated_at: chrono::DateTime<Utc>,
}

async fn lock_company(conn: &mut PgConnection, company_id: Uuid) -> CoreResult<()> {
    let locked: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM companies WHERE id = $1 FOR UPDATE")
        .bind(company_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;

    match locked {
        Some(_) => Ok(()),
        None => Err(CoreError::NotFound(format!("company {}", company_id))),
    }
}

async fn company_events(conn: &mut PgConnection, company_id: Uuid) -> CoreResult<Vec<Event>> {
    let rows: Vec<Doc<Event>> =
        sqlx::query_as("SELECT doc FROM events WHERE company_id = $1 ORDER BY created_at, id")
            .bind(company_id)
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;
    Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
}

fn run_guard(guard: Option<&ConflictGuard>, existing: &[Event]) -> CoreResult<()> {
    if let Some(guard) = guard {
        let report = guard.check(existing);
        if report.has_conflict {
            return Err(CoreError::Conflict(report));
        }
    }
    Ok(())
}

async fn status_record(
    conn: &mut PgConnection,
    company_id: Uuid,
    event_id: Uuid,
) -> CoreResult<Option<BookingStatusRecord>> {
    let row: Option<StatusRow> = sqlx::query_as(
        "SELECT statuses, version, updated_at FROM booking_status WHERE company_id = $1 AND event_id = $2",
    )
    .bind(company_id)
    .bind(event_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(db_err)?;

    Ok(row.map(|r| BookingStatusRecord {
        company_id,
        event_id,
        statuses: r.statuses.0,
        version: r.version,
        updated_at: r.updated_at,
    }))
}

/// Replace the record if its stored version is still `expected_version`.
async fn save_status_record(
    conn: &mut PgConnection,
    record: &BookingStatusRecord,
    expected_version: i64,
) -> CoreResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO booking_status (company_id, event_id, statuses, version, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (company_id, event_id) DO UPDATE
            SET statuses = EXCLUDED.statuses, version = EXCLUDED.version, updated_at = EXCLUDED.updated_at
            WHERE booking_status.version = $6
        "#,
    )
    .bind(record.company_id)
    .bind(record.event_id)
    .bind(Json(&record.statuses))
    .bind(record.version)
    .bind(record.updated_at)
    .bind(expected_version)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;

    if result.rows_affected() == 0 {
        return Err(CoreError::StaleWrite(format!("booking status of event {}", record.event_id)));
    }
    Ok(())
}

async fn slot_bookings(conn: &mut PgConnection, event_id: Uuid, date: NaiveDate) -> CoreResult<Vec<Booking>> {
    let rows: Vec<Doc<Booking>> = sqlx::query_as("SELECT doc FROM bookings WHERE event_id = $1 AND date = $2")
        .bind(event_id)
        .bind(date)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
}

/// Recompute `date` from the bookings currently holding it.
async fn refresh(conn: &mut PgConnection, company_id: Uuid, event_id: Uuid, date: NaiveDate) -> CoreResult<()> {
    let held = slot_bookings(conn, event_id, date).await?.iter().any(|b| b.holds_slot());

    let mut record = status_record(conn, company_id, event_id)
        .await?
        .unwrap_or_else(|| BookingStatusRecord::new(company_id, event_id));
    let expected = record.version;
    let status = if held { SlotStatus::Booked } else { SlotStatus::Available };
    if record.set(date, status) {
        save_status_record(conn, &record, expected).await?;
    }
    Ok(())
}

async fn insert_booking(conn: &mut PgConnection, booking: &Booking) -> CoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bookings (id, event_id, company_id, customer_id, date, status, payment_status, doc, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(booking.id)
    .bind(booking.event_id)
    .bind(booking.company_id)
    .bind(&booking.customer.user_id)
    .bind(booking.date)
    .bind(booking.status.as_str())
    .bind(booking.payment_status.as_str())
    .bind(Json(booking))
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn update_booking(conn: &mut PgConnection, booking: &Booking) -> CoreResult<()> {
    sqlx::query("UPDATE bookings SET status = $2, payment_status = $3, doc = $4, updated_at = $5 WHERE id = $1")
        .bind(booking.id)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(Json(booking))
        .bind(booking.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(())
}

async fn slot_held_by_other(conn: &mut PgConnection, booking: &Booking) -> CoreResult<bool> {
    Ok(slot_bookings(conn, booking.event_id, booking.date)
        .await?
        .iter()
        .any(|b| b.id != booking.id && b.holds_slot()))
}

/// Write `updated` over the stored booking and keep the status map in step.
async fn commit_booking(conn: &mut PgConnection, before_held: bool, updated: &Booking) -> CoreResult<()> {
    update_booking(conn, updated).await?;
    if updated.holds_slot() != before_held {
        refresh(conn, updated.company_id, updated.event_id, updated.date).await?;
    }
    Ok(())
}

/// Load the booking inside a transaction that already holds its company lock.
async fn locked_booking(conn: &mut PgConnection, id: Uuid) -> CoreResult<Booking> {
    let company_id: Option<(Uuid,)> = sqlx::query_as("SELECT company_id FROM bookings WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err)?;
    let (company_id,) = company_id.ok_or_else(|| CoreError::NotFound(format!("booking {}", id)))?;

    lock_company(conn, company_id).await?;

    let (Json(booking),): Doc<Booking> = sqlx::query_as("SELECT doc FROM bookings WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_err)?;
    Ok(booking)
}

#[async_trait]
impl CompanyRepository for PgDocumentStore {
    async fn create_company(&self, company: &Company) -> CoreResult<Uuid> {
        sqlx::query(
            "INSERT INTO companies (id, owner_user_id, name, doc, event_count, created_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(company.id)
        .bind(&company.owner_user_id)
        .bind(&company.name)
        .bind(Json(company))
        .bind(company.event_count as i32)
        .bind(company.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(company.id)
    }

    async fn get_company(&self, id: Uuid) -> CoreResult<Option<Company>> {
        let row: Option<CompanyRow> = sqlx::query_as("SELECT doc, event_count FROM companies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(CompanyRow::into_company))
    }

    async fn list_companies_by_owner(&self, owner_user_id: &str) -> CoreResult<Vec<Company>> {
        let rows: Vec<CompanyRow> =
            sqlx::query_as("SELECT doc, event_count FROM companies WHERE owner_user_id = $1 ORDER BY name")
                .bind(owner_user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(CompanyRow::into_company).collect())
    }
}

#[async_trait]
impl EventRepository for PgDocumentStore {
    async fn list_events_by_company(&self, company_id: Uuid) -> CoreResult<Vec<Event>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        company_events(&mut conn, company_id).await
    }

    async fn get_event(&self, id: Uuid) -> CoreResult<Option<Event>> {
        let row: Option<Doc<Event>> = sqlx::query_as("SELECT doc FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn create_event(&self, event: &Event, guard: Option<&ConflictGuard>) -> CoreResult<Uuid> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        lock_company(&mut tx, event.company_id).await?;
        if guard.is_some() {
            let existing = company_events(&mut tx, event.company_id).await?;
            run_guard(guard, &existing)?;
        }

        sqlx::query(
            "INSERT INTO events (id, company_id, kind, doc, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(event.id)
        .bind(event.company_id)
        .bind(event.kind.as_str())
        .bind(Json(event))
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query("UPDATE companies SET event_count = event_count + 1 WHERE id = $1")
            .bind(event.company_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(event.id)
    }

    async fn update_event(&self, event: &Event, guard: Option<&ConflictGuard>) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        lock_company(&mut tx, event.company_id).await?;
        if guard.is_some() {
            let existing = company_events(&mut tx, event.company_id).await?;
            run_guard(guard, &existing)?;
        }

        let result = sqlx::query("UPDATE events SET kind = $3, doc = $4, updated_at = $5 WHERE id = $1 AND company_id = $2")
            .bind(event.id)
            .bind(event.company_id)
            .bind(event.kind.as_str())
            .bind(Json(event))
            .bind(event.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("event {}", event.id)));
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn delete_event(&self, id: Uuid) -> CoreResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let deleted: Option<(Uuid,)> = sqlx::query_as("DELETE FROM events WHERE id = $1 RETURNING company_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        let Some((company_id,)) = deleted else {
            return Ok(false);
        };

        sqlx::query("DELETE FROM booking_status WHERE company_id = $1 AND event_id = $2")
            .bind(company_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        sqlx::query("UPDATE companies SET event_count = GREATEST(event_count - 1, 0) WHERE id = $1")
            .bind(company_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(true)
    }
}

#[async_trait]
impl BookingRepository for PgDocumentStore {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Uuid> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        lock_company(&mut tx, booking.company_id).await?;
        let booked = status_record(&mut tx, booking.company_id, booking.event_id)
            .await?
            .is_some_and(|r| r.is_booked(booking.date));
        if booked {
            return Err(CoreError::SlotTaken(booking.date));
        }

        insert_booking(&mut tx, booking).await?;
        if booking.holds_slot() {
            refresh(&mut tx, booking.company_id, booking.event_id, booking.date).await?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(booking.id)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row: Option<Doc<Booking>> = sqlx::query_as("SELECT doc FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn list_bookings_by_company(&self, company_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows: Vec<Doc<Booking>> =
            sqlx::query_as("SELECT doc FROM bookings WHERE company_id = $1 ORDER BY created_at DESC")
                .bind(company_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn list_bookings_by_customer(&self, user_id: &str) -> CoreResult<Vec<Booking>> {
        let rows: Vec<Doc<Booking>> =
            sqlx::query_as("SELECT doc FROM bookings WHERE customer_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn update_booking_status(
        &self,
        id: Uuid,
        expected: BookingStatus,
        next: BookingStatus,
    ) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut booking = locked_booking(&mut tx, id).await?;
        if booking.status != expected {
            return Err(CoreError::StaleWrite(format!("booking {}", id)));
        }

        let before_held = booking.holds_slot();
        booking.transition(next)?;
        if next == BookingStatus::Confirmed && slot_held_by_other(&mut tx, &booking).await? {
            return Err(CoreError::SlotTaken(booking.date));
        }
        commit_booking(&mut tx, before_held, &booking).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(booking)
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        expected: PaymentStatus,
        next: PaymentStatus,
        reference: Option<String>,
    ) -> CoreResult<PaymentUpdate> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let mut booking = locked_booking(&mut tx, id).await?;
        if booking.payment_status != expected {
            return Err(CoreError::StaleWrite(format!("booking {}", id)));
        }

        let before_held = booking.holds_slot();
        booking.record_payment(next, reference)?;
        let slot_clash =
            booking.holds_slot() && !before_held && slot_held_by_other(&mut tx, &booking).await?;
        commit_booking(&mut tx, before_held, &booking).await?;

        tx.commit().await.map_err(db_err)?;
        Ok(PaymentUpdate { booking, slot_clash })
    }
}

#[async_trait]
impl BookingStatusRepository for PgDocumentStore {
    async fn get_booking_status_record(
        &self,
        company_id: Uuid,
        event_id: Uuid,
    ) -> CoreResult<Option<BookingStatusRecord>> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        status_record(&mut conn, company_id, event_id).await
    }
}

#[async_trait]
impl ConversationRepository for PgDocumentStore {
    async fn create_conversation(&self, conversation: &Conversation) -> CoreResult<Conversation> {
        let inserted: Option<Doc<Conversation>> = sqlx::query_as(
            r#"
            INSERT INTO conversations (id, company_id, booking_id, owner_id, customer_id, doc, last_activity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (booking_id) DO NOTHING
            RETURNING doc
            "#,
        )
        .bind(conversation.id)
        .bind(conversation.company_id)
        .bind(conversation.booking_id)
        .bind(&conversation.owner_id)
        .bind(&conversation.customer_id)
        .bind(Json(conversation))
        .bind(conversation.last_activity())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if let Some((Json(doc),)) = inserted {
            return Ok(doc);
        }

        // Only a booking conversation can hit the conflict; return the one stored first.
        let Some(booking_id) = conversation.booking_id else {
            return Err(CoreError::StaleWrite(format!("conversation {}", conversation.id)));
        };
        self.find_conversation_by_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::StaleWrite(format!("conversation for booking {}", booking_id)))
    }

    async fn get_conversation(&self, id: Uuid) -> CoreResult<Option<Conversation>> {
        let row: Option<Doc<Conversation>> = sqlx::query_as("SELECT doc FROM conversations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn find_conversation_by_booking(&self, booking_id: Uuid) -> CoreResult<Option<Conversation>> {
        let row: Option<Doc<Conversation>> =
            sqlx::query_as("SELECT doc FROM conversations WHERE booking_id = $1")
                .bind(booking_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn list_conversations_for_user(&self, user_id: &str) -> CoreResult<Vec<Conversation>> {
        let rows: Vec<Doc<Conversation>> = sqlx::query_as(
            "SELECT doc FROM conversations WHERE owner_id = $1 OR customer_id = $1 ORDER BY last_activity DESC, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn create_message(&self, message: &Message) -> CoreResult<Uuid> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let row: Option<Doc<Conversation>> =
            sqlx::query_as("SELECT doc FROM conversations WHERE id = $1 FOR UPDATE")
                .bind(message.conversation_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(db_err)?;
        let mut conversation = row
            .map(|(Json(doc),)| doc)
            .ok_or_else(|| CoreError::NotFound(format!("conversation {}", message.conversation_id)))?;

        sqlx::query("INSERT INTO messages (id, conversation_id, sender_id, doc, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(message.id)
            .bind(message.conversation_id)
            .bind(&message.sender_id)
            .bind(Json(message))
            .bind(message.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        conversation.last_message_at = Some(message.created_at);
        sqlx::query("UPDATE conversations SET doc = $2, last_activity = $3 WHERE id = $1")
            .bind(conversation.id)
            .bind(Json(&conversation))
            .bind(message.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(message.id)
    }

    async fn list_messages(&self, conversation_id: Uuid) -> CoreResult<Vec<Message>> {
        let rows: Vec<Doc<Message>> =
            sqlx::query_as("SELECT doc FROM messages WHERE conversation_id = $1 ORDER BY created_at, id")
                .bind(conversation_id)
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;
        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }
}
