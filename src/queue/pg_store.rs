// src/queue/pg_store.rs

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::{
    clock::DayWindow,
    error::QueueError,
    models::{
        APPOINTMENT_APPROVED, AppointmentRow, NewTicket, RawDisplayRow, Ticket, TicketStatus,
        TicketViewRow,
    },
    queue::{
        allocator::next_order_num,
        pagination::PageRequest,
        store::{TicketQuery, TicketStore},
    },
};

const APPOINTMENT_UNIQUE: &str = "enter_ticket_appointment_uq";
const SINGLE_IN_CHECK_UNIQUE: &str = "enter_ticket_single_in_check_uq";

const TICKET_VIEW_SELECT: &str = r#"
    SELECT
      t.ticket_id,
      t.appointment_id,
      t.patient_id,
      t.room_id,
      r.room_name,
      t.order_num,
      t.status,
      t.check_in,
      t.note
    FROM enter_ticket t
    JOIN room r ON r.room_id = t.room_id
"#;

#[derive(Clone)]
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, q: &TicketQuery) {
    qb.push(" WHERE t.check_in >= ");
    qb.push_bind(q.window.start);
    qb.push(" AND t.check_in < ");
    qb.push_bind(q.window.end);

    if let Some(status) = q.status {
        qb.push(" AND t.status = ");
        qb.push_bind(status);
    }
    if let Some(room_id) = q.room_id {
        qb.push(" AND t.room_id = ");
        qb.push_bind(room_id);
    }
}

fn map_insert_error(e: sqlx::Error, appointment_id: Uuid) -> QueueError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.constraint() == Some(APPOINTMENT_UNIQUE) {
            return QueueError::TicketExists(appointment_id);
        }
    }
    QueueError::from(e)
}

fn map_status_error(e: sqlx::Error) -> QueueError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.constraint() == Some(SINGLE_IN_CHECK_UNIQUE) {
            return QueueError::already_in_check();
        }
    }
    QueueError::from(e)
}

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn find_approved_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentRow>, QueueError> {
        let row = sqlx::query_as::<_, AppointmentRow>(
            r#"
            SELECT appointment_id, patient_id, room_id
            FROM appointment
            WHERE appointment_id = $1
              AND status::text = $2
            "#,
        )
        .bind(appointment_id)
        .bind(APPOINTMENT_APPROVED)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_ticket(
        &self,
        ticket: NewTicket,
        window: &DayWindow,
    ) -> Result<Ticket, QueueError> {
        let mut tx = self.pool.begin().await?;

        // Counter row per room/day, seeded from tickets already issued that day.
        sqlx::query(
            r#"
            INSERT INTO ticket_order_counter (room_id, service_day, last_order_num)
            SELECT $1, $2, COALESCE(MAX(order_num), 0)
            FROM enter_ticket
            WHERE room_id = $1
              AND check_in >= $3
              AND check_in <  $4
            ON CONFLICT (room_id, service_day) DO NOTHING
            "#,
        )
        .bind(ticket.room_id)
        .bind(window.day)
        .bind(window.start)
        .bind(window.end)
        .execute(&mut *tx)
        .await?;

        // Row lock serialises allocation for this room/day until commit.
        let latest: i32 = sqlx::query_scalar(
            r#"
            SELECT last_order_num
            FROM ticket_order_counter
            WHERE room_id = $1
              AND service_day = $2
            FOR UPDATE
            "#,
        )
        .bind(ticket.room_id)
        .bind(window.day)
        .fetch_one(&mut *tx)
        .await?;

        let order_num = next_order_num(Some(latest))?;

        sqlx::query(
            r#"
            UPDATE ticket_order_counter
            SET last_order_num = $3
            WHERE room_id = $1
              AND service_day = $2
            "#,
        )
        .bind(ticket.room_id)
        .bind(window.day)
        .bind(order_num)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO enter_ticket (
              appointment_id,
              patient_id,
              room_id,
              order_num,
              service_day,
              status,
              check_in,
              note
            )
            VALUES ($1, $2, $3, $4, $5, 'pending', $6, $7)
            RETURNING
              ticket_id,
              appointment_id,
              patient_id,
              room_id,
              order_num,
              service_day,
              status,
              check_in,
              note
            "#,
        )
        .bind(ticket.appointment_id)
        .bind(ticket.patient_id)
        .bind(ticket.room_id)
        .bind(order_num)
        .bind(window.day)
        .bind(ticket.check_in)
        .bind(ticket.note)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, ticket.appointment_id))?;

        tx.commit().await?;
        Ok(row)
    }

    async fn list_tickets(
        &self,
        query: &TicketQuery,
        page: PageRequest,
    ) -> Result<(Vec<TicketViewRow>, i64), QueueError> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(TICKET_VIEW_SELECT);
        push_filters(&mut qb, query);
        qb.push(" ORDER BY t.order_num ASC, t.check_in ASC ");
        qb.push(" LIMIT ");
        qb.push_bind(page.limit);
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows: Vec<TicketViewRow> = qb
            .build_query_as::<TicketViewRow>()
            .fetch_all(&self.pool)
            .await?;

        let mut count_qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM enter_ticket t");
        push_filters(&mut count_qb, query);

        let total: i64 = count_qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        Ok((rows, total))
    }

    async fn find_ticket(&self, ticket_id: Uuid) -> Result<Option<TicketViewRow>, QueueError> {
        let sql = format!("{TICKET_VIEW_SELECT} WHERE t.ticket_id = $1");
        let row = sqlx::query_as::<_, TicketViewRow>(&sql)
            .bind(ticket_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn set_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Option<TicketViewRow>, QueueError> {
        let row = sqlx::query_as::<_, TicketViewRow>(
            r#"
            WITH t AS (
              UPDATE enter_ticket
              SET status = $2
              WHERE ticket_id = $1
              RETURNING ticket_id, appointment_id, patient_id, room_id, order_num, status, check_in, note
            )
            SELECT
              t.ticket_id,
              t.appointment_id,
              t.patient_id,
              t.room_id,
              r.room_name,
              t.order_num,
              t.status,
              t.check_in,
              t.note
            FROM t
            JOIN room r ON r.room_id = t.room_id
            "#,
        )
        .bind(ticket_id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_status_error)?;
        Ok(row)
    }

    async fn advance(
        &self,
        room_id: Uuid,
        window: &DayWindow,
    ) -> Result<Option<TicketViewRow>, QueueError> {
        let mut tx = self.pool.begin().await?;

        // The counter row doubles as the room/day lock. No row: no tickets today.
        let locked: Option<i32> = sqlx::query_scalar(
            r#"
            SELECT last_order_num
            FROM ticket_order_counter
            WHERE room_id = $1
              AND service_day = $2
            FOR UPDATE
            "#,
        )
        .bind(room_id)
        .bind(window.day)
        .fetch_optional(&mut *tx)
        .await?;

        if locked.is_none() {
            return Ok(None);
        }

        let closed = sqlx::query(
            r#"
            UPDATE enter_ticket
            SET status = 'done'
            WHERE room_id = $1
              AND status = 'in_check'
              AND check_in >= $2
              AND check_in <  $3
            "#,
        )
        .bind(room_id)
        .bind(window.start)
        .bind(window.end)
        .execute(&mut *tx)
        .await?;

        if closed.rows_affected() > 1 {
            tracing::warn!(%room_id, closed = closed.rows_affected(), "closed more than one in_check ticket");
        }

        let next_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT ticket_id
            FROM enter_ticket
            WHERE room_id = $1
              AND status = 'pending'
              AND check_in >= $2
              AND check_in <  $3
            ORDER BY order_num ASC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(room_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(next_id) = next_id else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query(
            r#"
            UPDATE enter_ticket
            SET status = 'in_check'
            WHERE ticket_id = $1
            "#,
        )
        .bind(next_id)
        .execute(&mut *tx)
        .await?;

        let sql = format!("{TICKET_VIEW_SELECT} WHERE t.ticket_id = $1");
        let row = sqlx::query_as::<_, TicketViewRow>(&sql)
            .bind(next_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn serving_display(
        &self,
        room_id: Uuid,
        window: &DayWindow,
    ) -> Result<Option<RawDisplayRow>, QueueError> {
        let row = sqlx::query_as::<_, RawDisplayRow>(
            r#"
            SELECT
              t.order_num,
              p.first_name,
              p.last_name,
              p.birth_date,
              r.room_name
            FROM enter_ticket t
            JOIN patient p ON p.patient_id = t.patient_id
            JOIN room r ON r.room_id = t.room_id
            WHERE t.room_id = $1
              AND t.status = 'in_check'
              AND t.check_in >= $2
              AND t.check_in <  $3
            ORDER BY t.order_num ASC
            LIMIT 1
            "#,
        )
        .bind(room_id)
        .bind(window.start)
        .bind(window.end)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
