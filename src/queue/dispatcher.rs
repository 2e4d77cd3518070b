// src/queue/dispatcher.rs

use std::future::Future;
use std::sync::Arc;

use chrono_tz::Tz;
use uuid::Uuid;

use crate::{
    clock::{Clock, DayWindow, day_window},
    error::QueueError,
    models::{DisplayView, NewTicket, Ticket, TicketPayload, TicketStatus, TicketView, WaitingFilter},
    queue::{
        display,
        pagination::{Page, PageRequest, PaginationMeta},
        store::{TicketQuery, TicketStore},
    },
};

/// Queue state machine over a [`TicketStore`].
///
/// Holds no mutable state of its own; every instance sharing a store sees
/// the same queue.
#[derive(Clone)]
pub struct QueueDispatcher {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    tz: Tz,
    retry_limit: u32,
}

impl QueueDispatcher {
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>, tz: Tz, retry_limit: u32) -> Self {
        Self {
            store,
            clock,
            tz,
            retry_limit: retry_limit.max(1),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    fn today(&self) -> DayWindow {
        day_window(self.tz, None, self.clock.now())
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt_fn: F) -> Result<T, QueueError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueueError>>,
    {
        let mut attempt = 1;
        loop {
            match attempt_fn().await {
                Err(e) if e.is_retryable() && attempt < self.retry_limit => {
                    tracing::warn!(op, attempt, error = %e, "queue transaction conflicted, retrying");
                    attempt += 1;
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(op, attempt, error = %e, "queue transaction conflicted, giving up");
                    return Err(e);
                }
                other => return other,
            }
        }
    }

    /// Admission gate: only approved appointments with a room get a ticket.
    pub async fn resolve_eligible_appointment(
        &self,
        appointment_id: Uuid,
        note: Option<String>,
    ) -> Result<TicketPayload, QueueError> {
        let appointment = self
            .store
            .find_approved_appointment(appointment_id)
            .await?
            .ok_or_else(|| QueueError::NotFound("appointment not found".into()))?;

        let Some(room_id) = appointment.room_id else {
            return Err(QueueError::IncompleteData(
                "appointment data is incomplete".into(),
            ));
        };

        Ok(TicketPayload {
            appointment_id: appointment.appointment_id,
            patient_id: appointment.patient_id,
            room_id,
            note,
        })
    }

    pub async fn generate_ticket(&self, payload: TicketPayload) -> Result<Ticket, QueueError> {
        let now = self.clock.now();
        let window = day_window(self.tz, None, now);
        let new_ticket = NewTicket {
            appointment_id: payload.appointment_id,
            patient_id: payload.patient_id,
            room_id: payload.room_id,
            note: payload.note,
            check_in: now,
        };

        let store = &self.store;
        let window_ref = &window;
        let ticket = self
            .with_retry("generate_ticket", move || {
                store.insert_ticket(new_ticket.clone(), window_ref)
            })
            .await?;

        tracing::info!(
            ticket_id = %ticket.ticket_id,
            room_id = %ticket.room_id,
            order_num = ticket.order_num,
            "ticket issued"
        );
        Ok(ticket)
    }

    pub async fn list_waiting(
        &self,
        filter: WaitingFilter,
        page: PageRequest,
    ) -> Result<Page<TicketView>, QueueError> {
        let query = TicketQuery {
            window: day_window(self.tz, filter.date, self.clock.now()),
            status: filter.status,
            room_id: filter.room_id,
        };

        let (rows, total) = self.store.list_tickets(&query, page).await?;
        let data: Vec<TicketView> = rows.into_iter().map(|r| r.into_view(self.tz)).collect();

        Ok(Page {
            pagination: PaginationMeta::new(total, page, data.len()),
            data,
        })
    }

    pub async fn get_by_id(&self, ticket_id: Uuid) -> Result<Option<TicketView>, QueueError> {
        let row = self.store.find_ticket(ticket_id).await?;
        Ok(row.map(|r| r.into_view(self.tz)))
    }

    /// Unconditional write; "call next" is the path for pending -> in_check.
    pub async fn update_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<TicketView, QueueError> {
        let row = self
            .store
            .set_status(ticket_id, status)
            .await?
            .ok_or_else(|| QueueError::NotFound("ticket not found".into()))?;

        tracing::info!(%ticket_id, status = status.as_str(), "ticket status updated");
        Ok(row.into_view(self.tz))
    }

    /// "Call next patient": closes whoever is in service and opens the lowest
    /// pending order number, atomically. `None` when the queue is empty.
    pub async fn advance_queue(&self, room_id: Uuid) -> Result<Option<TicketView>, QueueError> {
        let window = self.today();
        let store = &self.store;
        let window_ref = &window;
        let next = self
            .with_retry("advance_queue", move || store.advance(room_id, window_ref))
            .await?;

        match &next {
            Some(t) => tracing::info!(%room_id, ticket_id = %t.ticket_id, order_num = t.order_num, "called next ticket"),
            None => tracing::info!(%room_id, "no pending tickets in the queue"),
        }
        Ok(next.map(|r| r.into_view(self.tz)))
    }

    pub async fn current_serving(&self, room_id: Uuid) -> Result<Option<DisplayView>, QueueError> {
        let window = self.today();
        let raw = self.store.serving_display(room_id, &window).await?;
        Ok(display::render(raw, self.tz))
    }
}
