use async_trait::async_trait;
use uuid::Uuid;

use crate::clock::DayWindow;
use crate::error::QueueError;
use crate::models::{
    AppointmentRow, NewTicket, RawDisplayRow, Ticket, TicketStatus, TicketViewRow,
};
use crate::queue::pagination::PageRequest;

/// Store-side filter for the waiting list; the day is always resolved.
#[derive(Debug, Clone, Copy)]
pub struct TicketQuery {
    pub window: DayWindow,
    pub status: Option<TicketStatus>,
    pub room_id: Option<Uuid>,
}

/// Persistence of queue tickets.
///
/// Every method is one unit of work. `insert_ticket` and `advance` must be
/// atomic with respect to other callers on the same room and day; a lost race
/// is reported as [`QueueError::Conflict`] so the dispatcher can retry.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// The appointment, only if its status is `approved`.
    async fn find_approved_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentRow>, QueueError>;

    /// Allocates the next order number for `ticket.room_id` within `window`
    /// and inserts the ticket as `pending`.
    async fn insert_ticket(
        &self,
        ticket: NewTicket,
        window: &DayWindow,
    ) -> Result<Ticket, QueueError>;

    /// One page ordered by `order_num`, plus the total matching count.
    async fn list_tickets(
        &self,
        query: &TicketQuery,
        page: PageRequest,
    ) -> Result<(Vec<TicketViewRow>, i64), QueueError>;

    async fn find_ticket(&self, ticket_id: Uuid) -> Result<Option<TicketViewRow>, QueueError>;

    /// Unconditional status write. `None` when the ticket does not exist.
    async fn set_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Option<TicketViewRow>, QueueError>;

    /// Closes the room's `in_check` ticket and opens the lowest pending one.
    async fn advance(
        &self,
        room_id: Uuid,
        window: &DayWindow,
    ) -> Result<Option<TicketViewRow>, QueueError>;

    /// The room's `in_check` ticket joined with patient and room.
    async fn serving_display(
        &self,
        room_id: Uuid,
        window: &DayWindow,
    ) -> Result<Option<RawDisplayRow>, QueueError>;
}
