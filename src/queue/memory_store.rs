// src/queue/memory_store.rs
// In-memory TicketStore for dispatcher and route tests. One mutex around all
// state stands in for the PostgreSQL store's transactions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
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

struct Patient {
    first_name: String,
    last_name: String,
    birth_date: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct State {
    appointments: HashMap<Uuid, (AppointmentRow, String)>,
    patients: HashMap<Uuid, Patient>,
    rooms: HashMap<Uuid, String>,
    tickets: Vec<Ticket>,
}

impl State {
    fn view(&self, t: &Ticket) -> TicketViewRow {
        TicketViewRow {
            ticket_id: t.ticket_id,
            appointment_id: t.appointment_id,
            patient_id: t.patient_id,
            room_id: t.room_id,
            room_name: self.rooms.get(&t.room_id).cloned().unwrap_or_default(),
            order_num: t.order_num,
            status: t.status,
            check_in: t.check_in,
            note: t.note.clone(),
        }
    }
}

#[derive(Default)]
pub struct InMemoryTicketStore {
    state: Mutex<State>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_room(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().rooms.insert(id, name.to_string());
        id
    }

    pub fn add_patient(&self, first: &str, last: &str, birth_date: Option<DateTime<Utc>>) -> Uuid {
        let id = Uuid::new_v4();
        self.state.lock().unwrap().patients.insert(
            id,
            Patient {
                first_name: first.to_string(),
                last_name: last.to_string(),
                birth_date,
            },
        );
        id
    }

    pub fn add_appointment(&self, patient_id: Uuid, room_id: Option<Uuid>, status: &str) -> Uuid {
        let id = Uuid::new_v4();
        let row = AppointmentRow {
            appointment_id: id,
            patient_id,
            room_id,
        };
        self.state
            .lock()
            .unwrap()
            .appointments
            .insert(id, (row, status.to_string()));
        id
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.state.lock().unwrap().tickets.clone()
    }

    pub fn status_of(&self, ticket_id: Uuid) -> Option<TicketStatus> {
        self.state
            .lock()
            .unwrap()
            .tickets
            .iter()
            .find(|t| t.ticket_id == ticket_id)
            .map(|t| t.status)
    }

    pub fn in_check_count(&self, room_id: Uuid, window: &DayWindow) -> usize {
        self.state
            .lock()
            .unwrap()
            .tickets
            .iter()
            .filter(|t| {
                t.room_id == room_id && t.status == TicketStatus::InCheck && window.contains(t.check_in)
            })
            .count()
    }
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn find_approved_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentRow>, QueueError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .appointments
            .get(&appointment_id)
            .filter(|(_, status)| status == APPOINTMENT_APPROVED)
            .map(|(row, _)| row.clone()))
    }

    async fn insert_ticket(
        &self,
        ticket: NewTicket,
        window: &DayWindow,
    ) -> Result<Ticket, QueueError> {
        let mut state = self.state.lock().unwrap();
        if state
            .tickets
            .iter()
            .any(|t| t.appointment_id == ticket.appointment_id)
        {
            return Err(QueueError::TicketExists(ticket.appointment_id));
        }

        let latest = state
            .tickets
            .iter()
            .filter(|t| t.room_id == ticket.room_id && window.contains(t.check_in))
            .map(|t| t.order_num)
            .max();

        let row = Ticket {
            ticket_id: Uuid::new_v4(),
            appointment_id: ticket.appointment_id,
            patient_id: ticket.patient_id,
            room_id: ticket.room_id,
            order_num: next_order_num(latest)?,
            service_day: window.day,
            status: TicketStatus::Pending,
            check_in: ticket.check_in,
            note: ticket.note,
        };
        state.tickets.push(row.clone());
        Ok(row)
    }

    async fn list_tickets(
        &self,
        query: &TicketQuery,
        page: PageRequest,
    ) -> Result<(Vec<TicketViewRow>, i64), QueueError> {
        let state = self.state.lock().unwrap();
        let mut matching: Vec<&Ticket> = state
            .tickets
            .iter()
            .filter(|t| query.window.contains(t.check_in))
            .filter(|t| query.status.is_none_or(|s| t.status == s))
            .filter(|t| query.room_id.is_none_or(|r| t.room_id == r))
            .collect();
        matching.sort_by_key(|t| (t.order_num, t.check_in));

        let total = matching.len() as i64;
        let rows = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .map(|t| state.view(t))
            .collect();
        Ok((rows, total))
    }

    async fn find_ticket(&self, ticket_id: Uuid) -> Result<Option<TicketViewRow>, QueueError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tickets
            .iter()
            .find(|t| t.ticket_id == ticket_id)
            .map(|t| state.view(t)))
    }

    async fn set_status(
        &self,
        ticket_id: Uuid,
        status: TicketStatus,
    ) -> Result<Option<TicketViewRow>, QueueError> {
        let mut state = self.state.lock().unwrap();
        let Some(idx) = state.tickets.iter().position(|t| t.ticket_id == ticket_id) else {
            return Ok(None);
        };
        // mirrors the one-in_check-per-room-per-day unique index
        let target = &state.tickets[idx];
        let busy = status == TicketStatus::InCheck
            && state.tickets.iter().any(|t| {
                t.ticket_id != ticket_id
                    && t.room_id == target.room_id
                    && t.service_day == target.service_day
                    && t.status == TicketStatus::InCheck
            });
        if busy {
            return Err(QueueError::already_in_check());
        }
        state.tickets[idx].status = status;
        let row = state.view(&state.tickets[idx]);
        Ok(Some(row))
    }

    async fn advance(
        &self,
        room_id: Uuid,
        window: &DayWindow,
    ) -> Result<Option<TicketViewRow>, QueueError> {
        let mut state = self.state.lock().unwrap();
        let in_room_today =
            |t: &Ticket| t.room_id == room_id && window.contains(t.check_in);

        for t in state.tickets.iter_mut() {
            if in_room_today(&*t) && t.status == TicketStatus::InCheck {
                t.status = TicketStatus::Done;
            }
        }

        let next = state
            .tickets
            .iter()
            .enumerate()
            .filter(|(_, t)| in_room_today(*t) && t.status == TicketStatus::Pending)
            .min_by_key(|(_, t)| t.order_num)
            .map(|(idx, _)| idx);

        let Some(idx) = next else {
            return Ok(None);
        };
        state.tickets[idx].status = TicketStatus::InCheck;
        let row = state.view(&state.tickets[idx]);
        Ok(Some(row))
    }

    async fn serving_display(
        &self,
        room_id: Uuid,
        window: &DayWindow,
    ) -> Result<Option<RawDisplayRow>, QueueError> {
        let state = self.state.lock().unwrap();
        let serving = state
            .tickets
            .iter()
            .filter(|t| {
                t.room_id == room_id && t.status == TicketStatus::InCheck && window.contains(t.check_in)
            })
            .min_by_key(|t| t.order_num);

        Ok(serving.and_then(|t| {
            let patient = state.patients.get(&t.patient_id)?;
            let room_name = state.rooms.get(&t.room_id)?;
            Some(RawDisplayRow {
                order_num: t.order_num,
                first_name: patient.first_name.clone(),
                last_name: patient.last_name.clone(),
                birth_date: patient.birth_date,
                room_name: room_name.clone(),
            })
        }))
    }
}
