use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::clock::to_local_timestamp;
use crate::queue::dispatcher::QueueDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub queue: QueueDispatcher,
}

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct PatientBrief {
    pub patient_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RoomBrief {
    pub room_id: Uuid,
    pub room_name: String,
}

/// Ticket joined with its patient/room projection, `check_in` in local time.
#[derive(Debug, Serialize)]
pub struct TicketView {
    pub ticket_id: Uuid,
    pub appointment_id: Uuid,
    pub order_num: i32,
    pub status: TicketStatus,
    pub check_in: DateTime<FixedOffset>,
    pub note: Option<String>,
    pub patient: PatientBrief,
    pub room: RoomBrief,
}

/// Presentation shape for the public "now serving" screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayView {
    pub order_num: i32,
    pub patient_name: String,
    pub birth_date: Option<String>,
    pub room_name: String,
}

/* -------------------------
   Queue domain
--------------------------*/

pub const APPOINTMENT_APPROVED: &str = "approved";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Pending,
    InCheck,
    Done,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Pending => "pending",
            TicketStatus::InCheck => "in_check",
            TicketStatus::Done => "done",
        }
    }
}

/// Admission payload resolved from an approved appointment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketPayload {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub room_id: Uuid,
    pub note: Option<String>,
}

/// Row to insert; the store assigns `ticket_id` and `order_num`.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub room_id: Uuid,
    pub note: Option<String>,
    pub check_in: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingFilter {
    pub date: Option<NaiveDate>,
    pub status: Option<TicketStatus>,
    pub room_id: Option<Uuid>,
}

/* -------------------------
   DB Row Models
--------------------------*/

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ticket {
    pub ticket_id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub room_id: Uuid,
    pub order_num: i32,
    pub service_day: NaiveDate,
    pub status: TicketStatus,
    pub check_in: DateTime<Utc>,
    pub note: Option<String>,
}

/// Approved appointment as seen by the dispatcher. `room_id` may be missing
/// when scheduling has not assigned one yet.
#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub room_id: Option<Uuid>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TicketViewRow {
    pub ticket_id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub room_id: Uuid,
    pub room_name: String,
    pub order_num: i32,
    pub status: TicketStatus,
    pub check_in: DateTime<Utc>,
    pub note: Option<String>,
}

impl TicketViewRow {
    pub fn into_view(self, tz: Tz) -> TicketView {
        TicketView {
            ticket_id: self.ticket_id,
            appointment_id: self.appointment_id,
            order_num: self.order_num,
            status: self.status,
            check_in: to_local_timestamp(tz, self.check_in),
            note: self.note,
            patient: PatientBrief {
                patient_id: self.patient_id,
            },
            room: RoomBrief {
                room_id: self.room_id,
                room_name: self.room_name,
            },
        }
    }
}

/// Raw ticket + patient + room join behind the display screen.
#[derive(Debug, Clone, FromRow)]
pub struct RawDisplayRow {
    pub order_num: i32,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<DateTime<Utc>>,
    pub room_name: String,
}
