// src/routes/ticket_routes.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    clock::parse_calendar_date,
    error::ApiError,
    middleware::auth_context::{AuthContext, ROLE_ADMIN, ROLE_DOCTOR, ROLE_RECEPTIONIST},
    models::{ApiOk, AppState, DisplayView, Ticket, TicketStatus, TicketView, WaitingFilter},
    queue::pagination::{Page, PageRequest},
};

const NOTE_MAX_CHARS: usize = 255;

/*
Who may do what:
- check-in (issue tickets): admin, receptionist
- serving (call next, update status, view one ticket): admin, doctor
- waiting list: admin, receptionist, doctor
- current-serving display: public
*/

fn ensure_check_in(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.has_any_role(&[ROLE_ADMIN, ROLE_RECEPTIONIST]) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admin/receptionist can check patients in".into(),
        ))
    }
}

fn ensure_serving(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.has_any_role(&[ROLE_ADMIN, ROLE_DOCTOR]) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "Only admin/doctor can manage the queue".into(),
        ))
    }
}

fn ensure_queue_view(auth: &AuthContext) -> Result<(), ApiError> {
    if auth.has_any_role(&[ROLE_ADMIN, ROLE_DOCTOR, ROLE_RECEPTIONIST]) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "FORBIDDEN",
            "You do not have permission to view the queue".into(),
        ))
    }
}

fn normalize_note(note: Option<String>) -> Result<Option<String>, ApiError> {
    let Some(note) = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if note.chars().count() > NOTE_MAX_CHARS {
        return Err(ApiError::BadRequest(
            "VALIDATION_ERROR",
            format!("note is too long (max {NOTE_MAX_CHARS})"),
        ));
    }
    Ok(Some(note))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tickets", post(create_ticket).get(list_tickets))
        .route("/tickets/current", get(current_ticket))
        .route("/tickets/next", post(next_ticket))
        .route("/tickets/{ticket_id}", get(get_ticket).patch(update_ticket))
}

/* ============================================================
   DTOs
   ============================================================ */

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub appointment_id: Uuid,
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WaitingListQuery {
    // YYYY-MM-DD in clinic time; defaults to today
    pub date: Option<String>,
    pub status: Option<TicketStatus>,
    pub room_id: Option<Uuid>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    pub room_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NextTicketRequest {
    pub room_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Serialize)]
pub struct CurrentTicketData {
    pub currently_serving: bool,
    pub ticket: Option<DisplayView>,
}

#[derive(Debug, Serialize)]
pub struct TicketMessageData {
    pub message: String,
    pub ticket: Option<TicketView>,
}

/* ============================================================
   GET /tickets/current  (public display)
   ============================================================ */

pub async fn current_ticket(
    State(state): State<AppState>,
    Query(q): Query<RoomQuery>,
) -> Result<Json<ApiOk<CurrentTicketData>>, ApiError> {
    let ticket = state.queue.current_serving(q.room_id).await?;

    Ok(Json(ApiOk {
        data: CurrentTicketData {
            currently_serving: ticket.is_some(),
            ticket,
        },
    }))
}

/* ============================================================
   POST /tickets/next
   ============================================================ */

pub async fn next_ticket(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<NextTicketRequest>,
) -> Result<Json<ApiOk<TicketMessageData>>, ApiError> {
    ensure_serving(&auth)?;

    let ticket = state.queue.advance_queue(req.room_id).await?;
    let message = if ticket.is_some() {
        "Next ticket called successfully"
    } else {
        "No pending tickets in the queue"
    };

    Ok(Json(ApiOk {
        data: TicketMessageData {
            message: message.to_string(),
            ticket,
        },
    }))
}

/* ============================================================
   GET /tickets/{id}
   ============================================================ */

pub async fn get_ticket(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(ticket_id): Path<Uuid>,
) -> Result<Json<ApiOk<TicketView>>, ApiError> {
    ensure_serving(&auth)?;

    let ticket = state
        .queue
        .get_by_id(ticket_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("NOT_FOUND", "Ticket not found".into()))?;

    Ok(Json(ApiOk { data: ticket }))
}

/* ============================================================
   PATCH /tickets/{id}
   ============================================================ */

pub async fn update_ticket(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(ticket_id): Path<Uuid>,
    Json(req): Json<UpdateTicketRequest>,
) -> Result<Json<ApiOk<TicketMessageData>>, ApiError> {
    ensure_serving(&auth)?;

    let ticket = state.queue.update_status(ticket_id, req.status).await?;

    Ok(Json(ApiOk {
        data: TicketMessageData {
            message: "Ticket status updated successfully".to_string(),
            ticket: Some(ticket),
        },
    }))
}

/* ============================================================
   POST /tickets  (check-in)
   ============================================================ */

pub async fn create_ticket(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateTicketRequest>,
) -> Result<(StatusCode, Json<ApiOk<Ticket>>), ApiError> {
    ensure_check_in(&auth)?;

    let note = normalize_note(req.note)?;
    let payload = state
        .queue
        .resolve_eligible_appointment(req.appointment_id, note)
        .await?;
    let ticket = state.queue.generate_ticket(payload).await?;

    tracing::info!(
        user_id = %auth.user_id,
        appointment_id = %ticket.appointment_id,
        "patient checked in"
    );

    Ok((StatusCode::CREATED, Json(ApiOk { data: ticket })))
}

/* ============================================================
   GET /tickets  (waiting list)
   ============================================================ */

pub async fn list_tickets(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(q): Query<WaitingListQuery>,
) -> Result<Json<Page<TicketView>>, ApiError> {
    ensure_queue_view(&auth)?;

    let tz = state.queue.timezone();
    let date = q
        .date
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|raw| parse_calendar_date(tz, raw))
        .transpose()?;
    let page = PageRequest::from_query(q.page, q.limit)?;

    let filter = WaitingFilter {
        date,
        status: q.status,
        room_id: q.room_id,
    };

    Ok(Json(state.queue.list_waiting(filter, page).await?))
}
