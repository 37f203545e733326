use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        MenuItemId, NotificationKind, Reservation, ReservationId, ReservationStatus, SeatingArea,
        TimeSlot,
    },
    error::ApiError,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

/// Body of the public reservation endpoint. Required fields are optional on the
/// wire so a missing one gets its own validation message. A value that cannot
/// decode at all, such as an off-grid time, fails before the form sees it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub time: Option<TimeSlot>,
    #[serde(default)]
    pub guests: Option<u8>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub seating_area: Option<SeatingArea>,
    #[serde(default)]
    pub table_number: Option<u32>,
    #[serde(default)]
    pub items: Vec<ReservationItemRequest>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReservationItemRequest {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum Warning {
    NotificationFailed(String),
    LineItemsNotSaved(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationResponse {
    pub reservation: Reservation,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub reservation: Reservation,
    pub changed: bool,
    #[serde(default)]
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailLine {
    pub menu_item_id: MenuItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_price_cents: Option<i64>,
    pub quantity: u32,
    pub line_total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationDetail {
    pub reservation: Reservation,
    pub lines: Vec<DetailLine>,
    pub total_cents: i64,
}

/// The reservation fields a notification needs; nothing else leaves the system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationReservation {
    pub name: String,
    pub email: String,
    pub date: NaiveDate,
    pub time: TimeSlot,
    pub guests: u8,
    pub table_number: u32,
}

impl From<&Reservation> for NotificationReservation {
    fn from(value: &Reservation) -> Self {
        Self {
            name: value.name.clone(),
            email: value.email.clone(),
            date: value.date,
            time: value.time,
            guests: value.guests,
            table_number: value.table_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub reservation: NotificationReservation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerEvent {
    ReservationCreated {
        reservation_id: ReservationId,
    },
    ReservationStatusChanged {
        reservation_id: ReservationId,
        status: ReservationStatus,
    },
    ReservationsListed {
        reservations: Vec<Reservation>,
    },
    Error(ApiError),
}
