use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Admin => "ADMIN",
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "ADMIN" => Role::Admin,
            _ => Role::User,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movie {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub director: String,
    pub release_date: DateTime<Utc>,
    pub poster_image_url: Option<String>,
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Showtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seats_available: i32,
}

/// Current seat counter of a showtime as read from the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub showtime_id: Uuid,
    pub movie_id: Uuid,
    pub seats_available: i32,
}

/// A live ledger entry. Reservations are never modified in place: they are
/// inserted on reserve and removed on cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    pub seats: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShowtimeContext {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub movie_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seats_available: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationDetails {
    pub id: Uuid,
    pub user_id: Uuid,
    pub seats: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub showtime: ShowtimeContext,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationWithUser {
    #[serde(flatten)]
    pub reservation: ReservationDetails,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub reservation_id: Uuid,
    pub showtime_id: Uuid,
    pub seats_released: i32,
    pub seats_available: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReservationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("showtime {0} not found")]
    ShowtimeNotFound(Uuid),

    #[error("reservation {0} not found")]
    ReservationNotFound(Uuid),

    #[error("not enough available seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("reservation already exists for this showtime")]
    DuplicateReservation,

    #[error("reservation does not belong to the user")]
    Forbidden,

    #[error("store failure: {0}")]
    StoreFailure(String),
}

impl ReservationError {
    pub fn kind(&self) -> &'static str {
        match self {
            ReservationError::InvalidInput(_) => "InvalidInput",
            ReservationError::ShowtimeNotFound(_) | ReservationError::ReservationNotFound(_) => {
                "NotFound"
            }
            ReservationError::InsufficientSeats { .. } => "InsufficientSeats",
            ReservationError::DuplicateReservation => "DuplicateReservation",
            ReservationError::Forbidden => "Forbidden",
            ReservationError::StoreFailure(_) => "StoreFailure",
        }
    }
}

impl From<diesel::result::Error> for ReservationError {
    fn from(err: diesel::result::Error) -> Self {
        ReservationError::StoreFailure(err.to_string())
    }
}
