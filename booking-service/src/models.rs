use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use shared::*;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::users)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::movies)]
pub struct DbMovie {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub director: String,
    pub release_date: DateTime<Utc>,
    pub poster_image_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::movies)]
pub struct NewMovie {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub director: String,
    pub release_date: DateTime<Utc>,
    pub poster_image_url: Option<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::genres)]
pub struct DbGenre {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::movie_genres)]
pub struct NewMovieGenre {
    pub movie_id: Uuid,
    pub genre_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::showtimes)]
pub struct DbShowtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seats_available: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::showtimes)]
pub struct NewShowtime {
    pub id: Uuid,
    pub movie_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seats_available: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::reservations)]
pub struct DbReservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    pub seats: i32,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub showtime_id: Uuid,
    pub seats: i32,
}

impl From<DbUser> for UserProfile {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id,
            role: Role::from(user.role.as_str()),
            name: user.name,
            email: user.email,
        }
    }
}

impl From<DbShowtime> for Showtime {
    fn from(showtime: DbShowtime) -> Self {
        Self {
            id: showtime.id,
            movie_id: showtime.movie_id,
            start_time: showtime.start_time,
            end_time: showtime.end_time,
            seats_available: showtime.seats_available,
        }
    }
}

impl From<DbReservation> for Reservation {
    fn from(reservation: DbReservation) -> Self {
        Self {
            id: reservation.id,
            user_id: reservation.user_id,
            showtime_id: reservation.showtime_id,
            seats: reservation.seats,
            created_at: reservation.created_at,
        }
    }
}

impl DbMovie {
    pub fn with_genres(self, genres: Vec<String>) -> Movie {
        Movie {
            id: self.id,
            name: self.name,
            description: self.description,
            duration: self.duration,
            director: self.director,
            release_date: self.release_date,
            poster_image_url: self.poster_image_url,
            genres,
        }
    }
}

/// Builds the display shape of a reservation from a ledger row joined with its
/// showtime and movie.
pub fn reservation_details(
    reservation: DbReservation,
    showtime: DbShowtime,
    movie_name: String,
) -> ReservationDetails {
    ReservationDetails {
        id: reservation.id,
        user_id: reservation.user_id,
        seats: reservation.seats,
        created_at: reservation.created_at,
        showtime: ShowtimeContext {
            id: showtime.id,
            movie_id: showtime.movie_id,
            movie_name,
            start_time: showtime.start_time,
            end_time: showtime.end_time,
            seats_available: showtime.seats_available,
        },
    }
}
