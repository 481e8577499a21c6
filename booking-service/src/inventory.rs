//! Seat counters of showtimes, stored in `showtimes.seats_available`.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::*;
use uuid::Uuid;
use crate::schema::*;

pub async fn get_availability(conn: &mut AsyncPgConnection, showtime_id: Uuid) -> Result<Availability, ReservationError> {
    let row = showtimes::table
        .find(showtime_id)
        .select((showtimes::movie_id, showtimes::seats_available))
        .first::<(Uuid, i32)>(conn)
        .await
        .optional()?;

    match row {
        Some((movie_id, seats_available)) => Ok(Availability { showtime_id, movie_id, seats_available }),
        None => Err(ReservationError::ShowtimeNotFound(showtime_id)),
    }
}

/// Applies `delta` to the seat counter in a single conditional UPDATE.
///
/// The floor check lives in the WHERE clause, so two concurrent decrements
/// serialize on the row lock and the loser re-evaluates against the winner's
/// value. A negative result is never written.
pub async fn adjust_availability(conn: &mut AsyncPgConnection, showtime_id: Uuid, delta: i32) -> Result<i32, ReservationError> {
    let updated = diesel::update(
        showtimes::table
            .filter(showtimes::id.eq(showtime_id))
            .filter((showtimes::seats_available + delta).ge(0)),
    )
    .set(showtimes::seats_available.eq(showtimes::seats_available + delta))
    .returning(showtimes::seats_available)
    .get_result::<i32>(conn)
    .await
    .optional()?;

    if let Some(seats_available) = updated {
        return Ok(seats_available);
    }

    let current = get_availability(conn, showtime_id).await?;
    Err(ReservationError::InsufficientSeats {
        requested: -delta,
        available: current.seats_available,
    })
}

/// Locks the showtime row for the rest of the transaction and returns it.
pub async fn lock_showtime(conn: &mut AsyncPgConnection, showtime_id: Uuid) -> QueryResult<Option<crate::models::DbShowtime>> {
    showtimes::table
        .find(showtime_id)
        .select(crate::models::DbShowtime::as_select())
        .for_update()
        .first(conn)
        .await
        .optional()
}
