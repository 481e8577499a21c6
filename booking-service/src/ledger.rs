//! Active reservations, one row per (user, showtime).

use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use shared::*;
use uuid::Uuid;
use crate::models::*;
use crate::schema::*;

pub async fn find_by_id(conn: &mut AsyncPgConnection, reservation_id: Uuid) -> Result<Option<Reservation>, ReservationError> {
    let reservation = reservations::table
        .find(reservation_id)
        .select(DbReservation::as_select())
        .first(conn)
        .await
        .optional()?;
    Ok(reservation.map(Reservation::from))
}

pub async fn find_by_user_and_showtime(conn: &mut AsyncPgConnection, user_id: Uuid, showtime_id: Uuid) -> Result<Option<Reservation>, ReservationError> {
    let reservation = reservations::table
        .filter(reservations::user_id.eq(user_id))
        .filter(reservations::showtime_id.eq(showtime_id))
        .select(DbReservation::as_select())
        .first(conn)
        .await
        .optional()?;
    Ok(reservation.map(Reservation::from))
}

/// Inserts a ledger row. A concurrent insert for the same pair is rejected by
/// the `reservations_user_showtime_key` constraint.
pub async fn insert(conn: &mut AsyncPgConnection, user_id: Uuid, showtime_id: Uuid, seats: i32) -> Result<Reservation, ReservationError> {
    let new_reservation = NewReservation {
        id: Uuid::new_v4(),
        user_id,
        showtime_id,
        seats,
    };

    let inserted = diesel::insert_into(reservations::table)
        .values(&new_reservation)
        .returning(DbReservation::as_returning())
        .get_result(conn)
        .await
        .map_err(|e| insert_error(e, user_id, showtime_id))?;

    Ok(inserted.into())
}

const USER_FKEY: &str = "reservations_user_id_fkey";

fn insert_error(err: DieselError, user_id: Uuid, showtime_id: Uuid) -> ReservationError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => ReservationError::DuplicateReservation,
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            if info.constraint_name() == Some(USER_FKEY) {
                ReservationError::InvalidInput(format!("user {} does not exist", user_id))
            } else {
                ReservationError::ShowtimeNotFound(showtime_id)
            }
        }
        other => other.into(),
    }
}

pub async fn remove_by_id(conn: &mut AsyncPgConnection, reservation_id: Uuid) -> Result<Reservation, ReservationError> {
    let removed = diesel::delete(reservations::table.find(reservation_id))
        .returning(DbReservation::as_returning())
        .get_result(conn)
        .await
        .optional()?;

    removed
        .map(Reservation::from)
        .ok_or(ReservationError::ReservationNotFound(reservation_id))
}

pub async fn list_for_user(conn: &mut AsyncPgConnection, user_id: Uuid) -> Result<Vec<ReservationDetails>, ReservationError> {
    let rows = reservations::table
        .inner_join(showtimes::table.inner_join(movies::table))
        .filter(reservations::user_id.eq(user_id))
        .order(showtimes::start_time.asc())
        .select((DbReservation::as_select(), DbShowtime::as_select(), movies::name))
        .load::<(DbReservation, DbShowtime, String)>(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(reservation, showtime, movie_name)| reservation_details(reservation, showtime, movie_name))
        .collect())
}

pub async fn details(conn: &mut AsyncPgConnection, reservation_id: Uuid) -> Result<ReservationDetails, ReservationError> {
    let row = reservations::table
        .inner_join(showtimes::table.inner_join(movies::table))
        .filter(reservations::id.eq(reservation_id))
        .select((DbReservation::as_select(), DbShowtime::as_select(), movies::name))
        .first::<(DbReservation, DbShowtime, String)>(conn)
        .await
        .optional()?;

    row.map(|(reservation, showtime, movie_name)| reservation_details(reservation, showtime, movie_name))
        .ok_or(ReservationError::ReservationNotFound(reservation_id))
}

pub async fn list_all(conn: &mut AsyncPgConnection) -> Result<Vec<ReservationWithUser>, ReservationError> {
    let rows = reservations::table
        .inner_join(showtimes::table.inner_join(movies::table))
        .inner_join(users::table)
        .order(reservations::created_at.desc())
        .select((DbReservation::as_select(), DbShowtime::as_select(), movies::name, DbUser::as_select()))
        .load::<(DbReservation, DbShowtime, String, DbUser)>(conn)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(reservation, showtime, movie_name, user)| {
            ReservationWithUser {
                reservation: reservation_details(reservation, showtime, movie_name),
                user: user.into(),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;

    struct Violation {
        constraint: &'static str,
    }

    impl DatabaseErrorInformation for Violation {
        fn message(&self) -> &str {
            "violates foreign key constraint"
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            Some("reservations")
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            Some(self.constraint)
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn violation(kind: DatabaseErrorKind, constraint: &'static str) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(Violation { constraint }))
    }

    #[test]
    fn test_missing_user_is_not_reported_as_missing_showtime() {
        let (user_id, showtime_id) = (Uuid::new_v4(), Uuid::new_v4());

        let err = insert_error(violation(DatabaseErrorKind::ForeignKeyViolation, USER_FKEY), user_id, showtime_id);
        assert_eq!(err, ReservationError::InvalidInput(format!("user {} does not exist", user_id)));

        let err = insert_error(
            violation(DatabaseErrorKind::ForeignKeyViolation, "reservations_showtime_id_fkey"),
            user_id,
            showtime_id,
        );
        assert_eq!(err, ReservationError::ShowtimeNotFound(showtime_id));
    }

    #[test]
    fn test_unique_violation_is_duplicate() {
        let err = insert_error(
            violation(DatabaseErrorKind::UniqueViolation, "reservations_user_showtime_key"),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        assert_eq!(err, ReservationError::DuplicateReservation);
    }
}
