use async_trait::async_trait;
use diesel_async::{pooled_connection::bb8::{Pool, PooledConnection}, AsyncConnection, AsyncPgConnection};
use shared::*;
use uuid::Uuid;
use crate::{inventory, ledger};

pub type DbPool = Pool<AsyncPgConnection>;

/// Storage behind the reservation core.
///
/// `commit_reservation` and `commit_cancellation` each touch both the seat
/// inventory and the ledger and must apply all of their writes or none.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn availability(&self, showtime_id: Uuid) -> Result<Availability, ReservationError>;

    async fn find_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>, ReservationError>;

    async fn find_by_user_and_showtime(&self, user_id: Uuid, showtime_id: Uuid) -> Result<Option<Reservation>, ReservationError>;

    /// Inserts the ledger row and takes `seats` from the showtime's counter.
    async fn commit_reservation(&self, user_id: Uuid, showtime_id: Uuid, seats: i32) -> Result<ReservationDetails, ReservationError>;

    /// Removes the ledger row and returns its seats to the showtime's counter.
    async fn commit_cancellation(&self, reservation_id: Uuid) -> Result<Cancellation, ReservationError>;

    async fn reservations_for_user(&self, user_id: Uuid) -> Result<Vec<ReservationDetails>, ReservationError>;

    async fn all_reservations(&self) -> Result<Vec<ReservationWithUser>, ReservationError>;
}

#[derive(Clone)]
pub struct PgReservationStore {
    pool: DbPool,
}

impl PgReservationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<PooledConnection<'_, AsyncPgConnection>, ReservationError> {
        self.pool.get().await.map_err(pool_error)
    }
}

pub fn pool_error(err: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> ReservationError {
    ReservationError::StoreFailure(format!("connection pool: {}", err))
}

#[async_trait]
impl ReservationStore for PgReservationStore {
    async fn availability(&self, showtime_id: Uuid) -> Result<Availability, ReservationError> {
        let mut conn = self.conn().await?;
        inventory::get_availability(&mut conn, showtime_id).await
    }

    async fn find_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>, ReservationError> {
        let mut conn = self.conn().await?;
        ledger::find_by_id(&mut conn, reservation_id).await
    }

    async fn find_by_user_and_showtime(&self, user_id: Uuid, showtime_id: Uuid) -> Result<Option<Reservation>, ReservationError> {
        let mut conn = self.conn().await?;
        ledger::find_by_user_and_showtime(&mut conn, user_id, showtime_id).await
    }

    async fn commit_reservation(&self, user_id: Uuid, showtime_id: Uuid, seats: i32) -> Result<ReservationDetails, ReservationError> {
        let mut conn = self.conn().await?;

        conn.transaction::<_, ReservationError, _>(|conn| {
            Box::pin(async move {
                // The conditional decrement takes the showtime row lock first,
                // so racing reservations queue here rather than on the insert.
                inventory::adjust_availability(conn, showtime_id, -seats).await?;
                let reservation = ledger::insert(conn, user_id, showtime_id, seats).await?;
                ledger::details(conn, reservation.id).await
            })
        }).await
    }

    async fn commit_cancellation(&self, reservation_id: Uuid) -> Result<Cancellation, ReservationError> {
        let mut conn = self.conn().await?;

        conn.transaction::<_, ReservationError, _>(|conn| {
            Box::pin(async move {
                let removed = ledger::remove_by_id(conn, reservation_id).await?;
                let seats_available = inventory::adjust_availability(conn, removed.showtime_id, removed.seats).await?;

                Ok(Cancellation {
                    reservation_id: removed.id,
                    showtime_id: removed.showtime_id,
                    seats_released: removed.seats,
                    seats_available,
                })
            })
        }).await
    }

    async fn reservations_for_user(&self, user_id: Uuid) -> Result<Vec<ReservationDetails>, ReservationError> {
        let mut conn = self.conn().await?;
        ledger::list_for_user(&mut conn, user_id).await
    }

    async fn all_reservations(&self) -> Result<Vec<ReservationWithUser>, ReservationError> {
        let mut conn = self.conn().await?;
        ledger::list_all(&mut conn).await
    }
}
