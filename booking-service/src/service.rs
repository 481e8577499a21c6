use std::sync::Arc;
use shared::*;
use uuid::Uuid;
use crate::store::ReservationStore;

#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
}

impl ReservationService {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Reserves `seats` seats of a showtime for a user.
    ///
    /// The availability and duplicate checks only fail fast. Overbooking and
    /// double reservations are ruled out by `commit_reservation`, which
    /// re-checks both inside one atomic write.
    pub async fn reserve(&self, user_id: Uuid, showtime_id: Uuid, seats: i32) -> Result<ReservationDetails, ReservationError> {
        if seats <= 0 {
            return Err(ReservationError::InvalidInput("seats must be a positive integer".to_string()));
        }

        let availability = self.store.availability(showtime_id).await?;
        if availability.seats_available < seats {
            return Err(ReservationError::InsufficientSeats {
                requested: seats,
                available: availability.seats_available,
            });
        }

        if self.store.find_by_user_and_showtime(user_id, showtime_id).await?.is_some() {
            return Err(ReservationError::DuplicateReservation);
        }

        self.store.commit_reservation(user_id, showtime_id, seats).await
    }

    pub async fn cancel(&self, reservation_id: Uuid, requesting_user_id: Uuid) -> Result<Cancellation, ReservationError> {
        let reservation = self.store
            .find_reservation(reservation_id)
            .await?
            .ok_or(ReservationError::ReservationNotFound(reservation_id))?;

        if reservation.user_id != requesting_user_id {
            return Err(ReservationError::Forbidden);
        }

        self.store.commit_cancellation(reservation.id).await
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<ReservationDetails>, ReservationError> {
        self.store.reservations_for_user(user_id).await
    }

    pub async fn list_all(&self) -> Result<Vec<ReservationWithUser>, ReservationError> {
        self.store.all_reservations().await
    }
}
