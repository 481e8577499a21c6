//! In-process reservation store.
//!
//! Inventory and ledger live behind one lock. A reservation inserts the
//! ledger row first and removes it again when the seat decrement fails, so a
//! caller never observes one write without the other.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::*;
use uuid::Uuid;
use crate::store::ReservationStore;

#[derive(Debug, Clone)]
struct ShowtimeSlot {
    movie_id: Uuid,
    movie_name: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    seats_available: i32,
}

#[derive(Default)]
struct Inventory {
    showtimes: HashMap<Uuid, ShowtimeSlot>,
}

impl Inventory {
    fn get_availability(&self, showtime_id: Uuid) -> Result<Availability, ReservationError> {
        self.showtimes
            .get(&showtime_id)
            .map(|slot| Availability {
                showtime_id,
                movie_id: slot.movie_id,
                seats_available: slot.seats_available,
            })
            .ok_or(ReservationError::ShowtimeNotFound(showtime_id))
    }

    fn adjust_availability(&mut self, showtime_id: Uuid, delta: i32) -> Result<i32, ReservationError> {
        let slot = self.showtimes
            .get_mut(&showtime_id)
            .ok_or(ReservationError::ShowtimeNotFound(showtime_id))?;

        let updated = slot.seats_available + delta;
        if updated < 0 {
            return Err(ReservationError::InsufficientSeats {
                requested: -delta,
                available: slot.seats_available,
            });
        }

        slot.seats_available = updated;
        Ok(updated)
    }
}

#[derive(Default)]
struct Ledger {
    reservations: HashMap<Uuid, Reservation>,
    by_user_and_showtime: HashMap<(Uuid, Uuid), Uuid>,
}

impl Ledger {
    fn find_by_user_and_showtime(&self, user_id: Uuid, showtime_id: Uuid) -> Option<Reservation> {
        self.by_user_and_showtime
            .get(&(user_id, showtime_id))
            .and_then(|id| self.reservations.get(id))
            .cloned()
    }

    fn insert(&mut self, user_id: Uuid, showtime_id: Uuid, seats: i32) -> Result<Reservation, ReservationError> {
        if self.by_user_and_showtime.contains_key(&(user_id, showtime_id)) {
            return Err(ReservationError::DuplicateReservation);
        }

        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id,
            showtime_id,
            seats,
            created_at: Some(Utc::now()),
        };
        self.by_user_and_showtime.insert((user_id, showtime_id), reservation.id);
        self.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    fn remove_by_id(&mut self, reservation_id: Uuid) -> Result<Reservation, ReservationError> {
        let reservation = self.reservations
            .remove(&reservation_id)
            .ok_or(ReservationError::ReservationNotFound(reservation_id))?;
        self.by_user_and_showtime.remove(&(reservation.user_id, reservation.showtime_id));
        Ok(reservation)
    }
}

#[derive(Default)]
struct State {
    inventory: Inventory,
    ledger: Ledger,
    users: HashMap<Uuid, UserProfile>,
}

impl State {
    fn details(&self, reservation: &Reservation) -> Result<ReservationDetails, ReservationError> {
        let slot = self.inventory
            .showtimes
            .get(&reservation.showtime_id)
            .ok_or(ReservationError::ShowtimeNotFound(reservation.showtime_id))?;

        Ok(ReservationDetails {
            id: reservation.id,
            user_id: reservation.user_id,
            seats: reservation.seats,
            created_at: reservation.created_at,
            showtime: ShowtimeContext {
                id: reservation.showtime_id,
                movie_id: slot.movie_id,
                movie_name: slot.movie_name.clone(),
                start_time: slot.start_time,
                end_time: slot.end_time,
                seats_available: slot.seats_available,
            },
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>, ReservationError> {
        self.state
            .lock()
            .map_err(|_| ReservationError::StoreFailure("memory store lock poisoned".to_string()))
    }

    /// Registers a showtime with `capacity` free seats and returns its id.
    pub fn add_showtime(&self, movie_name: &str, start_time: DateTime<Utc>, end_time: DateTime<Utc>, capacity: i32) -> Result<Uuid, ReservationError> {
        let showtime_id = Uuid::new_v4();
        self.lock()?.inventory.showtimes.insert(showtime_id, ShowtimeSlot {
            movie_id: Uuid::new_v4(),
            movie_name: movie_name.to_string(),
            start_time,
            end_time,
            seats_available: capacity,
        });
        Ok(showtime_id)
    }

    pub fn remove_showtime(&self, showtime_id: Uuid) -> Result<(), ReservationError> {
        self.lock()?.inventory.showtimes.remove(&showtime_id);
        Ok(())
    }

    pub fn add_user(&self, user: UserProfile) -> Result<(), ReservationError> {
        self.lock()?.users.insert(user.id, user);
        Ok(())
    }

    /// Seats held by live reservations for a showtime.
    pub fn reserved_seats(&self, showtime_id: Uuid) -> Result<i32, ReservationError> {
        Ok(self.lock()?
            .ledger
            .reservations
            .values()
            .filter(|r| r.showtime_id == showtime_id)
            .map(|r| r.seats)
            .sum())
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn availability(&self, showtime_id: Uuid) -> Result<Availability, ReservationError> {
        self.lock()?.inventory.get_availability(showtime_id)
    }

    async fn find_reservation(&self, reservation_id: Uuid) -> Result<Option<Reservation>, ReservationError> {
        Ok(self.lock()?.ledger.reservations.get(&reservation_id).cloned())
    }

    async fn find_by_user_and_showtime(&self, user_id: Uuid, showtime_id: Uuid) -> Result<Option<Reservation>, ReservationError> {
        Ok(self.lock()?.ledger.find_by_user_and_showtime(user_id, showtime_id))
    }

    async fn commit_reservation(&self, user_id: Uuid, showtime_id: Uuid, seats: i32) -> Result<ReservationDetails, ReservationError> {
        let mut state = self.lock()?;

        let reservation = state.ledger.insert(user_id, showtime_id, seats)?;
        if let Err(e) = state.inventory.adjust_availability(showtime_id, -seats) {
            state.ledger.remove_by_id(reservation.id)?;
            return Err(e);
        }

        state.details(&reservation)
    }

    async fn commit_cancellation(&self, reservation_id: Uuid) -> Result<Cancellation, ReservationError> {
        let mut state = self.lock()?;

        let removed = state.ledger.remove_by_id(reservation_id)?;
        let seats_available = match state.inventory.adjust_availability(removed.showtime_id, removed.seats) {
            Ok(seats_available) => seats_available,
            Err(e) => {
                state.ledger.by_user_and_showtime.insert((removed.user_id, removed.showtime_id), removed.id);
                state.ledger.reservations.insert(removed.id, removed);
                return Err(e);
            }
        };

        Ok(Cancellation {
            reservation_id: removed.id,
            showtime_id: removed.showtime_id,
            seats_released: removed.seats,
            seats_available,
        })
    }

    async fn reservations_for_user(&self, user_id: Uuid) -> Result<Vec<ReservationDetails>, ReservationError> {
        let state = self.lock()?;
        let mut reservations = state.ledger
            .reservations
            .values()
            .filter(|r| r.user_id == user_id)
            .map(|r| state.details(r))
            .collect::<Result<Vec<_>, _>>()?;
        reservations.sort_by_key(|r| r.showtime.start_time);
        Ok(reservations)
    }

    async fn all_reservations(&self) -> Result<Vec<ReservationWithUser>, ReservationError> {
        let state = self.lock()?;
        state.ledger
            .reservations
            .values()
            .map(|r| -> Result<ReservationWithUser, ReservationError> {
                let user = state.users.get(&r.user_id).cloned().ok_or_else(|| {
                    ReservationError::StoreFailure(format!("user {} missing from store", r.user_id))
                })?;
                Ok(ReservationWithUser { reservation: state.details(r)?, user })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store_with_showtime(capacity: i32) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let start = Utc::now() + Duration::days(1);
        let showtime_id = store
            .add_showtime("Metropolis", start, start + Duration::hours(2), capacity)
            .unwrap();
        (store, showtime_id)
    }

    #[tokio::test]
    async fn test_failed_decrement_rolls_back_ledger_insert() {
        let (store, showtime_id) = store_with_showtime(1);
        let user_id = Uuid::new_v4();

        let err = store.commit_reservation(user_id, showtime_id, 2).await.unwrap_err();
        assert_eq!(err, ReservationError::InsufficientSeats { requested: 2, available: 1 });

        assert!(store.find_by_user_and_showtime(user_id, showtime_id).await.unwrap().is_none());
        assert_eq!(store.availability(showtime_id).await.unwrap().seats_available, 1);
        assert_eq!(store.reserved_seats(showtime_id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_insert_leaves_inventory_untouched() {
        let (store, showtime_id) = store_with_showtime(5);
        let user_id = Uuid::new_v4();

        store.commit_reservation(user_id, showtime_id, 2).await.unwrap();
        let err = store.commit_reservation(user_id, showtime_id, 1).await.unwrap_err();

        assert_eq!(err, ReservationError::DuplicateReservation);
        assert_eq!(store.availability(showtime_id).await.unwrap().seats_available, 3);
    }

    #[tokio::test]
    async fn test_cancel_of_vanished_showtime_keeps_reservation() {
        let (store, showtime_id) = store_with_showtime(4);
        let user_id = Uuid::new_v4();
        let reservation = store.commit_reservation(user_id, showtime_id, 2).await.unwrap();

        store.remove_showtime(showtime_id).unwrap();
        let err = store.commit_cancellation(reservation.id).await.unwrap_err();

        assert_eq!(err, ReservationError::ShowtimeNotFound(showtime_id));
        assert!(store.find_reservation(reservation.id).await.unwrap().is_some());
    }
}
