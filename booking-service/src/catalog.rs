//! Movies, genres and showtimes: public browsing and admin maintenance.
//!
//! The seat counter of a showtime belongs to the reservation core. The only
//! catalog write that touches it is `update_showtime`, which treats the
//! supplied seat count as the new capacity and recomputes the counter from
//! the ledger while holding the showtime row lock.

use std::collections::HashMap;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use shared::*;
use uuid::Uuid;
use crate::inventory;
use crate::models::*;
use crate::schema::*;
use crate::store::DbPool;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl From<DieselError> for CatalogError {
    fn from(err: DieselError) -> Self {
        CatalogError::Store(err.to_string())
    }
}

async fn connect(pool: &DbPool) -> Result<diesel_async::pooled_connection::bb8::PooledConnection<'_, AsyncPgConnection>, CatalogError> {
    pool.get().await.map_err(|e| CatalogError::Store(e.to_string()))
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MovieInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub duration: Option<i32>,
    pub genres: Option<Vec<String>>,
    pub director: Option<String>,
    pub release_date: Option<String>,
    pub poster_image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovieDraft {
    pub name: String,
    pub description: Option<String>,
    pub duration: i32,
    pub genres: Vec<String>,
    pub director: String,
    pub release_date: DateTime<Utc>,
    pub poster_image_url: Option<String>,
}

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn is_http_url(value: &str) -> bool {
    match value.parse::<axum::http::Uri>() {
        Ok(uri) => matches!(uri.scheme_str(), Some("http") | Some("https")) && uri.authority().is_some(),
        Err(_) => false,
    }
}

impl MovieInput {
    pub fn validate(self) -> Result<MovieDraft, CatalogError> {
        let name = trimmed(self.name).ok_or_else(|| CatalogError::InvalidInput("name is required".to_string()))?;
        let director = trimmed(self.director).ok_or_else(|| CatalogError::InvalidInput("director is required".to_string()))?;

        let duration = match self.duration {
            Some(d) if d > 0 => d,
            _ => return Err(CatalogError::InvalidInput("duration must be a positive integer".to_string())),
        };

        let mut genres = self.genres
            .unwrap_or_default()
            .into_iter()
            .filter_map(|g| trimmed(Some(g)))
            .collect::<Vec<_>>();
        genres.sort();
        genres.dedup();
        if genres.is_empty() {
            return Err(CatalogError::InvalidInput("genres must contain at least 1 item".to_string()));
        }

        let release_date = trimmed(self.release_date)
            .as_deref()
            .and_then(parse_date)
            .ok_or_else(|| CatalogError::InvalidInput("release_date must be a valid date".to_string()))?;

        let poster_image_url = trimmed(self.poster_image_url);
        if let Some(url) = &poster_image_url {
            if !is_http_url(url) {
                return Err(CatalogError::InvalidInput("poster_image_url must be a valid http(s) uri".to_string()));
            }
        }

        Ok(MovieDraft {
            name,
            description: trimmed(self.description),
            duration,
            genres,
            director,
            release_date,
            poster_image_url,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShowtimeInput {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub seats_available: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowtimeDraft {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub seats: i32,
}

impl ShowtimeInput {
    pub fn validate(self) -> Result<ShowtimeDraft, CatalogError> {
        let seats = match self.seats_available {
            Some(s) if s > 0 => s,
            _ => return Err(CatalogError::InvalidInput("Seats available must be a positive integer".to_string())),
        };
        let (Some(start_time), Some(end_time)) = (self.start_time, self.end_time) else {
            return Err(CatalogError::InvalidInput("start_time and end_time are required".to_string()));
        };
        if end_time <= start_time {
            return Err(CatalogError::InvalidInput("End time should be after start time".to_string()));
        }

        Ok(ShowtimeDraft { start_time, end_time, seats })
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Page {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

impl Page {
    /// Returns `(limit, offset)`. The offset only applies when both values
    /// are present.
    pub fn window(&self) -> Result<(Option<i64>, i64), CatalogError> {
        if self.limit.is_some_and(|l| l <= 0) || self.page.is_some_and(|p| p <= 0) {
            return Err(CatalogError::InvalidInput("limit and page must be positive integers".to_string()));
        }

        let offset = match (self.limit, self.page) {
            (Some(limit), Some(page)) => (page - 1).saturating_mul(limit),
            _ => 0,
        };
        Ok((self.limit, offset))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenreQuery {
    pub genre: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SeatCount {
    pub seats_available: i32,
}

// ---------------------------------------------------------------------------
// Browsing
// ---------------------------------------------------------------------------

async fn genres_for(conn: &mut AsyncPgConnection, movie_ids: Vec<Uuid>) -> QueryResult<HashMap<Uuid, Vec<String>>> {
    let rows = movie_genres::table
        .inner_join(genres::table)
        .filter(movie_genres::movie_id.eq_any(movie_ids))
        .order(genres::name.asc())
        .select((movie_genres::movie_id, genres::name))
        .load::<(Uuid, String)>(conn)
        .await?;

    let mut by_movie: HashMap<Uuid, Vec<String>> = HashMap::new();
    for (movie_id, genre) in rows {
        by_movie.entry(movie_id).or_default().push(genre);
    }
    Ok(by_movie)
}

async fn with_genres(conn: &mut AsyncPgConnection, movies: Vec<DbMovie>) -> QueryResult<Vec<Movie>> {
    let mut genres = genres_for(conn, movies.iter().map(|m| m.id).collect()).await?;
    Ok(movies
        .into_iter()
        .map(|m| {
            let names = genres.remove(&m.id).unwrap_or_default();
            m.with_genres(names)
        })
        .collect())
}

pub async fn list_movies(pool: &DbPool, page: Page) -> Result<Vec<Movie>, CatalogError> {
    let (limit, offset) = page.window()?;
    let mut conn = connect(pool).await?;

    let mut query = movies::table
        .select(DbMovie::as_select())
        .order((movies::release_date.desc(), movies::name.asc()))
        .offset(offset)
        .into_boxed();
    if let Some(limit) = limit {
        query = query.limit(limit);
    }

    let movies = query.load(&mut conn).await?;
    Ok(with_genres(&mut conn, movies).await?)
}

pub async fn movies_by_genre(pool: &DbPool, query: GenreQuery) -> Result<Vec<Movie>, CatalogError> {
    let genre = trimmed(query.genre).ok_or_else(|| CatalogError::InvalidInput("genre is required".to_string()))?;
    let mut conn = connect(pool).await?;

    let movies = movies::table
        .inner_join(movie_genres::table.inner_join(genres::table))
        .filter(genres::name.eq(&genre))
        .order(movies::name.asc())
        .select(DbMovie::as_select())
        .load(&mut conn)
        .await?;

    Ok(with_genres(&mut conn, movies).await?)
}

async fn find_movie(conn: &mut AsyncPgConnection, movie_id: Uuid) -> Result<DbMovie, CatalogError> {
    movies::table
        .find(movie_id)
        .select(DbMovie::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| CatalogError::NotFound("Movie not found".to_string()))
}

pub async fn showtimes_for_movie(pool: &DbPool, movie_id: Uuid) -> Result<Vec<Showtime>, CatalogError> {
    let mut conn = connect(pool).await?;
    find_movie(&mut conn, movie_id).await?;

    let showtimes = showtimes::table
        .filter(showtimes::movie_id.eq(movie_id))
        .order(showtimes::start_time.asc())
        .select(DbShowtime::as_select())
        .load(&mut conn)
        .await?;

    Ok(showtimes.into_iter().map(Showtime::from).collect())
}

async fn find_showtime_of_movie(conn: &mut AsyncPgConnection, movie_id: Uuid, showtime_id: Uuid) -> Result<DbShowtime, CatalogError> {
    let showtime = showtimes::table
        .find(showtime_id)
        .select(DbShowtime::as_select())
        .first(conn)
        .await
        .optional()?
        .ok_or_else(|| CatalogError::NotFound("Showtime not found".to_string()))?;

    if showtime.movie_id != movie_id {
        return Err(CatalogError::NotFound("Showtime not found for this movie".to_string()));
    }
    Ok(showtime)
}

pub async fn seats(pool: &DbPool, movie_id: Uuid, showtime_id: Uuid) -> Result<SeatCount, CatalogError> {
    let mut conn = connect(pool).await?;
    let showtime = find_showtime_of_movie(&mut conn, movie_id, showtime_id).await?;
    Ok(SeatCount { seats_available: showtime.seats_available })
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

/// Links `names` to the movie, creating genres that do not exist yet.
async fn connect_genres(conn: &mut AsyncPgConnection, movie_id: Uuid, names: &[String]) -> QueryResult<()> {
    let candidates = names
        .iter()
        .map(|name| DbGenre { id: Uuid::new_v4(), name: name.clone() })
        .collect::<Vec<_>>();

    diesel::insert_into(genres::table)
        .values(&candidates)
        .on_conflict(genres::name)
        .do_nothing()
        .execute(conn)
        .await?;

    let genre_ids = genres::table
        .filter(genres::name.eq_any(names.to_vec()))
        .select(genres::id)
        .load::<Uuid>(conn)
        .await?;

    let links = genre_ids
        .into_iter()
        .map(|genre_id| NewMovieGenre { movie_id, genre_id })
        .collect::<Vec<_>>();

    diesel::insert_into(movie_genres::table)
        .values(&links)
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;

    Ok(())
}

const DUPLICATE_MOVIE: &str = "Movie with the same name, release date, and director already exists.";

fn duplicate_movie(err: DieselError) -> CatalogError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            CatalogError::Conflict(DUPLICATE_MOVIE.to_string())
        }
        other => other.into(),
    }
}

pub async fn add_movie(pool: &DbPool, draft: MovieDraft) -> Result<Movie, CatalogError> {
    let mut conn = connect(pool).await?;

    let existing = movies::table
        .filter(movies::name.eq(&draft.name))
        .filter(movies::release_date.eq(draft.release_date))
        .filter(movies::director.eq(&draft.director))
        .select(movies::id)
        .first::<Uuid>(&mut conn)
        .await
        .optional()?;
    if existing.is_some() {
        return Err(CatalogError::Conflict(DUPLICATE_MOVIE.to_string()));
    }

    conn.transaction::<_, CatalogError, _>(|conn| {
        Box::pin(async move {
            let new_movie = NewMovie {
                id: Uuid::new_v4(),
                name: draft.name,
                description: draft.description,
                duration: draft.duration,
                director: draft.director,
                release_date: draft.release_date,
                poster_image_url: draft.poster_image_url,
            };

            let movie = diesel::insert_into(movies::table)
                .values(&new_movie)
                .returning(DbMovie::as_returning())
                .get_result(conn)
                .await
                .map_err(duplicate_movie)?;

            connect_genres(conn, movie.id, &draft.genres).await?;
            Ok(movie.with_genres(draft.genres))
        })
    }).await
}

pub async fn update_movie(pool: &DbPool, movie_id: Uuid, draft: MovieDraft) -> Result<Movie, CatalogError> {
    let mut conn = connect(pool).await?;
    find_movie(&mut conn, movie_id).await?;

    conn.transaction::<_, CatalogError, _>(|conn| {
        Box::pin(async move {
            let movie = diesel::update(movies::table.find(movie_id))
                .set((
                    movies::name.eq(draft.name),
                    movies::description.eq(draft.description),
                    movies::duration.eq(draft.duration),
                    movies::director.eq(draft.director),
                    movies::release_date.eq(draft.release_date),
                    movies::poster_image_url.eq(draft.poster_image_url),
                    movies::updated_at.eq(Some(Utc::now())),
                ))
                .returning(DbMovie::as_returning())
                .get_result(conn)
                .await
                .map_err(duplicate_movie)?;

            diesel::delete(movie_genres::table.filter(movie_genres::movie_id.eq(movie_id)))
                .execute(conn)
                .await?;
            connect_genres(conn, movie_id, &draft.genres).await?;

            Ok(movie.with_genres(draft.genres))
        })
    }).await
}

fn reserved_conflict(err: DieselError, what: &str) -> CatalogError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            CatalogError::Conflict(format!("{} has active reservations", what))
        }
        other => other.into(),
    }
}

pub async fn delete_movie(pool: &DbPool, movie_id: Uuid) -> Result<(), CatalogError> {
    let mut conn = connect(pool).await?;

    let deleted = diesel::delete(movies::table.find(movie_id))
        .execute(&mut conn)
        .await
        .map_err(|e| reserved_conflict(e, "Movie"))?;

    if deleted == 0 {
        return Err(CatalogError::NotFound("Movie not found".to_string()));
    }
    Ok(())
}

fn duplicate_showtime(err: DieselError) -> CatalogError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            CatalogError::Conflict("Showtime for this movie already exists".to_string())
        }
        other => other.into(),
    }
}

pub async fn add_showtime(pool: &DbPool, movie_id: Uuid, draft: ShowtimeDraft) -> Result<Showtime, CatalogError> {
    let mut conn = connect(pool).await?;
    find_movie(&mut conn, movie_id).await?;

    let new_showtime = NewShowtime {
        id: Uuid::new_v4(),
        movie_id,
        start_time: draft.start_time,
        end_time: draft.end_time,
        seats_available: draft.seats,
    };

    let showtime = diesel::insert_into(showtimes::table)
        .values(&new_showtime)
        .returning(DbShowtime::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(duplicate_showtime)?;

    Ok(showtime.into())
}

pub async fn update_showtime(pool: &DbPool, movie_id: Uuid, showtime_id: Uuid, draft: ShowtimeDraft) -> Result<Showtime, CatalogError> {
    let mut conn = connect(pool).await?;

    conn.transaction::<_, CatalogError, _>(|conn| {
        Box::pin(async move {
            let locked = inventory::lock_showtime(conn, showtime_id).await?;
            match locked {
                Some(showtime) if showtime.movie_id == movie_id => {}
                _ => return Err(CatalogError::NotFound("Showtime not found for this movie".to_string())),
            }

            let reserved = reservations::table
                .filter(reservations::showtime_id.eq(showtime_id))
                .select(diesel::dsl::sum(reservations::seats))
                .first::<Option<i64>>(conn)
                .await?
                .unwrap_or(0);

            let seats_available = seats_after_resize(draft.seats, reserved)?;

            let showtime = diesel::update(showtimes::table.find(showtime_id))
                .set((
                    showtimes::start_time.eq(draft.start_time),
                    showtimes::end_time.eq(draft.end_time),
                    showtimes::seats_available.eq(seats_available),
                    showtimes::updated_at.eq(Some(Utc::now())),
                ))
                .returning(DbShowtime::as_returning())
                .get_result(conn)
                .await
                .map_err(duplicate_showtime)?;

            Ok(showtime.into())
        })
    }).await
}

/// Counter value for a showtime resized to `capacity` while `reserved` seats
/// are held.
fn seats_after_resize(capacity: i32, reserved: i64) -> Result<i32, CatalogError> {
    let free = i64::from(capacity) - reserved;
    if free < 0 {
        return Err(CatalogError::Conflict(format!(
            "capacity {} is below the {} seats already reserved",
            capacity, reserved
        )));
    }
    i32::try_from(free).map_err(|_| CatalogError::InvalidInput("seat count out of range".to_string()))
}

pub async fn delete_showtime(pool: &DbPool, movie_id: Uuid, showtime_id: Uuid) -> Result<(), CatalogError> {
    let mut conn = connect(pool).await?;
    find_showtime_of_movie(&mut conn, movie_id, showtime_id).await?;

    diesel::delete(showtimes::table.find(showtime_id))
        .execute(&mut conn)
        .await
        .map_err(|e| reserved_conflict(e, "Showtime"))?;
    Ok(())
}
