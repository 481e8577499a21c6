use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, patch, post, put},
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use shared::*;
use tower_http::trace::TraceLayer;
use uuid::Uuid;
use crate::auth::{self, AdminUser, AuthConfig, AuthError, AuthUser, TOKEN_COOKIE};
use crate::catalog::{self, CatalogError, GenreQuery, MovieInput, Page, SeatCount, ShowtimeInput};
use crate::service::ReservationService;
use crate::store::DbPool;
use crate::users::{self, LoginRequest, RegisterRequest};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub reservations: ReservationService,
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    pub showtime_id: Option<Uuid>,
    pub seats: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct CreateReservationResponse {
    pub message: String,
    pub reservation: ReservationDetails,
}

#[derive(Debug, Serialize)]
pub struct CancelReservationResponse {
    pub message: String,
    pub cancellation: Cancellation,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: String,
    pub message: String,
}

/// Error surface of every handler: a status code plus the `{kind, message}`
/// body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{} {}: {}", self.status, self.kind, self.message);
        }

        let body = ErrorResponse {
            kind: self.kind.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ReservationError> for ApiError {
    fn from(err: ReservationError) -> Self {
        let status = match &err {
            ReservationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ReservationError::ShowtimeNotFound(_) | ReservationError::ReservationNotFound(_) => StatusCode::NOT_FOUND,
            ReservationError::InsufficientSeats { .. } | ReservationError::DuplicateReservation => StatusCode::CONFLICT,
            ReservationError::Forbidden => StatusCode::FORBIDDEN,
            ReservationError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError { status, kind: err.kind(), message: err.to_string() }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let (status, kind) = match &err {
            CatalogError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "InvalidInput"),
            CatalogError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            CatalogError::Conflict(_) => (StatusCode::CONFLICT, "Conflict"),
            CatalogError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "StoreFailure"),
        };
        ApiError { status, kind, message: err.to_string() }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let (status, kind) = match &err {
            AuthError::MissingToken | AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "InvalidCredentials"),
            AuthError::EmailTaken => (StatusCode::CONFLICT, "Conflict"),
            AuthError::AlreadyAdmin => (StatusCode::CONFLICT, "Conflict"),
            AuthError::UserNotFound => (StatusCode::NOT_FOUND, "NotFound"),
            AuthError::AdminOnly => (StatusCode::FORBIDDEN, "Forbidden"),
            AuthError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "InvalidInput"),
            AuthError::Hashing(_) | AuthError::Signing(_) | AuthError::Store(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ServerError")
            }
        };
        ApiError { status, kind, message: err.to_string() }
    }
}

impl ApiError {
    fn invalid_input(message: String) -> Self {
        ApiError { status: StatusCode::BAD_REQUEST, kind: "InvalidInput", message }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

/// `Json` body whose rejections come back as `InvalidInput`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/movies", get(list_movies))
        .route("/api/movies/sort/genre", get(movies_by_genre))
        .route("/api/movies/:movie_id/showtime", get(list_showtimes))
        .route("/api/movies/:movie_id/showtime/:showtime_id/seats", get(seats_available))
        .route("/api/user/reservation", get(list_reservations).post(create_reservation))
        .route("/api/user/reservation/:reservation_id", delete(cancel_reservation))
        .route("/api/admin/reservations", get(all_reservations))
        .route("/api/admin/movies", post(add_movie))
        .route("/api/admin/movies/:movie_id", put(update_movie).delete(delete_movie))
        .route("/api/admin/movies/:movie_id/showtime", post(add_showtime))
        .route(
            "/api/admin/movies/:movie_id/showtime/:showtime_id",
            put(update_showtime).delete(delete_showtime),
        )
        .route("/api/admin/promote/:user_id", patch(promote_user))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
}

pub async fn health_check() -> &'static str {
    "OK"
}

fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(request): AppJson<RegisterRequest>,
) -> ApiResult<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let registration = request.validate()?;
    let user = users::register(&state.pool, registration).await?;
    let token = auth::issue_token(&state.auth, user.id, user.role)?;

    tracing::info!("Registered user {}", user.id);
    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(token)),
        Json(AuthResponse { message: "User created successfully".to_string(), user }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(request): AppJson<LoginRequest>,
) -> ApiResult<(CookieJar, Json<AuthResponse>)> {
    let (email, password) = request.validate()?;
    let user = users::login(&state.pool, &email, password).await?;
    let token = auth::issue_token(&state.auth, user.id, user.role)?;

    Ok((
        jar.add(session_cookie(token)),
        Json(AuthResponse { message: "Login Successful".to_string(), user }),
    ))
}

pub async fn logout(user: AuthUser, jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    tracing::info!("User {} logged out", user.id);
    (
        jar.remove(Cookie::build(TOKEN_COOKIE).path("/")),
        Json(MessageResponse { message: "Logout Successful".to_string() }),
    )
}

// ---------------------------------------------------------------------------
// Catalog browsing
// ---------------------------------------------------------------------------

pub async fn list_movies(State(state): State<AppState>, AppQuery(page): AppQuery<Page>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(catalog::list_movies(&state.pool, page).await?))
}

pub async fn movies_by_genre(State(state): State<AppState>, AppQuery(query): AppQuery<GenreQuery>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(catalog::movies_by_genre(&state.pool, query).await?))
}

pub async fn list_showtimes(State(state): State<AppState>, AppPath(movie_id): AppPath<Uuid>) -> ApiResult<Json<Vec<Showtime>>> {
    Ok(Json(catalog::showtimes_for_movie(&state.pool, movie_id).await?))
}

pub async fn seats_available(
    State(state): State<AppState>,
    AppPath((movie_id, showtime_id)): AppPath<(Uuid, Uuid)>,
) -> ApiResult<Json<SeatCount>> {
    Ok(Json(catalog::seats(&state.pool, movie_id, showtime_id).await?))
}

// ---------------------------------------------------------------------------
// Reservations
// ---------------------------------------------------------------------------

pub async fn list_reservations(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<ReservationDetails>>> {
    Ok(Json(state.reservations.list_for_user(user.id).await?))
}

pub async fn create_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(request): AppJson<CreateReservationRequest>,
) -> ApiResult<(StatusCode, Json<CreateReservationResponse>)> {
    let (Some(showtime_id), Some(seats)) = (request.showtime_id, request.seats) else {
        return Err(ReservationError::InvalidInput("Please provide showtime_id and number of seats".to_string()).into());
    };

    match state.reservations.reserve(user.id, showtime_id, seats).await {
        Ok(reservation) => {
            tracing::info!("User {} reserved {} seats for showtime {}", user.id, seats, showtime_id);
            Ok((
                StatusCode::CREATED,
                Json(CreateReservationResponse {
                    message: "Reservation created successfully".to_string(),
                    reservation,
                }),
            ))
        }
        Err(e) => {
            tracing::warn!("Reservation by user {} for showtime {} failed: {}", user.id, showtime_id, e);
            Err(e.into())
        }
    }
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    AppPath(reservation_id): AppPath<Uuid>,
) -> ApiResult<Json<CancelReservationResponse>> {
    let cancellation = state.reservations.cancel(reservation_id, user.id).await?;
    tracing::info!(
        "User {} cancelled reservation {}, {} seats released",
        user.id,
        reservation_id,
        cancellation.seats_released
    );

    Ok(Json(CancelReservationResponse {
        message: "Reservation deleted and seats updated successfully".to_string(),
        cancellation,
    }))
}

// ---------------------------------------------------------------------------
// Administration
// ---------------------------------------------------------------------------

pub async fn all_reservations(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Json<Vec<ReservationWithUser>>> {
    Ok(Json(state.reservations.list_all().await?))
}

pub async fn add_movie(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(input): AppJson<MovieInput>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    let movie = catalog::add_movie(&state.pool, input.validate()?).await?;
    tracing::info!("Admin {} added movie {}", admin.id, movie.id);
    Ok((StatusCode::CREATED, Json(movie)))
}

pub async fn update_movie(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(movie_id): AppPath<Uuid>,
    AppJson(input): AppJson<MovieInput>,
) -> ApiResult<Json<Movie>> {
    Ok(Json(catalog::update_movie(&state.pool, movie_id, input.validate()?).await?))
}

pub async fn delete_movie(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(movie_id): AppPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    catalog::delete_movie(&state.pool, movie_id).await?;
    tracing::info!("Admin {} deleted movie {}", admin.id, movie_id);
    Ok(Json(MessageResponse { message: "Movie deleted successfully".to_string() }))
}

pub async fn add_showtime(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(movie_id): AppPath<Uuid>,
    AppJson(input): AppJson<ShowtimeInput>,
) -> ApiResult<(StatusCode, Json<Showtime>)> {
    let showtime = catalog::add_showtime(&state.pool, movie_id, input.validate()?).await?;
    Ok((StatusCode::CREATED, Json(showtime)))
}

pub async fn update_showtime(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath((movie_id, showtime_id)): AppPath<(Uuid, Uuid)>,
    AppJson(input): AppJson<ShowtimeInput>,
) -> ApiResult<Json<Showtime>> {
    Ok(Json(catalog::update_showtime(&state.pool, movie_id, showtime_id, input.validate()?).await?))
}

pub async fn delete_showtime(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath((movie_id, showtime_id)): AppPath<(Uuid, Uuid)>,
) -> ApiResult<Json<MessageResponse>> {
    catalog::delete_showtime(&state.pool, movie_id, showtime_id).await?;
    tracing::info!("Admin {} deleted showtime {}", admin.id, showtime_id);
    Ok(Json(MessageResponse { message: "Showtime deleted successfully".to_string() }))
}

pub async fn promote_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(user_id): AppPath<Uuid>,
) -> ApiResult<Json<UserProfile>> {
    let user = users::promote(&state.pool, user_id).await?;
    tracing::info!("Admin {} promoted user {}", admin.id, user_id);
    Ok(Json(user))
}
