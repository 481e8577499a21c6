diesel::table! {
    genres (id) {
        id -> Uuid,
        name -> Varchar,
    }
}

diesel::table! {
    movie_genres (movie_id, genre_id) {
        movie_id -> Uuid,
        genre_id -> Uuid,
    }
}

diesel::table! {
    movies (id) {
        id -> Uuid,
        name -> Varchar,
        description -> Nullable<Text>,
        duration -> Int4,
        director -> Varchar,
        release_date -> Timestamptz,
        poster_image_url -> Nullable<Varchar>,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    reservations (id) {
        id -> Uuid,
        user_id -> Uuid,
        showtime_id -> Uuid,
        seats -> Int4,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    showtimes (id) {
        id -> Uuid,
        movie_id -> Uuid,
        start_time -> Timestamptz,
        end_time -> Timestamptz,
        seats_available -> Int4,
        created_at -> Nullable<Timestamptz>,
        updated_at -> Nullable<Timestamptz>,
    }
}

diesel::table! {
    users (id) {
        id -> Uuid,
        name -> Varchar,
        email -> Varchar,
        password_hash -> Varchar,
        role -> Varchar,
        created_at -> Nullable<Timestamptz>,
    }
}

diesel::joinable!(movie_genres -> genres (genre_id));
diesel::joinable!(movie_genres -> movies (movie_id));
diesel::joinable!(reservations -> showtimes (showtime_id));
diesel::joinable!(reservations -> users (user_id));
diesel::joinable!(showtimes -> movies (movie_id));

diesel::allow_tables_to_appear_in_same_query!(
    genres,
    movie_genres,
    movies,
    reservations,
    showtimes,
    users,
);
