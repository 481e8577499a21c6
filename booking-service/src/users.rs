use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use shared::*;
use uuid::Uuid;
use crate::auth::{self, AuthError};
use crate::models::*;
use crate::schema::*;
use crate::store::DbPool;

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn required(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

impl RegisterRequest {
    pub fn validate(self) -> Result<Registration, AuthError> {
        let (Some(name), Some(email), Some(password)) =
            (required(self.name), required(self.email), self.password.filter(|p| !p.is_empty()))
        else {
            return Err(AuthError::InvalidInput("Please provide name, email and password".to_string()));
        };

        if !is_valid_email(&email) {
            return Err(AuthError::InvalidInput("email must be a valid email".to_string()));
        }

        Ok(Registration { name, email: email.to_lowercase(), password })
    }
}

impl LoginRequest {
    pub fn validate(self) -> Result<(String, String), AuthError> {
        let (Some(email), Some(password)) = (required(self.email), self.password.filter(|p| !p.is_empty())) else {
            return Err(AuthError::InvalidInput("Please provide email and password".to_string()));
        };

        if !is_valid_email(&email) {
            return Err(AuthError::InvalidInput("email must be a valid email".to_string()));
        }

        Ok((email.to_lowercase(), password))
    }
}

pub async fn register(pool: &DbPool, registration: Registration) -> Result<UserProfile, AuthError> {
    let mut conn = pool.get().await.map_err(|e| AuthError::Store(e.to_string()))?;

    let password_hash = auth::hash_password(registration.password).await?;
    let new_user = NewUser {
        id: Uuid::new_v4(),
        name: registration.name,
        email: registration.email,
        password_hash,
        role: Role::User.as_str().to_string(),
    };

    let user = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(DbUser::as_returning())
        .get_result(&mut conn)
        .await
        .map_err(|e| match e {
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => AuthError::EmailTaken,
            other => other.into(),
        })?;

    Ok(user.into())
}

pub async fn login(pool: &DbPool, email: &str, password: String) -> Result<UserProfile, AuthError> {
    let mut conn = pool.get().await.map_err(|e| AuthError::Store(e.to_string()))?;

    let user = users::table
        .filter(users::email.eq(email))
        .select(DbUser::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(AuthError::InvalidCredentials)?;

    if !auth::verify_password(password, user.password_hash.clone()).await? {
        return Err(AuthError::InvalidCredentials);
    }

    Ok(user.into())
}

pub async fn promote(pool: &DbPool, user_id: Uuid) -> Result<UserProfile, AuthError> {
    let mut conn = pool.get().await.map_err(|e| AuthError::Store(e.to_string()))?;

    let user = users::table
        .find(user_id)
        .select(DbUser::as_select())
        .first(&mut conn)
        .await
        .optional()?
        .ok_or(AuthError::UserNotFound)?;

    if Role::from(user.role.as_str()) == Role::Admin {
        return Err(AuthError::AlreadyAdmin);
    }

    let updated = diesel::update(users::table.find(user_id))
        .set(users::role.eq(Role::Admin.as_str()))
        .returning(DbUser::as_returning())
        .get_result(&mut conn)
        .await?;

    Ok(updated.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_register_trims_and_lowercases() {
        let valid = registration("  Grace ", " Grace@Example.COM ", "s3cret").validate().unwrap();
        assert_eq!(valid, Registration {
            name: "Grace".to_string(),
            email: "grace@example.com".to_string(),
            password: "s3cret".to_string(),
        });
    }

    #[test]
    fn test_register_requires_every_field() {
        let missing_name = RegisterRequest { name: None, ..registration("", "a@b.io", "pw") };
        assert!(matches!(missing_name.validate(), Err(AuthError::InvalidInput(_))));

        assert!(registration("   ", "a@b.io", "pw").validate().is_err());
        assert!(registration("Al", "a@b.io", "").validate().is_err());
    }

    #[test]
    fn test_email_shape() {
        for ok in ["a@b.io", "first.last@mail.example.org"] {
            assert!(is_valid_email(ok), "{ok}");
        }
        for bad in ["plain", "@b.io", "a@b", "a@@b.io", "a@.io", "a b@c.io", "a@b.io."] {
            assert!(!is_valid_email(bad), "{bad}");
        }
    }

    #[test]
    fn test_login_validation() {
        let request = LoginRequest {
            email: Some("Someone@Example.com".to_string()),
            password: Some("pw".to_string()),
        };
        assert_eq!(request.validate().unwrap(), ("someone@example.com".to_string(), "pw".to_string()));

        let request = LoginRequest { email: Some("x@y.z".to_string()), password: None };
        assert!(matches!(request.validate(), Err(AuthError::InvalidInput(_))));
    }
}
