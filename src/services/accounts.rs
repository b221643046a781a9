//! Registration and login.

use chrono::Utc;
use uuid::Uuid;

use crate::{
    auth::{hash_password, issue_token, verify_password},
    config::AppConfig,
    error::AppError,
    models::{AuthResponse, LoginRequest, RegisterRequest, User, UserProfile},
    repository::{Repository, RepositoryError},
};

const MIN_PASSWORD_LEN: usize = 6;
const BAD_CREDENTIALS: &str = "Invalid email or password";

/// Lowercases and trims an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Accepts `local@domain` with exactly one `@`, no whitespace, and text on both sides.
pub fn is_valid_email(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

fn respond(user: User, config: &AppConfig) -> Result<AuthResponse, AppError> {
    let token = issue_token(user.id, &config.jwt_secret, config.jwt_ttl_secs)?;
    Ok(AuthResponse {
        token,
        user: UserProfile::from(user),
    })
}

/// register
///
/// Validates input, rejects a taken email with 409, stores the argon2 hash and
/// returns a token for the new account.
pub async fn register(
    repo: &dyn Repository,
    config: &AppConfig,
    req: RegisterRequest,
) -> Result<AuthResponse, AppError> {
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("Name is required"));
    }
    let email = normalize_email(&req.email);
    if !is_valid_email(&email) {
        return Err(AppError::bad_request("A valid email is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if repo.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered"));
    }

    let user = User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        email,
        password_hash: hash_password(&req.password)?,
        created_at: Utc::now(),
    };

    let created = match repo.create_user(user).await {
        Ok(user) => user,
        // Lost a race against a concurrent registration for the same email.
        Err(RepositoryError::Duplicate) => {
            return Err(AppError::Conflict("Email already registered"));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id = %created.id, "user registered");
    respond(created, config)
}

/// login
///
/// Unknown email and wrong password produce the same 401.
pub async fn login(
    repo: &dyn Repository,
    config: &AppConfig,
    req: LoginRequest,
) -> Result<AuthResponse, AppError> {
    let email = normalize_email(&req.email);
    if email.is_empty() || req.password.is_empty() {
        return Err(AppError::bad_request("Email and password are required"));
    }

    let user = repo
        .get_user_by_email(&email)
        .await?
        .ok_or(AppError::Unauthorized(BAD_CREDENTIALS))?;

    if !verify_password(&req.password, &user.password_hash) {
        tracing::info!(user_id = %user.id, "login rejected");
        return Err(AppError::Unauthorized(BAD_CREDENTIALS));
    }

    respond(user, config)
}
