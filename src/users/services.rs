use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use crate::error::{AppError, FieldErrors};
use crate::users::{
    password::{hash_password, verify_password},
    repo::{UserRepository, DUPLICATE_EMAIL},
    repo_types::{NewUser, User},
};

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_FIELD_LEN: usize = 255;

pub const BLANK: &str = "This field may not be blank.";
pub const INVALID_EMAIL: &str = "Enter a valid email address.";
pub const BAD_CREDENTIALS: &str = "Unable to authenticate with provided credentials.";

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Expects an already normalized address.
pub fn validate_email(email: &str, errors: &mut FieldErrors) {
    if email.is_empty() {
        errors.add("email", BLANK);
    } else if email.chars().count() > MAX_FIELD_LEN {
        errors.add("email", too_long(MAX_FIELD_LEN));
    } else if !is_valid_email(email) {
        errors.add("email", INVALID_EMAIL);
    }
}

/// Same blank rule as token issuance, so every stored password can log in.
pub fn validate_password(password: &str, errors: &mut FieldErrors) {
    if password.trim().is_empty() {
        errors.add("password", BLANK);
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.add(
            "password",
            format!("Ensure this field has at least {MIN_PASSWORD_LEN} characters."),
        );
    }
}

pub fn validate_name(name: &str, errors: &mut FieldErrors) {
    if name.chars().count() > MAX_FIELD_LEN {
        errors.add("name", too_long(MAX_FIELD_LEN));
    }
}

pub fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {max} characters.")
}

/// Registers a regular account. The email is normalized before any check.
pub async fn create_user(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
    name: &str,
) -> Result<User, AppError> {
    insert_user(users, email, password, name, false).await
}

/// Same as [`create_user`] with `is_staff` and `is_superuser` set.
pub async fn create_superuser(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> Result<User, AppError> {
    insert_user(users, email, password, "", true).await
}

async fn insert_user(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
    name: &str,
    elevated: bool,
) -> Result<User, AppError> {
    let email = normalize_email(email);
    let mut errors = FieldErrors::new();
    validate_email(&email, &mut errors);
    validate_password(password, &mut errors);
    validate_name(name, &mut errors);
    errors.into_result()?;

    if users.find_by_email(&email).await?.is_some() {
        warn!(%email, "email already registered");
        return Err(AppError::validation("email", DUPLICATE_EMAIL));
    }

    let password_hash = hash_password(password)?;
    let user = users
        .create(&NewUser {
            email,
            password_hash,
            name: name.to_string(),
            is_staff: elevated,
            is_superuser: elevated,
        })
        .await?;
    info!(user_id = user.id, email = %user.email, superuser = elevated, "user created");
    Ok(user)
}

/// `None` for unknown email, wrong password or inactive account.
pub async fn authenticate(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let email = normalize_email(email);
    let Some(user) = users.find_by_email(&email).await? else {
        warn!(%email, "login unknown email");
        return Ok(None);
    };
    if !user.is_active {
        warn!(user_id = user.id, "login inactive user");
        return Ok(None);
    }
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Ok(None);
    }
    Ok(Some(user))
}
