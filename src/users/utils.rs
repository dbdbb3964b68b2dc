use regex::Regex;

use crate::db::{self, Repository};
use crate::types::{AppResult, ValidationError};

pub const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    static ref EMAIL_RE: Regex = {
        let pattern = r"\A[a-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[a-z0-9!#$%&'*+/=?^_`{|}~-]+)*@(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\z";
        Regex::new(pattern).unwrap()
    };
    static ref USERNAME_RE: Regex = Regex::new(r"\A[A-Za-z0-9_.@+-]{1,150}\z").unwrap();
}

pub fn validate_email_re(email: &str) -> Result<(), ValidationError> {
    if !EMAIL_RE.is_match(&email.to_lowercase()) {
        Err(ValidationError::from(
            "email",
            format!("Invalid email: {}", email),
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username_re(username: &str) -> Result<(), ValidationError> {
    if !USERNAME_RE.is_match(username) {
        Err(ValidationError::from(
            "username",
            "Use at most 150 letters, digits and @/./+/-/_ characters.",
        ))
    } else {
        Ok(())
    }
}

pub fn validate_username(username: &str, store: &dyn Repository) -> AppResult<()> {
    let mut errors = ValidationError::default();
    if let Err(e) = validate_username_re(username) {
        errors.merge(e);
    } else {
        match store.find_user_by_username(username) {
            Ok(_) => errors.add_error("username", "A user with that username already exists."),
            Err(ref e) if db::is_not_found(e) => {}
            Err(e) => return Err(e.into()),
        }
    }
    errors.into_result(())
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), ValidationError> {
    let mut errors = ValidationError::default();
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.add_error(
            "password1",
            format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_PASSWORD_LENGTH
            ),
        );
    }
    if password != confirmation {
        errors.add_error("password2", "The two password fields didn't match.");
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
