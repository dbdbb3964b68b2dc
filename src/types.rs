use rocket::http::Status;
use rocket::request::Request;
use rocket::response::content::RawHtml;
use rocket::response::{self, Redirect, Responder};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, error};

use crate::db::{self, Repository};
use crate::utils::login_url;

pub trait Validate
where
    Self: Sized,
{
    type Output;
    fn validate(self, store: &dyn Repository) -> AppResult<Self::Output>;
}

#[derive(Debug)]
pub enum AppError {
    NotFound,
    Conflict(&'static str),
    Validation(ValidationError),
    Unauthorized,
    /// Declined action; the client is sent to the carried path instead.
    Forbidden(String),
    Internal,
}

impl From<db::Error> for AppError {
    fn from(err: db::Error) -> AppError {
        match err.kind() {
            db::ErrorKind::NotFound(entity) => {
                debug!(entity = *entity, "lookup missed");
                AppError::NotFound
            }
            db::ErrorKind::Conflict(field) => AppError::Conflict(*field),
            _ => {
                error!(error = %err, "store failure");
                AppError::Internal
            }
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> AppError {
        AppError::Validation(err)
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Serialize, Default, Clone, PartialEq)]
pub struct ValidationError(HashMap<String, Vec<String>>);

impl ValidationError {
    pub fn add_error<K: Into<String>, V: Into<String>>(&mut self, key: K, val: V) {
        let entry = self.0.entry(key.into()).or_default();
        entry.push(val.into());
    }

    pub fn from<K: Into<String>, V: Into<String>>(key: K, val: V) -> Self {
        let mut error = ValidationError::default();
        error.add_error(key, val);
        error
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn merge(&mut self, other: ValidationError) {
        for (key, errors) in other.0.into_iter() {
            let entry = self.0.entry(key).or_default();
            entry.extend(errors);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_result<T>(self, value: T) -> AppResult<T> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self.into())
        }
    }
}

/// Either a rendered page or a redirect, for handlers that may decline.
#[derive(Debug, Responder)]
pub enum Reply {
    Page(RawHtml<String>),
    Redirect(Redirect),
}

impl From<RawHtml<String>> for Reply {
    fn from(page: RawHtml<String>) -> Reply {
        Reply::Page(page)
    }
}

impl From<Redirect> for Reply {
    fn from(redirect: Redirect) -> Reply {
        Reply::Redirect(redirect)
    }
}

impl<'r> Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        match self {
            AppError::NotFound => Err(Status::NotFound),
            AppError::Unauthorized => {
                let target = login_url(&req.uri().path().to_string());
                Redirect::to(target).respond_to(req)
            }
            AppError::Forbidden(fallback) => Redirect::to(fallback).respond_to(req),
            AppError::Conflict(_) | AppError::Validation(_) => Err(Status::UnprocessableEntity),
            AppError::Internal => Err(Status::InternalServerError),
        }
    }
}
