use chrono::{DateTime, Utc};
use rocket::http::uri::Origin;
use serde::Serializer;
use serde_json::{Map, Value};

use crate::users::models::User;

pub const LOGIN_PATH: &str = "/auth/login/";

/// Login entry point that returns the client to `path` afterwards.
pub fn login_url(path: &str) -> String {
    format!("{}?next={}", LOGIN_PATH, path.replace('&', "%26"))
}

pub fn post_detail_path(post_id: i32) -> String {
    format!("/posts/{}/", post_id)
}

pub fn profile_path(username: &str) -> String {
    format!("/profile/{}/", username)
}

/// Only same-site absolute paths that parse as a URI are accepted as
/// post-login targets.
pub fn is_local_path(target: &str) -> bool {
    target.starts_with('/')
        && !target.starts_with("//")
        && !target.contains('\\')
        && Origin::parse(target).is_ok()
}

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format("%d %b %Y %H:%M").to_string()
}

pub fn serialize_date<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_date(date))
}

/// Adds the signed-in user (or null) to a template context object.
pub fn context(viewer: Option<&User>, value: Value) -> Value {
    let mut map = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let viewer = match viewer {
        Some(user) => serde_json::json!({ "username": user.username }),
        None => Value::Null,
    };
    map.insert(String::from("viewer"), viewer);
    Value::Object(map)
}
