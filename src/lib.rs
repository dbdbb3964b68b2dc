#[macro_use]
extern crate rocket;

#[macro_use]
extern crate error_chain;

#[macro_use]
extern crate lazy_static;

pub mod about;
pub mod auth;
pub mod cache;
pub mod comment;
pub mod config;
pub mod db;
pub mod feed;
pub mod group;
pub mod post;
pub mod profile;
pub mod render;
pub mod state;
pub mod types;
pub mod users;
pub mod utils;

use rocket::response::content::RawHtml;
use rocket::{Build, Request, Rocket};
use serde_json::json;

pub use crate::state::App;

fn error_page(req: &Request<'_>, template: &str) -> RawHtml<String> {
    let context = json!({ "path": req.uri().path().to_string(), "viewer": null });
    let markup = req
        .rocket()
        .state::<App>()
        .and_then(|app| app.render_markup(template, &context).ok());
    match markup {
        Some(markup) => RawHtml(markup),
        None => RawHtml(String::from("<h1>Something went wrong</h1>")),
    }
}

#[catch(404)]
fn not_found(req: &Request<'_>) -> RawHtml<String> {
    error_page(req, "core/404.html")
}

#[catch(403)]
fn forbidden(req: &Request<'_>) -> RawHtml<String> {
    error_page(req, "core/403.html")
}

#[catch(500)]
fn internal_error(req: &Request<'_>) -> RawHtml<String> {
    error_page(req, "core/500.html")
}

/// Mounts every route of the site on top of the given application state.
pub fn build(app: App) -> Rocket<Build> {
    rocket::build()
        .manage(app)
        .mount(
            "/",
            routes![
                post::index,
                post::detail,
                post::create_form,
                post::create,
                post::edit_form,
                post::edit,
                group::group_posts,
                comment::add,
                profile::profile,
                profile::follow_index,
                profile::follow,
                profile::unfollow,
            ],
        )
        .mount(
            "/auth",
            routes![
                users::signup_form,
                users::signup,
                users::login_form,
                users::login,
                users::logout,
            ],
        )
        .mount("/about", routes![about::author, about::tech])
        .register("/", catchers![not_found, forbidden, internal_error])
}
