use rocket::response::content::RawHtml;
use rocket::State;
use serde_json::json;

use crate::state::App;
use crate::types::AppResult;
use crate::users::models::User;
use crate::utils::context;

#[get("/author")]
pub fn author(app: &State<App>, viewer: Option<User>) -> AppResult<RawHtml<String>> {
    app.render("about/author.html", context(viewer.as_ref(), json!({})))
}

#[get("/tech")]
pub fn tech(app: &State<App>, viewer: Option<User>) -> AppResult<RawHtml<String>> {
    app.render("about/tech.html", context(viewer.as_ref(), json!({})))
}
