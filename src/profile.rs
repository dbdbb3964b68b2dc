use diesel::prelude::*;
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::State;
use serde::Serialize;
use serde_json::json;
use std::borrow::Cow;
use std::fmt;
use tracing::info;

use crate::auth;
use crate::db::schema::follows;
use crate::feed::{self, page_number};
use crate::state::App;
use crate::types::AppResult;
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::{context, profile_path};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Profile<'a> {
    pub username: Cow<'a, str>,
    pub full_name: Cow<'a, str>,
}

/// Directed edge: `user_id` sees the posts of `author_id` in their follow feed.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = follows)]
pub struct Follow {
    pub id: i32,
    pub user_id: i32,
    pub author_id: i32,
}

impl fmt::Display for Follow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.user_id, self.author_id)
    }
}

#[get("/profile/<username>?<page>")]
pub fn profile(
    app: &State<App>,
    viewer: Option<User>,
    username: &str,
    page: Option<i64>,
) -> AppResult<RawHtml<String>> {
    let feed = feed::profile(app.store(), username, viewer.as_ref(), page_number(page))?;
    let ctx = json!({
        "author": feed.author.profile(),
        "following": feed.following,
        "can_follow": auth::can_follow(viewer.as_ref(), &feed.author),
        "page_obj": feed.page,
    });
    app.render("posts/profile.html", context(viewer.as_ref(), ctx))
}

#[get("/follow?<page>")]
pub fn follow_index(
    app: &State<App>,
    user: CurrentUser,
    page: Option<i64>,
) -> AppResult<RawHtml<String>> {
    let user = user?;
    auth::ensure(auth::can_view_follow_feed(Some(&user)), || String::from("/"))?;
    let page = feed::follow(app.store(), &user, page_number(page))?;
    app.render(
        "posts/follow.html",
        context(Some(&user), json!({ "page_obj": page })),
    )
}

#[get("/profile/<username>/follow")]
pub fn follow(app: &State<App>, user: CurrentUser, username: &str) -> AppResult<Redirect> {
    let user = user?;
    let author = app.store().find_user_by_username(username)?;
    auth::ensure(auth::can_follow(Some(&user), &author), || {
        profile_path(&author.username)
    })?;

    if !app.store().is_following(user.id, author.id)? {
        app.store().create_follow(user.id, author.id)?;
        info!(user_id = user.id, author_id = author.id, "follow created");
    }
    Ok(Redirect::to(profile_path(&author.username)))
}

#[get("/profile/<username>/unfollow")]
pub fn unfollow(app: &State<App>, user: CurrentUser, username: &str) -> AppResult<Redirect> {
    let user = user?;
    let author = app.store().find_user_by_username(username)?;
    app.store().delete_follow(user.id, author.id)?;
    info!(user_id = user.id, author_id = author.id, "follow removed");
    Ok(Redirect::to(profile_path(&author.username)))
}
