use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rocket::form::Form;
use rocket::response::Redirect;
use rocket::State;
use serde::Serialize;
use tracing::{debug, info};

use crate::auth;
use crate::db::schema::comments;
use crate::post::Post;
use crate::profile::Profile;
use crate::state::App;
use crate::types::AppResult;
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::{post_detail_path, serialize_date};

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable, Associations)]
#[diesel(belongs_to(Post))]
#[diesel(table_name = comments)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CommentView {
    id: i32,
    text: String,
    #[serde(serialize_with = "serialize_date")]
    created: DateTime<Utc>,
    author: Profile<'static>,
}

impl From<(Comment, User)> for CommentView {
    fn from(comment_and_author: (Comment, User)) -> Self {
        let (comment, author) = comment_and_author;
        CommentView {
            id: comment.id,
            text: comment.text,
            created: comment.created,
            author: author.profile(),
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: i32,
    pub text: String,
}

#[derive(Debug, FromForm)]
pub struct CommentForm {
    text: Option<String>,
}

#[post("/posts/<post_id>/comment", data = "<form>")]
pub fn add(
    app: &State<App>,
    user: CurrentUser,
    post_id: i32,
    form: Form<CommentForm>,
) -> AppResult<Redirect> {
    let user = user?;
    auth::ensure(auth::can_comment(Some(&user)), || post_detail_path(post_id))?;
    let post = app.store().find_post(post_id)?;

    let text = form.into_inner().text.unwrap_or_default();
    if text.trim().is_empty() {
        debug!(post_id, "empty comment ignored");
    } else {
        let comment = app.store().create_comment(&NewComment {
            post_id: post.post.id,
            author_id: user.id,
            text,
        })?;
        info!(comment_id = comment.id, post_id, author = %user.username, "comment added");
    }
    Ok(Redirect::to(post_detail_path(post_id)))
}
