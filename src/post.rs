use chrono::{DateTime, Utc};
use diesel::prelude::*;
use rocket::form::Form;
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::State;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::json;
use std::fmt;
use tracing::info;

use crate::auth;
use crate::cache::INDEX_PAGE_KEY;
use crate::db::schema::posts;
use crate::db::{self, PostFilter, Repository};
use crate::feed::{self, page_number};
use crate::group::Group;
use crate::state::App;
use crate::types::{AppError, AppResult, Reply, Validate, ValidationError};
use crate::users::models::User;
use crate::users::CurrentUser;
use crate::utils::{context, format_date, post_detail_path, profile_path};

const EXCERPT_CHARS: usize = 15;

#[derive(Debug, Clone, PartialEq, Queryable, Identifiable)]
#[diesel(table_name = posts)]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
    /// Set by the store on insert and never written again.
    pub created: DateTime<Utc>,
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let excerpt: String = self.text.chars().take(EXCERPT_CHARS).collect();
        f.write_str(&excerpt)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost {
    pub text: String,
    pub author_id: i32,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// Everything an author may change; `created` is deliberately absent.
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = posts, treat_none_as_null = true)]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// A post joined with its author and group, as feeds and pages show it.
#[derive(Debug, Clone, PartialEq)]
pub struct PostView {
    pub post: Post,
    pub author: User,
    pub group: Option<Group>,
}

impl Serialize for PostView {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("PostView", 7)?;
        s.serialize_field("id", &self.post.id)?;
        s.serialize_field("text", &self.post.text)?;
        s.serialize_field("excerpt", &self.post.to_string())?;
        s.serialize_field("image", &self.post.image)?;
        s.serialize_field("created", &format_date(&self.post.created))?;
        s.serialize_field("author", &self.author.profile())?;
        s.serialize_field("group", &self.group)?;
        s.end()
    }
}

#[derive(Debug, Clone, Default, FromForm, serde::Serialize)]
pub struct PostForm {
    pub text: Option<String>,
    pub group: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostInput {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl PostInput {
    pub fn into_new_post(self, author_id: i32) -> NewPost {
        NewPost {
            text: self.text,
            author_id,
            group_id: self.group_id,
            image: self.image,
        }
    }

    pub fn into_changes(self) -> PostChanges {
        PostChanges {
            text: self.text,
            group_id: self.group_id,
            image: self.image,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Validate for PostForm {
    type Output = PostInput;

    fn validate(self, store: &dyn Repository) -> AppResult<PostInput> {
        let mut errors = ValidationError::default();

        let text = self.text.unwrap_or_default();
        if text.trim().is_empty() {
            errors.add_error("text", "This field is required.");
        }

        let group_id = match non_blank(self.group) {
            None => None,
            Some(raw) => match raw.parse::<i32>().map(|id| store.find_group(id)) {
                Ok(Ok(group)) => Some(group.id),
                Ok(Err(ref e)) if !db::is_not_found(e) => {
                    return Err(AppError::Internal);
                }
                _ => {
                    errors.add_error("group", "Select a valid choice.");
                    None
                }
            },
        };

        errors.into_result(PostInput {
            text,
            group_id,
            image: non_blank(self.image),
        })
    }
}

fn render_form(
    app: &App,
    user: &User,
    form: &PostForm,
    errors: &ValidationError,
    editing: Option<i32>,
) -> AppResult<RawHtml<String>> {
    let groups = app.store().list_groups()?;
    let ctx = json!({
        "form": form,
        "errors": errors,
        "groups": groups,
        "is_edit": editing.is_some(),
        "post_id": editing,
    });
    app.render("posts/create_post.html", context(Some(user), ctx))
}

#[get("/?<page>")]
pub fn index(app: &State<App>, viewer: Option<User>, page: Option<i64>) -> AppResult<RawHtml<String>> {
    let number = page_number(page);
    let key = format!("{}:{}", INDEX_PAGE_KEY, number);
    let listing = app.index_cache().get_or_render(&key, || {
        let page = feed::home(app.store(), number)?;
        app.render_markup("posts/includes/feed.html", &json!({ "page_obj": page }))
    })?;
    app.render(
        "posts/index.html",
        context(viewer.as_ref(), json!({ "listing": listing })),
    )
}

#[get("/posts/<post_id>")]
pub fn detail(app: &State<App>, viewer: Option<User>, post_id: i32) -> AppResult<RawHtml<String>> {
    let view = app.store().find_post(post_id)?;
    let comments = app.store().list_comments(post_id)?;
    let author_posts = app.store().count_posts(PostFilter::Author(view.post.author_id))?;
    let ctx = json!({
        "post": view,
        "comments": comments,
        "author_posts": author_posts,
        "can_comment": auth::can_comment(viewer.as_ref()),
        "can_edit": auth::can_edit_post(viewer.as_ref(), &view.post),
    });
    app.render("posts/post_detail.html", context(viewer.as_ref(), ctx))
}

#[get("/create")]
pub fn create_form(app: &State<App>, user: CurrentUser) -> AppResult<RawHtml<String>> {
    let user = user?;
    auth::ensure(auth::can_create_post(Some(&user)), || String::from("/"))?;
    render_form(app, &user, &PostForm::default(), &ValidationError::default(), None)
}

#[post("/create", data = "<form>")]
pub fn create(app: &State<App>, user: CurrentUser, form: Form<PostForm>) -> AppResult<Reply> {
    let user = user?;
    auth::ensure(auth::can_create_post(Some(&user)), || String::from("/"))?;

    let form = form.into_inner();
    let input = match form.clone().validate(app.store()) {
        Ok(input) => input,
        Err(AppError::Validation(errors)) => {
            return Ok(render_form(app, &user, &form, &errors, None)?.into());
        }
        Err(e) => return Err(e),
    };

    let post = app.store().create_post(&input.into_new_post(user.id))?;
    info!(post_id = post.id, author = %user.username, "post created");
    Ok(Redirect::to(profile_path(&user.username)).into())
}

#[get("/posts/<post_id>/edit")]
pub fn edit_form(app: &State<App>, user: CurrentUser, post_id: i32) -> AppResult<RawHtml<String>> {
    let user = user?;
    let view = app.store().find_post(post_id)?;
    auth::ensure(auth::can_edit_post(Some(&user), &view.post), || {
        post_detail_path(post_id)
    })?;

    let form = PostForm {
        text: Some(view.post.text.clone()),
        group: view.post.group_id.map(|id| id.to_string()),
        image: view.post.image.clone(),
    };
    render_form(app, &user, &form, &ValidationError::default(), Some(post_id))
}

#[post("/posts/<post_id>/edit", data = "<form>")]
pub fn edit(
    app: &State<App>,
    user: CurrentUser,
    post_id: i32,
    form: Form<PostForm>,
) -> AppResult<Reply> {
    let user = user?;
    let view = app.store().find_post(post_id)?;
    auth::ensure(auth::can_edit_post(Some(&user), &view.post), || {
        post_detail_path(post_id)
    })?;

    let form = form.into_inner();
    let input = match form.clone().validate(app.store()) {
        Ok(input) => input,
        Err(AppError::Validation(errors)) => {
            return Ok(render_form(app, &user, &form, &errors, Some(post_id))?.into());
        }
        Err(e) => return Err(e),
    };

    app.store().update_post(post_id, &input.into_changes())?;
    info!(post_id, author = %user.username, "post edited");
    Ok(Redirect::to(post_detail_path(post_id)).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::group::NewGroup;

    #[test]
    fn display_is_a_short_excerpt() {
        let post = Post {
            id: 1,
            text: String::from("Привет, это очень длинный пост"),
            author_id: 1,
            group_id: None,
            image: None,
            created: Utc::now(),
        };
        assert_eq!(post.to_string(), "Привет, это оче");
    }

    #[test]
    fn form_requires_text() {
        let store = MemoryRepository::new();
        let form = PostForm {
            text: Some(String::from("   ")),
            group: None,
            image: None,
        };
        match form.validate(&store) {
            Err(AppError::Validation(errors)) => assert_eq!(errors.field("text").len(), 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn form_resolves_group_choice() {
        let store = MemoryRepository::new();
        let group = store.create_group(&NewGroup::new("Poems", "")).unwrap();

        let chosen = PostForm {
            text: Some(String::from("verse")),
            group: Some(group.id.to_string()),
            image: Some(String::from(" ")),
        }
        .validate(&store)
        .unwrap();
        assert_eq!(chosen.group_id, Some(group.id));
        assert_eq!(chosen.image, None);

        let blank = PostForm {
            text: Some(String::from("verse")),
            group: Some(String::new()),
            image: None,
        }
        .validate(&store)
        .unwrap();
        assert_eq!(blank.group_id, None);

        for bad in ["999", "poems"] {
            let result = PostForm {
                text: Some(String::from("verse")),
                group: Some(String::from(bad)),
                image: None,
            }
            .validate(&store);
            match result {
                Err(AppError::Validation(errors)) => assert_eq!(errors.field("group").len(), 1),
                other => panic!("unexpected result for {}: {:?}", bad, other),
            }
        }
    }
}
