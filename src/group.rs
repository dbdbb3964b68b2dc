use diesel::prelude::*;
use rocket::response::content::RawHtml;
use rocket::State;
use serde::Serialize;
use serde_json::json;
use slug::slugify;
use std::fmt;

use crate::db::schema::groups;
use crate::feed::{self, page_number};
use crate::state::App;
use crate::types::AppResult;
use crate::users::models::User;
use crate::utils::context;

/// Width of the `groups.slug` column.
const SLUG_LENGTH: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Queryable, Identifiable)]
#[diesel(table_name = groups)]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = groups)]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl NewGroup {
    /// Derives the slug from the title.
    pub fn new(title: &str, description: &str) -> NewGroup {
        let mut slug = slugify(title);
        slug.truncate(SLUG_LENGTH);
        let slug = slug.trim_end_matches('-').to_string();
        NewGroup {
            title: title.to_string(),
            slug,
            description: description.to_string(),
        }
    }
}

#[get("/group/<slug>?<page>")]
pub fn group_posts(
    app: &State<App>,
    viewer: Option<User>,
    slug: &str,
    page: Option<i64>,
) -> AppResult<RawHtml<String>> {
    let (group, page) = feed::group(app.store(), slug, page_number(page))?;
    app.render(
        "posts/group_list.html",
        context(viewer.as_ref(), json!({ "group": group, "page_obj": page })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_follows_title() {
        let group = NewGroup::new("Cats & Dogs", "");
        assert_eq!(group.slug, "cats-dogs");
    }

    #[test]
    fn long_titles_fit_the_slug_column() {
        let group = NewGroup::new(&"word ".repeat(20), "");
        assert!(group.slug.len() <= SLUG_LENGTH);
        assert!(!group.slug.ends_with('-'));
    }
}
