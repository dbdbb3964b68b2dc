use serde::ser::{Serialize, SerializeStruct, Serializer};

use crate::db::{PostFilter, Repository};
use crate::group::Group;
use crate::post::PostView;
use crate::types::AppResult;
use crate::users::models::User;

pub const PAGE_SIZE: i64 = 10;

/// Offset/limit slice of an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: i64,
    pub limit: i64,
}

impl Window {
    pub fn for_page(number: i64) -> Window {
        Window {
            offset: (number.max(1) - 1).saturating_mul(PAGE_SIZE),
            limit: PAGE_SIZE,
        }
    }
}

/// Missing, zero or negative page indexes select the first page.
pub fn page_number(raw: Option<i64>) -> i64 {
    match raw {
        Some(number) if number >= 1 => number,
        _ => 1,
    }
}

/// Cuts `window` out of `items`, clamped to what is there.
pub fn window_of<T>(items: Vec<T>, window: Window) -> Vec<T> {
    let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(window.limit).unwrap_or(0);
    items.into_iter().skip(offset).take(limit).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: i64,
    /// Size of the whole result set, not of this page.
    pub count: i64,
}

impl<T> Page<T> {
    pub fn num_pages(&self) -> i64 {
        if self.count == 0 {
            1
        } else {
            (self.count + PAGE_SIZE - 1) / PAGE_SIZE
        }
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("Page", 8)?;
        s.serialize_field("items", &self.items)?;
        s.serialize_field("number", &self.number)?;
        s.serialize_field("count", &self.count)?;
        s.serialize_field("num_pages", &self.num_pages())?;
        s.serialize_field("has_next", &self.has_next())?;
        s.serialize_field("has_previous", &self.has_previous())?;
        s.serialize_field("next_number", &self.number.saturating_add(1))?;
        s.serialize_field("previous_number", &(self.number - 1))?;
        s.end()
    }
}

fn posts(store: &dyn Repository, filter: PostFilter, number: i64) -> AppResult<Page<PostView>> {
    let count = store.count_posts(filter)?;
    let items = store.list_posts(filter, Window::for_page(number))?;
    Ok(Page {
        items,
        number,
        count,
    })
}

pub fn home(store: &dyn Repository, number: i64) -> AppResult<Page<PostView>> {
    posts(store, PostFilter::All, number)
}

pub fn group(store: &dyn Repository, slug: &str, number: i64) -> AppResult<(Group, Page<PostView>)> {
    let group = store.find_group_by_slug(slug)?;
    let page = posts(store, PostFilter::Group(group.id), number)?;
    Ok((group, page))
}

#[derive(Debug)]
pub struct ProfileFeed {
    pub author: User,
    /// Whether the viewer follows `author`; false for anonymous viewers.
    pub following: bool,
    pub page: Page<PostView>,
}

pub fn profile(
    store: &dyn Repository,
    username: &str,
    viewer: Option<&User>,
    number: i64,
) -> AppResult<ProfileFeed> {
    let author = store.find_user_by_username(username)?;
    let following = match viewer {
        Some(viewer) => store.is_following(viewer.id, author.id)?,
        None => false,
    };
    let page = posts(store, PostFilter::Author(author.id), number)?;
    Ok(ProfileFeed {
        author,
        following,
        page,
    })
}

pub fn follow(store: &dyn Repository, viewer: &User, number: i64) -> AppResult<Page<PostView>> {
    posts(store, PostFilter::FollowedBy(viewer.id), number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;
    use crate::group::NewGroup;
    use crate::post::NewPost;
    use crate::types::AppError;
    use crate::users::models::NewUser;
    use rstest::rstest;

    #[rstest]
    #[case(None, 1)]
    #[case(Some(0), 1)]
    #[case(Some(-4), 1)]
    #[case(Some(1), 1)]
    #[case(Some(7), 7)]
    fn page_numbers_default_to_first(#[case] raw: Option<i64>, #[case] expected: i64) {
        assert_eq!(page_number(raw), expected);
    }

    #[rstest]
    #[case(1, (0..10).collect())]
    #[case(2, (10..13).collect())]
    #[case(3, Vec::new())]
    #[case(i64::MAX, Vec::new())]
    fn windows_are_clamped(#[case] number: i64, #[case] expected: Vec<i64>) {
        let items: Vec<i64> = (0..13).collect();
        assert_eq!(window_of(items, Window::for_page(number)), expected);
    }

    #[test]
    fn last_possible_page_serializes() {
        let page = Page::<()> {
            items: Vec::new(),
            number: i64::MAX,
            count: 3,
        };
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["next_number"], i64::MAX);
        assert_eq!(value["has_next"], false);
        assert_eq!(value["has_previous"], true);
    }

    #[test]
    fn page_counts() {
        let page = Page::<()> {
            items: Vec::new(),
            number: 2,
            count: 21,
        };
        assert_eq!(page.num_pages(), 3);
        assert!(page.has_next());
        assert!(page.has_previous());

        let empty = Page::<()> {
            items: Vec::new(),
            number: 1,
            count: 0,
        };
        assert_eq!(empty.num_pages(), 1);
        assert!(!empty.has_next());
        assert!(!empty.has_previous());
    }

    fn seeded() -> (MemoryRepository, User, User, Group) {
        let store = MemoryRepository::new();
        let leo = store
            .create_user(&NewUser::with_password_hash("leo", "hash"))
            .unwrap();
        let anna = store
            .create_user(&NewUser::with_password_hash("anna", "hash"))
            .unwrap();
        let group = store.create_group(&NewGroup::new("Novels", "")).unwrap();
        for n in 0..13 {
            store
                .create_post(&NewPost {
                    text: format!("leo {}", n),
                    author_id: leo.id,
                    group_id: Some(group.id),
                    image: None,
                })
                .unwrap();
        }
        store
            .create_post(&NewPost {
                text: String::from("anna 0"),
                author_id: anna.id,
                group_id: None,
                image: None,
            })
            .unwrap();
        (store, leo, anna, group)
    }

    #[test]
    fn home_feed_pages_newest_first() {
        let (store, ..) = seeded();

        let first = home(&store, 1).unwrap();
        assert_eq!(first.count, 14);
        assert_eq!(first.items.len(), 10);
        assert_eq!(first.items[0].post.text, "anna 0");
        assert_eq!(first.items[1].post.text, "leo 12");
        for pair in first.items.windows(2) {
            assert!((pair[0].post.created, pair[0].post.id) > (pair[1].post.created, pair[1].post.id));
        }

        let second = home(&store, 2).unwrap();
        assert_eq!(second.items.len(), 4);
        assert!(home(&store, 3).unwrap().items.is_empty());
    }

    #[test]
    fn group_feed_requires_known_slug() {
        let (store, _, _, novels) = seeded();
        let (found, page) = group(&store, &novels.slug, 1).unwrap();
        assert_eq!(found.id, novels.id);
        assert_eq!(page.count, 13);

        assert!(matches!(group(&store, "missing", 1), Err(AppError::NotFound)));
    }

    #[test]
    fn profile_feed_reports_following() {
        let (store, leo, anna, _) = seeded();

        let anonymous = profile(&store, "leo", None, 1).unwrap();
        assert!(!anonymous.following);
        assert_eq!(anonymous.page.count, 13);

        store.create_follow(anna.id, leo.id).unwrap();
        let followed = profile(&store, "leo", Some(&anna), 1).unwrap();
        assert!(followed.following);

        assert!(matches!(
            profile(&store, "nobody", Some(&anna), 1),
            Err(AppError::NotFound)
        ));
    }

    #[test]
    fn follow_feed_holds_followed_authors_only() {
        let (store, leo, anna, _) = seeded();
        assert_eq!(follow(&store, &anna, 1).unwrap().count, 0);

        store.create_follow(anna.id, leo.id).unwrap();
        let page = follow(&store, &anna, 1).unwrap();
        assert_eq!(page.count, 13);
        assert!(page.items.iter().all(|view| view.author.id == leo.id));

        assert_eq!(follow(&store, &leo, 1).unwrap().count, 0);
    }
}
