//! Who may do what. Anonymous viewers are `None`.
//!
//! Handlers run these after resolving the current user and before touching
//! the store; a refusal becomes `AppError::Forbidden`, which redirects to a
//! safe page instead of reporting an error.

use crate::post::Post;
use crate::types::{AppError, AppResult};
use crate::users::models::User;

pub fn can_edit_post(user: Option<&User>, post: &Post) -> bool {
    match user {
        Some(user) => user.id == post.author_id,
        None => false,
    }
}

pub fn can_create_post(user: Option<&User>) -> bool {
    user.is_some()
}

pub fn can_comment(user: Option<&User>) -> bool {
    user.is_some()
}

pub fn can_follow(user: Option<&User>, target: &User) -> bool {
    match user {
        Some(user) => user.id != target.id,
        None => false,
    }
}

pub fn can_view_follow_feed(user: Option<&User>) -> bool {
    user.is_some()
}

/// Declines the action with a redirect to `fallback` unless `allowed`.
pub fn ensure<F>(allowed: bool, fallback: F) -> AppResult<()>
where
    F: FnOnce() -> String,
{
    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(fallback()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(id: i32) -> User {
        User {
            id,
            username: format!("user{}", id),
            password: String::new(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    fn post_by(author_id: i32) -> Post {
        Post {
            id: 1,
            text: String::from("text"),
            author_id,
            group_id: None,
            image: None,
            created: Utc::now(),
        }
    }

    #[test]
    fn only_the_author_edits() {
        let post = post_by(1);
        assert!(can_edit_post(Some(&user(1)), &post));
        assert!(!can_edit_post(Some(&user(2)), &post));
        assert!(!can_edit_post(None, &post));
    }

    #[test]
    fn anonymous_viewers_cannot_write() {
        assert!(!can_create_post(None));
        assert!(!can_comment(None));
        assert!(!can_view_follow_feed(None));
        assert!(can_create_post(Some(&user(1))));
        assert!(can_comment(Some(&user(1))));
        assert!(can_view_follow_feed(Some(&user(1))));
    }

    #[test]
    fn nobody_follows_themself() {
        assert!(can_follow(Some(&user(1)), &user(2)));
        assert!(!can_follow(Some(&user(1)), &user(1)));
        assert!(!can_follow(None, &user(1)));
    }

    #[test]
    fn ensure_redirects_to_fallback() {
        assert!(ensure(true, || String::from("/x/")).is_ok());
        match ensure(false, || String::from("/posts/1/")) {
            Err(AppError::Forbidden(target)) => assert_eq!(target, "/posts/1/"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
