use diesel::result::Error as DieselError;
use std::sync::Arc;
use tracing::warn;

use crate::comment::{Comment, CommentView, NewComment};
use crate::config::Config;
use crate::feed::Window;
use crate::group::{Group, NewGroup};
use crate::post::{NewPost, Post, PostChanges, PostView};
use crate::users::models::{NewUser, User};

pub mod memory;
pub mod pg;
pub mod schema;

pub use self::memory::MemoryRepository;
pub use self::pg::PgRepository;

error_chain! {
    foreign_links {
        R2D2(r2d2::Error);
        Diesel(DieselError);
    }

    errors {
        NotFound(entity: &'static str) {
            description("entity not found")
            display("{} not found", entity)
        }
        Conflict(field: &'static str) {
            description("uniqueness violation")
            display("{} already exists", field)
        }
        Migration(message: String) {
            description("migration failed")
            display("migration failed: {}", message)
        }
    }
}

/// Which posts a feed selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    All,
    Group(i32),
    Author(i32),
    /// Posts whose author is followed by the given user.
    FollowedBy(i32),
}

/// Storage seam every handler goes through.
///
/// Lookups of a missing row fail with `ErrorKind::NotFound`; writes that break
/// a uniqueness rule fail with `ErrorKind::Conflict`. Post listings are ordered
/// newest first, ties broken by the higher id.
pub trait Repository: Send + Sync {
    fn create_user(&self, user: &NewUser) -> Result<User>;
    fn find_user(&self, id: i32) -> Result<User>;
    fn find_user_by_username(&self, username: &str) -> Result<User>;

    fn create_group(&self, group: &NewGroup) -> Result<Group>;
    fn find_group(&self, id: i32) -> Result<Group>;
    fn find_group_by_slug(&self, slug: &str) -> Result<Group>;
    fn list_groups(&self) -> Result<Vec<Group>>;
    /// Posts of the group stay, with their group cleared.
    fn delete_group(&self, id: i32) -> Result<()>;

    fn create_post(&self, post: &NewPost) -> Result<Post>;
    fn find_post(&self, id: i32) -> Result<PostView>;
    fn update_post(&self, id: i32, changes: &PostChanges) -> Result<Post>;
    /// Comments of the post go with it.
    fn delete_post(&self, id: i32) -> Result<()>;
    fn count_posts(&self, filter: PostFilter) -> Result<i64>;
    fn list_posts(&self, filter: PostFilter, window: Window) -> Result<Vec<PostView>>;

    fn create_comment(&self, comment: &NewComment) -> Result<Comment>;
    fn list_comments(&self, post_id: i32) -> Result<Vec<CommentView>>;

    fn is_following(&self, user_id: i32, author_id: i32) -> Result<bool>;
    /// Does nothing when the edge already exists.
    fn create_follow(&self, user_id: i32, author_id: i32) -> Result<()>;
    fn delete_follow(&self, user_id: i32, author_id: i32) -> Result<()>;
}

pub fn connect(config: &Config) -> Result<Arc<dyn Repository>> {
    if config.uses_memory_store() {
        warn!("using the in-memory store, nothing will be persisted");
        return Ok(Arc::new(MemoryRepository::new()));
    }
    let repository = PgRepository::connect(&config.database_url, config.pool_size)?;
    repository.run_migrations()?;
    Ok(Arc::new(repository))
}

pub fn is_not_found(err: &Error) -> bool {
    match err.kind() {
        ErrorKind::NotFound(_) => true,
        _ => false,
    }
}
