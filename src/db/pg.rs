use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::ConnectionManager;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::{delete, insert_into, select, update};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::info;

use super::schema::{comments, follows, groups, posts, users};
use super::{Error, ErrorKind, PostFilter, Repository, Result};
use crate::comment::{Comment, CommentView, NewComment};
use crate::feed::Window;
use crate::group::{Group, NewGroup};
use crate::post::{NewPost, Post, PostChanges, PostView};
use crate::users::models::{NewUser, User};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

// An alias to the type for a pool of Diesel Postgres connections.
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

type Connection = r2d2::PooledConnection<ConnectionManager<PgConnection>>;

macro_rules! filter_posts {
    ($query:ident, $filter:expr) => {
        match $filter {
            PostFilter::All => $query,
            PostFilter::Group(group_id) => $query.filter(posts::group_id.eq(group_id)),
            PostFilter::Author(author_id) => $query.filter(posts::author_id.eq(author_id)),
            PostFilter::FollowedBy(user_id) => $query.filter(
                posts::author_id.eq_any(
                    follows::table
                        .filter(follows::user_id.eq(user_id))
                        .select(follows::author_id),
                ),
            ),
        }
    };
}

pub struct PgRepository {
    pool: Pool,
}

impl PgRepository {
    pub fn connect(database_url: &str, pool_size: u32) -> Result<PgRepository> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = Pool::builder().max_size(pool_size).build(manager)?;
        Ok(PgRepository { pool })
    }

    pub fn run_migrations(&self) -> Result<()> {
        let mut pooled = self.conn()?;
        let conn: &mut PgConnection = &mut pooled;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| ErrorKind::Migration(e.to_string()))?;
        info!(count = applied.len(), "applied pending migrations");
        Ok(())
    }

    fn conn(&self) -> Result<Connection> {
        Ok(self.pool.get()?)
    }
}

fn missing(entity: &'static str) -> impl Fn(DieselError) -> Error {
    move |err| match err {
        DieselError::NotFound => ErrorKind::NotFound(entity).into(),
        other => write_error(other),
    }
}

/// Maps constraint violations onto the store's error kinds.
fn write_error(err: DieselError) -> Error {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
            let field = match info.constraint_name() {
                Some("groups_title_key") => "title",
                Some("groups_slug_key") => "slug",
                Some("users_username_key") => "username",
                _ => "record",
            };
            ErrorKind::Conflict(field).into()
        }
        DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, _) => {
            ErrorKind::Conflict("follow").into()
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, info) => {
            let entity = match info.constraint_name() {
                Some("posts_group_id_fkey") => "group",
                Some("comments_post_id_fkey") => "post",
                _ => "user",
            };
            ErrorKind::NotFound(entity).into()
        }
        other => other.into(),
    }
}

fn post_view(row: (Post, User, Option<Group>)) -> PostView {
    let (post, author, group) = row;
    PostView {
        post,
        author,
        group,
    }
}

impl Repository for PgRepository {
    fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut conn = self.conn()?;
        insert_into(users::table)
            .values(user)
            .get_result::<User>(&mut conn)
            .map_err(write_error)
    }

    fn find_user(&self, id: i32) -> Result<User> {
        let mut conn = self.conn()?;
        users::table
            .find(id)
            .first::<User>(&mut conn)
            .map_err(missing("user"))
    }

    fn find_user_by_username(&self, username: &str) -> Result<User> {
        let mut conn = self.conn()?;
        users::table
            .filter(users::username.eq(username))
            .first::<User>(&mut conn)
            .map_err(missing("user"))
    }

    fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let mut conn = self.conn()?;
        insert_into(groups::table)
            .values(group)
            .get_result::<Group>(&mut conn)
            .map_err(write_error)
    }

    fn find_group(&self, id: i32) -> Result<Group> {
        let mut conn = self.conn()?;
        groups::table
            .find(id)
            .first::<Group>(&mut conn)
            .map_err(missing("group"))
    }

    fn find_group_by_slug(&self, slug: &str) -> Result<Group> {
        let mut conn = self.conn()?;
        groups::table
            .filter(groups::slug.eq(slug))
            .first::<Group>(&mut conn)
            .map_err(missing("group"))
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let mut conn = self.conn()?;
        Ok(groups::table
            .order(groups::title.asc())
            .load::<Group>(&mut conn)?)
    }

    fn delete_group(&self, id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        let deleted = delete(groups::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            bail!(ErrorKind::NotFound("group"));
        }
        Ok(())
    }

    fn create_post(&self, post: &NewPost) -> Result<Post> {
        let mut conn = self.conn()?;
        insert_into(posts::table)
            .values(post)
            .get_result::<Post>(&mut conn)
            .map_err(write_error)
    }

    fn find_post(&self, id: i32) -> Result<PostView> {
        let mut conn = self.conn()?;
        posts::table
            .inner_join(users::table)
            .left_join(groups::table)
            .filter(posts::id.eq(id))
            .first::<(Post, User, Option<Group>)>(&mut conn)
            .map(post_view)
            .map_err(missing("post"))
    }

    fn update_post(&self, id: i32, changes: &PostChanges) -> Result<Post> {
        let mut conn = self.conn()?;
        update(posts::table.find(id))
            .set(changes)
            .get_result::<Post>(&mut conn)
            .map_err(missing("post"))
    }

    fn delete_post(&self, id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        let deleted = delete(posts::table.find(id)).execute(&mut conn)?;
        if deleted == 0 {
            bail!(ErrorKind::NotFound("post"));
        }
        Ok(())
    }

    fn count_posts(&self, filter: PostFilter) -> Result<i64> {
        let mut conn = self.conn()?;
        let query = posts::table.into_boxed();
        let query = filter_posts!(query, filter);
        Ok(query.count().get_result::<i64>(&mut conn)?)
    }

    fn list_posts(&self, filter: PostFilter, window: Window) -> Result<Vec<PostView>> {
        let mut conn = self.conn()?;
        let query = posts::table
            .inner_join(users::table)
            .left_join(groups::table)
            .into_boxed();
        let query = filter_posts!(query, filter);
        let rows = query
            .order((posts::created.desc(), posts::id.desc()))
            .offset(window.offset)
            .limit(window.limit)
            .load::<(Post, User, Option<Group>)>(&mut conn)?;
        Ok(rows.into_iter().map(post_view).collect())
    }

    fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let mut conn = self.conn()?;
        insert_into(comments::table)
            .values(comment)
            .get_result::<Comment>(&mut conn)
            .map_err(write_error)
    }

    fn list_comments(&self, post_id: i32) -> Result<Vec<CommentView>> {
        let mut conn = self.conn()?;
        let post = posts::table
            .find(post_id)
            .first::<Post>(&mut conn)
            .map_err(missing("post"))?;
        let rows = Comment::belonging_to(&post)
            .inner_join(users::table)
            .order((comments::created.desc(), comments::id.desc()))
            .load::<(Comment, User)>(&mut conn)?;
        Ok(rows.into_iter().map(CommentView::from).collect())
    }

    fn is_following(&self, user_id: i32, author_id: i32) -> Result<bool> {
        let mut conn = self.conn()?;
        let query = select(exists(
            follows::table
                .filter(follows::user_id.eq(user_id))
                .filter(follows::author_id.eq(author_id)),
        ));
        Ok(query.get_result::<bool>(&mut conn)?)
    }

    fn create_follow(&self, user_id: i32, author_id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        insert_into(follows::table)
            .values((
                follows::user_id.eq(user_id),
                follows::author_id.eq(author_id),
            ))
            .on_conflict((follows::user_id, follows::author_id))
            .do_nothing()
            .execute(&mut conn)
            .map_err(write_error)?;
        Ok(())
    }

    fn delete_follow(&self, user_id: i32, author_id: i32) -> Result<()> {
        let mut conn = self.conn()?;
        delete(
            follows::table
                .filter(follows::user_id.eq(user_id))
                .filter(follows::author_id.eq(author_id)),
        )
        .execute(&mut conn)?;
        Ok(())
    }
}
