use chrono::Utc;
use parking_lot::Mutex;
use std::cmp::Reverse;

use super::{ErrorKind, PostFilter, Repository, Result};
use crate::comment::{Comment, CommentView, NewComment};
use crate::feed::{self, Window};
use crate::group::{Group, NewGroup};
use crate::post::{NewPost, Post, PostChanges, PostView};
use crate::profile::Follow;
use crate::users::models::{NewUser, User};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
    user_seq: i32,
    group_seq: i32,
    post_seq: i32,
    comment_seq: i32,
    follow_seq: i32,
}

fn next(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

impl Tables {
    fn user(&self, id: i32) -> Result<&User> {
        match self.users.iter().find(|u| u.id == id) {
            Some(user) => Ok(user),
            None => bail!(ErrorKind::NotFound("user")),
        }
    }

    fn group(&self, id: i32) -> Result<&Group> {
        match self.groups.iter().find(|g| g.id == id) {
            Some(group) => Ok(group),
            None => bail!(ErrorKind::NotFound("group")),
        }
    }

    fn post(&self, id: i32) -> Result<&Post> {
        match self.posts.iter().find(|p| p.id == id) {
            Some(post) => Ok(post),
            None => bail!(ErrorKind::NotFound("post")),
        }
    }

    fn follows(&self, user_id: i32, author_id: i32) -> bool {
        self.follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id)
    }

    fn matches(&self, filter: PostFilter, post: &Post) -> bool {
        match filter {
            PostFilter::All => true,
            PostFilter::Group(group_id) => post.group_id == Some(group_id),
            PostFilter::Author(author_id) => post.author_id == author_id,
            PostFilter::FollowedBy(user_id) => self.follows(user_id, post.author_id),
        }
    }

    fn view(&self, post: &Post) -> Result<PostView> {
        let author = self.user(post.author_id)?.clone();
        let group = match post.group_id {
            Some(group_id) => Some(self.group(group_id)?.clone()),
            None => None,
        };
        Ok(PostView {
            post: post.clone(),
            author,
            group,
        })
    }

    fn selected(&self, filter: PostFilter) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .posts
            .iter()
            .filter(|post| self.matches(filter, post))
            .collect();
        posts.sort_by_key(|post| Reverse((post.created, post.id)));
        posts
    }
}

/// Keeps every table in process memory behind one lock.
///
/// Mirrors the relational store's constraints: unique group title/slug and
/// username, set-null on group deletion, cascades on post and user removal,
/// one follow edge per pair and no self-follow.
#[derive(Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    pub fn new() -> MemoryRepository {
        MemoryRepository::default()
    }
}

impl Repository for MemoryRepository {
    fn create_user(&self, user: &NewUser) -> Result<User> {
        let mut tables = self.tables.lock();
        if tables.users.iter().any(|u| u.username == user.username) {
            bail!(ErrorKind::Conflict("username"));
        }
        let created = User {
            id: next(&mut tables.user_seq),
            username: user.username.clone(),
            password: user.password.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    fn find_user(&self, id: i32) -> Result<User> {
        self.tables.lock().user(id).cloned()
    }

    fn find_user_by_username(&self, username: &str) -> Result<User> {
        let tables = self.tables.lock();
        match tables.users.iter().find(|u| u.username == username) {
            Some(user) => Ok(user.clone()),
            None => bail!(ErrorKind::NotFound("user")),
        }
    }

    fn create_group(&self, group: &NewGroup) -> Result<Group> {
        let mut tables = self.tables.lock();
        if tables.groups.iter().any(|g| g.title == group.title) {
            bail!(ErrorKind::Conflict("title"));
        }
        if tables.groups.iter().any(|g| g.slug == group.slug) {
            bail!(ErrorKind::Conflict("slug"));
        }
        let created = Group {
            id: next(&mut tables.group_seq),
            title: group.title.clone(),
            slug: group.slug.clone(),
            description: group.description.clone(),
        };
        tables.groups.push(created.clone());
        Ok(created)
    }

    fn find_group(&self, id: i32) -> Result<Group> {
        self.tables.lock().group(id).cloned()
    }

    fn find_group_by_slug(&self, slug: &str) -> Result<Group> {
        let tables = self.tables.lock();
        match tables.groups.iter().find(|g| g.slug == slug) {
            Some(group) => Ok(group.clone()),
            None => bail!(ErrorKind::NotFound("group")),
        }
    }

    fn list_groups(&self) -> Result<Vec<Group>> {
        let mut groups = self.tables.lock().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    fn delete_group(&self, id: i32) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.group(id)?;
        tables.groups.retain(|g| g.id != id);
        for post in tables.posts.iter_mut().filter(|p| p.group_id == Some(id)) {
            post.group_id = None;
        }
        Ok(())
    }

    fn create_post(&self, post: &NewPost) -> Result<Post> {
        let mut tables = self.tables.lock();
        tables.user(post.author_id)?;
        if let Some(group_id) = post.group_id {
            tables.group(group_id)?;
        }
        let created = Post {
            id: next(&mut tables.post_seq),
            text: post.text.clone(),
            author_id: post.author_id,
            group_id: post.group_id,
            image: post.image.clone(),
            created: Utc::now(),
        };
        tables.posts.push(created.clone());
        Ok(created)
    }

    fn find_post(&self, id: i32) -> Result<PostView> {
        let tables = self.tables.lock();
        let post = tables.post(id)?;
        tables.view(post)
    }

    fn update_post(&self, id: i32, changes: &PostChanges) -> Result<Post> {
        let mut tables = self.tables.lock();
        if let Some(group_id) = changes.group_id {
            tables.group(group_id)?;
        }
        match tables.posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.text = changes.text.clone();
                post.group_id = changes.group_id;
                post.image = changes.image.clone();
                Ok(post.clone())
            }
            None => bail!(ErrorKind::NotFound("post")),
        }
    }

    fn delete_post(&self, id: i32) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.post(id)?;
        tables.posts.retain(|p| p.id != id);
        tables.comments.retain(|c| c.post_id != id);
        Ok(())
    }

    fn count_posts(&self, filter: PostFilter) -> Result<i64> {
        let tables = self.tables.lock();
        Ok(tables.selected(filter).len() as i64)
    }

    fn list_posts(&self, filter: PostFilter, window: Window) -> Result<Vec<PostView>> {
        let tables = self.tables.lock();
        let selected = tables.selected(filter);
        feed::window_of(selected, window)
            .into_iter()
            .map(|post| tables.view(post))
            .collect()
    }

    fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        let mut tables = self.tables.lock();
        tables.post(comment.post_id)?;
        tables.user(comment.author_id)?;
        let created = Comment {
            id: next(&mut tables.comment_seq),
            post_id: comment.post_id,
            author_id: comment.author_id,
            text: comment.text.clone(),
            created: Utc::now(),
        };
        tables.comments.push(created.clone());
        Ok(created)
    }

    fn list_comments(&self, post_id: i32) -> Result<Vec<CommentView>> {
        let tables = self.tables.lock();
        tables.post(post_id)?;
        let mut comments: Vec<&Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .collect();
        comments.sort_by_key(|c| Reverse((c.created, c.id)));
        comments
            .into_iter()
            .map(|c| -> Result<CommentView> {
                let author = tables.user(c.author_id)?.clone();
                Ok(CommentView::from((c.clone(), author)))
            })
            .collect()
    }

    fn is_following(&self, user_id: i32, author_id: i32) -> Result<bool> {
        Ok(self.tables.lock().follows(user_id, author_id))
    }

    fn create_follow(&self, user_id: i32, author_id: i32) -> Result<()> {
        let mut tables = self.tables.lock();
        if user_id == author_id {
            bail!(ErrorKind::Conflict("follow"));
        }
        tables.user(user_id)?;
        tables.user(author_id)?;
        if !tables.follows(user_id, author_id) {
            let id = next(&mut tables.follow_seq);
            tables.follows.push(Follow {
                id,
                user_id,
                author_id,
            });
        }
        Ok(())
    }

    fn delete_follow(&self, user_id: i32, author_id: i32) -> Result<()> {
        let mut tables = self.tables.lock();
        tables
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(())
    }
}
