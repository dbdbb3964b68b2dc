#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use blogfeed::cache::{ListingCache, ManualClock};
use blogfeed::db::{MemoryRepository, Repository};
use blogfeed::group::{Group, NewGroup};
use blogfeed::post::{NewPost, Post};
use blogfeed::users::models::{NewUser, User};
use blogfeed::users::SESSION_COOKIE;
use blogfeed::App;
use rocket::http::{ContentType, Cookie, Status};
use rocket::local::blocking::{Client, LocalResponse};

pub const SECRET: &str = "test-secret";
pub const PASSWORD: &str = "correct horse";
pub const CACHE_TTL: Duration = Duration::from_secs(20);

pub struct Site {
    pub client: Client,
    pub store: Arc<MemoryRepository>,
    pub clock: Arc<ManualClock>,
}

impl Site {
    pub fn new() -> Site {
        let store = Arc::new(MemoryRepository::new());
        let clock = Arc::new(ManualClock::new());
        let cache = ListingCache::with_clock(CACHE_TTL, clock.clone());
        let app = App::new(store.clone(), cache, SECRET.to_string()).unwrap();
        let client = Client::untracked(blogfeed::build(app)).unwrap();
        Site {
            client,
            store,
            clock,
        }
    }

    pub fn app(&self) -> &App {
        self.client.rocket().state::<App>().unwrap()
    }

    pub fn user(&self, username: &str) -> User {
        self.store
            .create_user(&NewUser::new(username, PASSWORD).unwrap())
            .unwrap()
    }

    pub fn group(&self, title: &str) -> Group {
        self.store
            .create_group(&NewGroup::new(title, "group description"))
            .unwrap()
    }

    pub fn post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.store
            .create_post(&NewPost {
                text: text.to_string(),
                author_id: author.id,
                group_id: group.map(|g| g.id),
                image: None,
            })
            .unwrap()
    }

    pub fn session(&self, user: &User) -> Cookie<'static> {
        Cookie::new(SESSION_COOKIE, user.token(SECRET).unwrap())
    }

    pub fn get(&self, uri: &str, user: Option<&User>) -> LocalResponse<'_> {
        let mut request = self.client.get(uri.to_string());
        if let Some(user) = user {
            request = request.cookie(self.session(user));
        }
        request.dispatch()
    }

    pub fn post_form(&self, uri: &str, body: &str, user: Option<&User>) -> LocalResponse<'_> {
        let mut request = self
            .client
            .post(uri.to_string())
            .header(ContentType::Form)
            .body(body.to_string());
        if let Some(user) = user {
            request = request.cookie(self.session(user));
        }
        request.dispatch()
    }

    pub fn page(&self, uri: &str, user: Option<&User>) -> String {
        let response = self.get(uri, user);
        assert_eq!(response.status(), Status::Ok, "GET {}", uri);
        response.into_string().unwrap()
    }
}

pub fn location(response: &LocalResponse<'_>) -> Option<String> {
    response.headers().get_one("Location").map(str::to_string)
}

pub fn assert_redirect(response: LocalResponse<'_>, target: &str) {
    assert_eq!(response.status(), Status::SeeOther);
    assert_eq!(location(&response).as_deref(), Some(target));
}
