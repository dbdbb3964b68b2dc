use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::response::content::RawHtml;
use rocket::response::Redirect;
use rocket::State;
use serde_json::json;
use tracing::{info, warn};

use crate::db::Repository;
use crate::state::App;
use crate::types::{AppError, AppResult, Reply, Validate, ValidationError};
use crate::utils::{context, is_local_path};

pub mod models;
mod utils;

use self::models::{NewUser, User};
use self::utils::*;

pub const SESSION_COOKIE: &str = "session";

pub type CurrentUser = Result<User, AppError>;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for User {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let app = match request.rocket().state::<App>() {
            Some(app) => app,
            None => return Outcome::Error((Status::InternalServerError, AppError::Internal)),
        };
        let token = match request.cookies().get(SESSION_COOKIE) {
            Some(cookie) => cookie.value().to_owned(),
            None => return Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
        };
        match User::load_from_token(&token, app.secret_key(), app.store()) {
            Ok(user) => Outcome::Success(user),
            Err(AppError::Unauthorized) => {
                Outcome::Error((Status::Unauthorized, AppError::Unauthorized))
            }
            Err(e) => Outcome::Error((Status::InternalServerError, e)),
        }
    }
}

fn start_session(cookies: &CookieJar<'_>, user: &User, secret: &str) -> AppResult<()> {
    let token = user.token(secret)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    cookies.add(cookie);
    Ok(())
}

#[derive(Debug, Clone, Default, FromForm)]
pub struct SignupForm {
    first_name: Option<String>,
    last_name: Option<String>,
    username: Option<String>,
    email: Option<String>,
    password1: Option<String>,
    password2: Option<String>,
}

impl Validate for SignupForm {
    type Output = NewUser;

    fn validate(self, store: &dyn Repository) -> AppResult<NewUser> {
        let mut errors = ValidationError::default();
        let username = self.username.unwrap_or_default().trim().to_string();
        let email = self.email.unwrap_or_default().trim().to_string();
        let password1 = self.password1.unwrap_or_default();
        let password2 = self.password2.unwrap_or_default();

        match validate_username(&username, store) {
            Ok(_) => {}
            Err(AppError::Validation(e)) => errors.merge(e),
            Err(other) => return Err(other),
        }
        if !email.is_empty() {
            if let Err(e) = validate_email_re(&email) {
                errors.merge(e);
            }
        }
        if let Err(e) = validate_password(&password1, &password2) {
            errors.merge(e);
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        let mut user = NewUser::new(&username, &password1)?;
        user.email = email;
        user.first_name = self.first_name.unwrap_or_default().trim().to_string();
        user.last_name = self.last_name.unwrap_or_default().trim().to_string();
        Ok(user)
    }
}

fn render_signup(
    app: &App,
    form: &SignupForm,
    errors: &ValidationError,
) -> AppResult<RawHtml<String>> {
    let ctx = json!({
        "form": {
            "first_name": form.first_name,
            "last_name": form.last_name,
            "username": form.username,
            "email": form.email,
        },
        "errors": errors,
    });
    app.render("users/signup.html", context(None, ctx))
}

#[get("/signup")]
pub fn signup_form(app: &State<App>) -> AppResult<RawHtml<String>> {
    render_signup(app, &SignupForm::default(), &ValidationError::default())
}

#[post("/signup", data = "<form>")]
pub fn signup(app: &State<App>, cookies: &CookieJar<'_>, form: Form<SignupForm>) -> AppResult<Reply> {
    let form = form.into_inner();
    let new_user = match form.clone().validate(app.store()) {
        Ok(new_user) => new_user,
        Err(AppError::Validation(errors)) => {
            return Ok(render_signup(app, &form, &errors)?.into());
        }
        Err(e) => return Err(e),
    };

    let user = match app.store().create_user(&new_user) {
        Ok(user) => user,
        Err(e) => match AppError::from(e) {
            AppError::Conflict(field) => {
                let errors = ValidationError::from(field, "A user with that username already exists.");
                return Ok(render_signup(app, &form, &errors)?.into());
            }
            other => return Err(other),
        },
    };
    info!(user_id = user.id, username = %user.username, "user signed up");

    start_session(cookies, &user, app.secret_key())?;
    Ok(Redirect::to("/").into())
}

#[derive(Debug, Clone, Default, FromForm)]
pub struct LoginForm {
    username: Option<String>,
    password: Option<String>,
    next: Option<String>,
}

fn render_login(
    app: &App,
    username: Option<&str>,
    next: Option<&str>,
    errors: &ValidationError,
) -> AppResult<RawHtml<String>> {
    let ctx = json!({
        "form": { "username": username },
        "next": next,
        "errors": errors,
    });
    app.render("users/login.html", context(None, ctx))
}

#[get("/login?<next>")]
pub fn login_form(app: &State<App>, next: Option<&str>) -> AppResult<RawHtml<String>> {
    render_login(app, None, next, &ValidationError::default())
}

#[post("/login", data = "<form>")]
pub fn login(app: &State<App>, cookies: &CookieJar<'_>, form: Form<LoginForm>) -> AppResult<Reply> {
    let form = form.into_inner();
    let username = form.username.as_deref().unwrap_or_default().trim();
    let password = form.password.as_deref().unwrap_or_default();

    let user = match app.store().find_user_by_username(username) {
        Ok(user) if user.verify_password(password) => Some(user),
        Ok(_) => None,
        Err(e) => match AppError::from(e) {
            AppError::NotFound => None,
            other => return Err(other),
        },
    };

    let user = match user {
        Some(user) => user,
        None => {
            warn!(username, "failed login");
            let errors = ValidationError::from(
                "__all__",
                "Please enter a correct username and password.",
            );
            return Ok(render_login(app, Some(username), form.next.as_deref(), &errors)?.into());
        }
    };

    start_session(cookies, &user, app.secret_key())?;
    info!(user_id = user.id, "user logged in");

    let target = match form.next {
        Some(next) if is_local_path(&next) => next,
        _ => String::from("/"),
    };
    Ok(Redirect::to(target).into())
}

#[get("/logout")]
pub fn logout(app: &State<App>, cookies: &CookieJar<'_>) -> AppResult<RawHtml<String>> {
    cookies.remove(Cookie::build(SESSION_COOKIE).path("/"));
    app.render("users/logged_out.html", context(None, json!({})))
}
