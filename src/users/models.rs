use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use hmac::{Hmac, Mac};
use jwt::{Header, RegisteredClaims, SignWithKey, Token, VerifyWithKey};
use password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use pbkdf2::{Params, Pbkdf2};
use rand::rngs::OsRng;
use sha2::Sha256;
use std::borrow::Cow;
use tracing::{debug, error};

use crate::db::schema::users;
use crate::db::Repository;
use crate::profile::Profile;
use crate::types::{AppError, AppResult};

const PASSWORD_ROUNDS: u32 = 10_000;

/// How long a session token stays valid after login.
pub const SESSION_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

pub fn make_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let params = Params {
        rounds: PASSWORD_ROUNDS,
        output_length: 32,
    };
    Pbkdf2
        .hash_password_customized(password.as_bytes(), None, None, params, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            AppError::Internal
        })
}

impl User {
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        match name.trim() {
            "" => self.username.clone(),
            trimmed => trimmed.to_string(),
        }
    }

    pub fn profile(&self) -> Profile<'static> {
        Profile {
            username: Cow::Owned(self.username.clone()),
            full_name: Cow::Owned(self.full_name()),
        }
    }

    pub fn verify_password(&self, password_to_verify: &str) -> bool {
        match PasswordHash::new(&self.password) {
            Ok(hash) => Pbkdf2
                .verify_password(password_to_verify.as_bytes(), &hash)
                .is_ok(),
            Err(_) => false,
        }
    }

    /// Changing the password hash invalidates every token issued before.
    fn signing_key(&self, secret: &str) -> AppResult<Hmac<Sha256>> {
        let material = format!("{}:{}", secret, self.password);
        Hmac::<Sha256>::new_from_slice(material.as_bytes()).map_err(|_| AppError::Internal)
    }

    pub fn token(&self, secret: &str) -> AppResult<String> {
        self.token_expiring(secret, Utc::now() + Duration::days(SESSION_DAYS))
    }

    pub fn token_expiring(&self, secret: &str, expires_at: DateTime<Utc>) -> AppResult<String> {
        let claims = RegisteredClaims {
            issuer: Some(self.username.clone()),
            subject: Some(self.id.to_string()),
            expiration: Some(seconds(expires_at)),
            ..Default::default()
        };
        let key = self.signing_key(secret)?;
        claims.sign_with_key(&key).map_err(|e| {
            error!(error = %e, "token signing failed");
            AppError::Internal
        })
    }

    pub fn load_from_token(
        jwt_token: &str,
        secret: &str,
        store: &dyn Repository,
    ) -> AppResult<User> {
        let unverified: Token<Header, RegisteredClaims, _> =
            Token::parse_unverified(jwt_token).map_err(|_| AppError::Unauthorized)?;
        let user_id = match &unverified.claims().subject {
            Some(sub) => sub.parse::<i32>().map_err(|_| AppError::Unauthorized)?,
            None => return Err(AppError::Unauthorized),
        };

        let user = store.find_user(user_id).map_err(|e| match AppError::from(e) {
            AppError::NotFound => AppError::Unauthorized,
            other => other,
        })?;

        let key = user.signing_key(secret)?;
        let verified: Result<RegisteredClaims, _> = jwt_token.verify_with_key(&key);
        match verified {
            Ok(claims)
                if claims.issuer.as_deref() == Some(user.username.as_str())
                    && claims.expiration.map_or(false, |exp| exp > seconds(Utc::now())) =>
            {
                Ok(user)
            }
            _ => {
                debug!(user_id, "rejected session token");
                Err(AppError::Unauthorized)
            }
        }
    }
}

fn seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl NewUser {
    pub fn new(username: &str, password: &str) -> AppResult<NewUser> {
        Ok(NewUser::with_password_hash(username, &make_password(password)?))
    }

    pub fn with_password_hash(username: &str, hash: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password: hash.to_string(),
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;

    fn stored_user(store: &MemoryRepository, username: &str, password: &str) -> User {
        store
            .create_user(&NewUser::new(username, password).unwrap())
            .unwrap()
    }

    #[test]
    fn password_round_trip() {
        let store = MemoryRepository::new();
        let user = stored_user(&store, "leo", "correct horse");
        assert!(user.verify_password("correct horse"));
        assert!(!user.verify_password("battery staple"));
        assert!(user.password.starts_with("$pbkdf2-sha256$"));
    }

    #[test]
    fn token_resolves_its_user() {
        let store = MemoryRepository::new();
        let user = stored_user(&store, "leo", "correct horse");
        let token = user.token("secret").unwrap();

        let loaded = User::load_from_token(&token, "secret", &store).unwrap();
        assert_eq!(loaded, user);
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let store = MemoryRepository::new();
        let user = stored_user(&store, "leo", "correct horse");
        let token = user.token("secret").unwrap();

        let result = User::load_from_token(&token, "other", &store);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn expired_token_is_rejected() {
        let store = MemoryRepository::new();
        let user = stored_user(&store, "leo", "correct horse");

        let stale = user
            .token_expiring("secret", Utc::now() - Duration::minutes(1))
            .unwrap();
        let result = User::load_from_token(&stale, "secret", &store);
        assert!(matches!(result, Err(AppError::Unauthorized)));

        let fresh = user
            .token_expiring("secret", Utc::now() + Duration::minutes(1))
            .unwrap();
        assert!(User::load_from_token(&fresh, "secret", &store).is_ok());
    }

    #[test]
    fn token_without_expiry_is_rejected() {
        let store = MemoryRepository::new();
        let user = stored_user(&store, "leo", "correct horse");
        let claims = RegisteredClaims {
            issuer: Some(user.username.clone()),
            subject: Some(user.id.to_string()),
            ..Default::default()
        };
        let token = claims
            .sign_with_key(&user.signing_key("secret").unwrap())
            .unwrap();
        let result = User::load_from_token(&token, "secret", &store);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let store = MemoryRepository::new();
        let result = User::load_from_token("not-a-token", "secret", &store);
        assert!(matches!(result, Err(AppError::Unauthorized)));
    }

    #[test]
    fn full_name_falls_back_to_username() {
        let mut user = NewUser::with_password_hash("leo", "hash");
        user.first_name = "Leo".into();
        let store = MemoryRepository::new();
        let named = store.create_user(&user).unwrap();
        assert_eq!(named.full_name(), "Leo");

        let plain = store
            .create_user(&NewUser::with_password_hash("anon", "hash"))
            .unwrap();
        assert_eq!(plain.full_name(), "anon");
    }
}
