use dotenv::dotenv;
use std::env;
use std::time::Duration;

error_chain! {
    foreign_links {
        ParseInt(::std::num::ParseIntError);
    }

    errors {
        Missing(name: &'static str) {
            description("missing setting")
            display("{} must be set", name)
        }
    }
}

/// Database url that selects the in-memory store.
pub const MEMORY_DATABASE_URL: &str = "memory";

const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_INDEX_CACHE_SECONDS: u64 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub secret_key: String,
    pub pool_size: u32,
    pub index_cache_ttl: Duration,
}

impl Config {
    /// Reads settings from the process environment, after loading `.env`.
    pub fn from_env() -> Result<Config> {
        dotenv().ok();
        Config::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "DATABASE_URL")?;
        let secret_key = required(&lookup, "SECRET_KEY")?;

        let pool_size = match lookup("DATABASE_POOL_SIZE") {
            Some(raw) => raw.trim().parse::<u32>()?,
            None => DEFAULT_POOL_SIZE,
        };
        let cache_seconds = match lookup("INDEX_CACHE_SECONDS") {
            Some(raw) => raw.trim().parse::<u64>()?,
            None => DEFAULT_INDEX_CACHE_SECONDS,
        };

        Ok(Config {
            database_url,
            secret_key,
            pool_size,
            index_cache_ttl: Duration::from_secs(cache_seconds),
        })
    }

    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}

fn required<F>(lookup: &F, name: &'static str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => bail!(ErrorKind::Missing(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_settings_are_absent() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/blog"),
            ("SECRET_KEY", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(config.pool_size, 10);
        assert_eq!(config.index_cache_ttl, Duration::from_secs(20));
        assert!(!config.uses_memory_store());
    }

    #[test]
    fn missing_secret_is_rejected() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "memory")])).unwrap_err();
        match err.kind() {
            ErrorKind::Missing(name) => assert_eq!(*name, "SECRET_KEY"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "memory"),
            ("SECRET_KEY", "s3cret"),
            ("INDEX_CACHE_SECONDS", "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn memory_url_selects_memory_store() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "memory"),
            ("SECRET_KEY", "s3cret"),
            ("INDEX_CACHE_SECONDS", "5"),
        ]))
        .unwrap();
        assert!(config.uses_memory_store());
        assert_eq!(config.index_cache_ttl, Duration::from_secs(5));
    }
}
