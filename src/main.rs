use std::process;

use blogfeed::cache::ListingCache;
use blogfeed::config::Config;
use blogfeed::{db, App};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[rocket::main]
async fn main() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
    {
        eprintln!("tracing init failed: {}", e);
    }

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };

    let store = match db::connect(&config) {
        Ok(store) => store,
        Err(e) => {
            error!(error = %e, "failed to open the store");
            process::exit(1);
        }
    };

    let index_cache = ListingCache::new(config.index_cache_ttl);
    let app = match App::new(store, index_cache, config.secret_key.clone()) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "failed to load templates");
            process::exit(1);
        }
    };

    info!(cache_ttl = ?config.index_cache_ttl, "starting blogfeed");
    if let Err(e) = blogfeed::build(app).launch().await {
        error!(error = %e, "server stopped");
        process::exit(1);
    }
}
