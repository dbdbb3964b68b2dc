use rocket::response::content::RawHtml;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use crate::cache::ListingCache;
use crate::db::Repository;
use crate::render::{Renderer, Templates};
use crate::types::{AppError, AppResult};

/// Everything handlers share: the store, the templates, the listing cache
/// and the session secret. Managed by Rocket.
pub struct App {
    store: Arc<dyn Repository>,
    renderer: Box<dyn Renderer>,
    index_cache: ListingCache,
    secret_key: String,
}

impl App {
    pub fn new(
        store: Arc<dyn Repository>,
        index_cache: ListingCache,
        secret_key: String,
    ) -> tera::Result<App> {
        Ok(App::with_renderer(
            store,
            Box::new(Templates::new()?),
            index_cache,
            secret_key,
        ))
    }

    pub fn with_renderer(
        store: Arc<dyn Repository>,
        renderer: Box<dyn Renderer>,
        index_cache: ListingCache,
        secret_key: String,
    ) -> App {
        App {
            store,
            renderer,
            index_cache,
            secret_key,
        }
    }

    pub fn store(&self) -> &dyn Repository {
        &*self.store
    }

    pub fn index_cache(&self) -> &ListingCache {
        &self.index_cache
    }

    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn render_markup(&self, template: &str, context: &Value) -> AppResult<String> {
        self.renderer.render(template, context).map_err(|e| {
            error!(template, error = ?e, "template rendering failed");
            AppError::Internal
        })
    }

    pub fn render(&self, template: &str, context: Value) -> AppResult<RawHtml<String>> {
        self.render_markup(template, &context).map(RawHtml)
    }
}
