// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::config::Config;
use crate::storage::{ImageStore, LocalImageStore};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub images: Arc<dyn ImageStore>,
}

impl AppState {
    /// State backed by a local image directory taken from the config.
    pub fn new(pool: PgPool, config: Config) -> Self {
        let images = Arc::new(LocalImageStore::new(&config.upload_dir, &config.public_base_url));
        Self { pool, config, images }
    }
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ImageStore> {
    fn from_ref(state: &AppState) -> Self {
        state.images.clone()
    }
}
