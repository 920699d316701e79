use axum::{
    Router, middleware,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::credential::HashParams;
use crate::db::Store;
use crate::filestore::{FileStore, FsFileStore};
use crate::services::{
    AuthService, SeaOrmAuthService, SeaOrmSessionService, SeaOrmSyncService, SessionService,
    SyncService,
};

mod error;
pub mod files;
mod observability;
mod types;
pub mod users;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth: Arc<dyn AuthService>,

    pub sessions: Arc<dyn SessionService>,

    pub sync: Arc<dyn SyncService>,

    pub prometheus_handle: Option<PrometheusHandle>,
}

/// Wires the services over an existing store and file store.
pub fn create_app_state(
    config: Config,
    store: Store,
    files: Arc<dyn FileStore>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    let sessions: Arc<dyn SessionService> = Arc::new(SeaOrmSessionService::new(
        store.clone(),
        config.session_lifetime(),
        config.session.key_bytes,
    ));

    let auth: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(
        store.clone(),
        Arc::clone(&sessions),
        HashParams::from(&config.security),
    ));

    let sync: Arc<dyn SyncService> = Arc::new(SeaOrmSyncService::new(store.clone(), files));

    Arc::new(AppState {
        config: Arc::new(config),
        store,
        auth,
        sessions,
        sync,
        prometheus_handle,
    })
}

pub async fn create_app_state_from_config(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<Arc<AppState>> {
    let store = Store::new(&config.database_path).await?;
    let files: Arc<dyn FileStore> = Arc::new(FsFileStore::new(&config.root)?);
    Ok(create_app_state(config, store, files, prometheus_handle))
}

pub fn router(state: Arc<AppState>) -> Router {
    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/user", post(users::create_user))
        .route("/user/login", post(users::login))
        .route("/user/logout", post(users::logout))
        .route("/metrics", get(observability::get_metrics))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_router)
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/user",
            get(users::get_current_user).delete(users::delete_user),
        )
        .route("/user/username", put(users::update_username))
        .route("/user/email", put(users::update_email))
        .route("/user/password", put(users::change_password))
        .route("/list-files", get(files::list_files))
        .route(
            "/files/{*path}",
            get(files::download_file)
                .post(files::upload_file)
                .put(files::update_file)
                .delete(files::delete_file),
        )
        .route("/rename-file", post(files::rename_file))
        .route_layer(middleware::from_fn_with_state(state, users::auth_middleware))
}
