use crate::checkers;
use crate::config::{
    CatalogProvider, ConfigurationProvider, JsonCatalogFile, JsonConfigFile, ServerSettings,
};
use crate::data::{Catalog, Configuration, Period, ValidationReport};
use crate::error::{Result, SchedulerError};
use crate::pipeline::{ScheduleRun, run_schedule};
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use log::{info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::RwLock;

type Rejection = (StatusCode, String);

/// Shared service state. Each request works on its own snapshot of the
/// catalog and configuration.
pub struct AppState {
    catalog: RwLock<Catalog>,
    config: RwLock<Configuration>,
    catalog_store: Option<JsonCatalogFile>,
    config_store: Option<JsonConfigFile>,
}

impl AppState {
    pub fn new(catalog: Catalog, config: Configuration) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            config: RwLock::new(config),
            catalog_store: None,
            config_store: None,
        }
    }

    pub fn from_settings(settings: &ServerSettings) -> Result<Self> {
        let catalog = settings.catalog_provider().get_catalog()?;
        let config = settings.configuration_provider().get_configuration()?;
        Ok(Self {
            catalog_store: settings.catalog_path.as_ref().map(JsonCatalogFile::new),
            config_store: settings.config_path.as_ref().map(JsonConfigFile::new),
            ..Self::new(catalog, config)
        })
    }

    async fn snapshot(&self) -> (Catalog, Configuration) {
        (self.catalog.read().await.clone(), self.config.read().await.clone())
    }
}

fn reject(e: SchedulerError) -> Rejection {
    warn!("Request failed: {e}");
    let status = match e {
        SchedulerError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    (status, e.to_string())
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OfferingUpdate {
    capacity: u32,
    periods: Vec<Period>,
}

async fn generate_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> std::result::Result<Json<ScheduleRun>, Rejection> {
    let request: GenerateRequest = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| reject(e.into()))?
    };
    let (catalog, config) = state.snapshot().await;
    let mut rng = match request.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    run_schedule(&catalog, &config, &mut rng).map(Json).map_err(reject)
}

async fn validate_handler(
    State(state): State<Arc<AppState>>,
    document: String,
) -> Json<Vec<ValidationReport>> {
    let (catalog, config) = state.snapshot().await;
    Json(checkers::run_all_on_document(&config, &document, &catalog))
}

async fn get_catalog_handler(State(state): State<Arc<AppState>>) -> Json<Catalog> {
    Json(state.catalog.read().await.clone())
}

async fn put_offering_handler(
    State(state): State<Arc<AppState>>,
    Path((day, class)): Path<(String, String)>,
    Json(update): Json<OfferingUpdate>,
) -> std::result::Result<Json<Catalog>, Rejection> {
    let mut catalog = state.catalog.write().await;
    let mut updated = catalog.clone();
    updated
        .upsert_offering(&day, &class, update.capacity, &update.periods)
        .map_err(reject)?;
    if let Some(store) = &state.catalog_store {
        store.save(&updated).map_err(reject)?;
    }
    info!("Offering {class} on {day} set to {} seat(s)", update.capacity);
    *catalog = updated.clone();
    Ok(Json(updated))
}

async fn delete_offering_handler(
    State(state): State<Arc<AppState>>,
    Path((day, class)): Path<(String, String)>,
) -> std::result::Result<Json<Catalog>, Rejection> {
    let mut catalog = state.catalog.write().await;
    let mut updated = catalog.clone();
    if !updated.remove_offering(&day, &class) {
        return Err((StatusCode::NOT_FOUND, format!("no offering '{class}' on {day}")));
    }
    if let Some(store) = &state.catalog_store {
        store.save(&updated).map_err(reject)?;
    }
    info!("Offering {class} on {day} removed");
    *catalog = updated.clone();
    Ok(Json(updated))
}

async fn get_config_handler(State(state): State<Arc<AppState>>) -> Json<Configuration> {
    Json(state.config.read().await.clone())
}

async fn put_config_handler(
    State(state): State<Arc<AppState>>,
    Json(config): Json<Configuration>,
) -> std::result::Result<Json<Configuration>, Rejection> {
    config.validate().map_err(reject)?;
    let mut current = state.config.write().await;
    if let Some(store) = &state.config_store {
        store.save(&config).map_err(reject)?;
    }
    info!("Configuration updated: {config:?}");
    *current = config.clone();
    Ok(Json(config))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/schedule/generate", post(generate_handler))
        .route("/v1/schedule/validate", post(validate_handler))
        .route("/v1/catalog", get(get_catalog_handler))
        .route(
            "/v1/catalog/:day/:class",
            put(put_offering_handler).delete(delete_offering_handler),
        )
        .route("/v1/config", get(get_config_handler).put(put_config_handler))
        .with_state(state)
}

pub async fn run_server(settings: ServerSettings) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::from_settings(&settings)?);
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&settings.addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
