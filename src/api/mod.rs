mod auth;
mod cors;
mod response;
mod status;

pub use self::auth::API_KEY_HEADER;
pub use self::response::{ApiError, ApiResponse};
pub use self::status::CarStatus;

use crate::cache::{CarId, StatusCache};
use crate::stats::IngressStats;
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};

pub struct ApiState {
    cache: StatusCache,
    stats: Arc<IngressStats>,
    api_key: Option<String>,
    cors_origins: Vec<String>,
}

impl ApiState {
    pub fn new(
        cache: StatusCache,
        stats: Arc<IngressStats>,
        api_key: Option<String>,
        cors_origins: Vec<String>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cache,
            stats,
            api_key: api_key.filter(|key| !key.is_empty()),
            cors_origins,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub car_id: CarId,
    pub metric: String,
    pub value: Option<String>,
}

pub fn router(state: Arc<ApiState>) -> Router {
    let cors = cors::cors_layer(&state.cors_origins);
    let api = Router::new()
        .route("/cars/{id}/status", get(get_car_status))
        .route("/cars/{id}/metrics", get(get_car_metrics))
        .route("/cars/{id}/metrics/{metric}", get(get_car_metric))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .layer(cors)
        .with_state(state)
}

/// Serves the API until `shutdown` resolves.
pub async fn start_api_server<A, F>(state: Arc<ApiState>, addr: A, shutdown: F) -> Result<()>
where
    A: ToSocketAddrs,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind API listener")?;
    tracing::info!("API Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server failed")
}

fn parse_car_id(raw: &str) -> Result<CarId, ApiError> {
    let id: i64 = raw
        .parse()
        .map_err(|_| ApiError::bad_request("Invalid car ID"))?;
    CarId::try_from(id).map_err(|_| ApiError::bad_request("Car ID out of valid range"))
}

async fn health(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "mqtt": state.stats.snapshot(),
    }))
}

async fn get_car_status(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CarStatus>>, ApiError> {
    let car = parse_car_id(&id)?;
    let metrics = state.cache.get_all_for_car(car).unwrap_or_default();
    Ok(Json(ApiResponse::success(CarStatus::from_metrics(car, &metrics))))
}

async fn get_car_metrics(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<BTreeMap<String, String>>>, ApiError> {
    let car = parse_car_id(&id)?;
    let metrics = state
        .cache
        .get_all_for_car(car)
        .map(|metrics| metrics.into_iter().collect())
        .unwrap_or_default();
    Ok(Json(ApiResponse::success(metrics)))
}

async fn get_car_metric(
    State(state): State<Arc<ApiState>>,
    Path((id, metric)): Path<(String, String)>,
) -> Result<Json<ApiResponse<MetricValue>>, ApiError> {
    let car = parse_car_id(&id)?;
    let value = state.cache.get(car, &metric);
    Ok(Json(ApiResponse::success(MetricValue {
        car_id: car,
        metric,
        value,
    })))
}
