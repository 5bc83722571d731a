use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use cyberui::api::{router, ApiState, API_KEY_HEADER};
use cyberui::cache::StatusCache;
use cyberui::stats::IngressStats;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(cache: StatusCache, api_key: Option<&str>) -> Router {
    router(ApiState::new(
        cache,
        IngressStats::new(),
        api_key.map(str::to_string),
        vec!["*".to_string()],
    ))
}

fn app_with_origins(origins: &[&str]) -> Router {
    router(ApiState::new(
        StatusCache::new(),
        IngressStats::new(),
        Some("secret".to_string()),
        origins.iter().map(|origin| origin.to_string()).collect(),
    ))
}

async fn get(app: Router, uri: &str, api_key: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().uri(uri);
    if let Some(key) = api_key {
        request = request.header(API_KEY_HEADER, key);
    }
    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_car_status_from_cache() {
    let cache = StatusCache::new();
    cache.set(1, "display_name", "Model Y");
    cache.set(1, "battery_level", "80");
    cache.set(1, "est_battery_range_km", "300.5");
    cache.set(1, "locked", "true");

    let (status, body) = get(app(cache, None), "/api/v1/cars/1/status", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 0);
    assert_eq!(body["message"], "success");
    assert_eq!(
        body["data"],
        json!({
            "carId": 1,
            "name": "Model Y",
            "batteryLevel": 80,
            "estRange": 300.5,
            "locked": true,
        })
    );
}

#[tokio::test]
async fn test_unknown_car_is_not_an_error() {
    let (status, body) = get(app(StatusCache::new(), None), "/api/v1/cars/2/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "carId": 2 }));

    let (status, body) = get(app(StatusCache::new(), None), "/api/v1/cars/2/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({}));
}

#[tokio::test]
async fn test_raw_metrics_and_single_metric() {
    let cache = StatusCache::new();
    cache.set(1, "soc", "80");
    cache.set(1, "range", "300");

    let (status, body) = get(app(cache.clone(), None), "/api/v1/cars/1/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "range": "300", "soc": "80" }));

    let (_, body) = get(app(cache.clone(), None), "/api/v1/cars/1/metrics/soc", None).await;
    assert_eq!(body["data"], json!({ "carId": 1, "metric": "soc", "value": "80" }));

    let (status, body) = get(app(cache, None), "/api/v1/cars/1/metrics/odometer", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], Value::Null);
}

#[tokio::test]
async fn test_invalid_car_ids() {
    let (status, body) = get(app(StatusCache::new(), None), "/api/v1/cars/abc/status", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "code": 400, "message": "Invalid car ID" }));

    let (status, body) =
        get(app(StatusCache::new(), None), "/api/v1/cars/40000/status", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Car ID out of valid range");
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let cache = StatusCache::new();
    cache.set(1, "battery_level", "80");

    let (status, body) = get(app(cache.clone(), Some("secret")), "/api/v1/cars/1/status", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "API key is required");

    let (status, body) = get(
        app(cache.clone(), Some("secret")),
        "/api/v1/cars/1/status",
        Some("wrong"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid API key");

    let (status, body) = get(
        app(cache.clone(), Some("secret")),
        "/api/v1/cars/1/status",
        Some("secret"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["batteryLevel"], 80);

    // Health stays open
    let (status, _) = get(app(cache, Some("secret")), "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_empty_api_key_disables_auth() {
    let (status, _) = get(app(StatusCache::new(), Some("")), "/api/v1/cars/1/status", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_reports_ingress_stats() {
    let stats = IngressStats::new();
    stats.on_connected();
    stats.inc_applied();
    let app = router(ApiState::new(StatusCache::new(), stats, None, Vec::new()));

    let (status, body) = get(app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["mqtt"]["connected"], true);
    assert_eq!(body["mqtt"]["messagesApplied"], 1);
}

#[tokio::test]
async fn test_cors_allows_any_origin_by_default() {
    let request = Request::builder()
        .uri("/api/v1/cars/1/status")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app(StatusCache::new(), None).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let origins = ["http://localhost:3000"];

    let request = Request::builder()
        .uri("/api/v1/cars/1/status")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(API_KEY_HEADER, "secret")
        .body(Body::empty())
        .unwrap();
    let response = app_with_origins(&origins).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );

    let request = Request::builder()
        .uri("/api/v1/cars/1/status")
        .header(header::ORIGIN, "http://evil.example")
        .header(API_KEY_HEADER, "secret")
        .body(Body::empty())
        .unwrap();
    let response = app_with_origins(&origins).oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
}

#[tokio::test]
async fn test_cors_preflight_skips_api_key() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/v1/cars/1/status")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-api-key")
        .body(Body::empty())
        .unwrap();
    let response = app_with_origins(&["http://localhost:3000"])
        .oneshot(request)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:3000"
    );
}
