use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::error::ApiError;
use crate::geo::Coordinate;
use crate::routing::{Route, RouteManager};
use crate::session::{SessionStore, DEFAULT_SESSION_ID};
use crate::vehicle::{ControlUpdate, Gear};

#[derive(Debug, Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub routes: RouteManager,
}

impl AppState {
    pub fn new(sessions: Arc<SessionStore>, routes: RouteManager) -> Self {
        Self { sessions, routes }
    }
}

// Request bodies

#[derive(Debug, Default, Deserialize)]
pub struct PointInput {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl PointInput {
    fn coordinate(&self) -> Option<Coordinate> {
        Some(Coordinate::new(self.lat?, self.lng?))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct GeocodeRequest {
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReverseGeocodeRequest {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RouteRequest {
    #[serde(default)]
    pub start: PointInput,
    #[serde(default)]
    pub end: PointInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct DistanceRequest {
    #[serde(default)]
    pub from: PointInput,
    #[serde(default)]
    pub to: PointInput,
}

#[derive(Debug, Default, Deserialize)]
pub struct ResetRequest {
    pub session_id: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

// Responses

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub position: Coordinate,
    pub heading: f64,
    pub speed: f64,
    pub rpm: f64,
}

#[derive(Debug, Serialize)]
pub struct GeocodeResponse {
    pub success: bool,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct ReverseGeocodeResponse {
    pub success: bool,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct RouteResponse {
    pub success: bool,
    pub route: Route,
}

#[derive(Debug, Serialize)]
pub struct DistanceResponse {
    pub success: bool,
    pub distance_km: f64,
}

#[derive(Debug, Serialize)]
pub struct StateView {
    pub position: Coordinate,
    pub heading: f64,
    pub speed: f64,
    pub rpm: f64,
    pub gear: Gear,
    pub engine_on: bool,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub success: bool,
    pub state: StateView,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
}

// Routes and handlers

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/update", post(update))
        .route("/geocode", post(geocode))
        .route("/reverse-geocode", post(reverse_geocode))
        .route("/route", post(route))
        .route("/distance", post(distance))
        .route("/state/:session_id", get(session_state))
        .route("/reset", post(reset))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": "drivesim" }))
}

pub async fn update(
    State(app): State<AppState>,
    payload: Result<Json<ControlUpdate>, JsonRejection>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let Json(controls) = payload?;
    let session_id = controls.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);

    let vehicle = app.sessions.advance(session_id, &controls, Instant::now()).await;

    Ok(Json(UpdateResponse {
        success: true,
        position: vehicle.position(),
        heading: vehicle.heading,
        speed: vehicle.speed,
        rpm: vehicle.rpm,
    }))
}

pub async fn geocode(
    State(app): State<AppState>,
    payload: Result<Json<GeocodeRequest>, JsonRejection>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    let Json(request) = payload?;
    let address = request.address.trim();
    if address.is_empty() {
        return Err(ApiError::Validation("Address required".to_string()));
    }

    let coords = app
        .routes
        .geocode(address)
        .await
        .ok_or_else(|| ApiError::NotFound("Address not found".to_string()))?;

    Ok(Json(GeocodeResponse {
        success: true,
        lat: coords.lat,
        lng: coords.lng,
    }))
}

pub async fn reverse_geocode(
    State(app): State<AppState>,
    payload: Result<Json<ReverseGeocodeRequest>, JsonRejection>,
) -> Result<Json<ReverseGeocodeResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(lat), Some(lng)) = (request.lat, request.lng) else {
        return Err(ApiError::Validation(
            "Latitude and longitude required".to_string(),
        ));
    };

    let address = app
        .routes
        .reverse_geocode(lat, lng)
        .await
        .ok_or_else(|| ApiError::NotFound("Location not found".to_string()))?;

    Ok(Json(ReverseGeocodeResponse {
        success: true,
        address,
    }))
}

pub async fn route(
    State(app): State<AppState>,
    payload: Result<Json<RouteRequest>, JsonRejection>,
) -> Result<Json<RouteResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(start), Some(end)) = (request.start.coordinate(), request.end.coordinate()) else {
        return Err(ApiError::Validation(
            "Start and end coordinates required".to_string(),
        ));
    };

    let route = app
        .routes
        .route(start, end)
        .await
        .ok_or_else(|| ApiError::NotFound("Could not calculate route".to_string()))?;

    Ok(Json(RouteResponse {
        success: true,
        route,
    }))
}

pub async fn distance(
    payload: Result<Json<DistanceRequest>, JsonRejection>,
) -> Result<Json<DistanceResponse>, ApiError> {
    let Json(request) = payload?;
    let (Some(from), Some(to)) = (request.from.coordinate(), request.to.coordinate()) else {
        return Err(ApiError::Validation(
            "From and to coordinates required".to_string(),
        ));
    };

    Ok(Json(DistanceResponse {
        success: true,
        distance_km: from.distance_km(&to),
    }))
}

pub async fn session_state(
    State(app): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<StateResponse>, ApiError> {
    let session = app
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| ApiError::NotFound("Session not found".to_string()))?;
    let vehicle = session.state;

    Ok(Json(StateResponse {
        success: true,
        state: StateView {
            position: vehicle.position(),
            heading: vehicle.heading,
            speed: vehicle.speed,
            rpm: vehicle.rpm,
            gear: vehicle.gear,
            engine_on: vehicle.engine_on,
        },
    }))
}

/// The body is optional here; an empty request resets the default session
/// to the configured origin.
pub async fn reset(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<ResetResponse>, ApiError> {
    let request: ResetRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ResetRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::Validation(format!("Invalid reset request: {}", e)))?
    };

    let origin = app.sessions.origin();
    let session_id = request.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);
    app.sessions
        .reset(
            session_id,
            request.lat.unwrap_or(origin.lat),
            request.lng.unwrap_or(origin.lng),
        )
        .await;

    Ok(Json(ResetResponse {
        success: true,
        message: "State reset successfully".to_string(),
    }))
}
