use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::geo::Coordinate;

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    #[serde(default)]
    steps: Vec<OsrmStep>,
}

#[derive(Debug, Deserialize)]
struct OsrmStep {
    #[serde(default)]
    maneuver: Option<OsrmManeuver>,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct OsrmManeuver {
    #[serde(default)]
    instruction: Option<String>,
}

/// A driving route, coordinates as `[lat, lng]` pairs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub coordinates: Vec<[f64; 2]>,
    /// metres
    pub distance: f64,
    /// seconds
    pub duration: f64,
    pub steps: Vec<RouteStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteStep {
    pub instruction: String,
    pub distance: f64,
    pub duration: f64,
}

/// Client for the OpenStreetMap geocoder (Nominatim) and router (OSRM).
///
/// Lookups never return errors: any transport, status or decoding failure is
/// logged and reported as no result.
#[derive(Debug, Clone)]
pub struct RouteManager {
    client: reqwest::Client,
    nominatim_url: String,
    osrm_url: String,
}

impl RouteManager {
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            nominatim_url: config.nominatim_url.trim_end_matches('/').to_string(),
            osrm_url: config.osrm_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()?;
        let body = response
            .json::<T>()
            .await
            .with_context(|| format!("Invalid response from {}", url))?;
        Ok(body)
    }

    pub async fn geocode(&self, address: &str) -> Option<Coordinate> {
        let url = format!("{}/search", self.nominatim_url);
        let query = [("format", "json".to_string()), ("q", address.to_string())];
        match self.fetch::<Vec<NominatimPlace>>(&url, &query).await {
            Ok(places) => first_place(places),
            Err(e) => {
                warn!("Geocoding error: {:#}", e);
                None
            }
        }
    }

    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> Option<String> {
        let url = format!("{}/reverse", self.nominatim_url);
        let query = [
            ("format", "json".to_string()),
            ("lat", lat.to_string()),
            ("lon", lng.to_string()),
        ];
        match self.fetch::<NominatimReverse>(&url, &query).await {
            Ok(place) => place.display_name.filter(|name| !name.is_empty()),
            Err(e) => {
                warn!("Reverse geocoding error: {:#}", e);
                None
            }
        }
    }

    pub async fn route(&self, start: Coordinate, end: Coordinate) -> Option<Route> {
        // OSRM takes lng,lat pairs
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.osrm_url, start.lng, start.lat, end.lng, end.lat
        );
        let query = [
            ("overview", "full".to_string()),
            ("geometries", "geojson".to_string()),
            ("steps", "true".to_string()),
        ];
        match self.fetch::<OsrmResponse>(&url, &query).await {
            Ok(response) => first_route(response),
            Err(e) => {
                warn!("Routing error: {:#}", e);
                None
            }
        }
    }
}

fn first_place(places: Vec<NominatimPlace>) -> Option<Coordinate> {
    let place = places.into_iter().next()?;
    match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
        (Ok(lat), Ok(lng)) => Some(Coordinate::new(lat, lng)),
        _ => {
            warn!("Unparseable geocoder coordinates: {:?}", place);
            None
        }
    }
}

fn first_route(response: OsrmResponse) -> Option<Route> {
    let route = response.routes.into_iter().next()?;

    let coordinates = route
        .geometry
        .coordinates
        .iter()
        .filter(|position| position.len() >= 2)
        .map(|position| [position[1], position[0]])
        .collect();

    let steps = route
        .legs
        .into_iter()
        .flat_map(|leg| leg.steps)
        .map(|step| RouteStep {
            instruction: step
                .maneuver
                .and_then(|m| m.instruction)
                .unwrap_or_default(),
            distance: step.distance,
            duration: step.duration,
        })
        .collect();

    Some(Route {
        coordinates,
        distance: route.distance,
        duration: route.duration,
        steps,
    })
}
