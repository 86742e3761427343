//! Mapbox Directions API (`/directions/v5/mapbox/cycling`).

use log::info;
use reqwest::Client;
use serde::Deserialize;

use super::{line_from_positions, DirectionsOptions, DirectionsResponse, ProviderKind, Route, Waypoint};
use crate::error::{Result, RouteError};
use crate::http::send_json;
use crate::{Bounds, GpsPoint};

const ENDPOINT: &str = "https://api.mapbox.com/directions/v5/mapbox/cycling";
const KIND: ProviderKind = ProviderKind::Mapbox;

#[derive(Debug, Clone)]
pub struct Mapbox {
    client: Client,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MbResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<MbRoute>,
    #[serde(default)]
    waypoints: Vec<MbWaypoint>,
}

#[derive(Debug, Deserialize)]
struct MbRoute {
    geometry: Option<MbGeometry>,
    distance: f64,
    duration: f64,
}

#[derive(Debug, Deserialize)]
struct MbGeometry {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct MbWaypoint {
    name: Option<String>,
    location: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct MbError {
    message: Option<String>,
}

impl Mapbox {
    pub fn new(client: Client, access_token: Option<String>) -> Self {
        Self { client, access_token }
    }

    pub async fn get_directions(
        &self,
        origin: GpsPoint,
        destination: GpsPoint,
        options: &DirectionsOptions,
    ) -> Result<DirectionsResponse> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(RouteError::MissingCredential { provider: KIND })?;

        let url = format!(
            "{}/{},{};{},{}",
            ENDPOINT, origin.longitude, origin.latitude, destination.longitude, destination.latitude
        );
        let request = self.client.get(url).query(&[
            ("alternatives", options.alternatives.to_string()),
            ("geometries", "geojson".to_string()),
            ("overview", "full".to_string()),
            ("steps", "false".to_string()),
            ("access_token", token.to_string()),
        ]);

        let raw: MbResponse = send_json(KIND, request, error_message).await?;
        let response = normalize(raw)?;

        info!("[{}] {} routes", KIND, response.routes.len());
        Ok(response)
    }
}

fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<MbError>(body).ok()?.message
}

fn normalize(raw: MbResponse) -> Result<DirectionsResponse> {
    if raw.code != "Ok" {
        return Err(RouteError::Provider {
            provider: KIND,
            message: raw.message.unwrap_or(raw.code),
        });
    }

    let routes: Vec<Route> = raw
        .routes
        .into_iter()
        .map(|r| Route::new(
            r.geometry.as_ref().and_then(|g| line_from_positions(&g.coordinates)),
            r.distance,
            r.duration,
        ))
        .collect();

    // Mapbox returns no bbox; derive it from the route geometries
    let points: Vec<GpsPoint> = routes
        .iter()
        .filter_map(|r| match &r.geometry {
            Some(geo::Geometry::LineString(line)) => Some(line),
            _ => None,
        })
        .flat_map(|line| line.0.iter().map(|&c| GpsPoint::from(c)))
        .collect();
    let bbox = Bounds::from_points(&points);

    let waypoints = raw
        .waypoints
        .into_iter()
        .map(|w| Waypoint {
            name: w.name.filter(|n| !n.is_empty()),
            location: GpsPoint::new(w.location[1], w.location[0]),
        })
        .collect();

    Ok(DirectionsResponse { routes, waypoints, bbox })
}
