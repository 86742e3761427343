//! GraphHopper Routing API (`/api/1/route`, bike profile).

use log::info;
use reqwest::Client;
use serde::Deserialize;

use super::{bounds_from_bbox, line_from_positions, DirectionsOptions, DirectionsResponse, ProviderKind, Route, Waypoint};
use crate::error::{Result, RouteError};
use crate::http::send_json;
use crate::GpsPoint;

const ENDPOINT: &str = "https://graphhopper.com/api/1/route";
const KIND: ProviderKind = ProviderKind::GraphHopper;

#[derive(Debug, Clone)]
pub struct GraphHopper {
    client: Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhResponse {
    #[serde(default)]
    paths: Vec<GhPath>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhPath {
    distance: f64,
    /// Milliseconds
    time: f64,
    points: Option<GhLine>,
    snapped_waypoints: Option<GhLine>,
    bbox: Option<Vec<f64>>,
    ascend: Option<f64>,
    descend: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GhLine {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct GhError {
    message: Option<String>,
}

impl GraphHopper {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    pub async fn get_directions(
        &self,
        origin: GpsPoint,
        destination: GpsPoint,
        options: &DirectionsOptions,
    ) -> Result<DirectionsResponse> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(RouteError::MissingCredential { provider: KIND })?;

        let mut query: Vec<(&str, String)> = vec![
            ("point", format!("{},{}", origin.latitude, origin.longitude)),
            ("point", format!("{},{}", destination.latitude, destination.longitude)),
            ("profile", "bike".to_string()),
            ("points_encoded", "false".to_string()),
            ("elevation", "true".to_string()),
            ("instructions", "false".to_string()),
            ("key", key.to_string()),
        ];
        if options.alternatives {
            query.push(("algorithm", "alternative_route".to_string()));
            query.push(("alternative_route.max_paths", options.max_alternatives.to_string()));
        }

        let request = self.client.get(ENDPOINT).query(&query);
        let raw: GhResponse = send_json(KIND, request, error_message).await?;
        let response = normalize(raw)?;

        info!("[{}] {} routes", KIND, response.routes.len());
        Ok(response)
    }
}

fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<GhError>(body).ok()?.message
}

fn normalize(raw: GhResponse) -> Result<DirectionsResponse> {
    if raw.paths.is_empty() {
        return Err(RouteError::Provider {
            provider: KIND,
            message: raw.message.unwrap_or_else(|| "no route found".to_string()),
        });
    }

    let waypoints = raw.paths[0]
        .snapped_waypoints
        .as_ref()
        .map(|line| {
            line.coordinates
                .iter()
                .filter(|p| p.len() >= 2)
                .map(|p| Waypoint {
                    name: None,
                    location: GpsPoint::new(p[1], p[0]),
                })
                .collect()
        })
        .unwrap_or_default();

    let bbox = raw.paths[0].bbox.as_deref().and_then(bounds_from_bbox);

    let routes = raw
        .paths
        .into_iter()
        .map(|path| Route {
            geometry: path.points.as_ref().and_then(|l| line_from_positions(&l.coordinates)),
            distance: path.distance,
            duration: path.time / 1000.0,
            ascend: path.ascend,
            descend: path.descend,
            provider: None,
        })
        .collect();

    Ok(DirectionsResponse { routes, waypoints, bbox })
}
