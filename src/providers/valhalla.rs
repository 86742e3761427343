//! Valhalla `/route` with bicycle costing. Shapes are polyline6-encoded.

use geo::Geometry;
use log::{info, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{DirectionsOptions, DirectionsResponse, ProviderKind, Route, Waypoint};
use crate::error::Result;
use crate::http::send_json;
use crate::{Bounds, GpsPoint};

const DEFAULT_ENDPOINT: &str = "https://valhalla1.openstreetmap.de/route";
const KIND: ProviderKind = ProviderKind::Valhalla;
const SHAPE_PRECISION: u32 = 6;

#[derive(Debug, Clone)]
pub struct Valhalla {
    client: Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct VhResponse {
    trip: VhTrip,
    #[serde(default)]
    alternates: Vec<VhAlternate>,
}

#[derive(Debug, Deserialize)]
struct VhAlternate {
    trip: VhTrip,
}

#[derive(Debug, Deserialize)]
struct VhTrip {
    #[serde(default)]
    legs: Vec<VhLeg>,
    summary: VhSummary,
    #[serde(default)]
    locations: Vec<VhLocation>,
}

#[derive(Debug, Deserialize)]
struct VhLeg {
    shape: String,
}

#[derive(Debug, Deserialize)]
struct VhSummary {
    /// Kilometres
    length: f64,
    /// Seconds
    time: f64,
    min_lat: Option<f64>,
    min_lon: Option<f64>,
    max_lat: Option<f64>,
    max_lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct VhLocation {
    lat: f64,
    lon: f64,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VhError {
    error: Option<String>,
}

impl Valhalla {
    pub fn new(client: Client) -> Self {
        Self::with_endpoint(client, DEFAULT_ENDPOINT)
    }

    /// Use a self-hosted Valhalla instance.
    pub fn with_endpoint(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub async fn get_directions(
        &self,
        origin: GpsPoint,
        destination: GpsPoint,
        options: &DirectionsOptions,
    ) -> Result<DirectionsResponse> {
        let alternates = if options.alternatives {
            options.max_alternatives
        } else {
            0
        };
        let body = json!({
            "locations": [
                {"lat": origin.latitude, "lon": origin.longitude},
                {"lat": destination.latitude, "lon": destination.longitude},
            ],
            "costing": "bicycle",
            "directions_type": "none",
            "alternates": alternates,
        });

        let request = self.client.post(&self.endpoint).json(&body);
        let raw: VhResponse = send_json(KIND, request, error_message).await?;
        let response = normalize(raw);

        info!("[{}] {} routes", KIND, response.routes.len());
        Ok(response)
    }
}

fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<VhError>(body).ok()?.error
}

/// Decode and concatenate the leg shapes of a trip.
///
/// A leg that fails to decode drops the whole geometry rather than leaving a gap.
fn trip_geometry(trip: &VhTrip) -> Option<Geometry<f64>> {
    let mut coords = Vec::new();
    for leg in &trip.legs {
        match polyline::decode_polyline(&leg.shape, SHAPE_PRECISION) {
            Ok(line) => coords.extend(line.0),
            Err(e) => {
                warn!("[{}] Invalid leg shape: {:?}", KIND, e);
                return None;
            }
        }
    }
    if coords.is_empty() {
        return None;
    }
    Some(Geometry::LineString(geo::LineString::new(coords)))
}

fn trip_route(trip: &VhTrip) -> Route {
    Route::new(trip_geometry(trip), trip.summary.length * 1000.0, trip.summary.time)
}

fn normalize(raw: VhResponse) -> DirectionsResponse {
    let summary = &raw.trip.summary;
    let bbox = match (summary.min_lat, summary.max_lat, summary.min_lon, summary.max_lon) {
        (Some(min_lat), Some(max_lat), Some(min_lng), Some(max_lng)) => Some(Bounds {
            min_lat,
            max_lat,
            min_lng,
            max_lng,
        }),
        _ => None,
    };

    let waypoints = raw
        .trip
        .locations
        .iter()
        .map(|l| Waypoint {
            name: l.name.clone(),
            location: GpsPoint::new(l.lat, l.lon),
        })
        .collect();

    let routes = std::iter::once(&raw.trip)
        .chain(raw.alternates.iter().map(|a| &a.trip))
        .map(trip_route)
        .collect();

    DirectionsResponse { routes, waypoints, bbox }
}
