//! openrouteservice Directions API (`/v2/directions/cycling-regular/geojson`).

use log::info;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{bounds_from_bbox, line_from_positions, DirectionsOptions, DirectionsResponse, ProviderKind, Route, Waypoint};
use crate::error::{Result, RouteError};
use crate::http::send_json;
use crate::GpsPoint;

const ENDPOINT: &str = "https://api.openrouteservice.org/v2/directions/cycling-regular/geojson";
const KIND: ProviderKind = ProviderKind::OpenRouteService;

#[derive(Debug, Clone)]
pub struct OpenRouteService {
    client: Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrsCollection {
    #[serde(default)]
    features: Vec<OrsFeature>,
    bbox: Option<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct OrsFeature {
    geometry: Option<OrsGeometry>,
    properties: OrsProperties,
}

#[derive(Debug, Deserialize)]
struct OrsGeometry {
    #[serde(default)]
    coordinates: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct OrsProperties {
    summary: OrsSummary,
    ascent: Option<f64>,
    descent: Option<f64>,
    /// Indices into the geometry of the request's waypoints
    #[serde(default)]
    way_points: Vec<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct OrsSummary {
    /// Omitted when origin and destination coincide
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

impl OpenRouteService {
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

        let mut body = json!({
            "coordinates": [
                [origin.longitude, origin.latitude],
                [destination.longitude, destination.latitude],
            ],
            "elevation": true,
            "instructions": false,
        });
        if options.alternatives {
            body["alternative_routes"] = json!({
                "target_count": options.max_alternatives,
                "share_factor": 0.6,
                "weight_factor": 1.4,
            });
        }

        let request = self
            .client
            .post(ENDPOINT)
            .header("Authorization", key)
            .json(&body);
        let raw: OrsCollection = send_json(KIND, request, error_message).await?;
        let response = normalize(raw)?;

        info!("[{}] {} routes", KIND, response.routes.len());
        Ok(response)
    }
}

/// Pull the message out of `{"error": {"code": .., "message": ..}}` or `{"error": ".."}`.
fn error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let error = value.get("error")?;
    match error.get("message").and_then(|m| m.as_str()) {
        Some(message) => Some(message.to_string()),
        None => error.as_str().map(str::to_string),
    }
}

fn normalize(raw: OrsCollection) -> Result<DirectionsResponse> {
    if raw.features.is_empty() {
        return Err(RouteError::Provider {
            provider: KIND,
            message: "no route found".to_string(),
        });
    }

    // Waypoints: positions of the first feature at its way_points indices
    let waypoints = raw.features[0]
        .geometry
        .as_ref()
        .map(|g| {
            raw.features[0]
                .properties
                .way_points
                .iter()
                .filter_map(|&i| g.coordinates.get(i))
                .filter(|p| p.len() >= 2)
                .map(|p| Waypoint {
                    name: None,
                    location: GpsPoint::new(p[1], p[0]),
                })
                .collect()
        })
        .unwrap_or_default();

    let routes = raw
        .features
        .into_iter()
        .map(|f| Route {
            geometry: f.geometry.as_ref().and_then(|g| line_from_positions(&g.coordinates)),
            distance: f.properties.summary.distance,
            duration: f.properties.summary.duration,
            ascend: f.properties.ascent,
            descend: f.properties.descent,
            provider: None,
        })
        .collect();

    Ok(DirectionsResponse {
        routes,
        waypoints,
        bbox: raw.bbox.as_deref().and_then(bounds_from_bbox),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "type": "FeatureCollection",
        "bbox": [-46.64, -23.56, 758.0, -46.63, -23.55, 771.0],
        "features": [
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[-46.64, -23.56, 758.0], [-46.635, -23.555, 764.0], [-46.63, -23.55, 771.0]]},
                "properties": {"summary": {"distance": 1480.2, "duration": 355.9}, "ascent": 13.0, "descent": 0.0, "way_points": [0, 2]}
            },
            {
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[-46.64, -23.56], [-46.63, -23.55]]},
                "properties": {"summary": {"distance": 1602.0, "duration": 390.0}, "way_points": [0, 1]}
            }
        ]
    }"#;

    #[test]
    fn test_normalize_features() {
        let raw: OrsCollection = serde_json::from_str(FIXTURE).unwrap();
        let response = normalize(raw).unwrap();

        assert_eq!(response.routes.len(), 2);
        assert_eq!(response.routes[0].distance, 1480.2);
        assert_eq!(response.routes[0].ascend, Some(13.0));
        assert_eq!(response.routes[1].duration, 390.0);
        assert_eq!(
            response.waypoints.iter().map(|w| w.location).collect::<Vec<_>>(),
            vec![GpsPoint::new(-23.56, -46.64), GpsPoint::new(-23.55, -46.63)]
        );
        let bbox = response.bbox.unwrap();
        assert_eq!((bbox.min_lng, bbox.max_lat), (-46.64, -23.55));
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(
            error_message(br#"{"error": {"code": 2010, "message": "Could not find routable point"}}"#),
            Some("Could not find routable point".to_string())
        );
        assert_eq!(
            error_message(br#"{"error": "Access to this API has been disallowed"}"#),
            Some("Access to this API has been disallowed".to_string())
        );
        assert_eq!(error_message(b"{}"), None);
    }

    #[test]
    fn test_no_features() {
        let raw: OrsCollection = serde_json::from_str(r#"{"type": "FeatureCollection", "features": []}"#).unwrap();
        assert!(matches!(normalize(raw), Err(RouteError::Provider { .. })));
    }
}
