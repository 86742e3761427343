//! Routing provider contract.
//!
//! Every provider answers `get_directions(origin, destination, options)` with the same
//! [`DirectionsResponse`] shape. The concrete REST providers (behind the `http` feature)
//! form the closed [`Provider`] enum; the aggregator only sees the
//! [`DirectionsProvider`] trait.

use std::fmt;
use std::future::Future;

use geo::{Coord, Geometry, LineString};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::{Bounds, GpsPoint};

#[cfg(feature = "http")]
mod graphhopper;
#[cfg(feature = "http")]
mod mapbox;
#[cfg(feature = "http")]
mod openroute;
#[cfg(feature = "http")]
mod valhalla;

#[cfg(feature = "http")]
pub use graphhopper::GraphHopper;
#[cfg(feature = "http")]
pub use mapbox::Mapbox;
#[cfg(feature = "http")]
pub use openroute::OpenRouteService;
#[cfg(feature = "http")]
pub use valhalla::Valhalla;

/// The closed set of supported routing services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    GraphHopper,
    OpenRouteService,
    Mapbox,
    Valhalla,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::GraphHopper,
        ProviderKind::OpenRouteService,
        ProviderKind::Mapbox,
        ProviderKind::Valhalla,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::GraphHopper => "graphhopper",
            ProviderKind::OpenRouteService => "openrouteservice",
            ProviderKind::Mapbox => "mapbox",
            ProviderKind::Valhalla => "valhalla",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One candidate route as returned by a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    /// Normally a `LineString` in lng/lat order
    pub geometry: Option<Geometry<f64>>,
    /// Meters
    pub distance: f64,
    /// Seconds
    pub duration: f64,
    /// Elevation gain in meters, when the provider reports it
    pub ascend: Option<f64>,
    /// Elevation loss in meters, when the provider reports it
    pub descend: Option<f64>,
    /// Originating provider; set by the aggregator
    pub provider: Option<ProviderKind>,
}

impl Route {
    pub fn new(geometry: Option<Geometry<f64>>, distance: f64, duration: f64) -> Self {
        Self {
            geometry,
            distance,
            duration,
            ascend: None,
            descend: None,
            provider: None,
        }
    }
}

/// A snapped origin/destination/via point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub name: Option<String>,
    pub location: GpsPoint,
}

/// Normalized provider answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectionsResponse {
    pub routes: Vec<Route>,
    pub waypoints: Vec<Waypoint>,
    pub bbox: Option<Bounds>,
}

/// Request options shared by all providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectionsOptions {
    /// Ask for alternative routes. Default: true
    pub alternatives: bool,
    /// Upper bound on alternatives requested from providers that accept one. Default: 3
    pub max_alternatives: u32,
}

impl Default for DirectionsOptions {
    fn default() -> Self {
        Self {
            alternatives: true,
            max_alternatives: 3,
        }
    }
}

/// Capability shared by every routing provider.
pub trait DirectionsProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn get_directions(
        &self,
        origin: GpsPoint,
        destination: GpsPoint,
        options: &DirectionsOptions,
    ) -> impl Future<Output = Result<DirectionsResponse>> + Send;
}

/// Build a `LineString` geometry from GeoJSON positions (`[lng, lat, ele?]`).
///
/// Positions with fewer than two values are skipped.
pub(crate) fn line_from_positions(positions: &[Vec<f64>]) -> Option<Geometry<f64>> {
    let coords: Vec<Coord<f64>> = positions
        .iter()
        .filter(|p| p.len() >= 2)
        .map(|p| Coord { x: p[0], y: p[1] })
        .collect();
    if coords.is_empty() {
        return None;
    }
    Some(Geometry::LineString(LineString::new(coords)))
}

/// Bounds from a GeoJSON bbox, 2D (`[w, s, e, n]`) or 3D (`[w, s, z, e, n, z]`).
pub(crate) fn bounds_from_bbox(bbox: &[f64]) -> Option<Bounds> {
    let (w, s, e, n) = match bbox.len() {
        4 => (bbox[0], bbox[1], bbox[2], bbox[3]),
        6 => (bbox[0], bbox[1], bbox[3], bbox[4]),
        _ => return None,
    };
    Some(Bounds {
        min_lat: s,
        max_lat: n,
        min_lng: w,
        max_lng: e,
    })
}

// ============================================================================
// Concrete Providers (requires "http" feature)
// ============================================================================

/// API keys for the providers that need one.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    pub graphhopper: Option<String>,
    pub openrouteservice: Option<String>,
    pub mapbox: Option<String>,
}

#[cfg(feature = "http")]
impl ProviderCredentials {
    /// Read `GRAPHHOPPER_API_KEY`, `OPENROUTESERVICE_API_KEY` and `MAPBOX_ACCESS_TOKEN`.
    /// Empty values count as missing.
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            graphhopper: read("GRAPHHOPPER_API_KEY"),
            openrouteservice: read("OPENROUTESERVICE_API_KEY"),
            mapbox: read("MAPBOX_ACCESS_TOKEN"),
        }
    }
}

/// A concrete REST routing provider.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub enum Provider {
    GraphHopper(GraphHopper),
    OpenRouteService(OpenRouteService),
    Mapbox(Mapbox),
    Valhalla(Valhalla),
}

#[cfg(feature = "http")]
impl Provider {
    /// Construct the provider of `kind` on a shared client.
    pub fn new(kind: ProviderKind, client: reqwest::Client, credentials: &ProviderCredentials) -> Self {
        match kind {
            ProviderKind::GraphHopper => {
                Provider::GraphHopper(GraphHopper::new(client, credentials.graphhopper.clone()))
            }
            ProviderKind::OpenRouteService => Provider::OpenRouteService(OpenRouteService::new(
                client,
                credentials.openrouteservice.clone(),
            )),
            ProviderKind::Mapbox => Provider::Mapbox(Mapbox::new(client, credentials.mapbox.clone())),
            ProviderKind::Valhalla => Provider::Valhalla(Valhalla::new(client)),
        }
    }

    /// One provider of every kind, sharing one HTTP client.
    pub fn all(credentials: &ProviderCredentials) -> Result<Vec<Provider>> {
        let client = crate::http::build_client()?;
        Ok(ProviderKind::ALL
            .iter()
            .map(|&kind| Provider::new(kind, client.clone(), credentials))
            .collect())
    }
}

#[cfg(feature = "http")]
impl DirectionsProvider for Provider {
    fn kind(&self) -> ProviderKind {
        match self {
            Provider::GraphHopper(_) => ProviderKind::GraphHopper,
            Provider::OpenRouteService(_) => ProviderKind::OpenRouteService,
            Provider::Mapbox(_) => ProviderKind::Mapbox,
            Provider::Valhalla(_) => ProviderKind::Valhalla,
        }
    }

    async fn get_directions(
        &self,
        origin: GpsPoint,
        destination: GpsPoint,
        options: &DirectionsOptions,
    ) -> Result<DirectionsResponse> {
        match self {
            Provider::GraphHopper(p) => p.get_directions(origin, destination, options).await,
            Provider::OpenRouteService(p) => p.get_directions(origin, destination, options).await,
            Provider::Mapbox(p) => p.get_directions(origin, destination, options).await,
            Provider::Valhalla(p) => p.get_directions(origin, destination, options).await,
        }
    }
}
