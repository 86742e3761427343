//! # Route Coverage
//!
//! Bicycle infrastructure coverage, scoring and ranking for candidate cycling routes.
//!
//! This library provides:
//! - Duplicate detection for the two directions of one-way street facilities
//! - Route coverage per infrastructure type using proximity sampling
//! - A single 0-100 quality score with a poor/medium/good tier
//! - Multi-provider route aggregation with per-provider failure isolation
//!
//! ## Features
//!
//! - **`parallel`** - Run per-sample proximity tests with rayon
//! - **`http`** - Enable the GraphHopper, OpenRouteService, Mapbox and Valhalla providers
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_coverage::{
//!     calculate_coverage, score_coverage, CoverageConfig, DuplicateConfig, GpsPoint,
//!     InfraType, InfrastructureNetwork, InfrastructureSegment, Tier,
//! };
//!
//! let lane: Vec<GpsPoint> = (0..=10)
//!     .map(|i| GpsPoint::new(-23.5500, -46.6400 + i as f64 * 0.0005))
//!     .collect();
//!
//! let network = InfrastructureNetwork::new(
//!     vec![InfrastructureSegment::new("way/1", InfraType::Protected, lane.clone())],
//!     &DuplicateConfig::default(),
//! );
//!
//! let route = geo::Geometry::LineString(
//!     lane.iter().map(|p| geo::Coord { x: p.longitude, y: p.latitude }).collect(),
//! );
//!
//! let coverage = calculate_coverage(
//!     0,
//!     Some(&route),
//!     &network,
//!     &InfraType::ALL,
//!     &CoverageConfig::default(),
//! );
//! assert!(coverage.percentage(InfraType::Protected) > 99.0);
//!
//! let score = score_coverage(&coverage.percentages).unwrap();
//! assert_eq!(score.tier, Tier::Good);
//! ```

use geo::Coord;
use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Result, RouteError};

pub mod geo_utils;

// Side labeling of one-way street facilities
pub mod duplicates;
pub use duplicates::{detect_duplicates, DuplicateConfig, SegmentAnnotation, SegmentAnnotations, Side};

pub mod network;
pub use network::InfrastructureNetwork;

pub mod coverage;
pub use coverage::{calculate_coverage, CoverageConfig, CoverageResult, OverlapSegment};

pub mod scoring;
pub use scoring::{score_coverage, score_route, RouteScore, Tier};

// Routing provider contract and concrete providers
pub mod providers;
pub use providers::{
    DirectionsOptions, DirectionsProvider, DirectionsResponse, ProviderKind, Route, Waypoint,
};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use providers::{Provider, ProviderCredentials};

pub mod aggregator;
pub use aggregator::{
    AggregationResult, AggregatorConfig, ProviderSelection, RouteAggregator, ScoredRoute,
};

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with latitude and longitude in degrees.
///
/// # Example
/// ```
/// use route_coverage::GpsPoint;
/// let point = GpsPoint::new(-23.5505, -46.6333); // São Paulo
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<Coord<f64>> for GpsPoint {
    fn from(c: Coord<f64>) -> Self {
        GpsPoint::new(c.y, c.x)
    }
}

impl From<GpsPoint> for Coord<f64> {
    fn from(p: GpsPoint) -> Self {
        Coord { x: p.longitude, y: p.latitude }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }

    /// Smallest bounds containing both `self` and `other`.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_lat: self.min_lat.min(other.min_lat),
            max_lat: self.max_lat.max(other.max_lat),
            min_lng: self.min_lng.min(other.min_lng),
            max_lng: self.max_lng.max(other.max_lng),
        }
    }

    /// Get the center point of the bounds.
    pub fn center(&self) -> GpsPoint {
        GpsPoint::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// Classification of a piece of cycling infrastructure, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfraType {
    /// Physically separated cycle track
    Protected,
    /// Painted on-road cycle lane
    PaintedLane,
    /// Signed or suggested route sharing the carriageway
    SuggestedRoute,
    /// Sidewalk shared with pedestrians
    SharedSidewalk,
}

impl InfraType {
    /// Every classification, in quality order.
    pub const ALL: [InfraType; 4] = [
        InfraType::Protected,
        InfraType::PaintedLane,
        InfraType::SuggestedRoute,
        InfraType::SharedSidewalk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfraType::Protected => "protected",
            InfraType::PaintedLane => "painted_lane",
            InfraType::SuggestedRoute => "suggested_route",
            InfraType::SharedSidewalk => "shared_sidewalk",
        }
    }
}

impl std::fmt::Display for InfraType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// One classified line feature of the infrastructure dataset.
///
/// Caller-owned and never modified by the library; per-pass annotations live in
/// [`SegmentAnnotations`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfrastructureSegment {
    /// Source identifier (e.g. an OSM way id)
    pub id: String,
    pub kind: InfraType,
    pub geometry: Vec<GpsPoint>,
    pub street_name: Option<String>,
    /// Tagged one-way for general traffic
    pub oneway: bool,
}

impl InfrastructureSegment {
    /// Create an unnamed, bidirectional segment.
    pub fn new(id: impl Into<String>, kind: InfraType, geometry: Vec<GpsPoint>) -> Self {
        Self {
            id: id.into(),
            kind,
            geometry,
            street_name: None,
            oneway: false,
        }
    }

    /// Set the street name.
    pub fn with_street(mut self, name: impl Into<String>) -> Self {
        self.street_name = Some(name.into());
        self
    }

    /// Mark the segment as one-way.
    pub fn one_way(mut self) -> Self {
        self.oneway = true;
        self
    }

    /// Length in meters.
    pub fn length_meters(&self) -> f64 {
        geo_utils::polyline_length(&self.geometry)
    }
}

// ============================================================================
// Tests
// ============================================================================
