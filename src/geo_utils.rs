//! # Geographic Utilities
//!
//! Geometry primitives shared by the duplicate detector and the coverage calculator.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`bearing`] | Planar angle of the vector between two points, in (-180, 180] |
//! | [`average_bearing`] | Mean of the per-vertex bearings of a polyline |
//! | [`normalize_bearing_delta`] | Wrap a bearing difference into [-180, 180] |
//! | [`point_distance`] | Great-circle distance in kilometres |
//! | [`haversine_distance`] | Great-circle distance in meters |
//! | [`polyline_length`] | Total length of a polyline in meters |
//! | [`compute_bounds`] | Bounding box of a polyline |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//! | [`distance_to_segment_meters`] | Point to line-segment distance on a local plane |
//! | [`resample_by_spacing`] | Sample a polyline at a fixed resolution |
//!
//! ## Example
//!
//! ```rust
//! use route_coverage::{GpsPoint, geo_utils};
//!
//! let street = vec![
//!     GpsPoint::new(-23.5505, -46.6333),
//!     GpsPoint::new(-23.5505, -46.6320),
//! ];
//!
//! // Due east: dx > 0, dy == 0
//! assert_eq!(geo_utils::bearing(&street[0], &street[1]), 0.0);
//! assert!(geo_utils::polyline_length(&street) > 100.0);
//! ```
//!
//! ## Bearings
//!
//! Bearings here are the mathematical angle `atan2(dlat, dlng)` in degrees, not compass
//! headings. East is 0°, north is 90°, west is 180°. Nothing normalizes to [0, 360), so
//! callers differencing bearings go through [`normalize_bearing_delta`].

use geo::{Distance, Haversine, Point};

use crate::{Bounds, GpsPoint};

/// Mean Earth radius used by the local planar projection (meters).
const EARTH_RADIUS_M: f64 = 6_371_008.8;

// =============================================================================
// Bearing Functions
// =============================================================================

/// Angle in degrees of the vector from `p1` to `p2`.
///
/// Computed as `atan2(dy, dx) * 180 / π` with `dy` the latitude difference and `dx` the
/// longitude difference. The result lies in (-180, 180].
///
/// ```rust
/// use route_coverage::{GpsPoint, geo_utils};
///
/// let a = GpsPoint::new(0.0, 0.0);
/// let north = GpsPoint::new(1.0, 0.0);
/// let west = GpsPoint::new(0.0, -1.0);
/// assert!((geo_utils::bearing(&a, &north) - 90.0).abs() < 1e-10);
/// assert!((geo_utils::bearing(&a, &west) - 180.0).abs() < 1e-10);
/// ```
#[inline]
pub fn bearing(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let dy = p2.latitude - p1.latitude;
    let dx = p2.longitude - p1.longitude;
    let degrees = dy.atan2(dx).to_degrees();
    // atan2(-0.0, -x) yields -180
    if degrees <= -180.0 {
        degrees + 360.0
    } else {
        degrees
    }
}

/// Bearings of every consecutive pair of vertices.
pub fn bearing_sequence(points: &[GpsPoint]) -> Vec<f64> {
    points.windows(2).map(|w| bearing(&w[0], &w[1])).collect()
}

/// Arithmetic mean of a polyline's bearing sequence.
///
/// Returns `None` for polylines with fewer than 2 points. Antipodal bearings
/// (e.g. 179° and -179°) average to roughly 0°; this is not corrected.
pub fn average_bearing(points: &[GpsPoint]) -> Option<f64> {
    let bearings = bearing_sequence(points);
    if bearings.is_empty() {
        return None;
    }
    Some(bearings.iter().sum::<f64>() / bearings.len() as f64)
}

/// Wrap a difference of two bearings into [-180, 180].
#[inline]
pub fn normalize_bearing_delta(delta: f64) -> f64 {
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two points in meters.
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance between two points in kilometres.
///
/// ```rust
/// use route_coverage::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
/// assert!((geo_utils::point_distance(&london, &paris) - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn point_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_distance(p1, p2) / 1000.0
}

/// Total length of a polyline in meters. Empty or single-point lines return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Uses the longitude scale (`cos(latitude)`), which is always the larger of the two
/// degree spans, so a square envelope built from it contains the metric circle.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

/// Distance in meters from `p` to the line segment `a`-`b`.
///
/// Projects `a` and `b` onto an equirectangular plane centred on `p`. Accurate to well
/// under a meter for segments of a few hundred meters, which is the scale of
/// infrastructure edges.
pub fn distance_to_segment_meters(p: &GpsPoint, a: &GpsPoint, b: &GpsPoint) -> f64 {
    let cos_lat = p.latitude.to_radians().cos();
    let to_plane = |q: &GpsPoint| {
        let x = (q.longitude - p.longitude).to_radians() * cos_lat * EARTH_RADIUS_M;
        let y = (q.latitude - p.latitude).to_radians() * EARTH_RADIUS_M;
        (x, y)
    };

    let (ax, ay) = to_plane(a);
    let (bx, by) = to_plane(b);
    let (dx, dy) = (bx - ax, by - ay);
    let len_sq = dx * dx + dy * dy;

    // Degenerate segment: distance to its single point
    let t = if len_sq == 0.0 {
        0.0
    } else {
        (-(ax * dx + ay * dy) / len_sq).clamp(0.0, 1.0)
    };

    let cx = ax + t * dx;
    let cy = ay + t * dy;
    (cx * cx + cy * cy).sqrt()
}

// =============================================================================
// Resampling
// =============================================================================

/// Sample a polyline every `spacing_meters` along its length.
///
/// The first and last vertices are always kept. Intermediate samples are linearly
/// interpolated between vertices. Lines with fewer than 2 points are returned as-is.
pub fn resample_by_spacing(points: &[GpsPoint], spacing_meters: f64) -> Vec<GpsPoint> {
    if points.len() < 2 || spacing_meters <= 0.0 {
        return points.to_vec();
    }

    let mut samples = vec![points[0]];
    // Distance along the line since the last emitted sample
    let mut carried = 0.0;

    for w in points.windows(2) {
        let (start, end) = (&w[0], &w[1]);
        let edge = haversine_distance(start, end);
        if edge == 0.0 {
            continue;
        }

        let mut offset = spacing_meters - carried;
        while offset < edge {
            let t = offset / edge;
            samples.push(GpsPoint::new(
                start.latitude + t * (end.latitude - start.latitude),
                start.longitude + t * (end.longitude - start.longitude),
            ));
            offset += spacing_meters;
        }
        carried = edge - (offset - spacing_meters);
    }

    let last = points[points.len() - 1];
    if samples.last() != Some(&last) {
        samples.push(last);
    }
    samples
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a polyline.
///
/// For empty input, returns a bounds with MIN/MAX values that fail any overlap check.
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Unit Tests
// =============================================================================
