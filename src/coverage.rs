//! # Route Coverage
//!
//! How much of a route runs along each type of infrastructure.
//!
//! ## Algorithm
//! 1. Sample the route every `sample_spacing_meters`
//! 2. For each active type, find the counted segments within `proximity_threshold_meters`
//!    of every sample (R-tree candidates, then exact point-to-edge distance)
//! 3. A sample interval is covered by a type when both of its samples are near that type;
//!    covered length over sampled length gives the type's percentage
//! 4. Each contiguous run of samples near one segment becomes an [`OverlapSegment`]
//!
//! Types are tested independently, so percentages can sum above or below 100.
//! Malformed route geometry yields a zeroed result, never an error.

use std::collections::{BTreeMap, BTreeSet};

use geo::Geometry;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{haversine_distance, polyline_length, resample_by_spacing};
use crate::network::InfrastructureNetwork;
use crate::{GpsPoint, InfraType};

/// Configuration for coverage calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageConfig {
    /// Distance between route samples (meters). Default: 10.0
    pub sample_spacing_meters: f64,
    /// Maximum distance from a sample to infrastructure to count as covered (meters).
    /// Default: 15.0 - about half a street width
    pub proximity_threshold_meters: f64,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            sample_spacing_meters: 10.0,
            proximity_threshold_meters: 15.0,
        }
    }
}

/// A stretch of route running along one infrastructure segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapSegment {
    pub kind: InfraType,
    /// Id of the infrastructure segment the route runs along
    pub segment_id: String,
    /// Route samples of the run
    pub geometry: Vec<GpsPoint>,
    pub length_meters: f64,
}

/// Coverage of one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    /// Index of the route in the provider response it came from
    pub route_index: usize,
    /// Position after ranking; set by the aggregator
    pub sorted_index: Option<usize>,
    /// Percentage of route length per active type, each in [0, 100]
    pub percentages: BTreeMap<InfraType, f64>,
    pub overlaps: Vec<OverlapSegment>,
}

impl CoverageResult {
    /// All active types at 0% and no overlaps.
    pub fn zeroed(route_index: usize, active: &[InfraType]) -> Self {
        Self {
            route_index,
            sorted_index: None,
            percentages: active.iter().map(|&k| (k, 0.0)).collect(),
            overlaps: Vec::new(),
        }
    }

    /// Percentage for `kind`, 0.0 when the type was not active.
    pub fn percentage(&self, kind: InfraType) -> f64 {
        self.percentages.get(&kind).copied().unwrap_or(0.0)
    }

    /// Sum of all per-type percentages.
    pub fn total_percentage(&self) -> f64 {
        self.percentages.values().fold(0.0, |acc, p| acc + p)
    }
}

/// Extract a usable polyline from route geometry.
fn route_points(geometry: Option<&Geometry<f64>>) -> Option<Vec<GpsPoint>> {
    let Some(Geometry::LineString(line)) = geometry else {
        return None;
    };

    let points: Vec<GpsPoint> = line
        .0
        .iter()
        .map(|c| GpsPoint::from(*c))
        .filter(|p| p.is_valid())
        .collect();

    (points.len() >= 2).then_some(points)
}

/// Compute the coverage of a route against the active infrastructure types.
///
/// Returns a zeroed result when `geometry` is missing, not a `LineString`, or has fewer
/// than 2 valid points.
pub fn calculate_coverage(
    route_index: usize,
    geometry: Option<&Geometry<f64>>,
    network: &InfrastructureNetwork,
    active: &[InfraType],
    config: &CoverageConfig,
) -> CoverageResult {
    let Some(points) = route_points(geometry) else {
        debug!("[Coverage] Route {} has no usable line geometry", route_index);
        return CoverageResult::zeroed(route_index, active);
    };

    let samples = resample_by_spacing(&points, config.sample_spacing_meters);
    let total_length = polyline_length(&samples);
    if total_length <= 0.0 {
        return CoverageResult::zeroed(route_index, active);
    }

    let interval_lengths: Vec<f64> = samples
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .collect();

    let mut result = CoverageResult::zeroed(route_index, active);

    // Each type once, however often it is listed
    let kinds: BTreeSet<InfraType> = active.iter().copied().collect();
    for kind in kinds {
        let near = nearby_segments(network, kind, &samples, config.proximity_threshold_meters);

        // fold from +0.0: an empty f64 sum is -0.0
        let covered = near
            .windows(2)
            .zip(&interval_lengths)
            .filter(|(w, _)| !w[0].is_empty() && !w[1].is_empty())
            .fold(0.0, |acc, (_, len)| acc + len);

        let percentage = (covered / total_length * 100.0).clamp(0.0, 100.0);
        result.percentages.insert(kind, percentage);
        result
            .overlaps
            .extend(overlap_runs(network, kind, &samples, &near));
    }

    debug!(
        "[Coverage] Route {}: {:.0}m, {} samples, {} overlaps, {:?}",
        route_index,
        total_length,
        samples.len(),
        result.overlaps.len(),
        result.percentages
    );

    result
}

/// For each sample, the sorted indices of `kind` segments within threshold.
fn nearby_segments(
    network: &InfrastructureNetwork,
    kind: InfraType,
    samples: &[GpsPoint],
    threshold: f64,
) -> Vec<Vec<usize>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        samples
            .par_iter()
            .map(|p| network.segments_near(kind, p, threshold))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        samples
            .iter()
            .map(|p| network.segments_near(kind, p, threshold))
            .collect()
    }
}

/// Contiguous runs of samples near the same segment, in route order.
///
/// Runs of a single sample have no length and are dropped.
fn overlap_runs(
    network: &InfrastructureNetwork,
    kind: InfraType,
    samples: &[GpsPoint],
    near: &[Vec<usize>],
) -> Vec<OverlapSegment> {
    // segment index -> start sample of its open run
    let mut open: BTreeMap<usize, usize> = BTreeMap::new();
    let mut runs: Vec<(usize, usize, usize)> = Vec::new();

    for (i, segs) in near.iter().enumerate() {
        let closed: Vec<usize> = open
            .keys()
            .copied()
            .filter(|s| segs.binary_search(s).is_err())
            .collect();
        for seg in closed {
            if let Some(start) = open.remove(&seg) {
                runs.push((start, i, seg));
            }
        }
        for &seg in segs {
            open.entry(seg).or_insert(i);
        }
    }
    for (seg, start) in open {
        runs.push((start, samples.len(), seg));
    }

    runs.sort_by_key(|&(start, end, seg)| (start, end, seg));

    runs.into_iter()
        .filter(|(start, end, _)| end - start >= 2)
        .filter_map(|(start, end, seg)| {
            let segment = network.segment(seg)?;
            let geometry = samples[start..end].to_vec();
            Some(OverlapSegment {
                kind,
                segment_id: segment.id.clone(),
                length_meters: polyline_length(&geometry),
                geometry,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DuplicateConfig, InfrastructureSegment};
    use geo::{Coord, LineString, MultiLineString, Point};

    /// East-west line at `lat` from lng 0 to `to_lng`, vertices every 0.0005°.
    fn line(lat: f64, to_lng: f64) -> Vec<GpsPoint> {
        let steps = (to_lng / 0.0005).round() as usize;
        (0..=steps).map(|i| GpsPoint::new(lat, i as f64 * 0.0005)).collect()
    }

    fn geometry(points: &[GpsPoint]) -> Geometry<f64> {
        Geometry::LineString(LineString::new(points.iter().map(|&p| Coord::from(p)).collect()))
    }

    fn network(segments: Vec<InfrastructureSegment>) -> InfrastructureNetwork {
        InfrastructureNetwork::new(segments, &DuplicateConfig::default())
    }

    #[test]
    fn test_full_coverage_on_identical_line() {
        let route = line(0.0, 0.01);
        let net = network(vec![InfrastructureSegment::new("lane", InfraType::Protected, route.clone())]);

        let result = calculate_coverage(0, Some(&geometry(&route)), &net, &InfraType::ALL, &CoverageConfig::default());

        assert!((result.percentage(InfraType::Protected) - 100.0).abs() < 1e-6);
        assert_eq!(result.percentage(InfraType::PaintedLane), 0.0);
        assert_eq!(result.percentages.len(), 4);
        assert_eq!(result.overlaps.len(), 1);
        assert_eq!(result.overlaps[0].segment_id, "lane");
        assert!((result.overlaps[0].length_meters - polyline_length(&route)).abs() < 1.0);
    }

    #[test]
    fn test_partial_coverage_half_route() {
        let route = line(0.0, 0.01);
        // Lane along the first half, 5m off the route centreline
        let lane = line(0.000045, 0.005);
        let net = network(vec![InfrastructureSegment::new("half", InfraType::PaintedLane, lane)]);

        let result = calculate_coverage(3, Some(&geometry(&route)), &net, &InfraType::ALL, &CoverageConfig::default());

        let pct = result.percentage(InfraType::PaintedLane);
        assert!(pct > 48.0 && pct < 53.0, "expected ~50%, got {}", pct);
        assert_eq!(result.route_index, 3);
        assert_eq!(result.overlaps.len(), 1);
    }

    #[test]
    fn test_distant_infrastructure_not_counted() {
        let route = line(0.0, 0.01);
        // ~55m away
        let lane = line(0.0005, 0.01);
        let net = network(vec![InfrastructureSegment::new("far", InfraType::Protected, lane)]);

        let result = calculate_coverage(0, Some(&geometry(&route)), &net, &InfraType::ALL, &CoverageConfig::default());
        assert_eq!(result.total_percentage(), 0.0);
        assert!(result.overlaps.is_empty());
        for pct in result.percentages.values() {
            assert!(pct.is_sign_positive(), "uncovered type reported {}", pct);
        }
        assert!(!serde_json::to_string(&result.percentages).unwrap().contains("-0"));
    }

    #[test]
    fn test_repeated_active_type_counted_once() {
        let route = line(0.0, 0.01);
        let net = network(vec![InfrastructureSegment::new("lane", InfraType::Protected, route.clone())]);

        let result = calculate_coverage(
            0,
            Some(&geometry(&route)),
            &net,
            &[InfraType::Protected, InfraType::Protected],
            &CoverageConfig::default(),
        );
        assert_eq!(result.percentages.len(), 1);
        assert_eq!(result.overlaps.len(), 1);
        assert!((result.percentage(InfraType::Protected) - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_shared_id_with_side_b_segment_still_covers() {
        let route = line(0.01, 0.01);
        let mut west = line(0.0001, 0.01);
        west.reverse();
        let net = network(vec![
            InfrastructureSegment::new("way/1", InfraType::PaintedLane, line(0.0, 0.01))
                .with_street("Rua Augusta")
                .one_way(),
            InfrastructureSegment::new("way/2", InfraType::PaintedLane, west)
                .with_street("Rua Augusta")
                .one_way(),
            InfrastructureSegment::new("way/2", InfraType::Protected, route.clone()),
        ]);

        let result = calculate_coverage(0, Some(&geometry(&route)), &net, &InfraType::ALL, &CoverageConfig::default());
        assert!((result.percentage(InfraType::Protected) - 100.0).abs() < 1e-6);
        assert_eq!(result.overlaps.len(), 1);
        assert_eq!(result.overlaps[0].kind, InfraType::Protected);
    }

    #[test]
    fn test_types_overlap_independently() {
        let route = line(0.0, 0.01);
        let net = network(vec![
            InfrastructureSegment::new("track", InfraType::Protected, route.clone()),
            InfrastructureSegment::new("sidewalk", InfraType::SharedSidewalk, line(0.00005, 0.01)),
        ]);

        let result = calculate_coverage(0, Some(&geometry(&route)), &net, &InfraType::ALL, &CoverageConfig::default());
        assert!(result.total_percentage() > 199.0);
        for pct in result.percentages.values() {
            assert!((0.0..=100.0).contains(pct));
        }
    }

    #[test]
    fn test_adjacent_segments_of_one_type_not_double_counted() {
        let route = line(0.0, 0.01);
        let net = network(vec![
            InfrastructureSegment::new("near", InfraType::Protected, line(0.00003, 0.01)),
            InfrastructureSegment::new("nearer", InfraType::Protected, line(-0.00003, 0.01)),
        ]);

        let result = calculate_coverage(0, Some(&geometry(&route)), &net, &InfraType::ALL, &CoverageConfig::default());
        assert!(result.percentage(InfraType::Protected) <= 100.0);
        assert!(result.percentage(InfraType::Protected) > 99.0);
        assert_eq!(result.overlaps.len(), 2);
    }

    #[test]
    fn test_only_active_types_reported() {
        let route = line(0.0, 0.01);
        let net = network(vec![InfrastructureSegment::new("lane", InfraType::Protected, route.clone())]);

        let result = calculate_coverage(
            0,
            Some(&geometry(&route)),
            &net,
            &[InfraType::PaintedLane],
            &CoverageConfig::default(),
        );
        assert_eq!(result.percentages.len(), 1);
        assert_eq!(result.percentage(InfraType::Protected), 0.0);
        assert!(result.overlaps.is_empty());
    }

    #[test]
    fn test_side_b_duplicates_excluded() {
        let route = line(0.0, 0.01);
        let mut west = line(0.0, 0.01);
        west.reverse();
        let net = network(vec![
            InfrastructureSegment::new("east", InfraType::PaintedLane, line(0.0005, 0.01))
                .with_street("Rua Augusta")
                .one_way(),
            InfrastructureSegment::new("west", InfraType::PaintedLane, west)
                .with_street("Rua Augusta")
                .one_way(),
        ]);

        let result = calculate_coverage(0, Some(&geometry(&route)), &net, &InfraType::ALL, &CoverageConfig::default());
        assert_eq!(result.percentage(InfraType::PaintedLane), 0.0);
    }

    #[test]
    fn test_malformed_geometry_is_zeroed() {
        let net = network(vec![InfrastructureSegment::new("lane", InfraType::Protected, line(0.0, 0.01))]);
        let config = CoverageConfig::default();

        let missing = calculate_coverage(1, None, &net, &InfraType::ALL, &config);
        assert_eq!(missing, CoverageResult::zeroed(1, &InfraType::ALL));

        let point = Geometry::Point(Point::new(0.0, 0.0));
        let not_a_line = calculate_coverage(1, Some(&point), &net, &InfraType::ALL, &config);
        assert_eq!(not_a_line.total_percentage(), 0.0);
        assert!(not_a_line.overlaps.is_empty());

        let multi = Geometry::MultiLineString(MultiLineString::new(vec![
            LineString::new(line(0.0, 0.005).into_iter().map(Coord::from).collect()),
            LineString::new(line(0.0, 0.01).into_iter().skip(10).map(Coord::from).collect()),
        ]));
        assert_eq!(
            calculate_coverage(1, Some(&multi), &net, &InfraType::ALL, &config),
            CoverageResult::zeroed(1, &InfraType::ALL)
        );

        let single = geometry(&[GpsPoint::new(0.0, 0.0)]);
        assert_eq!(calculate_coverage(1, Some(&single), &net, &InfraType::ALL, &config).total_percentage(), 0.0);
    }
}
