//! # Duplicate Segment Detection
//!
//! One-way streets are often mapped with one cycle facility per side, drawn as two
//! parallel ways under the same street name. Counting both doubles the street's
//! infrastructure length. This pass labels the sides so only one counts.
//!
//! ## Algorithm
//! 1. Group one-way, named segments by `(type, street name)`; groups under 2 are skipped
//! 2. Average bearing of each segment = mean of its per-vertex bearings
//! 3. `avg_error_delta` = mean |wrapped bearing delta| between each segment and the next
//! 4. Above the threshold, 2-means over the average bearings labels each segment side
//!    `A` or `B` and flags it as a duplicate candidate
//! 5. Length and coverage only count segments that are not side `B`
//!
//! Annotations are returned in a [`SegmentAnnotations`] arena indexed by each segment's
//! position in the input slice, so segments sharing a source id stay distinct. The
//! input segments are never touched.

use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::geo_utils::{average_bearing, normalize_bearing_delta, polyline_length};
use crate::{InfraType, InfrastructureSegment};

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateConfig {
    /// Mean bearing delta (degrees) above which a street group is split into sides.
    /// Empirical. Default: 20.0
    pub bearing_delta_threshold: f64,
    /// Iteration cap for 2-means clustering. Default: 50
    pub max_iterations: u32,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            bearing_delta_threshold: 20.0,
            max_iterations: 50,
        }
    }
}

/// Bearing cluster a duplicate candidate was assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

/// Per-segment result of the duplicate pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAnnotation {
    /// Cluster label; `None` when the segment was not side-split
    pub side: Option<Side>,
    pub duplicate_candidate: bool,
    /// Measured segment length in meters
    pub length_meters: f64,
}

impl SegmentAnnotation {
    /// Whether the segment's length counts toward totals.
    pub fn counts_toward_length(&self) -> bool {
        self.side != Some(Side::B)
    }
}

/// Annotations for one detection pass, parallel to the segment slice it was run on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentAnnotations {
    annotations: Vec<SegmentAnnotation>,
}

impl SegmentAnnotations {
    /// Annotation of the segment at `index` in the input slice.
    pub fn get(&self, index: usize) -> Option<&SegmentAnnotation> {
        self.annotations.get(index)
    }

    /// True unless the segment was labeled side `B`. Unknown indices count.
    pub fn counts_toward_length(&self, index: usize) -> bool {
        self.annotations
            .get(index)
            .map_or(true, SegmentAnnotation::counts_toward_length)
    }

    /// `(index, annotation)` of every flagged segment, in input order.
    pub fn duplicate_candidates(&self) -> impl Iterator<Item = (usize, &SegmentAnnotation)> {
        self.iter().filter(|(_, a)| a.duplicate_candidate)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &SegmentAnnotation)> {
        self.annotations.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }
}

/// Run duplicate detection over a segment set.
///
/// Every segment receives an annotation with its measured length. Segments in a street
/// group whose `avg_error_delta` exceeds the threshold additionally get a side and the
/// duplicate-candidate flag.
///
/// # Example
/// ```
/// use route_coverage::{detect_duplicates, DuplicateConfig, GpsPoint, InfraType, InfrastructureSegment, Side};
///
/// let east = vec![GpsPoint::new(0.0, 0.0), GpsPoint::new(0.0, 0.001)];
/// let west = vec![GpsPoint::new(0.0001, 0.001), GpsPoint::new(0.0001, 0.0)];
///
/// let segments = vec![
///     InfrastructureSegment::new("n", InfraType::PaintedLane, east).with_street("Rua A").one_way(),
///     InfrastructureSegment::new("s", InfraType::PaintedLane, west).with_street("Rua A").one_way(),
/// ];
///
/// let annotations = detect_duplicates(&segments, &DuplicateConfig::default());
/// assert_eq!(annotations.get(0).unwrap().side, Some(Side::A));
/// assert!(!annotations.counts_toward_length(1));
/// ```
pub fn detect_duplicates(
    segments: &[InfrastructureSegment],
    config: &DuplicateConfig,
) -> SegmentAnnotations {
    let mut annotations: Vec<SegmentAnnotation> = segments
        .iter()
        .map(|s| SegmentAnnotation {
            side: None,
            duplicate_candidate: false,
            length_meters: polyline_length(&s.geometry),
        })
        .collect();

    let groups = street_groups(segments);
    let mut split_groups = 0;

    for ((kind, name), members) in &groups {
        // Members have at least 2 points, so every one has a bearing
        let (members, bearings): (Vec<usize>, Vec<f64>) = members
            .iter()
            .filter_map(|&idx| Some((idx, average_bearing(&segments[idx].geometry)?)))
            .unzip();

        let delta = avg_error_delta(&bearings);
        if delta <= config.bearing_delta_threshold {
            debug!(
                "[Duplicates] '{}' ({}): {} segments, avg delta {:.1}° - single side",
                name,
                kind,
                members.len(),
                delta
            );
            continue;
        }

        let labels = two_means(&bearings, config.max_iterations);
        for (idx, label) in members.iter().zip(labels) {
            let annotation = &mut annotations[*idx];
            annotation.side = Some(label);
            annotation.duplicate_candidate = true;
        }
        split_groups += 1;

        debug!(
            "[Duplicates] '{}' ({}): {} segments, avg delta {:.1}° - split into sides",
            name,
            kind,
            members.len(),
            delta
        );
    }

    debug!(
        "[Duplicates] {} segments, {} street groups, {} split",
        segments.len(),
        groups.len(),
        split_groups
    );

    SegmentAnnotations { annotations }
}

/// Group eligible segments by type and street name, dropping groups smaller than 2.
///
/// Eligible: one-way, named, and at least 2 points (so an average bearing exists).
/// Members are input indices in input order.
fn street_groups(segments: &[InfrastructureSegment]) -> BTreeMap<(InfraType, &str), Vec<usize>> {
    let mut groups: BTreeMap<(InfraType, &str), Vec<usize>> = BTreeMap::new();

    for (idx, segment) in segments.iter().enumerate() {
        if !segment.oneway || segment.geometry.len() < 2 {
            continue;
        }
        if let Some(name) = segment.street_name.as_deref() {
            groups.entry((segment.kind, name)).or_default().push(idx);
        }
    }

    groups.retain(|_, members| members.len() >= 2);
    groups
}

/// Mean absolute wrapped bearing delta between consecutive entries.
fn avg_error_delta(bearings: &[f64]) -> f64 {
    if bearings.len() < 2 {
        return 0.0;
    }

    let total: f64 = bearings
        .windows(2)
        .map(|w| normalize_bearing_delta(w[1] - w[0]).abs())
        .sum();
    total / (bearings.len() - 1) as f64
}

/// 1-D 2-means clustering. Cluster 0 (side `A`) is seeded from the first value,
/// cluster 1 from the value farthest from it.
fn two_means(values: &[f64], max_iterations: u32) -> Vec<Side> {
    let Some(&first) = values.first() else {
        return Vec::new();
    };
    let farthest = values
        .iter()
        .copied()
        .fold(first, |best, v| if (v - first).abs() > (best - first).abs() { v } else { best });

    let mut centroids = [first, farthest];
    let mut labels = vec![Side::A; values.len()];

    for _ in 0..max_iterations.max(1) {
        let mut changed = false;
        for (label, &v) in labels.iter_mut().zip(values) {
            let side = if (v - centroids[0]).abs() <= (v - centroids[1]).abs() {
                Side::A
            } else {
                Side::B
            };
            if *label != side {
                *label = side;
                changed = true;
            }
        }

        for (i, side) in [Side::A, Side::B].into_iter().enumerate() {
            let members: Vec<f64> = labels
                .iter()
                .zip(values)
                .filter(|(l, _)| **l == side)
                .map(|(_, v)| *v)
                .collect();
            if !members.is_empty() {
                centroids[i] = members.iter().sum::<f64>() / members.len() as f64;
            }
        }

        if !changed {
            break;
        }
    }

    labels
}
