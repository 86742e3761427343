//! The classified infrastructure network.
//!
//! Built once from the raw segment set: runs duplicate detection, then indexes every
//! counted edge per [`InfraType`] in an R-tree so coverage queries only look at edges
//! near each route sample.

use std::collections::{BTreeMap, HashMap};

use log::info;
use rstar::{RTree, RTreeObject, AABB};

use crate::duplicates::{detect_duplicates, DuplicateConfig, SegmentAnnotations};
use crate::geo_utils::{distance_to_segment_meters, meters_to_degrees};
use crate::{GpsPoint, InfraType, InfrastructureSegment};

// =============================================================================
// R-tree Indexed Edge for Spatial Queries
// =============================================================================

/// One straight edge of an infrastructure segment.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndexedEdge {
    /// Index into the network's segment list
    pub segment: usize,
    pub start: GpsPoint,
    pub end: GpsPoint,
}

impl RTreeObject for IndexedEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.start.longitude, self.start.latitude],
            [self.end.longitude, self.end.latitude],
        )
    }
}

/// Immutable, classified infrastructure dataset.
#[derive(Debug)]
pub struct InfrastructureNetwork {
    segments: Vec<InfrastructureSegment>,
    annotations: SegmentAnnotations,
    edges: HashMap<InfraType, RTree<IndexedEdge>>,
}

impl InfrastructureNetwork {
    /// Classify a segment set: detect duplicates and build the per-type spatial index.
    ///
    /// Side-`B` duplicate candidates are left out of the index.
    pub fn new(segments: Vec<InfrastructureSegment>, config: &DuplicateConfig) -> Self {
        let start = std::time::Instant::now();
        let annotations = detect_duplicates(&segments, config);

        let mut by_type: HashMap<InfraType, Vec<IndexedEdge>> = HashMap::new();
        for (idx, segment) in segments.iter().enumerate() {
            if !annotations.counts_toward_length(idx) {
                continue;
            }
            let edges = by_type.entry(segment.kind).or_default();
            edges.extend(segment.geometry.windows(2).map(|w| IndexedEdge {
                segment: idx,
                start: w[0],
                end: w[1],
            }));
        }

        let edges: HashMap<InfraType, RTree<IndexedEdge>> = by_type
            .into_iter()
            .map(|(kind, edges)| (kind, RTree::bulk_load(edges)))
            .collect();

        info!(
            "[InfrastructureNetwork] Classified {} segments ({} duplicate candidates) in {:?}",
            segments.len(),
            annotations.duplicate_candidates().count(),
            start.elapsed()
        );

        Self {
            segments,
            annotations,
            edges,
        }
    }

    pub fn segments(&self) -> &[InfrastructureSegment] {
        &self.segments
    }

    pub fn annotations(&self) -> &SegmentAnnotations {
        &self.annotations
    }

    pub fn segment(&self, idx: usize) -> Option<&InfrastructureSegment> {
        self.segments.get(idx)
    }

    /// Segments of `kind` that count toward length and coverage.
    pub fn counted_segments(&self, kind: InfraType) -> impl Iterator<Item = &InfrastructureSegment> {
        self.counted(kind).map(|(_, s)| s)
    }

    fn counted(&self, kind: InfraType) -> impl Iterator<Item = (usize, &InfrastructureSegment)> {
        self.segments
            .iter()
            .enumerate()
            .filter(move |(idx, s)| s.kind == kind && self.annotations.counts_toward_length(*idx))
    }

    /// Total counted length per type, in meters. Every type is present.
    pub fn length_by_type(&self) -> BTreeMap<InfraType, f64> {
        InfraType::ALL
            .iter()
            .map(|&kind| {
                // fold from +0.0: an empty f64 sum is -0.0
                let total = self
                    .counted(kind)
                    .map(|(idx, s)| {
                        self.annotations
                            .get(idx)
                            .map_or_else(|| s.length_meters(), |a| a.length_meters)
                    })
                    .fold(0.0, |acc, len| acc + len);
                (kind, total)
            })
            .collect()
    }

    /// Indices of `kind` segments with an edge within `threshold_meters` of `point`.
    ///
    /// Indices are sorted and unique.
    pub fn segments_near(&self, kind: InfraType, point: &GpsPoint, threshold_meters: f64) -> Vec<usize> {
        let Some(tree) = self.edges.get(&kind) else {
            return Vec::new();
        };

        let pad_lng = meters_to_degrees(threshold_meters, point.latitude);
        let pad_lat = threshold_meters / 110_574.0;
        let search = AABB::from_corners(
            [point.longitude - pad_lng, point.latitude - pad_lat],
            [point.longitude + pad_lng, point.latitude + pad_lat],
        );

        let mut near: Vec<usize> = tree
            .locate_in_envelope_intersecting(&search)
            .filter(|e| distance_to_segment_meters(point, &e.start, &e.end) <= threshold_meters)
            .map(|e| e.segment)
            .collect();
        near.sort_unstable();
        near.dedup();
        near
    }
}
