//! # Route Aggregation
//!
//! Obtains candidate routes from one provider or from every configured provider at
//! once, attaches coverage and score to each, ranks them, and bounds the result.
//!
//! ## Modes
//! - **Single**: one request; its error is returned as-is; every alternative is kept
//! - **Hybrid**: one request per provider, all in flight together; a failing provider
//!   contributes nothing, and only a failure of every provider is an error. Results
//!   are truncated to `max_hybrid_routes`.
//!
//! Ranking is score descending, then total coverage descending. The sort is stable, so
//! the final order never depends on which provider answered first.

use futures::future::join_all;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::coverage::{calculate_coverage, CoverageConfig, CoverageResult};
use crate::error::{Result, RouteError};
use crate::network::InfrastructureNetwork;
use crate::providers::{DirectionsOptions, DirectionsProvider, DirectionsResponse, ProviderKind, Route, Waypoint};
use crate::scoring::{score_coverage, Tier};
use crate::{Bounds, GpsPoint, InfraType};

/// Configuration for route aggregation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Maximum routes kept in hybrid mode. Default: 5
    pub max_hybrid_routes: usize,
    pub coverage: CoverageConfig,
    pub options: DirectionsOptions,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_hybrid_routes: 5,
            coverage: CoverageConfig::default(),
            options: DirectionsOptions::default(),
        }
    }
}

/// Which providers a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderSelection {
    Single(ProviderKind),
    Hybrid,
}

/// A route with its coverage breakdown and score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRoute {
    pub route: Route,
    /// Position in the ranked list; key shared with the paired [`CoverageResult`]
    pub sorted_index: usize,
    pub coverage: BTreeMap<InfraType, f64>,
    /// `None` when coverage could not be scored
    pub score: Option<u32>,
    pub tier: Option<Tier>,
}

/// Ranked routes of one aggregation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub routes: Vec<ScoredRoute>,
    /// Parallel to `routes`: `coverage[i].sorted_index == Some(i)`
    pub coverage: Vec<CoverageResult>,
    pub waypoints: Vec<Waypoint>,
    pub bbox: Option<Bounds>,
}

impl AggregationResult {
    /// Route and coverage with the given `sorted_index`.
    pub fn get(&self, sorted_index: usize) -> Option<(&ScoredRoute, &CoverageResult)> {
        Some((self.routes.get(sorted_index)?, self.coverage.get(sorted_index)?))
    }
}

/// Route aggregation service, constructed with its providers.
///
/// Holds no per-request state, so independent calls may run concurrently.
#[derive(Debug)]
pub struct RouteAggregator<P> {
    providers: Vec<P>,
    config: AggregatorConfig,
}

/// A scored candidate before ranking.
struct Candidate {
    route: Route,
    coverage: CoverageResult,
    score: Option<u32>,
    tier: Option<Tier>,
}

impl<P: DirectionsProvider> RouteAggregator<P> {
    pub fn new(providers: Vec<P>, config: AggregatorConfig) -> Self {
        Self { providers, config }
    }

    pub fn providers(&self) -> &[P] {
        &self.providers
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Fetch, score and rank routes between two points.
    pub async fn calculate_directions(
        &self,
        origin: GpsPoint,
        destination: GpsPoint,
        selection: ProviderSelection,
        network: &InfrastructureNetwork,
        active: &[InfraType],
    ) -> Result<AggregationResult> {
        let start = std::time::Instant::now();

        let (response, limit) = match selection {
            ProviderSelection::Single(kind) => {
                let response = self.request_single(kind, origin, destination).await?;
                (response, None)
            }
            ProviderSelection::Hybrid => {
                let response = self.request_hybrid(origin, destination).await?;
                (response, Some(self.config.max_hybrid_routes))
            }
        };

        let DirectionsResponse { routes, waypoints, bbox } = response;
        let candidates = routes
            .into_iter()
            .enumerate()
            .map(|(i, route)| self.score_candidate(i, route, network, active))
            .collect();

        let (routes, coverage) = rank(candidates, limit);

        info!(
            "[RouteAggregator] {:?}: {} routes ranked in {:?}",
            selection,
            routes.len(),
            start.elapsed()
        );

        Ok(AggregationResult {
            routes,
            coverage,
            waypoints,
            bbox,
        })
    }

    async fn request_single(
        &self,
        kind: ProviderKind,
        origin: GpsPoint,
        destination: GpsPoint,
    ) -> Result<DirectionsResponse> {
        let provider = self
            .providers
            .iter()
            .find(|p| p.kind() == kind)
            .ok_or(RouteError::ProviderNotConfigured(kind))?;

        let mut response = provider
            .get_directions(origin, destination, &self.config.options)
            .await?;
        for route in &mut response.routes {
            route.provider = Some(kind);
        }
        Ok(response)
    }

    /// Query every provider concurrently and merge the successful responses.
    async fn request_hybrid(&self, origin: GpsPoint, destination: GpsPoint) -> Result<DirectionsResponse> {
        if self.providers.is_empty() {
            return Err(RouteError::NoProviders);
        }

        let requests = self.providers.iter().map(|p| async move {
            let result = p.get_directions(origin, destination, &self.config.options).await;
            (p.kind(), result)
        });
        // Settled in provider order regardless of completion order
        let settled = join_all(requests).await;

        let mut merged = DirectionsResponse::default();
        let mut failures = Vec::new();

        for (kind, result) in settled {
            match result {
                Ok(response) => {
                    info!("[RouteAggregator] {} returned {} routes", kind, response.routes.len());
                    merge_response(&mut merged, kind, response);
                }
                Err(e) => {
                    warn!("[RouteAggregator] {} failed: {}", kind, e);
                    failures.push(e);
                }
            }
        }

        if failures.len() == self.providers.len() {
            return Err(RouteError::AllProvidersFailed(failures));
        }
        Ok(merged)
    }

    fn score_candidate(
        &self,
        route_index: usize,
        route: Route,
        network: &InfrastructureNetwork,
        active: &[InfraType],
    ) -> Candidate {
        let coverage = calculate_coverage(
            route_index,
            route.geometry.as_ref(),
            network,
            active,
            &self.config.coverage,
        );
        let score = score_coverage(&coverage.percentages);
        Candidate {
            route,
            score: score.map(|s| s.score),
            tier: score.map(|s| s.tier),
            coverage,
        }
    }
}

/// Fold one provider's response into the merged response.
///
/// Routes are tagged and appended; the bbox grows to cover both; waypoints are kept
/// from the first response that had any.
fn merge_response(merged: &mut DirectionsResponse, kind: ProviderKind, response: DirectionsResponse) {
    merged.routes.extend(response.routes.into_iter().map(|mut r| {
        r.provider = Some(kind);
        r
    }));

    merged.bbox = match (merged.bbox, response.bbox) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, b) => a.or(b),
    };

    if merged.waypoints.is_empty() {
        merged.waypoints = response.waypoints;
    }
}

/// Ranking order: score descending (unscored last), then total coverage descending.
fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| b.coverage.total_percentage().total_cmp(&a.coverage.total_percentage()))
}

/// Sort, optionally truncate, and assign `sorted_index` to routes and coverage alike.
fn rank(mut candidates: Vec<Candidate>, limit: Option<usize>) -> (Vec<ScoredRoute>, Vec<CoverageResult>) {
    candidates.sort_by(compare_candidates);
    if let Some(limit) = limit {
        candidates.truncate(limit);
    }

    candidates
        .into_iter()
        .enumerate()
        .map(|(sorted_index, c)| {
            let mut coverage = c.coverage;
            coverage.sorted_index = Some(sorted_index);
            let scored = ScoredRoute {
                route: c.route,
                sorted_index,
                coverage: coverage.percentages.clone(),
                score: c.score,
                tier: c.tier,
            };
            (scored, coverage)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(score: Option<u32>, total: f64) -> Candidate {
        let mut coverage = CoverageResult::zeroed(0, &[InfraType::Protected]);
        coverage.percentages.insert(InfraType::Protected, total);
        Candidate {
            route: Route::new(None, total, 0.0),
            coverage,
            score,
            tier: score.map(Tier::from_score),
        }
    }

    #[test]
    fn test_rank_orders_by_score_then_coverage() {
        let (routes, coverage) = rank(
            vec![
                candidate(Some(40), 40.0),
                candidate(None, 0.0),
                candidate(Some(80), 85.0),
                candidate(Some(80), 90.0),
            ],
            None,
        );

        let order: Vec<(Option<u32>, f64)> = routes.iter().map(|r| (r.score, r.route.distance)).collect();
        assert_eq!(order, vec![(Some(80), 90.0), (Some(80), 85.0), (Some(40), 40.0), (None, 0.0)]);
        for (i, (r, c)) in routes.iter().zip(&coverage).enumerate() {
            assert_eq!(r.sorted_index, i);
            assert_eq!(c.sorted_index, Some(i));
        }
    }

    #[test]
    fn test_rank_is_idempotent() {
        let (routes, coverage) = rank(
            vec![
                candidate(Some(55), 60.0),
                candidate(Some(90), 95.0),
                candidate(None, 0.0),
                candidate(Some(55), 70.0),
                candidate(Some(55), 60.0),
            ],
            None,
        );
        let again: Vec<Candidate> = routes
            .iter()
            .zip(&coverage)
            .map(|(r, c)| Candidate {
                route: r.route.clone(),
                coverage: c.clone(),
                score: r.score,
                tier: r.tier,
            })
            .collect();
        let (reranked, _) = rank(again, None);
        assert_eq!(reranked, routes);
    }

    #[test]
    fn test_rank_truncates_to_best() {
        let candidates = (0..9).map(|i| candidate(Some(i * 10), i as f64 * 10.0)).collect();
        let (routes, coverage) = rank(candidates, Some(5));
        assert_eq!(routes.len(), 5);
        assert_eq!(coverage.len(), 5);
        let scores: Vec<u32> = routes.iter().filter_map(|r| r.score).collect();
        assert_eq!(scores, vec![80, 70, 60, 50, 40]);
    }

    #[test]
    fn test_merge_response_bbox_union_and_first_waypoints() {
        let mut merged = DirectionsResponse::default();
        let wp = |lat: f64| Waypoint { name: None, location: GpsPoint::new(lat, 0.0) };

        merge_response(
            &mut merged,
            ProviderKind::Mapbox,
            DirectionsResponse {
                routes: vec![Route::new(None, 1.0, 1.0)],
                waypoints: vec![],
                bbox: Some(Bounds { min_lat: 0.0, max_lat: 1.0, min_lng: 0.0, max_lng: 1.0 }),
            },
        );
        merge_response(
            &mut merged,
            ProviderKind::Valhalla,
            DirectionsResponse {
                routes: vec![Route::new(None, 2.0, 2.0)],
                waypoints: vec![wp(1.0)],
                bbox: Some(Bounds { min_lat: -1.0, max_lat: 0.5, min_lng: 0.5, max_lng: 2.0 }),
            },
        );
        merge_response(
            &mut merged,
            ProviderKind::GraphHopper,
            DirectionsResponse {
                routes: vec![],
                waypoints: vec![wp(2.0)],
                bbox: None,
            },
        );

        assert_eq!(merged.routes[0].provider, Some(ProviderKind::Mapbox));
        assert_eq!(merged.routes[1].provider, Some(ProviderKind::Valhalla));
        assert_eq!(merged.bbox, Some(Bounds { min_lat: -1.0, max_lat: 1.0, min_lng: 0.0, max_lng: 2.0 }));
        assert_eq!(merged.waypoints, vec![wp(1.0)]);
    }

    // ------------------------------------------------------------------------
    // End-to-end with stub providers
    // ------------------------------------------------------------------------

    use crate::{DuplicateConfig, InfrastructureSegment};
    use geo::{Coord, Geometry, LineString};
    use std::time::Duration;

    struct Stub {
        kind: ProviderKind,
        delay_ms: u64,
        result: Result<DirectionsResponse>,
    }

    impl DirectionsProvider for Stub {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn get_directions(
            &self,
            _origin: GpsPoint,
            _destination: GpsPoint,
            _options: &DirectionsOptions,
        ) -> Result<DirectionsResponse> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            self.result.clone()
        }
    }

    fn ok(kind: ProviderKind, delay_ms: u64, routes: Vec<Route>) -> Stub {
        Stub {
            kind,
            delay_ms,
            result: Ok(DirectionsResponse {
                routes,
                waypoints: vec![Waypoint { name: Some(kind.to_string()), location: GpsPoint::new(0.0, 0.0) }],
                bbox: None,
            }),
        }
    }

    fn failing(kind: ProviderKind) -> Stub {
        Stub {
            kind,
            delay_ms: 0,
            result: Err(RouteError::Provider { provider: kind, message: "unavailable".to_string() }),
        }
    }

    /// East-west route at `lat`, 0.01° long.
    fn route_at(lat: f64) -> Route {
        let coords: Vec<Coord<f64>> = (0..=20).map(|i| Coord { x: i as f64 * 0.0005, y: lat }).collect();
        Route::new(Some(Geometry::LineString(LineString::new(coords))), 1100.0, 240.0)
    }

    /// A protected lane along lat 0 and a painted lane along lat 0.01.
    fn network() -> InfrastructureNetwork {
        let line = |lat: f64| (0..=20).map(|i| GpsPoint::new(lat, i as f64 * 0.0005)).collect();
        InfrastructureNetwork::new(
            vec![
                InfrastructureSegment::new("protected", InfraType::Protected, line(0.0)),
                InfrastructureSegment::new("painted", InfraType::PaintedLane, line(0.01)),
            ],
            &DuplicateConfig::default(),
        )
    }

    async fn hybrid(aggregator: &RouteAggregator<Stub>) -> Result<AggregationResult> {
        aggregator
            .calculate_directions(
                GpsPoint::new(0.0, 0.0),
                GpsPoint::new(0.0, 0.01),
                ProviderSelection::Hybrid,
                &network(),
                &InfraType::ALL,
            )
            .await
    }

    fn with_bbox(mut stub: Stub, bbox: Bounds) -> Stub {
        if let Ok(response) = &mut stub.result {
            response.bbox = Some(bbox);
        }
        stub
    }

    #[tokio::test]
    async fn test_hybrid_tolerates_partial_failure() {
        let aggregator = RouteAggregator::new(
            vec![
                failing(ProviderKind::GraphHopper),
                with_bbox(
                    ok(ProviderKind::OpenRouteService, 5, vec![route_at(0.02)]),
                    Bounds { min_lat: 0.0, max_lat: 0.02, min_lng: 0.0, max_lng: 0.01 },
                ),
                failing(ProviderKind::Mapbox),
                with_bbox(
                    ok(ProviderKind::Valhalla, 0, vec![route_at(0.0), route_at(0.01)]),
                    Bounds { min_lat: -0.001, max_lat: 0.01, min_lng: 0.0, max_lng: 0.012 },
                ),
            ],
            AggregatorConfig::default(),
        );

        let result = hybrid(&aggregator).await.unwrap();

        assert_eq!(result.routes.len(), 3);
        assert_eq!(result.coverage.len(), 3);
        // Protected (100) > painted (80) > nothing (0)
        assert_eq!(result.routes[0].score, Some(100));
        assert_eq!(result.routes[0].tier, Some(Tier::Good));
        assert_eq!(result.routes[0].route.provider, Some(ProviderKind::Valhalla));
        assert_eq!(result.routes[1].score, Some(80));
        assert_eq!(result.routes[2].score, Some(0));
        assert_eq!(result.routes[2].tier, Some(Tier::Poor));
        assert_eq!(result.routes[2].route.provider, Some(ProviderKind::OpenRouteService));

        for (i, (route, coverage)) in result.routes.iter().zip(&result.coverage).enumerate() {
            assert_eq!(route.sorted_index, i);
            assert_eq!(coverage.sorted_index, Some(i));
            assert_eq!(route.coverage, coverage.percentages);
        }
        assert_eq!(
            result.bbox,
            Some(Bounds { min_lat: -0.001, max_lat: 0.02, min_lng: 0.0, max_lng: 0.012 })
        );
        // First successful provider in configured order, not first to answer
        assert_eq!(result.waypoints[0].name.as_deref(), Some("openrouteservice"));
    }

    #[tokio::test]
    async fn test_hybrid_all_failed() {
        let aggregator = RouteAggregator::new(
            ProviderKind::ALL.iter().map(|&k| failing(k)).collect(),
            AggregatorConfig::default(),
        );

        match hybrid(&aggregator).await {
            Err(RouteError::AllProvidersFailed(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected AllProvidersFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hybrid_without_providers() {
        let aggregator: RouteAggregator<Stub> = RouteAggregator::new(Vec::new(), AggregatorConfig::default());
        assert!(matches!(hybrid(&aggregator).await, Err(RouteError::NoProviders)));
    }

    #[tokio::test]
    async fn test_hybrid_truncates_to_max_routes() {
        let providers = vec![
            ok(ProviderKind::GraphHopper, 0, vec![route_at(0.02), route_at(0.0), route_at(0.03)]),
            ok(ProviderKind::OpenRouteService, 0, vec![route_at(0.04), route_at(0.05), route_at(0.01)]),
            ok(ProviderKind::Valhalla, 0, vec![route_at(0.06), route_at(0.07), route_at(0.08)]),
        ];
        let aggregator = RouteAggregator::new(providers, AggregatorConfig::default());

        let result = hybrid(&aggregator).await.unwrap();

        assert_eq!(result.routes.len(), 5);
        assert_eq!(result.coverage.len(), 5);
        // The two covered routes survive truncation
        assert_eq!(result.routes[0].score, Some(100));
        assert_eq!(result.routes[1].score, Some(80));
    }

    #[tokio::test]
    async fn test_order_independent_of_arrival() {
        let build = |slow: ProviderKind| {
            let delay = |k: ProviderKind| if k == slow { 20 } else { 0 };
            RouteAggregator::new(
                vec![
                    ok(ProviderKind::GraphHopper, delay(ProviderKind::GraphHopper), vec![route_at(0.02)]),
                    ok(ProviderKind::Mapbox, delay(ProviderKind::Mapbox), vec![route_at(0.03)]),
                ],
                AggregatorConfig::default(),
            )
        };

        let a = hybrid(&build(ProviderKind::GraphHopper)).await.unwrap();
        let b = hybrid(&build(ProviderKind::Mapbox)).await.unwrap();

        let providers = |r: &AggregationResult| r.routes.iter().map(|s| s.route.provider).collect::<Vec<_>>();
        assert_eq!(providers(&a), providers(&b));
        assert_eq!(providers(&a), vec![Some(ProviderKind::GraphHopper), Some(ProviderKind::Mapbox)]);
    }

    #[tokio::test]
    async fn test_single_mode() {
        let aggregator = RouteAggregator::new(
            vec![
                ok(ProviderKind::Mapbox, 0, (0..7).map(|i| route_at(0.02 + i as f64 * 0.01)).collect()),
                failing(ProviderKind::Valhalla),
            ],
            AggregatorConfig::default(),
        );
        let net = network();
        let (aggregator, net) = (&aggregator, &net);
        let run = move |selection| {
            aggregator.calculate_directions(
                GpsPoint::new(0.0, 0.0),
                GpsPoint::new(0.0, 0.01),
                selection,
                net,
                &InfraType::ALL,
            )
        };

        // No truncation in single mode
        let result = run(ProviderSelection::Single(ProviderKind::Mapbox)).await.unwrap();
        assert_eq!(result.routes.len(), 7);
        assert!(result.routes.iter().all(|r| r.route.provider == Some(ProviderKind::Mapbox)));

        assert!(matches!(
            run(ProviderSelection::Single(ProviderKind::Valhalla)).await,
            Err(RouteError::Provider { provider: ProviderKind::Valhalla, .. })
        ));
        assert!(matches!(
            run(ProviderSelection::Single(ProviderKind::GraphHopper)).await,
            Err(RouteError::ProviderNotConfigured(ProviderKind::GraphHopper))
        ));
    }
}
