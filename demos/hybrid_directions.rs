//! Hybrid directions across every configured provider, ranked by coverage score.
//!
//! Reads `GRAPHHOPPER_API_KEY`, `OPENROUTESERVICE_API_KEY` and `MAPBOX_ACCESS_TOKEN`;
//! providers without a key fail and are skipped. Valhalla needs no key.
//!
//! Run with: RUST_LOG=info cargo run --example hybrid_directions

use route_coverage::{
    AggregatorConfig, DuplicateConfig, GpsPoint, InfraType, InfrastructureNetwork,
    InfrastructureSegment, Provider, ProviderCredentials, ProviderSelection, RouteAggregator,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let origin = GpsPoint::new(-23.5614, -46.6559);
    let destination = GpsPoint::new(-23.5874, -46.6576);

    // Ciclovia along Avenida Paulista and a painted lane heading south
    let network = InfrastructureNetwork::new(
        vec![
            InfrastructureSegment::new(
                "paulista",
                InfraType::Protected,
                vec![
                    GpsPoint::new(-23.5614, -46.6559),
                    GpsPoint::new(-23.5635, -46.6538),
                    GpsPoint::new(-23.5660, -46.6510),
                ],
            ),
            InfrastructureSegment::new(
                "brigadeiro",
                InfraType::PaintedLane,
                vec![
                    GpsPoint::new(-23.5700, -46.6480),
                    GpsPoint::new(-23.5790, -46.6530),
                    GpsPoint::new(-23.5874, -46.6576),
                ],
            ),
        ],
        &DuplicateConfig::default(),
    );

    let providers = Provider::all(&ProviderCredentials::from_env())?;
    let aggregator = RouteAggregator::new(providers, AggregatorConfig::default());

    let result = aggregator
        .calculate_directions(origin, destination, ProviderSelection::Hybrid, &network, &InfraType::ALL)
        .await?;

    println!("{} routes\n", result.routes.len());
    for scored in &result.routes {
        let provider = scored.route.provider.map(|p| p.name()).unwrap_or("?");
        let score = scored
            .score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let tier = scored.tier.map(|t| t.as_str()).unwrap_or("-");
        println!(
            "#{} {:<16} {:>6.0}m {:>5.0}s  score {:>3} ({})",
            scored.sorted_index, provider, scored.route.distance, scored.route.duration, score, tier
        );
        for (kind, pct) in &scored.coverage {
            println!("     {:<16} {:>5.1}%", kind, pct);
        }
    }

    if let Some(bbox) = result.bbox {
        println!("\nbbox: {:?}", bbox);
    }
    Ok(())
}
