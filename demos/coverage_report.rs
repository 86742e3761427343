//! Coverage and score of a few hand-made routes against a small network.
//!
//! Run with: cargo run --example coverage_report

use geo::{Coord, Geometry, LineString};
use route_coverage::{
    calculate_coverage, score_coverage, CoverageConfig, DuplicateConfig, GpsPoint, InfraType,
    InfrastructureNetwork, InfrastructureSegment,
};

/// Straight line from `from` to `to` with a vertex every ~50m.
fn street(from: GpsPoint, to: GpsPoint) -> Vec<GpsPoint> {
    let steps = 20;
    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            GpsPoint::new(
                from.latitude + (to.latitude - from.latitude) * t,
                from.longitude + (to.longitude - from.longitude) * t,
            )
        })
        .collect()
}

fn as_geometry(points: &[GpsPoint]) -> Geometry<f64> {
    Geometry::LineString(LineString::new(points.iter().map(|&p| Coord::from(p)).collect()))
}

fn main() {
    // Avenida Paulista area, São Paulo
    let a = GpsPoint::new(-23.5614, -46.6559);
    let b = GpsPoint::new(-23.5614, -46.6459);
    let c = GpsPoint::new(-23.5694, -46.6459);

    // Painted lanes on both sides of a one-way street: the second is a duplicate
    let mut westbound = street(GpsPoint::new(-23.56145, -46.6559), GpsPoint::new(-23.56145, -46.6459));
    westbound.reverse();

    let segments = vec![
        InfrastructureSegment::new("way/1", InfraType::Protected, street(a, b)),
        InfrastructureSegment::new("way/2", InfraType::PaintedLane, street(b, c))
            .with_street("Rua Augusta")
            .one_way(),
        InfrastructureSegment::new("way/3", InfraType::PaintedLane, westbound)
            .with_street("Rua Augusta")
            .one_way(),
        InfrastructureSegment::new("way/4", InfraType::SharedSidewalk, street(c, a)),
    ];

    let network = InfrastructureNetwork::new(segments, &DuplicateConfig::default());

    println!("Infrastructure Network\n");
    for (kind, meters) in network.length_by_type() {
        println!("   {:<16} {:>8.0}m", kind, meters);
    }
    println!("   Duplicates: {}\n", network.annotations().duplicate_candidates().count());

    let routes = [
        ("protected only", street(a, b)),
        ("protected then painted", [street(a, b), street(b, c)].concat()),
        ("sidewalk", street(c, a)),
        ("off network", street(GpsPoint::new(-23.58, -46.66), GpsPoint::new(-23.58, -46.65))),
    ];

    let config = CoverageConfig::default();
    println!("Routes\n");
    for (i, (name, points)) in routes.iter().enumerate() {
        let coverage = calculate_coverage(i, Some(&as_geometry(points)), &network, &InfraType::ALL, &config);

        match score_coverage(&coverage.percentages) {
            Some(score) => println!("{}. {} - score {} ({})", i + 1, name, score.score, score.tier),
            None => println!("{}. {} - unscored", i + 1, name),
        }
        for (kind, pct) in &coverage.percentages {
            if *pct > 0.0 {
                println!("   {:<16} {:>5.1}%", kind, pct);
            }
        }
        for overlap in &coverage.overlaps {
            println!("   along {} for {:.0}m", overlap.segment_id, overlap.length_meters);
        }
        println!();
    }
}
