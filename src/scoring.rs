//! Route quality score from a coverage breakdown.
//!
//! `score = round(Σ percentage × weight)`, clamped to 100, with weights from 1.0 for
//! protected infrastructure down to 0.4 for shared sidewalks. A route with no coverage
//! at all scores exactly 0.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coverage::CoverageResult;
use crate::InfraType;

/// Display tier for a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Below 50
    Poor,
    /// 50 to 74
    Medium,
    /// 75 and above
    Good,
}

impl Tier {
    pub fn from_score(score: u32) -> Self {
        match score {
            0..=49 => Tier::Poor,
            50..=74 => Tier::Medium,
            _ => Tier::Good,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Poor => "poor",
            Tier::Medium => "medium",
            Tier::Good => "good",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// Score and tier of one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteScore {
    /// 0-100
    pub score: u32,
    pub tier: Tier,
}

/// Quality weight of an infrastructure type.
pub fn weight(kind: InfraType) -> f64 {
    match kind {
        InfraType::Protected => 1.0,
        InfraType::PaintedLane => 0.8,
        InfraType::SuggestedRoute => 0.6,
        InfraType::SharedSidewalk => 0.4,
    }
}

/// Score a per-type percentage map.
///
/// Returns `None` if any percentage is negative or not finite.
///
/// # Example
/// ```
/// use std::collections::BTreeMap;
/// use route_coverage::{score_coverage, InfraType, Tier};
///
/// let worst = BTreeMap::from([(InfraType::SharedSidewalk, 100.0)]);
/// let score = score_coverage(&worst).unwrap();
/// assert_eq!(score.score, 40);
/// assert_eq!(score.tier, Tier::Poor);
/// ```
pub fn score_coverage(percentages: &BTreeMap<InfraType, f64>) -> Option<RouteScore> {
    if percentages.values().any(|p| !p.is_finite() || *p < 0.0) {
        return None;
    }

    let total: f64 = percentages.values().sum();
    let score = if total == 0.0 {
        0
    } else {
        let weighted: f64 = percentages
            .iter()
            .map(|(&kind, &pct)| pct * weight(kind))
            .sum();
        weighted.round().min(100.0) as u32
    };

    Some(RouteScore {
        score,
        tier: Tier::from_score(score),
    })
}

/// Score a coverage result; absent coverage has no score.
pub fn score_route(coverage: Option<&CoverageResult>) -> Option<RouteScore> {
    coverage.and_then(|c| score_coverage(&c.percentages))
}
