use serde::{Deserialize, Serialize};

use crate::affordability::DEFAULT_TARGET_RATIO;
use crate::models::{NeighbourhoodRecord, Preferences, PropertyType};

/// Weighted-sum scoring configuration. Designed to sum to 1 but not
/// required to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub affordability: f64,
    pub transit: f64,
    pub distance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            affordability: 0.5,
            transit: 0.3,
            distance: 0.2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SuggestRequest {
    pub property_type: PropertyType,
    pub income_annual: f64,
    pub prefs: Preferences,
    pub listing_price: Option<f64>,
    pub budget_cap: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub name: String,
    pub median: f64,
    pub rent_diff_vs_listing: i64,
    pub rent_to_income: f64,
    pub transit: u8,
    pub distance_km: f64,
    pub score: f64,
    pub why: String,
}

/// Filter and score neighbourhoods against the user's budget and
/// preferences, returning the top three by descending score. An empty
/// result is a valid answer, not an error; the caller attaches the
/// `no_neighbourhood_passed_filters` reason.
pub fn suggest_neighbourhoods(
    rows: &[NeighbourhoodRecord],
    request: &SuggestRequest,
    weights: ScoringWeights,
) -> Vec<Recommendation> {
    let income_monthly = request.income_annual / 12.0;
    if income_monthly <= 0.0 {
        return Vec::new();
    }

    let target_rti = request
        .prefs
        .target_rent_to_income
        .unwrap_or(DEFAULT_TARGET_RATIO);

    let price_ref = request.listing_price.unwrap_or_else(|| {
        request
            .budget_cap
            .unwrap_or_else(|| round2(income_monthly * target_rti))
    });

    let mut scored = Vec::new();
    for row in rows {
        // Rows without a median for the requested property type never
        // reach listing or scoring.
        let Some(median) = row.median_for(request.property_type) else {
            continue;
        };

        let transit = row.transit_score().unwrap_or(0);
        let distance = row.distance();

        // Hard filters, not scoring penalties. A disabled preference
        // (None) skips its filter entirely.
        if let Some(max_distance) = request.prefs.max_distance_km {
            if distance > max_distance {
                continue;
            }
        }
        if let Some(min_transit) = request.prefs.min_transit {
            if f64::from(transit) < min_transit {
                continue;
            }
        }
        let rti = median / income_monthly;
        if rti > target_rti {
            continue;
        }

        let affordability = affordability_component(rti, target_rti);
        let transit_norm = (f64::from(transit) / 100.0).clamp(0.0, 1.0);
        let distance_comp = distance_component(distance, request.prefs.max_distance_km);
        let score = weights.affordability * affordability
            + weights.transit * transit_norm
            + weights.distance * distance_comp;

        let rent_diff = median - price_ref;
        scored.push(Recommendation {
            name: row.name.clone(),
            median,
            rent_diff_vs_listing: rent_diff as i64,
            rent_to_income: round3(rti),
            transit,
            distance_km: distance,
            score: round3(score),
            why: why_line(rent_diff, rti, transit, &request.prefs, target_rti),
        });
    }

    // Stable sort: ties keep snapshot order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(3);
    scored
}

/// clamp(1 - max(0, rti - target) / max(target, 0.01), 0, 1). For rows that
/// survive the hard rti filter the `over` term is always zero; kept intact
/// for a future soft-filter mode.
fn affordability_component(rti: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    let over = (rti - target).max(0.0);
    (1.0 - over / target.max(0.01)).clamp(0.0, 1.0)
}

fn distance_component(distance_km: f64, max_distance_km: Option<f64>) -> f64 {
    match max_distance_km {
        Some(max) if max > 0.0 => 1.0 - (distance_km / max).min(1.0),
        _ => 0.0,
    }
}

fn why_line(rent_diff: f64, rti: f64, transit: u8, prefs: &Preferences, target: f64) -> String {
    let mut parts = Vec::with_capacity(3);

    if rent_diff < 0.0 {
        parts.push(format!("Cheaper by ${}/mo", rent_diff.abs() as i64));
    } else {
        parts.push(format!("${}/mo above your price", rent_diff as i64));
    }

    let min_transit = prefs.min_transit.unwrap_or(0.0) as i64;
    if i64::from(transit) >= min_transit {
        parts.push(format!("meets transit \u{2265}{min_transit}"));
    }

    let target_pct = (target * 100.0) as i64;
    if rti <= target {
        parts.push(format!("at or below {target_pct}% RTI"));
    } else {
        parts.push(format!("near {target_pct}% target"));
    }

    format!("{}.", parts.join("; "))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}
