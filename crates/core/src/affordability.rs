use serde::{Deserialize, Serialize};

use crate::error::RentError;

/// ±2% around the city median counts as "near market".
const MARKET_BAND: f64 = 0.02;
/// ±2% around the target ratio counts as "near target".
const RATIO_TOL: f64 = 0.02;

pub const DEFAULT_TARGET_RATIO: f64 = 0.30;

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AffordabilityInput {
    pub listing_price: f64,
    pub city_median: f64,
    pub income_annual: f64,
    pub target_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordabilityReport {
    pub delta_pct: f64,
    pub rti: f64,
    pub verdict: String,
}

/// Compute affordability metrics and a fixed-literal verdict.
///
/// Non-positive listing price, city median, or income is a hard input
/// error. `target_ratio` is used as-is even outside (0, 1); see DESIGN.md.
pub fn evaluate_affordability(input: AffordabilityInput) -> Result<AffordabilityReport, RentError> {
    if input.listing_price <= 0.0 || input.city_median <= 0.0 || input.income_annual <= 0.0 {
        return Err(RentError::InvalidInput(format!(
            "listing_price={}, city_median={}, income_annual={} must all be positive",
            input.listing_price, input.city_median, input.income_annual
        )));
    }

    let delta_pct = (input.listing_price - input.city_median) / input.city_median;
    let income_monthly = input.income_annual / 12.0;
    let rti = input.listing_price / income_monthly;

    Ok(AffordabilityReport {
        delta_pct: round4(delta_pct),
        rti: round4(rti),
        verdict: verdict(delta_pct, rti, input.target_ratio).to_string(),
    })
}

/// The seven fixed verdict strings. Mixed above/below combinations collapse
/// into the final near/near literal, matching the published contract.
fn verdict(delta_pct: f64, rti: f64, target_ratio: f64) -> &'static str {
    let above_market = delta_pct > MARKET_BAND;
    let below_market = delta_pct < -MARKET_BAND;
    let near_market = !above_market && !below_market;

    let above_target = rti > target_ratio + RATIO_TOL;
    let below_target = rti < target_ratio - RATIO_TOL;
    let near_target = !above_target && !below_target;

    if above_market && above_target {
        return "Above market and above target ratio";
    }
    if above_market && near_target {
        return "Above market; near target ratio";
    }
    if near_market && above_target {
        return "Near market; above target ratio";
    }
    if below_market && below_target {
        return "Below market and below target ratio";
    }
    if below_market && near_target {
        return "Below market; near target ratio";
    }
    if near_market && below_target {
        return "Near market; below target ratio";
    }
    "Near market and near target ratio"
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    pub const ALL_VERDICTS: [&str; 7] = [
        "Above market and above target ratio",
        "Above market; near target ratio",
        "Near market; above target ratio",
        "Below market and below target ratio",
        "Below market; near target ratio",
        "Near market; below target ratio",
        "Near market and near target ratio",
    ];

    fn evaluate(listing: f64, median: f64, income: f64) -> AffordabilityReport {
        evaluate_affordability(AffordabilityInput {
            listing_price: listing,
            city_median: median,
            income_annual: income,
            target_ratio: DEFAULT_TARGET_RATIO,
        })
        .unwrap()
    }

    #[test]
    fn rejects_non_positive_inputs() {
        for (listing, median, income) in [(0.0, 2500.0, 80000.0), (2200.0, -1.0, 80000.0), (2200.0, 2500.0, 0.0)] {
            let result = evaluate_affordability(AffordabilityInput {
                listing_price: listing,
                city_median: median,
                income_annual: income,
                target_ratio: DEFAULT_TARGET_RATIO,
            });
            assert!(matches!(result, Err(RentError::InvalidInput(_))));
        }
    }

    #[test]
    fn rounded_delta_keeps_the_original_sign() {
        for listing in [1800.0, 2450.0, 2500.0, 2550.0, 3200.0] {
            let report = evaluate(listing, 2500.0, 80000.0);
            let original = listing - 2500.0;
            assert_eq!(report.delta_pct > 0.0, original > 0.0);
            assert_eq!(report.delta_pct < 0.0, original < 0.0);
            assert_eq!(report.delta_pct == 0.0, original == 0.0);
        }
    }

    #[test]
    fn verdicts_are_fixed_literals() {
        let report = evaluate(2600.0, 2500.0, 80000.0);
        assert!(ALL_VERDICTS.contains(&report.verdict.as_str()));
    }

    #[test]
    fn band_boundaries_resolve_to_near() {
        // Exactly at median * (1 ± 0.02) the strict inequalities keep the
        // market axis at "near"; it must not oscillate.
        let report = evaluate(2500.0 * 1.02, 2500.0, 100_000.0);
        assert!(report.verdict.starts_with("Near market"));
        let report = evaluate(2500.0 * 0.98, 2500.0, 100_000.0);
        assert!(report.verdict.starts_with("Near market"));
    }

    #[test]
    fn classifies_the_main_quadrants() {
        // 2600 vs 2500: +4% market; rti 0.39 with 80k income.
        assert_eq!(
            evaluate(2600.0, 2500.0, 80000.0).verdict,
            "Above market and above target ratio"
        );
        // 1900 vs 2500: -24%; rti 0.19 with 120k income.
        assert_eq!(
            evaluate(1900.0, 2500.0, 120_000.0).verdict,
            "Below market and below target ratio"
        );
        // Mixed below-market/above-target collapses into the fallback literal.
        assert_eq!(
            evaluate(2200.0, 2500.0, 80000.0).verdict,
            "Near market and near target ratio"
        );
    }

    #[test]
    fn output_is_rounded_to_four_decimals() {
        let report = evaluate(2200.0, 2500.0, 80000.0);
        assert_eq!(report.delta_pct, -0.12);
        assert_eq!(report.rti, 0.33);
    }
}
