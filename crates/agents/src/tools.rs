use rentscope_core::{
    evaluate_affordability, parse_f64_or, suggest_neighbourhoods, AffordabilityInput, Preferences,
    PropertyType, ScoringWeights, SuggestRequest, ToolReply,
};
use rentscope_dataset::{city_key, DatasetProvider};
use serde_json::{json, Map, Value};

pub const TOOL_RENT_DATA: &str = "get_rent_data";
pub const TOOL_NEIGH_STATS: &str = "get_neighbourhood_stats";
pub const TOOL_SUGGEST: &str = "suggest_neighbourhoods";
pub const TOOL_AFFORD: &str = "evaluate_rent_affordability";

fn requested_city(args: &Map<String, Value>) -> String {
    city_key(args.get("city").and_then(Value::as_str).unwrap_or("Toronto"))
}

fn requested_property(args: &Map<String, Value>) -> Result<PropertyType, ToolReply> {
    let raw = args
        .get("property_type")
        .and_then(Value::as_str)
        .unwrap_or("1bed");
    PropertyType::parse(raw).ok_or_else(|| {
        ToolReply::error(
            400,
            json!({
                "error": "unsupported_property_type",
                "property_type": raw.to_lowercase(),
                "supported": PropertyType::supported_codes(),
            }),
        )
    })
}

fn snapshot_echo(provider: &DatasetProvider) -> Value {
    let meta = provider.meta();
    json!({
        "currency": meta.currency,
        "source": meta.version,
        "snapshot_month": meta.snapshot_month,
        "live_mode": provider.live_mode(),
    })
}

fn with_echo(provider: &DatasetProvider, mut payload: Value) -> Value {
    let echo = snapshot_echo(provider);
    if let (Some(target), Some(echo)) = (payload.as_object_mut(), echo.as_object()) {
        for (key, value) in echo {
            target.insert(key.clone(), value.clone());
        }
    }
    payload
}

/// City median lookup. `include_neighbourhoods` attaches the per-area
/// medians for the same property type.
pub fn rent_data(provider: &DatasetProvider, args: &Map<String, Value>) -> ToolReply {
    let city = requested_city(args);
    let property = match requested_property(args) {
        Ok(property) => property,
        Err(reply) => return reply,
    };
    let include_neighbourhoods = args
        .get("include_neighbourhoods")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    if provider.get_city(&city).is_none() {
        return ToolReply::error(404, json!({ "error": "city_not_found", "city": city }));
    }
    let Some(median) = provider.city_median(&city, property) else {
        return ToolReply::error(
            400,
            json!({
                "error": "unsupported_property_type",
                "property_type": property.as_code(),
                "supported": PropertyType::supported_codes(),
            }),
        );
    };

    let mut payload = json!({
        "city": city,
        "property_type": property.as_code(),
        "median": median,
    });
    if include_neighbourhoods {
        let rows: Vec<Value> = provider
            .list_neighbourhoods(&city)
            .iter()
            .filter_map(|row| {
                provider
                    .neighbourhood_median(row, property)
                    .map(|median| json!({ "name": row.name, "median": median }))
            })
            .collect();
        payload["neighbourhoods"] = Value::Array(rows);
    }

    ToolReply::ok(with_echo(provider, payload))
}

/// Neighbourhood-level medians, transit scores, and commute distances.
pub fn neighbourhood_stats(provider: &DatasetProvider, args: &Map<String, Value>) -> ToolReply {
    let city = requested_city(args);
    let property = match requested_property(args) {
        Ok(property) => property,
        Err(reply) => return reply,
    };

    if provider.get_city(&city).is_none() {
        return ToolReply::error(404, json!({ "error": "city_not_found", "city": city }));
    }

    let rows: Vec<Value> = provider
        .list_neighbourhoods(&city)
        .iter()
        .filter_map(|row| {
            provider.neighbourhood_median(row, property).map(|median| {
                json!({
                    "name": row.name,
                    "median": median,
                    "transit": provider.neighbourhood_transit(row, 0),
                    "distance_km": row.distance(),
                })
            })
        })
        .collect();

    ToolReply::ok(with_echo(
        provider,
        json!({
            "city": city,
            "property_type": property.as_code(),
            "neighbourhoods": rows,
        }),
    ))
}

/// Filter-and-score recommender over the city's neighbourhood rows. The
/// effective prefs are echoed in the payload so the verifier can compute
/// relaxation hints against what was actually applied.
pub fn suggest(
    provider: &DatasetProvider,
    weights: ScoringWeights,
    args: &Map<String, Value>,
) -> ToolReply {
    let city = requested_city(args);
    let property = match requested_property(args) {
        Ok(property) => property,
        Err(reply) => return reply,
    };

    if provider.get_city(&city).is_none() {
        return ToolReply::error(404, json!({ "error": "city_not_found", "city": city }));
    }

    let prefs_value = args.get("prefs").cloned().unwrap_or_else(|| json!({}));
    let prefs = Preferences::from_value(&prefs_value);
    let (income_annual, _) = parse_f64_or(args.get("income_annual"), 80_000.0);

    let request = SuggestRequest {
        property_type: property,
        income_annual,
        prefs,
        listing_price: args.get("listing_price").and_then(Value::as_f64),
        budget_cap: args.get("budget_cap").and_then(Value::as_f64),
    };
    let recommendations = suggest_neighbourhoods(provider.list_neighbourhoods(&city), &request, weights);

    let mut payload = json!({
        "city": city,
        "property_type": property.as_code(),
        "prefs": prefs_value,
        "recommendations": recommendations,
    });
    if payload["recommendations"]
        .as_array()
        .map(Vec::is_empty)
        .unwrap_or(true)
    {
        payload["reason"] = json!("no_neighbourhood_passed_filters");
    }

    ToolReply::ok(with_echo(provider, payload))
}

/// Affordability verdict over explicit numeric inputs; no dataset access.
pub fn afford(args: &Map<String, Value>) -> ToolReply {
    let (listing_price, _) = parse_f64_or(args.get("listing_price"), 0.0);
    let (city_median, _) = parse_f64_or(args.get("city_median"), 0.0);
    let (income_annual, _) = parse_f64_or(args.get("income_annual"), 0.0);
    let (target_ratio, _) = parse_f64_or(args.get("target_ratio"), 0.30);

    match evaluate_affordability(AffordabilityInput {
        listing_price,
        city_median,
        income_annual,
        target_ratio,
    }) {
        Ok(report) => ToolReply::ok(json!({
            "delta_pct": report.delta_pct,
            "rti": report.rti,
            "verdict": report.verdict,
        })),
        Err(_) => ToolReply::error(
            400,
            json!({
                "error": "invalid_input",
                "fields": {
                    "listing_price": listing_price,
                    "city_median": city_median,
                    "income_annual": income_annual,
                },
            }),
        ),
    }
}

/// Deterministic health harness: one representative call per tool plus a
/// dataset sanity check. Each entry carries the wire-shaped reply so the
/// report shows exactly what the tool returned.
pub fn selftest(provider: &DatasetProvider, weights: ScoringWeights) -> Value {
    let mut results = Vec::new();

    let args = |value: Value| value.as_object().cloned().unwrap_or_default();

    let rent = rent_data(
        provider,
        &args(json!({ "city": "Toronto", "property_type": "1bed", "include_neighbourhoods": false })),
    );
    results.push(json!({ "tool": TOOL_RENT_DATA, "ok": rent.is_ok(), "response": rent.into_wire() }));

    let stats = neighbourhood_stats(
        provider,
        &args(json!({ "city": "Toronto", "property_type": "1bed" })),
    );
    let stats_ok = stats.is_ok() && stats.body.get("neighbourhoods").map(Value::is_array).unwrap_or(false);
    results.push(json!({ "tool": TOOL_NEIGH_STATS, "ok": stats_ok, "response": stats.into_wire() }));

    let suggestions = suggest(
        provider,
        weights,
        &args(json!({
            "city": "Toronto",
            "property_type": "1bed",
            "income_annual": 80000,
            "prefs": { "max_distance_km": 12, "min_transit": 60, "target_rent_to_income": 0.30 },
            "budget_cap": 2200,
        })),
    );
    results.push(json!({ "tool": TOOL_SUGGEST, "ok": suggestions.is_ok(), "response": suggestions.into_wire() }));

    let affordability = afford(&args(json!({
        "listing_price": 2000,
        "city_median": 1900,
        "income_annual": 72000,
        "target_ratio": 0.30,
    })));
    results.push(json!({ "tool": TOOL_AFFORD, "ok": affordability.is_ok(), "response": affordability.into_wire() }));

    let ok = results
        .iter()
        .all(|entry| entry["ok"].as_bool().unwrap_or(false));
    json!({ "ok": ok, "results": results })
}
