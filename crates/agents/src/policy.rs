use rentscope_core::{
    classify_intent, Action, Intent, ResultEnvelope, ScoringWeights, ToolReply, Verification,
};
use rentscope_dataset::DatasetProvider;
use serde_json::{json, Map, Value};

use crate::tools::{self, TOOL_AFFORD, TOOL_NEIGH_STATS, TOOL_RENT_DATA, TOOL_SUGGEST};

const DEFAULT_PROPERTY_TYPE: &str = "1bed";
const DEFAULT_TARGET_RATIO: f64 = 0.30;

/// Deterministic intent dispatch. One classification step, one fixed tool
/// sequence per intent, no retries; a non-200 sub-call short-circuits the
/// branch with an error answer.
#[derive(Clone)]
pub struct PolicyEngine {
    provider: DatasetProvider,
    weights: ScoringWeights,
}

impl PolicyEngine {
    pub fn new(provider: DatasetProvider, weights: ScoringWeights) -> Self {
        Self { provider, weights }
    }

    pub fn provider(&self) -> &DatasetProvider {
        &self.provider
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    pub fn decide_and_act(&self, user_text: &str, args: &Map<String, Value>) -> ResultEnvelope {
        let intent = classify_intent(user_text);
        let mut args = args.clone();
        args.entry("property_type".to_string())
            .or_insert_with(|| json!(DEFAULT_PROPERTY_TYPE));

        let has_city = args
            .get("city")
            .and_then(Value::as_str)
            .map(|city| !city.trim().is_empty())
            .unwrap_or(false);
        if intent.requires_city() && !has_city {
            return ResultEnvelope::new(
                format!("Ask user for city for intent={}", intent.as_code()),
                Vec::new(),
                Verification::failed("missing_city"),
                json!({ "message": "Which city should I check? (Toronto, Montreal, Vancouver)" }),
            );
        }

        match intent {
            Intent::Explain => explain(),
            Intent::CityRent => self.city_rent(&args),
            Intent::NeighStats => self.neigh_stats(&args),
            Intent::Affordability => self.affordability(&args),
            Intent::Suggest => self.suggest(&args),
        }
    }

    fn city_rent(&self, args: &Map<String, Value>) -> ResultEnvelope {
        let plan = "Fetch city median via get_rent_data";
        let call_args = tool_args(args, &["city", "property_type"]);
        let mut call = call_args.clone();
        call.insert("include_neighbourhoods".to_string(), json!(false));

        let reply = tools::rent_data(&self.provider, &call);
        let actions = vec![action(TOOL_RENT_DATA, Some(Value::Object(call_args)), &reply)];
        if !reply.is_ok() {
            return failed(plan, actions, "tool_failed", reply.body);
        }

        let summary = format!(
            "{} {} median = {} {}",
            reply.body["city"].as_str().unwrap_or_default(),
            reply.body["property_type"].as_str().unwrap_or_default(),
            reply.body["median"],
            reply.body["currency"].as_str().unwrap_or_default(),
        );
        ResultEnvelope::new(
            plan,
            actions,
            Verification::ok(),
            json!({ "summary": summary, "data": reply.body }),
        )
    }

    fn neigh_stats(&self, args: &Map<String, Value>) -> ResultEnvelope {
        let plan = "Fetch neighbourhood-level transit/medians via get_neighbourhood_stats";
        let call_args = tool_args(args, &["city", "property_type"]);

        let reply = tools::neighbourhood_stats(&self.provider, &call_args);
        let actions = vec![action(
            TOOL_NEIGH_STATS,
            Some(Value::Object(call_args.clone())),
            &reply,
        )];
        if !reply.is_ok() {
            return failed(plan, actions, "tool_failed", reply.body);
        }

        let count = reply.body["neighbourhoods"]
            .as_array()
            .map(Vec::len)
            .unwrap_or(0);
        let summary = format!(
            "Found {count} neighbourhoods for {}.",
            call_args.get("city").and_then(Value::as_str).unwrap_or_default(),
        );
        ResultEnvelope::new(
            plan,
            actions,
            Verification::ok(),
            json!({ "summary": summary, "data": reply.body }),
        )
    }

    fn affordability(&self, args: &Map<String, Value>) -> ResultEnvelope {
        let plan = "If city_median missing, fetch via get_rent_data; then compute via evaluate_rent_affordability";
        let mut actions = Vec::new();

        let mut city_median = args.get("city_median").and_then(Value::as_f64);
        if city_median.is_none() {
            if let Some(city) = args.get("city").and_then(Value::as_str) {
                let mut call = tool_args(args, &["property_type"]);
                call.insert("city".to_string(), json!(city));
                call.insert("include_neighbourhoods".to_string(), json!(false));

                let reply = tools::rent_data(&self.provider, &call);
                actions.push(action(TOOL_RENT_DATA, None, &reply));
                if !reply.is_ok() {
                    return failed(plan, actions, "failed_to_get_city_median", reply.body);
                }
                city_median = reply.body["median"].as_f64();
            }
        }

        let listing_price = args.get("listing_price").and_then(Value::as_f64);
        let income_annual = args.get("income_annual").and_then(Value::as_f64);
        let (Some(listing_price), Some(city_median), Some(income_annual)) =
            (listing_price, city_median, income_annual)
        else {
            return ResultEnvelope::new(
                plan,
                actions,
                Verification::failed("missing inputs"),
                json!({ "message": "Need listing_price, income_annual, and city (or city_median)." }),
            );
        };

        let call = tool_args_from(json!({
            "listing_price": listing_price,
            "city_median": city_median,
            "income_annual": income_annual,
            "target_ratio": args.get("target_ratio").and_then(Value::as_f64).unwrap_or(DEFAULT_TARGET_RATIO),
        }));
        let reply = tools::afford(&call);
        actions.push(action(TOOL_AFFORD, None, &reply));
        if !reply.is_ok() {
            return failed(plan, actions, "afford_failed", reply.body);
        }

        ResultEnvelope::new(
            plan,
            actions,
            Verification::ok(),
            json!({ "summary": reply.body["verdict"], "metrics": reply.body }),
        )
    }

    fn suggest(&self, args: &Map<String, Value>) -> ResultEnvelope {
        let plan = "Call suggest_neighbourhoods with income/prefs; explain filters";
        let call = tool_args(
            args,
            &[
                "city",
                "property_type",
                "income_annual",
                "prefs",
                "budget_cap",
                "listing_price",
            ],
        );

        let reply = tools::suggest(&self.provider, self.weights, &call);
        let actions = vec![action(TOOL_SUGGEST, None, &reply)];
        if !reply.is_ok() {
            return failed(plan, actions, "suggest_failed", reply.body);
        }

        let recommendations = reply.body["recommendations"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let mut answer = json!({
            "summary": format!("Top {} neighbourhoods", recommendations.len()),
            "recommendations": recommendations,
            "prefs": reply.body["prefs"],
            "meta": {
                "city": call.get("city"),
                "property_type": call.get("property_type"),
            },
        });
        if let Some(reason) = reply.body.get("reason") {
            answer["reason"] = reason.clone();
        }
        ResultEnvelope::new(plan, actions, Verification::ok(), answer)
    }
}

fn explain() -> ResultEnvelope {
    ResultEnvelope::new(
        "No tool; provide definition using policy guidance",
        Vec::new(),
        Verification::passing_with_note("think_only"),
        json!({
            "message": "Rent-to-income (RTI) is monthly rent divided by monthly income. A common target is ~30%.",
        }),
    )
}

fn tool_args(args: &Map<String, Value>, keys: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    for key in keys {
        if let Some(value) = args.get(*key) {
            if !value.is_null() {
                out.insert((*key).to_string(), value.clone());
            }
        }
    }
    out
}

fn tool_args_from(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn action(tool: &str, args: Option<Value>, reply: &ToolReply) -> Action {
    Action {
        tool: tool.to_string(),
        args,
        status: reply.status,
    }
}

fn failed(plan: &str, actions: Vec<Action>, code: &str, body: Value) -> ResultEnvelope {
    ResultEnvelope::new(
        plan,
        actions,
        Verification::failed(body.clone()),
        json!({ "error": code, "details": body }),
    )
}
