use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    #[serde(rename = "studio")]
    Studio,
    #[serde(rename = "1bed")]
    OneBed,
    #[serde(rename = "2bed")]
    TwoBed,
    #[serde(rename = "3bed")]
    ThreeBed,
}

impl PropertyType {
    pub const ALL: [PropertyType; 4] = [
        Self::Studio,
        Self::OneBed,
        Self::TwoBed,
        Self::ThreeBed,
    ];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "studio" => Some(Self::Studio),
            "1bed" => Some(Self::OneBed),
            "2bed" => Some(Self::TwoBed),
            "3bed" => Some(Self::ThreeBed),
            _ => None,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::Studio => "studio",
            Self::OneBed => "1bed",
            Self::TwoBed => "2bed",
            Self::ThreeBed => "3bed",
        }
    }

    pub fn supported_codes() -> Vec<&'static str> {
        Self::ALL.iter().map(|p| p.as_code()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Explain,
    Affordability,
    Suggest,
    CityRent,
    NeighStats,
}

impl Intent {
    pub fn as_code(self) -> &'static str {
        match self {
            Self::Explain => "explain",
            Self::Affordability => "affordability",
            Self::Suggest => "suggest",
            Self::CityRent => "city_rent",
            Self::NeighStats => "neigh_stats",
        }
    }

    /// Intents that cannot run without a resolved city.
    pub fn requires_city(self) -> bool {
        matches!(self, Self::CityRent | Self::NeighStats | Self::Suggest)
    }
}

/// User preferences after default merging. `None` means the constraint is
/// disabled, not "use some default".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_transit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_rent_to_income: Option<f64>,
}

impl Preferences {
    pub fn from_value(value: &Value) -> Self {
        let get = |key: &str| value.get(key).and_then(Value::as_f64);
        Self {
            max_distance_km: get("max_distance_km"),
            min_transit: get("min_transit"),
            target_rent_to_income: get("target_rent_to_income"),
        }
    }
}

fn default_currency() -> String {
    "CAD/month".to_string()
}

fn default_snapshot_month() -> String {
    "unknown".to_string()
}

fn default_version() -> String {
    "static_json_v1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetMeta {
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_snapshot_month")]
    pub snapshot_month: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub property_types: Vec<String>,
}

impl Default for DatasetMeta {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            snapshot_month: default_snapshot_month(),
            version: default_version(),
            property_types: Vec::new(),
        }
    }
}

/// One neighbourhood row from the snapshot. `median` and `transit` stay
/// loosely typed: a malformed value must drop the row from listings and
/// scoring, never fail the whole dataset load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighbourhoodRecord {
    pub name: String,
    #[serde(default)]
    pub median: Map<String, Value>,
    #[serde(default)]
    pub transit: Value,
    #[serde(default)]
    pub distance_km: Value,
}

impl NeighbourhoodRecord {
    pub fn median_for(&self, property_type: PropertyType) -> Option<f64> {
        self.median
            .get(property_type.as_code())
            .and_then(Value::as_f64)
    }

    pub fn transit_score(&self) -> Option<u8> {
        normalize_transit(&self.transit)
    }

    pub fn distance(&self) -> f64 {
        self.distance_km.as_f64().unwrap_or(0.0).max(0.0)
    }
}

/// Out-of-range values clamp to [0, 100]; non-numeric or NaN yields `None`
/// and the caller substitutes its own default.
pub fn normalize_transit(raw: &Value) -> Option<u8> {
    let value = raw.as_f64()?;
    if value.is_nan() {
        return None;
    }
    Some(value.clamp(0.0, 100.0).round() as u8)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityRecord {
    #[serde(default)]
    pub medians: Map<String, Value>,
    #[serde(default)]
    pub neighbourhoods: Vec<NeighbourhoodRecord>,
}

impl CityRecord {
    pub fn median_for(&self, property_type: PropertyType) -> Option<f64> {
        self.medians
            .get(property_type.as_code())
            .and_then(Value::as_f64)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub meta: DatasetMeta,
    #[serde(default)]
    pub cities: BTreeMap<String, CityRecord>,
}

/// Record of one deterministic tool invocation, appended in issue order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
    pub status: u16,
}

/// Advisory action proposed by the planner model; carries no status because
/// nothing has executed yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPack {
    pub plan: String,
    #[serde(default)]
    pub actions: Vec<PlannedAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl Verification {
    pub fn ok() -> Self {
        Self {
            ok: true,
            notes: None,
            reasons: Vec::new(),
        }
    }

    pub fn passing_with_note(note: impl Into<Value>) -> Self {
        Self {
            ok: true,
            notes: Some(note.into()),
            reasons: Vec::new(),
        }
    }

    pub fn failed(note: impl Into<Value>) -> Self {
        Self {
            ok: false,
            notes: Some(note.into()),
            reasons: Vec::new(),
        }
    }

    pub fn failed_with_reasons(reasons: Vec<String>) -> Self {
        Self {
            ok: false,
            notes: None,
            reasons,
        }
    }
}

/// The single canonical shape flowing Planner -> Policy Engine -> Finalizer
/// -> Verifier -> Ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub plan: String,
    pub actions: Vec<Action>,
    pub verify: Verification,
    pub answer: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl ResultEnvelope {
    pub fn new(plan: impl Into<String>, actions: Vec<Action>, verify: Verification, answer: Value) -> Self {
        Self {
            plan: plan.into(),
            actions,
            verify,
            answer,
            tool_result: None,
            meta: None,
        }
    }
}

/// Status and JSON body of one tool invocation. `into_wire` renders the
/// `{statusCode, headers, body}` shape used wherever a whole reply is
/// reported verbatim, as in the self-test report.
#[derive(Debug, Clone)]
pub struct ToolReply {
    pub status: u16,
    pub body: Value,
}

impl ToolReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn error(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn into_wire(self) -> Value {
        serde_json::json!({
            "statusCode": self.status,
            "headers": { "Content-Type": "application/json" },
            "body": self.body.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryInput {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn property_type_rejects_unknown_values() {
        assert_eq!(PropertyType::parse("2bed"), Some(PropertyType::TwoBed));
        assert_eq!(PropertyType::parse("loft"), None);
        assert_eq!(PropertyType::parse(""), None);
    }

    #[test]
    fn transit_clamps_and_rejects_non_numeric() {
        assert_eq!(normalize_transit(&json!(130)), Some(100));
        assert_eq!(normalize_transit(&json!(-4)), Some(0));
        assert_eq!(normalize_transit(&json!(72.6)), Some(73));
        assert_eq!(normalize_transit(&json!("high")), None);
        assert_eq!(normalize_transit(&Value::Null), None);
    }

    #[test]
    fn row_without_requested_median_is_absent() {
        let row: NeighbourhoodRecord = serde_json::from_value(json!({
            "name": "Casa Loma",
            "median": { "2bed": 3400 },
            "transit": 84,
            "distance_km": 3.2
        }))
        .unwrap();

        assert_eq!(row.median_for(PropertyType::OneBed), None);
        assert_eq!(row.median_for(PropertyType::TwoBed), Some(3400.0));
    }

    #[test]
    fn malformed_median_value_is_treated_as_absent() {
        let row: NeighbourhoodRecord = serde_json::from_value(json!({
            "name": "Weston",
            "median": { "1bed": "n/a" },
            "transit": 70,
            "distance_km": 11.0
        }))
        .unwrap();

        assert_eq!(row.median_for(PropertyType::OneBed), None);
    }

    #[test]
    fn tool_reply_wire_shape_has_string_body() {
        let wire = ToolReply::ok(json!({ "median": 2500 })).into_wire();
        assert_eq!(wire["statusCode"], 200);
        assert!(wire["body"].is_string());
    }
}
