use std::env;
use std::path::PathBuf;

use rentscope_core::ScoringWeights;
use serde_json::{Map, Value};

const DEFAULT_PREFS_JSON: &str =
    r#"{"max_distance_km": 12, "min_transit": 60, "target_rent_to_income": 0.30}"#;

/// Process configuration, read once at startup. Every knob has a default so
/// the service runs offline out of the box.
#[derive(Debug, Clone)]
pub struct Config {
    pub default_prefs: Map<String, Value>,
    pub verify_strict: bool,
    pub verify_hints: bool,
    pub weights: ScoringWeights,
    pub data_path: PathBuf,
    pub data_url: Option<String>,
    pub live_mode: bool,
    pub model_url: Option<String>,
    pub model_id: String,
    pub planning_max_tokens: u32,
    pub finalize_max_tokens: u32,
    pub prompt_dir: PathBuf,
    pub ledger_local: bool,
    pub ledger_path: PathBuf,
    pub ledger_mirror_url: Option<String>,
    pub session_id: Option<String>,
    pub agent_version: String,
}

impl Config {
    pub fn from_env() -> Self {
        let default_prefs = env::var("RS_PREFS_DEFAULT")
            .ok()
            .and_then(|raw| serde_json::from_str::<Value>(&raw).ok())
            .and_then(|value| value.as_object().cloned())
            .unwrap_or_else(|| {
                serde_json::from_str::<Value>(DEFAULT_PREFS_JSON)
                    .ok()
                    .and_then(|value| value.as_object().cloned())
                    .unwrap_or_default()
            });

        Self {
            default_prefs,
            verify_strict: env_flag("RS_VERIFY_STRICT", true),
            verify_hints: env_flag("RS_VERIFY_HINTS", true),
            weights: ScoringWeights {
                affordability: env_f64("RS_W_AFFORD", 0.5),
                transit: env_f64("RS_W_TRANSIT", 0.3),
                distance: env_f64("RS_W_DIST", 0.2),
            },
            data_path: env_path("RS_DATA_PATH", "data/snapshot.json"),
            data_url: env_opt("RS_DATA_URL"),
            live_mode: env_flag("RS_LIVE_MODE", false),
            model_url: env_opt("RS_MODEL_URL"),
            model_id: env::var("RS_MODEL_ID").unwrap_or_else(|_| "rentscope-default".to_string()),
            planning_max_tokens: env_u32("RS_PLANNING_MAX_TOKENS", 700),
            finalize_max_tokens: env_u32("RS_FINALIZE_MAX_TOKENS", 600),
            prompt_dir: env_path("RS_PROMPT_DIR", "prompts"),
            ledger_local: env_flag("RS_LEDGER_LOCAL", true),
            ledger_path: env_path("RS_LEDGER_PATH", "out/ledger.jsonl"),
            ledger_mirror_url: env_opt("RS_LEDGER_MIRROR_URL"),
            session_id: env_opt("RS_SESSION_ID"),
            agent_version: env::var("RS_AGENT_VERSION").unwrap_or_else(|_| "v1".to_string()),
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => value == "1" || value.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key).map(PathBuf::from).unwrap_or_else(|_| PathBuf::from(default))
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_cover_the_offline_case() {
        let config = Config::from_env();
        assert!(config.verify_strict);
        assert!(config.verify_hints);
        assert_eq!(config.default_prefs.get("max_distance_km"), Some(&json!(12)));
        assert_eq!(config.default_prefs.get("min_transit"), Some(&json!(60)));
        assert_eq!(
            config.default_prefs.get("target_rent_to_income"),
            Some(&json!(0.30))
        );
        assert_eq!(config.agent_version, "v1");
        assert_eq!(config.planning_max_tokens, 700);
    }
}
