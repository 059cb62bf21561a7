use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};

/// Parse a `:: key=value key=value` tail, returning the stripped query and
/// the parsed arguments. Supports `prefs={...}` where the braces may hold
/// lenient JSON (bare keys, single quotes).
pub fn parse_inline_args(query: &str) -> (String, Map<String, Value>) {
    let mut args = Map::new();
    let Some((head, tail)) = query.split_once("::") else {
        return (query.trim().to_string(), args);
    };

    // Grab a full prefs blob first so whitespace inside braces does not
    // split into bogus tokens.
    static PREFS_BLOB: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"prefs\s*=\s*(\{.*\})").unwrap_or_else(|_| Regex::new(r"$^").unwrap()));

    let mut tail = tail.to_string();
    if let Some(captures) = PREFS_BLOB.captures(&tail) {
        let blob = captures[1].to_string();
        if let Some(parsed) = lenient_json(&blob) {
            if parsed.is_object() {
                args.insert("prefs".to_string(), parsed);
            }
        }
        tail = tail.replace(&format!("prefs={blob}"), "");
    }

    for token in tail.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key == "prefs" {
            if let Some(parsed) = lenient_json(value.trim()) {
                if parsed.is_object() {
                    args.insert("prefs".to_string(), parsed);
                }
            }
            continue;
        }
        args.insert(key.to_string(), coerce_scalar(value.trim()));
    }

    (head.trim().to_string(), args)
}

/// Best-effort parse of loose dict-like strings such as
/// `{min_transit:90, target_rent_to_income:0.33}`.
pub fn lenient_json(input: &str) -> Option<Value> {
    let trimmed = input.trim();
    if !(trimmed.starts_with('{') && trimmed.ends_with('}')) {
        return None;
    }

    static BARE_KEY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_\-]*)(\s*:)"#)
            .unwrap_or_else(|_| Regex::new(r"$^").unwrap())
    });

    let quoted = BARE_KEY.replace_all(trimmed, "$1\"$2\"$3").replace('\'', "\"");
    serde_json::from_str(&quoted).ok()
}

/// Merge default preferences with user-supplied ones. A `null` default is
/// skipped; an explicit `null` from the user removes a default-supplied key
/// entirely rather than leaving it in place.
pub fn merge_preferences(defaults: &Map<String, Value>, user: Option<&Value>) -> Map<String, Value> {
    let mut merged = Map::new();
    for (key, value) in defaults {
        if !value.is_null() {
            merged.insert(key.clone(), value.clone());
        }
    }

    let user = match user {
        Some(Value::Object(map)) => Some(map.clone()),
        Some(Value::String(raw)) => lenient_json(raw).and_then(|v| v.as_object().cloned()),
        _ => None,
    };

    if let Some(user) = user {
        for (key, value) in user {
            if value.is_null() {
                merged.remove(&key);
            } else {
                merged.insert(key, value);
            }
        }
    }

    merged
}

/// Uniform numeric coercion at input boundaries: returns the parsed value
/// and whether the default had to be substituted.
pub fn parse_f64_or(value: Option<&Value>, default: f64) -> (f64, bool) {
    match value {
        Some(Value::Number(number)) => match number.as_f64() {
            Some(parsed) => (parsed, false),
            None => (default, true),
        },
        Some(Value::String(raw)) => match raw.trim().parse::<f64>() {
            Ok(parsed) => (parsed, false),
            Err(_) => (default, true),
        },
        _ => (default, true),
    }
}

fn coerce_scalar(raw: &str) -> Value {
    if let Ok(number) = raw.parse::<f64>() {
        if let Some(number) = Number::from_f64(number) {
            return Value::Number(number);
        }
    }
    Value::String(raw.to_string())
}
