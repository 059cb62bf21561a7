use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^```(?:json)?\s*|\s*```$").unwrap_or_else(|_| Regex::new(r"$^").unwrap())
});

/// Best-effort: find the first top-level `{...}` JSON object in model text.
/// Tolerates code fences and leading/trailing prose; each candidate is
/// validated by a full parse before being accepted.
pub fn extract_first_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let unfenced = if trimmed.starts_with("```") {
        CODE_FENCE.replace_all(trimmed, "").trim().to_string()
    } else {
        trimmed.to_string()
    };

    // Quick path: the whole text is one object.
    if unfenced.starts_with('{')
        && unfenced.ends_with('}')
        && serde_json::from_str::<Value>(&unfenced).is_ok()
    {
        return Some(unfenced);
    }

    // Scan for the first balanced top-level object.
    let starts: Vec<usize> = unfenced
        .char_indices()
        .filter(|(_, ch)| *ch == '{')
        .map(|(index, _)| index)
        .collect();

    for start in starts {
        let mut depth = 0usize;
        for (offset, ch) in unfenced[start..].char_indices() {
            match ch {
                '{' => depth += 1,
                '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        let end = start + offset + ch.len_utf8();
                        let candidate = &unfenced[start..end];
                        if serde_json::from_str::<Value>(candidate).is_ok() {
                            return Some(candidate.to_string());
                        }
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    None
}
