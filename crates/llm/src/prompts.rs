use std::path::Path;

/// Embedded fallbacks; a humanized prompt on disk wins when present.
const PLANNING_PROMPT: &str = r#"You are the RentScope planner.
Speak to the planner like a teammate, brief and clear, but output MUST be strict JSON.
Return ONLY:
{ "plan": <string>,
  "actions": [ { "tool": "get_rent_data"|"get_neighbourhood_stats"|"suggest_neighbourhoods"|"evaluate_rent_affordability",
                 "args": <object matching tool schema> } ... ] }

Schemas:
- get_rent_data.args: { "city": <string>, "property_type": <"studio"|"1bed"|"2bed"|"3bed"> }
- get_neighbourhood_stats.args: { "city": <string>, "property_type": <string> }
- suggest_neighbourhoods.args: {
    "city": <string>, "property_type": <string>, "income_annual": <number>,
    "prefs": { "max_distance_km": <number|null>, "min_transit": <number|null>, "target_rent_to_income": <0..1|null> },
    "budget_cap": <number|null>
  }
- evaluate_rent_affordability.args: {
    "listing_price": <number>, "city_median": <number>,
    "income_annual": <number>, "target_ratio": <0..1>
  }
Rules: Keep actions minimal. Use provided fields only. JSON only, no prose."#;

const FINALIZE_PROMPT: &str = r#"You are the RentScope presenter.
Given tool_result, produce ONLY JSON with keys: plan, actions, verify, answer.
- Make the summary concise, friendly, and plain English.
- Do not invent data; summarize exactly what the tools returned.
- JSON only, no extra text."#;

#[derive(Debug, Clone)]
pub struct Prompts {
    pub planning: String,
    pub finalize: String,
}

impl Prompts {
    pub fn embedded() -> Self {
        Self {
            planning: PLANNING_PROMPT.to_string(),
            finalize: FINALIZE_PROMPT.to_string(),
        }
    }

    pub fn load(prompt_dir: &Path) -> Self {
        Self {
            planning: read_override(&prompt_dir.join("planning.txt"))
                .unwrap_or_else(|| PLANNING_PROMPT.to_string()),
            finalize: read_override(&prompt_dir.join("finalize.txt"))
                .unwrap_or_else(|| FINALIZE_PROMPT.to_string()),
        }
    }
}

fn read_override(path: &Path) -> Option<String> {
    std::fs::read_to_string(path).ok().filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_prompt_dir_uses_embedded_text() {
        let prompts = Prompts::load(Path::new("/nonexistent/prompts"));
        assert!(prompts.planning.contains("get_rent_data"));
        assert!(prompts.finalize.contains("verify"));
    }
}
