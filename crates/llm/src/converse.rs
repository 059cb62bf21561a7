use rentscope_core::models::{Action, PlanPack, PlannedAction, ResultEnvelope, Verification};
use serde_json::{json, Value};
use tracing::warn;

use crate::extract::extract_first_json;
use crate::prompts::Prompts;
use crate::Generator;

/// Ask the model for a plan. Never raises: a bad or missing reply degrades
/// to an empty action list so the deterministic policy still runs.
pub async fn request_plan<G: Generator>(
    generator: &G,
    prompts: &Prompts,
    query: &str,
    args: &Value,
    max_tokens: u32,
) -> PlanPack {
    let payload = json!({ "query": query, "args": args });

    let raw = match generator.generate(&prompts.planning, &payload, max_tokens).await {
        Ok(text) => text,
        Err(error) => {
            warn!(%error, "planner unavailable, continuing without a model plan");
            return PlanPack {
                plan: "Planner unavailable; proceeding with deterministic policy.".to_string(),
                actions: Vec::new(),
            };
        }
    };

    let candidate = extract_first_json(&raw).unwrap_or_else(|| raw.clone());
    match serde_json::from_str::<Value>(&candidate) {
        Ok(data) => {
            let plan = data
                .get("plan")
                .and_then(Value::as_str)
                .unwrap_or("No plan returned")
                .to_string();
            let actions = data
                .get("actions")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|item| {
                            serde_json::from_value::<PlannedAction>(item.clone()).ok()
                        })
                        .collect()
                })
                .unwrap_or_default();
            PlanPack { plan, actions }
        }
        Err(_) => PlanPack {
            plan: format!("(unparsed) {}", truncate_chars(&raw, 2000)),
            actions: Vec::new(),
        },
    }
}

/// Ask the model to phrase the final reply. The deterministic action record
/// and tool_result always survive unchanged; only plan, verify, and answer
/// may be rephrased by the model. When the model is unreachable or its reply
/// unparseable, the envelope echoes the tool result, deterministic verify
/// included.
pub async fn request_finalize<G: Generator>(
    generator: &G,
    prompts: &Prompts,
    query: &str,
    plan: &str,
    actions: Vec<Action>,
    tool_result: Value,
    max_tokens: u32,
) -> ResultEnvelope {
    let actions_value = serde_json::to_value(&actions).unwrap_or_else(|_| json!([]));
    let payload = json!({
        "query": query,
        "plan": plan,
        "actions": actions_value,
        "tool_result": tool_result,
    });

    let parsed = match generator.generate(&prompts.finalize, &payload, max_tokens).await {
        Ok(raw) => {
            let candidate = extract_first_json(&raw).unwrap_or_else(|| raw.clone());
            serde_json::from_str::<Value>(&candidate).ok()
        }
        Err(error) => {
            warn!(%error, "finalizer unavailable, echoing tool result");
            None
        }
    };

    match parsed {
        Some(data) => {
            let final_plan = data
                .get("plan")
                .and_then(Value::as_str)
                .unwrap_or(plan)
                .to_string();
            let verify = coerce_verify(data.get("verify"));
            let answer = data
                .get("answer")
                .cloned()
                .unwrap_or_else(|| json!({ "message": "See tool_result" }));
            ResultEnvelope {
                plan: final_plan,
                actions,
                verify,
                answer,
                tool_result: Some(tool_result),
                meta: None,
            }
        }
        None => {
            // A failed tool branch must stay failed here; the note only
            // marks envelopes whose tool result carried no verdict at all.
            let verify = tool_result
                .get("verify")
                .and_then(|raw| serde_json::from_value::<Verification>(raw.clone()).ok())
                .unwrap_or_else(|| Verification::passing_with_note("finalize_parse_fallback"));
            let answer = tool_result
                .get("answer")
                .cloned()
                .unwrap_or_else(|| tool_result.clone());
            ResultEnvelope {
                plan: plan.to_string(),
                actions,
                verify,
                answer,
                tool_result: Some(tool_result),
                meta: None,
            }
        }
    }
}

fn coerce_verify(raw: Option<&Value>) -> Verification {
    match raw {
        Some(Value::Object(map)) => Verification {
            ok: map.get("ok").and_then(Value::as_bool).unwrap_or(true),
            notes: map.get("notes").filter(|v| !v.is_null()).cloned(),
            reasons: Vec::new(),
        },
        _ => Verification::ok(),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticGenerator;
    use anyhow::Result;
    use parking_lot::Mutex;

    struct CapturingGenerator {
        seen: Mutex<Vec<Value>>,
    }

    impl CapturingGenerator {
        fn new() -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Generator for CapturingGenerator {
        async fn generate(&self, _system: &str, user: &Value, _max_tokens: u32) -> Result<String> {
            self.seen.lock().push(user.clone());
            Ok(r#"{"plan": "p", "verify": {"ok": true}, "answer": {}}"#.to_string())
        }
    }

    fn sample_actions() -> Vec<Action> {
        vec![Action {
            tool: "get_rent_data".to_string(),
            args: Some(json!({ "city": "Toronto", "property_type": "1bed" })),
            status: 200,
        }]
    }

    #[tokio::test]
    async fn plan_parses_fenced_reply() {
        let generator = StaticGenerator::with_replies(vec![
            "```json\n{\"plan\": \"look up median\", \"actions\": [{\"tool\": \"get_rent_data\", \"args\": {\"city\": \"Toronto\"}}]}\n```".to_string(),
        ]);
        let prompts = Prompts::embedded();
        let pack = request_plan(&generator, &prompts, "rent in Toronto", &json!({}), 700).await;
        assert_eq!(pack.plan, "look up median");
        assert_eq!(pack.actions.len(), 1);
        assert_eq!(pack.actions[0].tool, "get_rent_data");
    }

    #[tokio::test]
    async fn plan_degrades_when_model_is_unreachable() {
        let generator = StaticGenerator::offline();
        let prompts = Prompts::embedded();
        let pack = request_plan(&generator, &prompts, "rent in Toronto", &json!({}), 700).await;
        assert!(pack.actions.is_empty());
        assert!(pack.plan.contains("deterministic"));
    }

    #[tokio::test]
    async fn plan_keeps_unparsed_text_for_audit() {
        let generator = StaticGenerator::with_replies(vec!["just chatting, no json".to_string()]);
        let prompts = Prompts::embedded();
        let pack = request_plan(&generator, &prompts, "rent", &json!({}), 700).await;
        assert!(pack.plan.starts_with("(unparsed) just chatting"));
        assert!(pack.actions.is_empty());
    }

    #[tokio::test]
    async fn plan_with_non_list_actions_yields_empty_actions() {
        let generator = StaticGenerator::with_replies(vec![
            r#"{"plan": "p", "actions": "do the thing"}"#.to_string(),
        ]);
        let prompts = Prompts::embedded();
        let pack = request_plan(&generator, &prompts, "rent", &json!({}), 700).await;
        assert_eq!(pack.plan, "p");
        assert!(pack.actions.is_empty());
    }

    #[tokio::test]
    async fn finalize_keeps_deterministic_actions() {
        let generator = StaticGenerator::with_replies(vec![
            r#"{"plan": "rephrased", "actions": [{"tool": "made_up", "status": 999}], "verify": {"ok": true}, "answer": {"summary": "friendly text"}}"#.to_string(),
        ]);
        let prompts = Prompts::embedded();
        let tool_result = json!({ "answer": { "summary": "raw" } });
        let envelope = request_finalize(
            &generator,
            &prompts,
            "median rent in Toronto",
            "plan",
            sample_actions(),
            tool_result,
            600,
        )
        .await;
        assert_eq!(envelope.plan, "rephrased");
        assert_eq!(envelope.actions.len(), 1);
        assert_eq!(envelope.actions[0].tool, "get_rent_data");
        assert_eq!(envelope.answer["summary"], "friendly text");
    }

    #[tokio::test]
    async fn finalize_fallback_echoes_tool_answer() {
        let generator = StaticGenerator::offline();
        let prompts = Prompts::embedded();
        let tool_result = json!({ "answer": { "summary": "Median 1bed rent in Toronto is 2500" } });
        let envelope = request_finalize(
            &generator,
            &prompts,
            "median rent in Toronto",
            "plan",
            sample_actions(),
            tool_result,
            600,
        )
        .await;
        assert!(envelope.verify.ok);
        assert_eq!(envelope.verify.notes, Some(json!("finalize_parse_fallback")));
        assert_eq!(
            envelope.answer["summary"],
            "Median 1bed rent in Toronto is 2500"
        );
    }

    #[tokio::test]
    async fn finalize_fallback_preserves_a_failed_tool_verify() {
        let generator = StaticGenerator::offline();
        let prompts = Prompts::embedded();
        let tool_result = json!({
            "verify": { "ok": false, "notes": { "error": "city_not_found", "city": "Atlantis" } },
            "answer": { "error": "tool_failed", "details": { "error": "city_not_found" } },
        });
        let envelope = request_finalize(
            &generator,
            &prompts,
            "median rent in Atlantis",
            "plan",
            sample_actions(),
            tool_result,
            600,
        )
        .await;
        assert!(!envelope.verify.ok);
        assert_eq!(
            envelope.verify.notes,
            Some(json!({ "error": "city_not_found", "city": "Atlantis" }))
        );
        assert_eq!(envelope.answer["error"], "tool_failed");
    }

    #[tokio::test]
    async fn finalize_payload_carries_query_actions_and_tool_result() {
        let generator = CapturingGenerator::new();
        let prompts = Prompts::embedded();
        request_finalize(
            &generator,
            &prompts,
            "median rent in Toronto",
            "the plan",
            sample_actions(),
            json!({ "answer": { "summary": "raw" } }),
            600,
        )
        .await;

        let seen = generator.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["query"], "median rent in Toronto");
        assert_eq!(seen[0]["plan"], "the plan");
        assert_eq!(seen[0]["actions"][0]["tool"], "get_rent_data");
        assert_eq!(seen[0]["tool_result"]["answer"]["summary"], "raw");
    }

    #[tokio::test]
    async fn finalize_missing_answer_gets_pointer_message() {
        let generator = StaticGenerator::with_replies(vec![
            r#"{"plan": "p", "verify": {"ok": false, "notes": "model said so"}}"#.to_string(),
        ]);
        let prompts = Prompts::embedded();
        let envelope = request_finalize(
            &generator,
            &prompts,
            "median rent in Toronto",
            "plan",
            sample_actions(),
            json!({ "answer": {} }),
            600,
        )
        .await;
        assert!(!envelope.verify.ok);
        assert_eq!(envelope.answer["message"], "See tool_result");
    }
}
