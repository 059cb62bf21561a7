pub mod config;
pub mod policy;
pub mod tools;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use rentscope_core::{
    merge_preferences, normalize_text, parse_inline_args, scan_city, scan_property_type,
    QueryInput, ResultEnvelope, Verifier,
};
use rentscope_dataset::DatasetProvider;
use rentscope_ledger::{Ledger, LedgerContext};
use rentscope_llm::{request_finalize, request_plan, GeneratorKind, Prompts};
use rentscope_observability::AppMetrics;
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

pub use config::Config;
pub use policy::PolicyEngine;

/// One query in, one envelope out. Planning and finalizing go through the
/// external model; tool execution, verification, and the audit trail stay
/// deterministic and local.
pub struct RentAgent {
    policy: PolicyEngine,
    generator: GeneratorKind,
    prompts: Prompts,
    ledger: Ledger,
    verifier: Verifier,
    metrics: Arc<AppMetrics>,
    default_prefs: Map<String, Value>,
    planning_max_tokens: u32,
    finalize_max_tokens: u32,
    model_id: String,
    agent_version: String,
    default_session_id: Option<String>,
}

impl RentAgent {
    pub fn new(
        config: &Config,
        provider: DatasetProvider,
        generator: GeneratorKind,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            policy: PolicyEngine::new(provider, config.weights),
            generator,
            prompts: Prompts::load(&config.prompt_dir),
            ledger: Ledger::new(
                config.ledger_local,
                config.ledger_path.clone(),
                config.ledger_mirror_url.clone(),
            ),
            verifier: Verifier::new(config.verify_strict, config.verify_hints),
            metrics,
            default_prefs: config.default_prefs.clone(),
            planning_max_tokens: config.planning_max_tokens,
            finalize_max_tokens: config.finalize_max_tokens,
            model_id: config.model_id.clone(),
            agent_version: config.agent_version.clone(),
            default_session_id: config.session_id.clone(),
        }
    }

    pub fn provider(&self) -> &DatasetProvider {
        self.policy.provider()
    }

    pub fn selftest(&self) -> Value {
        tools::selftest(self.policy.provider(), self.policy.weights())
    }

    /// Full pipeline: parse and enrich args, plan, execute tools, finalize,
    /// verify, record. Ledger failures never abort the response.
    #[instrument(skip(self, input))]
    pub async fn handle_query(&self, input: QueryInput) -> Result<ResultEnvelope> {
        let started = Instant::now();
        self.metrics.inc_request();

        let (clean_query, mut args) = parse_inline_args(&input.text);
        let clean_query = normalize_text(&clean_query);
        enrich_from_text(&clean_query, &mut args);
        let merged_prefs = merge_preferences(&self.default_prefs, args.get("prefs"));
        args.insert("prefs".to_string(), Value::Object(merged_prefs));

        let ctx = LedgerContext::new(
            input.session_id.or_else(|| self.default_session_id.clone()),
            &self.agent_version,
            &self.model_id,
            &clean_query,
        );

        self.metrics.inc_planner_call();
        let plan_pack = request_plan(
            &self.generator,
            &self.prompts,
            &clean_query,
            &Value::Object(args.clone()),
            self.planning_max_tokens,
        )
        .await;
        self.record_step(
            &ctx,
            "planning",
            json!({
                "model_id": self.model_id,
                "plan": plan_pack.plan,
                "actions": plan_pack.actions,
            }),
        )
        .await;

        self.record_step(&ctx, "tool_execute", json!({ "args": args })).await;
        let tool_result = self.policy.decide_and_act(&clean_query, &args);
        self.metrics.add_tool_calls(tool_result.actions.len());

        let deterministic_actions = tool_result.actions.clone();
        let tool_result_value = serde_json::to_value(&tool_result)?;
        let mut envelope = request_finalize(
            &self.generator,
            &self.prompts,
            &clean_query,
            &plan_pack.plan,
            deterministic_actions,
            tool_result_value,
            self.finalize_max_tokens,
        )
        .await;

        promote_recommendations(&mut envelope);

        envelope.verify = self.verifier.verify(&envelope);
        if !envelope.verify.ok {
            self.metrics.inc_verify_failure();
        }

        self.record_step(&ctx, "finalize", serde_json::to_value(&envelope)?)
            .await;
        let entry_ack = self
            .ledger
            .write_entry(
                &ctx,
                &Value::Object(args),
                &serde_json::to_value(&envelope)?,
            )
            .await;
        if entry_ack.ok {
            self.metrics.inc_ledger_write();
        }

        envelope.meta = Some(json!({
            "model_id": self.model_id,
            "agent_version": self.agent_version,
            "session_id": ctx.session_id,
            "ledger": entry_ack,
        }));

        self.metrics.observe_latency(started.elapsed());
        info!(
            session_id = %ctx.session_id,
            verify_ok = envelope.verify.ok,
            actions = envelope.actions.len(),
            "query handled"
        );

        Ok(envelope)
    }

    async fn record_step(&self, ctx: &LedgerContext, stage: &str, payload: Value) {
        let ack = self.ledger.write_step(ctx, stage, payload).await;
        if ack.ok {
            self.metrics.inc_ledger_write();
        }
    }
}

/// Free-text autodetection for {city, property_type}; explicit args win.
fn enrich_from_text(clean_query: &str, args: &mut Map<String, Value>) {
    if !args.contains_key("city") {
        if let Some(city) = scan_city(clean_query) {
            args.insert("city".to_string(), json!(city));
        }
    }
    if !args.contains_key("property_type") {
        if let Some(property) = scan_property_type(clean_query) {
            args.insert("property_type".to_string(), json!(property.as_code()));
        }
    }
}

/// The model may drop the recommendations list when rephrasing; restore it
/// from the deterministic tool result so the verifier and the user see the
/// same set.
fn promote_recommendations(envelope: &mut ResultEnvelope) {
    let from_tool = envelope
        .tool_result
        .as_ref()
        .and_then(|tool| tool.get("answer"))
        .and_then(|answer| answer.get("recommendations"))
        .and_then(Value::as_array)
        .filter(|recs| !recs.is_empty())
        .cloned();

    if let (Some(recs), Some(answer)) = (from_tool, envelope.answer.as_object_mut()) {
        let missing = answer
            .get("recommendations")
            .and_then(Value::as_array)
            .map(Vec::is_empty)
            .unwrap_or(true);
        if missing {
            answer.insert("recommendations".to_string(), Value::Array(recs));
        }
    }
}
