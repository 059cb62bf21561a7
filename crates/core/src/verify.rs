use serde_json::Value;

use crate::models::{ResultEnvelope, Verification};

const NO_MATCH_REASON: &str = "No neighbourhoods matched the specified criteria";
const BUDGET_NOTE: &str =
    "Listing far above target ratio; consider increasing budget or relaxing constraints.";

/// Deterministic post-hoc checker of the finalized envelope. Runs strictly
/// after the external finalizer and is independent of it; in non-strict
/// mode it passes through whatever the finalizer claimed.
#[derive(Debug, Clone, Copy)]
pub struct Verifier {
    pub strict: bool,
    pub hints: bool,
}

impl Verifier {
    pub fn new(strict: bool, hints: bool) -> Self {
        Self { strict, hints }
    }

    /// Never fails and never panics: any internal inconsistency degrades to
    /// a pass, not an aborted response.
    pub fn verify(&self, envelope: &ResultEnvelope) -> Verification {
        if !self.strict {
            return envelope.verify.clone();
        }

        if let Some(failure) = self.check_suggest_matches(envelope) {
            return failure;
        }
        if let Some(failure) = check_budget_alignment(&envelope.answer) {
            return failure;
        }

        envelope.verify.clone()
    }

    fn check_suggest_matches(&self, envelope: &ResultEnvelope) -> Option<Verification> {
        if last_tool(envelope).as_deref() != Some("suggest_neighbourhoods") {
            return None;
        }

        let from_answer = recommendations_of(&envelope.answer);
        let from_tool = envelope
            .tool_result
            .as_ref()
            .and_then(|tool| tool.get("answer"))
            .map(recommendations_of)
            .unwrap_or(0);
        if from_answer + from_tool > 0 {
            return None;
        }

        let mut reasons = vec![NO_MATCH_REASON.to_string()];
        if self.hints {
            let prefs = locate_prefs(envelope);
            reasons.extend(relaxation_hints(&prefs).into_iter().take(2));
        }
        Some(Verification::failed_with_reasons(reasons))
    }
}

fn last_tool(envelope: &ResultEnvelope) -> Option<String> {
    if let Some(action) = envelope.actions.last() {
        return Some(action.tool.clone());
    }
    envelope
        .tool_result
        .as_ref()
        .and_then(|tool| tool.get("actions"))
        .and_then(Value::as_array)
        .and_then(|actions| actions.last())
        .and_then(|action| action.get("tool"))
        .and_then(Value::as_str)
        .map(ToString::to_string)
}

fn recommendations_of(answer: &Value) -> usize {
    answer
        .get("recommendations")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0)
}

fn locate_prefs(envelope: &ResultEnvelope) -> Value {
    if let Some(prefs) = envelope.answer.get("prefs") {
        if prefs.is_object() {
            return prefs.clone();
        }
    }
    envelope
        .tool_result
        .as_ref()
        .and_then(|tool| tool.get("answer"))
        .and_then(|answer| answer.get("prefs"))
        .filter(|prefs| prefs.is_object())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Actionable loosenings of whichever preference values are currently the
/// most restrictive: distance +3, min_transit -5, target_ratio +0.03, each
/// clamped to sane bounds.
fn relaxation_hints(prefs: &Value) -> Vec<String> {
    let mut hints = Vec::new();

    if let Some(distance) = prefs.get("max_distance_km").and_then(Value::as_f64) {
        if distance <= 12.0 {
            hints.push(format!(
                "Try increasing max_distance_km from {} \u{2192} {}",
                fmt_num(distance),
                fmt_num(distance + 3.0)
            ));
        }
    }
    if let Some(transit) = prefs.get("min_transit").and_then(Value::as_f64) {
        if transit >= 60.0 {
            hints.push(format!(
                "Consider lowering min_transit from {} \u{2192} {}",
                fmt_num(transit),
                fmt_num((transit - 5.0).max(0.0))
            ));
        }
    }
    if let Some(ratio) = prefs.get("target_rent_to_income").and_then(Value::as_f64) {
        if ratio <= 0.30 {
            hints.push(format!(
                "Consider raising target_rent_to_income from {:.2} \u{2192} {:.2}",
                ratio,
                (ratio + 0.03).min(0.40)
            ));
        }
    }

    hints
}

fn check_budget_alignment(answer: &Value) -> Option<Verification> {
    let listing = answer.get("listing_price").and_then(Value::as_f64)?;
    let income = answer.get("income_annual").and_then(Value::as_f64)?;
    let target = answer.get("target_ratio").and_then(Value::as_f64)?;

    // A 25% tolerance band above the literal target; targets outside (0, 1)
    // are out of scope for this rule.
    if target > 0.0 && target < 1.0 {
        let monthly_income = income / 12.0;
        if listing > monthly_income * (target * 1.25) {
            return Some(Verification::failed(BUDGET_NOTE));
        }
    }
    None
}

fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
