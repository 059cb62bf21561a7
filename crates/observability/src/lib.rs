use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: OnceCell<()> = OnceCell::new();

#[derive(Debug, Default)]
pub struct AppMetrics {
    requests_total: AtomicU64,
    planner_calls_total: AtomicU64,
    tool_calls_total: AtomicU64,
    verify_failures_total: AtomicU64,
    ledger_writes_total: AtomicU64,
    total_latency_millis: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub planner_calls_total: u64,
    pub tool_calls_total: u64,
    pub verify_failures_total: u64,
    pub ledger_writes_total: u64,
    pub avg_latency_millis: f64,
}

impl AppMetrics {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn inc_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_planner_call(&self) {
        self.planner_calls_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_tool_calls(&self, calls: usize) {
        self.tool_calls_total
            .fetch_add(calls as u64, Ordering::Relaxed);
    }

    pub fn inc_verify_failure(&self) {
        self.verify_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_ledger_write(&self) {
        self.ledger_writes_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, duration: Duration) {
        self.total_latency_millis
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let requests = self.requests_total.load(Ordering::Relaxed);
        let latency = self.total_latency_millis.load(Ordering::Relaxed);

        MetricsSnapshot {
            requests_total: requests,
            planner_calls_total: self.planner_calls_total.load(Ordering::Relaxed),
            tool_calls_total: self.tool_calls_total.load(Ordering::Relaxed),
            verify_failures_total: self.verify_failures_total.load(Ordering::Relaxed),
            ledger_writes_total: self.ledger_writes_total.load(Ordering::Relaxed),
            avg_latency_millis: if requests == 0 {
                0.0
            } else {
                latency as f64 / requests as f64
            },
        }
    }
}

pub fn init_tracing(service_name: &str) {
    TRACING_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}=info,rentscope_api=info,rentscope_agents=info",
                service_name
            ))
        });

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .with_span_list(true)
            .init();
    });
}
