//! Batch probe orchestration.
//!
//! A probe run takes a list of model ids and tests each one against the
//! upstream with a bounded number of in-flight requests. Workers pull from a
//! shared queue, so a slow model only holds up its own worker. Every model
//! ends in a terminal state; one model failing never aborts the batch.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use {
    serde::{Deserialize, Serialize},
    tokio::task::JoinSet,
    tracing::{debug, warn},
};

use modelprobe_providers::ModelProvider;

/// Default number of models tested at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Lifecycle of one model inside a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Pending,
    Testing,
    Success,
    Failed,
}

impl ProbeStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Terminal result for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOutcome {
    pub model_id: String,
    pub status: ProbeStatus,
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a finished run produced, outcomes in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeRunSummary {
    pub outcomes: Vec<ProbeOutcome>,
    pub total: usize,
    pub success: usize,
    pub failed: usize,
}

impl ProbeRunSummary {
    fn from_outcomes(outcomes: Vec<ProbeOutcome>) -> Self {
        let total = outcomes.len();
        let success = outcomes
            .iter()
            .filter(|o| o.status == ProbeStatus::Success)
            .count();
        Self {
            outcomes,
            total,
            success,
            failed: total - success,
        }
    }
}

/// Replace the outcome for one model inside an existing result set, keyed by
/// model id. Used when a single model is re-tested after a batch run; a model
/// not present in the set is appended.
pub fn merge_retest(outcomes: &mut Vec<ProbeOutcome>, fresh: ProbeOutcome) {
    match outcomes.iter_mut().find(|o| o.model_id == fresh.model_id) {
        Some(slot) => *slot = fresh,
        None => outcomes.push(fresh),
    }
}

/// Runs probe batches with a fixed worker fan-out.
#[derive(Debug, Clone)]
pub struct ProbeRunner {
    concurrency: usize,
}

impl Default for ProbeRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

impl ProbeRunner {
    /// `concurrency` is clamped to at least 1.
    #[must_use]
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    /// Test every model in `model_ids` and return one terminal outcome per
    /// model, in input order. Spawns `min(concurrency, n)` workers over a
    /// shared queue.
    pub async fn run(
        &self,
        adapter: Arc<dyn ModelProvider>,
        base_url: Option<String>,
        api_key: String,
        model_ids: Vec<String>,
    ) -> ProbeRunSummary {
        if model_ids.is_empty() {
            return ProbeRunSummary::from_outcomes(Vec::new());
        }

        let order: Vec<String> = model_ids.clone();
        let queue: Arc<Mutex<VecDeque<String>>> = Arc::new(Mutex::new(model_ids.into()));
        let done: Arc<Mutex<Vec<ProbeOutcome>>> = Arc::new(Mutex::new(Vec::new()));

        let workers = self.concurrency.min(order.len());
        debug!(models = order.len(), workers, "starting probe run");

        let mut set = JoinSet::new();
        for _ in 0..workers {
            let queue = Arc::clone(&queue);
            let done = Arc::clone(&done);
            let adapter = Arc::clone(&adapter);
            let base_url = base_url.clone();
            let api_key = api_key.clone();

            set.spawn(async move {
                loop {
                    // Lock only around the pop; never held across an await.
                    let model_id = match queue.lock() {
                        Ok(mut q) => q.pop_front(),
                        Err(_) => None,
                    };
                    let Some(model_id) = model_id else { break };

                    let report = adapter
                        .test_model(base_url.as_deref(), &api_key, &model_id)
                        .await;

                    if !report.success {
                        warn!(model = %model_id, error = ?report.error, "model probe failed");
                    }

                    let outcome = ProbeOutcome {
                        model_id,
                        status: if report.success {
                            ProbeStatus::Success
                        } else {
                            ProbeStatus::Failed
                        },
                        latency_ms: report.latency_ms,
                        error: report.error,
                    };
                    if let Ok(mut results) = done.lock() {
                        results.push(outcome);
                    }
                }
            });
        }
        while set.join_next().await.is_some() {}

        let mut results = match done.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        // Workers finish in arbitrary order; report in input order.
        let mut ordered = Vec::with_capacity(order.len());
        for id in &order {
            if let Some(pos) = results.iter().position(|o| &o.model_id == id) {
                ordered.push(results.swap_remove(pos));
            }
        }
        ProbeRunSummary::from_outcomes(ordered)
    }
}
