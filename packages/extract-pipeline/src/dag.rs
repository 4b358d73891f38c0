//! Step graph executor.
//!
//! Steps form a DAG: a step starts once every step it depends on has
//! succeeded, and independent steps run concurrently. Shared resources
//! that cannot take concurrent use (the warehouse writer) are modelled as
//! named locks in [`ResourceLocks`], which steps acquire around the
//! critical section only.
//!
//! # Architecture
//!
//! ```text
//! Dag::execute
//!     │
//!     ├─► validate (unknown deps, cycles) → topological order
//!     ├─► start every ready step (deps satisfied, run not cancelled)
//!     ├─► on completion: record outcome, release dependents
//!     └─► dependents of a failed/skipped step are skipped
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{PipelineError, Result};

/// Lock name shared by every step that writes to the warehouse.
pub const DESTINATION_WRITER: &str = "destination-writer";

/// Run metadata reported by a successful step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepMetadata {
    pub table: String,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub pages: usize,
}

/// Named mutual-exclusion resources shared across a run.
#[derive(Clone, Default)]
pub struct ResourceLocks {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `name`; released when the guard drops.
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Everything a step gets from the executor.
#[derive(Clone, Default)]
pub struct StepContext {
    pub cancel: CancellationToken,
    pub locks: ResourceLocks,
}

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: StepContext) -> Result<StepMetadata>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", content = "step", rename_all = "snake_case")]
pub enum SkipReason {
    /// A dependency failed or was itself skipped
    Upstream(String),
    /// The run was cancelled before the step started
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Succeeded(StepMetadata),
    Failed { error: String },
    Skipped(SkipReason),
}

impl StepOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, StepOutcome::Succeeded(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    pub outcome: StepOutcome,
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

/// Per-step outcomes, in completion order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn get(&self, name: &str) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.outcome)
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Succeeded(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Skipped(_)))
    }

    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.outcome.is_success())
    }

    fn count(&self, pred: impl Fn(&StepOutcome) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.outcome)).count()
    }
}

struct Node {
    step: Arc<dyn Step>,
    deps: Vec<String>,
}

#[derive(Default)]
pub struct Dag {
    nodes: IndexMap<String, Node>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a step that may start once all of `deps` have succeeded.
    pub fn add_step(&mut self, step: Arc<dyn Step>, deps: &[&str]) -> Result<()> {
        let name = step.name().to_string();
        if self.nodes.contains_key(&name) {
            return Err(PipelineError::InvalidGraph(format!(
                "step {name} registered twice"
            )));
        }
        self.nodes.insert(
            name,
            Node {
                step,
                deps: deps.iter().map(|d| d.to_string()).collect(),
            },
        );
        Ok(())
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    pub fn dependencies(&self, name: &str) -> Option<&[String]> {
        self.nodes.get(name).map(|n| n.deps.as_slice())
    }

    /// Keep only the named steps. Dependencies on dropped steps are removed.
    pub fn select(&self, names: &[String]) -> Result<Dag> {
        if let Some(unknown) = names.iter().find(|n| !self.nodes.contains_key(*n)) {
            return Err(PipelineError::UnknownStep(unknown.clone()));
        }

        let mut nodes = IndexMap::new();
        for (name, node) in &self.nodes {
            if !names.contains(name) {
                continue;
            }
            nodes.insert(
                name.clone(),
                Node {
                    step: node.step.clone(),
                    deps: node
                        .deps
                        .iter()
                        .filter(|d| names.contains(*d))
                        .cloned()
                        .collect(),
                },
            );
        }
        Ok(Dag { nodes })
    }

    /// Topological order, or an error for unknown dependencies and cycles.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut indegree: IndexMap<&str, usize> = IndexMap::new();
        for (name, node) in &self.nodes {
            for dep in &node.deps {
                if !self.nodes.contains_key(dep) {
                    return Err(PipelineError::InvalidGraph(format!(
                        "step {name} depends on unknown step {dep}"
                    )));
                }
            }
            indegree.insert(name, node.deps.len());
        }

        let dependents = self.dependents();
        let mut ready: VecDeque<&str> = indegree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(n, _)| *n)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(name) = ready.pop_front() {
            order.push(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(d) = indegree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            let stuck: Vec<&str> = indegree
                .iter()
                .filter(|(_, d)| **d > 0)
                .map(|(n, _)| *n)
                .collect();
            return Err(PipelineError::InvalidGraph(format!(
                "cycle among steps: {}",
                stuck.join(", ")
            )));
        }
        Ok(order)
    }

    /// Run every step, respecting dependencies.
    ///
    /// Step failures are recorded in the report rather than returned; only
    /// an invalid graph fails the call itself.
    pub async fn execute(&self, ctx: StepContext) -> Result<RunReport> {
        self.validate()?;

        let dependents = self.dependents();
        let mut waiting: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|(name, node)| (name.as_str(), node.deps.len()))
            .collect();
        let mut ready: VecDeque<&str> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.deps.is_empty())
            .map(|(name, _)| name.as_str())
            .collect();

        let mut outcomes: HashMap<&str, StepOutcome> = HashMap::new();
        let mut report = RunReport::default();
        let mut running: FuturesUnordered<BoxFuture<'static, (String, Result<StepMetadata>, Duration)>> =
            FuturesUnordered::new();

        loop {
            while let Some(name) = ready.pop_front() {
                let Some(node) = self.nodes.get(name) else {
                    continue;
                };

                let blocked = node
                    .deps
                    .iter()
                    .find(|dep| !outcomes.get(dep.as_str()).is_some_and(StepOutcome::is_success));
                let skip = match blocked {
                    Some(dep) => Some(SkipReason::Upstream(dep.clone())),
                    None if ctx.cancel.is_cancelled() => Some(SkipReason::Cancelled),
                    None => None,
                };

                if let Some(reason) = skip {
                    warn!(step = name, reason = ?reason, "step skipped");
                    let outcome = StepOutcome::Skipped(reason);
                    outcomes.insert(name, outcome.clone());
                    report.steps.push(StepReport {
                        name: name.to_string(),
                        outcome,
                        elapsed: Duration::ZERO,
                    });
                    release(name, &dependents, &mut waiting, &mut ready);
                    continue;
                }

                info!(step = name, "step started");
                let step = node.step.clone();
                let step_ctx = ctx.clone();
                let owned = name.to_string();
                running.push(
                    async move {
                        let started = Instant::now();
                        let result = step.run(step_ctx).await;
                        (owned, result, started.elapsed())
                    }
                    .boxed(),
                );
            }

            let Some((name, result, elapsed)) = running.next().await else {
                break;
            };
            let Some((key, _)) = self.nodes.get_key_value(&name) else {
                continue;
            };
            let key = key.as_str();

            let outcome = match result {
                Ok(metadata) => {
                    info!(
                        step = key,
                        rows = metadata.row_count,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "step succeeded"
                    );
                    StepOutcome::Succeeded(metadata)
                }
                Err(e) => {
                    error!(step = key, error = %e, "step failed");
                    StepOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            };

            outcomes.insert(key, outcome.clone());
            report.steps.push(StepReport {
                name,
                outcome,
                elapsed,
            });
            release(key, &dependents, &mut waiting, &mut ready);
        }

        Ok(report)
    }

    fn dependents(&self) -> HashMap<&str, Vec<&str>> {
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for (name, node) in &self.nodes {
            for dep in &node.deps {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }
        dependents
    }
}

/// Mark `done` finished and queue dependents whose deps are all finished.
fn release<'a>(
    done: &str,
    dependents: &HashMap<&'a str, Vec<&'a str>>,
    waiting: &mut HashMap<&'a str, usize>,
    ready: &mut VecDeque<&'a str>,
) {
    for dependent in dependents.get(done).into_iter().flatten() {
        if let Some(count) = waiting.get_mut(dependent) {
            *count -= 1;
            if *count == 0 {
                ready.push_back(*dependent);
            }
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }
}
