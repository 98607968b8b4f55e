//! Convergence driver - submits a graph in dependency order
//!
//! A pass goes through the nodes in topological order. A node is handed to
//! the orchestrator once every dependency is Ready; if any dependency
//! failed it is marked `DependencyFailed` and never submitted. Nodes
//! without a path between them may be in flight at the same time, up to
//! `jobs` at once. Failures never abort unrelated branches.

use crate::error::{ApplyError, NodeError};
use crate::graph::DependencyGraph;
use crate::orchestrator::{CancelToken, ConvergenceSignal, NoProgress, Orchestrator, Progress};
use crate::resource::ResourceNode;
use crate::result::{ConvergenceResult, NodeState};
use std::collections::{BTreeSet, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// Longest the driver blocks before re-checking the cancel token
const CANCEL_POLL: Duration = Duration::from_millis(100);

/// Options for a submission pass
#[derive(Debug, Clone)]
pub struct DriveOptions {
    /// Maximum number of nodes in flight at once; 1 submits sequentially
    pub jobs: usize,
    /// Bounded wait for each node's convergence signal
    pub timeout: Duration,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Message sent by a worker when a submission settles
struct Completion {
    idx: usize,
    /// Ran on the shared pool rather than an overflow thread
    pooled: bool,
    signal: ConvergenceSignal,
    elapsed: Duration,
}

/// Runs submission passes against one orchestrator
pub struct Driver {
    orchestrator: Arc<dyn Orchestrator>,
    options: DriveOptions,
    cancel: CancelToken,
}

impl Driver {
    pub fn new(orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self {
            orchestrator,
            options: DriveOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: DriveOptions) -> Self {
        self.options = options;
        self
    }

    /// Use an externally owned cancel token
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels passes run by this driver
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &DriveOptions {
        &self.options
    }

    /// Run a submission pass without progress reporting
    pub fn apply(&self, graph: &DependencyGraph) -> Result<ConvergenceResult, ApplyError> {
        self.apply_with_progress(graph, &mut NoProgress)
    }

    /// Run a submission pass
    ///
    /// Graph errors are returned before any node is submitted. Otherwise
    /// the full per-node result is returned, whatever individual nodes did.
    pub fn apply_with_progress<P: Progress>(
        &self,
        graph: &DependencyGraph,
        progress: &mut P,
    ) -> Result<ConvergenceResult, ApplyError> {
        let order = graph.topological_order()?;
        let nodes: Vec<&ResourceNode> = order
            .iter()
            .filter_map(|id| graph.get(id))
            .collect();
        let result = ConvergenceResult::new(nodes.iter().map(|node| (node.id.as_str(), node.kind)));
        let mut pass = Pass::new(&nodes, result);

        progress.on_pass_start(nodes.len());
        log::info!(
            "Converging {} node(s), {} job(s), {}s timeout",
            nodes.len(),
            self.options.jobs.max(1),
            self.options.timeout.as_secs()
        );

        if !nodes.is_empty() {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs.max(1))
                .thread_name(|i| format!("converge-{i}"))
                .build()
                .map_err(|e| ApplyError::WorkerPool(e.to_string()))?;
            self.run(&pool, &mut pass, progress);
        }

        let summary = pass.result.summary();
        log::info!(
            "Pass complete: {} ready ({} changed), {} failed",
            summary.ready,
            summary.changed,
            summary.failed
        );
        progress.on_pass_complete(&summary);
        Ok(pass.result)
    }

    fn run<P: Progress>(&self, pool: &rayon::ThreadPool, pass: &mut Pass<'_>, progress: &mut P) {
        let jobs = self.options.jobs.max(1);
        let timeout = self.options.timeout;
        let (tx, rx) = mpsc::channel::<Completion>();
        // Dispatch time of nodes awaiting a signal; these are the slots in use
        let mut in_flight: HashMap<usize, Instant> = HashMap::new();
        // Pool workers still busy, including ones whose node already timed out
        let mut pooled = 0usize;

        loop {
            // Settle or dispatch eligible nodes until nothing changes
            loop {
                let mut progressed = false;
                let candidates: Vec<usize> = pass.eligible.iter().copied().collect();
                for idx in candidates {
                    let node = pass.nodes[idx];
                    if let Some(dependency) = pass.failed_dependency(idx) {
                        log::warn!(
                            "Skipping {}: dependency '{}' failed",
                            node.label(),
                            dependency
                        );
                        pass.eligible.remove(&idx);
                        let error = NodeError::DependencyFailed { dependency };
                        pass.fail(idx, error, Duration::ZERO, progress);
                        progressed = true;
                    } else if self.cancel.is_cancelled() {
                        log::warn!("Skipping {}: pass cancelled", node.label());
                        pass.eligible.remove(&idx);
                        pass.fail(idx, NodeError::Cancelled, Duration::ZERO, progress);
                        progressed = true;
                    } else if in_flight.len() < jobs {
                        pass.eligible.remove(&idx);
                        pass.result.mark_submitting(&node.id);
                        progress.on_node_start(node);
                        log::info!("Submitting {}", node.label());

                        let on_pool = pooled < jobs;
                        let job = self.submission(node, idx, on_pool, tx.clone());
                        if on_pool {
                            pool.spawn(job);
                            pooled += 1;
                            in_flight.insert(idx, Instant::now());
                        } else {
                            // Every pool worker is stuck on a timed-out node
                            log::debug!(
                                "Pool saturated by timed-out nodes; {} gets its own thread",
                                node.label()
                            );
                            match thread::Builder::new()
                                .name(format!("converge-overflow-{idx}"))
                                .spawn(job)
                            {
                                Ok(_) => {
                                    in_flight.insert(idx, Instant::now());
                                }
                                Err(e) => {
                                    let detail = format!("failed to start worker: {e}");
                                    log::error!("{}: {detail}", node.label());
                                    let error = NodeError::Orchestrator { detail };
                                    pass.fail(idx, error, Duration::ZERO, progress);
                                }
                            }
                        }
                        progressed = true;
                    }
                }
                if !progressed {
                    break;
                }
            }

            if pass.is_complete() {
                break;
            }
            if in_flight.is_empty() {
                log::error!("No node in flight and none eligible; stopping pass");
                break;
            }

            // Wake at the earliest deadline, or sooner to notice cancellation
            let wait = in_flight
                .values()
                .min()
                .map_or(CANCEL_POLL, |&earliest| {
                    (earliest + timeout).saturating_duration_since(Instant::now())
                })
                .min(CANCEL_POLL);

            match rx.recv_timeout(wait) {
                Ok(completion) => {
                    if completion.pooled {
                        pooled -= 1;
                    }
                    if in_flight.remove(&completion.idx).is_none() {
                        log::debug!(
                            "Discarding late signal for {}",
                            pass.nodes[completion.idx].label()
                        );
                        continue;
                    }
                    pass.settle(completion, progress);
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now = Instant::now();
                    let expired: Vec<usize> = in_flight
                        .iter()
                        .filter(|(_, started)| now.duration_since(**started) >= timeout)
                        .map(|(&idx, _)| idx)
                        .collect();
                    for idx in expired {
                        in_flight.remove(&idx);
                        log::warn!(
                            "{} did not converge within {}s",
                            pass.nodes[idx].label(),
                            timeout.as_secs()
                        );
                        let error = NodeError::ConvergenceTimeout { after: timeout };
                        pass.fail(idx, error, timeout, progress);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // Unreachable while `tx` is alive; fail whatever is left
                    for idx in in_flight.drain().map(|(idx, _)| idx).collect::<Vec<_>>() {
                        pass.fail(
                            idx,
                            NodeError::Orchestrator {
                                detail: "worker disconnected".into(),
                            },
                            Duration::ZERO,
                            progress,
                        );
                    }
                    break;
                }
            }
        }
    }

    /// Work item that submits one node and reports back on `tx`
    fn submission(
        &self,
        node: &ResourceNode,
        idx: usize,
        pooled: bool,
        tx: mpsc::Sender<Completion>,
    ) -> impl FnOnce() + Send + 'static {
        let orchestrator = Arc::clone(&self.orchestrator);
        let owned = node.clone();
        let timeout = self.options.timeout;
        move || {
            let started = Instant::now();
            let signal =
                panic::catch_unwind(AssertUnwindSafe(|| orchestrator.submit(&owned, timeout)))
                    .unwrap_or_else(|_| ConvergenceSignal::failed("orchestrator panicked"));
            // The receiver is gone only when the pass already returned
            let _ = tx.send(Completion {
                idx,
                pooled,
                signal,
                elapsed: started.elapsed(),
            });
        }
    }
}

/// Scheduling state of one pass
struct Pass<'g> {
    nodes: Vec<&'g ResourceNode>,
    result: ConvergenceResult,
    /// Dependencies of each node not yet in a final state
    waiting_on: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    /// Nodes whose dependencies are all final, by topological position
    eligible: BTreeSet<usize>,
    finished: usize,
}

impl<'g> Pass<'g> {
    fn new(nodes: &[&'g ResourceNode], result: ConvergenceResult) -> Self {
        let position: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (node.id.as_str(), idx))
            .collect();

        let mut waiting_on = vec![0; nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        for (idx, node) in nodes.iter().enumerate() {
            for dep in &node.depends_on {
                if let Some(&dep_idx) = position.get(dep.as_str()) {
                    waiting_on[idx] += 1;
                    dependents[dep_idx].push(idx);
                }
            }
        }

        let eligible = (0..nodes.len()).filter(|&idx| waiting_on[idx] == 0).collect();

        Self {
            nodes: nodes.to_vec(),
            result,
            waiting_on,
            dependents,
            eligible,
            finished: 0,
        }
    }

    fn is_complete(&self) -> bool {
        self.finished == self.nodes.len()
    }

    /// First dependency (in name order) that is not Ready
    fn failed_dependency(&self, idx: usize) -> Option<String> {
        self.nodes[idx]
            .depends_on
            .iter()
            .find(|dep| self.result.state(dep) != Some(NodeState::Ready))
            .cloned()
    }

    fn settle<P: Progress>(&mut self, completion: Completion, progress: &mut P) {
        let node = self.nodes[completion.idx];
        match completion.signal {
            ConvergenceSignal::Converged => {
                log::info!("{} converged", node.label());
                self.result.mark_ready(&node.id, true, completion.elapsed);
                self.finish(completion.idx, progress);
            }
            ConvergenceSignal::AlreadyConverged => {
                log::info!("{} already converged", node.label());
                self.result.mark_ready(&node.id, false, completion.elapsed);
                self.finish(completion.idx, progress);
            }
            ConvergenceSignal::Failed { detail } => {
                log::error!("{} failed: {}", node.label(), detail);
                self.fail(
                    completion.idx,
                    NodeError::Orchestrator { detail },
                    completion.elapsed,
                    progress,
                );
            }
        }
    }

    fn fail<P: Progress>(
        &mut self,
        idx: usize,
        error: NodeError,
        elapsed: Duration,
        progress: &mut P,
    ) {
        self.result.mark_failed(&self.nodes[idx].id, error, elapsed);
        self.finish(idx, progress);
    }

    /// Record a final state and release dependents
    fn finish<P: Progress>(&mut self, idx: usize, progress: &mut P) {
        self.finished += 1;
        if let Some(report) = self.result.get(&self.nodes[idx].id) {
            progress.on_node_complete(report);
        }
        for &dependent in &self.dependents[idx] {
            self.waiting_on[dependent] -= 1;
            if self.waiting_on[dependent] == 0 {
                self.eligible.insert(dependent);
            }
        }
    }
}
