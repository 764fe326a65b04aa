// src/engine/integrator.rs

//! Per-project orchestrator: the Idle → CheckingModifications → Building →
//! Publishing state machine, driven by a poll ticker and a control channel.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::config::ProjectConfig;
use crate::engine::pending::{BuildRequest, PendingRequests};
use crate::engine::queue::{BuildPriority, IntegrationQueue};
use crate::engine::server::StatusMap;
use crate::engine::{ControlEvent, IntegratorOptions};
use crate::errors::Result;
use crate::integration::{BuildCause, IntegrationResult, IntegrationSummary};
use crate::scm::{ScmError, SourceControl};
use crate::state::{ProjectState, StateStore};
use crate::tasks::{Pipeline, TaskContext};
use crate::triggers::{Trigger, TriggerContext, TriggerDecision};

/// Bounded retries for persisting a finished build before escalating.
const SAVE_ATTEMPTS: u32 = 3;
const SAVE_RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// How many force requests may pile up while a build is running.
const MAX_PENDING_REQUESTS: usize = 4;

enum CycleKind {
    Poll,
    Force { requested_by: String },
}

/// The state machine tying triggers, source control, the queue, the task
/// pipeline and the state store together for one project.
///
/// Owned by exactly one tokio task; all external interaction goes through
/// the control channel or the shared status map.
pub struct ProjectIntegrator {
    name: String,
    config: ProjectConfig,
    next_config: Option<ProjectConfig>,
    triggers: Vec<Box<dyn Trigger>>,
    pipeline: Pipeline,
    scm: Box<dyn SourceControl>,
    store: Arc<dyn StateStore>,
    queue: Arc<IntegrationQueue>,
    peers: StatusMap,
    pending: PendingRequests,
    last_build: Option<IntegrationSummary>,
    last_checked: Option<DateTime<Utc>>,
}

impl ProjectIntegrator {
    /// Construct with explicit collaborators (tests inject fakes here).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        config: ProjectConfig,
        triggers: Vec<Box<dyn Trigger>>,
        pipeline: Pipeline,
        scm: Box<dyn SourceControl>,
        store: Arc<dyn StateStore>,
        queue: Arc<IntegrationQueue>,
        peers: StatusMap,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            next_config: None,
            triggers,
            pipeline,
            scm,
            store,
            queue,
            peers,
            pending: PendingRequests::new(MAX_PENDING_REQUESTS),
            last_build: None,
            last_checked: None,
        }
    }

    /// Construct from validated configuration.
    pub fn from_config(
        name: &str,
        config: ProjectConfig,
        store: Arc<dyn StateStore>,
        queue: Arc<IntegrationQueue>,
        peers: StatusMap,
    ) -> Result<Self> {
        let (triggers, pipeline, scm) = build_parts(&config)?;
        Ok(Self::new(
            name, config, triggers, pipeline, scm, store, queue, peers,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_build(&self) -> Option<&IntegrationSummary> {
        self.last_build.as_ref()
    }

    /// Load persisted state so scheduling survives a restart.
    ///
    /// A corrupt (existing but unparsable) record is fatal and keeps the
    /// project unscheduled until an operator intervenes; a missing record
    /// just means first-ever build.
    pub async fn bootstrap(&mut self) -> Result<()> {
        match self.store.load(&self.name).await? {
            Some(state) => {
                let summary = state.summary();
                info!(
                    project = %self.name,
                    label = summary.label,
                    status = %summary.status,
                    "resuming from persisted state"
                );
                self.publish_status(&summary);
                self.last_build = Some(summary);
            }
            None => {
                debug!(project = %self.name, "no persisted state; first-ever build pending");
            }
        }
        Ok(())
    }

    /// Main loop: poll ticks, control events and pending force requests.
    pub async fn run(mut self, mut control_rx: mpsc::Receiver<ControlEvent>, options: IntegratorOptions) {
        if let Err(err) = self.bootstrap().await {
            error!(
                project = %self.name,
                error = %err,
                "cannot load project state; project will not be scheduled"
            );
            return;
        }

        let mut ticker = tokio::time::interval(options.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(project = %self.name, "project integrator started");

        loop {
            // Force requests recorded during the previous build run first.
            if let Some(req) = self.pending.pop() {
                let kind = CycleKind::Force {
                    requested_by: req.requested_by,
                };
                if !self.drive_cycle(kind, &mut control_rx).await {
                    break;
                }
                continue;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if !self.drive_cycle(CycleKind::Poll, &mut control_rx).await {
                        break;
                    }
                    if options.exit_after_first_cycle {
                        debug!(project = %self.name, "single-cycle mode; exiting loop");
                        break;
                    }
                }
                ev = control_rx.recv() => match ev {
                    None | Some(ControlEvent::Stop) => break,
                    Some(ControlEvent::ForceBuild { requested_by }) => {
                        let kind = CycleKind::Force { requested_by };
                        if !self.drive_cycle(kind, &mut control_rx).await {
                            break;
                        }
                    }
                    Some(ControlEvent::CancelBuild) => {
                        debug!(project = %self.name, "cancel request while idle; nothing to cancel");
                    }
                    Some(ControlEvent::ConfigUpdated(cfg)) => {
                        self.next_config = Some(*cfg);
                    }
                }
            }
        }

        info!(project = %self.name, "project integrator stopped");
    }

    /// Run one cycle while staying responsive to control events.
    ///
    /// Cancel/stop events flip the cancellation signal threaded through the
    /// pipeline; force/config events are deferred until the cycle finishes
    /// so a build can never overlap itself.
    async fn drive_cycle(
        &mut self,
        kind: CycleKind,
        control_rx: &mut mpsc::Receiver<ControlEvent>,
    ) -> bool {
        self.apply_next_config();

        let project = self.name.clone();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut deferred: Vec<ControlEvent> = Vec::new();
        let mut keep_running = true;
        let mut channel_closed = false;

        {
            let now = Utc::now();
            let cycle = async {
                match kind {
                    CycleKind::Poll => self.poll_once_with_cancel(now, cancel_rx).await,
                    CycleKind::Force { requested_by } => {
                        self.force_once_with_cancel(&requested_by, now, cancel_rx).await
                    }
                }
            };
            tokio::pin!(cycle);

            loop {
                tokio::select! {
                    res = &mut cycle => {
                        if let Err(err) = res {
                            error!(project = %project, error = %err, "integration cycle failed");
                        }
                        break;
                    }
                    ev = control_rx.recv(), if !channel_closed => match ev {
                        None => {
                            channel_closed = true;
                            keep_running = false;
                            let _ = cancel_tx.send(true);
                        }
                        Some(ControlEvent::Stop) => {
                            info!(project = %project, "stop requested; cancelling in-flight build");
                            keep_running = false;
                            let _ = cancel_tx.send(true);
                        }
                        Some(ControlEvent::CancelBuild) => {
                            info!(project = %project, "cancelling in-flight build");
                            let _ = cancel_tx.send(true);
                        }
                        Some(other) => deferred.push(other),
                    }
                }
            }
        }

        for ev in deferred {
            match ev {
                ControlEvent::ForceBuild { requested_by } => {
                    self.pending.record(BuildRequest { requested_by });
                }
                ControlEvent::ConfigUpdated(cfg) => self.next_config = Some(*cfg),
                _ => {}
            }
        }

        keep_running
    }

    /// One poll cycle with an externally controlled cancellation signal.
    pub async fn poll_once_with_cancel(
        &mut self,
        now: DateTime<Utc>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Option<IntegrationSummary>> {
        self.apply_next_config();

        match self.evaluate_triggers(now) {
            TriggerDecision::NoBuild => Ok(None),
            TriggerDecision::BuildNow => {
                self.integrate(BuildCause::Schedule, Vec::new(), now, &mut cancel)
                    .await
            }
            TriggerDecision::BuildIfModified => {
                let from = self
                    .last_checked
                    .or_else(|| self.last_build.as_ref().map(|s| s.start_time))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);

                match self.scm.get_modifications(from, now).await {
                    Err(ScmError::Transient(msg)) => {
                        // Inconclusive: don't advance the window, retry next poll.
                        warn!(
                            project = %self.name,
                            reason = %msg,
                            "source control inconclusive; retrying same window next poll"
                        );
                        Ok(None)
                    }
                    Err(ScmError::Fatal(msg)) => {
                        error!(project = %self.name, reason = %msg, "source control failure");
                        Ok(None)
                    }
                    Ok(mods) if mods.is_empty() => {
                        debug!(project = %self.name, "no modifications in window");
                        self.complete_check(now);
                        Ok(None)
                    }
                    Ok(mods) => {
                        self.integrate(BuildCause::Modifications, mods, now, &mut cancel)
                            .await
                    }
                }
            }
        }
    }

    /// One poll cycle that cannot be cancelled (tests, `--once`).
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> Result<Option<IntegrationSummary>> {
        let (_tx, rx) = watch::channel(false);
        self.poll_once_with_cancel(now, rx).await
    }

    /// Forced build: bypasses triggers and the modification check.
    pub async fn force_once_with_cancel(
        &mut self,
        requested_by: &str,
        now: DateTime<Utc>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Option<IntegrationSummary>> {
        self.apply_next_config();
        let cause = BuildCause::Forced {
            requested_by: requested_by.to_string(),
        };
        self.integrate(cause, Vec::new(), now, &mut cancel).await
    }

    pub async fn force_once(
        &mut self,
        requested_by: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<IntegrationSummary>> {
        let (_tx, rx) = watch::channel(false);
        self.force_once_with_cancel(requested_by, now, rx).await
    }

    /// Strongest decision over all configured triggers.
    fn evaluate_triggers(&mut self, now: DateTime<Utc>) -> TriggerDecision {
        let ctx = TriggerContext {
            now,
            last_build: self.last_build.as_ref(),
            peers: &self.peers,
        };

        let mut decision = TriggerDecision::NoBuild;
        for trigger in &mut self.triggers {
            decision = decision.strongest(trigger.fire(&ctx));
        }
        decision
    }

    /// Run one integration: acquire the slot, run the pipeline, publish.
    async fn integrate(
        &mut self,
        cause: BuildCause,
        modifications: Vec<crate::scm::Modification>,
        now: DateTime<Utc>,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<Option<IntegrationSummary>> {
        let label = self.last_build.as_ref().map(|s| s.label + 1).unwrap_or(1);
        let priority = if cause.is_forced() {
            BuildPriority::Forced
        } else {
            BuildPriority::Normal
        };

        let mut result = IntegrationResult::new(
            self.name.clone(),
            label,
            self.config.working_dir.clone(),
            self.config.artifact_dir.clone(),
            now,
            cause,
            modifications,
            self.last_build.clone(),
        );

        info!(
            project = %self.name,
            label,
            cause = ?result.cause,
            modifications = result.modifications.len(),
            "starting integration"
        );

        // A queued-but-not-started request may be cancelled without side
        // effects; once the slot is held the pipeline owns cancellation.
        let slot = tokio::select! {
            slot = self.queue.acquire(&self.name, priority) => slot?,
            _ = wait_cancelled(cancel) => {
                info!(project = %self.name, label, "build request cancelled while queued");
                return Ok(None);
            }
        };

        let ctx = TaskContext::new(cancel.clone());
        self.pipeline.run(&mut result, &ctx).await;

        // Release before publishing so the next queued request can start
        // while we persist.
        drop(slot);

        let state = ProjectState::from_result(&result);
        self.save_with_retries(&state).await;

        let summary = result.summary();
        self.last_build = Some(summary.clone());
        self.publish_status(&summary);
        self.complete_check(now);

        info!(
            project = %self.name,
            label,
            status = %summary.status,
            tasks = result.task_results.len(),
            "integration finished"
        );

        Ok(Some(summary))
    }

    /// Bookkeeping after a conclusive check cycle (empty window or build).
    fn complete_check(&mut self, now: DateTime<Utc>) {
        self.last_checked = Some(now);
        for trigger in &mut self.triggers {
            trigger.integration_completed(now);
        }
    }

    /// Persist the finished build, retrying with backoff before escalating.
    ///
    /// Scheduling correctness depends on durable state, so exhausting the
    /// retries is an operational alert; the in-memory summary still advances
    /// so status queries stay truthful.
    async fn save_with_retries(&self, state: &ProjectState) {
        let mut delay = SAVE_RETRY_BASE_DELAY;

        for attempt in 1..=SAVE_ATTEMPTS {
            match self.store.save(&self.name, state).await {
                Ok(()) => return,
                Err(err) if attempt < SAVE_ATTEMPTS => {
                    warn!(
                        project = %self.name,
                        attempt,
                        error = %err,
                        "state save failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(err) => {
                    error!(
                        project = %self.name,
                        attempts = SAVE_ATTEMPTS,
                        error = %err,
                        "state save failed after all retries; build outcome not persisted"
                    );
                }
            }
        }
    }

    fn publish_status(&self, summary: &IntegrationSummary) {
        if let Ok(mut map) = self.peers.write() {
            map.insert(self.name.clone(), summary.clone());
        }
    }

    /// Swap in a reloaded configuration between build cycles.
    fn apply_next_config(&mut self) {
        let Some(cfg) = self.next_config.take() else {
            return;
        };

        match build_parts(&cfg) {
            Ok((triggers, pipeline, scm)) => {
                self.triggers = triggers;
                self.pipeline = pipeline;
                self.scm = scm;
                self.config = cfg;
                info!(project = %self.name, "applied updated configuration");
            }
            Err(err) => {
                error!(
                    project = %self.name,
                    error = %err,
                    "updated configuration rejected; keeping previous"
                );
            }
        }
    }
}

type Parts = (Vec<Box<dyn Trigger>>, Pipeline, Box<dyn SourceControl>);

fn build_parts(config: &ProjectConfig) -> Result<Parts> {
    let triggers = crate::triggers::from_config(&config.trigger)?;
    let tasks = crate::tasks::from_config(&config.tasks)?;
    let publishers = crate::tasks::from_config(&config.publishers)?;
    let scm = crate::scm::from_config(&config.source_control);
    Ok((triggers, Pipeline::new(tasks, publishers), scm))
}

/// Resolves once cancellation is requested; pends forever when the sender
/// is gone.
async fn wait_cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
