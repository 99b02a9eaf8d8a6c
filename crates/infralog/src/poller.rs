//! The polling loop.
//!
//! The [`Poller`] keeps the last known state in memory, fetches the current
//! one on a fixed interval and notifies every target when they differ. Poll
//! failures are logged and counted; the loop keeps going.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backend::{self, Backend};
use crate::config::{Config, FilterConfig, TfStateConfig};
use crate::error::Result;
use crate::metrics::{Metrics, PollStage};
use crate::persistence::{self, StateStore};
use crate::redact::Redactor;
use crate::target::{self, Payload, Target};
use crate::tfstate::{compare, fingerprint, State, StateDiff};

/// What a single poll found.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// The state document is byte-identical to the last one.
    Unchanged,
    /// No baseline existed; the fetched state became the baseline.
    Baseline,
    /// The state changed but no filtered resource or output differs.
    NoChanges,
    /// Changes were detected and sent to the targets.
    Changes(StateDiff),
}

/// Send a payload to every target, counting successes and failures.
///
/// Returns the number of targets that failed.
pub async fn notify_all(targets: &[Box<dyn Target>], payload: &Payload, metrics: &Metrics) -> usize {
    let mut failures = 0;
    for target in targets {
        match target.write(payload).await {
            Ok(()) => {
                debug!(target = target.name(), "notification sent");
                metrics.record_notification_sent(target.name());
            }
            Err(e) => {
                error!(target = target.name(), error = %e, "notification failed");
                metrics.record_notification_error(target.name());
                failures += 1;
            }
        }
    }
    failures
}

/// Watches a state backend and reports drift.
pub struct Poller {
    backend: Box<dyn Backend>,
    targets: Vec<Box<dyn Target>>,
    store: Option<Box<dyn StateStore>>,
    metrics: Arc<Metrics>,
    redactor: Redactor,
    filter: FilterConfig,
    tfstate: TfStateConfig,
    interval: Duration,
    last_state: Option<State>,
    last_fingerprint: Option<String>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("backend", &self.backend.name())
            .field(
                "targets",
                &self.targets.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .field("store", &self.store.as_ref().map(|s| s.name()))
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Assemble a poller from its parts.
    #[must_use]
    pub fn new(
        backend: Box<dyn Backend>,
        targets: Vec<Box<dyn Target>>,
        store: Option<Box<dyn StateStore>>,
        metrics: Arc<Metrics>,
        redactor: Redactor,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            targets,
            store,
            metrics,
            redactor,
            filter: config.filter.clone(),
            tfstate: config.tfstate.clone(),
            interval: config.poll_interval(),
            last_state: None,
            last_fingerprint: None,
        }
    }

    /// Build the backend, targets, store and redactor from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any component is misconfigured.
    pub fn from_config(config: &Config, metrics: Arc<Metrics>) -> Result<Self> {
        let backend = backend::from_config(&config.tfstate)?;
        let targets = target::build_targets(&config.target)?;
        let store = persistence::open_store(&config.persistence)?;
        let redactor = Redactor::new(&config.redact)?;

        info!(
            backend = backend.name(),
            source = %backend.source(),
            targets = ?targets.iter().map(|t| t.name()).collect::<Vec<_>>(),
            store = store.as_ref().map(|s| s.name()),
            "poller configured"
        );

        Ok(Self::new(backend, targets, store, metrics, redactor, config))
    }

    /// The state changes are compared against.
    #[must_use]
    pub fn last_state(&self) -> Option<&State> {
        self.last_state.as_ref()
    }

    /// Establish the baseline.
    ///
    /// Uses the persisted state when there is one, otherwise fetches the
    /// current state and persists it.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial state cannot be fetched or parsed.
    pub async fn initialize(&mut self) -> Result<()> {
        if let Some(store) = &self.store {
            match store.load() {
                Ok(Some(state)) => {
                    info!(
                        store = store.name(),
                        serial = state.serial,
                        "resuming from persisted state"
                    );
                    self.last_state = Some(state);
                    return Ok(());
                }
                Ok(None) => debug!(store = store.name(), "no persisted state"),
                Err(e) => warn!(error = %e, "failed to load persisted state, fetching baseline"),
            }
        }

        let data = self.backend.fetch_state().await?;
        let state = State::parse(&data)?;
        info!(
            serial = state.serial,
            resources = state.resources.len(),
            "initial state loaded"
        );

        self.persist(&state);
        self.last_state = Some(state);
        self.last_fingerprint = Some(fingerprint(&data));
        self.metrics.record_poll_success();
        Ok(())
    }

    /// Run one poll cycle.
    ///
    /// # Errors
    ///
    /// Returns an error if fetching or parsing fails. The error is already
    /// counted in the metrics.
    pub async fn poll(&mut self) -> Result<PollOutcome> {
        let data = self.backend.fetch_state().await.inspect_err(|_| {
            self.metrics.record_poll_error(PollStage::Fetch);
        })?;

        let print = fingerprint(&data);
        if self.last_fingerprint.as_deref() == Some(print.as_str()) {
            debug!("state unchanged");
            self.metrics.record_poll_success();
            return Ok(PollOutcome::Unchanged);
        }

        let state = State::parse(&data).inspect_err(|_| {
            self.metrics.record_poll_error(PollStage::Parse);
        })?;

        let Some(previous) = self.last_state.as_ref() else {
            info!(serial = state.serial, "baseline established");
            self.persist(&state);
            self.last_state = Some(state);
            self.last_fingerprint = Some(print);
            self.metrics.record_poll_success();
            return Ok(PollOutcome::Baseline);
        };

        let diff = compare(previous, &state, &self.filter);
        self.metrics.record_poll_success();

        if !diff.has_changes() {
            debug!(serial = state.serial, "no relevant changes");
            self.last_state = Some(state);
            self.last_fingerprint = Some(print);
            return Ok(PollOutcome::NoChanges);
        }

        info!(
            resources = diff.resource_diffs.len(),
            outputs = diff.output_diffs.len(),
            "changes detected"
        );
        for rd in &diff.resource_diffs {
            self.metrics
                .record_change(rd.status.as_str(), &rd.resource_type);
        }

        let payload = Payload::state(
            self.redactor.redact(&diff),
            self.backend.source(),
            self.tfstate.clone(),
        );
        notify_all(&self.targets, &payload, &self.metrics).await;

        self.persist(&state);
        if let Some(store) = &self.store {
            if let Err(e) = store.record(&payload.diffs) {
                warn!(error = %e, "failed to record change history");
            }
        }
        self.last_state = Some(state);
        self.last_fingerprint = Some(print);

        Ok(PollOutcome::Changes(diff))
    }

    /// Poll every interval until `shutdown` completes. The first poll runs
    /// one interval after the start.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(interval_secs = self.interval.as_secs(), "polling started");
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, stopping poller");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll().await {
                        error!(error = %e, "poll failed");
                    }
                }
            }
        }
    }

    fn persist(&self, state: &State) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(state) {
                warn!(store = store.name(), error = %e, "failed to persist state");
            }
        }
    }
}

/// Completes on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
