//! Watch scheduler: one background task per enabled server.
//!
//! Each task sleeps for the server's scan interval, probes it, steps the
//! recovery state machine, and writes the result back to the registry.
//! Tasks never wait on each other: a slow panel response for one server
//! only delays that server's own loop, and every panel call is bounded by
//! `call_timeout`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use pterowatch_state::*;

use crate::collaborator::{RecoveryActuator, StatusProbe};
use crate::machine::{self, Command};

/// Upper bound on a single probe or power call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-server loop state.
struct LoopSlot {
    /// Handle to the background watch task.
    handle: JoinHandle<()>,
    /// Stop signal for this loop only.
    stop_tx: watch::Sender<bool>,
}

/// Everything a single watch loop needs.
struct LoopContext {
    id: ServerId,
    registry: Registry,
    probe: Arc<dyn StatusProbe>,
    actuator: Arc<dyn RecoveryActuator>,
    call_timeout: Duration,
    shutdown: watch::Receiver<bool>,
    stop: watch::Receiver<bool>,
}

/// Drives one watch loop per enabled server in the registry.
pub struct WatchScheduler {
    registry: Registry,
    probe: Arc<dyn StatusProbe>,
    actuator: Arc<dyn RecoveryActuator>,
    /// Active loops: server id → slot.
    loops: Arc<RwLock<HashMap<ServerId, LoopSlot>>>,
    /// Process-wide shutdown signal.
    shutdown: watch::Receiver<bool>,
    call_timeout: Duration,
}

impl WatchScheduler {
    pub fn new(
        registry: Registry,
        probe: Arc<dyn StatusProbe>,
        actuator: Arc<dyn RecoveryActuator>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            registry,
            probe,
            actuator,
            loops: Arc::new(RwLock::new(HashMap::new())),
            shutdown,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Bound probe and power calls by `timeout` instead of the default.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Start a loop for `id` if it is enabled and not already watched.
    ///
    /// Returns `true` if a new loop was spawned. The first probe happens one
    /// full scan interval after this call.
    pub async fn watch(&self, id: &str) -> StateResult<bool> {
        let record = self.registry.get(id).await?;
        if !record.spec.enabled || *self.shutdown.borrow() {
            return Ok(false);
        }

        let mut loops = self.loops.write().await;
        if loops.get(id).is_some_and(|slot| !slot.handle.is_finished()) {
            return Ok(false);
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let ctx = LoopContext {
            id: id.to_string(),
            registry: self.registry.clone(),
            probe: Arc::clone(&self.probe),
            actuator: Arc::clone(&self.actuator),
            call_timeout: self.call_timeout,
            shutdown: self.shutdown.clone(),
            stop: stop_rx,
        };
        let handle = tokio::spawn(run_watch_loop(ctx));
        loops.insert(id.to_string(), LoopSlot { handle, stop_tx });

        info!(
            server_id = %id,
            endpoint = %record.spec.endpoint,
            interval = ?record.spec.policy.scan_interval,
            "watch loop started"
        );
        Ok(true)
    }

    /// Cancel the loop for `id`. Returns `true` if one was running.
    pub async fn unwatch(&self, id: &str) -> bool {
        let mut loops = self.loops.write().await;
        match loops.remove(id) {
            Some(slot) => {
                let running = !slot.handle.is_finished();
                let _ = slot.stop_tx.send(true);
                slot.handle.abort();
                if running {
                    info!(server_id = %id, "watch loop stopped");
                }
                running
            }
            None => false,
        }
    }

    /// Reconcile loops with the registry: start loops for enabled servers,
    /// cancel loops for removed or disabled ones. Returns the number started.
    pub async fn sync(&self) -> usize {
        let snapshot = self.registry.all().await;

        let stale: Vec<ServerId> = {
            let loops = self.loops.read().await;
            loops
                .iter()
                .filter(|(id, slot)| {
                    slot.handle.is_finished()
                        || !snapshot.iter().any(|r| r.id() == id.as_str() && r.spec.enabled)
                })
                .map(|(id, _)| id.clone())
                .collect()
        };
        for id in &stale {
            self.unwatch(id).await;
        }

        let mut started = 0;
        for record in &snapshot {
            if !record.spec.enabled {
                continue;
            }
            match self.watch(record.id()).await {
                Ok(true) => started += 1,
                Ok(false) => {}
                // Removed between snapshot and watch.
                Err(e) => debug!(server_id = %record.id(), error = %e, "skipping server"),
            }
        }
        started
    }

    /// Start every enabled loop and keep them running until shutdown.
    pub async fn run(&self) {
        let started = self.sync().await;
        info!(started, "watch scheduler running");

        let mut shutdown = self.shutdown.clone();
        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }
        self.stop_all().await;
    }

    /// Stop all loops (for graceful shutdown).
    pub async fn stop_all(&self) {
        let mut loops = self.loops.write().await;
        for (id, slot) in loops.drain() {
            let _ = slot.stop_tx.send(true);
            slot.handle.abort();
            debug!(server_id = %id, "watch loop stopped");
        }
        info!("all watch loops stopped");
    }

    /// Ids of servers with a live loop, sorted.
    pub async fn active(&self) -> Vec<ServerId> {
        let loops = self.loops.read().await;
        let mut ids: Vec<ServerId> = loops
            .iter()
            .filter(|(_, slot)| !slot.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub async fn is_watching(&self, id: &str) -> bool {
        let loops = self.loops.read().await;
        loops.get(id).is_some_and(|slot| !slot.handle.is_finished())
    }
}

/// The watch loop for a single server.
async fn run_watch_loop(mut ctx: LoopContext) {
    debug!(server_id = %ctx.id, "watch loop starting");

    loop {
        if *ctx.shutdown.borrow() || *ctx.stop.borrow() {
            break;
        }

        // Re-read every tick so spec edits and disables apply from the next tick.
        let interval = match ctx.registry.get(&ctx.id).await {
            Ok(record) if record.spec.enabled => record.spec.policy.scan_interval,
            Ok(_) => {
                debug!(server_id = %ctx.id, "server disabled, watch loop exiting");
                break;
            }
            Err(_) => {
                debug!(server_id = %ctx.id, "server removed, watch loop exiting");
                break;
            }
        };

        let due = tokio::select! {
            _ = tokio::time::sleep(interval) => true,
            _ = ctx.stop.changed() => false,
            _ = ctx.shutdown.changed() => false,
        };

        if !due || !tick(&ctx).await {
            break;
        }
    }

    debug!(server_id = %ctx.id, "watch loop finished");
}

/// One probe → decide → act cycle. Returns `false` when the loop should exit.
async fn tick(ctx: &LoopContext) -> bool {
    let record = match ctx.registry.get(&ctx.id).await {
        Ok(record) if record.spec.enabled => record,
        _ => return false,
    };

    let outcome = match tokio::time::timeout(ctx.call_timeout, ctx.probe.probe(&ctx.id)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            debug!(server_id = %ctx.id, "status probe timed out");
            ProbeOutcome::ProbeError
        }
    };

    if *ctx.shutdown.borrow() || *ctx.stop.borrow() {
        return false;
    }

    let policy = record.spec.policy;
    let prev = record.runtime;
    let decision = machine::step(prev, &policy, outcome, Instant::now());
    let next = decision.state;

    let mut observed = record.observed.clone();
    observed.last_probe = Some(outcome);
    observed.last_probe_at = Some(epoch_secs());
    if decision.is_recovery() {
        observed.last_recovery_at = observed.last_probe_at;
        observed.last_action_error = None;
    }

    match ctx
        .registry
        .apply(&ctx.id, record.revision, next, observed)
        .await
    {
        Ok(()) => {}
        Err(StateError::Stale(_)) => {
            debug!(server_id = %ctx.id, "runtime state was reset mid-probe, decision discarded");
            return true;
        }
        Err(_) => return false,
    }

    log_transition(&ctx.id, &prev, &next, &policy, outcome);

    if decision.is_recovery() {
        info!(
            server_id = %ctx.id,
            attempt = next.restarts_used,
            max_restarts = policy.max_restarts,
            "server down, issuing kill and start"
        );
        // The pair runs in its own task so cancelling this loop never
        // separates the kill from the start.
        let pair = tokio::spawn(execute_commands(
            ctx.id.clone(),
            decision.commands,
            Arc::clone(&ctx.actuator),
            ctx.registry.clone(),
            ctx.shutdown.clone(),
            ctx.call_timeout,
        ));
        if let Err(e) = pair.await {
            error!(server_id = %ctx.id, error = %e, "recovery task failed");
        }
    }

    true
}

fn log_transition(
    id: &str,
    prev: &RuntimeState,
    next: &RuntimeState,
    policy: &pterowatch_core::Policy,
    outcome: ProbeOutcome,
) {
    match (prev.phase, next.phase) {
        (Phase::LockedOut, _) => {}
        (_, Phase::LockedOut) => warn!(
            server_id = %id,
            restarts_used = next.restarts_used,
            "restart budget exhausted, server locked out until reset"
        ),
        (Phase::Recovering, Phase::Healthy) => info!(server_id = %id, "server running again"),
        _ if !outcome.is_running() && next.consecutive_failures > prev.consecutive_failures => debug!(
            server_id = %id,
            ?outcome,
            failures = next.consecutive_failures,
            threshold = policy.max_failures,
            "status probe failed"
        ),
        _ if !outcome.is_running() && next.consecutive_failures == policy.max_failures => debug!(
            server_id = %id,
            ?outcome,
            "recovery suppressed during cooldown"
        ),
        _ => {}
    }
}

/// Issue `commands` in order. Failures are logged and recorded, never retried.
async fn execute_commands(
    id: ServerId,
    commands: Vec<Command>,
    actuator: Arc<dyn RecoveryActuator>,
    registry: Registry,
    shutdown: watch::Receiver<bool>,
    call_timeout: Duration,
) {
    for command in commands {
        if *shutdown.borrow() {
            info!(server_id = %id, %command, "shutdown signalled, command not issued");
            return;
        }

        let call = async {
            match command {
                Command::Stop => actuator.issue_stop(&id).await,
                Command::Start => actuator.issue_start(&id).await,
            }
        };
        let failure = match tokio::time::timeout(call_timeout, call).await {
            Ok(Ok(())) => {
                debug!(server_id = %id, %command, "power signal sent");
                None
            }
            Ok(Err(e)) => Some(format!("{command} request failed: {e}")),
            Err(_) => Some(format!("{command} request timed out")),
        };

        if let Some(message) = failure {
            warn!(server_id = %id, %command, error = %message, "power signal failed");
            if let Err(e) = registry.record_action_error(&id, message).await {
                debug!(server_id = %id, error = %e, "could not record power failure");
            }
        }
    }
}
