//! Recovery state machine.
//!
//! [`step`] is a pure function from the current runtime state, the server's
//! policy, a probe outcome, and the current instant to the next runtime state
//! plus the power commands to issue. It performs no I/O and never logs, so
//! every transition can be tested directly.

use std::fmt;

use tokio::time::Instant;

use pterowatch_core::Policy;
use pterowatch_state::{Phase, ProbeOutcome, RuntimeState};

/// A power command for the recovery actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Forced stop (`kill` signal).
    Stop,
    Start,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stop => write!(f, "stop"),
            Command::Start => write!(f, "start"),
        }
    }
}

/// Result of one decision step. An empty command list means "do nothing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub state: RuntimeState,
    pub commands: Vec<Command>,
}

impl Decision {
    fn idle(state: RuntimeState) -> Self {
        Self {
            state,
            commands: Vec::new(),
        }
    }

    fn recover(state: RuntimeState) -> Self {
        Self {
            state,
            commands: vec![Command::Stop, Command::Start],
        }
    }

    /// Whether this step triggered a recovery attempt.
    pub fn is_recovery(&self) -> bool {
        !self.commands.is_empty()
    }
}

/// Whether the cooldown after the last recovery attempt is still running.
pub fn in_cooldown(state: &RuntimeState, policy: &Policy, now: Instant) -> bool {
    state
        .last_recovery_at
        .is_some_and(|at| now.saturating_duration_since(at) < policy.restart_cooldown)
}

/// Advance the state machine by one probe outcome.
pub fn step(state: RuntimeState, policy: &Policy, outcome: ProbeOutcome, now: Instant) -> Decision {
    let mut next = state;

    if next.phase == Phase::LockedOut {
        return Decision::idle(next);
    }

    if outcome.is_running() {
        next.consecutive_failures = 0;
        next.phase = Phase::Healthy;
        return Decision::idle(next);
    }

    // Saturate at the threshold: during a cooldown failures keep being
    // observed but the counter never passes `max_failures`.
    next.consecutive_failures = next
        .consecutive_failures
        .saturating_add(1)
        .min(policy.max_failures);

    if next.consecutive_failures < policy.max_failures {
        return Decision::idle(next);
    }

    if in_cooldown(&next, policy, now) {
        return Decision::idle(next);
    }

    if next.restarts_used >= policy.max_restarts {
        next.phase = Phase::LockedOut;
        return Decision::idle(next);
    }

    next.consecutive_failures = 0;
    next.restarts_used += 1;
    next.last_recovery_at = Some(now);
    next.phase = Phase::Recovering;
    Decision::recover(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn policy(max_failures: u32, max_restarts: u32, cooldown_secs: u64) -> Policy {
        Policy {
            scan_interval: Duration::from_secs(5),
            max_failures,
            max_restarts,
            restart_cooldown: Duration::from_secs(cooldown_secs),
        }
    }

    /// Feed `outcomes` one per `spacing`, returning every decision.
    fn run(
        policy: &Policy,
        start: Instant,
        spacing: Duration,
        outcomes: &[ProbeOutcome],
    ) -> Vec<(Instant, Decision)> {
        let mut state = RuntimeState::default();
        let mut out = Vec::new();
        for (i, outcome) in outcomes.iter().enumerate() {
            let now = start + spacing * (i as u32 + 1);
            let decision = step(state, policy, *outcome, now);
            state = decision.state;
            out.push((now, decision));
        }
        out
    }

    use ProbeOutcome::{NotRunning as Down, ProbeError as Fail, Running as Up};

    #[test]
    fn three_failures_trigger_one_recovery() {
        let policy = policy(3, 2, 60);
        let now = Instant::now();
        let mut state = RuntimeState::default();

        for _ in 0..2 {
            let d = step(state, &policy, Down, now);
            assert!(d.commands.is_empty());
            state = d.state;
        }
        assert_eq!(state.consecutive_failures, 2);

        let d = step(state, &policy, Down, now);
        assert_eq!(d.commands, vec![Command::Stop, Command::Start]);
        assert_eq!(d.state.restarts_used, 1);
        assert_eq!(d.state.consecutive_failures, 0);
        assert_eq!(d.state.phase, Phase::Recovering);
        assert_eq!(d.state.last_recovery_at, Some(now));
    }

    #[test]
    fn probe_error_counts_like_not_running() {
        let policy = policy(2, 1, 0);
        let now = Instant::now();
        let d = step(RuntimeState::default(), &policy, Fail, now);
        let d = step(d.state, &policy, Down, now);
        assert!(d.is_recovery());
    }

    #[test]
    fn success_is_idempotent_while_healthy() {
        let policy = policy(3, 2, 60);
        let decisions = run(&policy, Instant::now(), Duration::from_secs(5), &[Up; 10]);
        for (_, d) in decisions {
            assert!(d.commands.is_empty());
            assert_eq!(d.state, RuntimeState::default());
        }
    }

    #[test]
    fn success_resets_partial_failure_count() {
        let policy = policy(3, 2, 60);
        let decisions = run(&policy, Instant::now(), Duration::from_secs(5), &[Down, Down, Up]);
        let (_, last) = decisions.last().unwrap();
        assert_eq!(last.state.consecutive_failures, 0);
        assert_eq!(last.state.phase, Phase::Healthy);
        assert_eq!(last.state.restarts_used, 0);
        assert!(decisions.iter().all(|(_, d)| d.commands.is_empty()));
    }

    #[test]
    fn success_after_recovery_returns_to_healthy() {
        let policy = policy(1, 2, 60);
        let decisions = run(&policy, Instant::now(), Duration::from_secs(5), &[Down, Up]);
        assert_eq!(decisions[0].1.state.phase, Phase::Recovering);
        assert_eq!(decisions[1].1.state.phase, Phase::Healthy);
        assert_eq!(decisions[1].1.state.restarts_used, 1);
    }

    #[test]
    fn budget_exhaustion_locks_out_without_commands() {
        // Cooldown of zero so every streak is eligible.
        let policy = policy(2, 2, 0);
        let decisions = run(&policy, Instant::now(), Duration::from_secs(5), &[Down; 6]);

        let recoveries = decisions.iter().filter(|(_, d)| d.is_recovery()).count();
        assert_eq!(recoveries, 2);

        let (_, last) = decisions.last().unwrap();
        assert_eq!(last.state.phase, Phase::LockedOut);
        assert_eq!(last.state.restarts_used, 2);
        assert!(last.commands.is_empty());
    }

    #[test]
    fn locked_out_is_terminal() {
        let policy = policy(1, 0, 0);
        let now = Instant::now();
        let locked = step(RuntimeState::default(), &policy, Down, now).state;
        assert_eq!(locked.phase, Phase::LockedOut);

        for outcome in [Up, Down, Fail, Up] {
            let d = step(locked, &policy, outcome, now + Duration::from_secs(600));
            assert_eq!(d.state, locked);
            assert!(d.commands.is_empty());
        }
    }

    #[test]
    fn zero_restart_budget_locks_out_at_first_threshold() {
        let policy = policy(3, 0, 60);
        let decisions = run(&policy, Instant::now(), Duration::from_secs(5), &[Down; 3]);
        assert!(decisions.iter().all(|(_, d)| d.commands.is_empty()));
        assert_eq!(decisions[2].1.state.phase, Phase::LockedOut);
    }

    #[test]
    fn cooldown_suppresses_action_but_not_counting() {
        let policy = policy(2, 5, 30);
        let start = Instant::now();
        let mut state = RuntimeState::default();

        state = step(state, &policy, Down, start).state;
        let d = step(state, &policy, Down, start);
        assert!(d.is_recovery());
        state = d.state;

        // Inside the cooldown: counted, saturated, never acted on.
        for secs in [5, 10, 15, 20, 25] {
            let d = step(state, &policy, Down, start + Duration::from_secs(secs));
            assert!(d.commands.is_empty(), "recovered during cooldown at {secs}s");
            assert!(d.state.consecutive_failures <= policy.max_failures);
            assert_eq!(d.state.phase, Phase::Recovering);
            state = d.state;
        }
        assert_eq!(state.consecutive_failures, 2);
        assert_eq!(state.restarts_used, 1);

        // Cooldown over: the next failure at the threshold fires.
        let d = step(state, &policy, Down, start + Duration::from_secs(30));
        assert!(d.is_recovery());
        assert_eq!(d.state.restarts_used, 2);
    }

    #[test]
    fn cooldown_also_applies_after_returning_to_healthy() {
        let policy = policy(1, 5, 30);
        let start = Instant::now();
        let d = step(RuntimeState::default(), &policy, Down, start);
        assert!(d.is_recovery());

        let healthy = step(d.state, &policy, Up, start + Duration::from_secs(5)).state;
        assert_eq!(healthy.phase, Phase::Healthy);

        let d = step(healthy, &policy, Down, start + Duration::from_secs(10));
        assert!(d.commands.is_empty());
        assert_eq!(d.state.consecutive_failures, 1);
    }

    #[test]
    fn invariants_hold_over_mixed_sequence() {
        let policy = policy(3, 3, 20);
        let pattern = [
            Down, Down, Fail, Down, Down, Up, Down, Fail, Down, Down, Down, Down, Down, Up, Up,
            Down, Down, Down, Down, Down, Down, Down, Down, Down, Down, Down, Down, Down,
        ];
        let decisions = run(&policy, Instant::now(), Duration::from_secs(4), &pattern);

        let mut prev_restarts = 0;
        let mut last_recovery: Option<Instant> = None;
        for (now, d) in &decisions {
            assert!(d.state.consecutive_failures <= policy.max_failures);
            assert!(d.state.restarts_used <= policy.max_restarts);
            assert!(d.state.restarts_used >= prev_restarts);
            prev_restarts = d.state.restarts_used;

            if d.is_recovery() {
                assert_eq!(d.commands, vec![Command::Stop, Command::Start]);
                if let Some(prev) = last_recovery {
                    assert!(now.duration_since(prev) >= policy.restart_cooldown);
                }
                last_recovery = Some(*now);
            }
        }
        assert_eq!(decisions.last().unwrap().1.state.phase, Phase::LockedOut);
    }

    #[test]
    fn command_display() {
        assert_eq!(Command::Stop.to_string(), "stop");
        assert_eq!(Command::Start.to_string(), "start");
    }
}
