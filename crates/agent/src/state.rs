//! The bot activity state machine.
//!
//! Enforces the legal-transition table from core, runs enter/exit
//! callbacks with revert-on-failure, and keeps a bounded transition
//! history. The machine doubles as an advisory mutex over the game
//! client: handlers that change what the bot is doing only run while
//! the machine is in the matching state.

use chrono::Utc;
use clawcraft_core::error::StateError;
use clawcraft_core::state::{BotState, StateTransition};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;
use tracing::{debug, warn};

const HISTORY_CAPACITY: usize = 100;

/// A callback run when entering or leaving a state. A failure message
/// aborts (and reverts) the transition.
pub type StateCallback = Box<dyn Fn(BotState) -> Result<(), String> + Send + Sync>;

/// Legal-transition state machine with callbacks and bounded history.
pub struct StateMachine {
    current: BotState,
    entered_at: Instant,
    history: VecDeque<StateTransition>,
    destination_counts: HashMap<BotState, u64>,
    on_enter: HashMap<BotState, StateCallback>,
    on_exit: HashMap<BotState, StateCallback>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: BotState::Idle,
            entered_at: Instant::now(),
            history: VecDeque::new(),
            destination_counts: HashMap::new(),
            on_enter: HashMap::new(),
            on_exit: HashMap::new(),
        }
    }

    pub fn current(&self) -> BotState {
        self.current
    }

    pub fn is_idle(&self) -> bool {
        self.current == BotState::Idle
    }

    /// Busy means actively doing something: anything but idle/planning.
    pub fn is_busy(&self) -> bool {
        !matches!(self.current, BotState::Idle | BotState::Planning)
    }

    pub fn is_error(&self) -> bool {
        self.current == BotState::Error
    }

    pub fn time_in_current_state(&self) -> std::time::Duration {
        self.entered_at.elapsed()
    }

    /// Register a callback run when entering `state`.
    pub fn on_enter(&mut self, state: BotState, callback: StateCallback) {
        self.on_enter.insert(state, callback);
    }

    /// Register a callback run when leaving `state`.
    pub fn on_exit(&mut self, state: BotState, callback: StateCallback) {
        self.on_exit.insert(state, callback);
    }

    /// Attempt a transition. No-op success when already in `to`;
    /// rejects illegal destinations; reverts if a callback fails.
    pub fn transition(
        &mut self,
        to: BotState,
        reason: Option<&str>,
    ) -> Result<(), StateError> {
        if to == self.current {
            return Ok(());
        }

        if !self.current.can_transition_to(to) {
            warn!(from = %self.current, to = %to, "Illegal transition rejected");
            return Err(StateError::IllegalTransition {
                from: self.current.to_string(),
                to: to.to_string(),
            });
        }

        self.apply(to, reason)
    }

    /// The error transition is always accepted.
    pub fn transition_to_error(&mut self, reason: &str) {
        if self.current == BotState::Error {
            return;
        }
        // Error entry never reverts: a failing callback must not keep
        // the machine out of the error state.
        let from = self.current;
        let _ = self.run_callback(&self.on_exit, from);
        self.current = BotState::Error;
        self.entered_at = Instant::now();
        self.record(from, BotState::Error, Some(reason));
        let _ = self.run_callback(&self.on_enter, BotState::Error);
        warn!(from = %from, reason, "Entered error state");
    }

    /// Convenience transition back to idle.
    pub fn return_to_idle(&mut self) -> Result<(), StateError> {
        self.transition(BotState::Idle, Some("return to idle"))
    }

    /// Force idle and clear all history.
    pub fn reset(&mut self) {
        self.current = BotState::Idle;
        self.entered_at = Instant::now();
        self.history.clear();
        self.destination_counts.clear();
        debug!("State machine reset");
    }

    /// The recorded transitions, oldest first.
    pub fn history(&self) -> Vec<StateTransition> {
        self.history.iter().cloned().collect()
    }

    /// How often each destination state has been entered.
    pub fn statistics(&self) -> HashMap<BotState, u64> {
        self.destination_counts.clone()
    }

    fn apply(&mut self, to: BotState, reason: Option<&str>) -> Result<(), StateError> {
        let from = self.current;

        if let Err(message) = self.run_callback(&self.on_exit, from) {
            warn!(state = %from, error = %message, "Exit callback failed, transition aborted");
            return Err(StateError::CallbackFailed {
                state: from.to_string(),
                reason: message,
            });
        }

        self.current = to;
        self.entered_at = Instant::now();
        self.record(from, to, reason);

        if let Err(message) = self.run_callback(&self.on_enter, to) {
            warn!(state = %to, error = %message, "Enter callback failed, reverting to {from}");
            self.current = from;
            self.entered_at = Instant::now();
            self.history.pop_back();
            if let Some(count) = self.destination_counts.get_mut(&to) {
                *count = count.saturating_sub(1);
            }
            return Err(StateError::CallbackFailed {
                state: to.to_string(),
                reason: message,
            });
        }

        debug!(from = %from, to = %to, reason = reason.unwrap_or(""), "State transition");
        Ok(())
    }

    fn record(&mut self, from: BotState, to: BotState, reason: Option<&str>) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(StateTransition {
            from,
            to,
            timestamp: Utc::now(),
            reason: reason.map(String::from),
        });
        *self.destination_counts.entry(to).or_insert(0) += 1;
    }

    fn run_callback(
        &self,
        callbacks: &HashMap<BotState, StateCallback>,
        state: BotState,
    ) -> Result<(), String> {
        match callbacks.get(&state) {
            Some(callback) => callback(state),
            None => Ok(()),
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn legal_transition_chain() {
        let mut machine = StateMachine::new();
        assert!(machine.transition(BotState::Planning, Some("plan")).is_ok());
        assert_eq!(machine.current(), BotState::Planning);

        assert!(machine.transition(BotState::Mining, None).is_ok());
        assert_eq!(machine.current(), BotState::Mining);

        // Mining cannot jump straight to crafting.
        assert!(machine.transition(BotState::Crafting, None).is_err());
        assert_eq!(machine.current(), BotState::Mining);

        assert!(machine.return_to_idle().is_ok());
        assert_eq!(machine.current(), BotState::Idle);
        assert_eq!(machine.history().len(), 3);
    }

    #[test]
    fn same_state_is_noop_success() {
        let mut machine = StateMachine::new();
        assert!(machine.transition(BotState::Idle, None).is_ok());
        assert!(machine.history().is_empty());
    }

    #[test]
    fn history_records_reason_and_matches_current() {
        let mut machine = StateMachine::new();
        machine.transition(BotState::Planning, Some("cycle 1")).unwrap();
        machine.transition(BotState::Navigating, None).unwrap();

        let history = machine.history();
        assert_eq!(history[0].reason.as_deref(), Some("cycle 1"));
        assert_eq!(history.last().unwrap().to, machine.current());
    }

    #[test]
    fn history_is_bounded() {
        let mut machine = StateMachine::new();
        for _ in 0..120 {
            machine.transition(BotState::Planning, None).unwrap();
            machine.transition(BotState::Idle, None).unwrap();
        }
        assert_eq!(machine.history().len(), HISTORY_CAPACITY);
        assert_eq!(machine.history().last().unwrap().to, machine.current());
    }

    #[test]
    fn error_always_reachable_and_sticky() {
        let mut machine = StateMachine::new();
        machine.transition(BotState::Planning, None).unwrap();
        machine.transition(BotState::Mining, None).unwrap();
        machine.transition_to_error("client disconnected");
        assert!(machine.is_error());

        // Only reset destinations are allowed out of error.
        assert!(machine.transition(BotState::Mining, None).is_err());
        assert!(machine.transition(BotState::Planning, None).is_ok());
    }

    #[test]
    fn enter_callback_failure_reverts() {
        let mut machine = StateMachine::new();
        machine.on_enter(
            BotState::Planning,
            Box::new(|_| Err("planner offline".into())),
        );

        let err = machine.transition(BotState::Planning, None).unwrap_err();
        assert!(matches!(err, StateError::CallbackFailed { .. }));
        assert_eq!(machine.current(), BotState::Idle);
        assert!(machine.history().is_empty());
        assert_eq!(machine.statistics().get(&BotState::Planning), None);
    }

    #[test]
    fn exit_callback_failure_blocks() {
        let mut machine = StateMachine::new();
        machine.transition(BotState::Planning, None).unwrap();
        machine.on_exit(
            BotState::Planning,
            Box::new(|_| Err("still planning".into())),
        );

        assert!(machine.transition(BotState::Idle, None).is_err());
        assert_eq!(machine.current(), BotState::Planning);
    }

    #[test]
    fn callbacks_fire_in_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let mut machine = StateMachine::new();

        let exit_order = order.clone();
        machine.on_exit(
            BotState::Idle,
            Box::new(move |_| {
                exit_order.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let enter_order = order.clone();
        machine.on_enter(
            BotState::Planning,
            Box::new(move |_| {
                // Exit must have run first.
                assert_eq!(enter_order.load(Ordering::SeqCst), 1);
                enter_order.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );

        machine.transition(BotState::Planning, None).unwrap();
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut machine = StateMachine::new();
        machine.transition(BotState::Planning, None).unwrap();
        machine.transition_to_error("boom");

        machine.reset();
        assert!(machine.is_idle());
        assert!(machine.history().is_empty());

        machine.reset();
        assert!(machine.is_idle());
        assert!(machine.history().is_empty());
    }

    #[test]
    fn statistics_count_destinations() {
        let mut machine = StateMachine::new();
        machine.transition(BotState::Planning, None).unwrap();
        machine.transition(BotState::Idle, None).unwrap();
        machine.transition(BotState::Planning, None).unwrap();

        let stats = machine.statistics();
        assert_eq!(stats.get(&BotState::Planning), Some(&2));
        assert_eq!(stats.get(&BotState::Idle), Some(&1));
    }

    #[test]
    fn busy_excludes_idle_and_planning() {
        let mut machine = StateMachine::new();
        assert!(!machine.is_busy());
        machine.transition(BotState::Planning, None).unwrap();
        assert!(!machine.is_busy());
        machine.transition(BotState::Mining, None).unwrap();
        assert!(machine.is_busy());
    }
}
