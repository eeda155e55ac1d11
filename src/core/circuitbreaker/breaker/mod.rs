//! Breaker strategies and the state machine they share.
//!
//! ```text
//! Closed --(rule breached)--> Open --(retry timeout, first caller)--> HalfOpen
//! HalfOpen --(probe ok)--> Closed
//! HalfOpen --(probe breached or blocked)--> Open
//! ```

#![allow(clippy::wrong_self_convention)]

pub mod average_rt;
pub mod error_count;
pub mod error_ratio;
pub mod slow_request;
pub mod stat;

pub use average_rt::*;
pub use error_count::*;
pub use error_ratio::*;
pub use slow_request::*;
pub use stat::*;

use super::*;
use crate::{
    base::{EntryContext, Snapshot},
    utils, Error, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex,
};

/// What a breaker watches. `Custom` kinds are built by generators registered at runtime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum BreakerStrategy {
    /// share of calls slower than `max_allowed_rt_ms`
    SlowRequestRatio,
    /// mean round trip time of the completed calls
    AverageRt,
    /// share of calls that reported an error
    ErrorRatio,
    /// number of calls that reported an error
    ErrorCount,
    #[serde(skip)]
    Custom(u8),
}

impl Default for BreakerStrategy {
    fn default() -> BreakerStrategy {
        BreakerStrategy::SlowRequestRatio
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum State {
    Closed,
    HalfOpen,
    Open,
}

impl Default for State {
    fn default() -> State {
        State::Closed
    }
}

/// Observer of breaker transitions, called with the state left behind.
pub trait StateChangeListener: Sync + Send {
    fn on_transform_to_closed(&self, prev: State, rule: Arc<Rule>);

    /// `snapshot` holds the value that tripped the breaker.
    fn on_transform_to_open(&self, prev: State, rule: Arc<Rule>, snapshot: Option<Arc<Snapshot>>);

    fn on_transform_to_half_open(&self, prev: State, rule: Arc<Rule>);
}

/// A breaker strategy. Implementors own a window statistic and feed it in
/// `on_request_complete`; the state machine lives in the shared `BreakerBase`.
pub trait CircuitBreakerTrait: Send + Sync {
    fn breaker(&self) -> &Arc<BreakerBase>;

    fn stat(&self) -> &Arc<CounterLeapArray>;

    /// Closed passes and HalfOpen blocks. Open blocks until the retry timestamp,
    /// after which the first caller becomes the probe.
    fn try_pass(&self, ctx: &mut EntryContext) -> bool {
        let base = self.breaker();
        match self.current_state() {
            State::Closed => true,
            State::Open => base.retry_timeout_arrived() && base.from_open_to_half_open(ctx),
            State::HalfOpen => false,
        }
    }

    #[inline]
    fn next_retry_timestamp_ms(&self) -> u64 {
        self.breaker()
            .next_retry_timestamp_ms
            .load(Ordering::SeqCst)
    }

    #[inline]
    fn bound_rule(&self) -> &Arc<Rule> {
        self.breaker().bound_rule()
    }

    #[inline]
    fn set_state(&self, state: State) {
        self.breaker().set_state(state);
    }

    #[inline]
    fn current_state(&self) -> State {
        self.breaker().current_state()
    }

    /// Records a passed call that finished after `rt` ms and opens a closed breaker
    /// whose condition is breached. A half-open breaker is settled only when `trial` is
    /// set, i.e. by the single call it let through.
    fn on_request_complete(&self, rt: u64, error: &Option<Error>, trial: bool);

    fn reset_metric(&self) {
        self.stat().reset()
    }
}

/// The state shared by every breaker strategy: the bound rule, the state machine and the
/// next time an open breaker may let a probe through.
///
/// Held behind an `Arc` so the exit handler of a probe can reopen the breaker.
#[derive(Debug)]
pub struct BreakerBase {
    rule: Arc<Rule>,
    retry_timeout_ms: u32,
    next_retry_timestamp_ms: AtomicU64,
    state: Mutex<State>,
    /// id of the `EntryContext` let through by the last Open to HalfOpen move
    trial_entry: AtomicU64,
}

impl BreakerBase {
    pub fn new(rule: Arc<Rule>) -> Self {
        BreakerBase {
            retry_timeout_ms: rule.retry_timeout_ms,
            rule,
            next_retry_timestamp_ms: AtomicU64::new(0),
            state: Mutex::new(State::default()),
            trial_entry: AtomicU64::new(0),
        }
    }

    pub fn bound_rule(&self) -> &Arc<Rule> {
        &self.rule
    }

    pub fn set_state(&self, state: State) {
        *self.state.lock().unwrap() = state;
    }

    pub fn current_state(&self) -> State {
        *self.state.lock().unwrap()
    }

    pub fn retry_timeout_arrived(&self) -> bool {
        utils::curr_time_millis() >= self.next_retry_timestamp_ms.load(Ordering::SeqCst)
    }

    pub fn update_next_retry_timestamp(&self) {
        let next = utils::curr_time_millis() + self.retry_timeout_ms as u64;
        self.next_retry_timestamp_ms.store(next, Ordering::SeqCst);
    }

    /// Moves the state from `from` to `to` and then notifies the listeners,
    /// outside of the lock. Only the caller that performed the move gets `true`.
    fn transit(&self, from: State, to: State, snapshot: Option<Arc<Snapshot>>) -> bool {
        {
            let mut state = self.state.lock().unwrap();
            if *state != from {
                return false;
            }
            *state = to;
            if to == State::Open {
                self.update_next_retry_timestamp();
            }
        }
        let listeners: Vec<_> = state_change_listeners().iter().cloned().collect();
        for listener in listeners.iter() {
            let rule = Arc::clone(&self.rule);
            match to {
                State::Open => listener.on_transform_to_open(from, rule, snapshot.clone()),
                State::HalfOpen => listener.on_transform_to_half_open(from, rule),
                State::Closed => listener.on_transform_to_closed(from, rule),
            }
        }
        true
    }

    /// Whether the entry of `ctx` is the call a half-open breaker is waiting on.
    pub fn is_trial(&self, ctx: &EntryContext) -> bool {
        ctx.id() != 0
            && self.trial_entry.load(Ordering::SeqCst) == ctx.id()
            && self.current_state() == State::HalfOpen
    }

    pub fn from_closed_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.transit(State::Closed, State::Open, Some(snapshot))
    }

    /// On success the entry of `ctx` is the single probe. If a later slot blocks it,
    /// the breaker reopens and waits for another retry timeout.
    pub fn from_open_to_half_open(self: &Arc<Self>, ctx: &mut EntryContext) -> bool {
        if !self.transit(State::Open, State::HalfOpen, None) {
            return false;
        }
        self.trial_entry.store(ctx.id(), Ordering::SeqCst);
        let breaker = Arc::clone(self);
        ctx.when_exit(Box::new(move |ctx: &EntryContext| -> Result<()> {
            if ctx.is_blocked() && breaker.is_trial(ctx) {
                breaker.from_half_open_to_open(Arc::new(1.0));
            }
            Ok(())
        }));
        true
    }

    pub fn from_half_open_to_open(&self, snapshot: Arc<Snapshot>) -> bool {
        self.transit(State::HalfOpen, State::Open, Some(snapshot))
    }

    pub fn from_half_open_to_closed(&self) -> bool {
        self.transit(State::HalfOpen, State::Closed, None)
    }

    /// Settles the probe of a half-open breaker. A breached condition reopens it,
    /// otherwise it closes with a fresh statistic.
    pub(crate) fn on_probe_complete(
        &self,
        breached: bool,
        snapshot: Arc<Snapshot>,
        stat: &CounterLeapArray,
    ) {
        if breached {
            self.from_half_open_to_open(snapshot);
        } else if self.from_half_open_to_closed() {
            stat.reset();
        }
    }
}

/// a ratio trips the breaker once it exceeds the threshold,
/// a threshold of 1.0 trips when every request is counted
pub(crate) fn ratio_exceeded(ratio: f64, threshold: f64) -> bool {
    ratio > threshold
        || ((threshold - 1.0).abs() < f64::EPSILON && (ratio - 1.0).abs() < f64::EPSILON)
}
