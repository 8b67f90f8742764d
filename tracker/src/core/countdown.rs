//! Check-in countdown state.
//!
//! While running, the countdown loses `elapsed` on every tick. When it reaches
//! zero a period is complete: `remaining` resets to the full period and
//! `elapsed_periods` increments.

use std::sync::Arc;

use crate::core::duration::IsoDuration;
use crate::core::store::Reducer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownState {
    pub is_running: bool,
    pub period: IsoDuration,
    pub remaining: IsoDuration,
    pub elapsed_periods: u32,
}

impl CountdownState {
    pub fn idle(period: IsoDuration) -> Self {
        Self {
            is_running: false,
            period,
            remaining: period,
            elapsed_periods: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownAction {
    /// No-op; produces the default state on an empty store.
    Init,
    Start { period: IsoDuration },
    Stop,
    Tick { elapsed: IsoDuration },
}

/// Reducer for [`CountdownState`].
#[derive(Debug, Clone, Copy)]
pub struct CountdownReducer {
    default_period: IsoDuration,
}

impl CountdownReducer {
    pub fn new(default_period: IsoDuration) -> Self {
        Self { default_period }
    }
}

impl Reducer for CountdownReducer {
    type State = CountdownState;
    type Action = CountdownAction;

    fn init_action(&self) -> CountdownAction {
        CountdownAction::Init
    }

    fn reduce(
        &self,
        state: Option<&Arc<CountdownState>>,
        action: &CountdownAction,
    ) -> Arc<CountdownState> {
        let state = match state {
            Some(state) => Arc::clone(state),
            None => Arc::new(CountdownState::idle(self.default_period)),
        };

        match *action {
            CountdownAction::Init => state,
            CountdownAction::Start { period } => {
                if state.is_running && state.period == period {
                    return state;
                }
                Arc::new(CountdownState {
                    is_running: true,
                    period,
                    remaining: period,
                    elapsed_periods: state.elapsed_periods,
                })
            }
            CountdownAction::Stop => {
                if !state.is_running {
                    return state;
                }
                Arc::new(CountdownState {
                    is_running: false,
                    ..(*state).clone()
                })
            }
            CountdownAction::Tick { elapsed } => {
                if !state.is_running || elapsed.is_zero() {
                    return state;
                }
                let remaining = state.remaining.saturating_sub(elapsed);
                if remaining.is_zero() {
                    Arc::new(CountdownState {
                        remaining: state.period,
                        elapsed_periods: state.elapsed_periods.saturating_add(1),
                        ..(*state).clone()
                    })
                } else {
                    Arc::new(CountdownState {
                        remaining,
                        ..(*state).clone()
                    })
                }
            }
        }
    }
}
