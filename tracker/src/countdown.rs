//! Periodic check-in countdown.
//!
//! Wires the countdown reducer to a [`Store`], drives it with an
//! [`IntervalTimer`], and emits [`PERIOD_ELAPSED_EVENT`] each time a full
//! period has passed.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::core::countdown::{CountdownAction, CountdownReducer, CountdownState};
use crate::core::duration::IsoDuration;
use crate::core::events::{Emitter, EventBus, EventRecorder};
use crate::core::store::{Store, Unsubscribe};
use crate::core::sync::lock;
use crate::io::clock::Clock;
use crate::io::config::CountdownConfig;
use crate::io::timer::{Cancellation, IntervalTimer, MIN_PERIOD};

/// Emitted once per completed period.
pub const PERIOD_ELAPSED_EVENT: &str = "period-elapsed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodElapsed {
    pub at: DateTime<Utc>,
    pub period: IsoDuration,
    /// Completed periods since the service was created.
    pub count: u32,
}

type CountdownStore = Store<CountdownReducer>;

pub struct CountdownService {
    store: Arc<CountdownStore>,
    timer: IntervalTimer,
    events: EventBus<PeriodElapsed>,
    ticking: Mutex<Option<Cancellation>>,
    watcher: Unsubscribe,
}

impl CountdownService {
    pub fn new(timer: IntervalTimer, clock: Clock, default_period: IsoDuration) -> Self {
        let store = Arc::new(Store::new(CountdownReducer::new(default_period), None));
        let events = EventBus::new();
        let watcher = watch_elapsed(&store, clock, events.clone());
        Self {
            store,
            timer,
            events,
            ticking: Mutex::new(None),
            watcher,
        }
    }

    /// Real timer and system clock. Must be called inside a tokio runtime.
    pub fn create(config: &CountdownConfig) -> Result<Self> {
        Ok(Self::new(
            IntervalTimer::create()?,
            Clock::create(),
            config.period,
        ))
    }

    /// Stepped timer and frozen clock.
    pub fn create_null(default_period: IsoDuration, now: Option<DateTime<Utc>>) -> Self {
        Self::new(
            IntervalTimer::create_null(),
            Clock::create_null(now),
            default_period,
        )
    }

    /// Start (or restart) counting down `period`, ticking every `tick`.
    ///
    /// `tick` is rounded up to whole milliseconds, at least one.
    pub fn start(&self, period: IsoDuration, tick: Duration) {
        let tick = whole_millis(tick);
        self.cancel_ticking();
        self.store.dispatch(CountdownAction::Start { period });

        let store = Arc::clone(&self.store);
        let elapsed = IsoDuration::from(tick);
        let cancellation = self.timer.schedule(
            move || store.dispatch(CountdownAction::Tick { elapsed }),
            tick,
        );
        *lock(&self.ticking) = Some(cancellation);
        info!(%period, ?tick, "countdown started");
    }

    /// Stop ticking; the remaining time is kept.
    pub fn stop(&self) {
        self.cancel_ticking();
        self.store.dispatch(CountdownAction::Stop);
        info!("countdown stopped");
    }

    pub fn state(&self) -> Arc<CountdownState> {
        self.store.get_state()
    }

    /// Listen for state changes (every effective tick, start, and stop).
    pub fn subscribe<F>(&self, listener: F) -> Unsubscribe
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn timer(&self) -> &IntervalTimer {
        &self.timer
    }

    pub fn events(&self) -> &EventBus<PeriodElapsed> {
        &self.events
    }

    pub fn track_elapsed(&self) -> EventRecorder<PeriodElapsed> {
        EventRecorder::create(&self.events, PERIOD_ELAPSED_EVENT)
    }

    fn cancel_ticking(&self) {
        let previous = lock(&self.ticking).take();
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

impl Drop for CountdownService {
    fn drop(&mut self) {
        self.watcher.unsubscribe();
        self.timer.cancel_all();
    }
}

fn whole_millis(tick: Duration) -> Duration {
    let millis = tick.as_nanos().div_ceil(1_000_000);
    Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX)).max(MIN_PERIOD)
}

/// Emit [`PERIOD_ELAPSED_EVENT`] whenever the store's period counter grows.
fn watch_elapsed(
    store: &Arc<CountdownStore>,
    clock: Clock,
    events: EventBus<PeriodElapsed>,
) -> Unsubscribe {
    let weak: Weak<CountdownStore> = Arc::downgrade(store);
    let seen = AtomicU32::new(store.get_state().elapsed_periods);
    store.subscribe(move || {
        let Some(store) = weak.upgrade() else {
            return;
        };
        let state = store.get_state();
        let previous = seen.swap(state.elapsed_periods, Ordering::SeqCst);
        if state.elapsed_periods > previous {
            debug!(count = state.elapsed_periods, "period elapsed");
            events.emit(
                PERIOD_ELAPSED_EVENT,
                PeriodElapsed {
                    at: clock.date(),
                    period: state.period,
                    count: state.elapsed_periods,
                },
            );
        }
    })
}
