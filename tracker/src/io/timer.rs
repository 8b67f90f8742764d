//! Periodic task scheduling.
//!
//! [`IntervalTimer::create`] runs every registered task on a tokio interval.
//! [`IntervalTimer::create_null`] never runs anything by itself; tests drive
//! the most recently scheduled task with
//! [`IntervalTimer::simulate_task_execution`]. Both variants keep the same
//! registration table and emit the same lifecycle events.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, warn};

use crate::core::events::{Emitter, EventBus, EventRecorder};
use crate::core::sync::lock;

/// Event emitted when a task is registered.
pub const SCHEDULED_EVENT: &str = "scheduled";
/// Event emitted when a registration is removed.
pub const CANCELED_EVENT: &str = "canceled";

/// Shortest period the tokio-backed timer accepts.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Work run on every tick.
pub type Task = Arc<dyn Fn() + Send + Sync>;

/// Identifies one registration for the lifetime of its timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

/// Lifecycle payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Scheduled { task: TaskId, period: Duration },
    Canceled { task: TaskId },
}

trait Ticker: Send + Sync {
    /// Begin periodic execution while `live` holds. `None` means nothing runs
    /// on its own.
    fn start(&self, period: Duration, task: Task, live: Arc<AtomicBool>) -> Option<AbortHandle>;
}

struct TokioTicker {
    runtime: Handle,
}

impl Ticker for TokioTicker {
    fn start(&self, period: Duration, task: Task, live: Arc<AtomicBool>) -> Option<AbortHandle> {
        let period = if period < MIN_PERIOD {
            warn!(?period, min = ?MIN_PERIOD, "interval period too short, clamping");
            MIN_PERIOD
        } else {
            period
        };
        let join = self.runtime.spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // Abort only lands at the next await; the flag covers the gap.
                if !fire(&live, &task) {
                    break;
                }
            }
        });
        Some(join.abort_handle())
    }
}

struct SteppedTicker;

impl Ticker for SteppedTicker {
    fn start(&self, _period: Duration, _task: Task, _live: Arc<AtomicBool>) -> Option<AbortHandle> {
        None
    }
}

/// Run `task` unless its registration has been canceled.
fn fire(live: &AtomicBool, task: &Task) -> bool {
    if !live.load(Ordering::Acquire) {
        return false;
    }
    task();
    true
}

struct Registration {
    task: Task,
    live: Arc<AtomicBool>,
    running: Option<AbortHandle>,
}

impl Registration {
    fn stop(&self) {
        self.live.store(false, Ordering::Release);
        if let Some(running) = &self.running {
            running.abort();
        }
    }
}

struct TimerState {
    next_id: u64,
    tasks: BTreeMap<TaskId, Registration>,
    last_scheduled: Option<TaskId>,
}

struct Shared {
    ticker: Box<dyn Ticker>,
    state: Mutex<TimerState>,
    events: EventBus<TimerEvent>,
}

impl Shared {
    fn cancel(&self, task: TaskId) {
        let removed = lock(&self.state).tasks.remove(&task);
        if let Some(registration) = removed {
            registration.stop();
            debug!(?task, "task canceled");
            self.events
                .emit(CANCELED_EVENT, TimerEvent::Canceled { task });
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for registration in lock(&self.state).tasks.values() {
            registration.stop();
        }
    }
}

/// Periodic scheduler owning its task registrations.
pub struct IntervalTimer {
    shared: Arc<Shared>,
}

impl IntervalTimer {
    /// Timer backed by the current tokio runtime.
    pub fn create() -> Result<Self> {
        let runtime = Handle::try_current().context("interval timer requires a tokio runtime")?;
        Ok(Self::with_ticker(Box::new(TokioTicker { runtime })))
    }

    /// Stepped timer; tasks only run through [`IntervalTimer::simulate_task_execution`].
    pub fn create_null() -> Self {
        Self::with_ticker(Box::new(SteppedTicker))
    }

    fn with_ticker(ticker: Box<dyn Ticker>) -> Self {
        Self {
            shared: Arc::new(Shared {
                ticker,
                state: Mutex::new(TimerState {
                    next_id: 0,
                    tasks: BTreeMap::new(),
                    last_scheduled: None,
                }),
                events: EventBus::new(),
            }),
        }
    }

    /// Run `task` every `period` until the returned [`Cancellation`] fires.
    #[instrument(skip_all, fields(period = ?period))]
    pub fn schedule<F>(&self, task: F, period: Duration) -> Cancellation
    where
        F: Fn() + Send + Sync + 'static,
    {
        let task: Task = Arc::new(task);
        let id = {
            let mut state = lock(&self.shared.state);
            let id = TaskId(state.next_id);
            state.next_id += 1;
            let live = Arc::new(AtomicBool::new(true));
            let running = self
                .shared
                .ticker
                .start(period, Arc::clone(&task), Arc::clone(&live));
            state.tasks.insert(
                id,
                Registration {
                    task,
                    live,
                    running,
                },
            );
            state.last_scheduled = Some(id);
            id
        };
        debug!(task = ?id, "task scheduled");
        self.shared
            .events
            .emit(SCHEDULED_EVENT, TimerEvent::Scheduled { task: id, period });

        Cancellation {
            task: id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Cancel every registration, oldest first.
    pub fn cancel_all(&self) {
        let ids: Vec<TaskId> = lock(&self.shared.state).tasks.keys().copied().collect();
        for id in ids {
            self.shared.cancel(id);
        }
    }

    /// Run the most recently scheduled task `times` times, synchronously.
    ///
    /// Does nothing if that task has been canceled, and stops early if a run
    /// cancels it.
    pub fn simulate_task_execution(&self, times: usize) {
        let task = {
            let state = lock(&self.shared.state);
            state
                .last_scheduled
                .and_then(|id| state.tasks.get(&id))
                .map(|registration| {
                    (
                        Arc::clone(&registration.task),
                        Arc::clone(&registration.live),
                    )
                })
        };
        let Some((task, live)) = task else {
            debug!("no live task to simulate");
            return;
        };
        for _ in 0..times {
            if !fire(&live, &task) {
                break;
            }
        }
    }

    /// Number of live registrations.
    pub fn active_tasks(&self) -> usize {
        lock(&self.shared.state).tasks.len()
    }

    /// Lifecycle events; observable with an [`EventRecorder`].
    pub fn events(&self) -> &EventBus<TimerEvent> {
        &self.shared.events
    }

    pub fn track_scheduled_tasks(&self) -> EventRecorder<TimerEvent> {
        EventRecorder::create(&self.shared.events, SCHEDULED_EVENT)
    }

    pub fn track_canceled_tasks(&self) -> EventRecorder<TimerEvent> {
        EventRecorder::create(&self.shared.events, CANCELED_EVENT)
    }
}

impl fmt::Debug for IntervalTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalTimer")
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

/// Cancels one registration. Only the first call has an effect.
#[derive(Clone)]
pub struct Cancellation {
    task: TaskId,
    shared: Weak<Shared>,
}

impl Cancellation {
    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.cancel(self.task);
        }
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("task", &self.task)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn schedule_emits_scheduled_event() {
        let timer = IntervalTimer::create_null();
        let scheduled = timer.track_scheduled_tasks();

        let handle = timer.schedule(|| {}, Duration::from_millis(100));

        assert_eq!(
            scheduled.data(),
            vec![TimerEvent::Scheduled {
                task: handle.task(),
                period: Duration::from_millis(100),
            }]
        );
        assert_eq!(timer.active_tasks(), 1);
    }

    #[test]
    fn simulated_execution_runs_task_synchronously() {
        let timer = IntervalTimer::create_null();
        let (count, task) = counter();
        timer.schedule(task, Duration::from_millis(100));

        timer.simulate_task_execution(3);

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn simulation_targets_most_recent_task() {
        let timer = IntervalTimer::create_null();
        let (first, first_task) = counter();
        let (second, second_task) = counter();
        timer.schedule(first_task, Duration::from_secs(1));
        timer.schedule(second_task, Duration::from_secs(1));

        timer.simulate_task_execution(2);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn canceled_task_never_runs() {
        let timer = IntervalTimer::create_null();
        let canceled = timer.track_canceled_tasks();
        let (count, task) = counter();
        let handle = timer.schedule(task, Duration::from_millis(100));

        handle.cancel();
        timer.simulate_task_execution(3);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(timer.active_tasks(), 0);
        assert_eq!(
            canceled.data(),
            vec![TimerEvent::Canceled {
                task: handle.task()
            }]
        );
    }

    #[test]
    fn task_canceling_itself_stops_simulation() {
        let timer = IntervalTimer::create_null();
        let runs = Arc::new(AtomicUsize::new(0));
        let own: Arc<Mutex<Option<Cancellation>>> = Arc::new(Mutex::new(None));
        let handle = {
            let runs = Arc::clone(&runs);
            let own = Arc::clone(&own);
            timer.schedule(
                move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                    if let Some(cancellation) = own.lock().expect("lock").as_ref() {
                        cancellation.cancel();
                    }
                },
                Duration::from_secs(1),
            )
        };
        *own.lock().expect("lock") = Some(handle);

        timer.simulate_task_execution(5);

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(timer.active_tasks(), 0);
    }

    #[test]
    fn fire_skips_dead_registration() {
        let (count, task) = counter();
        let task: Task = Arc::new(task);
        let live = AtomicBool::new(true);

        assert!(fire(&live, &task));
        live.store(false, Ordering::Release);
        assert!(!fire(&live, &task));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn canceled_real_task_stops_on_multi_thread_runtime() {
        let timer = IntervalTimer::create().expect("runtime");
        let (count, task) = counter();
        let handle = timer.schedule(task, Duration::from_millis(1));

        while count.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        handle.cancel();
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A run already past the live check may still finish.
        assert!(count.load(Ordering::SeqCst) <= after_cancel + 1);
    }

    #[test]
    fn cancel_is_idempotent() {
        let timer = IntervalTimer::create_null();
        let canceled = timer.track_canceled_tasks();
        let handle = timer.schedule(|| {}, Duration::from_secs(1));

        handle.cancel();
        handle.cancel();
        handle.clone().cancel();

        assert_eq!(canceled.data().len(), 1);
    }

    #[test]
    fn cancel_all_emits_in_registration_order() {
        let timer = IntervalTimer::create_null();
        let canceled = timer.track_canceled_tasks();
        let a = timer.schedule(|| {}, Duration::from_secs(1));
        let b = timer.schedule(|| {}, Duration::from_secs(2));
        let c = timer.schedule(|| {}, Duration::from_secs(3));
        b.cancel();

        timer.cancel_all();

        assert_eq!(
            canceled.data(),
            vec![
                TimerEvent::Canceled { task: b.task() },
                TimerEvent::Canceled { task: a.task() },
                TimerEvent::Canceled { task: c.task() },
            ]
        );
        assert_eq!(timer.active_tasks(), 0);
        timer.cancel_all();
        assert_eq!(canceled.data().len(), 3);
    }

    #[test]
    fn zero_period_is_accepted() {
        let timer = IntervalTimer::create_null();
        let (count, task) = counter();
        timer.schedule(task, Duration::ZERO);
        timer.simulate_task_execution(1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancellation_outliving_timer_is_harmless() {
        let timer = IntervalTimer::create_null();
        let handle = timer.schedule(|| {}, Duration::from_secs(1));
        drop(timer);
        handle.cancel();
    }

    #[test]
    fn create_without_runtime_fails() {
        let err = IntervalTimer::create().expect_err("no runtime");
        assert!(err.to_string().contains("requires a tokio runtime"));
    }

    #[tokio::test(start_paused = true)]
    async fn real_timer_runs_on_period_until_canceled() {
        let timer = IntervalTimer::create().expect("runtime");
        let (count, task) = counter();
        let handle = timer.schedule(task, Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.cancel();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn real_timer_clamps_zero_period() {
        let timer = IntervalTimer::create().expect("runtime");
        let (count, task) = counter();
        timer.schedule(task, Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(count.load(Ordering::SeqCst) >= 1);
        timer.cancel_all();
    }
}
