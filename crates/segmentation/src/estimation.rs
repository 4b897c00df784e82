//! Audience estimation: a simulated multi-step query that ends in a mock
//! audience count.
//!
//! Step advances are delivered as [`StepTick`]s by a [`StepScheduler`].
//! Every run has its own run number and `start()` cancels the previous
//! run's outstanding ticks, so a late tick from an abandoned run can never
//! move the progress of the current one.

use campaign_core::config::EstimationConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Progress labels, indexed by step.
pub const STEP_LABELS: [&str; 5] = [
    "Initializing Query...",
    "Connecting to BigQuery...",
    "Scanning 12.4TB Dataset...",
    "Applying Condition Filters...",
    "Aggregating Final Audience...",
];

/// Label for `step`, or "Processing..." past the end of the list.
pub fn step_label(step: usize) -> &'static str {
    STEP_LABELS.get(step).copied().unwrap_or("Processing...")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// "Advance run `run` to step `step`".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepTick {
    pub run: u64,
    pub step: usize,
}

/// Delayed delivery of step ticks, each individually cancellable.
pub trait StepScheduler {
    fn schedule(&mut self, delay: Duration, tick: StepTick) -> TaskHandle;

    /// Cancelling a handle that already fired is a no-op.
    fn cancel(&mut self, handle: TaskHandle);
}

// ---------------------------------------------------------------------------
// Schedulers
// ---------------------------------------------------------------------------

/// Virtual-clock scheduler. Time only moves when `advance` is called.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    next_handle: u64,
    pending: Vec<(TaskHandle, Duration, StepTick)>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Move the clock forward and return the ticks that fell due, in due
    /// order (ties in scheduling order).
    pub fn advance(&mut self, by: Duration) -> Vec<StepTick> {
        self.now += by;
        let now = self.now;
        let mut due: Vec<(TaskHandle, Duration, StepTick)> = Vec::new();
        self.pending.retain(|entry| {
            if entry.1 <= now {
                due.push(*entry);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(handle, at, _)| (*at, handle.0));
        due.into_iter().map(|(_, _, tick)| tick).collect()
    }
}

impl StepScheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, tick: StepTick) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push((handle, self.now + delay, tick));
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.pending.retain(|(h, _, _)| *h != handle);
    }
}

/// Scheduler backed by tokio timers. Fired ticks arrive on the receiver
/// returned by [`TokioScheduler::new`]; dropping the scheduler aborts every
/// outstanding timer.
#[derive(Debug)]
pub struct TokioScheduler {
    sender: mpsc::UnboundedSender<StepTick>,
    tasks: HashMap<TaskHandle, JoinHandle<()>>,
    next_handle: u64,
}

impl TokioScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<StepTick>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let scheduler = Self {
            sender,
            tasks: HashMap::new(),
            next_handle: 0,
        };
        (scheduler, receiver)
    }

    /// Timers not yet fired or cancelled.
    pub fn outstanding(&self) -> usize {
        self.tasks.values().filter(|h| !h.is_finished()).count()
    }
}

impl StepScheduler for TokioScheduler {
    /// Must be called from within a tokio runtime.
    fn schedule(&mut self, delay: Duration, tick: StepTick) -> TaskHandle {
        self.tasks.retain(|_, h| !h.is_finished());

        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;

        let sender = self.sender.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // receiver gone means the builder was torn down
            let _ = sender.send(tick);
        });
        self.tasks.insert(handle, task);
        handle
    }

    fn cancel(&mut self, handle: TaskHandle) {
        if let Some(task) = self.tasks.remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimationPhase {
    #[default]
    Idle,
    Running,
    Done,
}

/// Observable estimation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EstimationState {
    pub phase: EstimationPhase,
    pub step_index: usize,
    pub step_label: &'static str,
    pub result: Option<String>,
    pub confirmed_audience: Option<String>,
}

pub struct EstimationMachine<S: StepScheduler> {
    scheduler: S,
    step_delays: Vec<Duration>,
    min_audience: u64,
    max_audience: u64,
    rng: StdRng,
    phase: EstimationPhase,
    step_index: usize,
    result: Option<String>,
    confirmed_audience: Option<String>,
    run: u64,
    outstanding: Vec<TaskHandle>,
}

impl<S: StepScheduler> EstimationMachine<S> {
    /// An empty step list or audience range in `config` falls back to the
    /// defaults, so every run can finish.
    pub fn new(scheduler: S, config: &EstimationConfig) -> Self {
        let mut config = config.clone();
        config.normalize();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            scheduler,
            step_delays: config
                .step_delays_ms
                .iter()
                .map(|ms| Duration::from_millis(*ms))
                .collect(),
            min_audience: config.min_audience,
            max_audience: config.max_audience,
            rng,
            phase: EstimationPhase::Idle,
            step_index: 0,
            result: None,
            confirmed_audience: None,
            run: 0,
            outstanding: Vec::new(),
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn phase(&self) -> EstimationPhase {
        self.phase
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn step_label(&self) -> &'static str {
        step_label(self.step_index)
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn confirmed_audience(&self) -> Option<&str> {
        self.confirmed_audience.as_deref()
    }

    /// Step whose arrival completes a run.
    pub fn final_step(&self) -> usize {
        self.step_delays.len()
    }

    pub fn state(&self) -> EstimationState {
        EstimationState {
            phase: self.phase,
            step_index: self.step_index,
            step_label: self.step_label(),
            result: self.result.clone(),
            confirmed_audience: self.confirmed_audience.clone(),
        }
    }

    /// Begin a run. A run already in progress is abandoned and restarted
    /// from step 0.
    pub fn start(&mut self) {
        self.cancel_outstanding();
        self.run += 1;
        self.phase = EstimationPhase::Running;
        self.step_index = 0;
        self.result = None;

        for (i, delay) in self.step_delays.iter().enumerate() {
            let tick = StepTick {
                run: self.run,
                step: i + 1,
            };
            let handle = self.scheduler.schedule(*delay, tick);
            self.outstanding.push(handle);
        }
        info!(run = self.run, steps = self.step_delays.len(), "audience estimation started");
    }

    /// Apply a fired tick. Returns false for ticks of abandoned runs, ticks
    /// arriving while not running, and ticks that would move backwards.
    pub fn on_tick(&mut self, tick: StepTick) -> bool {
        if self.phase != EstimationPhase::Running || tick.run != self.run {
            debug!(run = tick.run, step = tick.step, current_run = self.run, "stale estimation tick");
            return false;
        }
        if tick.step <= self.step_index {
            debug!(step = tick.step, at = self.step_index, "out-of-order estimation tick");
            return false;
        }

        self.step_index = tick.step;
        debug!(run = self.run, step = self.step_index, label = self.step_label(), "estimation step");

        if self.step_index >= self.final_step() {
            let count = self.rng.gen_range(self.min_audience..self.max_audience);
            let result = format!("{} Users", format_count(count));
            info!(run = self.run, result = %result, "audience estimation finished");
            self.result = Some(result);
            self.phase = EstimationPhase::Done;
            self.cancel_outstanding();
        }
        true
    }

    /// Dismiss the overlay. With `confirm` a finished result becomes the
    /// confirmed audience; closing mid-run stops the run and confirms
    /// nothing.
    pub fn close(&mut self, confirm: bool) {
        self.cancel_outstanding();
        if confirm {
            if let Some(result) = self.result.take() {
                info!(audience = %result, "audience confirmed");
                self.confirmed_audience = Some(result);
            }
        }
        self.phase = EstimationPhase::Idle;
        self.step_index = 0;
        self.result = None;
    }

    fn cancel_outstanding(&mut self) {
        for handle in self.outstanding.drain(..) {
            self.scheduler.cancel(handle);
        }
    }
}

impl EstimationMachine<ManualScheduler> {
    /// Move the virtual clock and apply every tick that fell due.
    pub fn advance(&mut self, by: Duration) {
        let due = self.scheduler.advance(by);
        for tick in due {
            self.on_tick(tick);
        }
    }
}

impl<S: StepScheduler> Drop for EstimationMachine<S> {
    fn drop(&mut self) {
        self.cancel_outstanding();
    }
}

/// `123456` -> `123,456`
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
