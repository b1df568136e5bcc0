//! Reset handling of the RAM model interfaces.
//!
//! Every interface owns a [`Reset`] controller supervising the task that runs its processing
//! loop. Asserting reset first stops the interface from accepting beats, then aborts that task,
//! waits for it to be gone, and only then clears the interface's channels, so a beat can never be
//! taken from a channel that was just cleared. The interface accepts no beat until reset is
//! de-asserted, which starts a fresh task.

use futures::stream::{BoxStream, Stream, StreamExt};
use log::{error, info, trace};
use std::fmt::{self, Debug};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A processing loop that can be supervised by a [`Reset`] controller.
pub trait Process: Debug + Send + Sync + 'static {
    /// Spawns the processing loop as a new task.
    ///
    /// The loop must only suspend in places where it can be aborted without corrupting shared
    /// state.
    fn start(&self) -> JoinHandle<()>;

    /// Refuses (or accepts again) handshakes on the channels the interface receives on.
    fn hold(&self, held: bool);

    /// Discards every beat queued in the channels of the interface.
    fn clear(&self);
}

/// A reset wire, as a stream of its sampled levels.
///
/// Every level in the stream is applied in order, so a short pulse is never missed.
pub struct ResetSignal {
    levels: BoxStream<'static, bool>,
    active_level: bool,
}

impl ResetSignal {
    /// Creates a reset signal that holds its interfaces in reset while the level equals
    /// `active_level`.
    pub fn new<S>(levels: S, active_level: bool) -> Self
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        Self {
            levels: levels.boxed(),
            active_level,
        }
    }

    /// Creates a reset signal asserted while high.
    pub fn active_high<S>(levels: S) -> Self
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        Self::new(levels, true)
    }

    /// Creates a reset signal asserted while low.
    pub fn active_low<S>(levels: S) -> Self
    where
        S: Stream<Item = bool> + Send + 'static,
    {
        Self::new(levels, false)
    }

    pub fn active_level(&self) -> bool {
        self.active_level
    }

    /// Waits for the next level, and returns whether it asserts reset. Returns `None` once the
    /// signal is gone.
    pub(crate) async fn next_asserted(&mut self) -> Option<bool> {
        let level = self.levels.next().await?;
        Some(level == self.active_level)
    }
}

impl Debug for ResetSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResetSignal")
            .field("active_level", &self.active_level)
            .finish_non_exhaustive()
    }
}

/// Reset controller for a single [`Process`].
///
/// Reset is asserted while either the local reset (see [`Reset::assert_reset`]) or the external
/// reset (see [`Reset::set_external_reset`]) is asserted. Only changes of that combined state
/// have an effect, so repeated assertions or de-assertions are no-ops.
#[derive(Debug)]
pub struct Reset<P: Process> {
    name: String,
    process: P,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    local: bool,
    external: bool,
    asserted: bool,
    /// Handle of the processing task. At most one task is ever alive per controller.
    task: Option<JoinHandle<()>>,
}

impl<P: Process> Reset<P> {
    /// Creates a controller for `process`, and immediately starts it, since no reset is asserted
    /// yet.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn new(name: impl Into<String>, process: P) -> Self {
        let name = name.into();
        trace!("{name}: starting processing");
        let task = process.start();
        Self {
            name,
            process,
            state: Mutex::new(State {
                local: false,
                external: false,
                asserted: false,
                task: Some(task),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn process(&self) -> &P {
        &self.process
    }

    /// Sets the local reset, and waits until the resulting reset state has been applied.
    pub async fn assert_reset(&self, asserted: bool) {
        let mut state = self.state.lock().await;
        state.local = asserted;
        self.update(&mut state).await;
    }

    /// Sets the external reset, and waits until the resulting reset state has been applied.
    pub async fn set_external_reset(&self, asserted: bool) {
        let mut state = self.state.lock().await;
        state.external = asserted;
        self.update(&mut state).await;
    }

    /// Returns `true` if reset is currently asserted.
    pub async fn in_reset(&self) -> bool {
        self.state.lock().await.asserted
    }

    /// Returns `true` if the processing task is alive.
    pub async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Spawns a task applying the levels of `signal` as external reset, until the signal ends.
    pub fn monitor(self: &Arc<Self>, mut signal: ResetSignal) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(asserted) = signal.next_asserted().await {
                this.set_external_reset(asserted).await;
            }
            trace!("{}: reset signal closed", this.name);
        })
    }

    async fn update(&self, state: &mut State) {
        let asserted = state.local || state.external;
        if asserted == state.asserted {
            return;
        }
        state.asserted = asserted;

        if asserted {
            info!("{}: reset asserted", self.name);
            self.process.hold(true);
            if let Some(task) = state.task.take() {
                task.abort();
                match task.await {
                    Ok(()) => trace!("{}: processing had already ended", self.name),
                    Err(e) if e.is_cancelled() => trace!("{}: processing aborted", self.name),
                    Err(e) => error!("{}: processing failed: {e}", self.name),
                }
            }
            self.process.clear();
        } else {
            info!("{}: reset de-asserted", self.name);
            self.process.hold(false);
            if state.task.is_none() {
                state.task = Some(self.process.start());
            }
        }
    }
}

impl<P: Process> Drop for Reset<P> {
    fn drop(&mut self) {
        if let Some(task) = self.state.get_mut().task.take() {
            task.abort();
        }
    }
}
