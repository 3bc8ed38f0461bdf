//! # Cyclic Poll Dispatcher
//!
//! Each subsystem of the mount (pointing, settings, dome, clock, reachability) is polled
//! by its own [`PollCycle`]. A cycle runs a small driver task that owns the subsystem
//! state and a ticker; on every tick it either
//!
//! * does nothing while the cycle is stopped,
//! * drops the tick while the previous fetch of this cycle is still in flight,
//! * republishes the current state without any I/O while the mount is unreachable, or
//! * submits a fetch on a clone of the state to the shared [`WorkerPool`].
//!
//! The fetch mutates its private clone; only when the worker returns does the driver adopt
//! the clone, run the completion hook and publish. Consumers therefore never see a half
//! updated state.
//!
//! Overlap policy is skip-if-busy: a cycle never has more than one fetch in flight, and
//! ticks that fire meanwhile are counted in [`crate::metrics`] and discarded.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::{emit, EventSink, MountEvent};
use crate::metrics;
use crate::mount::liveness::LivenessReader;
use crate::transport::Connection;
use crate::worker::WorkerPool;

/// A subsystem state that knows how to refresh itself from the mount.
pub trait Poll: Clone + Default + Send + Sync + 'static {
    /// Fetch fresh data into `self`. Returns false if the exchange or the parse failed;
    /// the cycle then discards this copy.
    fn poll(&mut self, conn: &Connection) -> impl Future<Output = bool> + Send;
}

/// Called on the cycle context after a successful fetch, before publishing.
pub type CompletionHook<S> = Box<dyn FnMut(&S) + Send>;

/// Everything a cycle shares with its siblings
#[derive(Clone)]
pub struct CycleContext {
    pub conn: Connection,
    pub pool: WorkerPool,
    pub events: EventSink,
    pub cancel: CancellationToken,
}

pub struct PollCycle<S: Poll> {
    name: &'static str,
    period: Duration,
    enabled: bool,
    state: S,
    gate: Option<LivenessReader>,
    to_event: fn(&S) -> MountEvent,
    on_complete: Option<CompletionHook<S>>,
}

impl<S: Poll> PollCycle<S> {
    pub fn new(name: &'static str, period: Duration, to_event: fn(&S) -> MountEvent) -> Self {
        Self {
            name,
            period,
            enabled: true,
            state: S::default(),
            gate: None,
            to_event,
            on_complete: None,
        }
    }

    /// Start stopped; enable later through [`CycleHandle::start`].
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Only fetch while the liveness flag reports the mount reachable.
    pub fn gated_by(mut self, liveness: LivenessReader) -> Self {
        self.gate = Some(liveness);
        self
    }

    pub fn with_state(mut self, state: S) -> Self {
        self.state = state;
        self
    }

    pub fn on_complete(mut self, hook: impl FnMut(&S) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(hook));
        self
    }

    /// Spawn the driver task. Must be called from within a tokio runtime.
    pub fn spawn(self, ctx: CycleContext) -> CycleHandle<S> {
        let enabled = Arc::new(AtomicBool::new(self.enabled));
        let (state_tx, state_rx) = watch::channel(self.state.clone());
        let name = self.name;
        let driver = CycleDriver {
            cycle: self,
            enabled: Arc::clone(&enabled),
            state_tx,
            ctx,
        };
        let task = tokio::spawn(driver.run());
        CycleHandle {
            name,
            enabled,
            state: state_rx,
            task,
        }
    }
}

/// Control and observation side of a running cycle
pub struct CycleHandle<S> {
    name: &'static str,
    enabled: Arc<AtomicBool>,
    state: watch::Receiver<S>,
    task: JoinHandle<()>,
}

impl<S: Clone> CycleHandle<S> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn start(&self) {
        if !self.enabled.swap(true, Ordering::SeqCst) {
            debug!("cycle {} started", self.name);
        }
    }

    pub fn stop(&self) {
        if self.enabled.swap(false, Ordering::SeqCst) {
            debug!("cycle {} stopped", self.name);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Last published state
    pub fn state(&self) -> S {
        self.state.borrow().clone()
    }

    /// Typed result channel of this cycle
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.clone()
    }

    /// Wait for the driver to exit after the shared cancellation token fired.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!("cycle {} driver ended abnormally: {}", self.name, e);
        }
    }
}

struct CycleDriver<S: Poll> {
    cycle: PollCycle<S>,
    enabled: Arc<AtomicBool>,
    state_tx: watch::Sender<S>,
    ctx: CycleContext,
}

impl<S: Poll> CycleDriver<S> {
    async fn run(mut self) {
        let mut ticker = time::interval(self.cycle.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut in_flight: Option<JoinHandle<Option<S>>> = None;

        loop {
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if !self.enabled.load(Ordering::SeqCst) {
                        continue;
                    }
                    if in_flight.is_some() {
                        metrics::inc_tick_skipped();
                        trace!("cycle {}: previous fetch still running, tick skipped", self.cycle.name);
                        continue;
                    }
                    if let Some(gate) = &self.cycle.gate {
                        if !gate.is_reachable() {
                            metrics::inc_tick_gated();
                            self.publish();
                            continue;
                        }
                    }
                    in_flight = Some(self.submit());
                }
                finished = wait_in_flight(&mut in_flight) => {
                    in_flight = None;
                    self.complete(finished);
                }
            }
        }

        // Exchanges carry their own deadlines, so this wait is bounded.
        if let Some(handle) = in_flight {
            let _ = handle.await;
        }
        debug!("cycle {} terminated", self.cycle.name);
    }

    fn submit(&self) -> JoinHandle<Option<S>> {
        let mut snapshot = self.cycle.state.clone();
        let conn = self.ctx.conn.clone();
        self.ctx.pool.submit(async move {
            let ok = snapshot.poll(&conn).await;
            ok.then_some(snapshot)
        })
    }

    fn complete(&mut self, finished: Result<Option<S>, JoinError>) {
        match finished {
            Ok(Some(fetched)) => {
                self.cycle.state = fetched;
                if let Some(hook) = self.cycle.on_complete.as_mut() {
                    hook(&self.cycle.state);
                }
                self.publish();
            }
            Ok(None) => debug!("cycle {}: fetch failed, state unchanged", self.cycle.name),
            Err(e) => warn!("cycle {}: worker failed: {}", self.cycle.name, e),
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.cycle.state.clone());
        emit(&self.ctx.events, (self.cycle.to_event)(&self.cycle.state));
    }
}

async fn wait_in_flight<T>(in_flight: &mut Option<JoinHandle<T>>) -> Result<T, JoinError> {
    match in_flight {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
