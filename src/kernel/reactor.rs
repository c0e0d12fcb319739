use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::engine::{CycleOutcome, Engine};
use super::event::EngineEvent;
use super::time::TICK_MS;
use crate::context::ContextSnapshot;

const CYCLE_QUEUE: usize = 256;

/// Drives an `Engine` from a channel on a fixed cadence.
pub struct Reactor {
    receiver: mpsc::Receiver<EngineEvent>,
    engine: Engine,
    cancel: CancellationToken,
    cycles: Option<CycleWorker>,
}

/// Runs context cycles one at a time, in arrival order, beside the driver.
struct CycleWorker {
    queue: mpsc::Sender<ContextSnapshot>,
    handle: JoinHandle<()>,
}

impl CycleWorker {
    fn spawn(engine: Engine) -> Self {
        let (queue, mut rx) = mpsc::channel::<ContextSnapshot>(CYCLE_QUEUE);
        let handle = tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                match engine.ingest(snapshot).await {
                    Ok(CycleOutcome::Proposed(p)) => {
                        debug!(session = %p.session_id, "cycle proposed a suggestion")
                    }
                    Ok(other) => debug!(outcome = ?other, "cycle finished"),
                    Err(e) => warn!(error = %e, "cycle dropped"),
                }
            }
        });
        Self { queue, handle }
    }

    /// Lets queued cycles finish, then stops.
    async fn drain(self) {
        drop(self.queue);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "cycle worker aborted");
        }
    }
}

impl Reactor {
    pub fn new(receiver: mpsc::Receiver<EngineEvent>, engine: Engine) -> Self {
        Self {
            receiver,
            engine,
            cancel: CancellationToken::new(),
            cycles: None,
        }
    }

    /// Cancelling this token stops `run` after the current tick.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// One tick: drain events, dispatch them, then check the decision deadline.
    /// Returns `false` once a shutdown has been requested.
    pub async fn tick_step(&mut self) -> bool {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }

        let mut keep_running = true;
        for event in events {
            match event {
                EngineEvent::Snapshot(snapshot) => {
                    // Cycles may wait on the language model; decisions must not.
                    let engine = &self.engine;
                    let worker = self
                        .cycles
                        .get_or_insert_with(|| CycleWorker::spawn(engine.clone()));
                    if worker.queue.send(snapshot).await.is_err() {
                        warn!("cycle worker gone, snapshot dropped");
                    }
                }
                EngineEvent::Decision {
                    session_id,
                    decision,
                } => {
                    if let Err(e) = self.engine.decide(session_id, decision).await {
                        warn!(session = %session_id, error = %e, "decision rejected");
                    }
                }
                EngineEvent::Shutdown => keep_running = false,
            }
        }

        if self.engine.expire_due().await.is_some() {
            debug!("outstanding suggestion timed out");
        }
        keep_running
    }

    pub async fn run(&mut self) {
        info!("Reactor started. Tick: {}ms", TICK_MS);

        let mut cadence = interval(Duration::from_millis(TICK_MS));
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = cadence.tick() => {
                    if !self.tick_step().await {
                        break;
                    }
                }
            }
        }

        if let Some(worker) = self.cycles.take() {
            worker.drain().await;
        }
        if let Err(e) = self.engine.shutdown().await {
            warn!(error = %e, "model not saved on shutdown");
        }
        info!("Reactor stopped");
    }
}
