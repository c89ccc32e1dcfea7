//! poller.rs
//!
//! Follows the server-side processing of one video upload.
//!
//! A mounted [`Poller`] owns two timers:
//! - the status poll (default every 2s), which re-derives the phase from a
//!   full status snapshot on every tick
//! - the cosmetic dots ticker (default every 500ms) cycling 0..=3
//!
//! Both share one state cell. Every mutation happens under its lock and is
//! skipped once the poller is detached, so dropping/unmounting the handle
//! guarantees no update or notification lands afterwards, even for a request
//! that was already in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::client::ingest_client::{ApiError, StatusBoard};
use crate::progress::phase::{Effect, Phase, Transition};

/// Where the poller reads the status board from.
#[async_trait]
pub trait StatusSource: Send + Sync + 'static {
    async fn fetch_status(&self) -> Result<StatusBoard, ApiError>;

    /// Best-effort request to purge a finished task's record.
    async fn exclude(&self, name: &str) -> Result<(), ApiError>;
}

/// Notifications delivered to the owner of a poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The phase changed.
    Phase(Phase),
    /// `true` once on success; `false` as a liveness signal while uploading.
    Finished(bool),
}

/// What a renderer needs to draw the current progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressView {
    pub phase: Phase,
    pub dots: u8,
}

struct Shared {
    view: ProgressView,
    detached: bool,
    view_tx: watch::Sender<ProgressView>,
    events: mpsc::UnboundedSender<ProgressEvent>,
}

impl Shared {
    fn apply(&mut self, name: &str, raw: Option<&str>) -> Transition {
        let current = self.view.phase;
        if !current.is_terminal() && Phase::classify(raw).is_none() {
            warn!("[poll] {name}: unrecognised status {raw:?}, keeping {current}");
        }

        let t = current.advance(raw);
        if t.next != current {
            debug!("[poll] {name}: {current} -> {}", t.next);
            if t.next == Phase::Failed {
                warn!("[poll] {name}: server reported failure");
            }
            self.view.phase = t.next;
            self.view_tx.send_replace(self.view);
            let _ = self.events.send(ProgressEvent::Phase(t.next));
        }

        for effect in &t.effects {
            match effect {
                Effect::NotifyProgressing => {
                    let _ = self.events.send(ProgressEvent::Finished(false));
                }
                Effect::NotifyFinished => {
                    let _ = self.events.send(ProgressEvent::Finished(true));
                }
                Effect::ExcludeRecord => {}
            }
        }
        t
    }

    fn tick_dots(&mut self) {
        self.view.dots = (self.view.dots + 1) % 4;
        self.view_tx.send_replace(self.view);
    }
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a mounted poller. Dropping it unmounts.
pub struct Poller {
    video_name: String,
    shared: Arc<Mutex<Shared>>,
    view_rx: watch::Receiver<ProgressView>,
    tasks: Vec<JoinHandle<()>>,
}

impl Poller {
    /// Starts both timers for `video_name`. The first status request goes
    /// out one `poll_interval` after mounting.
    pub fn mount<S: StatusSource>(
        source: Arc<S>,
        video_name: impl Into<String>,
        poll_interval: Duration,
        dots_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let video_name = video_name.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(ProgressView::default());

        let shared = Arc::new(Mutex::new(Shared {
            view: ProgressView::default(),
            detached: false,
            view_tx,
            events: events_tx,
        }));

        info!("[poll] tracking '{video_name}' every {poll_interval:?}");
        let tasks = vec![
            tokio::spawn(poll_loop(
                source,
                video_name.clone(),
                shared.clone(),
                poll_interval,
            )),
            tokio::spawn(dots_loop(shared.clone(), dots_interval)),
        ];

        (
            Self {
                video_name,
                shared,
                view_rx,
                tasks,
            },
            events_rx,
        )
    }

    pub fn video_name(&self) -> &str {
        &self.video_name
    }

    pub fn view(&self) -> ProgressView {
        lock(&self.shared).view
    }

    /// Receiver that wakes on every phase or dots change.
    pub fn subscribe(&self) -> watch::Receiver<ProgressView> {
        self.view_rx.clone()
    }

    /// Stops both timers. Nothing is updated or notified after this returns.
    pub fn unmount(self) {}

    fn detach(&mut self) {
        lock(&self.shared).detached = true;
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.detach();
        debug!("[poll] unmounted '{}'", self.video_name);
    }
}

async fn poll_loop<S: StatusSource>(
    source: Arc<S>,
    name: String,
    shared: Arc<Mutex<Shared>>,
    period: Duration,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let board = match source.fetch_status().await {
            Ok(board) => board,
            Err(e) => {
                warn!("[poll] {name}: status request failed: {e}");
                continue;
            }
        };

        let t = {
            let mut guard = lock(&shared);
            if guard.detached {
                return;
            }
            guard.apply(&name, board.video(&name))
        };

        if t.effects.contains(&Effect::ExcludeRecord) {
            // detached so an immediate unmount does not cancel the cleanup
            let source = source.clone();
            let name = name.clone();
            tokio::spawn(async move {
                if let Err(e) = source.exclude(&name).await {
                    warn!("[poll] {name}: exclude request failed: {e}");
                }
            });
        }

        if t.next.is_terminal() {
            info!("[poll] {name}: reached {}; polling stopped", t.next);
            return;
        }
    }
}

async fn dots_loop(shared: Arc<Mutex<Shared>>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let mut guard = lock(&shared);
        if guard.detached {
            return;
        }
        guard.tick_dots();
    }
}
