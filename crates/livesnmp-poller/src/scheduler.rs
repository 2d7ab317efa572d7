//! Repeated polling of one host.
//!
//! A [`PollScheduler`] runs at most one poll cycle at a time for its host.
//! Each cycle runs on a spawned task; its result comes back through a
//! single-consumer queue and is handed to the sink by
//! [`PollScheduler::process_next`] on whichever task drives the scheduler.
//! When the timer is enabled, every delivered result (success or failure)
//! schedules the next cycle after the poll interval.
//!
//! [`PollScheduler::stop`] is cooperative: an exchange already in flight
//! finishes and its result is still delivered, but nothing is scheduled
//! after it.
//!
//! ```text
//! start() ──► Polling ──(result delivered)──► Idle
//!   ▲                                           │
//!   └──────── TimerFired (timer armed) ◄────────┘
//! ```

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument};

use livesnmp_common::{Host, LiveSnmpResult, Registry};

use crate::result::PollResult;
use crate::sink::PollSink;
use crate::transport::SnmpTransport;

/// Default delay between two cycles.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// How long [`PollScheduler::drain`] waits for the in-flight cycle.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// A host and the `(service name, OID)` pairs polled on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSession {
    host: Host,
    services: Vec<(String, String)>,
}

impl PollSession {
    pub fn new(host: Host, services: Vec<(String, String)>) -> Self {
        Self { host, services }
    }

    /// Session for the host named `host`, polling every service of its
    /// device.
    pub fn from_registry(registry: &Registry, host: &str) -> LiveSnmpResult<Self> {
        let host = registry.host(host)?.clone();
        let services = registry.service_oids(&host)?;
        Ok(Self::new(host, services))
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn services(&self) -> &[(String, String)] {
        &self.services
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Whether a cycle is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Polling,
}

/// What [`PollScheduler::process_next`] handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A result went to the sink; `rescheduled` tells whether a timer was
    /// started for the next cycle.
    Delivered { rescheduled: bool },
    /// The timer fired and a new cycle started.
    Restarted,
    /// The timer fired but was stale, disarmed or cancelled.
    TimerSkipped,
}

#[derive(Debug)]
struct SessionState {
    polling: bool,
    cancel_requested: bool,
    timer_armed: bool,
    interval: Duration,
    /// Bumped whenever pending timers must be ignored.
    generation: u64,
}

/// The binary permit of a session. Released on drop.
struct PollPermit {
    state: Arc<Mutex<SessionState>>,
}

impl PollPermit {
    fn try_acquire(state: &Arc<Mutex<SessionState>>) -> Option<Self> {
        let mut st = state.lock();
        if st.polling {
            return None;
        }
        st.polling = true;
        st.cancel_requested = false;
        // Pending timers belong to the previous cycle
        st.generation += 1;
        Some(Self {
            state: Arc::clone(state),
        })
    }
}

impl Drop for PollPermit {
    fn drop(&mut self) {
        self.state.lock().polling = false;
    }
}

enum Event {
    Completed { result: PollResult, permit: PollPermit },
    TimerFired(u64),
}

/// Drives repeated polling of one host into a [`PollSink`].
///
/// Must be used from within a Tokio runtime.
pub struct PollScheduler<S: PollSink> {
    session: Arc<PollSession>,
    transport: Arc<SnmpTransport>,
    sink: S,
    state: Arc<Mutex<SessionState>>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
}

impl<S: PollSink> PollScheduler<S> {
    /// Creates an idle scheduler with the timer disabled.
    pub fn new(session: PollSession, transport: Arc<SnmpTransport>, sink: S) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            session: Arc::new(session),
            transport,
            sink,
            state: Arc::new(Mutex::new(SessionState {
                polling: false,
                cancel_requested: false,
                timer_armed: false,
                interval: DEFAULT_INTERVAL,
                generation: 0,
            })),
            events_tx,
            events_rx,
        }
    }

    pub fn with_interval(self, interval: Duration) -> Self {
        self.set_interval(interval);
        self
    }

    pub fn with_timer_enabled(self, enabled: bool) -> Self {
        self.set_timer_enabled(enabled);
        self
    }

    /// Starts a cycle unless one is already in flight.
    ///
    /// Returns false (and does nothing) when a cycle is in flight. Does not
    /// wait for the exchange.
    pub fn start(&mut self) -> bool {
        let Some(permit) = PollPermit::try_acquire(&self.state) else {
            debug!(host = %self.session.host().name, "Poll already in flight");
            return false;
        };

        self.sink
            .poll_started(self.session.host(), &self.session.service_names());

        let session = Arc::clone(&self.session);
        let transport = Arc::clone(&self.transport);
        let events_tx = self.events_tx.clone();
        let span = info_span!("poll", host = %session.host().name);

        tokio::spawn(
            async move {
                let started_at = Utc::now();
                let reply = transport
                    .get_from_host(session.host(), session.services())
                    .await;
                let result = PollResult::new(
                    session.host().name.clone(),
                    started_at,
                    Utc::now(),
                    reply.result,
                )
                .with_notes(reply.notes);

                if events_tx.send(Event::Completed { result, permit }).is_err() {
                    debug!("Scheduler gone, dropping result");
                }
            }
            .instrument(span),
        );

        true
    }

    /// Cancels further polling.
    ///
    /// A cycle in flight still completes and is delivered; no cycle is
    /// scheduled after it, and a pending timer is discarded.
    pub fn stop(&self) {
        let mut st = self.state.lock();
        st.cancel_requested = true;
        st.timer_armed = false;
        st.generation += 1;
        info!(host = %self.session.host().name, polling = st.polling, "Polling stopped");
    }

    /// Enables or disables re-polling after each delivered result.
    pub fn set_timer_enabled(&self, enabled: bool) {
        let mut st = self.state.lock();
        if st.timer_armed != enabled {
            st.timer_armed = enabled;
            st.generation += 1;
        }
    }

    /// Sets the delay used for the next scheduled cycle.
    pub fn set_interval(&self, interval: Duration) {
        self.state.lock().interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.state.lock().interval
    }

    pub fn timer_enabled(&self) -> bool {
        self.state.lock().timer_armed
    }

    pub fn state(&self) -> SchedulerState {
        if self.state.lock().polling {
            SchedulerState::Polling
        } else {
            SchedulerState::Idle
        }
    }

    pub fn is_polling(&self) -> bool {
        self.state() == SchedulerState::Polling
    }

    pub fn session(&self) -> &PollSession {
        &self.session
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Waits for the next event and handles it on the calling task.
    pub async fn process_next(&mut self) -> SchedulerEvent {
        // The scheduler holds a sender, so the queue never closes.
        let Some(event) = self.events_rx.recv().await else {
            return std::future::pending().await;
        };
        match event {
            Event::Completed { result, permit } => self.deliver(result, permit),
            Event::TimerFired(generation) => self.on_timer(generation),
        }
    }

    /// Runs one cycle and waits for its result to be delivered.
    ///
    /// Returns false when a cycle was already in flight.
    pub async fn poll_once(&mut self) -> bool {
        if !self.start() {
            return false;
        }
        self.drain().await;
        true
    }

    /// Starts polling and handles events until `shutdown` is cancelled,
    /// then stops and delivers the cycle still in flight.
    #[instrument(skip_all, fields(host = %self.session.host().name))]
    pub async fn run(&mut self, shutdown: CancellationToken) {
        self.start();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.process_next() => {}
            }
        }

        self.stop();
        self.drain().await;
    }

    /// Handles events until no cycle is in flight.
    pub async fn drain(&mut self) {
        while self.is_polling() {
            if tokio::time::timeout(DRAIN_TIMEOUT, self.process_next())
                .await
                .is_err()
            {
                warn!(
                    host = %self.session.host().name,
                    "Gave up waiting for the poll in flight"
                );
                break;
            }
        }
    }

    fn deliver(&mut self, result: PollResult, permit: PollPermit) -> SchedulerEvent {
        self.sink.poll_result(result);
        drop(permit);

        let (rearm, generation, interval) = {
            let st = self.state.lock();
            (st.timer_armed && !st.cancel_requested, st.generation, st.interval)
        };

        if rearm {
            let events_tx = self.events_tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(interval).await;
                let _ = events_tx.send(Event::TimerFired(generation));
            });
        }

        SchedulerEvent::Delivered { rescheduled: rearm }
    }

    fn on_timer(&mut self, generation: u64) -> SchedulerEvent {
        let current = {
            let st = self.state.lock();
            st.generation == generation && st.timer_armed && !st.cancel_requested
        };

        if current && self.start() {
            SchedulerEvent::Restarted
        } else {
            debug!(host = %self.session.host().name, generation, "Skipping timer");
            SchedulerEvent::TimerSkipped
        }
    }
}

impl<S: PollSink> std::fmt::Debug for PollScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollScheduler")
            .field("session", &self.session)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}
