//! Interval-driven full sync

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::sync::{SyncOrchestrator, SyncTarget};
use crate::traits::SyncStore;
use crate::transport::Transport;
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Disabled,
    Armed,
    Running,
}

/// Entity kinds one full run walks through, in dependency order.
const FULL_RUN_KINDS: [SyncKind; 5] = [
    SyncKind::Groups,
    SyncKind::Ledgers,
    SyncKind::Stock,
    SyncKind::Vouchers,
    SyncKind::Reports,
];

/// Snapshot of the scheduler's lifecycle, for the UI layer
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub next_run: Option<NaiveDateTime>,
    pub last_run: Option<NaiveDateTime>,
    pub last_summary: Option<SyncSummary>,
    pub runs_completed: u64,
    /// Entity kinds finished within the current (or most recent) run
    pub run_progress: u32,
    /// Total entity kinds per run
    pub run_steps: u32,
}

impl Default for SchedulerStatus {
    fn default() -> Self {
        Self {
            state: SchedulerState::Disabled,
            next_run: None,
            last_run: None,
            last_summary: None,
            runs_completed: 0,
            run_progress: 0,
            run_steps: FULL_RUN_KINDS.len() as u32,
        }
    }
}

/// Runs a `full` sync on a fixed interval while enabled.
///
/// At most one run is ever in flight; a tick that fires while a run is
/// still going is skipped, not queued, so the external server never sees
/// overlapping cycles from this process.
pub struct AutoSyncScheduler<S, T> {
    orchestrator: Arc<SyncOrchestrator<S, T>>,
    status: Arc<Mutex<SchedulerStatus>>,
    in_flight: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S, T> AutoSyncScheduler<S, T>
where
    S: SyncStore + 'static,
    T: Transport + 'static,
{
    pub fn new(orchestrator: Arc<SyncOrchestrator<S, T>>) -> Self {
        Self {
            orchestrator,
            status: Arc::new(Mutex::new(SchedulerStatus::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.lock().unwrap().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.status.lock().unwrap().state != SchedulerState::Disabled
    }

    /// Arm the timer. A scheduler that is already armed is re-armed with the
    /// new target and interval; the pending tick is cancelled.
    pub fn start(&self, target: SyncTarget, interval: Duration) {
        self.cancel_timer();

        let orchestrator = Arc::clone(&self.orchestrator);
        let status = Arc::clone(&self.status);
        let in_flight = Arc::clone(&self.in_flight);

        arm(&status, interval);
        log::info!(
            "auto-sync armed: every {}s against {}",
            interval.as_secs(),
            target.server_url
        );

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The interval's first tick is immediate; consume it so the
            // first run happens one full interval after arming.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if in_flight.swap(true, Ordering::SeqCst) {
                    log::debug!("auto-sync tick skipped: a run is still in flight");
                    continue;
                }
                {
                    let mut snapshot = status.lock().unwrap();
                    snapshot.state = SchedulerState::Running;
                    snapshot.run_progress = 0;
                }

                // One entity kind at a time; each completion advances the
                // progress counter the UI polls.
                let mut total = SyncSummary::empty(SyncKind::Full);
                for kind in FULL_RUN_KINDS {
                    match orchestrator.sync(&target, kind, None).await {
                        Ok(summary) => total.absorb(&summary),
                        Err(err) => {
                            log::error!("auto-sync {} step failed: {err}", kind.as_str())
                        }
                    }
                    status.lock().unwrap().run_progress += 1;
                }

                let mut snapshot = status.lock().unwrap();
                snapshot.last_run = Some(chrono::Utc::now().naive_utc());
                snapshot.runs_completed += 1;
                snapshot.last_summary = Some(total);
                snapshot.state = SchedulerState::Armed;
                snapshot.next_run = next_run_at(interval);
                drop(snapshot);
                in_flight.store(false, Ordering::SeqCst);
            }
        });
        *self.handle.lock().unwrap() = Some(task);
    }

    /// Disable the scheduler and cancel any pending tick.
    pub fn stop(&self) {
        self.cancel_timer();
        let mut snapshot = self.status.lock().unwrap();
        snapshot.state = SchedulerState::Disabled;
        snapshot.next_run = None;
        log::info!("auto-sync disabled");
    }

    /// Apply a new target or interval; equivalent to stop-then-start.
    pub fn reconfigure(&self, target: SyncTarget, interval: Duration) {
        self.start(target, interval);
    }

    fn cancel_timer(&self) {
        if let Some(task) = self.handle.lock().unwrap().take() {
            task.abort();
        }
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

fn arm(status: &Mutex<SchedulerStatus>, interval: Duration) {
    let mut snapshot = status.lock().unwrap();
    snapshot.state = SchedulerState::Armed;
    snapshot.next_run = next_run_at(interval);
}

fn next_run_at(interval: Duration) -> Option<NaiveDateTime> {
    chrono::Duration::from_std(interval)
        .ok()
        .map(|step| chrono::Utc::now().naive_utc() + step)
}
