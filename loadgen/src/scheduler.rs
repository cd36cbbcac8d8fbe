//! Virtual-user lifecycle.
//!
//! Every virtual user is a tokio task looping over [`Scenario::run_iteration`].
//! The scheduler only ever asks a user to stop; the user notices between
//! iterations, so a request in flight is never dropped by a ramp-down.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::scenario::Scenario;

pub type VuId = u64;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum VuState {
    Starting = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl VuState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => VuState::Starting,
            1 => VuState::Running,
            2 => VuState::Stopping,
            _ => VuState::Stopped,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, VuState::Starting | VuState::Running)
    }
}

#[derive(Debug, Clone)]
struct SharedState(Arc<AtomicU8>);

impl SharedState {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(VuState::Starting as u8)))
    }

    fn get(&self) -> VuState {
        VuState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: VuState) {
        self.0.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: VuState, to: VuState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Moves an active user to `Stopping`. Returns false if it was not active.
    fn request_stop(&self) -> bool {
        self.0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |raw| {
                VuState::from_u8(raw)
                    .is_active()
                    .then_some(VuState::Stopping as u8)
            })
            .is_ok()
    }
}

struct VirtualUser {
    id: VuId,
    state: SharedState,
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl VirtualUser {
    fn state(&self) -> VuState {
        // A task that died without reaching the end of its loop is stopped too
        if self.handle.is_finished() {
            return VuState::Stopped;
        }
        self.state.get()
    }

    fn request_stop(&self) -> bool {
        let stopped = self.state.request_stop();
        self.stop.cancel();
        stopped
    }
}

/// What one control tick did.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Reconcile {
    pub started: usize,
    pub stopping: usize,
}

pub struct VirtualUserScheduler {
    scenario: Scenario,
    pause: Duration,
    units: Vec<VirtualUser>,
    next_id: VuId,
}

impl VirtualUserScheduler {
    #[must_use]
    pub fn new(scenario: Scenario, pause: Duration) -> Self {
        Self {
            scenario,
            pause,
            units: Vec::new(),
            next_id: 0,
        }
    }

    /// Users that are `Starting` or `Running`.
    #[must_use]
    pub fn active(&self) -> usize {
        self.units.iter().filter(|u| u.state().is_active()).count()
    }

    /// Every tracked user, oldest first. Stopped users stay listed until the
    /// next [`reconcile`](Self::reconcile).
    #[must_use]
    pub fn states(&self) -> Vec<(VuId, VuState)> {
        self.units.iter().map(|u| (u.id, u.state())).collect()
    }

    /// Brings the number of active users to `target`. New users are spawned in
    /// `Starting`; surplus users, newest first, are moved to `Stopping`.
    pub fn reconcile(&mut self, target: usize) -> Reconcile {
        self.units.retain(|u| u.state() != VuState::Stopped);
        let active = self.active();
        let mut outcome = Reconcile::default();
        if target > active {
            for _ in active..target {
                self.spawn_unit();
                outcome.started += 1;
            }
        } else if target < active {
            let surplus = active - target;
            for unit in self.units.iter().rev() {
                if outcome.stopping == surplus {
                    break;
                }
                if unit.request_stop() {
                    debug!(vu = unit.id, "virtual user stopping");
                    outcome.stopping += 1;
                }
            }
        }
        if outcome != Reconcile::default() {
            debug!(
                target,
                active,
                started = outcome.started,
                stopping = outcome.stopping,
                "reconciled virtual users"
            );
        }
        outcome
    }

    /// Asks every user to stop and waits until each has finished its current
    /// iteration.
    pub async fn shutdown(&mut self) {
        for unit in &self.units {
            unit.request_stop();
        }
        for unit in self.units.drain(..) {
            if let Err(e) = unit.handle.await {
                tracing::warn!(vu = unit.id, error = %e, "virtual user task failed");
            }
        }
    }

    fn spawn_unit(&mut self) {
        let id = self.next_id;
        self.next_id += 1;
        let state = SharedState::new();
        let stop = CancellationToken::new();
        let handle = tokio::spawn(run_unit(
            id,
            self.scenario.clone(),
            self.pause,
            state.clone(),
            stop.clone(),
        ));
        self.units.push(VirtualUser {
            id,
            state,
            stop,
            handle,
        });
    }
}

impl Drop for VirtualUserScheduler {
    /// Users still tracked are asked to stop; each finishes its current
    /// iteration on its own task.
    fn drop(&mut self) {
        for unit in &self.units {
            unit.request_stop();
        }
    }
}

async fn run_unit(
    id: VuId,
    scenario: Scenario,
    pause: Duration,
    state: SharedState,
    stop: CancellationToken,
) {
    if state.transition(VuState::Starting, VuState::Running) {
        debug!(vu = id, "virtual user running");
        while state.get() == VuState::Running {
            // Not raced against `stop`: an iteration always runs to the end
            scenario.run_iteration().await;
            tokio::select! {
                () = tokio::time::sleep(pause) => {}
                () = stop.cancelled() => {}
            }
        }
    }
    state.set(VuState::Stopped);
    debug!(vu = id, "virtual user stopped");
}
