use std::fmt;

use machine_learning::ParameterSet;
use parameter_server::ParameterStore;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::{
    checkpoint::Checkpoint,
    round::{Round, TrainingHistory},
};

/// Where the coordinator is in its round lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    RoundActive,
    Aggregating,
    Evaluating,
    /// A run halted on an aggregation error, only `reset` leaves this state.
    Failed,
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CoordinatorState::Idle => "idle",
            CoordinatorState::RoundActive => "round active",
            CoordinatorState::Aggregating => "aggregating",
            CoordinatorState::Evaluating => "evaluating",
            CoordinatorState::Failed => "failed",
        };

        f.write_str(s)
    }
}

/// State shared between a coordinator and its handles.
///
/// Lock order is `history` then the store, commits hold the history write lock
/// for their whole duration so readers never observe half a round.
pub(super) struct Shared {
    pub(super) state: Mutex<CoordinatorState>,
    pub(super) history: RwLock<TrainingHistory>,
    pub(super) store: ParameterStore,
    pub(super) cancel: Mutex<CancellationToken>,
}

impl Shared {
    pub(super) fn new(store: ParameterStore, history: TrainingHistory) -> Self {
        Self {
            state: Mutex::new(CoordinatorState::Idle),
            history: RwLock::new(history),
            store,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub(super) fn set_state(&self, state: CoordinatorState) {
        *self.state.lock() = state;
    }
}

/// A cheap, cloneable view of a running coordinator.
///
/// It only ever reports committed rounds and can ask the coordinator to stop
/// between rounds.
#[derive(Clone)]
pub struct CoordinatorHandle {
    pub(super) shared: std::sync::Arc<Shared>,
}

impl CoordinatorHandle {
    pub fn state(&self) -> CoordinatorState {
        *self.shared.state.lock()
    }

    /// Returns the last committed round, `0` before the first one.
    pub fn round(&self) -> u64 {
        let _history = self.shared.history.read();
        self.shared.store.round()
    }

    pub fn history(&self) -> TrainingHistory {
        self.shared.history.read().clone()
    }

    pub fn last_round(&self) -> Option<Round> {
        self.shared.history.read().last().cloned()
    }

    pub fn global_parameters(&self) -> ParameterSet {
        self.shared.store.snapshot()
    }

    /// Returns the global model and its history as of the same committed round.
    pub fn checkpoint(&self) -> Checkpoint {
        let history = self.shared.history.read();
        Checkpoint::new(self.shared.store.state(), history.clone())
    }

    /// Asks the coordinator to stop before its next round.
    ///
    /// The request stays pending until a run honors it or the coordinator is reset.
    pub fn stop(&self) {
        self.shared.cancel.lock().cancel();
    }

    /// Whether a stop is pending.
    pub fn is_stopped(&self) -> bool {
        self.shared.cancel.lock().is_cancelled()
    }

    /// Completes once a stop is pending or gets requested.
    pub async fn stopped(&self) {
        let token = self.shared.cancel.lock().clone();
        token.cancelled().await;
    }
}
