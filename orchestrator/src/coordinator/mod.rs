mod state;

use std::{
    any::Any,
    collections::BTreeMap,
    num::NonZeroUsize,
    path::Path,
    sync::Arc,
    time::{Duration, SystemTime},
};

use futures::future::join_all;
use log::{debug, error, info, warn};
use machine_learning::{ClientUpdate, Dataset, MlErr, ModelAdapter, ParameterSet};
use parameter_server::{AggregationErr, Aggregator, ParameterStore};
use parking_lot::Mutex;
use tokio::{
    task,
    time::{self, Instant},
};
use tokio_util::sync::CancellationToken;
use worker::{ClientTrainer, WorkerErr};

pub use state::{CoordinatorHandle, CoordinatorState};

use self::state::Shared;
use crate::{
    checkpoint::{Checkpoint, CheckpointErr},
    error::{OrchestratorError, Result},
    round::{DroppedParticipant, Round, RoundResult, RunReport, TrainingHistory},
};

/// Per-round settings of a `Coordinator`.
#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    pub local_epochs: NonZeroUsize,
    /// Participants that haven't reported by then are dropped from the round.
    pub round_deadline: Option<Duration>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            local_epochs: NonZeroUsize::MIN,
            round_deadline: None,
        }
    }
}

/// Scores aggregated models over a held-out dataset.
pub struct Evaluator {
    adapter: Box<dyn ModelAdapter>,
    dataset: Arc<Dataset>,
}

impl Evaluator {
    pub fn new(adapter: Box<dyn ModelAdapter>, dataset: Arc<Dataset>) -> Self {
        Self { adapter, dataset }
    }

    fn evaluate(&mut self, params: ParameterSet) -> std::result::Result<f64, MlErr> {
        self.adapter.load(params)?;
        self.adapter.evaluate(&self.dataset)
    }
}

struct Participant {
    id: usize,
    samples: usize,
    trainer: Arc<Mutex<ClientTrainer>>,
}

/// Puts the shared state back to `Idle` once a round is over, however it ended. A
/// dropped round future never leaves the coordinator stuck mid-round.
struct RoundGuard<'a> {
    shared: &'a Shared,
}

impl Drop for RoundGuard<'_> {
    fn drop(&mut self) {
        self.shared.set_state(CoordinatorState::Idle);
    }
}

/// Drives federated rounds: hands the global model to every participant, collects
/// their updates, aggregates them and commits the result.
pub struct Coordinator {
    aggregator: Aggregator,
    participants: Vec<Participant>,
    evaluator: Option<Arc<Mutex<Evaluator>>>,
    options: CoordinatorOptions,
    shared: Arc<Shared>,
}

impl Coordinator {
    /// Creates a new `Coordinator`.
    ///
    /// # Arguments
    /// * `store` - The global model, its schema is the one every round must follow.
    /// * `trainers` - The participants, identified by their own ids.
    /// * `options` - Per-round settings.
    pub fn new(
        store: ParameterStore,
        trainers: Vec<ClientTrainer>,
        options: CoordinatorOptions,
    ) -> Self {
        let mut participants: Vec<Participant> = trainers
            .into_iter()
            .map(|trainer| Participant {
                id: trainer.id(),
                samples: trainer.partition().len(),
                trainer: Arc::new(Mutex::new(trainer)),
            })
            .collect();

        participants.sort_by_key(|p| p.id);

        Self {
            aggregator: Aggregator::new(store.clone()),
            participants,
            evaluator: None,
            options,
            shared: Arc::new(Shared::new(store, TrainingHistory::new())),
        }
    }

    /// Evaluates every aggregated model before committing it.
    pub fn with_evaluator(mut self, evaluator: Evaluator) -> Self {
        self.evaluator = Some(Arc::new(Mutex::new(evaluator)));
        self
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.shared.state.lock()
    }

    pub fn options(&self) -> CoordinatorOptions {
        self.options
    }

    pub fn participants(&self) -> usize {
        self.participants.len()
    }

    pub fn get_history(&self) -> TrainingHistory {
        self.shared.history.read().clone()
    }

    pub fn get_global_parameters(&self) -> ParameterSet {
        self.shared.store.snapshot()
    }

    /// Returns the epoch losses `participant` reported in the rounds that used its
    /// updates, waiting for it if it's still training.
    pub fn client_history(&self, participant: usize) -> Option<Vec<f64>> {
        self.participants
            .iter()
            .find(|p| p.id == participant)
            .map(|p| p.trainer.lock().history().to_vec())
    }

    /// Runs a single round.
    ///
    /// Failing participants are dropped and the round carries on with the rest. If
    /// nobody survives, or the updates can't be aggregated, the global model and the
    /// history stay exactly as they were.
    ///
    /// # Returns
    /// The committed round, or an error with the coordinator back in `Idle`.
    pub async fn start_round(&mut self) -> Result<RoundResult> {
        self.begin()?;
        let _guard = RoundGuard {
            shared: &self.shared,
        };

        let number = self.shared.store.round() + 1;
        info!(round = number; "round started");

        let global = self.aggregator.snapshot();
        let deadline = self.options.round_deadline.map(|d| Instant::now() + d);
        let (updates, dropped) = self.train_participants(number, global, deadline).await;

        if updates.is_empty() {
            error!(round = number; "every participant failed, nothing to aggregate");
            return Err(AggregationErr::NoSuccessfulParticipants.into());
        }

        self.shared.set_state(CoordinatorState::Aggregating);
        let (updates, params) = self.aggregate(updates).await?;
        let params = params.inspect_err(|e| error!(round = number; "aggregation failed: {e}"))?;

        let eval_loss = match &self.evaluator {
            Some(evaluator) => {
                self.shared.set_state(CoordinatorState::Evaluating);
                evaluate(evaluator, number, params.clone()).await
            }
            None => None,
        };

        let client_losses: BTreeMap<usize, Vec<f64>> = updates
            .iter()
            .map(|u| (u.participant(), u.losses().to_vec()))
            .collect();

        let mut round = Round {
            number,
            participants: updates.iter().map(ClientUpdate::participant).collect(),
            dropped: dropped.iter().map(|d| d.participant).collect(),
            train_loss: Round::mean_loss(&client_losses),
            eval_loss,
            client_losses,
            timestamp: SystemTime::now(),
        };

        {
            let mut history = self.shared.history.write();
            round.number = self.aggregator.commit(params);
            history.push(round.clone());
        }

        info!(
            round = round.number,
            survivors = round.participants.len(),
            dropped = round.dropped.len();
            "round committed: train_loss={:?} eval_loss={:?}",
            round.train_loss,
            round.eval_loss
        );

        Ok(RoundResult { round, dropped })
    }

    /// Runs rounds until `global_rounds` are committed or a stop is requested.
    ///
    /// A stop is consumed by the run that honors it, the next `run` starts afresh.
    ///
    /// # Returns
    /// The committed rounds, or `Halted` naming the last committed round if one of them
    /// couldn't be aggregated. Updates that can't be combined leave the coordinator
    /// `Failed`, a round without survivors leaves it `Idle`.
    pub async fn run(
        &mut self,
        global_rounds: usize,
        local_epochs: NonZeroUsize,
    ) -> Result<RunReport> {
        self.options.local_epochs = local_epochs;
        let mut report = RunReport::default();

        info!("running {global_rounds} rounds of {local_epochs} local epochs");

        for _ in 0..global_rounds {
            if self.take_stop() {
                info!("stop requested, leaving the run");
                report.stopped = true;
                break;
            }

            match self.start_round().await {
                Ok(result) => report.rounds.push(result),
                Err(OrchestratorError::Aggregation(source)) => {
                    if !matches!(source, AggregationErr::NoSuccessfulParticipants) {
                        self.shared.set_state(CoordinatorState::Failed);
                    }

                    let last_round = self.shared.store.round();
                    error!("run halted after round {last_round}: {source}");
                    return Err(OrchestratorError::Halted { last_round, source });
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Clears a pending stop request, returning whether there was one.
    fn take_stop(&self) -> bool {
        let mut cancel = self.shared.cancel.lock();
        if !cancel.is_cancelled() {
            return false;
        }

        *cancel = CancellationToken::new();
        true
    }

    /// Leaves the `Failed` state and clears any pending stop request.
    pub fn reset(&mut self) {
        let mut state = self.shared.state.lock();
        if *state == CoordinatorState::Failed {
            info!("coordinator reset");
        }

        *state = CoordinatorState::Idle;
        *self.shared.cancel.lock() = CancellationToken::new();
    }

    /// Persists the global model and its history.
    pub fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        self.handle().checkpoint().save(path)?;
        Ok(())
    }

    /// Replaces the global model and history with the ones of `checkpoint`.
    ///
    /// # Returns
    /// A `SchemaMismatch` if the checkpoint belongs to a different model, a
    /// `RoundMismatch` if its round and history disagree, or an error if the coordinator
    /// isn't idle. Nothing changes in any of these cases.
    pub fn restore(&mut self, checkpoint: Checkpoint) -> Result<()> {
        match self.state() {
            CoordinatorState::Idle => {}
            CoordinatorState::Failed => return Err(OrchestratorError::Failed),
            other => return Err(OrchestratorError::Busy(other)),
        }

        let schema = self.shared.store.schema();
        if let Some(detail) = schema.diff(&checkpoint.parameters().schema()) {
            return Err(CheckpointErr::SchemaMismatch(detail).into());
        }

        let last = checkpoint.history().last().map_or(0, |r| r.number);
        if last != checkpoint.round() {
            let round = checkpoint.round();
            return Err(CheckpointErr::RoundMismatch {
                round,
                history: last,
            }
            .into());
        }

        let (global, restored) = checkpoint.into_parts();
        let round = global.round();

        let mut history = self.shared.history.write();
        self.shared.store.restore(global);
        *history = restored;

        info!(round = round; "restored global model from checkpoint");
        Ok(())
    }

    fn begin(&self) -> Result<()> {
        let mut state = self.shared.state.lock();

        match *state {
            CoordinatorState::Idle => {
                *state = CoordinatorState::RoundActive;
                Ok(())
            }
            CoordinatorState::Failed => Err(OrchestratorError::Failed),
            other => Err(OrchestratorError::Busy(other)),
        }
    }

    /// Trains every participant holding samples on its own blocking thread.
    ///
    /// A participant still busy with a round it was dropped from is dropped again right
    /// away instead of queueing behind its own lock.
    ///
    /// # Returns
    /// The updates sorted by participant id, and the participants that were dropped.
    async fn train_participants(
        &self,
        round: u64,
        global: ParameterSet,
        deadline: Option<Instant>,
    ) -> (Vec<ClientUpdate>, Vec<DroppedParticipant>) {
        let epochs = self.options.local_epochs;

        let tasks = self.participants.iter().filter(|p| p.samples > 0).map(|p| {
            let id = p.id;
            let trainer = Arc::clone(&p.trainer);
            let params = global.clone();

            let handle = task::spawn_blocking({
                let trainer = Arc::clone(&trainer);
                move || match trainer.try_lock() {
                    Some(mut trainer) => trainer.train_round(params, epochs),
                    None => Err(WorkerErr::Busy),
                }
            });

            async move {
                let joined = match deadline {
                    Some(deadline) => match time::timeout_at(deadline, handle).await {
                        Ok(joined) => joined,
                        Err(_) => return (id, Err(WorkerErr::DeadlineExceeded)),
                    },
                    None => handle.await,
                };

                let outcome =
                    joined.unwrap_or_else(|e| Err(WorkerErr::Panicked(join_reason(e))));
                if let Ok(update) = &outcome {
                    trainer.lock().record(update);
                }

                (id, outcome)
            }
        });

        let mut updates = Vec::new();
        let mut dropped = Vec::new();

        for (participant, outcome) in join_all(tasks).await {
            match outcome {
                Ok(update) => {
                    debug!(round = round, participant = participant; "update received");
                    updates.push(update);
                }
                Err(e) => {
                    warn!(round = round, participant = participant; "participant dropped: {e}");
                    dropped.push(DroppedParticipant {
                        participant,
                        reason: e.to_string(),
                    });
                }
            }
        }

        updates.sort_by_key(ClientUpdate::participant);
        (updates, dropped)
    }

    /// Aggregates off the async runtime, handing the updates back for the round record.
    async fn aggregate(
        &self,
        updates: Vec<ClientUpdate>,
    ) -> Result<(Vec<ClientUpdate>, parameter_server::aggregation::Result<ParameterSet>)> {
        let aggregator = self.aggregator.clone();

        task::spawn_blocking(move || {
            let params = aggregator.aggregate(&updates);
            (updates, params)
        })
        .await
        .map_err(|e| OrchestratorError::Task(join_reason(e)))
    }
}

/// Scores the aggregated parameters, a failure only costs the round its `eval_loss`.
async fn evaluate(
    evaluator: &Arc<Mutex<Evaluator>>,
    round: u64,
    params: ParameterSet,
) -> Option<f64> {
    let evaluator = Arc::clone(evaluator);
    let joined = task::spawn_blocking(move || evaluator.lock().evaluate(params)).await;

    match joined {
        Ok(Ok(loss)) => Some(loss),
        Ok(Err(e)) => {
            warn!(round = round; "evaluation skipped: {e}");
            None
        }
        Err(e) => {
            warn!(round = round; "evaluation skipped: {}", join_reason(e));
            None
        }
    }
}

fn join_reason(e: task::JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }

    panic_message(e.into_panic())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        return msg.to_string();
    }

    match payload.downcast::<String>() {
        Ok(msg) => *msg,
        Err(_) => "unknown panic".to_string(),
    }
}
