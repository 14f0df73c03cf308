pub mod checkpoint;
pub mod configs;
pub mod coordinator;
pub mod error;
pub mod round;

use log::info;

pub use checkpoint::{Checkpoint, CheckpointErr};
pub use coordinator::{
    Coordinator, CoordinatorHandle, CoordinatorOptions, CoordinatorState, Evaluator,
};
pub use error::{OrchestratorError, Result};
pub use round::{DroppedParticipant, Round, RoundResult, RunReport, TrainingHistory};

use crate::configs::FederationConfig;

/// Builds the federation described by `config` and runs all of its rounds.
///
/// The final global model is checkpointed if the config names a path.
///
/// # Errors
/// Returns an `OrchestratorError` if the config can't be built or the run halts.
pub async fn train(config: &FederationConfig) -> Result<(Coordinator, RunReport)> {
    let mut coordinator = configs::build(config)?;

    let report = coordinator
        .run(config.global_rounds.get(), config.local_epochs)
        .await?;

    if let Some(path) = &config.checkpoint {
        coordinator.save_checkpoint(path)?;
    }

    info!(
        "training finished after {} rounds",
        coordinator.handle().round()
    );
    Ok((coordinator, report))
}
