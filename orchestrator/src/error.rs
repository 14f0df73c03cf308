use std::{fmt, io};

use machine_learning::MlErr;
use parameter_server::AggregationErr;
use worker::PartitionErr;

use crate::{checkpoint::CheckpointErr, coordinator::CoordinatorState};

/// The orchestrator's result type.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// All errors that can occur in the orchestrator.
#[derive(Debug)]
pub enum OrchestratorError {
    /// Invalid configuration, caught before anything is built.
    InvalidConfig(String),
    /// The coordinator is in the middle of another operation.
    Busy(CoordinatorState),
    /// A previous run halted, the coordinator needs a `reset` first.
    Failed,
    /// A run stopped because a round couldn't be aggregated.
    Halted {
        last_round: u64,
        source: AggregationErr,
    },
    Aggregation(AggregationErr),
    Partition(PartitionErr),
    Checkpoint(CheckpointErr),
    Model(MlErr),
    /// A blocking task of the round was lost.
    Task(String),
    Io(io::Error),
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Busy(state) => write!(f, "coordinator is busy ({state})"),
            Self::Failed => f.write_str("coordinator is failed, reset it first"),
            Self::Halted { last_round, source } => {
                write!(f, "run halted after round {last_round}: {source}")
            }
            Self::Aggregation(e) => write!(f, "aggregation error: {e}"),
            Self::Partition(e) => write!(f, "partition error: {e}"),
            Self::Checkpoint(e) => write!(f, "checkpoint error: {e}"),
            Self::Model(e) => write!(f, "model error: {e}"),
            Self::Task(msg) => write!(f, "task error: {msg}"),
            Self::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl std::error::Error for OrchestratorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Halted { source, .. } => Some(source),
            Self::Aggregation(e) => Some(e),
            Self::Partition(e) => Some(e),
            Self::Checkpoint(e) => Some(e),
            Self::Model(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AggregationErr> for OrchestratorError {
    fn from(e: AggregationErr) -> Self {
        Self::Aggregation(e)
    }
}

impl From<PartitionErr> for OrchestratorError {
    fn from(e: PartitionErr) -> Self {
        Self::Partition(e)
    }
}

impl From<CheckpointErr> for OrchestratorError {
    fn from(e: CheckpointErr) -> Self {
        Self::Checkpoint(e)
    }
}

impl From<MlErr> for OrchestratorError {
    fn from(e: MlErr) -> Self {
        Self::Model(e)
    }
}

impl From<io::Error> for OrchestratorError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}
