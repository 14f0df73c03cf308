use std::{error::Error, fmt};

use machine_learning::MlErr;

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Local training failures of a single participant.
///
/// These never abort a round, the coordinator drops the participant and carries on
/// with the survivors.
#[derive(Debug)]
pub enum WorkerErr {
    /// The global parameters don't fit the participant's model.
    ShapeMismatch(MlErr),
    Training(MlErr),
    EmptyPartition,
    Panicked(String),
    DeadlineExceeded,
    /// Still training a round it was dropped from.
    Busy,
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::ShapeMismatch(e) => write!(f, "can't load global parameters: {e}"),
            WorkerErr::Training(e) => write!(f, "local training failed: {e}"),
            WorkerErr::EmptyPartition => f.write_str("participant has no samples to train on"),
            WorkerErr::Panicked(msg) => write!(f, "local training panicked: {msg}"),
            WorkerErr::DeadlineExceeded => f.write_str("round deadline exceeded"),
            WorkerErr::Busy => f.write_str("participant is still busy with an earlier round"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::ShapeMismatch(e) | WorkerErr::Training(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for WorkerErr {
    fn from(value: MlErr) -> Self {
        match value {
            MlErr::ShapeMismatch { .. } => Self::ShapeMismatch(value),
            MlErr::EmptyPartition => Self::EmptyPartition,
            other => Self::Training(other),
        }
    }
}

/// Failures while splitting a data source among participants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionErr {
    EmptyDataset,
    NoParticipants,
    /// Grouped partitioning found a sample without a grouping key.
    MissingGroupKey {
        index: usize,
    },
}

impl fmt::Display for PartitionErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionErr::EmptyDataset => f.write_str("can't partition an empty dataset"),
            PartitionErr::NoParticipants => f.write_str("can't partition among zero participants"),
            PartitionErr::MissingGroupKey { index } => {
                write!(f, "sample {index} has no grouping key")
            }
        }
    }
}

impl Error for PartitionErr {}
