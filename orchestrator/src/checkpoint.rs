use std::{
    error::Error,
    fmt::{self, Display},
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use log::{debug, info};
use machine_learning::ParameterSet;
use parameter_server::GlobalModelState;
use serde::{Deserialize, Serialize};

use crate::round::TrainingHistory;

/// Failures while persisting or restoring a checkpoint, in-memory state is never
/// touched when one of these is returned.
#[derive(Debug)]
pub enum CheckpointErr {
    Io(io::Error),
    Format(serde_json::Error),
    /// The checkpointed parameters don't fit the coordinator's model.
    SchemaMismatch(String),
    /// The model's round isn't the last round of its history.
    RoundMismatch {
        round: u64,
        history: u64,
    },
}

impl Display for CheckpointErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointErr::Io(e) => write!(f, "io error: {e}"),
            CheckpointErr::Format(e) => write!(f, "malformed checkpoint: {e}"),
            CheckpointErr::SchemaMismatch(detail) => {
                write!(f, "checkpoint doesn't match the model: {detail}")
            }
            CheckpointErr::RoundMismatch { round, history } => write!(
                f,
                "checkpoint is at round {round} but its history ends at round {history}"
            ),
        }
    }
}

impl Error for CheckpointErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CheckpointErr::Io(e) => Some(e),
            CheckpointErr::Format(e) => Some(e),
            CheckpointErr::SchemaMismatch(_) | CheckpointErr::RoundMismatch { .. } => None,
        }
    }
}

impl From<io::Error> for CheckpointErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CheckpointErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Format(value)
    }
}

/// A durable copy of the global model together with the rounds that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    parameters: ParameterSet,
    round: u64,
    history: TrainingHistory,
}

impl Checkpoint {
    /// Creates a new `Checkpoint`.
    ///
    /// # Arguments
    /// * `state` - The committed global model.
    /// * `history` - The rounds committed up to `state`.
    pub fn new(state: GlobalModelState, history: TrainingHistory) -> Self {
        let (parameters, round) = state.into_parts();

        Self {
            parameters,
            round,
            history,
        }
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// Returns the global model held by this checkpoint, ready for inference.
    pub fn global_state(&self) -> GlobalModelState {
        GlobalModelState::new(self.parameters.clone(), self.round)
    }

    pub fn into_parts(self) -> (GlobalModelState, TrainingHistory) {
        (GlobalModelState::new(self.parameters, self.round), self.history)
    }

    /// Writes the checkpoint as JSON.
    ///
    /// The content goes to a temporary sibling first and is renamed over `path` once
    /// it's fully on disk, an existing checkpoint is either kept or fully replaced.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointErr> {
        let path = path.as_ref();
        let tmp = tmp_sibling(path);

        if let Err(e) = self.write_to(&tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        fs::rename(&tmp, path).inspect_err(|_| {
            let _ = fs::remove_file(&tmp);
        })?;

        info!(round = self.round; "checkpoint saved to {}", path.display());
        Ok(())
    }

    fn write_to(&self, path: &Path) -> Result<(), CheckpointErr> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;

        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        file.sync_all()?;
        Ok(())
    }

    /// Reads a checkpoint previously written by `save`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointErr> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let checkpoint: Checkpoint = serde_json::from_reader(reader)?;

        debug!(round = checkpoint.round; "checkpoint loaded from {}", path.display());
        Ok(checkpoint)
    }
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    path.with_file_name(format!(".{name}.tmp"))
}
