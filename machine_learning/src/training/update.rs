use crate::params::ParameterSet;

/// The outcome of one participant's local training in a round.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientUpdate {
    participant: usize,
    params: ParameterSet,
    weight: f64,
    losses: Vec<f64>,
}

impl ClientUpdate {
    /// Creates a new `ClientUpdate`.
    ///
    /// # Arguments
    /// * `participant` - The id of the participant that trained.
    /// * `params` - The locally trained parameters.
    /// * `weight` - The participant's influence in the average, its amount of local samples.
    /// * `losses` - The mean loss of every local epoch.
    pub fn new(participant: usize, params: ParameterSet, weight: f64, losses: Vec<f64>) -> Self {
        Self {
            participant,
            params,
            weight,
            losses,
        }
    }

    pub fn participant(&self) -> usize {
        self.participant
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    /// The loss of the last local epoch.
    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }

    pub fn into_params(self) -> ParameterSet {
        self.params
    }
}
