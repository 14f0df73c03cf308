use std::{collections::BTreeMap, time::SystemTime};

use serde::{Deserialize, Serialize};

/// The record of one committed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub number: u64,
    pub participants: Vec<usize>,
    pub dropped: Vec<usize>,
    /// Mean of every epoch loss reported by the surviving participants.
    pub train_loss: Option<f64>,
    /// Loss of the aggregated model over the held-out set, if one was evaluated.
    pub eval_loss: Option<f64>,
    pub client_losses: BTreeMap<usize, Vec<f64>>,
    pub timestamp: SystemTime,
}

impl Round {
    /// Computes the mean over all the per-epoch losses of the round.
    pub(crate) fn mean_loss(client_losses: &BTreeMap<usize, Vec<f64>>) -> Option<f64> {
        let (sum, n) = client_losses
            .values()
            .flatten()
            .fold((0., 0usize), |(sum, n), loss| (sum + loss, n + 1));

        (n > 0).then(|| sum / n as f64)
    }
}

/// Append-only log of committed rounds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingHistory {
    rounds: Vec<Round>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, round: Round) {
        self.rounds.push(round);
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn last(&self) -> Option<&Round> {
        self.rounds.last()
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Round> {
        self.rounds.iter()
    }

    /// The training loss of every round, in order.
    pub fn train_losses(&self) -> Vec<Option<f64>> {
        self.rounds.iter().map(|r| r.train_loss).collect()
    }
}

/// A participant that didn't make it into a round and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedParticipant {
    pub participant: usize,
    pub reason: String,
}

/// The outcome of a successful `start_round`.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub round: Round,
    pub dropped: Vec<DroppedParticipant>,
}

/// The outcome of a `run`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub rounds: Vec<RoundResult>,
    /// Whether the run ended early because a stop was requested.
    pub stopped: bool,
}

impl RunReport {
    /// Returns the number of the last round committed by this run.
    pub fn last_round(&self) -> Option<u64> {
        self.rounds.last().map(|r| r.round.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_loss_spans_every_epoch() {
        let losses = BTreeMap::from([(0, vec![1., 3.]), (4, vec![5.])]);
        assert_eq!(Round::mean_loss(&losses), Some(3.));
    }

    #[test]
    fn mean_loss_of_nothing() {
        assert_eq!(Round::mean_loss(&BTreeMap::new()), None);
        assert_eq!(Round::mean_loss(&BTreeMap::from([(1, vec![])])), None);
    }
}
