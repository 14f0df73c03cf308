use std::{collections::HashMap, num::NonZeroUsize};

use log::{debug, warn};
use machine_learning::DataSource;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::shard::block_range;
use crate::error::PartitionErr;

/// How samples are spread among participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Seeded shuffle of every index, then balanced contiguous blocks.
    #[default]
    Iid,
    /// Whole groups, keyed by the source's grouping key, dealt round-robin in order of
    /// first appearance.
    Grouped {
        /// At most this many groups per participant, the rest is left out of training.
        groups_per_participant: Option<NonZeroUsize>,
    },
}

/// The per-participant index sets produced by a `Partitioner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partitions {
    parts: Vec<Vec<usize>>,
    unassigned_groups: Vec<String>,
}

impl Partitions {
    /// Returns the amount of participants.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, participant: usize) -> Option<&[usize]> {
        self.parts.get(participant).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.parts.iter().map(Vec::as_slice)
    }

    /// Returns the participants that were assigned no samples.
    pub fn empty_participants(&self) -> Vec<usize> {
        self.parts
            .iter()
            .enumerate()
            .filter(|(_, part)| part.is_empty())
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the groups that didn't fit under the per-participant group cap.
    pub fn unassigned_groups(&self) -> &[String] {
        &self.unassigned_groups
    }

    pub fn into_inner(self) -> Vec<Vec<usize>> {
        self.parts
    }
}

/// Splits a data source into one index set per participant.
#[derive(Debug, Clone, Copy)]
pub struct Partitioner {
    strategy: Strategy,
    seed: u64,
}

impl Partitioner {
    /// Creates a new `Partitioner`.
    ///
    /// # Arguments
    /// * `strategy` - How samples are spread.
    /// * `seed` - Seeds the shuffle of the `Iid` strategy, equal seeds give equal splits.
    pub fn new(strategy: Strategy, seed: u64) -> Self {
        Self { strategy, seed }
    }

    /// Partitions `source` among `participants`.
    ///
    /// # Returns
    /// The index sets, or an error if the source is empty, there are no participants or
    /// a sample lacks its grouping key under the `Grouped` strategy.
    pub fn partition<S: DataSource + ?Sized>(
        &self,
        source: &S,
        participants: usize,
    ) -> Result<Partitions, PartitionErr> {
        if source.is_empty() {
            return Err(PartitionErr::EmptyDataset);
        }

        if participants == 0 {
            return Err(PartitionErr::NoParticipants);
        }

        let partitions = match self.strategy {
            Strategy::Iid => self.iid(source.len(), participants),
            Strategy::Grouped {
                groups_per_participant,
            } => grouped(source, participants, groups_per_participant)?,
        };

        let empty = partitions.empty_participants();
        if !empty.is_empty() {
            warn!("participants {empty:?} were assigned no samples");
        }

        if !partitions.unassigned_groups.is_empty() {
            warn!(
                "groups {:?} exceed the group cap and are left out",
                partitions.unassigned_groups
            );
        }

        Ok(partitions)
    }

    fn iid(&self, total: usize, participants: usize) -> Partitions {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut indices: Vec<usize> = (0..total).collect();
        indices.shuffle(&mut rng);

        let parts = (0..participants)
            .map(|i| indices[block_range(total, i, participants)].to_vec())
            .collect();

        Partitions {
            parts,
            unassigned_groups: Vec::new(),
        }
    }
}

fn grouped<S: DataSource + ?Sized>(
    source: &S,
    participants: usize,
    cap: Option<NonZeroUsize>,
) -> Result<Partitions, PartitionErr> {
    let mut order: Vec<(&str, Vec<usize>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    for index in 0..source.len() {
        let key = source
            .group_key(index)
            .ok_or(PartitionErr::MissingGroupKey { index })?;

        let pos = *positions.entry(key).or_insert_with(|| {
            order.push((key, Vec::new()));
            order.len() - 1
        });

        order[pos].1.push(index);
    }

    debug!("found {} groups for {participants} participants", order.len());

    let mut parts = vec![Vec::new(); participants];
    let mut unassigned_groups = Vec::new();

    for (g, (key, indices)) in order.into_iter().enumerate() {
        let turn = g / participants;

        match cap {
            Some(cap) if turn >= cap.get() => unassigned_groups.push(key.to_string()),
            _ => parts[g % participants].extend(indices),
        }
    }

    Ok(Partitions {
        parts,
        unassigned_groups,
    })
}
