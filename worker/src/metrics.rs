use std::time::Duration;

/// Counters accumulated by a `ClientTrainer` over its whole lifetime.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TrainerMetrics {
    pub train_time: Duration,

    /// Rounds whose update was recorded, late updates only count as work done.
    pub rounds: u64,
    pub epochs: u64,
    pub samples: u64,
    pub failures: u64,
}

impl TrainerMetrics {
    #[inline]
    pub fn bump_round(&mut self) {
        self.rounds += 1;
    }

    #[inline]
    pub fn bump_failure(&mut self) {
        self.failures += 1;
    }

    #[inline]
    pub fn add_epochs(&mut self, n: usize) {
        self.epochs += n as u64;
    }

    #[inline]
    pub fn add_samples(&mut self, n: usize) {
        self.samples += n as u64;
    }

    #[inline]
    pub fn add_time(&mut self, elapsed: Duration) {
        self.train_time += elapsed;
    }
}
