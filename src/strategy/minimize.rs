use super::{Candidates, DialOutcome, Strategy, StrategyKind};
use parking_lot::Mutex;
use std::time::Duration;
use tracing::trace;

/// Minimum cost charged for a failed dial.
///
/// A candidate that fails fast must not look cheaper than one that
/// connects slowly.
pub const FAILURE_PENALTY: Duration = Duration::from_secs(60);

/// Running mean of dial durations for one candidate
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub attempts: u64,
    mean_secs: f64,
}

impl LatencyStats {
    pub fn mean(&self) -> Duration {
        Duration::from_secs_f64(self.mean_secs)
    }

    fn record(&mut self, sample: Duration) {
        self.attempts += 1;
        let x = sample.as_secs_f64();
        self.mean_secs += (x - self.mean_secs) / self.attempts as f64;
    }
}

/// Prefers the candidate with the lowest mean dial duration
///
/// Candidates that were never tried go first, lowest index first. Ties
/// keep the lower index.
pub struct MinimizeDialDuration {
    candidates: Candidates,
    stats: Mutex<Vec<LatencyStats>>,
}

impl MinimizeDialDuration {
    pub fn new(candidates: Candidates) -> Self {
        let stats = vec![LatencyStats::default(); candidates.len()];
        MinimizeDialDuration {
            candidates,
            stats: Mutex::new(stats),
        }
    }

    pub fn snapshot(&self) -> Vec<LatencyStats> {
        self.stats.lock().clone()
    }
}

impl Strategy for MinimizeDialDuration {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MinimizeDialDuration
    }

    fn candidates(&self) -> &Candidates {
        &self.candidates
    }

    fn choose(&self) -> Option<usize> {
        let stats = self.stats.lock();
        if let Some(untried) = stats.iter().position(|s| s.attempts == 0) {
            return Some(untried);
        }

        let mut best: Option<usize> = None;
        for (index, candidate) in stats.iter().enumerate() {
            match best {
                Some(b) if candidate.mean_secs >= stats[b].mean_secs => {}
                _ => best = Some(index),
            }
        }
        best
    }

    fn report(&self, index: usize, outcome: &DialOutcome) {
        let cost = if outcome.success {
            outcome.elapsed
        } else {
            outcome.elapsed.max(FAILURE_PENALTY)
        };

        let mut stats = self.stats.lock();
        if let Some(entry) = stats.get_mut(index) {
            entry.record(cost);
            trace!("[minimize] candidate {} mean {:?}", index, entry.mean());
        }
    }
}
