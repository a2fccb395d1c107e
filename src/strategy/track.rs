use super::{Candidates, DialOutcome, Strategy, StrategyKind};
use parking_lot::Mutex;
use tracing::trace;

/// Per-candidate success counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackStats {
    pub attempts: u64,
    pub successes: u64,
}

impl TrackStats {
    /// Whether `self` has a strictly higher success ratio than `other`.
    ///
    /// Compared by cross-multiplication so no precision is lost.
    fn beats(&self, other: &TrackStats) -> bool {
        u128::from(self.successes) * u128::from(other.attempts)
            > u128::from(other.successes) * u128::from(self.attempts)
    }
}

/// Prefers the candidate with the best observed success ratio
///
/// Candidates that were never tried go first, lowest index first. Ties
/// keep the lower index.
pub struct Track {
    candidates: Candidates,
    stats: Mutex<Vec<TrackStats>>,
}

impl Track {
    pub fn new(candidates: Candidates) -> Self {
        let stats = vec![TrackStats::default(); candidates.len()];
        Track {
            candidates,
            stats: Mutex::new(stats),
        }
    }

    /// Copy of the current counters, indexed like the candidates.
    pub fn snapshot(&self) -> Vec<TrackStats> {
        self.stats.lock().clone()
    }
}

impl Strategy for Track {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Track
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
                Some(b) if !candidate.beats(&stats[b]) => {}
                _ => best = Some(index),
            }
        }
        best
    }

    fn report(&self, index: usize, outcome: &DialOutcome) {
        let mut stats = self.stats.lock();
        if let Some(entry) = stats.get_mut(index) {
            entry.attempts += 1;
            if outcome.success {
                entry.successes += 1;
            }
            trace!(
                "[track] candidate {} now {}/{}",
                index,
                entry.successes,
                entry.attempts
            );
        }
    }
}
