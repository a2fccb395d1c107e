use super::{Candidates, Strategy, StrategyKind};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Round-robin over the candidates
///
/// The counter is a single atomic, so concurrent callers each get a
/// distinct slot and the distribution stays fair without a lock.
pub struct Rotate {
    candidates: Candidates,
    counter: AtomicUsize,
}

impl Rotate {
    pub fn new(candidates: Candidates) -> Self {
        Rotate {
            candidates,
            counter: AtomicUsize::new(0),
        }
    }

    /// Index the next `choose` will return.
    pub fn cursor(&self) -> usize {
        match self.candidates.len() {
            0 => 0,
            n => self.counter.load(Ordering::Relaxed) % n,
        }
    }
}

impl Strategy for Rotate {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Rotate
    }

    fn candidates(&self) -> &Candidates {
        &self.candidates
    }

    fn choose(&self) -> Option<usize> {
        match self.candidates.len() {
            0 => None,
            n => Some(self.counter.fetch_add(1, Ordering::Relaxed) % n),
        }
    }
}
