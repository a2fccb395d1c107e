use super::{Candidates, Strategy, StrategyKind};
use rand::Rng;

/// Uniformly random candidate per attempt
pub struct Random {
    candidates: Candidates,
}

impl Random {
    pub fn new(candidates: Candidates) -> Self {
        Random { candidates }
    }
}

impl Strategy for Random {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Random
    }

    fn candidates(&self) -> &Candidates {
        &self.candidates
    }

    fn choose(&self) -> Option<usize> {
        match self.candidates.len() {
            0 => None,
            n => Some(rand::thread_rng().gen_range(0..n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tests::candidates;

    #[test]
    fn test_visits_every_candidate() {
        let strategy = Random::new(candidates(3));
        let mut seen = [false; 3];
        for _ in 0..500 {
            seen[strategy.choose().unwrap()] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    #[test]
    fn test_single_candidate() {
        let strategy = Random::new(candidates(1));
        assert_eq!(strategy.choose(), Some(0));
    }
}
