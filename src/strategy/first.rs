use super::{Candidates, Strategy, StrategyKind};

/// Always the first candidate
pub struct First {
    candidates: Candidates,
}

impl First {
    pub fn new(candidates: Candidates) -> Self {
        First { candidates }
    }
}

impl Strategy for First {
    fn kind(&self) -> StrategyKind {
        StrategyKind::First
    }

    fn candidates(&self) -> &Candidates {
        &self.candidates
    }

    fn choose(&self) -> Option<usize> {
        if self.candidates.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::tests::candidates;
    use crate::strategy::DialOutcome;
    use std::time::Duration;

    #[test]
    fn test_always_zero() {
        let strategy = First::new(candidates(4));
        strategy.report(0, &DialOutcome::failure(Duration::from_secs(1)));
        for _ in 0..5 {
            assert_eq!(strategy.choose(), Some(0));
        }
    }
}
