//! Candidate selection strategies for the Optimizer transport
//!
//! A [`Strategy`] picks which candidate dialer serves the next connection
//! attempt. Adaptive strategies learn from the [`DialOutcome`] reported
//! after each attempt; the others ignore it.
//!
//! Strategies are shared across concurrent dials, so every method takes
//! `&self` and any mutable statistics sit behind a short-lived lock.

mod first;
mod minimize;
mod random;
mod rotate;
mod track;

pub use first::First;
pub use minimize::{LatencyStats, MinimizeDialDuration, FAILURE_PENALTY};
pub use random::Random;
pub use rotate::Rotate;
pub use track::{Track, TrackStats};

use crate::transport::TransportDialer;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Candidate dialers, shared between a strategy and its Optimizer
pub type Candidates = Arc<[Arc<dyn TransportDialer>]>;

/// Selection strategy names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    First,
    Random,
    Rotate,
    Track,
    MinimizeDialDuration,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::First,
        StrategyKind::Random,
        StrategyKind::Rotate,
        StrategyKind::Track,
        StrategyKind::MinimizeDialDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::First => "first",
            StrategyKind::Random => "random",
            StrategyKind::Rotate => "rotate",
            StrategyKind::Track => "track",
            StrategyKind::MinimizeDialDuration => "minimizeDialDuration",
        }
    }

    /// Whether reported outcomes change later choices.
    pub fn is_adaptive(&self) -> bool {
        matches!(self, StrategyKind::Track | StrategyKind::MinimizeDialDuration)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnsupportedStrategy(s.to_string()))
    }
}

/// Result of one dial attempt through a chosen candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialOutcome {
    pub success: bool,
    pub elapsed: Duration,
}

impl DialOutcome {
    pub fn success(elapsed: Duration) -> Self {
        DialOutcome {
            success: true,
            elapsed,
        }
    }

    pub fn failure(elapsed: Duration) -> Self {
        DialOutcome {
            success: false,
            elapsed,
        }
    }
}

/// Picks a candidate index for each dial attempt
pub trait Strategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    fn candidates(&self) -> &Candidates;

    /// Index of the candidate to dial next, or `None` when there are no
    /// candidates.
    fn choose(&self) -> Option<usize>;

    /// Record the outcome of a dial through `index`.
    fn report(&self, _index: usize, _outcome: &DialOutcome) {}
}

/// Build the strategy called `name` over `candidates`.
pub fn build_strategy(
    name: &str,
    candidates: Vec<Arc<dyn TransportDialer>>,
) -> Result<Arc<dyn Strategy>> {
    let kind: StrategyKind = name.parse()?;
    let candidates: Candidates = candidates.into();
    let strategy: Arc<dyn Strategy> = match kind {
        StrategyKind::First => Arc::new(First::new(candidates)),
        StrategyKind::Random => Arc::new(Random::new(candidates)),
        StrategyKind::Rotate => Arc::new(Rotate::new(candidates)),
        StrategyKind::Track => Arc::new(Track::new(candidates)),
        StrategyKind::MinimizeDialDuration => Arc::new(MinimizeDialDuration::new(candidates)),
    };
    Ok(strategy)
}
