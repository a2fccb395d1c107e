//! Optimizer transport
//!
//! Wraps several transports behind one dialer. Each dial asks the
//! configured [`Strategy`] for a candidate, dials it, and reports how the
//! attempt went. There is no retry: a failed candidate fails the dial.

use super::carrier::decode_json;
use super::{DecodeContext, TransportDialer, TransportKind, TransportRegistry};
use crate::common::Target;
use crate::dialer::{Connection, Dialer};
use crate::strategy::{build_strategy, Candidates, DialOutcome, Strategy};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub transports: Vec<Value>,
    pub strategy: String,
}

impl OptimizerConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        decode_json(TransportKind::Optimizer, raw)
    }
}

/// Reports a dial outcome exactly once.
///
/// Dropping the guard before `finish` means the dial future was cancelled;
/// that attempt counts as a failure.
struct OutcomeGuard {
    strategy: Arc<dyn Strategy>,
    index: usize,
    started: Instant,
    done: bool,
}

impl OutcomeGuard {
    fn new(strategy: Arc<dyn Strategy>, index: usize) -> Self {
        OutcomeGuard {
            strategy,
            index,
            started: Instant::now(),
            done: false,
        }
    }

    fn finish(mut self, success: bool) {
        self.done = true;
        self.report(success);
    }

    fn report(&self, success: bool) {
        let outcome = DialOutcome {
            success,
            elapsed: self.started.elapsed(),
        };
        self.strategy.report(self.index, &outcome);
    }
}

impl Drop for OutcomeGuard {
    fn drop(&mut self) {
        if !self.done {
            debug!("[optimizer] dial through candidate {} cancelled", self.index);
            self.report(false);
        }
    }
}

pub struct OptimizerDialer {
    strategy: Arc<dyn Strategy>,
}

impl OptimizerDialer {
    pub fn new(strategy: Arc<dyn Strategy>) -> Self {
        OptimizerDialer { strategy }
    }

    pub fn strategy(&self) -> &Arc<dyn Strategy> {
        &self.strategy
    }

    pub fn candidates(&self) -> &Candidates {
        self.strategy.candidates()
    }
}

#[async_trait]
impl Dialer for OptimizerDialer {
    async fn dial(&self, target: &Target) -> Result<Box<dyn Connection>> {
        let index = self.strategy.choose().ok_or(Error::NoCandidates)?;
        let candidate = self
            .candidates()
            .get(index)
            .cloned()
            .ok_or(Error::NoCandidates)?;

        debug!(
            "[optimizer] {} picked candidate {} ({}) for {}",
            self.strategy.kind(),
            index,
            candidate.kind(),
            target
        );

        let guard = OutcomeGuard::new(self.strategy.clone(), index);
        let result = candidate.dial(target).await;
        guard.finish(result.is_ok());

        if let Err(e) = &result {
            debug!("[optimizer] candidate {} failed: {}", index, e);
        }
        result
    }
}

impl TransportDialer for OptimizerDialer {
    fn kind(&self) -> TransportKind {
        TransportKind::Optimizer
    }
}

pub(crate) fn decode(
    registry: &TransportRegistry,
    ctx: &DecodeContext,
    raw: &str,
) -> Result<Arc<dyn TransportDialer>> {
    if ctx.depth() > registry.max_depth() {
        return Err(Error::NestingTooDeep {
            depth: registry.max_depth(),
        });
    }

    let config = OptimizerConfig::from_json(raw)?;
    if config.transports.is_empty() {
        warn!("[optimizer] no transports configured, every dial will fail");
    }

    let candidates = registry.decode_descriptors(&config.transports, ctx)?;
    let strategy = build_strategy(&config.strategy, candidates)?;
    debug!(
        "[optimizer] {} over {} candidates at depth {}",
        strategy.kind(),
        strategy.candidates().len(),
        ctx.depth()
    );
    Ok(Arc::new(OptimizerDialer::new(strategy)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::StrategyKind;
    use serde_json::json;
    use tokio::net::TcpListener;

    fn obfs2(address: &str) -> Value {
        json!({"name": "obfs2", "config": {"address": address}})
    }

    #[test]
    fn test_missing_strategy() {
        let registry = TransportRegistry::new();
        let raw = json!({"transports": []}).to_string();
        let err = registry.decode("Optimizer", &raw, None, None).unwrap_err();
        assert!(matches!(err, Error::ConfigDecode { ref kind, .. } if kind == "Optimizer"));
    }

    #[test]
    fn test_unknown_strategy() {
        let registry = TransportRegistry::new();
        let raw = json!({"transports": [obfs2("192.0.2.1:1")], "strategy": "fastest"}).to_string();
        let err = registry.decode("Optimizer", &raw, None, None).unwrap_err();
        assert!(matches!(err, Error::UnsupportedStrategy(ref n) if n == "fastest"));
    }

    #[test]
    fn test_depth_guard() {
        let registry = TransportRegistry::with_max_depth(1);
        let inner = json!({"transports": [obfs2("192.0.2.1:1")], "strategy": "first"});
        let middle = json!({"transports": [{"name": "Optimizer", "config": inner}], "strategy": "first"});
        let outer = json!({"transports": [{"name": "Optimizer", "config": middle.clone()}], "strategy": "first"});

        // Optimizers at depth 0 and 1 are allowed.
        assert!(registry.decode("Optimizer", &middle.to_string(), None, None).is_ok());

        let err = registry.decode("Optimizer", &outer.to_string(), None, None).unwrap_err();
        assert_eq!(err.batch_index(), Some(0));
        assert!(matches!(err.root(), Error::NestingTooDeep { depth: 1 }));
    }

    #[tokio::test]
    async fn test_no_candidates() {
        let registry = TransportRegistry::new();
        let raw = json!({"transports": [], "strategy": "rotate"}).to_string();
        let dialer = registry.decode("Optimizer", &raw, None, None).unwrap();
        let err = dialer.dial(&Target::new("example.com", 80)).await.err().unwrap();
        assert!(matches!(err, Error::NoCandidates));
    }

    #[tokio::test]
    async fn test_rotate_dials_each_candidate() {
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let second = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let raw = json!({
            "transports": [
                obfs2(&first.local_addr().unwrap().to_string()),
                obfs2(&second.local_addr().unwrap().to_string()),
            ],
            "strategy": "rotate",
        })
        .to_string();

        let registry = TransportRegistry::new();
        let dialer = registry.decode("Optimizer", &raw, None, None).unwrap();
        let target = Target::new("example.com", 80);

        let _a = dialer.dial(&target).await.unwrap();
        first.accept().await.unwrap();
        let _b = dialer.dial(&target).await.unwrap();
        second.accept().await.unwrap();
    }

    #[tokio::test]
    async fn test_track_learns_from_failures() {
        let live = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap().to_string();
        drop(dead);

        let registry = TransportRegistry::new();
        let candidates = registry
            .decode_descriptors(
                &[obfs2(&dead_addr), obfs2(&live.local_addr().unwrap().to_string())],
                &DecodeContext::new(None, None),
            )
            .unwrap();
        let strategy = build_strategy("track", candidates).unwrap();
        assert_eq!(strategy.kind(), StrategyKind::Track);
        let dialer = OptimizerDialer::new(strategy);
        let target = Target::new("example.com", 80);

        assert!(dialer.dial(&target).await.is_err());
        assert!(dialer.dial(&target).await.is_ok());
        for _ in 0..3 {
            assert!(dialer.dial(&target).await.is_ok());
        }
    }
}
