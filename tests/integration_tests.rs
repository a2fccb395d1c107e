//! Integration tests for transport decoding and Optimizer dialing
//!
//! Exercise the public API only: registry decoding of nested Optimizer
//! configs, strategy behaviour under concurrent dials, and upstream proxy
//! chaining.

use async_trait::async_trait;
use base64::Engine;
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use shapeshifter_rust::common::{StatusChannel, Target};
use shapeshifter_rust::config::validate_with;
use shapeshifter_rust::dialer::{from_proxy_uri, Connection, Dialer};
use shapeshifter_rust::strategy::{Candidates, MinimizeDialDuration, Rotate, Strategy, Track};
use shapeshifter_rust::transport::{OptimizerDialer, ReplicantClientConfig};
use shapeshifter_rust::{Error, Result, TransportDialer, TransportKind, TransportRegistry};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// In-memory transport with a fixed dial delay and outcome
struct FakeTransport {
    delay: Duration,
    fail: bool,
    hits: AtomicUsize,
}

impl FakeTransport {
    fn new(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(FakeTransport {
            delay,
            fail,
            hits: AtomicUsize::new(0),
        })
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dialer for FakeTransport {
    async fn dial(&self, _target: &Target) -> Result<Box<dyn Connection>> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(Error::dial_failed(TransportKind::Obfs2, "refused"));
        }
        let (near, _far) = tokio::io::duplex(64);
        Ok(Box::new(near))
    }
}

impl TransportDialer for FakeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Obfs2
    }
}

fn as_candidates(fakes: &[Arc<FakeTransport>]) -> Candidates {
    fakes
        .iter()
        .map(|f| f.clone() as Arc<dyn TransportDialer>)
        .collect::<Vec<_>>()
        .into()
}

fn target() -> Target {
    Target::new("example.com", 443)
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn obfs4_cert() -> String {
    base64::engine::general_purpose::STANDARD_NO_PAD.encode([9u8; 52])
}

fn every_kind() -> Vec<Value> {
    let replicant = ReplicantClientConfig::new("192.0.2.6:6000").encode().unwrap();
    vec![
        json!({"name": "obfs2", "config": {"address": "192.0.2.1:1000"}}),
        json!({"name": "obfs4", "config": {"cert": obfs4_cert(), "iat-mode": "0", "address": "192.0.2.2:2000"}}),
        json!({"name": "shadow", "config": {"password": "pw", "cipherName": "AEAD_AES_256_GCM", "address": "192.0.2.3:3000"}}),
        json!({"name": "Dust", "config": {"server-public": "a2V5", "address": "192.0.2.4:4000"}}),
        json!({"name": "meeklite", "config": {"url": "https://meek.example.net/", "front": "cdn.example.com"}}),
        json!({"name": "Replicant", "config": {"config": replicant}}),
        json!({"name": "StarBridge", "address": "192.0.2.7:7000", "config": {"serverPersistentPublicKey": "c3Rhcg=="}}),
        json!({"name": "Optimizer", "config": {
            "transports": [{"name": "obfs2", "config": {"address": "192.0.2.8:8000"}}],
            "strategy": "first",
        }}),
    ]
}

#[test]
fn test_decode_optimizer_over_every_kind() {
    let registry = TransportRegistry::new();
    let raw = json!({"transports": every_kind(), "strategy": "track"}).to_string();
    let dialer = registry.decode("Optimizer", &raw, None, None).unwrap();
    assert_eq!(dialer.kind(), TransportKind::Optimizer);

    // Descriptors decode in order, one candidate each.
    let ctx = shapeshifter_rust::transport::DecodeContext::new(None, None);
    let candidates = registry.decode_descriptors(&every_kind(), &ctx).unwrap();
    let kinds: Vec<_> = candidates.iter().map(|c| c.kind()).collect();
    assert_eq!(kinds, TransportKind::ALL.to_vec());
}

#[test]
fn test_batch_error_names_index() {
    let registry = TransportRegistry::new();
    let mut transports = every_kind();
    transports[2] = json!({"name": "shadow", "config": {"password": "pw", "address": "192.0.2.3:3000"}});
    let raw = json!({"transports": transports, "strategy": "first"}).to_string();

    let err = registry.decode("Optimizer", &raw, None, None).unwrap_err();
    assert_eq!(err.batch_index(), Some(2));
    assert!(err.to_string().starts_with("Transport 2 could not be parsed"));
    assert!(matches!(err.root(), Error::ConfigDecode { kind, .. } if kind == "shadow"));
}

#[test]
fn test_self_nesting_is_bounded() {
    let registry = TransportRegistry::new();
    let mut config = json!({"transports": [], "strategy": "first"});
    for _ in 0..10 {
        config = json!({"transports": [{"name": "Optimizer", "config": config}], "strategy": "first"});
    }
    let err = registry.decode("Optimizer", &config.to_string(), None, None).unwrap_err();
    assert!(matches!(err.root(), Error::NestingTooDeep { .. }));
}

#[tokio::test]
async fn test_empty_optimizer_has_no_candidates() {
    let registry = TransportRegistry::new();
    let raw = json!({"transports": [], "strategy": "minimizeDialDuration"}).to_string();
    let dialer = registry.decode("Optimizer", &raw, None, None).unwrap();
    let err = dialer.dial(&target()).await.err().unwrap();
    assert!(matches!(err, Error::NoCandidates));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_rotate_is_fair() {
    let fakes: Vec<_> = (0..3).map(|_| FakeTransport::new(Duration::ZERO, false)).collect();
    let rotate = Arc::new(Rotate::new(as_candidates(&fakes)));
    let optimizer = Arc::new(OptimizerDialer::new(rotate.clone()));

    const DIALS: usize = 100;
    let dials = (0..DIALS).map(|_| {
        let optimizer = optimizer.clone();
        tokio::spawn(async move { optimizer.dial(&target()).await.is_ok() })
    });
    let results = join_all(dials).await;
    assert!(results.into_iter().all(|r| r.unwrap()));

    let hits: Vec<_> = fakes.iter().map(|f| f.hits()).collect();
    assert_eq!(hits.iter().sum::<usize>(), DIALS);
    let (min, max) = (hits.iter().min().unwrap(), hits.iter().max().unwrap());
    assert!(max - min <= 1, "unfair rotation: {:?}", hits);
    assert_eq!(rotate.cursor(), DIALS % 3);
}

#[tokio::test]
async fn test_failed_dial_is_not_retried() {
    let fakes = vec![
        FakeTransport::new(Duration::ZERO, true),
        FakeTransport::new(Duration::ZERO, false),
    ];
    let track = Arc::new(Track::new(as_candidates(&fakes)));
    let optimizer = OptimizerDialer::new(track.clone());

    let err = optimizer.dial(&target()).await.err().unwrap();
    assert!(matches!(err, Error::DialFailed { .. }));
    assert_eq!(fakes[0].hits(), 1);
    assert_eq!(fakes[1].hits(), 0);

    for _ in 0..5 {
        assert!(optimizer.dial(&target()).await.is_ok());
    }
    assert_eq!(fakes[1].hits(), 5);
    let stats = track.snapshot();
    assert_eq!((stats[0].attempts, stats[0].successes), (1, 0));
    assert_eq!((stats[1].attempts, stats[1].successes), (5, 5));
}

#[tokio::test]
async fn test_cancelled_dial_counts_as_failure() {
    let fakes = vec![FakeTransport::new(Duration::from_secs(30), false)];
    let track = Arc::new(Track::new(as_candidates(&fakes)));
    let optimizer = OptimizerDialer::new(track.clone());

    let result = tokio::time::timeout(Duration::from_millis(20), optimizer.dial(&target())).await;
    assert!(result.is_err());

    let stats = track.snapshot();
    assert_eq!(stats[0].attempts, 1);
    assert_eq!(stats[0].successes, 0);
}

#[tokio::test]
async fn test_minimize_converges_on_fastest() {
    let fakes = vec![
        FakeTransport::new(Duration::from_millis(60), false),
        FakeTransport::new(Duration::from_millis(1), false),
        FakeTransport::new(Duration::from_millis(30), false),
    ];
    let minimize = Arc::new(MinimizeDialDuration::new(as_candidates(&fakes)));
    let optimizer = OptimizerDialer::new(minimize.clone());

    for _ in 0..12 {
        assert!(optimizer.dial(&target()).await.is_ok());
    }
    assert_eq!(fakes[0].hits(), 1);
    assert_eq!(fakes[2].hits(), 1);
    assert_eq!(fakes[1].hits(), 10);
    assert_eq!(minimize.choose(), Some(1));
}

#[test]
fn test_invalid_proxy_reports_status_line() {
    let captured = Captured::default();
    let status = StatusChannel::new(Box::new(captured.clone()));

    let err = validate_with("socks5://user@127.0.0.1:1080", &status).unwrap_err();
    assert!(err.to_string().contains("password"));

    let out = String::from_utf8(captured.0.lock().clone()).unwrap();
    assert!(out.starts_with("PROXY-ERROR "));
    assert_eq!(out.lines().count(), 1);
}

#[tokio::test]
async fn test_transport_dials_through_http_proxy() {
    let proxy = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (mut stream, _) = proxy.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 256];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0);
            request.extend_from_slice(&buf[..n]);
        }
        stream.write_all(b"HTTP/1.1 200 Connection established\r\n\r\n").await.unwrap();
        String::from_utf8(request).unwrap()
    });

    let status = StatusChannel::new(Box::new(Captured::default()));
    let uri = validate_with(&format!("http://{}", proxy_addr), &status).unwrap();
    let upstream: Arc<dyn Dialer> = from_proxy_uri(uri.as_ref());

    let registry = TransportRegistry::new();
    let dust = registry
        .decode(
            "Dust",
            r#"{"server-public": "a2V5", "address": "192.0.2.4:4000"}"#,
            Some(upstream),
            None,
        )
        .unwrap();
    assert!(dust.dial(&target()).await.is_ok());

    let request = server.await.unwrap();
    assert!(request.starts_with("CONNECT 192.0.2.4:4000 HTTP/1.1\r\n"));
}
