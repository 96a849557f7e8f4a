//! Session pool tests.
//!
//! Covers:
//! - Partition isolation across execution contexts
//! - Keep-alive reuse within one context
//! - reset() invalidation and stale-session failures
//! - Connect failure and timeout error kinds

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use loadnet::base::context::ContextId;
use loadnet::base::endpoint::Endpoint;
use loadnet::base::neterror::NetError;
use loadnet::requester::Requester;
use loadnet::socket::connectjob::ConnectOptions;
use tokio::net::TcpListener;

/// A server that accepts connections and holds them open, counting accepts.
async fn spawn_hold_server() -> (SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);

    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    held.push(socket);
                }
                Err(_) => break,
            }
        }
    });

    (addr, accepted)
}

fn endpoint_for(addr: SocketAddr) -> Endpoint {
    Endpoint::http(addr.ip().to_string(), addr.port())
}

#[tokio::test]
async fn concurrent_contexts_get_disjoint_sessions() {
    let (addr, accepted) = spawn_hold_server().await;
    let requester = Requester::builder().build().unwrap();
    let endpoint = endpoint_for(addr);

    let (a, b, c) = (ContextId::next(), ContextId::next(), ContextId::next());
    let options = ConnectOptions::default();
    let (s1, s2, s3) = tokio::join!(
        requester.connect_from(a, &endpoint, options),
        requester.connect_from(b, &endpoint, options),
        requester.connect_from(c, &endpoint, options),
    );
    let (s1, s2, s3) = (s1.unwrap(), s2.unwrap(), s3.unwrap());

    assert_ne!(s1.id(), s2.id());
    assert_ne!(s2.id(), s3.id());
    assert_ne!(s1.id(), s3.id());
    assert_eq!(accepted.load(Ordering::SeqCst), 3);

    assert_eq!(s1.context(), a);
    assert_eq!(s2.context(), b);
    assert_eq!(s3.context(), c);
}

#[tokio::test]
async fn same_context_reuses_a_released_session() {
    let (addr, accepted) = spawn_hold_server().await;
    let requester = Requester::builder().build().unwrap();
    let endpoint = endpoint_for(addr);
    let context = ContextId::next();

    let session = requester.connect_from(context, &endpoint, Default::default()).await.unwrap();
    let first_id = session.id();
    requester.release(session);
    assert_eq!(requester.pool().idle_count(), 1);

    let session = requester.connect_from(context, &endpoint, Default::default()).await.unwrap();
    assert_eq!(session.id(), first_id);
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert_eq!(requester.pool().idle_count(), 0);
}

#[tokio::test]
async fn released_sessions_never_cross_contexts() {
    let (addr, accepted) = spawn_hold_server().await;
    let requester = Requester::builder().build().unwrap();
    let endpoint = endpoint_for(addr);

    let a = ContextId::next();
    let session = requester.connect_from(a, &endpoint, Default::default()).await.unwrap();
    let a_session_id = session.id();
    requester.release(session);

    let b = ContextId::next();
    let session = requester.connect_from(b, &endpoint, Default::default()).await.unwrap();
    assert_ne!(session.id(), a_session_id);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);

    // A's session is still idle in A's partition, untouched.
    assert_eq!(requester.pool().idle_count(), 1);
}

#[tokio::test]
async fn reset_empties_the_pool_and_forces_fresh_sessions() {
    let (addr, accepted) = spawn_hold_server().await;
    let requester = Requester::builder().build().unwrap();
    let endpoint = endpoint_for(addr);
    let context = ContextId::next();

    let session = requester.connect_from(context, &endpoint, Default::default()).await.unwrap();
    let pre_reset_id = session.id();
    requester.release(session);

    let epoch_before = requester.pool().epoch();
    requester.reset();
    assert_eq!(requester.pool().idle_count(), 0);
    assert_eq!(requester.pool().partition_count(), 0);
    assert!(requester.pool().epoch() > epoch_before);

    let session = requester.connect_from(context, &endpoint, Default::default()).await.unwrap();
    assert_ne!(session.id(), pre_reset_id);
    assert_eq!(accepted.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn outstanding_lease_turns_stale_on_reset() {
    let (addr, _accepted) = spawn_hold_server().await;
    let requester = Requester::builder().build().unwrap();
    let endpoint = endpoint_for(addr);

    let mut session =
        requester.connect_from(ContextId::next(), &endpoint, Default::default()).await.unwrap();
    assert!(!session.is_stale());

    requester.reset();
    assert!(session.is_stale());

    let request = http::Request::builder()
        .uri("/")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let err = session.send_request(request).await.unwrap_err();
    assert_eq!(err, NetError::StaleSession);

    // Releasing the stale session drops it instead of pooling it.
    requester.release(session);
    assert_eq!(requester.pool().idle_count(), 0);
}

#[tokio::test]
async fn partitions_are_created_lazily_and_evicted_when_idle() {
    let (addr, _accepted) = spawn_hold_server().await;
    let requester = Requester::builder()
        .pool_config(loadnet::socket::pool::PoolConfig {
            idle_timeout: Duration::ZERO,
            cleanup_interval: Duration::from_secs(3600),
        })
        .build()
        .unwrap();
    let endpoint = endpoint_for(addr);

    assert_eq!(requester.pool().partition_count(), 0);

    let session =
        requester.connect_from(ContextId::next(), &endpoint, Default::default()).await.unwrap();
    requester.release(session);
    assert_eq!(requester.pool().partition_count(), 1);

    // Zero idle timeout: the sweep evicts the session and the empty partition.
    requester.pool().cleanup_idle_sessions();
    assert_eq!(requester.pool().idle_count(), 0);
    assert_eq!(requester.pool().partition_count(), 0);
}

#[tokio::test]
async fn connect_to_a_closed_port_is_not_a_timeout() {
    // Bind and immediately drop to find a port with nothing listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let requester = Requester::builder().build().unwrap();
    let err = requester
        .connect_from(ContextId::next(), &endpoint_for(addr), Default::default())
        .await
        .unwrap_err();

    assert!(!err.is_timeout());
    assert_eq!(err, NetError::ConnectionRefused);
}

#[tokio::test]
async fn expired_per_call_timeout_is_the_distinguished_kind() {
    let (addr, _accepted) = spawn_hold_server().await;
    let requester = Requester::builder().build().unwrap();

    let options = ConnectOptions { timeout: Some(Duration::ZERO), ..Default::default() };
    let err = requester
        .connect_from(ContextId::next(), &endpoint_for(addr), options)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    // No timing record survives a timed-out connect.
    assert_eq!(requester.timing().record_count(), 0);
}

#[tokio::test]
#[ignore = "needs a network path that blackholes TEST-NET-1"]
async fn unreachable_endpoint_times_out_within_the_configured_timeout() {
    let requester = Requester::builder().build().unwrap();
    let endpoint = Endpoint::http("192.0.2.1", 81);

    let options = ConnectOptions { timeout: Some(Duration::from_millis(50)), ..Default::default() };
    let started = std::time::Instant::now();
    let err = requester
        .connect_from(ContextId::next(), &endpoint, options)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(started.elapsed() < Duration::from_millis(500));
}
