//! End-to-end session behavior over the in-memory transport

use lazyhub::hub::{Context, Registry, Session, SessionState, Transform, TransformError};
use lazyhub::transport::{MemoryConnection, MemoryPeer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

/// Relays "ping" as a group-cast "pong"; fails on "bad"; ignores the rest
fn ping_pong() -> Arc<dyn Transform> {
    Arc::new(|mut ctx: Context| -> Result<Context, TransformError> {
        match ctx.message.as_slice() {
            b"ping" => {
                let group = ctx.group.clone();
                ctx.group_cast(group, b"pong".to_vec());
                Ok(ctx)
            }
            b"bad" => Err(TransformError::rejected("bad frame")),
            _ => Ok(ctx),
        }
    })
}

/// Admit a session under a fixed identifier and start its loops
async fn start(
    registry: &Arc<Registry>,
    group: &str,
    id: &str,
    transform: Arc<dyn Transform>,
) -> (Arc<Session>, MemoryPeer) {
    let (conn, peer) = MemoryConnection::pair();
    let (reader, writer) = conn.into_split();
    let (session, outbound) = Session::new(group, id, None, transform);
    registry.admit(&session).await.unwrap();
    session.spawn(Arc::clone(registry), outbound, reader, writer);
    (session, peer)
}

async fn next_frame(peer: &mut MemoryPeer) -> Vec<u8> {
    timeout(WAIT, peer.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("connection closed")
}

async fn wait_until_absent(registry: &Registry, group: &str, id: &str) {
    timeout(WAIT, async {
        while registry.contains(group, id).await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session was never removed");
}

#[tokio::test]
async fn group_cast_reaches_sender_and_peers() {
    let registry = Registry::create("test");
    let (_a, mut peer_a) = start(&registry, "g", "1", ping_pong()).await;
    let (_b, mut peer_b) = start(&registry, "g", "2", ping_pong()).await;
    let (_c, mut peer_c) = start(&registry, "elsewhere", "3", ping_pong()).await;

    assert!(peer_a.send(b"ping".to_vec()));

    assert_eq!(next_frame(&mut peer_a).await, b"pong".to_vec());
    assert_eq!(next_frame(&mut peer_b).await, b"pong".to_vec());

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(peer_c.try_recv().is_none());
}

#[tokio::test]
async fn transform_error_keeps_session_alive() {
    let registry = Registry::create("test");
    let (session, mut peer) = start(&registry, "g", "1", ping_pong()).await;

    assert!(peer.send(b"bad".to_vec()));
    assert!(peer.send(b"ping".to_vec()));

    assert_eq!(next_frame(&mut peer).await, b"pong".to_vec());
    assert_eq!(session.state(), SessionState::Running);
    assert!(registry.contains("g", "1").await);
}

#[tokio::test]
async fn transform_runs_once_per_frame() {
    let registry = Registry::create("test");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let transform: Arc<dyn Transform> =
        Arc::new(move |mut ctx: Context| -> Result<Context, TransformError> {
            counter.fetch_add(1, Ordering::SeqCst);
            let reply = ctx.message.clone();
            ctx.reply(reply);
            Ok(ctx)
        });
    let (_session, mut peer) = start(&registry, "g", "1", transform).await;

    for frame in ["a", "b", "c"] {
        assert!(peer.send(frame.as_bytes().to_vec()));
        assert_eq!(next_frame(&mut peer).await, frame.as_bytes().to_vec());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn queued_messages_coalesce_in_order() {
    let registry = Registry::create("test");
    let (conn, mut peer) = MemoryConnection::pair();
    let (reader, writer) = conn.into_split();
    let (session, outbound) = Session::new("g", "1", None, ping_pong());
    registry.admit(&session).await.unwrap();

    // Queued before the send loop exists, so all three are ready at once
    for message in ["m1", "m2", "m3"] {
        assert_eq!(registry.unicast("g", "1", message.as_bytes().to_vec()).await, 1);
    }
    session.spawn(Arc::clone(&registry), outbound, reader, writer);

    assert_eq!(next_frame(&mut peer).await, b"m1\nm2\nm3".to_vec());
}

#[tokio::test]
async fn fifo_order_survives_concurrent_sending() {
    let registry = Registry::create("test");
    let (_session, mut peer) = start(&registry, "g", "1", ping_pong()).await;

    let expected: Vec<String> = (0..200).map(|i| format!("msg-{}", i)).collect();
    for message in &expected {
        registry.unicast("g", "1", message.as_bytes().to_vec()).await;
    }

    let mut received = Vec::new();
    while received.len() < expected.len() {
        let frame = next_frame(&mut peer).await;
        for part in frame.split(|b| *b == b'\n') {
            received.push(String::from_utf8(part.to_vec()).unwrap());
        }
    }
    assert_eq!(received, expected);
}

#[tokio::test]
async fn coalesce_cap_limits_frame_size() {
    let registry = Registry::with_config(lazyhub::HubConfig {
        name: "capped".to_string(),
        max_coalesce: 2,
    });
    let (conn, mut peer) = MemoryConnection::pair();
    let (reader, writer) = conn.into_split();
    let (session, outbound) = Session::new("g", "1", None, ping_pong());
    registry.admit(&session).await.unwrap();

    for message in ["m1", "m2", "m3"] {
        registry.unicast("g", "1", message.as_bytes().to_vec()).await;
    }
    session.spawn(Arc::clone(&registry), outbound, reader, writer);

    assert_eq!(next_frame(&mut peer).await, b"m1\nm2".to_vec());
    assert_eq!(next_frame(&mut peer).await, b"m3".to_vec());
}

#[tokio::test]
async fn peer_close_tears_down_session() {
    let registry = Registry::create("test");
    let (session, mut peer) = start(&registry, "g", "1", ping_pong()).await;
    let (_other, _other_peer) = start(&registry, "g", "2", ping_pong()).await;

    peer.close(Some(1000));
    wait_until_absent(&registry, "g", "1").await;

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), None);
    assert_eq!(registry.unicast("g", "1", b"late".to_vec()).await, 0);
    assert!(registry.contains("g", "2").await);
}

#[tokio::test]
async fn read_failure_tears_down_session() {
    let registry = Registry::create("test");
    let (_session, mut peer) = start(&registry, "g", "1", ping_pong()).await;

    peer.fail_reads("connection reset");
    wait_until_absent(&registry, "g", "1").await;
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn write_failure_stops_both_loops() {
    let registry = Registry::create("test");
    let (conn, peer) = MemoryConnection::pair();
    let (reader, writer) = conn.into_split();
    let handle = registry
        .join("g", None, ping_pong(), reader, writer)
        .await
        .unwrap();
    let id = handle.session.id().to_string();

    peer.fail_writes();
    assert_eq!(registry.unicast("g", &id, b"doomed".to_vec()).await, 1);

    assert!(timeout(WAIT, handle.tasks.join())
        .await
        .expect("loops did not stop"));
    wait_until_absent(&registry, "g", &id).await;
    assert!(!peer.send(b"anyone there?".to_vec()));
}

#[tokio::test]
async fn disconnect_closes_connection() {
    let registry = Registry::create("test");
    let (conn, mut peer) = MemoryConnection::pair();
    let (reader, writer) = conn.into_split();
    let handle = registry
        .join("g", Some("protocol-1".to_string()), ping_pong(), reader, writer)
        .await
        .unwrap();
    let id = handle.session.id().to_string();
    assert_eq!(handle.session.subprotocol(), Some("protocol-1"));

    assert!(registry.disconnect("g", &id).await);
    assert_eq!(timeout(WAIT, peer.recv()).await.unwrap(), None);
    assert!(timeout(WAIT, handle.tasks.join())
        .await
        .expect("loops did not stop"));
    assert!(!registry.contains("g", &id).await);
}

#[tokio::test]
async fn join_reports_a_panicked_loop() {
    let registry = Registry::create("test");
    let transform: Arc<dyn Transform> =
        Arc::new(|ctx: Context| -> Result<Context, TransformError> {
            if ctx.message.as_slice() == b"explode" {
                panic!("transform exploded");
            }
            Ok(ctx)
        });
    let (conn, peer) = MemoryConnection::pair();
    let (reader, writer) = conn.into_split();
    let handle = registry
        .join("g", None, transform, reader, writer)
        .await
        .unwrap();
    let id = handle.session.id().to_string();

    assert!(peer.send(b"explode".to_vec()));
    timeout(WAIT, async {
        while !handle.tasks.receive.is_finished() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("receive loop never ended");

    // The send loop is still parked on its queue until the session is torn down
    assert!(registry.disconnect("g", &id).await);
    let clean = timeout(WAIT, handle.tasks.join())
        .await
        .expect("loops did not stop");
    assert!(!clean);
}
