//! End-to-end streaming scenarios over the public API.
//!
//! The engine accepts any [`StreamTransport`] implementation, so these
//! tests drive it through a small channel-backed transport defined here,
//! exactly as an integrator bringing their own transport would.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde_json::json;
use tokio::sync::{mpsc, Mutex};
use zetatrade::stream::transport::{StreamTransport, TransportEvent};
use zetatrade::{Client, StreamEvent, SubscriptionUpdate, ZetaError};

/// Make protocol-anomaly warnings visible when a test fails under
/// `RUST_LOG=zetatrade=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Channel-backed transport: the test plays the server.
#[derive(Debug)]
struct ChannelTransport {
    outbound_tx: mpsc::UnboundedSender<String>,
    event_rx: Arc<Mutex<mpsc::UnboundedReceiver<TransportEvent>>>,
}

struct ServerHandle {
    outbound_rx: mpsc::UnboundedReceiver<String>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
}

fn channel_transport() -> (ChannelTransport, ServerHandle) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            outbound_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        },
        ServerHandle {
            outbound_rx,
            event_tx,
        },
    )
}

#[async_trait::async_trait]
impl StreamTransport for ChannelTransport {
    async fn send(&self, text: String) -> zetatrade::Result<()> {
        self.outbound_tx
            .send(text)
            .map_err(|_| anyhow::anyhow!("test transport closed"))
    }

    async fn close(&self) -> zetatrade::Result<()> {
        Ok(())
    }

    fn events(&self) -> Pin<Box<dyn Stream<Item = TransportEvent> + Send + '_>> {
        let rx = Arc::clone(&self.event_rx);
        Box::pin(futures::stream::unfold(rx, |rx| async move {
            let mut guard = rx.lock().await;
            let item = guard.recv().await?;
            drop(guard);
            Some((item, rx))
        }))
    }
}

impl ServerHandle {
    async fn next_frame(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.outbound_rx.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client closed the channel")
    }

    fn frame(&self, line: impl Into<String>) {
        self.event_tx
            .send(TransportEvent::Message(line.into()))
            .unwrap();
    }
}

async fn next_update(
    rx: &mut mpsc::UnboundedReceiver<SubscriptionUpdate>,
) -> SubscriptionUpdate {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an update")
        .expect("update channel closed")
}

/// A whole subscription session: handshake, subscribe, snapshot, two
/// chained deltas, unsubscribe, server close.
#[tokio::test]
async fn test_full_subscription_session() {
    init_tracing();
    let mut client = Client::new(Some("en")).unwrap();
    client.login_with_cookies(vec!["session=abc".to_string()]).unwrap();
    let engine = client.streaming().unwrap();

    let (transport, mut server) = channel_transport();
    server.event_tx.send(TransportEvent::Open).unwrap();
    engine.connect_with(Arc::new(transport)).await.unwrap();

    // Handshake first, exactly once, on the reserved id.
    let handshake = server.next_frame().await;
    assert!(handshake.starts_with("connect 31 {"));
    let payload: serde_json::Value =
        serde_json::from_str(&handshake["connect 31 ".len()..]).unwrap();
    assert_eq!(payload["locale"], "en");
    assert_eq!(payload["clientId"], "app.traderepublic.com");

    // Subscribe and observe the sub frame.
    let (update_tx, mut updates) = mpsc::unbounded_channel();
    let topic = json!({"type": "ticker", "id": "US0378331005.LSX"});
    let id = engine
        .subscribe(topic.clone(), move |update| {
            let _ = update_tx.send(update);
        })
        .unwrap();
    assert_eq!(id, 1);
    let sub = server.next_frame().await;
    assert_eq!(sub, format!("sub {id} {topic}"));

    // Snapshot, then a delta that patches the price field.
    server.frame(format!(r#"{id} A {{"price":101,"qty":5}}"#));
    assert_eq!(
        next_update(&mut updates).await,
        SubscriptionUpdate::Data(json!({"price": 101, "qty": 5}))
    );

    // {"price":101,"qty":5} -- keep 9 chars `{"price":`, replace 101
    // with 99, keep the 9-char tail `,"qty":5}`.
    server.frame(format!("{id} D =9 +99 -3 =9"));
    assert_eq!(
        next_update(&mut updates).await,
        SubscriptionUpdate::Data(json!({"price": 99, "qty": 5}))
    );

    // A second delta chains off the reconstructed text.
    // {"price":99,"qty":5} -- keep 8, drop `:99`, insert `:100`, keep 9.
    server.frame(format!("{id} D =8 -3 +:100 =9"));
    assert_eq!(
        next_update(&mut updates).await,
        SubscriptionUpdate::Data(json!({"price": 100, "qty": 5}))
    );

    // Unsubscribe echoes id and topic; eviction waits for the close.
    engine.unsubscribe(id, &topic).unwrap();
    let unsub = server.next_frame().await;
    assert_eq!(unsub, format!("unsub {id} {topic}"));
    assert_eq!(engine.subscription_count(), 1);

    server.frame(format!("{id} C"));
    assert_eq!(next_update(&mut updates).await, SubscriptionUpdate::Closed);
    assert_eq!(engine.subscription_count(), 0);
}

/// Lifecycle events reach a registered listener and stop after removal.
#[tokio::test]
async fn test_event_listener_lifecycle() {
    init_tracing();
    let mut client = Client::new(Some("en")).unwrap();
    client.login_with_cookies(vec!["session=abc".to_string()]).unwrap();
    let engine = client.streaming().unwrap();

    let (event_tx, mut events) = mpsc::unbounded_channel();
    let listener = engine.on_event(move |event| {
        let _ = event_tx.send(event.clone());
    });

    let (transport, server) = channel_transport();
    server.event_tx.send(TransportEvent::Open).unwrap();
    engine.connect_with(Arc::new(transport)).await.unwrap();

    server.frame("9 A {}");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(events.try_recv().unwrap(), StreamEvent::Open);
    assert_eq!(
        events.try_recv().unwrap(),
        StreamEvent::Message("9 A {}".to_string())
    );

    assert!(engine.remove_listener(listener));
    server.frame("9 A {}");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err(), "removed listener stays silent");
}

/// The streaming handle is gated on login, and the engine on cookies.
#[tokio::test]
async fn test_streaming_misuse_paths() {
    let client = Client::new(Some("en")).unwrap();
    let err = client.streaming().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ZetaError>(),
        Some(ZetaError::Misuse(_))
    ));

    let mut client = Client::new(Some("en")).unwrap();
    client.login_with_cookies(vec!["session=abc".to_string()]).unwrap();
    let engine = client.streaming().unwrap();

    // Not connected yet: subscribe and raw sends are refused.
    assert!(engine.subscribe(json!({"type": "ticker"}), |_| {}).is_err());
    assert!(engine.send_raw("ping").is_err());
}

/// Disconnect tears the session down without synthesizing close
/// notifications.
#[tokio::test]
async fn test_disconnect_drops_subscriptions_silently() {
    init_tracing();
    let mut client = Client::new(Some("en")).unwrap();
    client.login_with_cookies(vec!["session=abc".to_string()]).unwrap();
    let engine = client.streaming().unwrap();

    let (transport, mut server) = channel_transport();
    server.event_tx.send(TransportEvent::Open).unwrap();
    engine.connect_with(Arc::new(transport)).await.unwrap();
    let _handshake = server.next_frame().await;

    let (update_tx, mut updates) = mpsc::unbounded_channel();
    engine
        .subscribe(json!({"type": "portfolio"}), move |update| {
            let _ = update_tx.send(update);
        })
        .unwrap();

    engine.disconnect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(updates.try_recv().is_err(), "no synthetic close after disconnect");
    assert!(engine.subscribe(json!({}), |_| {}).is_err());
}
