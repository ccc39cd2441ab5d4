//! End-to-end bridge tests against a stub debugging endpoint.
//!
//! The stub serves `/json/version` over plain HTTP and speaks just enough of
//! the DevTools protocol over WebSocket to drive negotiation and the bridge
//! drain loop, including a fake page outbox the tests can fill directly.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use chrome_bridge::bridge::{self, Bridge, FunctionRegistry, MessageHandler};
use chrome_bridge::protocol::Command;
use chrome_bridge::{Connection, Error, SessionId};

const STUB_SESSION: &str = "STUB-SESSION-1";
const STUB_WINDOW: u64 = 7;

// ============================================================================
// Stub browser
// ============================================================================

/// A fake remote-debugging endpoint.
///
/// Records every command method it sees, answers each one with a canned
/// result, and maintains a page outbox the tests push work items into. Test
/// code raises binding signals by injecting `Runtime.bindingCalled` frames.
struct StubBrowser {
    http_port: u16,
    methods: Arc<Mutex<Vec<String>>>,
    outbox: Arc<Mutex<Vec<Value>>>,
    event_tx: mpsc::UnboundedSender<Value>,
    reply_rx: mpsc::UnboundedReceiver<Value>,
    /// When set, the stub announces `ready` right after answering
    /// `Runtime.addBinding`, while setup commands are still in flight.
    ready_on_add_binding: Arc<AtomicBool>,
}

impl StubBrowser {
    async fn spawn() -> Self {
        // Honors RUST_LOG when debugging a failing test; first caller wins.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let ws_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ws");
        let ws_port = ws_listener.local_addr().expect("ws addr").port();

        let http_listener = TcpListener::bind("127.0.0.1:0").await.expect("bind http");
        let http_port = http_listener.local_addr().expect("http addr").port();

        let methods: Arc<Mutex<Vec<String>>> = Arc::default();
        let outbox: Arc<Mutex<Vec<Value>>> = Arc::default();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();

        // Metadata endpoint. Reports the socket under the "localhost" alias
        // so the loopback substitution is exercised too.
        let version_body = json!({
            "Browser": "StubBrowser/1.0",
            "Protocol-Version": "1.3",
            "User-Agent": "stub",
            "V8-Version": "0.0.0",
            "WebKit-Version": "0.0.0",
            "webSocketDebuggerUrl": format!("ws://localhost:{ws_port}/devtools/browser/stub"),
        })
        .to_string();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = http_listener.accept().await else {
                    return;
                };
                let body = version_body.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });

        let ready_on_add_binding = Arc::new(AtomicBool::new(false));

        tokio::spawn(Self::run_ws(
            ws_listener,
            Arc::clone(&methods),
            Arc::clone(&outbox),
            event_rx,
            reply_tx,
            event_tx.clone(),
            Arc::clone(&ready_on_add_binding),
        ));

        Self {
            http_port,
            methods,
            outbox,
            event_tx,
            reply_rx,
            ready_on_add_binding,
        }
    }

    async fn run_ws(
        listener: TcpListener,
        methods: Arc<Mutex<Vec<String>>>,
        outbox: Arc<Mutex<Vec<Value>>>,
        mut event_rx: mpsc::UnboundedReceiver<Value>,
        reply_tx: mpsc::UnboundedSender<Value>,
        event_tx: mpsc::UnboundedSender<Value>,
        ready_on_add_binding: Arc<AtomicBool>,
    ) {
        let (stream, _) = listener.accept().await.expect("ws accept");
        let mut ws = tokio_tungstenite::accept_async(stream)
            .await
            .expect("ws handshake");

        loop {
            tokio::select! {
                message = ws.next() => {
                    let Some(Ok(message)) = message else { break };
                    let Message::Text(text) = message else { continue };
                    let frame: Value = serde_json::from_str(&text).expect("request frame");
                    let response = Self::respond(&frame, &methods, &outbox, &reply_tx);
                    ws.send(Message::Text(response.to_string().into()))
                        .await
                        .expect("send response");

                    if frame["method"] == "Runtime.addBinding"
                        && ready_on_add_binding.load(Ordering::SeqCst)
                    {
                        let _ = event_tx.send(json!({
                            "method": "Runtime.bindingCalled",
                            "params": {"name": "__bridgeSignal", "payload": "ready", "executionContextId": 1},
                        }));
                    }
                }

                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    ws.send(Message::Text(event.to_string().into()))
                        .await
                        .expect("send event");
                }
            }
        }
    }

    fn respond(
        frame: &Value,
        methods: &Mutex<Vec<String>>,
        outbox: &Mutex<Vec<Value>>,
        reply_tx: &mpsc::UnboundedSender<Value>,
    ) -> Value {
        let method = frame["method"].as_str().unwrap_or_default().to_string();
        methods.lock().push(method.clone());

        let result = match method.as_str() {
            "Target.getTargets" => json!({
                "targetInfos": [
                    {"targetId": "IFRAME-1", "type": "iframe", "title": "", "url": ""},
                    {"targetId": "PAGE-1", "type": "page", "title": "App", "url": "http://127.0.0.1:8000/"},
                ]
            }),
            "Target.attachToTarget" => json!({"sessionId": STUB_SESSION}),
            "Browser.getWindowForTarget" => json!({"windowId": STUB_WINDOW}),
            "Runtime.evaluate" => {
                assert_eq!(
                    frame["sessionId"].as_str(),
                    Some(STUB_SESSION),
                    "evaluate must be session-scoped"
                );
                let expression = frame["params"]["expression"].as_str().unwrap_or_default();
                Self::evaluate(expression, outbox, reply_tx)
            }
            _ => json!({}),
        };

        json!({"id": frame["id"], "result": result})
    }

    /// The two evaluate shapes the host issues: popping the outbox and
    /// delivering a reply through `recv`.
    fn evaluate(
        expression: &str,
        outbox: &Mutex<Vec<Value>>,
        reply_tx: &mpsc::UnboundedSender<Value>,
    ) -> Value {
        if expression == "window.__bridge.outbox.pop()" {
            return match outbox.lock().pop() {
                Some(item) => json!({"result": {"type": "object", "value": item}}),
                None => json!({"result": {"type": "undefined"}}),
            };
        }

        if let Some(payload) = expression
            .strip_prefix("window.__bridge.recv(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let reply: Value = serde_json::from_str(payload).expect("reply payload");
            let _ = reply_tx.send(reply);
            return json!({"result": {"type": "undefined"}});
        }

        json!({"result": {"type": "undefined"}})
    }

    /// Raises a signal through the page's binding.
    fn signal(&self, payload: &str) {
        let _ = self.event_tx.send(json!({
            "method": "Runtime.bindingCalled",
            "params": {"name": "__bridgeSignal", "payload": payload, "executionContextId": 1},
        }));
    }

    /// Pushes a work item into the fake page outbox.
    fn push_work(&self, item: Value) {
        self.outbox.lock().push(item);
    }

    fn recorded_methods(&self) -> Vec<String> {
        self.methods.lock().clone()
    }

    async fn next_reply(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.reply_rx.recv())
            .await
            .expect("reply within deadline")
            .expect("reply channel open")
    }

    async fn expect_no_reply(&mut self) {
        let outcome =
            tokio::time::timeout(Duration::from_millis(200), self.reply_rx.recv()).await;
        assert!(outcome.is_err(), "unexpected reply: {outcome:?}");
    }
}

/// Polls a predicate over the recorded methods until it holds.
async fn wait_for_method(stub: &StubBrowser, method: &str, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let seen = stub
            .recorded_methods()
            .iter()
            .filter(|m| *m == method)
            .count();
        if seen >= count {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {method} x{count}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn null_message_handler() -> MessageHandler {
    Arc::new(|_| async { Value::Null }.boxed())
}

async fn start_bridge(
    stub: &StubBrowser,
    registry: Arc<FunctionRegistry>,
    message_handler: MessageHandler,
    maximize_on_ready: bool,
) -> (Connection, Bridge) {
    let connection = Connection::connect(stub.http_port).await.expect("connect");
    let signals = Bridge::subscribe(&connection);
    let session = bridge::negotiate(&connection).await.expect("negotiate");
    let bridge = Bridge::start(
        connection.clone(),
        session,
        registry,
        message_handler,
        maximize_on_ready,
        signals,
    );
    (connection, bridge)
}

/// Polls until the bridge reports ready.
async fn wait_for_ready(bridge: &Bridge) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !bridge.is_ready() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for ready"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_negotiation_runs_setup_steps_in_order() -> anyhow::Result<()> {
    let stub = StubBrowser::spawn().await;
    let connection = Connection::connect(stub.http_port).await?;
    assert_eq!(connection.info().browser, "StubBrowser/1.0");

    let session = bridge::negotiate(&connection).await?;

    assert_eq!(session.target_id.as_str(), "PAGE-1");
    assert_eq!(session.session_id.as_str(), STUB_SESSION);
    assert_eq!(session.window_id.to_string(), STUB_WINDOW.to_string());

    assert_eq!(
        stub.recorded_methods(),
        vec![
            "Target.getTargets",
            "Target.attachToTarget",
            "Browser.getWindowForTarget",
            "Page.enable",
            "Runtime.addBinding",
            "Page.addScriptToEvaluateOnNewDocument",
            "Runtime.enable",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_ready_transition_is_one_way_and_maximizes_once() {
    let stub = StubBrowser::spawn().await;
    let (_connection, bridge) = start_bridge(
        &stub,
        Arc::new(FunctionRegistry::default()),
        null_message_handler(),
        true,
    )
    .await;

    assert!(!bridge.is_ready());

    stub.signal("ready");
    wait_for_method(&stub, "Browser.setWindowBounds", 1).await;
    assert!(bridge.is_ready());

    // A duplicate ready is logged and ignored; no second placement command.
    stub.signal("ready");
    stub.signal("recv");
    wait_for_method(&stub, "Runtime.evaluate", 1).await;
    let maximize_count = stub
        .recorded_methods()
        .iter()
        .filter(|m| *m == "Browser.setWindowBounds")
        .count();
    assert_eq!(maximize_count, 1);
    assert!(bridge.is_ready());
}

#[tokio::test]
async fn test_ready_raised_during_negotiation_is_not_lost() {
    // The page can announce itself the moment the binding is registered,
    // while the remaining setup commands are still in flight. The signal
    // must buffer until the bridge starts consuming, not be dropped.
    let mut stub = StubBrowser::spawn().await;
    stub.ready_on_add_binding.store(true, Ordering::SeqCst);

    let (_connection, bridge) = start_bridge(
        &stub,
        Arc::new(FunctionRegistry::default()),
        null_message_handler(),
        false,
    )
    .await;

    // No explicit ready signal from the test: the only one was raised
    // mid-negotiation.
    wait_for_ready(&bridge).await;

    // And the bridge drains normally afterwards.
    stub.push_work(json!({"tkn": 0, "msg": "hello", "kind": 0}));
    stub.signal("recv");
    let reply = stub.next_reply().await;
    assert_eq!(reply["tkn"], json!(0));
}

#[tokio::test]
async fn test_message_round_trip() {
    let mut stub = StubBrowser::spawn().await;
    let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
    let seen_clone = Arc::clone(&seen);
    let handler: MessageHandler = Arc::new(move |msg| {
        seen_clone.lock().push(msg);
        async { json!({"pong": true}) }.boxed()
    });

    let (_connection, _bridge) = start_bridge(
        &stub,
        Arc::new(FunctionRegistry::default()),
        handler,
        false,
    )
    .await;

    stub.signal("ready");
    stub.push_work(json!({"tkn": 0, "msg": "ping", "kind": 0}));
    stub.signal("recv");

    let reply = stub.next_reply().await;
    assert_eq!(reply, json!({"tkn": 0, "msg": {"pong": true}}));
    assert_eq!(seen.lock().as_slice(), [json!("ping")]);
}

#[tokio::test]
async fn test_registered_function_round_trip() {
    let mut stub = StubBrowser::spawn().await;
    let registry = Arc::new(FunctionRegistry::default());
    registry.register("add", |args: Value| async move {
        let a = args["a"].as_i64().unwrap_or(0);
        let b = args["b"].as_i64().unwrap_or(0);
        json!(a + b)
    });

    let (_connection, _bridge) =
        start_bridge(&stub, registry, null_message_handler(), false).await;

    stub.signal("ready");
    stub.push_work(json!({"tkn": 1, "fn": "add", "msg": {"a": 2, "b": 3}, "kind": 1}));
    stub.signal("recv");

    let reply = stub.next_reply().await;
    assert_eq!(reply, json!({"tkn": 1, "msg": 5}));
}

#[tokio::test]
async fn test_unregistered_function_gets_no_reply() {
    let mut stub = StubBrowser::spawn().await;
    let (_connection, _bridge) = start_bridge(
        &stub,
        Arc::new(FunctionRegistry::default()),
        null_message_handler(),
        false,
    )
    .await;

    stub.signal("ready");
    stub.push_work(json!({"tkn": 4, "fn": "missing", "msg": null, "kind": 1}));
    stub.signal("recv");

    // The item is consumed but silently dropped; its Promise stays pending.
    wait_for_method(&stub, "Runtime.evaluate", 1).await;
    stub.expect_no_reply().await;
    assert!(stub.outbox.lock().is_empty());

    // The bridge keeps draining afterwards.
    stub.push_work(json!({"tkn": 5, "msg": "still alive", "kind": 0}));
    stub.signal("recv");
    let reply = stub.next_reply().await;
    assert_eq!(reply["tkn"], json!(5));
}

#[tokio::test]
async fn test_recv_before_ready_is_dropped() {
    let mut stub = StubBrowser::spawn().await;
    let (_connection, bridge) = start_bridge(
        &stub,
        Arc::new(FunctionRegistry::default()),
        null_message_handler(),
        false,
    )
    .await;

    stub.push_work(json!({"tkn": 0, "msg": "early", "kind": 0}));
    stub.signal("recv");
    stub.expect_no_reply().await;

    // Nothing was popped: no evaluate command reached the stub.
    assert!(!stub.recorded_methods().iter().any(|m| m == "Runtime.evaluate"));
    assert!(!bridge.is_ready());

    // Once ready, a fresh signal drains the stranded item.
    stub.signal("ready");
    stub.signal("recv");
    let reply = stub.next_reply().await;
    assert_eq!(reply["tkn"], json!(0));
}

#[tokio::test]
async fn test_one_signal_drains_most_recent_item() {
    let mut stub = StubBrowser::spawn().await;
    let (_connection, _bridge) = start_bridge(
        &stub,
        Arc::new(FunctionRegistry::default()),
        null_message_handler(),
        false,
    )
    .await;

    stub.signal("ready");
    stub.push_work(json!({"tkn": 0, "msg": "first", "kind": 0}));
    stub.push_work(json!({"tkn": 1, "msg": "second", "kind": 0}));

    // A single signal pops exactly one item, the most recently pushed.
    stub.signal("recv");
    let reply = stub.next_reply().await;
    assert_eq!(reply["tkn"], json!(1));
    assert_eq!(stub.outbox.lock().len(), 1);

    // The earlier item waits for the next signal.
    stub.signal("recv");
    let reply = stub.next_reply().await;
    assert_eq!(reply["tkn"], json!(0));
}

#[tokio::test]
async fn test_session_scoped_command_requires_session() {
    let stub = StubBrowser::spawn().await;
    let connection = Connection::connect(stub.http_port).await.expect("connect");

    let err = connection
        .send(Command::evaluate("1 + 1"), None)
        .await
        .expect_err("must reject");
    assert!(matches!(err, Error::Precondition { .. }));

    // Scoped properly, the same command goes through.
    let session_id = SessionId::new(STUB_SESSION);
    connection
        .send(Command::evaluate("1 + 1"), Some(&session_id))
        .await
        .expect("scoped evaluate");
}
