//! Public facade: start the client, submit calls, observe authentication.

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    botch_protocol::{
        CHALLENGE_GRACE_MS, Frame, RECONNECT_DELAY_MS, REQUEST_TIMEOUT_MS, RequestFrame, encode,
        roles, scopes,
    },
    secrecy::SecretString,
    tokio::{
        sync::{mpsc, watch},
        task::JoinHandle,
        time::timeout,
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, warn},
};

use crate::{
    connection::{ConnectionManager, ConnectionState, Outbound},
    error::{Error, Result},
    identity::{DeviceIdentity, IdentityStore},
    pending::{PendingGuard, PendingRequests},
};

/// Client descriptor sent in the `connect` handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDescriptor {
    pub id: String,
    pub version: String,
    pub platform: String,
    pub mode: String,
}

impl Default for ClientDescriptor {
    fn default() -> Self {
        Self {
            id: "gateway-client".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            platform: std::env::consts::OS.into(),
            mode: "backend".into(),
        }
    }
}

/// Everything the client needs from its host process.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Gateway WebSocket URL (`ws://`, `wss://`, or `http(s)://`).
    pub url: String,
    pub token: Option<SecretString>,
    /// Where the device identity is persisted; `None` keeps it in memory.
    pub identity_path: Option<PathBuf>,
    pub client: ClientDescriptor,
    pub role: String,
    pub scopes: Vec<String>,
    pub caps: Vec<String>,
    /// Wait for `connect.challenge` before sending `connect` unprompted.
    pub challenge_grace: Duration,
    pub reconnect_delay: Duration,
    /// Per-request deadline, also applied to the handshake response.
    pub request_timeout: Duration,
}

impl ClientOptions {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            identity_path: None,
            client: ClientDescriptor::default(),
            role: roles::OPERATOR.into(),
            scopes: vec![scopes::ADMIN.into()],
            caps: Vec::new(),
            challenge_grace: Duration::from_millis(CHALLENGE_GRACE_MS),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::new(token.into()));
        self
    }

    pub fn with_identity_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_path = Some(path.into());
        self
    }

    pub fn with_client(mut self, client: ClientDescriptor) -> Self {
        self.client = client;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_caps(mut self, caps: Vec<String>) -> Self {
        self.caps = caps;
        self
    }

    pub fn with_challenge_grace(mut self, grace: Duration) -> Self {
        self.challenge_grace = grace;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_request_timeout(mut self, limit: Duration) -> Self {
        self.request_timeout = limit;
        self
    }
}

/// Handle to a running gateway connection.
///
/// [`start`](Self::start) spawns the connection task, which keeps a socket
/// open and reconnects for as long as the handle lives. Calls are multiplexed
/// over that socket and may be issued concurrently from any task.
pub struct GatewayClient {
    options: Arc<ClientOptions>,
    identity: Arc<IdentityStore>,
    pending: Arc<PendingRequests>,
    state: watch::Receiver<ConnectionState>,
    outbound: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl GatewayClient {
    /// Spawn the connection task. Must be called inside a tokio runtime.
    pub fn start(options: ClientOptions) -> Self {
        let options = Arc::new(options);
        let identity = Arc::new(match &options.identity_path {
            Some(path) => IdentityStore::new(path),
            None => IdentityStore::ephemeral(),
        });
        let instance_id = identity.get_or_create().id.to_string();
        let pending = Arc::new(PendingRequests::new());
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let manager = ConnectionManager::new(
            Arc::clone(&options),
            instance_id,
            Arc::clone(&pending),
            state_tx,
            outbound_rx,
            cancel.clone(),
        );
        let task = tokio::spawn(manager.run());

        Self {
            options,
            identity,
            pending,
            state: state_rx,
            outbound: outbound_tx,
            cancel,
            task: Some(task),
        }
    }

    /// Call `method` on the gateway and wait for its payload.
    ///
    /// Fails immediately with [`Error::NotConnected`] unless authenticated;
    /// nothing is queued while disconnected.
    pub async fn submit(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let (id, receiver) = self.pending.register(method)?;
        let _guard = PendingGuard::new(&self.pending, id.clone());

        let frame = Frame::from(RequestFrame::new(id.clone(), method, params));
        let text = encode(&frame).map_err(|e| Error::Encode(e.to_string()))?;
        self.outbound
            .send(Outbound {
                id: id.clone(),
                text,
            })
            .map_err(|_| Error::Transport("connection task stopped".into()))?;
        debug!(id = %id, method, "request submitted");

        let limit = self.options.request_timeout;
        match timeout(limit, receiver).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::Disconnected),
            Err(_) => {
                warn!(id = %id, method, timeout_ms = limit.as_millis() as u64, "request timed out");
                Err(Error::timeout(method, limit))
            },
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state() == ConnectionState::Authenticated
    }

    /// A receiver notified on every state transition.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait up to `limit` for the connection to authenticate.
    pub async fn wait_authenticated(&self, limit: Duration) -> bool {
        let mut state = self.state.clone();
        timeout(
            limit,
            state.wait_for(|s| *s == ConnectionState::Authenticated),
        )
        .await
        .is_ok_and(|waited| waited.is_ok())
    }

    /// The device identity presented to the gateway, created on first use.
    pub fn identity(&self) -> &DeviceIdentity {
        self.identity.get_or_create()
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Stop the connection task, failing anything still in flight.
    pub async fn shutdown(mut self) {
        if !self.pending.is_empty() {
            debug!(in_flight = self.pending.len(), "shutting down with requests in flight");
        }
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "gateway connection task failed");
        }
    }
}

impl Drop for GatewayClient {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        futures::{SinkExt, StreamExt},
        serde_json::{Value, json},
        tokio::net::{TcpListener, TcpStream},
        tokio_tungstenite::{WebSocketStream, tungstenite::Message},
    };

    type ServerWs = WebSocketStream<TcpStream>;

    const WAIT: Duration = Duration::from_secs(5);

    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        (listener, url)
    }

    /// Options for tests: the challenge grace is long enough that a quick
    /// handshake can only come from the challenge path.
    fn options(url: &str) -> ClientOptions {
        ClientOptions::new(url)
            .with_token("secret")
            .with_challenge_grace(Duration::from_secs(10))
            .with_reconnect_delay(Duration::from_millis(50))
    }

    async fn accept(listener: &TcpListener) -> ServerWs {
        let (tcp, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        tokio_tungstenite::accept_async(tcp).await.unwrap()
    }

    async fn send_json(ws: &mut ServerWs, value: Value) {
        ws.send(Message::text(value.to_string())).await.unwrap();
    }

    /// Next text frame from the client, parsed.
    async fn read_frame(ws: &mut ServerWs) -> Value {
        loop {
            match timeout(WAIT, ws.next()).await.unwrap() {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
                Some(Ok(_)) => continue,
                other => panic!("client socket ended: {other:?}"),
            }
        }
    }

    async fn reply_ok(ws: &mut ServerWs, id: &Value, payload: Value) {
        send_json(ws, json!({"type": "res", "id": id, "ok": true, "payload": payload})).await;
    }

    async fn send_challenge(ws: &mut ServerWs, nonce: &str) {
        send_json(
            ws,
            json!({"type": "event", "event": "connect.challenge", "payload": {"nonce": nonce, "ts": 1}}),
        )
        .await;
    }

    /// Accept a connection and complete a challenge handshake.
    async fn accept_authenticated(listener: &TcpListener) -> ServerWs {
        let mut ws = accept(listener).await;
        send_challenge(&mut ws, "abc").await;
        let connect = read_frame(&mut ws).await;
        assert_eq!(connect["method"], "connect");
        reply_ok(&mut ws, &connect["id"], json!({"type": "hello-ok"})).await;
        ws
    }

    /// Assert the client writes no text frame for `window`.
    async fn assert_quiet(ws: &mut ServerWs, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, ws.next()).await {
                Err(_) => return,
                Ok(Some(Ok(Message::Text(text)))) => panic!("unexpected frame: {}", text.as_str()),
                Ok(Some(Ok(_))) => continue,
                Ok(other) => panic!("client socket ended: {other:?}"),
            }
        }
    }

    async fn start_authenticated(options: ClientOptions, listener: &TcpListener) -> (GatewayClient, ServerWs) {
        let client = GatewayClient::start(options);
        let ws = accept_authenticated(listener).await;
        assert!(client.wait_authenticated(WAIT).await);
        (client, ws)
    }

    #[tokio::test]
    async fn challenge_triggers_single_connect() {
        let (listener, url) = bind().await;
        let client = GatewayClient::start(options(&url));

        let mut ws = accept(&listener).await;
        send_challenge(&mut ws, "abc").await;
        let connect = read_frame(&mut ws).await;
        assert_eq!(connect["type"], "req");
        assert_eq!(connect["method"], "connect");
        assert_eq!(connect["id"], "req-1");
        let params = &connect["params"];
        assert_eq!(params["minProtocol"], 3);
        assert_eq!(params["maxProtocol"], 3);
        assert_eq!(params["client"]["id"], "gateway-client");
        assert_eq!(params["client"]["instanceId"], client.identity().id.to_string());
        assert_eq!(params["role"], "operator");
        assert_eq!(params["scopes"], json!(["operator.admin"]));
        assert_eq!(params["auth"]["token"], "secret");
        assert!(!client.is_authenticated());

        reply_ok(&mut ws, &connect["id"], json!({})).await;
        assert!(client.wait_authenticated(WAIT).await);
        assert_eq!(client.state(), ConnectionState::Authenticated);

        // The next frame on the wire is the call, not a second connect.
        let call = client.submit("health", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            assert_eq!(req["method"], "health");
            reply_ok(&mut ws, &req["id"], json!({"ok": true})).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn fallback_connect_without_challenge() {
        let (listener, url) = bind().await;
        let client = GatewayClient::start(
            options(&url).with_challenge_grace(Duration::from_millis(100)),
        );

        let mut ws = accept(&listener).await;
        let connect = read_frame(&mut ws).await;
        assert_eq!(connect["method"], "connect");
        reply_ok(&mut ws, &connect["id"], json!({})).await;
        assert!(client.wait_authenticated(WAIT).await);

        // A challenge arriving after the handshake must not start another one.
        send_challenge(&mut ws, "late").await;
        let call = client.submit("status", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            assert_eq!(req["method"], "status");
            reply_ok(&mut ws, &req["id"], json!("fine")).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!("fine"));
    }

    #[tokio::test]
    async fn challenge_disarms_fallback_timer() {
        let (listener, url) = bind().await;
        let client = GatewayClient::start(
            options(&url).with_challenge_grace(Duration::from_millis(100)),
        );

        let mut ws = accept(&listener).await;
        send_challenge(&mut ws, "first").await;
        let connect = read_frame(&mut ws).await;
        assert_eq!(connect["method"], "connect");

        // Well past the grace period: the timer must not send its own connect.
        assert_quiet(&mut ws, Duration::from_millis(500)).await;
        send_challenge(&mut ws, "second").await;
        assert_quiet(&mut ws, Duration::from_millis(200)).await;
        assert!(!client.is_authenticated());

        reply_ok(&mut ws, &connect["id"], json!({})).await;
        assert!(client.wait_authenticated(WAIT).await);

        let call = client.submit("health", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            assert_eq!(req["method"], "health");
            reply_ok(&mut ws, &req["id"], json!(true)).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!(true));
    }

    #[tokio::test]
    async fn challenge_during_fallback_connect_is_ignored() {
        let (listener, url) = bind().await;
        let client = GatewayClient::start(
            options(&url).with_challenge_grace(Duration::from_millis(100)),
        );

        let mut ws = accept(&listener).await;
        let connect = read_frame(&mut ws).await;
        assert_eq!(connect["method"], "connect");

        // The fallback connect is still unanswered.
        send_challenge(&mut ws, "late").await;
        assert_quiet(&mut ws, Duration::from_millis(300)).await;

        reply_ok(&mut ws, &connect["id"], json!({})).await;
        assert!(client.wait_authenticated(WAIT).await);

        let call = client.submit("status", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            assert_eq!(req["method"], "status");
            reply_ok(&mut ws, &req["id"], json!("fine")).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!("fine"));
    }

    #[tokio::test]
    async fn cron_list_round_trip() {
        let (listener, url) = bind().await;
        let (client, mut ws) = start_authenticated(options(&url), &listener).await;

        let call = client.submit("cron.list", json!({"includeDisabled": true}));
        let server = async {
            let req = read_frame(&mut ws).await;
            assert_eq!(req["type"], "req");
            assert_eq!(req["method"], "cron.list");
            assert_eq!(req["params"], json!({"includeDisabled": true}));
            assert!(req["id"].as_str().unwrap().starts_with("req-"));
            reply_ok(&mut ws, &req["id"], json!({"jobs": []})).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!({"jobs": []}));
        assert!(client.pending.is_empty());
    }

    #[tokio::test]
    async fn out_of_order_responses_match_by_id() {
        let (listener, url) = bind().await;
        let (client, mut ws) = start_authenticated(options(&url), &listener).await;

        let server = async {
            let mut requests = Vec::new();
            for _ in 0..3 {
                requests.push(read_frame(&mut ws).await);
            }
            for req in requests.iter().rev() {
                reply_ok(&mut ws, &req["id"], json!({"method": req["method"]})).await;
            }
        };
        let (a, b, c, ()) = tokio::join!(
            client.submit("a", json!({})),
            client.submit("b", json!({})),
            client.submit("c", json!({})),
            server,
        );
        assert_eq!(a.unwrap()["method"], "a");
        assert_eq!(b.unwrap()["method"], "b");
        assert_eq!(c.unwrap()["method"], "c");
    }

    #[tokio::test]
    async fn server_rejection_carries_message() {
        let (listener, url) = bind().await;
        let (client, mut ws) = start_authenticated(options(&url), &listener).await;

        let call = client.submit("nope", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            send_json(
                &mut ws,
                json!({"type": "res", "id": req["id"], "ok": false,
                       "error": {"code": "INVALID_REQUEST", "message": "unknown method: nope"}}),
            )
            .await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap_err(), Error::ServerRejected {
            message: "unknown method: nope".into(),
            code: Some("INVALID_REQUEST".into()),
            retryable: false,
        });

        let call = client.submit("nope", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            send_json(&mut ws, json!({"type": "res", "id": req["id"], "ok": false})).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap_err().to_string(), "request failed");
    }

    #[tokio::test]
    async fn timeout_removes_pending_request() {
        let (listener, url) = bind().await;
        let (client, mut ws) = start_authenticated(
            options(&url).with_request_timeout(Duration::from_millis(300)),
            &listener,
        )
        .await;

        let call = client.submit("slow", json!({}));
        let server = async { read_frame(&mut ws).await };
        let (result, stale) = tokio::join!(call, server);
        assert_eq!(result.unwrap_err(), Error::Timeout {
            method: "slow".into(),
            after_ms: 300,
        });
        assert!(client.pending.is_empty());

        // A late answer for the expired id is dropped; the next call is unaffected.
        reply_ok(&mut ws, &stale["id"], json!("late")).await;
        let call = client.submit("fast", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            assert_ne!(req["id"], stale["id"]);
            reply_ok(&mut ws, &req["id"], json!("fresh")).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!("fresh"));
    }

    #[tokio::test]
    async fn disconnect_flushes_then_reconnects() {
        let (listener, url) = bind().await;
        let (client, mut ws) = start_authenticated(options(&url), &listener).await;

        let server = async {
            read_frame(&mut ws).await;
            read_frame(&mut ws).await;
            drop(ws);
        };
        let (a, b, ()) = tokio::join!(
            client.submit("a", json!({})),
            client.submit("b", json!({})),
            server,
        );
        assert_eq!(a.unwrap_err(), Error::Disconnected);
        assert_eq!(b.unwrap_err(), Error::Disconnected);
        assert!(client.pending.is_empty());

        let mut ws = accept_authenticated(&listener).await;
        assert!(client.wait_authenticated(WAIT).await);
        let call = client.submit("again", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            reply_ok(&mut ws, &req["id"], json!(1)).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn submit_while_disconnected_fails_fast() {
        // Reserve a port, then free it so nothing is listening.
        let (listener, url) = bind().await;
        drop(listener);

        let client = GatewayClient::start(options(&url));
        assert_eq!(
            client.submit("cron.list", json!({})).await.unwrap_err(),
            Error::NotConnected
        );
        assert!(!client.is_authenticated());
        assert!(client.pending.is_empty());
    }

    #[tokio::test]
    async fn submit_before_handshake_sends_nothing() {
        let (listener, url) = bind().await;
        let client = GatewayClient::start(options(&url));
        let mut ws = accept(&listener).await;

        let mut state = client.watch_state();
        timeout(WAIT, state.wait_for(|s| *s == ConnectionState::SocketOpen))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            client.submit("cron.list", json!({})).await.unwrap_err(),
            Error::NotConnected
        );
        assert!(
            timeout(Duration::from_millis(200), ws.next()).await.is_err(),
            "no frame may reach the gateway"
        );
    }

    #[tokio::test]
    async fn rejected_connect_reconnects() {
        let (listener, url) = bind().await;
        let client = GatewayClient::start(options(&url));

        let mut ws = accept(&listener).await;
        send_challenge(&mut ws, "abc").await;
        let connect = read_frame(&mut ws).await;
        send_json(
            &mut ws,
            json!({"type": "res", "id": connect["id"], "ok": false,
                   "error": {"code": "INVALID_REQUEST", "message": "bad token"}}),
        )
        .await;
        assert!(!client.wait_authenticated(Duration::from_millis(100)).await);

        let _ws = accept_authenticated(&listener).await;
        assert!(client.wait_authenticated(WAIT).await);
    }

    #[tokio::test]
    async fn malformed_frames_are_ignored() {
        let (listener, url) = bind().await;
        let (client, mut ws) = start_authenticated(options(&url), &listener).await;

        let call = client.submit("health", json!({}));
        let server = async {
            let req = read_frame(&mut ws).await;
            ws.send(Message::text("{not json")).await.unwrap();
            send_json(&mut ws, json!({"type": "mystery"})).await;
            send_json(&mut ws, json!({"type": "res", "id": "req-999", "ok": true})).await;
            send_json(&mut ws, json!({"type": "event", "event": "tick", "payload": {}})).await;
            reply_ok(&mut ws, &req["id"], json!("alive")).await;
        };
        let (result, ()) = tokio::join!(call, server);
        assert_eq!(result.unwrap(), json!("alive"));
        assert!(client.is_authenticated());
    }

    #[tokio::test]
    async fn ping_is_answered() {
        let (listener, url) = bind().await;
        let (_client, mut ws) = start_authenticated(options(&url), &listener).await;

        ws.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();
        loop {
            match timeout(WAIT, ws.next()).await.unwrap() {
                Some(Ok(Message::Pong(data))) => {
                    assert_eq!(&data[..], b"hb");
                    break;
                },
                Some(Ok(_)) => continue,
                other => panic!("client socket ended: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn shutdown_closes_socket() {
        let (listener, url) = bind().await;
        let (client, mut ws) = start_authenticated(options(&url), &listener).await;

        client.shutdown().await;
        loop {
            match timeout(WAIT, ws.next()).await.unwrap() {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    }

    #[tokio::test]
    async fn identity_persists_at_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device-identity.json");
        let (listener, url) = bind().await;
        drop(listener);

        let first = GatewayClient::start(options(&url).with_identity_path(&path));
        let id = first.identity().id;
        first.shutdown().await;

        let second = GatewayClient::start(options(&url).with_identity_path(&path));
        assert_eq!(second.identity().id, id);
    }

    #[tokio::test]
    async fn identity_is_created_before_the_task_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("device-identity.json");

        // The current-thread test runtime has not polled the spawned task yet.
        let client = GatewayClient::start(
            ClientOptions::new("ws://127.0.0.1:1").with_identity_path(&path),
        );
        assert!(path.exists());
        let saved = std::fs::read_to_string(&path).unwrap();
        assert!(saved.contains(&client.identity().id.to_string()));
        client.shutdown().await;
    }
}
