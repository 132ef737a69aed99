//! Connection task: owns the socket, runs the handshake, routes inbound
//! frames to the pending table and reconnects forever until cancelled.

use std::{fmt, ops::ControlFlow, sync::Arc, time::Duration};

use {
    botch_protocol::{
        ClientInfo, ConnectAuth, ConnectParams, Frame, PROTOCOL_VERSION, RequestFrame,
        ResponseFrame, decode, encode, methods,
    },
    secrecy::ExposeSecret,
    tokio::{
        sync::{mpsc, watch},
        time::{Instant, sleep, sleep_until, timeout},
    },
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, trace, warn},
};

use crate::{
    client::ClientOptions,
    error::Error,
    pending::PendingRequests,
    ws::{self, WsMessage, WsWriter},
};

/// Upper bound on waiting for our close frame to go out.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Longest frame excerpt written to logs.
const LOG_FRAME_CHARS: usize = 256;

/// Connection lifecycle as observed by consumers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Socket open, handshake not yet accepted.
    SocketOpen,
    Authenticated,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::SocketOpen => "socket_open",
            Self::Authenticated => "authenticated",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An encoded request queued by the facade for the live socket.
#[derive(Debug)]
pub(crate) struct Outbound {
    pub id: String,
    pub text: String,
}

/// Handshake progress within one socket session.
#[derive(Debug)]
enum Handshake {
    /// Waiting for `connect.challenge`; `connect` goes out at `deadline` regardless.
    AwaitingChallenge { deadline: Instant },
    /// `connect` sent as request `id`; the socket is dropped if no answer by `deadline`.
    Connecting { id: String, deadline: Instant },
    Done,
}

impl Handshake {
    fn deadline(&self) -> Option<Instant> {
        match self {
            Self::AwaitingChallenge { deadline } | Self::Connecting { deadline, .. } => {
                Some(*deadline)
            },
            Self::Done => None,
        }
    }
}

enum SessionEnd {
    Cancelled,
    Lost(String),
}

pub(crate) struct ConnectionManager {
    options: Arc<ClientOptions>,
    /// Device identity id, sent as `client.instanceId`.
    instance_id: String,
    pending: Arc<PendingRequests>,
    state: watch::Sender<ConnectionState>,
    outbound: mpsc::UnboundedReceiver<Outbound>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    pub(crate) fn new(
        options: Arc<ClientOptions>,
        instance_id: String,
        pending: Arc<PendingRequests>,
        state: watch::Sender<ConnectionState>,
        outbound: mpsc::UnboundedReceiver<Outbound>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            options,
            instance_id,
            pending,
            state,
            outbound,
            cancel,
        }
    }

    /// Connect, serve, and reconnect after `reconnect_delay` until cancelled.
    pub(crate) async fn run(mut self) {
        loop {
            let reason = match self.session().await {
                SessionEnd::Cancelled => break,
                SessionEnd::Lost(reason) => reason,
            };
            self.disconnect();

            let delay = self.options.reconnect_delay;
            warn!(
                reason = %reason,
                delay_ms = delay.as_millis() as u64,
                "gateway connection lost, reconnecting"
            );
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = sleep(delay) => {},
            }
        }
        self.disconnect();
        info!("gateway client stopped");
    }

    /// One socket lifetime: connect, handshake, then relay frames until the
    /// socket fails or the client is cancelled.
    async fn session(&mut self) -> SessionEnd {
        let url = self.options.url.clone();
        debug!(url = %url, "connecting to gateway");
        let connected = tokio::select! {
            () = self.cancel.cancelled() => return SessionEnd::Cancelled,
            result = ws::connect(&url) => result,
        };
        let (mut writer, mut reader) = match connected {
            Ok(halves) => halves,
            Err(e) => return SessionEnd::Lost(format!("{e:#}")),
        };
        self.state.send_replace(ConnectionState::SocketOpen);
        info!(url = %url, "gateway socket open, waiting for challenge");

        let mut handshake = Handshake::AwaitingChallenge {
            deadline: Instant::now() + self.options.challenge_grace,
        };
        let end = loop {
            let deadline = handshake.deadline();
            let step = tokio::select! {
                () = self.cancel.cancelled() => break SessionEnd::Cancelled,
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline(&mut writer, &mut handshake).await
                },
                frame = self.outbound.recv(), if matches!(handshake, Handshake::Done) => match frame {
                    Some(frame) => self.forward(&mut writer, frame).await,
                    None => break SessionEnd::Cancelled,
                },
                message = reader.recv() => match message {
                    Some(Ok(message)) => self.on_message(&mut writer, &mut handshake, message).await,
                    Some(Err(e)) => ControlFlow::Break(format!("{e:#}")),
                    None => ControlFlow::Break("socket stream ended".into()),
                },
            };
            if let ControlFlow::Break(reason) = step {
                break SessionEnd::Lost(reason);
            }
        };

        match timeout(CLOSE_TIMEOUT, writer.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => trace!(error = %e, "gateway socket close failed"),
            Err(_) => debug!("timed out closing gateway socket"),
        }
        end
    }

    /// Fail everything in flight and publish `Disconnected`.
    fn disconnect(&self) {
        let flushed = self.pending.flush(|| Error::Disconnected);
        let previous = self.state.send_replace(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected || flushed > 0 {
            info!(flushed, "gateway disconnected");
        }
    }

    async fn on_deadline(
        &self,
        writer: &mut WsWriter,
        handshake: &mut Handshake,
    ) -> ControlFlow<String> {
        match handshake {
            Handshake::AwaitingChallenge { .. } => {
                debug!(
                    grace_ms = self.options.challenge_grace.as_millis() as u64,
                    "no connect challenge received, sending connect"
                );
                self.begin_connect(writer, handshake).await
            },
            Handshake::Connecting { id, .. } => {
                warn!(id = %id, "connect handshake timed out");
                ControlFlow::Break("connect handshake timed out".into())
            },
            Handshake::Done => ControlFlow::Continue(()),
        }
    }

    async fn on_message(
        &self,
        writer: &mut WsWriter,
        handshake: &mut Handshake,
        message: WsMessage,
    ) -> ControlFlow<String> {
        match message {
            WsMessage::Text(text) => self.on_text(writer, handshake, &text).await,
            WsMessage::Ping(data) => match writer.send_pong(data).await {
                Ok(()) => ControlFlow::Continue(()),
                Err(e) => ControlFlow::Break(format!("{e:#}")),
            },
            WsMessage::Pong(data) => {
                trace!(len = data.len(), "pong received");
                ControlFlow::Continue(())
            },
            WsMessage::Binary(data) => {
                debug!(len = data.len(), "ignoring binary gateway frame");
                ControlFlow::Continue(())
            },
            WsMessage::Close { code, reason } => {
                info!(code, reason = %reason, "gateway closed the connection");
                ControlFlow::Break(format!("closed by gateway ({code}): {reason}"))
            },
        }
    }

    async fn on_text(
        &self,
        writer: &mut WsWriter,
        handshake: &mut Handshake,
        text: &str,
    ) -> ControlFlow<String> {
        let frame = match decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, frame = %excerpt(text), "dropping undecodable gateway frame");
                return ControlFlow::Continue(());
            },
        };
        trace!(frame = %excerpt(text), "gateway frame received");

        if let Some(nonce) = frame.challenge_nonce() {
            if !matches!(handshake, Handshake::AwaitingChallenge { .. }) {
                debug!("ignoring connect challenge, handshake already started");
                return ControlFlow::Continue(());
            }
            // Auth is token based; the nonce does not outlive this attempt.
            debug!(has_nonce = nonce.is_some(), "received connect challenge");
            return self.begin_connect(writer, handshake).await;
        }

        match frame {
            Frame::Res(response) => self.on_response(handshake, response),
            Frame::Event(event) => {
                trace!(event = %event.event, seq = ?event.seq, "ignoring gateway event");
                ControlFlow::Continue(())
            },
            Frame::Req(request) => {
                debug!(id = %request.id, method = %request.method, "ignoring request from gateway");
                ControlFlow::Continue(())
            },
        }
    }

    fn on_response(&self, handshake: &mut Handshake, response: ResponseFrame) -> ControlFlow<String> {
        let is_connect =
            matches!(&*handshake, Handshake::Connecting { id, .. } if *id == response.id);
        if !is_connect {
            self.pending.resolve(response);
            return ControlFlow::Continue(());
        }

        if response.ok {
            *handshake = Handshake::Done;
            self.pending.open();
            self.state.send_replace(ConnectionState::Authenticated);
            info!(url = %self.options.url, "gateway connection authenticated");
            return ControlFlow::Continue(());
        }

        let error = response.error.unwrap_or_default();
        let message = error.message_or_default();
        warn!(code = ?error.code, message, "gateway rejected connect");
        ControlFlow::Break(format!("connect rejected: {message}"))
    }

    /// Send `connect` and arm the handshake response deadline.
    async fn begin_connect(
        &self,
        writer: &mut WsWriter,
        handshake: &mut Handshake,
    ) -> ControlFlow<String> {
        let id = self.pending.next_id();
        if let Err(e) = self.send_connect(writer, &id).await {
            return ControlFlow::Break(format!("failed to send connect: {e:#}"));
        }
        *handshake = Handshake::Connecting {
            id,
            deadline: Instant::now() + self.options.request_timeout,
        };
        ControlFlow::Continue(())
    }

    async fn send_connect(&self, writer: &mut WsWriter, id: &str) -> anyhow::Result<()> {
        let params = serde_json::to_value(self.connect_params())?;
        let text = encode(&Frame::from(RequestFrame::new(id, methods::CONNECT, params)))?;
        info!(
            id,
            role = %self.options.role,
            has_token = self.options.token.is_some(),
            "sending connect"
        );
        writer.send_text(&text).await
    }

    fn connect_params(&self) -> ConnectParams {
        let client = &self.options.client;
        ConnectParams {
            min_protocol: PROTOCOL_VERSION,
            max_protocol: PROTOCOL_VERSION,
            client: ClientInfo {
                id: client.id.clone(),
                version: client.version.clone(),
                platform: client.platform.clone(),
                mode: client.mode.clone(),
                instance_id: Some(self.instance_id.clone()),
            },
            role: Some(self.options.role.clone()),
            scopes: Some(self.options.scopes.clone()),
            caps: self.options.caps.clone(),
            auth: Some(ConnectAuth {
                token: self
                    .options
                    .token
                    .as_ref()
                    .map(|token| token.expose_secret().clone()),
            }),
        }
    }

    /// Write a queued request, unless it stopped being pending (timed out,
    /// abandoned, or flushed with an earlier socket).
    async fn forward(&self, writer: &mut WsWriter, frame: Outbound) -> ControlFlow<String> {
        if !self.pending.contains(&frame.id) {
            debug!(id = %frame.id, "dropping frame for request no longer pending");
            return ControlFlow::Continue(());
        }
        trace!(id = %frame.id, "sending request frame");
        match writer.send_text(&frame.text).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(e) => ControlFlow::Break(format!("{e:#}")),
        }
    }
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= LOG_FRAME_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(LOG_FRAME_CHARS).collect();
    cut.push('…');
    cut
}
