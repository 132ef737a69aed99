//! WebSocket transport halves used by the connection task.
//!
//! [`connect`] performs the handshake and returns a ([`WsWriter`], [`WsReader`])
//! pair so reads and writes can be driven from one `tokio::select!` loop.

use {
    anyhow::{Context, Result},
    futures::{
        SinkExt, StreamExt,
        stream::{SplitSink, SplitStream},
    },
    tokio_tungstenite::tungstenite::{self, Message},
};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Received WebSocket message.
#[derive(Debug, PartialEq, Eq)]
pub enum WsMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping(Vec<u8>),
    Pong(Vec<u8>),
    /// Close frame; code 1005 when the peer sent none.
    Close { code: u16, reason: String },
}

/// Write half of a gateway socket.
#[derive(Debug)]
pub struct WsWriter {
    sink: SplitSink<WsStream, Message>,
}

impl WsWriter {
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.sink
            .send(Message::text(text.to_string()))
            .await
            .context("WebSocket send_text failed")
    }

    pub async fn send_pong(&mut self, data: Vec<u8>) -> Result<()> {
        self.sink
            .send(Message::Pong(data.into()))
            .await
            .context("WebSocket send_pong failed")
    }

    /// Send a close frame, then flush and close the sink.
    pub async fn close(&mut self) -> Result<()> {
        self.sink
            .send(Message::Close(None))
            .await
            .context("WebSocket send_close failed")?;
        self.sink.close().await.context("WebSocket close failed")
    }
}

/// Read half of a gateway socket.
#[derive(Debug)]
pub struct WsReader {
    stream: SplitStream<WsStream>,
}

impl WsReader {
    /// Receive the next message, `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<Result<WsMessage>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(anyhow::anyhow!("WebSocket read error: {e}"))),
            };
            let message = match message {
                Message::Text(text) => WsMessage::Text(text.as_str().to_string()),
                Message::Binary(data) => WsMessage::Binary(data.to_vec()),
                Message::Ping(data) => WsMessage::Ping(data.to_vec()),
                Message::Pong(data) => WsMessage::Pong(data.to_vec()),
                Message::Close(frame) => {
                    let (code, reason) = frame
                        .map(|cf| (u16::from(cf.code), cf.reason.as_str().to_string()))
                        .unwrap_or((1005, String::new()));
                    WsMessage::Close { code, reason }
                },
                Message::Frame(_) => continue,
            };
            return Some(Ok(message));
        }
    }
}

/// Open a WebSocket connection to `url`.
///
/// `http://` and `https://` URLs are accepted and mapped to `ws://` and `wss://`.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    use tungstenite::client::IntoClientRequest;

    let url = http_to_ws_scheme(url);
    let request = url
        .as_str()
        .into_client_request()
        .with_context(|| format!("invalid WebSocket URL: {url}"))?;

    let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .with_context(|| format!("WebSocket connect to {url} failed"))?;

    let (sink, stream) = ws_stream.split();
    Ok((WsWriter { sink }, WsReader { stream }))
}

/// Convert an HTTP(S) URL to the WS(S) scheme. WS URLs pass through.
#[must_use]
pub fn http_to_ws_scheme(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        url.to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tokio::net::TcpListener};

    #[test]
    fn scheme_mapping() {
        assert_eq!(http_to_ws_scheme("https://gw.example.com"), "wss://gw.example.com");
        assert_eq!(http_to_ws_scheme("http://127.0.0.1:18789/ws"), "ws://127.0.0.1:18789/ws");
        assert_eq!(http_to_ws_scheme("ws://127.0.0.1:18789"), "ws://127.0.0.1:18789");
        assert_eq!(http_to_ws_scheme("wss://gw.example.com/ws"), "wss://gw.example.com/ws");
    }

    #[tokio::test]
    async fn invalid_url_is_error() {
        assert!(connect("not-a-url").await.is_err());
    }

    #[tokio::test]
    async fn unreachable_host_is_error() {
        assert!(connect("ws://127.0.0.1:1/").await.is_err());
    }

    #[tokio::test]
    async fn exchanges_text_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            let Some(Ok(Message::Text(text))) = ws.next().await else {
                panic!("expected text frame");
            };
            ws.send(Message::text(format!("echo:{}", text.as_str())))
                .await
                .unwrap();
            ws.send(Message::Ping(b"hb".to_vec().into())).await.unwrap();
            ws.close(None).await.unwrap();
        });

        let (mut writer, mut reader) = connect(&format!("ws://{addr}")).await.unwrap();
        writer.send_text("hello").await.unwrap();
        assert_eq!(
            reader.recv().await.unwrap().unwrap(),
            WsMessage::Text("echo:hello".into())
        );
        assert_eq!(
            reader.recv().await.unwrap().unwrap(),
            WsMessage::Ping(b"hb".to_vec())
        );
        assert!(matches!(
            reader.recv().await.unwrap().unwrap(),
            WsMessage::Close { code: 1005, .. }
        ));
        server.await.unwrap();
    }
}
