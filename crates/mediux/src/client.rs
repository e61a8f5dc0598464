//! WebSocket client for the MediUX change feed.
//!
//! [`MediuxWsClient::connect`] opens `wss://<host>/websocket?access_token=…`
//! and subscribes to the `show_sets` collection before handing the stream
//! back.

use futures::SinkExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::error::MediuxError;
use crate::messages::OutgoingMessage;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for the change feed.
#[derive(Clone)]
pub struct MediuxWsClient {
    ws_base: String,
    token: String,
}

/// A live, subscribed connection.
pub struct MediuxConnection {
    pub ws_stream: WsStream,
}

impl MediuxWsClient {
    /// `base_url` is the HTTP(S) host; the scheme is switched to ws(s).
    pub fn new(base_url: &str, token: impl Into<String>) -> Self {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        };
        Self {
            ws_base,
            token: token.into(),
        }
    }

    pub fn from_api(api: &crate::api::MediuxApi) -> Self {
        Self::new(api.base_url(), api.token())
    }

    /// Endpoint without credentials, for logs.
    pub fn display_url(&self) -> String {
        format!("{}/websocket", self.ws_base)
    }

    fn url(&self) -> String {
        format!("{}/websocket?access_token={}", self.ws_base, self.token)
    }

    /// Connect and send the subscribe frame.
    pub async fn connect(&self) -> Result<MediuxConnection, MediuxError> {
        let (mut ws_stream, _response) = connect_async(self.url()).await.map_err(|e| {
            MediuxError::Connection(format!(
                "Failed to connect to MediUX at {}: {e}",
                self.display_url()
            ))
        })?;

        ws_stream
            .send(Message::Text(OutgoingMessage::subscribe().to_json()))
            .await
            .map_err(|e| MediuxError::Connection(format!("Failed to subscribe: {e}")))?;

        tracing::info!(url = %self.display_url(), "Connected to MediUX change feed");
        Ok(MediuxConnection { ws_stream })
    }
}
