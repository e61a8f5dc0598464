//! WebSocket message processing loop.
//!
//! Reads frames from the change feed, answers pings inline, and hands each
//! `update` event to a [`SetUpdateHandler`]. An event is processed to
//! completion before the next frame is read.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::WsStream;
use crate::messages::{parse_message, MediuxMessage, OutgoingMessage};

/// Receives the ids of sets that changed upstream.
#[async_trait]
pub trait SetUpdateHandler: Send + Sync {
    async fn on_sets_updated(&self, set_ids: &[String]);
}

/// Process frames until the socket closes, errors, or `cancel` fires.
pub async fn process_messages(
    ws_stream: &mut WsStream,
    handler: &dyn SetUpdateHandler,
    cancel: &CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = ws_stream.close(None).await;
                return;
            }
            next = ws_stream.next() => next,
        };

        let Some(msg_result) = next else {
            tracing::info!("MediUX WebSocket stream ended");
            return;
        };

        match msg_result {
            Ok(Message::Text(text)) => {
                if let Some(reply) = handle_text_message(&text, handler).await {
                    if let Err(e) = ws_stream.send(Message::Text(reply.to_json())).await {
                        tracing::error!(error = %e, "WebSocket send error");
                        return;
                    }
                }
            }
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "MediUX WebSocket closed");
                return;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::error!(error = %e, "WebSocket receive error");
                return;
            }
        }
    }
}

/// Act on one text frame; returns the reply to send, if any.
pub async fn handle_text_message(
    text: &str,
    handler: &dyn SetUpdateHandler,
) -> Option<OutgoingMessage> {
    match parse_message(text) {
        Ok(MediuxMessage::Ping) => Some(OutgoingMessage::Pong),
        Ok(MediuxMessage::Init) => {
            tracing::debug!("Subscription initialised");
            None
        }
        Ok(MediuxMessage::Update { set_ids }) => {
            tracing::info!(count = set_ids.len(), ?set_ids, "Poster sets updated upstream");
            if !set_ids.is_empty() {
                handler.on_sets_updated(&set_ids).await;
            }
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring unexpected MediUX message");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl SetUpdateHandler for Recorder {
        async fn on_sets_updated(&self, set_ids: &[String]) {
            self.seen.lock().unwrap().push(set_ids.to_vec());
        }
    }

    #[tokio::test]
    async fn ping_gets_pong() {
        let recorder = Recorder::default();
        let reply = handle_text_message(r#"{"type":"ping"}"#, &recorder).await;
        assert!(matches!(reply, Some(OutgoingMessage::Pong)));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_reaches_handler() {
        let recorder = Recorder::default();
        let reply = handle_text_message(
            r#"{"type":"subscription","event":"update","data":[{"id":"999"}]}"#,
            &recorder,
        )
        .await;
        assert!(reply.is_none());
        assert_eq!(*recorder.seen.lock().unwrap(), vec![vec!["999".to_string()]]);
    }

    #[tokio::test]
    async fn init_and_unknown_are_ignored() {
        let recorder = Recorder::default();
        for text in [
            r#"{"type":"subscription","event":"init","data":[{"id":1}]}"#,
            r#"{"type":"mystery"}"#,
            "garbage",
        ] {
            assert!(handle_text_message(text, &recorder).await.is_none());
        }
        assert!(recorder.seen.lock().unwrap().is_empty());
    }
}
