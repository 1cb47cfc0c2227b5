use axum::{
    extract::{
        State,
        WebSocketUpgrade,
        ws,
    },
    response::IntoResponse,
};
use gps_tracker_types::live::{
    LiveEvent,
    ServerToClientMessage,
};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::api::Api;

pub async fn get_live(State(api): State<Api>, upgrade: WebSocketUpgrade) -> impl IntoResponse {
    upgrade.on_upgrade(async move |websocket| {
        WebSocketHandler::new(api, websocket).run().await;
    })
}

/// Forwards every live event to one websocket client.
#[derive(Debug)]
struct WebSocketHandler {
    api: Api,
    websocket: WebSocket,
    events: broadcast::Receiver<LiveEvent>,
    dropped_count: usize,
}

impl WebSocketHandler {
    fn new(api: Api, websocket: ws::WebSocket) -> Self {
        let events = api.broker.subscribe();

        Self {
            api,
            websocket: websocket.into(),
            events,
            dropped_count: 0,
        }
    }

    async fn run(mut self) {
        tracing::debug!("live subscriber connected");

        loop {
            tokio::select! {
                _ = self.api.shutdown.cancelled() => {
                    let _ = self.websocket.send_close(Some(CloseReason::going_away())).await;
                    break;
                }
                // clients have nothing to say, but we need to notice when they leave.
                open = self.websocket.receive() => {
                    match open {
                        Err(error) => {
                            tracing::error!(?error, "websocket receive error");
                            let _ = self.websocket.send_close(error.as_close_reason()).await;
                            break;
                        }
                        Ok(false) => break,
                        Ok(true) => {}
                    }
                }
                event = self.events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Err(error) = self.handle_event(event).await {
                                tracing::debug!(?error, "websocket send error");
                                let _ = self.websocket.send_close(error.as_close_reason()).await;
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(count)) => {
                            self.dropped_count += usize::try_from(count).unwrap_or(usize::MAX);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            let reason = CloseReason::going_away();
                            let _ = self.websocket.send_close(Some(reason)).await;
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!("live subscriber disconnected");
    }

    async fn handle_event(&mut self, event: LiveEvent) -> Result<(), Error> {
        self.websocket
            .send(&ServerToClientMessage::Event {
                event,
                dropped_count: self.dropped_count,
            })
            .await?;
        self.dropped_count = 0;

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("websocket error")]
pub enum Error {
    Axum(#[from] axum::Error),
    Json(#[from] serde_json::Error),
}

impl Error {
    fn as_close_reason(&self) -> Option<CloseReason> {
        match self {
            Self::Json(error) => {
                Some(CloseReason {
                    code: CloseCode::PROTOCOL_ERROR,
                    reason: error.to_string(),
                })
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
struct CloseReason {
    code: CloseCode,
    reason: String,
}

impl CloseReason {
    fn going_away() -> Self {
        Self {
            code: CloseCode::GOING_AWAY,
            reason: Default::default(),
        }
    }
}

impl From<CloseReason> for ws::CloseFrame {
    fn from(value: CloseReason) -> Self {
        ws::CloseFrame {
            code: value.code.0,
            reason: value.reason.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct CloseCode(pub u16);

impl CloseCode {
    const GOING_AWAY: Self = Self(1001);
    const PROTOCOL_ERROR: Self = Self(1002);
}

#[derive(Debug)]
struct WebSocket {
    inner: ws::WebSocket,
}

impl From<ws::WebSocket> for WebSocket {
    fn from(value: ws::WebSocket) -> Self {
        Self { inner: value }
    }
}

impl WebSocket {
    async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), Error> {
        self.inner
            .send(ws::Message::Text(serde_json::to_string(message)?.into()))
            .await?;
        Ok(())
    }

    async fn send_close(&mut self, reason: Option<CloseReason>) -> Result<(), Error> {
        self.inner
            .send(ws::Message::Close(reason.map(Into::into)))
            .await?;
        Ok(())
    }

    /// Waits for the next message from the client, and returns whether the
    /// connection is still open.
    async fn receive(&mut self) -> Result<bool, Error> {
        is_open(self.inner.recv().await)
    }
}

/// Anything but a close frame is ignored, the client isn't expected to say
/// anything.
fn is_open(message: Option<Result<ws::Message, axum::Error>>) -> Result<bool, Error> {
    match message {
        None | Some(Ok(ws::Message::Close(_))) => Ok(false),
        Some(Err(error)) => Err(error.into()),
        Some(Ok(_)) => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::ws;
    use bytes::Bytes;

    use crate::api::live::{
        CloseCode,
        CloseReason,
        is_open,
    };

    #[test]
    fn client_chatter_is_ignored() {
        assert!(is_open(Some(Ok(ws::Message::Text("ping".to_owned().into())))).unwrap());
        assert!(is_open(Some(Ok(ws::Message::Text("{not json".to_owned().into())))).unwrap());
        let binary = ws::Message::Binary(Bytes::from_static(&[0xff, 0x00]));
        assert!(is_open(Some(Ok(binary))).unwrap());
        assert!(is_open(Some(Ok(ws::Message::Ping(Bytes::new())))).unwrap());
    }

    #[test]
    fn close_frames_end_the_subscription() {
        assert!(!is_open(Some(Ok(ws::Message::Close(None)))).unwrap());
        assert!(!is_open(None).unwrap());
    }

    #[test]
    fn going_away_has_no_reason() {
        let frame = ws::CloseFrame::from(CloseReason::going_away());
        assert_eq!(frame.code, CloseCode::GOING_AWAY.0);
        assert!(frame.reason.as_str().is_empty());
    }
}
