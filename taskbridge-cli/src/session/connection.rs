//! The live-channel state machine: Disconnected → Connecting → Connected,
//! with a fixed reconnect delay and unbounded retries while the process runs.
//!
//! Incoming SSE frames are decoded into [`StreamEvent`]s and forwarded onto a
//! single queue; the caller's event loop is the only consumer, so all
//! reconciliation stays serialized.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use reqwest::Client;
use shared::models::StreamEvent;
use tokio::sync::mpsc;
use tokio::time::sleep;
use url::Url;

/// Connection lifecycle of the live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Owns the background task that keeps one live channel open for the session.
#[derive(Debug, Clone)]
pub struct ChatConnection {
    client: Client,
    stream_url: Url,
    token: String,
    reconnect_delay: Duration,
    state: Arc<Mutex<ConnectionState>>,
    events: mpsc::Sender<StreamEvent>,
}

impl ChatConnection {
    /// # Errors
    /// Fails when the stream endpoint cannot be derived from `base_url`.
    pub fn new(
        client: Client,
        base_url: &Url,
        token: impl Into<String>,
        reconnect_delay: Duration,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<Self> {
        let stream_url = base_url
            .join("api/v1/stream")
            .context("invalid stream endpoint")?;
        Ok(Self {
            client,
            stream_url,
            token: token.into(),
            reconnect_delay,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            events,
        })
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("connection state lock poisoned")
    }

    /// Starts the connection loop unless one is already running.
    ///
    /// Idempotent by design: UI surfaces may call this from several entry
    /// points without spawning duplicate connection attempts.
    pub fn ensure_connection(&self) {
        {
            let mut state = self.state.lock().expect("connection state lock poisoned");
            if *state != ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Connecting;
        }

        let connection = self.clone();
        tokio::spawn(async move {
            connection.run().await;
        });
    }

    async fn run(&self) {
        loop {
            self.set_state(ConnectionState::Connecting);

            match self.open_stream().await {
                Ok(response) => {
                    self.set_state(ConnectionState::Connected);
                    self.read_events(response).await;
                }
                Err(err) => {
                    eprintln!("[stream] connection failed: {err}");
                }
            }

            self.set_state(ConnectionState::Disconnected);

            if self.events.is_closed() {
                // The consumer went away; retrying would push into the void.
                return;
            }
            sleep(self.reconnect_delay).await;

            // Re-enter the loop only if nothing else claimed the slot; the
            // state was left Disconnected above, so claim it again.
            {
                let mut state = self.state.lock().expect("connection state lock poisoned");
                if *state != ConnectionState::Disconnected {
                    return;
                }
                *state = ConnectionState::Connecting;
            }
        }
    }

    async fn open_stream(&self) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(self.stream_url.clone())
            .bearer_auth(&self.token)
            .send()
            .await
            .context("stream request failed")?
            .error_for_status()
            .context("stream request rejected")?;
        Ok(response)
    }

    async fn read_events(&self, response: reqwest::Response) {
        let mut stream = response.bytes_stream();
        let mut parser = SseFrameParser::default();
        let mut pending = String::new();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(err) => {
                    eprintln!("[stream] chunk error: {err}");
                    return;
                }
            };
            pending.push_str(&String::from_utf8_lossy(&bytes));

            // Only complete lines are fed to the parser; a partial line stays
            // buffered until the next chunk.
            while let Some(newline) = pending.find('\n') {
                let line: String = pending.drain(..=newline).collect();
                if let Some(event) = parser.feed_line(line.trim_end_matches(['\n', '\r'])) {
                    if self.events.send(event).await.is_err() {
                        return;
                    }
                }
            }
        }
    }

    fn set_state(&self, value: ConnectionState) {
        *self.state.lock().expect("connection state lock poisoned") = value;
    }
}

/// Incremental SSE frame decoder: accumulates `event:`/`data:` fields and
/// yields a decoded [`StreamEvent`] at each blank-line dispatch.
#[derive(Debug, Default)]
pub(crate) struct SseFrameParser {
    event_name: Option<String>,
    data_buffer: String,
}

impl SseFrameParser {
    pub(crate) fn feed_line(&mut self, line: &str) -> Option<StreamEvent> {
        if let Some(value) = line.strip_prefix("event:") {
            self.event_name = Some(value.trim().to_string());
            None
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data_buffer.push_str(value.trim());
            None
        } else if line.starts_with(':') {
            // Comment line, e.g. the server's keep-alive text.
            None
        } else if line.is_empty() {
            let data = std::mem::take(&mut self.data_buffer);
            self.event_name = None;
            if data.is_empty() {
                return None;
            }
            match serde_json::from_str::<StreamEvent>(&data) {
                Ok(event) => Some(event),
                Err(err) => {
                    eprintln!("[stream] dropping unparseable frame: {err}");
                    None
                }
            }
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use shared::models::{ChatMessage, Timestamp};

    fn frame_lines(event: &StreamEvent) -> Vec<String> {
        vec![
            format!("event: {}", event.event_name()),
            format!("data: {}", serde_json::to_string(event).unwrap()),
            String::new(),
        ]
    }

    #[test]
    fn parser_yields_an_event_per_blank_line_dispatch() {
        let event = StreamEvent::Message {
            message: ChatMessage {
                id: 1,
                sender_username: "alice".into(),
                recipient_username: "bob".into(),
                content: "hi".into(),
                timestamp: Timestamp(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()),
                deleted_by_sender: false,
                deleted_by_recipient: false,
            },
        };

        let mut parser = SseFrameParser::default();
        let mut decoded = Vec::new();
        for line in frame_lines(&event) {
            if let Some(parsed) = parser.feed_line(&line) {
                decoded.push(parsed);
            }
        }

        assert_eq!(decoded, vec![event]);
    }

    #[test]
    fn parser_skips_comments_and_malformed_data() {
        let mut parser = SseFrameParser::default();
        assert!(parser.feed_line(": keep-alive").is_none());
        assert!(parser.feed_line("").is_none());

        assert!(parser.feed_line("event: message").is_none());
        assert!(parser.feed_line("data: not json").is_none());
        assert!(parser.feed_line("").is_none());

        // The parser recovers for the next well-formed frame.
        for line in frame_lines(&StreamEvent::Ping) {
            if let Some(event) = parser.feed_line(&line) {
                assert_eq!(event, StreamEvent::Ping);
                return;
            }
        }
        panic!("well-formed frame after a malformed one was not decoded");
    }

    #[tokio::test]
    async fn ensure_connection_is_idempotent_while_active() {
        let (events, _receiver) = mpsc::channel(4);
        let connection = ChatConnection::new(
            Client::new(),
            &Url::parse("http://localhost:8080").unwrap(),
            "token",
            Duration::from_secs(5),
            events,
        )
        .unwrap();

        assert_eq!(connection.state(), ConnectionState::Disconnected);

        connection.ensure_connection();
        let after_first = connection.state();
        assert_ne!(after_first, ConnectionState::Disconnected);

        // A second call while Connecting/Connected must not reset the state
        // machine or spawn another loop.
        connection.ensure_connection();
        assert_ne!(connection.state(), ConnectionState::Disconnected);
    }
}
