//! Assistant session over a newline-delimited JSON bridge
//!
//! The assistant protocol client runs as a separate process. It writes one
//! JSON document per line to stdout and reads commands from stdin:
//!
//! ```text
//! bridge -> kestrel   {"device_id": "..."}                     first line
//! bridge -> kestrel   {"type": "ON_START_FINISHED", "args": {}} every event
//! kestrel -> bridge   {"command": "start_conversation"}
//! kestrel -> bridge   {"command": "stop_conversation"}           on shutdown
//! ```
//!
//! Stdout EOF ends the session. Diagnostics from the bridge belong on its
//! stderr, which is inherited.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Split};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::conversation::{ConversationHandle, SessionCommand, command_channel};
use super::event::Event;
use super::source::EventSource;
use crate::{Error, Result};

/// How long shutdown waits for queued commands to reach the bridge
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// How to launch the bridge process
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Bridge executable
    pub command: PathBuf,
    /// Extra arguments placed before the identity arguments
    pub args: Vec<String>,
    /// OAuth credentials path handed to the bridge
    pub credentials: PathBuf,
}

#[derive(Debug, Deserialize)]
struct Hello {
    device_id: String,
}

/// A running assistant session
pub struct BridgeSession<R> {
    device_id: String,
    lines: Split<BufReader<R>>,
    conversation: ConversationHandle,
    writer: Option<JoinHandle<()>>,
    closing: Option<oneshot::Sender<()>>,
    child: Option<Child>,
}

impl<R> std::fmt::Debug for BridgeSession<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSession")
            .field("device_id", &self.device_id)
            .field("pid", &self.child.as_ref().and_then(Child::id))
            .finish_non_exhaustive()
    }
}

impl BridgeSession<ChildStdout> {
    /// Launch the bridge process for `model_id` and wait for its handshake
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the process cannot be started or does not
    /// complete the handshake
    pub async fn spawn(config: &BridgeConfig, model_id: &str, cooldown: Duration) -> Result<Self> {
        tracing::info!(
            command = %config.command.display(),
            model_id,
            "starting assistant bridge"
        );

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .arg("--model-id")
            .arg(model_id)
            .arg("--credentials")
            .arg(&config.credentials)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Session(format!(
                    "failed to start {}: {e}",
                    config.command.display()
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Session("bridge stdout not captured".to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Session("bridge stdin not captured".to_string()))?;

        let mut session = Self::connect(stdout, stdin, cooldown).await?;
        session.child = Some(child);
        Ok(session)
    }
}

impl<R> BridgeSession<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Run the handshake over an already connected reader/writer pair
    ///
    /// # Errors
    ///
    /// Returns [`Error::Session`] if the stream ends or carries garbage before
    /// the device id is announced
    pub async fn connect<W>(reader: R, writer: W, cooldown: Duration) -> Result<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut lines = BufReader::new(reader).split(b'\n');

        let device_id = loop {
            let raw = lines
                .next_segment()
                .await?
                .ok_or_else(|| Error::Session("bridge closed before handshake".to_string()))?;
            let line = raw.trim_ascii();
            if line.is_empty() {
                continue;
            }
            let hello: Hello = serde_json::from_slice(line).map_err(|e| {
                Error::Session(format!(
                    "invalid handshake {:?}: {e}",
                    String::from_utf8_lossy(line)
                ))
            })?;
            break hello.device_id;
        };

        tracing::debug!(device_id = %device_id, "assistant bridge handshake complete");

        let (conversation, commands) = command_channel(cooldown);
        let (closing, closed) = oneshot::channel();
        let writer = tokio::spawn(write_commands(writer, commands, closed));

        Ok(Self {
            device_id,
            lines,
            conversation,
            writer: Some(writer),
            closing: Some(closing),
            child: None,
        })
    }

    /// Device instance id reported by the assistant
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Handle for requesting conversation turns
    #[must_use]
    pub fn conversation(&self) -> ConversationHandle {
        self.conversation.clone()
    }
}

impl<R> Drop for BridgeSession<R> {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.abort();
        }
    }
}

#[async_trait]
impl<R> EventSource for BridgeSession<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn next_event(&mut self) -> Result<Option<Event>> {
        loop {
            // Only read failures end the session; undecodable lines are dropped
            let Some(raw) = self.lines.next_segment().await? else {
                tracing::info!(device_id = %self.device_id, "assistant bridge closed");
                return Ok(None);
            };
            let line = raw.trim_ascii();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_slice::<Event>(line) {
                Ok(event) => return Ok(Some(event)),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        line = %String::from_utf8_lossy(line),
                        "skipping malformed bridge event"
                    );
                }
            }
        }
    }

    /// Stop the turn in progress and flush queued commands to the bridge
    async fn shutdown(&mut self) -> Result<()> {
        self.conversation.stop();

        if let Some(closing) = self.closing.take() {
            let _ = closing.send(());
        }
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };

        match tokio::time::timeout(SHUTDOWN_FLUSH_TIMEOUT, writer).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(Error::Session(format!("command writer failed: {e}"))),
            Err(_) => Err(Error::Session(
                "timed out flushing commands to the assistant bridge".to_string(),
            )),
        }
    }
}

/// Forward queued commands to the bridge, one JSON document per line
///
/// Once `closed` fires, whatever is already queued is written and the task
/// ends.
async fn write_commands<W>(
    mut writer: W,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    mut closed: oneshot::Receiver<()>,
) where
    W: AsyncWrite + Unpin + Send,
{
    loop {
        let command = tokio::select! {
            command = commands.recv() => command,
            _ = &mut closed => {
                while let Ok(command) = commands.try_recv() {
                    if write_command(&mut writer, command).await.is_err() {
                        return;
                    }
                }
                return;
            }
        };

        let Some(command) = command else {
            return;
        };
        if let Err(e) = write_command(&mut writer, command).await {
            tracing::warn!(error = %e, "assistant bridge stdin closed, stopping command writer");
            return;
        }
    }
}

async fn write_command<W>(writer: &mut W, command: SessionCommand) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(&command)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::EventType;

    fn mock_reader(lines: &[&str]) -> tokio_test::io::Mock {
        let mut builder = tokio_test::io::Builder::new();
        for line in lines {
            builder.read(format!("{line}\n").as_bytes());
        }
        builder.build()
    }

    #[tokio::test]
    async fn handshake_then_events_then_eof() {
        let reader = mock_reader(&[
            r#"{"device_id": "dev-42"}"#,
            r#"{"type": "ON_START_FINISHED"}"#,
            "",
            r#"{"type": "ON_MEDIA_TRACK_LOAD", "args": {"metadata": null}}"#,
        ]);
        let (writer, _peer) = tokio::io::duplex(64);

        let mut session = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(session.device_id(), "dev-42");

        let first = session.next_event().await.unwrap().unwrap();
        assert_eq!(first.kind, EventType::StartFinished);

        let second = session.next_event().await.unwrap().unwrap();
        assert_eq!(second.kind, EventType::Other("ON_MEDIA_TRACK_LOAD".to_string()));

        assert!(session.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_events_are_skipped() {
        let reader = mock_reader(&[
            r#"{"device_id": "dev-1"}"#,
            "not json",
            r#"{"type": "ON_NO_RESPONSE"}"#,
        ]);
        let (writer, _peer) = tokio::io::duplex(64);

        let mut session = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap();
        let event = session.next_event().await.unwrap().unwrap();
        assert_eq!(event.kind, EventType::NoResponse);
    }

    #[tokio::test]
    async fn invalid_utf8_lines_are_skipped() {
        let reader = tokio_test::io::Builder::new()
            .read(b"{\"device_id\": \"dev-1\"}\n")
            .read(b"\xff\xfe garbage\n")
            .read(b"{\"type\": \"ON_NO_RESPONSE\"}\n")
            .build();
        let (writer, _peer) = tokio::io::duplex(64);

        let mut session = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap();
        let event = session.next_event().await.unwrap().unwrap();
        assert_eq!(event.kind, EventType::NoResponse);
        assert!(session.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn crlf_lines_are_accepted() {
        let reader = mock_reader(&[
            "{\"device_id\": \"dev-7\"}\r",
            "{\"type\": \"ON_START_FINISHED\"}\r",
        ]);
        let (writer, _peer) = tokio::io::duplex(64);

        let mut session = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap();
        assert_eq!(session.device_id(), "dev-7");
        let event = session.next_event().await.unwrap().unwrap();
        assert_eq!(event.kind, EventType::StartFinished);
    }

    #[tokio::test]
    async fn eof_before_handshake_fails() {
        let reader = mock_reader(&[]);
        let (writer, _peer) = tokio::io::duplex(64);

        let err = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn garbage_handshake_fails() {
        let reader = mock_reader(&[r#"{"type": "ON_START_FINISHED"}"#]);
        let (writer, _peer) = tokio::io::duplex(64);

        let err = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Session(_)));
    }

    #[tokio::test]
    async fn conversation_requests_reach_bridge_stdin() {
        let reader = mock_reader(&[r#"{"device_id": "dev-1"}"#]);
        let (writer, peer) = tokio::io::duplex(256);

        let session = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap();
        let handle = session.conversation();
        assert!(handle.request());
        assert!(handle.stop());

        let mut peer = BufReader::new(peer).lines();
        assert_eq!(
            peer.next_line().await.unwrap().unwrap(),
            r#"{"command":"start_conversation"}"#
        );
        assert_eq!(
            peer.next_line().await.unwrap().unwrap(),
            r#"{"command":"stop_conversation"}"#
        );
    }

    #[tokio::test]
    async fn shutdown_stops_the_turn_and_flushes_commands() {
        let reader = mock_reader(&[r#"{"device_id": "dev-1"}"#]);
        let (writer, peer) = tokio::io::duplex(256);

        let mut session = BridgeSession::connect(reader, writer, Duration::ZERO)
            .await
            .unwrap();
        assert!(session.conversation().request());
        session.shutdown().await.unwrap();
        drop(session);

        let mut peer = BufReader::new(peer).lines();
        assert_eq!(
            peer.next_line().await.unwrap().unwrap(),
            r#"{"command":"start_conversation"}"#
        );
        assert_eq!(
            peer.next_line().await.unwrap().unwrap(),
            r#"{"command":"stop_conversation"}"#
        );
        assert!(peer.next_line().await.unwrap().is_none());
    }
}
