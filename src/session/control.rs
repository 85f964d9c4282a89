//! Interactive control session

use crate::command::ControlCommand;
use crate::daemon::CommandSink;
use crate::power::PowerState;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of handling one control message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageOutcome {
    /// Tokens applied before processing stopped
    pub applied: usize,
    /// First unrecognized token, if processing stopped early
    pub halted_at: Option<String>,
    /// Diagnostic rendering of the submitted state
    pub state: String,
}

/// One interactive controller
///
/// Every message is a complete control cycle: the power state is reset,
/// the message's tokens are applied in order and the result is submitted.
pub struct ControlSession {
    peer: String,
    sink: Arc<dyn CommandSink>,
    /// Created on the first message, always batched
    power: Option<PowerState>,
}

impl ControlSession {
    pub fn new(peer: impl Into<String>, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            peer: peer.into(),
            sink,
            power: None,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn on_open(&self) {
        info!("[SESSION] {} connected", self.peer);
    }

    /// Disconnecting leaves the last submitted output in place
    pub fn on_close(&self) {
        info!("[SESSION] {} disconnected", self.peer);
    }

    pub fn on_error(&self, error: &dyn fmt::Display) {
        warn!("[SESSION] {} error: {}", self.peer, error);
    }

    /// Handle one control message
    ///
    /// Processing stops at the first unrecognized token; tokens before it
    /// stay applied. The resulting state is always submitted.
    pub async fn handle_message(&mut self, message: &str) -> MessageOutcome {
        let sink = &self.sink;
        let power = self
            .power
            .get_or_insert_with(|| PowerState::new(false, sink.clone()));

        power.reset().await;

        let mut applied = 0;
        let mut halted_at = None;
        for token in message.split_whitespace() {
            let command = match token.parse::<ControlCommand>() {
                Ok(command) => command,
                Err(unknown) => {
                    halted_at = Some(unknown.0);
                    break;
                }
            };

            if let Err(e) = command.apply(power).await {
                warn!("[SESSION] {} could not apply {}: {}", self.peer, command, e);
                halted_at = Some(token.to_string());
                break;
            }
            applied += 1;
        }

        let state = power.to_string();
        info!("[SESSION] {} message {:?} => {:?}", self.peer, message, state);
        power.submit().await;

        MessageOutcome {
            applied,
            halted_at,
            state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::sink::RecordingSink;
    use tank_shared::DaemonCommand;

    fn session() -> (ControlSession, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        (ControlSession::new("test", sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_both_forward() {
        let (mut session, sink) = session();

        let outcome = session.handle_message("both-forward").await;

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.halted_at, None);
        assert_eq!(outcome.state, "LEFT: forward, RIGHT: forward");
        assert_eq!(sink.commands(), vec![DaemonCommand::SetOutput(vec![26, 23])]);
    }

    #[tokio::test]
    async fn test_conflicting_tokens_lock_track() {
        let (mut session, sink) = session();

        let outcome = session
            .handle_message("track-left-forward track-left-reverse")
            .await;

        assert_eq!(outcome.applied, 2);
        assert_eq!(outcome.state, "");
        assert_eq!(sink.outputs(), vec![Vec::<u8>::new()]);
    }

    #[tokio::test]
    async fn test_lockout_only_affects_conflicting_track() {
        let (mut session, sink) = session();

        session
            .handle_message("track-left-forward turret-right track-left-reverse spin-left")
            .await;

        assert_eq!(sink.outputs(), vec![vec![23, 19]]);
    }

    #[tokio::test]
    async fn test_unknown_token_halts_message() {
        let (mut session, sink) = session();

        let outcome = session
            .handle_message("turret-left bogus-token turret-right")
            .await;

        assert_eq!(outcome.applied, 1);
        assert_eq!(outcome.halted_at.as_deref(), Some("bogus-token"));
        assert_eq!(outcome.state, "TURRET: left");
        assert_eq!(sink.outputs(), vec![vec![21]]);
    }

    #[tokio::test]
    async fn test_each_message_starts_from_reset() {
        let (mut session, sink) = session();

        session.handle_message("both-forward turret-left").await;
        session.handle_message("track-right-reverse").await;
        session.handle_message("stop").await;
        session.handle_message("").await;

        assert_eq!(
            sink.outputs(),
            vec![vec![26, 23, 21], vec![22], vec![], vec![]]
        );
    }

    #[tokio::test]
    async fn test_lockout_cleared_by_next_message() {
        let (mut session, sink) = session();

        session.handle_message("turret-left turret-right").await;
        session.handle_message("turret-right").await;

        assert_eq!(sink.outputs(), vec![vec![], vec![19]]);
    }

    #[tokio::test]
    async fn test_interactive_never_arms_fallback() {
        let (mut session, sink) = session();
        session.handle_message("both-reverse").await;

        assert_eq!(sink.commands(), vec![DaemonCommand::SetOutput(vec![24, 22])]);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_message_log_names_peer() {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let sink = Arc::new(RecordingSink::new());
        let mut session = ControlSession::new("10.0.0.7:40512", sink);
        session.handle_message("turret-left").await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output
            .lines()
            .any(|line| line.contains("[SESSION] 10.0.0.7:40512 message \"turret-left\"")));
    }
}
