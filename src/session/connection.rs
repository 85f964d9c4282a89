//! Per-connection handling for interactive controllers

use super::control::ControlSession;
use crate::daemon::CommandSink;
use crate::transport::{Listener, ACCEPT_BACKOFF};
use anyhow::Result;
use std::sync::Arc;
use tank_shared::LineDecoder;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, error, info};

/// Accept controllers forever, one task and one session per connection
///
/// A failed accept is logged and the loop keeps serving.
pub async fn serve_control<L: Listener>(mut listener: L, sink: Arc<dyn CommandSink>) -> Result<()> {
    info!("[SERVER] control listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("[SERVER] control accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let session = ControlSession::new(addr.to_string(), sink.clone());

        tokio::spawn(async move {
            run_session(socket, session).await;
        });
    }
}

/// Drive a session from a line-oriented byte stream until it closes
///
/// Each line is one control message. A trailing line without terminator
/// is still handled when the stream ends cleanly.
pub async fn run_session<R>(mut reader: R, mut session: ControlSession)
where
    R: AsyncRead + Unpin,
{
    session.on_open();

    let mut decoder = LineDecoder::new();
    let mut read_buf = vec![0u8; 4096];

    'read: loop {
        match reader.read(&mut read_buf).await {
            Ok(0) => {
                match decoder.finish() {
                    Ok(Some(line)) => dispatch(&mut session, &line).await,
                    Ok(None) => {}
                    Err(e) => session.on_error(&e),
                }
                break;
            }
            Ok(n) => {
                decoder.extend(&read_buf[..n]);

                // Process all complete lines
                loop {
                    match decoder.decode_next() {
                        Ok(Some(line)) => dispatch(&mut session, &line).await,
                        Ok(None) => break,
                        Err(e) => {
                            session.on_error(&e);
                            break 'read;
                        }
                    }
                }
            }
            Err(e) => {
                session.on_error(&e);
                break;
            }
        }
    }

    session.on_close();
}

async fn dispatch(session: &mut ControlSession, line: &str) {
    let outcome = session.handle_message(line).await;

    if let Some(token) = &outcome.halted_at {
        debug!(
            "[SESSION] {} skipped rest of message at {:?} after {} tokens, submitted [{}]",
            session.peer(),
            token,
            outcome.applied,
            outcome.state
        );
    }
}
