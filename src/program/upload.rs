//! Program upload listener
//!
//! A client writes the program body and shuts down its write half; the
//! server starts the program and answers with a one-line notice.

use super::runner::spawn_program;
use crate::daemon::CommandSink;
use crate::transport::{Listener, ACCEPT_BACKOFF};
use anyhow::{anyhow, Result};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info, warn};

/// Maximum accepted program size
pub const MAX_PROGRAM_SIZE: usize = 64 * 1024;

pub const NOTICE_STARTED: &str = "Program started\n";
pub const NOTICE_REJECTED: &str = "Program rejected\n";

/// Accept program uploads forever
///
/// A failed accept is logged and the loop keeps serving.
pub async fn serve_uploads<L: Listener>(mut listener: L, sink: Arc<dyn CommandSink>) -> Result<()> {
    info!("[SERVER] program upload listening on {}", listener.local_addr()?);

    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("[SERVER] upload accept failed: {}", e);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
        };
        let sink = sink.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_upload(socket, addr, sink).await {
                warn!("[SERVER] upload from {} failed: {}", addr, e);
            }
        });
    }
}

/// Read one program, start it and reply
pub async fn handle_upload<S>(mut socket: S, addr: SocketAddr, sink: Arc<dyn CommandSink>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let source = match read_program(&mut socket).await {
        Ok(source) => source,
        Err(e) => {
            warn!("[SERVER] rejecting program from {}: {}", addr, e);
            socket.write_all(NOTICE_REJECTED.as_bytes()).await?;
            socket.shutdown().await?;
            return Ok(());
        }
    };

    info!("[SERVER] program from {} ({} bytes)", addr, source.len());
    spawn_program(source, sink);

    socket.write_all(NOTICE_STARTED.as_bytes()).await?;
    socket.shutdown().await?;
    Ok(())
}

async fn read_program<R: AsyncRead + Unpin>(reader: &mut R) -> Result<String> {
    let mut body = BytesMut::with_capacity(4096);

    loop {
        if body.len() > MAX_PROGRAM_SIZE {
            return Err(anyhow!("program exceeds {} bytes", MAX_PROGRAM_SIZE));
        }
        if reader.read_buf(&mut body).await? == 0 {
            break;
        }
    }

    String::from_utf8(body.to_vec()).map_err(|_| anyhow!("program is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::sink::RecordingSink;
    use crate::transport::ScriptedListener;
    use std::io;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    async fn wait_for_outputs(sink: &RecordingSink, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while sink.outputs().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("program did not submit");
    }

    #[tokio::test]
    async fn test_upload_starts_program() {
        let sink = Arc::new(RecordingSink::new());
        let (mut client, server) = tokio::io::duplex(1024);

        let upload = tokio::spawn(handle_upload(server, test_addr(), sink.clone()));

        client.write_all(b"turret right\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, NOTICE_STARTED);
        upload.await.unwrap().unwrap();

        wait_for_outputs(&sink, 1).await;
        assert_eq!(sink.outputs(), vec![vec![19]]);
    }

    #[tokio::test]
    async fn test_invalid_program_still_reports_started() {
        let sink = Arc::new(RecordingSink::new());
        let (mut client, server) = tokio::io::duplex(1024);

        let upload = tokio::spawn(handle_upload(server, test_addr(), sink.clone()));

        client.write_all(b"self destruct\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, NOTICE_STARTED);
        upload.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_non_utf8_program_rejected() {
        let sink = Arc::new(RecordingSink::new());
        let (mut client, server) = tokio::io::duplex(1024);

        let upload = tokio::spawn(handle_upload(server, test_addr(), sink.clone()));

        client.write_all(&[0xc3, 0x28, b'\n']).await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, NOTICE_REJECTED);
        upload.await.unwrap().unwrap();
        assert!(sink.commands().is_empty());
    }

    #[tokio::test]
    async fn test_serve_uploads_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let sink = Arc::new(RecordingSink::new());

        let server = tokio::spawn(serve_uploads(listener, sink.clone()));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"track_left reverse\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, NOTICE_STARTED);

        wait_for_outputs(&sink, 1).await;
        assert_eq!(sink.outputs(), vec![vec![24]]);

        server.abort();
    }

    #[tokio::test]
    async fn test_accept_failure_keeps_serving() {
        let (mut client, server_end) = tokio::io::duplex(1024);
        let listener = ScriptedListener::new(vec![
            Err(io::Error::from_raw_os_error(libc::EMFILE)),
            Ok(server_end),
        ]);
        let sink = Arc::new(RecordingSink::new());

        let server = tokio::spawn(serve_uploads(listener, sink.clone()));

        client.write_all(b"turret left\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reply = String::new();
        client.read_to_string(&mut reply).await.unwrap();
        assert_eq!(reply, NOTICE_STARTED);

        wait_for_outputs(&sink, 1).await;
        assert_eq!(sink.outputs(), vec![vec![21]]);
        assert!(!server.is_finished());

        server.abort();
    }
}
