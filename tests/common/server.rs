//! Scripted server side of a bot connection.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A listener on an ephemeral loopback port.
pub struct TestServer {
    listener: TcpListener,
}

impl TestServer {
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Ok(Self { listener })
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().map(|a| a.port()).unwrap_or_default()
    }

    /// Accept the next bot connection.
    pub async fn accept(&self) -> anyhow::Result<ServerPeer> {
        let (stream, _) = timeout(RECV_TIMEOUT, self.listener.accept()).await??;
        Ok(ServerPeer::new(stream))
    }

    /// Whether another connection arrives within `dur`.
    pub async fn accepts_within(&self, dur: Duration) -> bool {
        matches!(timeout(dur, self.listener.accept()).await, Ok(Ok(_)))
    }
}

/// One accepted connection, driven line by line from the test.
pub struct ServerPeer {
    reader: BufReader<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
}

impl ServerPeer {
    fn new(stream: TcpStream) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: Some(write_half),
        }
    }

    /// Send one line, adding CRLF if missing.
    pub async fn send_raw(&mut self, line: &str) -> anyhow::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("writer already closed"))?;
        writer.write_all(line.as_bytes()).await?;
        if !line.ends_with('\n') {
            writer.write_all(b"\r\n").await?;
        }
        writer.flush().await?;
        Ok(())
    }

    /// Send raw bytes exactly as given.
    pub async fn send_bytes(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("writer already closed"))?;
        writer.write_all(bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Next line from the bot with the line ending stripped.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        let mut line = String::new();
        let read = timeout(RECV_TIMEOUT, self.reader.read_line(&mut line)).await??;
        if read == 0 {
            anyhow::bail!("connection closed");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Receive lines until one satisfies `predicate`; returns that line.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<String>
    where
        F: FnMut(&str) -> bool,
    {
        loop {
            let line = self.recv().await?;
            if predicate(&line) {
                return Ok(line);
            }
        }
    }

    /// Read past the registration burst (`PASS`/`NICK`/`USER`).
    pub async fn expect_registration(&mut self) -> anyhow::Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = line.starts_with("USER ");
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Complete registration for `nick` with a welcome numeric.
    pub async fn welcome(&mut self, nick: &str) -> anyhow::Result<()> {
        self.expect_registration().await?;
        self.send_raw(&format!(":irc.test 001 {nick} :Welcome to the test network {nick}"))
            .await
    }

    /// Whether the bot closes its side within `dur`.
    pub async fn closed_within(&mut self, dur: Duration) -> bool {
        let mut line = String::new();
        matches!(timeout(dur, self.reader.read_line(&mut line)).await, Ok(Ok(0)) | Ok(Err(_)))
    }

    /// Drop the server side of the connection.
    pub fn hang_up(&mut self) {
        self.writer = None;
    }
}
