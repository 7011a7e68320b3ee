use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::Instrument;

use crate::config::{TransportConfig, MAX_FRAME_LEN};
use crate::error::TransportError;

/// One-shot delivery of a frame: connect, write, optionally wait for the echo, close.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        address: &str,
        frame: &str,
        await_reply: bool,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;
}

#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: TransportConfig,
}

impl TcpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

impl Transport for TcpTransport {
    fn send(
        &self,
        address: &str,
        frame: &str,
        await_reply: bool,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send {
        let address = address.to_string();
        let mut bytes = frame.as_bytes().to_vec();
        bytes.push(b'\n');
        let config = self.config.clone();

        async move {
            tracing::trace!(%address, "connecting");
            let mut stream = match timeout(config.connect_timeout, TcpStream::connect(address.as_str())).await {
                Ok(Ok(stream)) => stream,
                Ok(Err(err)) => return Err(TransportError::connect(&address, err)),
                Err(_) => return Err(TransportError::connect(&address, timed_out("connect"))),
            };

            stream
                .write_all(&bytes)
                .await
                .map_err(|err| TransportError::write(&address, err))?;

            if !await_reply {
                let _ = stream.shutdown().await;
                return Ok(None);
            }

            // an echo that never comes counts as an unreachable peer
            let reply = match timeout(config.reply_timeout, read_frame(&mut stream, config.frame_idle_timeout)).await
            {
                Ok(Ok(reply)) => reply,
                Ok(Err(err)) => return Err(TransportError::write(&address, err)),
                Err(_) => return Err(TransportError::connect(&address, timed_out("echo"))),
            };

            if reply.is_empty() {
                return Err(TransportError::write(
                    &address,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before the echo"),
                ));
            }

            Ok(Some(strip_terminator(&String::from_utf8_lossy(&reply)).to_string()))
        }
    }
}

fn timed_out(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::TimedOut, format!("{what} timed out"))
}

/// Reads one frame: up to a newline, the end of the stream, or [`MAX_FRAME_LEN`] bytes.
///
/// Peers that never terminate their frames are served too: once some bytes arrived and the
/// stream stays quiet for `idle`, what was read so far is the frame.
pub async fn read_frame<R>(reader: R, idle: Duration) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader.take(MAX_FRAME_LEN));
    let mut frame = Vec::new();

    loop {
        let before = frame.len();
        match timeout(idle, reader.read_until(b'\n', &mut frame)).await {
            Ok(result) => {
                result?;
                return Ok(frame);
            }
            // read_until keeps the bytes read before it was cancelled
            Err(_) if !frame.is_empty() && frame.len() == before => return Ok(frame),
            Err(_) => continue,
        }
    }
}

pub fn strip_terminator(frame: &str) -> &str {
    frame.trim_end_matches(['\n', '\r'])
}

/// Receives the frames accepted by [`serve`].
pub trait FrameHandler: Send + Sync + 'static {
    /// Network work decided while handling the frame, run once the echo has been sent.
    type FollowUp: Send + 'static;

    fn on_frame(&self, frame: String) -> impl Future<Output = Self::FollowUp> + Send;

    fn follow_up(&self, follow_up: Self::FollowUp) -> impl Future<Output = ()> + Send;
}

/// Accepts connections forever, one task per connection and one frame per connection.
pub async fn serve<H>(listener: TcpListener, handler: Arc<H>, config: TransportConfig)
where
    H: FrameHandler,
{
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => spawn_connection_handler(stream, peer, Arc::clone(&handler), config.clone()),
            Err(err) => tracing::warn!(error = ?err, "failed to accept connection"),
        }
    }
}

fn spawn_connection_handler<H>(stream: TcpStream, peer: SocketAddr, handler: Arc<H>, config: TransportConfig)
where
    H: FrameHandler,
{
    tokio::spawn(
        async move {
            match handle_connection(stream, handler.as_ref(), &config).await {
                Ok(Some(follow_up)) => handler.follow_up(follow_up).await,
                Ok(None) => {}
                Err(err) => tracing::warn!(error = ?err, "connection closed with error"),
            }
        }
        .instrument(tracing::trace_span!("connection", %peer)),
    );
}

async fn handle_connection<H>(
    mut stream: TcpStream,
    handler: &H,
    config: &TransportConfig,
) -> io::Result<Option<H::FollowUp>>
where
    H: FrameHandler,
{
    let raw = timeout(config.frame_read_timeout, read_frame(&mut stream, config.frame_idle_timeout))
        .await
        .map_err(|_| timed_out("reading the frame"))??;
    if raw.is_empty() {
        tracing::trace!("peer closed without sending a frame");
        return Ok(None);
    }

    let frame = strip_terminator(&String::from_utf8_lossy(&raw)).to_string();
    let follow_up = handler.on_frame(frame).await;

    // the echo is the only acknowledgment a sender gets. The frame is applied already, so the
    // follow-up runs even when the sender has gone away
    if let Err(err) = echo(&mut stream, &raw).await {
        tracing::debug!(error = %err, "echo not delivered");
    }

    Ok(Some(follow_up))
}

async fn echo(stream: &mut TcpStream, raw: &[u8]) -> io::Result<()> {
    stream.write_all(raw).await?;
    stream.shutdown().await
}
