//! # Ingestion Listeners
//!
//! ```text
//! UDP  ─ one datagram = one packet ───────────┐
//!                                             ├─→ Arc<Engine>
//! TCP  ─ one task per connection, \n lines ───┘
//! ```
//!
//! Listeners never answer senders. A failing connection ends only that
//! connection; a failing accept ends only that transport.

use crate::error::{ServerError, ServerResult};
use livegrid_engine::{DocumentSchema, Engine, FormatDetector, LineBuffer};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

const MAX_DATAGRAM: usize = 65_535;
const READ_CHUNK: usize = 8 * 1024;

pub struct UdpIngest {
    socket: UdpSocket,
}

impl UdpIngest {
    pub async fn bind(addr: SocketAddr) -> ServerResult<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|source| ServerError::Bind {
            transport: "udp",
            addr,
            source,
        })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive datagrams until the task is dropped
    pub async fn run<S, D>(self, engine: Arc<Engine<S, D>>)
    where
        S: DocumentSchema,
        D: FormatDetector<Update = S::Update>,
    {
        if let Ok(addr) = self.socket.local_addr() {
            tracing::info!("[UDP] Listening on {} ({})", addr, engine.detector_name());
        }

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, peer)) => {
                    tracing::trace!("[UDP] {} bytes from {}", len, peer);
                    engine.apply_datagram(&buf[..len]);
                }
                Err(e) => {
                    // ICMP errors from earlier sends surface here; the socket stays usable
                    tracing::warn!("[UDP] Receive error: {}", e);
                }
            }
        }
    }
}

pub struct TcpIngest {
    listener: TcpListener,
}

impl TcpIngest {
    pub async fn bind(addr: SocketAddr) -> ServerResult<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|source| ServerError::Bind {
            transport: "tcp",
            addr,
            source,
        })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until accepting fails
    pub async fn run<S, D>(self, engine: Arc<Engine<S, D>>) -> ServerResult<()>
    where
        S: DocumentSchema,
        D: FormatDetector<Update = S::Update>,
    {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!("[TCP] Listening on {} ({})", addr, engine.detector_name());
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::error!("[TCP] Accept failed, stopping TCP ingestion: {}", e);
                    return Err(e.into());
                }
            };

            tracing::info!("[TCP] Connection from {}", peer);
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                match read_lines(stream, &engine).await {
                    Ok(lines) => tracing::info!("[TCP] {} closed after {} lines", peer, lines),
                    Err(e) => tracing::warn!("[TCP] {} dropped: {}", peer, e),
                }
            });
        }
    }
}

/// Feed every line of one connection to the engine; returns the line count
async fn read_lines<S, D>(mut stream: TcpStream, engine: &Engine<S, D>) -> std::io::Result<usize>
where
    S: DocumentSchema,
    D: FormatDetector<Update = S::Update>,
{
    let mut buffer = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut count = 0;

    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        for line in buffer.push(&chunk[..n]) {
            engine.apply_line(&line);
            count += 1;
        }
    }

    if let Some(rest) = buffer.finish() {
        engine.apply_line(&rest);
        count += 1;
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use livegrid_engine::transcript::{self, FlashTiming};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_udp_datagrams_reach_engine() {
        let engine = Arc::new(transcript::engine(FlashTiming::default()));
        let udp = UdpIngest::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = udp.local_addr().unwrap();
        let task = tokio::spawn(udp.run(Arc::clone(&engine)));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(b"song_length 32", addr).await.unwrap();
        sender
            .send_to(br#"{"bar":{"measure_length":4}}{"transcript":{"1":{"0":{"rating":1}}}}"#, addr)
            .await
            .unwrap();

        assert!(wait_for(|| engine.stats().applied == 3).await);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.document.song_length(), 32.0);
        assert_eq!(snapshot.document.measure_length(), 4.0);
        assert!(snapshot.document.cell("1", "0").is_some());

        task.abort();
    }

    #[tokio::test]
    async fn test_tcp_lines_and_trailing_partial() {
        let engine = Arc::new(transcript::engine(FlashTiming::default()));
        let tcp = TcpIngest::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = tcp.local_addr().unwrap();
        let task = tokio::spawn(tcp.run(Arc::clone(&engine)));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"bar 2\n{\"transcript\":").await.unwrap();
        client.write_all(b"{\"3\":{\"6\":{\"offset\":7}}}}\n").await.unwrap();
        client.write_all(b"3 :: 6 :: rating 0.5").await.unwrap();
        client.shutdown().await.unwrap();
        drop(client);

        assert!(wait_for(|| engine.stats().applied == 3).await);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.document.measure_length(), 2.0);
        assert_eq!(snapshot.document.cell("3", "6").map(|c| c.len()), Some(2));

        task.abort();
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = TcpIngest::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = first.local_addr().unwrap();

        let err = TcpIngest::bind(addr).await.err().unwrap();
        assert!(matches!(err, ServerError::Bind { transport: "tcp", .. }));
    }
}
