//! TCP listener and the per-connection read loop.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use natter_proto::PacketCodec;

use crate::config::ServerConfig;
use crate::dispatch::PacketHandler;
use crate::error::ServerError;
use crate::registry::Registry;
use crate::session::Session;

/// Accepts connections and drives one read loop task per connection.
pub struct TcpServer<H> {
    registry: Arc<Registry>,
    handler: Arc<H>,
    config: Arc<ServerConfig>,
}

impl<H> Clone for TcpServer<H> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            handler: Arc::clone(&self.handler),
            config: Arc::clone(&self.config),
        }
    }
}

impl<H: PacketHandler> TcpServer<H> {
    pub fn new(registry: Arc<Registry>, handler: H, config: ServerConfig) -> Self {
        Self {
            registry,
            handler: Arc::new(handler),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        info!(addr = %listener.local_addr()?, "Listening");
        Ok(listener)
    }

    /// Accept connections until the listener fails or the future is dropped.
    pub async fn serve(&self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let server = self.clone();
                    tokio::spawn(async move {
                        server.handle_tcp(stream, peer_addr).await;
                    });
                }
                Err(e) => {
                    // Usually descriptor exhaustion; back off instead of spinning.
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_tcp(&self, stream: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
        }
        let (reader, writer) = stream.into_split();
        self.serve_connection(reader, writer, peer_addr).await;
    }

    /// Register a session for the stream, run its read loop, then tear it down.
    pub async fn serve_connection<R, W>(&self, reader: R, writer: W, peer_addr: SocketAddr)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let session = Arc::new(Session::new(
            self.registry.next_id(),
            peer_addr,
            writer,
            self.config.write_timeout,
        ));
        self.registry.add(Arc::clone(&session)).await;
        self.handler.on_connect(&session).await;

        let codec = PacketCodec::with_max_frame_len(self.config.max_frame_len);
        let mut frames = FramedRead::new(reader, codec);

        let outcome = self.read_loop(&session, &mut frames).await;
        match &outcome {
            Ok(()) => debug!(session = %session.id(), "Peer closed connection"),
            Err(ServerError::ConnectionClosed) => {
                debug!(session = %session.id(), "Session closed after failed write")
            }
            Err(e) => warn!(session = %session.id(), error = %e, "Closing connection"),
        }

        self.registry.remove(session.id()).await;
        session.close();
        self.handler.on_disconnect(&session).await;
        session.shutdown().await;
    }

    async fn read_loop<R>(
        &self,
        session: &Arc<Session>,
        frames: &mut FramedRead<R, PacketCodec>,
    ) -> Result<(), ServerError>
    where
        R: AsyncRead + Send + Unpin,
    {
        loop {
            let next = tokio::select! {
                _ = session.closed() => return Err(ServerError::ConnectionClosed),
                next = tokio::time::timeout(self.config.read_timeout, frames.next()) => next,
            };

            let packet = match next {
                Err(_) => return Err(ServerError::ReadTimeout),
                Ok(None) => return Ok(()),
                Ok(Some(Ok(packet))) => packet,
                Ok(Some(Err(e))) => {
                    let e = ServerError::from(e);
                    if e.is_fatal() {
                        return Err(e);
                    }
                    debug!(session = %session.id(), error = %e, "Skipping unreadable frame");
                    continue;
                }
            };

            let handled = AssertUnwindSafe(self.handler.on_packet(session, packet))
                .catch_unwind()
                .await;
            if handled.is_err() {
                error!(session = %session.id(), "Packet handler panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::SinkExt;
    use natter_proto::{Packet, PacketId};
    use tokio_util::codec::FramedWrite;

    #[derive(Default)]
    struct Counting {
        connects: AtomicUsize,
        packets: AtomicUsize,
        disconnects: AtomicUsize,
    }

    impl PacketHandler for Counting {
        async fn on_connect(&self, _session: &Arc<Session>) {
            self.connects.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_packet(&self, _session: &Arc<Session>, packet: Packet) {
            self.packets.fetch_add(1, Ordering::SeqCst);
            if packet.kind() == Some(PacketId::Ping) {
                panic!("boom");
            }
        }

        async fn on_disconnect(&self, _session: &Arc<Session>) {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn server(read_timeout: Duration) -> TcpServer<Counting> {
        let config = ServerConfig {
            read_timeout,
            ..ServerConfig::default()
        };
        TcpServer::new(Arc::new(Registry::new()), Counting::default(), config)
    }

    fn addr() -> SocketAddr {
        ([127, 0, 0, 1], 45000).into()
    }

    #[tokio::test]
    async fn test_lifecycle_callbacks() {
        let server = server(Duration::from_secs(5));
        let (client, conn) = tokio::io::duplex(1024);
        let (conn_read, conn_write) = tokio::io::split(conn);

        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.serve_connection(conn_read, conn_write, addr()).await })
        };

        let mut sink = FramedWrite::new(client, PacketCodec::new());
        sink.send(Packet::new(PacketId::Audio, vec![1u8])).await.unwrap();
        // A panicking handler must not end the connection.
        sink.send(Packet::empty(PacketId::Ping)).await.unwrap();
        sink.send(Packet::new(PacketId::Audio, vec![2u8])).await.unwrap();
        drop(sink);

        task.await.unwrap();
        let handler = &server.handler;
        assert_eq!(handler.connects.load(Ordering::SeqCst), 1);
        assert_eq!(handler.packets.load(Ordering::SeqCst), 3);
        assert_eq!(handler.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(server.registry().count().await, 0);
    }

    #[tokio::test]
    async fn test_read_timeout_drops_connection() {
        let server = server(Duration::from_millis(50));
        let (_client, conn) = tokio::io::duplex(1024);
        let (conn_read, conn_write) = tokio::io::split(conn);

        tokio::time::timeout(
            Duration::from_secs(2),
            server.serve_connection(conn_read, conn_write, addr()),
        )
        .await
        .expect("idle connection closed by read timeout");
        assert_eq!(server.handler.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_frame_drops_connection() {
        let server = server(Duration::from_secs(5));
        let (client, conn) = tokio::io::duplex(1024);
        let (conn_read, conn_write) = tokio::io::split(conn);

        let task = {
            let server = server.clone();
            tokio::spawn(async move { server.serve_connection(conn_read, conn_write, addr()).await })
        };

        let mut header = Vec::new();
        header.extend_from_slice(&4i32.to_le_bytes());
        header.extend_from_slice(&20_000_001i32.to_le_bytes());
        let (_client_read, mut client_write) = tokio::io::split(client);
        tokio::io::AsyncWriteExt::write_all(&mut client_write, &header)
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("connection closed")
            .unwrap();
        assert_eq!(server.handler.packets.load(Ordering::SeqCst), 0);
        assert_eq!(server.registry().count().await, 0);
    }
}
