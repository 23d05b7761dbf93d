#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use natter_proto::{ClientMessage, LoginSnapshot, Packet, PacketCodec, ServerMessage, UserId};
use natter_server::{Dispatcher, Registry, ServerConfig, TcpServer};
use natter_store::{Directory, NewAccount, SharedDatabase};

pub const PASSWORD: &str = "password1";
const RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub struct TestServer {
    pub addr: SocketAddr,
    pub directory: Arc<dyn Directory>,
    pub registry: Arc<Registry>,
    ids: HashMap<String, UserId>,
    _dir: tempfile::TempDir,
}

impl TestServer {
    /// Start a server on an ephemeral port with one account per name.
    pub async fn start(usernames: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = SharedDatabase::open(&dir.path().join("natter.db")).unwrap();
        let directory: Arc<dyn Directory> = Arc::new(db);

        let mut ids = HashMap::new();
        for name in usernames {
            let id = directory
                .create_account(&NewAccount {
                    username: name.to_string(),
                    password: PASSWORD.to_string(),
                    email: format!("{name}@example.com"),
                    display_name: format!("{name} display"),
                })
                .unwrap();
            ids.insert(name.to_string(), id);
        }

        let config = ServerConfig {
            listen_addr: ([127, 0, 0, 1], 0).into(),
            ..ServerConfig::default()
        };
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&directory));
        let server = TcpServer::new(Arc::clone(&registry), dispatcher, config);
        let listener = server.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { server.serve(listener).await });

        Self {
            addr,
            directory,
            registry,
            ids,
            _dir: dir,
        }
    }

    pub fn id(&self, username: &str) -> UserId {
        self.ids[username]
    }

    /// Make two seeded users contacts without going through the wire.
    pub fn befriend(&self, a: &str, b: &str) {
        let (a, b) = (self.id(a), self.id(b));
        self.directory.add_pending_request(a, b, None).unwrap();
        self.directory.confirm_request(a, b).unwrap();
    }

    pub async fn connect(&self) -> Client {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        Client {
            framed: Framed::new(stream, PacketCodec::new()),
        }
    }

    /// Connect and log in, asserting success.
    pub async fn login(&self, username: &str) -> (Client, LoginSnapshot) {
        let mut client = self.connect().await;
        let snapshot = client
            .login(username, PASSWORD)
            .await
            .expect("login should succeed");
        (client, snapshot)
    }
}

pub struct Client {
    framed: Framed<TcpStream, PacketCodec>,
}

impl Client {
    pub async fn send(&mut self, message: ClientMessage) {
        self.framed.send(message.to_packet()).await.unwrap();
    }

    pub async fn send_raw(&mut self, packet: Packet) {
        self.framed.send(packet).await.unwrap();
    }

    pub async fn write_bytes(&mut self, bytes: &[u8]) {
        use tokio::io::AsyncWriteExt;
        self.framed.get_mut().write_all(bytes).await.unwrap();
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Option<LoginSnapshot> {
        self.send(ClientMessage::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await;
        match self.recv().await {
            ServerMessage::LoginResult(snapshot) => snapshot,
            other => panic!("expected LoginResult, got {other:?}"),
        }
    }

    pub async fn recv(&mut self) -> ServerMessage {
        let packet = tokio::time::timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for packet")
            .expect("connection closed")
            .expect("valid frame");
        ServerMessage::from_packet(&packet)
            .expect("well-formed payload")
            .expect("server-to-client packet")
    }

    /// Assert that nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(Ok(packet))) = tokio::time::timeout(window, self.framed.next()).await {
            panic!("expected silence, got packet {}", packet.id);
        }
    }

    /// True once the server has closed the connection.
    pub async fn closed_by_server(&mut self) -> bool {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await {
            Ok(None) | Ok(Some(Err(_))) => true,
            Ok(Some(Ok(_))) | Err(_) => false,
        }
    }
}
