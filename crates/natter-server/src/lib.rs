//! # natter-server
//!
//! Presence and chat server speaking the natter binary protocol over TCP.
//!
//! - [`server::TcpServer`] accepts connections and runs one read loop per
//!   connection.
//! - [`registry::Registry`] holds the live sessions and fans packets out to
//!   them.
//! - [`dispatch::Dispatcher`] routes each packet by session state and runs
//!   the login, relay, status and contact handlers against a
//!   [`natter_store::Directory`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod registry;
pub mod server;
pub mod session;

mod handlers;

pub use config::ServerConfig;
pub use dispatch::{Dispatcher, PacketHandler};
pub use error::ServerError;
pub use registry::Registry;
pub use server::TcpServer;
pub use session::{Session, SessionId};
