//! # natter-proto
//!
//! Binary wire protocol shared by the natter chat server and its clients.
//!
//! Every frame is `[i32 LE id][i32 LE length][payload]`. The [`codec`]
//! module frames packets over any async byte stream; [`messages`] gives
//! each packet id a typed payload layout built from the primitives in
//! [`payload`].

pub mod codec;
pub mod constants;
pub mod error;
pub mod messages;
pub mod packet;
pub mod payload;
pub mod types;

pub use codec::PacketCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, LoginSnapshot, ServerMessage};
pub use packet::{Packet, PacketId};
pub use types::{
    AddContactResult, ContactProfile, PendingRequest, PendingResult, Presence, UserId,
};
