//! Typed payload layouts for every packet id.
//!
//! [`ClientMessage`] covers what clients send, [`ServerMessage`] what the
//! server sends back. Both directions encode and decode so the same types
//! serve the server and any client or test harness.

use bytes::{BufMut, Bytes, BytesMut};

use crate::constants::LOGIN_SEPARATOR;
use crate::error::ProtocolError;
use crate::packet::{Packet, PacketId};
use crate::payload::{PayloadReader, PayloadWriter};
use crate::types::{AddContactResult, ContactProfile, PendingRequest, PendingResult, UserId};

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Sent as the raw bytes `username\npassword`.
    Login { username: String, password: String },
    Chat { to: UserId, message: Option<String> },
    Nudge { to: UserId },
    /// Opaque audio, relayed verbatim.
    Audio(Bytes),
    /// Reserved for keep-alive.
    Ping,
    Action { to: UserId, action: Option<String> },
    /// Raw name bytes, no length prefix.
    SetDisplayName(Option<String>),
    /// Requested presence; range checking is the receiver's job.
    SetStatus { status: i32 },
    AddContact {
        username: Option<String>,
        message: Option<String>,
    },
    ConfirmContact { requester: UserId },
    RejectContact { requester: UserId },
    Image { to: UserId, data: Option<Bytes> },
}

impl ClientMessage {
    pub fn packet_id(&self) -> PacketId {
        match self {
            Self::Login { .. } => PacketId::Login,
            Self::Chat { .. } => PacketId::Chat,
            Self::Nudge { .. } => PacketId::Nudge,
            Self::Audio(_) => PacketId::Audio,
            Self::Ping => PacketId::Ping,
            Self::Action { .. } => PacketId::Action,
            Self::SetDisplayName(_) => PacketId::SetDisplayName,
            Self::SetStatus { .. } => PacketId::UserStatusChange,
            Self::AddContact { .. } => PacketId::AddContact,
            Self::ConfirmContact { .. } => PacketId::ConfirmContact,
            Self::RejectContact { .. } => PacketId::RejectContact,
            Self::Image { .. } => PacketId::Image,
        }
    }

    pub fn to_packet(&self) -> Packet {
        let mut w = PayloadWriter::new();
        match self {
            Self::Login { username, password } => {
                let mut raw = BytesMut::with_capacity(username.len() + password.len() + 1);
                raw.put_slice(username.as_bytes());
                raw.put_u8(LOGIN_SEPARATOR);
                raw.put_slice(password.as_bytes());
                w.put_raw(&raw);
            }
            Self::Chat { to, message } => {
                w.put_i32(to.0).put_str(message.as_deref());
            }
            Self::Nudge { to } => {
                w.put_i32(to.0);
            }
            Self::Audio(data) => {
                w.put_raw(data);
            }
            Self::Ping => {}
            Self::Action { to, action } => {
                w.put_i32(to.0).put_str(action.as_deref());
            }
            Self::SetDisplayName(name) => {
                if let Some(name) = name {
                    w.put_raw(name.as_bytes());
                }
            }
            Self::SetStatus { status } => {
                w.put_i32(*status);
            }
            Self::AddContact { username, message } => {
                w.put_str(username.as_deref()).put_str(message.as_deref());
            }
            Self::ConfirmContact { requester } | Self::RejectContact { requester } => {
                w.put_i32(requester.0);
            }
            Self::Image { to, data } => {
                w.put_i32(to.0).put_blob(data.as_deref());
            }
        }
        Packet::new(self.packet_id(), w.finish())
    }

    /// Parse a packet sent by a client.
    ///
    /// Returns `Ok(None)` for ids that clients never send (unknown ids and
    /// server-to-client ids).
    pub fn from_packet(packet: &Packet) -> Result<Option<Self>, ProtocolError> {
        let Some(kind) = packet.kind() else {
            return Ok(None);
        };
        let mut r = PayloadReader::from_payload(packet.payload.as_ref());

        let message = match kind {
            PacketId::Login => {
                let raw = packet
                    .payload
                    .as_ref()
                    .ok_or(ProtocolError::MissingPayload(packet.id))?;
                let text = std::str::from_utf8(raw).map_err(|_| ProtocolError::InvalidUtf8)?;
                let (username, password) = text
                    .split_once(LOGIN_SEPARATOR as char)
                    .unwrap_or((text, ""));
                Self::Login {
                    username: username.to_string(),
                    password: password.to_string(),
                }
            }
            PacketId::Chat => Self::Chat {
                to: UserId(r.read_i32()?),
                message: r.read_str()?,
            },
            PacketId::Nudge => Self::Nudge {
                to: UserId(r.read_i32()?),
            },
            PacketId::Audio => Self::Audio(r.read_rest()),
            PacketId::Ping => Self::Ping,
            PacketId::Action => Self::Action {
                to: UserId(r.read_i32()?),
                action: r.read_str()?,
            },
            PacketId::SetDisplayName => {
                let raw = r.read_rest();
                if raw.is_empty() {
                    Self::SetDisplayName(None)
                } else {
                    let name =
                        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)?;
                    Self::SetDisplayName(Some(name))
                }
            }
            PacketId::UserStatusChange => Self::SetStatus {
                status: r.read_i32()?,
            },
            PacketId::AddContact => Self::AddContact {
                username: r.read_str()?,
                message: r.read_str()?,
            },
            PacketId::ConfirmContact => Self::ConfirmContact {
                requester: UserId(r.read_i32()?),
            },
            PacketId::RejectContact => Self::RejectContact {
                requester: UserId(r.read_i32()?),
            },
            PacketId::Image => Self::Image {
                to: UserId(r.read_i32()?),
                data: r.read_blob()?,
            },
            PacketId::LoginResult
            | PacketId::ActionFrom
            | PacketId::NudgeFrom
            | PacketId::ChatFrom
            | PacketId::AddContactResponse
            | PacketId::NotifyAddRequest
            | PacketId::ConfirmContactResponse
            | PacketId::RejectContactResponse
            | PacketId::AddContactAccepted
            | PacketId::ImageFrom => return Ok(None),
        };
        Ok(Some(message))
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

/// Everything a client receives after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginSnapshot {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub status_text: Option<String>,
    pub friends: Vec<ContactProfile>,
    pub pending: Vec<PendingRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `None` means the login was refused; no reason is disclosed.
    LoginResult(Option<LoginSnapshot>),
    ChatFrom { from: UserId, message: Option<String> },
    NudgeFrom { from: UserId },
    ActionFrom { from: UserId, action: Option<String> },
    Audio(Bytes),
    UserStatusChange { user_id: UserId, status: i32 },
    AddContactResponse(AddContactResult),
    NotifyAddRequest {
        requester: UserId,
        username: Option<String>,
        display_name: Option<String>,
        message: Option<String>,
    },
    ConfirmContactResponse {
        result: PendingResult,
        requester: UserId,
        /// Present only on success.
        profile: Option<ContactProfile>,
    },
    RejectContactResponse { result: PendingResult, requester: UserId },
    AddContactAccepted(ContactProfile),
    ImageFrom { from: UserId, data: Option<Bytes> },
}

impl ServerMessage {
    pub fn packet_id(&self) -> PacketId {
        match self {
            Self::LoginResult(_) => PacketId::LoginResult,
            Self::ChatFrom { .. } => PacketId::ChatFrom,
            Self::NudgeFrom { .. } => PacketId::NudgeFrom,
            Self::ActionFrom { .. } => PacketId::ActionFrom,
            Self::Audio(_) => PacketId::Audio,
            Self::UserStatusChange { .. } => PacketId::UserStatusChange,
            Self::AddContactResponse(_) => PacketId::AddContactResponse,
            Self::NotifyAddRequest { .. } => PacketId::NotifyAddRequest,
            Self::ConfirmContactResponse { .. } => PacketId::ConfirmContactResponse,
            Self::RejectContactResponse { .. } => PacketId::RejectContactResponse,
            Self::AddContactAccepted(_) => PacketId::AddContactAccepted,
            Self::ImageFrom { .. } => PacketId::ImageFrom,
        }
    }

    pub fn to_packet(&self) -> Packet {
        let mut w = PayloadWriter::new();
        match self {
            Self::LoginResult(None) => {
                w.put_bool(false);
            }
            Self::LoginResult(Some(snapshot)) => {
                w.put_bool(true)
                    .put_i32(snapshot.user_id.0)
                    .put_str(snapshot.display_name.as_deref())
                    .put_str(snapshot.status_text.as_deref());

                w.put_i32(snapshot.friends.len() as i32);
                for friend in &snapshot.friends {
                    w.put_i32(friend.user_id.0);
                    write_profile_tail(&mut w, friend);
                }

                w.put_i32(snapshot.pending.len() as i32);
                for pending in &snapshot.pending {
                    w.put_i32(pending.user_id.0)
                        .put_str(Some(pending.username.as_str()))
                        .put_str(pending.display_name.as_deref())
                        .put_str(pending.image_url.as_deref())
                        .put_str(pending.message.as_deref());
                }
            }
            Self::ChatFrom { from, message } => {
                w.put_i32(from.0).put_str(message.as_deref());
            }
            Self::NudgeFrom { from } => {
                w.put_i32(from.0);
            }
            Self::ActionFrom { from, action } => {
                w.put_i32(from.0).put_str(action.as_deref());
            }
            Self::Audio(data) => {
                w.put_raw(data);
            }
            Self::UserStatusChange { user_id, status } => {
                w.put_i32(user_id.0).put_i32(*status);
            }
            Self::AddContactResponse(result) => {
                w.put_i32(*result as i32);
            }
            Self::NotifyAddRequest {
                requester,
                username,
                display_name,
                message,
            } => {
                w.put_i32(requester.0)
                    .put_str(username.as_deref())
                    .put_str(display_name.as_deref())
                    .put_str(message.as_deref());
            }
            Self::ConfirmContactResponse {
                result,
                requester,
                profile,
            } => {
                w.put_i32(*result as i32).put_i32(requester.0);
                if let Some(profile) = profile {
                    write_profile_tail(&mut w, profile);
                }
            }
            Self::RejectContactResponse { result, requester } => {
                w.put_i32(*result as i32).put_i32(requester.0);
            }
            Self::AddContactAccepted(profile) => {
                w.put_i32(profile.user_id.0);
                write_profile_tail(&mut w, profile);
            }
            Self::ImageFrom { from, data } => {
                w.put_i32(from.0).put_blob(data.as_deref());
            }
        }
        Packet::new(self.packet_id(), w.finish())
    }

    /// Parse a packet sent by the server. Returns `Ok(None)` for client-only ids.
    pub fn from_packet(packet: &Packet) -> Result<Option<Self>, ProtocolError> {
        let Some(kind) = packet.kind() else {
            return Ok(None);
        };
        let mut r = PayloadReader::from_payload(packet.payload.as_ref());

        let message = match kind {
            PacketId::LoginResult => {
                if !r.read_bool()? {
                    Self::LoginResult(None)
                } else {
                    let user_id = UserId(r.read_i32()?);
                    let display_name = r.read_str()?;
                    let status_text = r.read_str()?;

                    let friend_count = r.read_i32()?.max(0);
                    let mut friends = Vec::new();
                    for _ in 0..friend_count {
                        let id = UserId(r.read_i32()?);
                        friends.push(read_profile_tail(&mut r, id)?);
                    }

                    let pending_count = r.read_i32()?.max(0);
                    let mut pending = Vec::new();
                    for _ in 0..pending_count {
                        pending.push(PendingRequest {
                            user_id: UserId(r.read_i32()?),
                            username: r.read_str()?.unwrap_or_default(),
                            display_name: r.read_str()?,
                            image_url: r.read_str()?,
                            message: r.read_str()?,
                        });
                    }

                    Self::LoginResult(Some(LoginSnapshot {
                        user_id,
                        display_name,
                        status_text,
                        friends,
                        pending,
                    }))
                }
            }
            PacketId::ChatFrom => Self::ChatFrom {
                from: UserId(r.read_i32()?),
                message: r.read_str()?,
            },
            PacketId::NudgeFrom => Self::NudgeFrom {
                from: UserId(r.read_i32()?),
            },
            PacketId::ActionFrom => Self::ActionFrom {
                from: UserId(r.read_i32()?),
                action: r.read_str()?,
            },
            PacketId::Audio => Self::Audio(r.read_rest()),
            PacketId::UserStatusChange => Self::UserStatusChange {
                user_id: UserId(r.read_i32()?),
                status: r.read_i32()?,
            },
            PacketId::AddContactResponse => {
                let code = r.read_i32()?;
                let result = AddContactResult::from_i32(code).ok_or(ProtocolError::InvalidField {
                    field: "add_contact_result",
                    value: code,
                })?;
                Self::AddContactResponse(result)
            }
            PacketId::NotifyAddRequest => Self::NotifyAddRequest {
                requester: UserId(r.read_i32()?),
                username: r.read_str()?,
                display_name: r.read_str()?,
                message: r.read_str()?,
            },
            PacketId::ConfirmContactResponse => {
                let result = read_pending_result(&mut r)?;
                let requester = UserId(r.read_i32()?);
                let profile = if r.remaining() > 0 {
                    Some(read_profile_tail(&mut r, requester)?)
                } else {
                    None
                };
                Self::ConfirmContactResponse {
                    result,
                    requester,
                    profile,
                }
            }
            PacketId::RejectContactResponse => Self::RejectContactResponse {
                result: read_pending_result(&mut r)?,
                requester: UserId(r.read_i32()?),
            },
            PacketId::AddContactAccepted => {
                let id = UserId(r.read_i32()?);
                Self::AddContactAccepted(read_profile_tail(&mut r, id)?)
            }
            PacketId::ImageFrom => Self::ImageFrom {
                from: UserId(r.read_i32()?),
                data: r.read_blob()?,
            },
            PacketId::Login
            | PacketId::Chat
            | PacketId::Nudge
            | PacketId::Ping
            | PacketId::Action
            | PacketId::SetDisplayName
            | PacketId::AddContact
            | PacketId::ConfirmContact
            | PacketId::RejectContact
            | PacketId::Image => return Ok(None),
        };
        Ok(Some(message))
    }
}

impl From<ServerMessage> for Packet {
    fn from(message: ServerMessage) -> Self {
        message.to_packet()
    }
}

impl From<ClientMessage> for Packet {
    fn from(message: ClientMessage) -> Self {
        message.to_packet()
    }
}

/// `username, displayName, status, imageURL, statusText` -- the id is written by the caller.
fn write_profile_tail(w: &mut PayloadWriter, profile: &ContactProfile) {
    w.put_str(Some(profile.username.as_str()))
        .put_str(profile.display_name.as_deref())
        .put_i32(profile.status)
        .put_str(profile.image_url.as_deref())
        .put_str(profile.status_text.as_deref());
}

fn read_profile_tail(r: &mut PayloadReader, user_id: UserId) -> Result<ContactProfile, ProtocolError> {
    Ok(ContactProfile {
        user_id,
        username: r.read_str()?.unwrap_or_default(),
        display_name: r.read_str()?,
        status: r.read_i32()?,
        image_url: r.read_str()?,
        status_text: r.read_str()?,
    })
}

fn read_pending_result(r: &mut PayloadReader) -> Result<PendingResult, ProtocolError> {
    let code = r.read_i32()?;
    PendingResult::from_i32(code).ok_or(ProtocolError::InvalidField {
        field: "pending_result",
        value: code,
    })
}
