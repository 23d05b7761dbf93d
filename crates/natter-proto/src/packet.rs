use bytes::Bytes;

/// Message type tags carried in the first four bytes of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum PacketId {
    Login = 0,
    LoginResult = 1,
    Chat = 2,
    Nudge = 3,
    Audio = 4,
    Ping = 5,
    Action = 6,
    ActionFrom = 7,
    SetDisplayName = 8,
    NudgeFrom = 9,
    UserStatusChange = 10,
    ChatFrom = 11,
    AddContact = 12,
    AddContactResponse = 13,
    NotifyAddRequest = 14,
    ConfirmContact = 15,
    ConfirmContactResponse = 16,
    RejectContact = 17,
    RejectContactResponse = 18,
    AddContactAccepted = 19,
    Image = 20,
    ImageFrom = 21,
}

impl PacketId {
    pub fn from_i32(id: i32) -> Option<Self> {
        let kind = match id {
            0 => Self::Login,
            1 => Self::LoginResult,
            2 => Self::Chat,
            3 => Self::Nudge,
            4 => Self::Audio,
            5 => Self::Ping,
            6 => Self::Action,
            7 => Self::ActionFrom,
            8 => Self::SetDisplayName,
            9 => Self::NudgeFrom,
            10 => Self::UserStatusChange,
            11 => Self::ChatFrom,
            12 => Self::AddContact,
            13 => Self::AddContactResponse,
            14 => Self::NotifyAddRequest,
            15 => Self::ConfirmContact,
            16 => Self::ConfirmContactResponse,
            17 => Self::RejectContact,
            18 => Self::RejectContactResponse,
            19 => Self::AddContactAccepted,
            20 => Self::Image,
            21 => Self::ImageFrom,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// One decoded frame: a type tag plus an optional opaque payload.
///
/// A zero-length payload on the wire is represented as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub payload: Option<Bytes>,
}

impl Packet {
    pub fn new(id: PacketId, payload: impl Into<Bytes>) -> Self {
        let payload: Bytes = payload.into();
        Self {
            id: id.as_i32(),
            payload: (!payload.is_empty()).then_some(payload),
        }
    }

    /// Packet with an arbitrary, possibly unknown, type tag.
    pub fn from_raw(id: i32, payload: Option<Bytes>) -> Self {
        Self {
            id,
            payload: payload.filter(|p| !p.is_empty()),
        }
    }

    pub fn empty(id: PacketId) -> Self {
        Self {
            id: id.as_i32(),
            payload: None,
        }
    }

    /// Known type tag, if any.
    pub fn kind(&self) -> Option<PacketId> {
        PacketId::from_i32(self.id)
    }

    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Bytes::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_id_mapping() {
        for raw in 0..=21 {
            let id = PacketId::from_i32(raw).expect("known id");
            assert_eq!(id.as_i32(), raw);
        }
        assert!(PacketId::from_i32(22).is_none());
        assert!(PacketId::from_i32(-1).is_none());
    }

    #[test]
    fn test_empty_payload_is_absent() {
        let packet = Packet::new(PacketId::Audio, Vec::new());
        assert!(packet.payload.is_none());
        assert_eq!(packet.payload_len(), 0);
    }
}
