/// Largest payload a single frame may carry (20 MB, enough for large images).
pub const MAX_FRAME_LEN: usize = 20_000_000;

/// Size of the fixed frame header: 4-byte id followed by 4-byte length.
pub const HEADER_LEN: usize = 8;

/// Default TCP port for the binary protocol.
pub const DEFAULT_PORT: u16 = 5035;

/// Seconds a single socket read may take before the connection is dropped.
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 60;

/// Seconds a single socket write may take before the send is abandoned.
pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 30;

/// Separator between username and password in a login payload.
pub const LOGIN_SEPARATOR: u8 = b'\n';
