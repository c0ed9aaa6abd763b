use thiserror::Error;
use tokio::time::error::Elapsed;

use crate::packet::{Origin, PacketKind};

pub type Result<T> = std::result::Result<T, RconError>;

/// Possible errors for the package.
#[derive(Error, Debug)]
pub enum RconError {
    /// Returned when an outgoing body is longer than the protocol allows.
    #[error("packet body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },
    /// Returned when a packet kind has no wire code for the side sending it,
    /// e.g. a client trying to send an auth response.
    #[error("{kind:?} cannot be sent by {origin:?}")]
    UnsupportedKind { kind: PacketKind, origin: Origin },
    /// Returned if the size field is not exactly four bytes.
    #[error("size field must be 4 bytes, got {0}")]
    BadSize(usize),
    /// Returned if the payload length or terminator does not match the size
    /// field.
    #[error("packet malformed (length or terminator mismatch)")]
    Malformed,
    /// Returned if we received a packet with a type code unknown for its sender.
    #[error("unknown rcon packet type {code} from {origin:?}")]
    UnknownKindCode { code: i32, origin: Origin },
    /// Returned if the stream closed in the middle of a packet.
    #[error("connection closed mid-packet")]
    UnexpectedEndOfStream,
    /// Returned if a well-formed packet arrives that the exchange did not call for.
    #[error("unexpected {kind:?} packet with id {id}")]
    UnexpectedPacket { kind: PacketKind, id: i32 },
    /// Returned if the body is not valid utf-8 when read as text.
    #[error("packet body malformed (not valid utf-8)")]
    MalformedBody(#[from] std::str::Utf8Error),
    /// Returned if the host is down or behind a firewall.
    #[error("host cannot be reached")]
    UnreachableHost(#[source] std::io::Error),
    /// Internal error used if the stream was successfully established, but
    /// there was a problem writing to the socket.
    #[error("cannot send message to host")]
    SendError(#[source] std::io::Error),
    /// Internal error used if the stream was successfully established, but
    /// there was a problem reading from the socket.
    #[error("cannot receive response from host")]
    ReceiveError(#[source] std::io::Error),
    /// Returned by `connect_authenticated` if you can't remember the password.
    #[error("bad password")]
    AuthenticationFailed,
    /// Returned if the host did not accept the connection in time.
    #[error("connect timed out")]
    ConnectTimeout(#[from] Elapsed),
}
