//! Wire codec for rcon packets.
//!
//! Every packet is laid out as (all integers little-endian `i32`):
//!
//! ```text
//! [ size ][ id ][ kind code ][ body ... ][ 0x00 ][ 0x00 ]
//! ```
//!
//! where `size` counts every byte after the size field itself.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{RconError, Result};

/// Longest body a client may put into a single packet.
pub const MAX_BODY_SIZE: usize = 1413;

/// Id, kind code and the two terminating null bytes.
pub const BASE_PACKET_SIZE: i32 = 10;

/// Id a server puts in an auth response when the password was wrong.
pub const AUTH_FAILED_ID: i32 = -1;

/// First id handed out by a fresh session, and where ids wrap back to.
pub const INITIAL_ID: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    // SERVERDATA_EXECCOMMAND
    Exec,
    // SERVERDATA_RESPONSE_VALUE
    ExecResponse,
    // SERVERDATA_AUTH
    Auth,
    // SERVERDATA_AUTH_RESPONSE
    AuthResponse,
}

/// Which side of the connection sent a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    Server,
}

// The protocol reuses code 2 for exec (client to server) and auth response
// (server to client), so a code only means something together with its sender.
const KIND_CODES: &[(Origin, PacketKind, i32)] = &[
    (Origin::Client, PacketKind::ExecResponse, 0),
    (Origin::Client, PacketKind::Exec, 2),
    (Origin::Client, PacketKind::Auth, 3),
    (Origin::Server, PacketKind::ExecResponse, 0),
    (Origin::Server, PacketKind::AuthResponse, 2),
    (Origin::Server, PacketKind::Auth, 3),
];

/// Wire code for `kind` when sent by `origin`, if that pairing exists.
pub fn kind_code(kind: PacketKind, origin: Origin) -> Option<i32> {
    KIND_CODES
        .iter()
        .find(|(o, k, _)| *o == origin && *k == kind)
        .map(|(_, _, code)| *code)
}

/// Packet kind for a wire `code` received from `origin`.
pub fn kind_from_code(code: i32, origin: Origin) -> Option<PacketKind> {
    KIND_CODES
        .iter()
        .find(|(o, _, c)| *o == origin && *c == code)
        .map(|(_, kind, _)| *kind)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    kind: PacketKind,
    id: i32,
    body: Bytes,
    origin: Origin,
}

impl Packet {
    /// Build a packet. Client packets are held to [MAX_BODY_SIZE]; server
    /// packets can be of any length.
    pub fn new(kind: PacketKind, id: i32, body: impl Into<Bytes>, origin: Origin) -> Result<Self> {
        let body = body.into();
        if origin == Origin::Client {
            check_body_size(&body)?;
        }

        Ok(Packet {
            kind,
            id,
            body,
            origin,
        })
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body as text. Fails if it isn't utf-8.
    pub fn body_str(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    // Since the only one of these values that can change in length is the body,
    // an easy way to calculate the size of a packet is to find the byte-length
    // of the packet body, then add 10 to it.
    pub fn size(&self) -> i32 {
        self.body.len() as i32 + BASE_PACKET_SIZE
    }

    pub fn pack(&self) -> Result<Bytes> {
        encode(self.kind, self.id, &self.body, self.origin)
    }
}

fn check_body_size(body: &[u8]) -> Result<()> {
    if body.len() > MAX_BODY_SIZE {
        return Err(RconError::BodyTooLarge {
            size: body.len(),
            max: MAX_BODY_SIZE,
        });
    }
    Ok(())
}

/// Encode a packet into its exact wire bytes. Only client bodies are held to
/// [MAX_BODY_SIZE].
pub fn encode(kind: PacketKind, id: i32, body: &[u8], origin: Origin) -> Result<Bytes> {
    if origin == Origin::Client {
        check_body_size(body)?;
    }
    let code = kind_code(kind, origin).ok_or(RconError::UnsupportedKind { kind, origin })?;

    let size = body.len() as i32 + BASE_PACKET_SIZE;
    let mut bytes = BytesMut::with_capacity(size as usize + 4);
    bytes.put_i32_le(size);
    bytes.put_i32_le(id);
    bytes.put_i32_le(code);
    bytes.put_slice(body);
    // null terminate the body, then null terminate the entire packet
    bytes.put_u16(0x00_00);

    Ok(bytes.freeze())
}

/// Decode the leading size field. `bytes` must be exactly four bytes long.
pub fn decode_size(bytes: &[u8]) -> Result<i32> {
    let raw: [u8; 4] = bytes
        .try_into()
        .map_err(|_| RconError::BadSize(bytes.len()))?;
    Ok(i32::from_le_bytes(raw))
}

/// Decode everything after the size field. `payload` must be exactly `size`
/// bytes and end in the two-byte terminator. Trailing bytes past `size` are
/// rejected too, not ignored.
pub fn decode_payload(size: i32, payload: &[u8], origin: Origin) -> Result<Packet> {
    if size < BASE_PACKET_SIZE || payload.len() != size as usize {
        return Err(RconError::Malformed);
    }

    let body_size = (size - BASE_PACKET_SIZE) as usize;
    let (mut header, rest) = payload.split_at(8);
    let (body, terminator) = rest.split_at(body_size);
    if terminator != [0, 0] {
        return Err(RconError::Malformed);
    }

    let id = header.get_i32_le();
    let code = header.get_i32_le();
    let kind = kind_from_code(code, origin).ok_or(RconError::UnknownKindCode { code, origin })?;

    Ok(Packet {
        kind,
        id,
        body: Bytes::copy_from_slice(body),
        origin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(bytes: &[u8]) -> (i32, &[u8]) {
        let size = decode_size(&bytes[..4]).unwrap();
        (size, &bytes[4..])
    }

    #[test]
    fn test_exec_wire_layout() {
        let bytes = encode(PacketKind::Exec, 7, b"echo hi", Origin::Client).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(&17i32.to_le_bytes());
        expected.extend_from_slice(&7i32.to_le_bytes());
        expected.extend_from_slice(&2i32.to_le_bytes());
        expected.extend_from_slice(b"echo hi");
        expected.extend_from_slice(&[0, 0]);

        assert_eq!(&bytes[..], &expected[..]);
    }

    #[test]
    fn test_size_field_counts_body_plus_ten() {
        for body in [&b""[..], &b"x"[..], &[b'a'; 300][..]] {
            let bytes = encode(PacketKind::Auth, 1, body, Origin::Client).unwrap();
            let (size, payload) = split(&bytes);
            assert_eq!(size, body.len() as i32 + 10);
            assert_eq!(payload.len(), size as usize);
        }
    }

    #[test]
    fn test_roundtrip_client_to_server() {
        let bytes = encode(PacketKind::Exec, 42, b"status", Origin::Client).unwrap();
        let (size, payload) = split(&bytes);
        let packet = decode_payload(size, payload, Origin::Client).unwrap();

        assert_eq!(packet.kind(), PacketKind::Exec);
        assert_eq!(packet.id(), 42);
        assert_eq!(packet.body_str().unwrap(), "status");
        assert_eq!(packet.origin(), Origin::Client);
    }

    #[test]
    fn test_roundtrip_auth_failure_id() {
        let bytes = encode(PacketKind::AuthResponse, AUTH_FAILED_ID, b"", Origin::Server).unwrap();
        let (size, payload) = split(&bytes);
        let packet = decode_payload(size, payload, Origin::Server).unwrap();

        assert_eq!(packet.kind(), PacketKind::AuthResponse);
        assert_eq!(packet.id(), AUTH_FAILED_ID);
        assert!(packet.body().is_empty());
    }

    #[test]
    fn test_body_size_boundary() {
        let max = vec![b'a'; MAX_BODY_SIZE];
        assert!(encode(PacketKind::Exec, 1, &max, Origin::Client).is_ok());

        let over = vec![b'a'; MAX_BODY_SIZE + 1];
        assert!(matches!(
            encode(PacketKind::Exec, 1, &over, Origin::Client),
            Err(RconError::BodyTooLarge { size: 1414, max: 1413 })
        ));
        assert!(matches!(
            Packet::new(PacketKind::Exec, 1, over.clone(), Origin::Client),
            Err(RconError::BodyTooLarge { .. })
        ));
        assert!(Packet::new(PacketKind::ExecResponse, 1, over, Origin::Server).is_ok());
    }

    #[test]
    fn test_server_bodies_are_not_limited() {
        let body = vec![b'z'; 4096];
        let bytes = encode(PacketKind::ExecResponse, 0, &body, Origin::Server).unwrap();
        let (size, payload) = split(&bytes);
        assert_eq!(size, 4106);

        let packet = decode_payload(size, payload, Origin::Server).unwrap();
        assert_eq!(&packet.body()[..], &body[..]);

        let packet = Packet::new(PacketKind::ExecResponse, 0, body, Origin::Server).unwrap();
        assert_eq!(packet.pack().unwrap(), bytes);
    }

    #[test]
    fn test_roundtrip_every_kind_code() {
        for &(origin, kind, _) in KIND_CODES {
            for id in [0, 1, i32::MAX] {
                for len in [0, 1, MAX_BODY_SIZE] {
                    let body = vec![b'q'; len];
                    let bytes = encode(kind, id, &body, origin).unwrap();
                    let (size, payload) = split(&bytes);
                    let packet = decode_payload(size, payload, origin).unwrap();

                    assert_eq!(packet.kind(), kind, "{:?} {:?}", origin, kind);
                    assert_eq!(packet.id(), id);
                    assert_eq!(&packet.body()[..], &body[..]);
                }
            }
        }
    }

    #[test]
    fn test_decode_payload_rejects_trailing_bytes() {
        let bytes = encode(PacketKind::ExecResponse, 1, b"hi", Origin::Server).unwrap();
        let (size, payload) = split(&bytes);
        let mut longer = payload.to_vec();
        longer.push(0);

        assert!(matches!(
            decode_payload(size, &longer, Origin::Server),
            Err(RconError::Malformed)
        ));
    }

    #[test]
    fn test_unsupported_kinds_are_rejected() {
        assert!(matches!(
            encode(PacketKind::AuthResponse, 1, b"", Origin::Client),
            Err(RconError::UnsupportedKind {
                kind: PacketKind::AuthResponse,
                origin: Origin::Client
            })
        ));
        assert!(matches!(
            encode(PacketKind::Exec, 1, b"", Origin::Server),
            Err(RconError::UnsupportedKind { .. })
        ));
    }

    #[test]
    fn test_code_two_depends_on_origin() {
        let bytes = encode(PacketKind::Exec, 3, b"", Origin::Client).unwrap();
        let (size, payload) = split(&bytes);

        let from_client = decode_payload(size, payload, Origin::Client).unwrap();
        let from_server = decode_payload(size, payload, Origin::Server).unwrap();

        assert_eq!(from_client.kind(), PacketKind::Exec);
        assert_eq!(from_server.kind(), PacketKind::AuthResponse);
        assert_eq!(from_client.id(), from_server.id());
    }

    #[test]
    fn test_body_with_embedded_nulls() {
        let body = b"a\0\0b";
        let bytes = encode(PacketKind::ExecResponse, 9, body, Origin::Server).unwrap();
        let (size, payload) = split(&bytes);
        let packet = decode_payload(size, payload, Origin::Server).unwrap();

        assert_eq!(&packet.body()[..], body);
    }

    #[test]
    fn test_decode_size_rejects_wrong_length() {
        assert!(matches!(decode_size(&[1, 0, 0]), Err(RconError::BadSize(3))));
        assert!(matches!(decode_size(&[1, 0, 0, 0, 0]), Err(RconError::BadSize(5))));
        assert_eq!(decode_size(&[10, 0, 0, 0]).unwrap(), 10);
    }

    #[test]
    fn test_decode_payload_malformed() {
        let bytes = encode(PacketKind::ExecResponse, 1, b"hello", Origin::Server).unwrap();
        let (size, payload) = split(&bytes);

        // truncated
        assert!(matches!(
            decode_payload(size, &payload[..payload.len() - 1], Origin::Server),
            Err(RconError::Malformed)
        ));

        // bad terminator
        let mut broken = payload.to_vec();
        let last = broken.len() - 1;
        broken[last] = 1;
        assert!(matches!(
            decode_payload(size, &broken, Origin::Server),
            Err(RconError::Malformed)
        ));

        // size smaller than the fixed overhead
        assert!(matches!(
            decode_payload(9, &payload[..9], Origin::Server),
            Err(RconError::Malformed)
        ));
    }

    #[test]
    fn test_unknown_kind_code() {
        let mut payload = Vec::new();
        payload.extend_from_slice(&1i32.to_le_bytes());
        payload.extend_from_slice(&5i32.to_le_bytes());
        payload.extend_from_slice(&[0, 0]);

        assert!(matches!(
            decode_payload(10, &payload, Origin::Server),
            Err(RconError::UnknownKindCode {
                code: 5,
                origin: Origin::Server
            })
        ));
    }

    #[test]
    fn test_kind_code_table_is_invertible() {
        for origin in [Origin::Client, Origin::Server] {
            for kind in [
                PacketKind::Exec,
                PacketKind::ExecResponse,
                PacketKind::Auth,
                PacketKind::AuthResponse,
            ] {
                if let Some(code) = kind_code(kind, origin) {
                    assert_eq!(kind_from_code(code, origin), Some(kind));
                }
            }
        }
    }
}
