use std::borrow::Cow;

use bytes::{Bytes, BytesMut};
use log::{debug, trace};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

use crate::{
    config::ConnectOptions,
    error::{RconError, Result},
    packet::{self, Origin, Packet, PacketKind, AUTH_FAILED_ID, BASE_PACKET_SIZE, INITIAL_ID},
};

/// Simple asynchronous rcon client. Call `connect()` to establish a connection
/// and `authenticate()` to log in. The client should be `mut` as it keeps a
/// counter used for [Packet] IDs.
///
/// One client drives one exchange at a time; share it between tasks only
/// behind a lock.
///
/// ## Example
/// ```no_run
/// use rconsole::{client::Client, config::ConnectOptions};
/// use std::error::Error;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn Error>> {
///     // client must be mutable so we can increment packet IDs
///     let mut client = Client::connect("dev.viora.sh", 27016, ConnectOptions::default()).await?;
///     if !client.authenticate("<put rcon password here>").await? {
///         return Err("bad password".into());
///     }
///     let response = client.execute("echo hi").await?;
///
///     assert_eq!(response.text()?, "hi");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Client<S = TcpStream> {
    next_id: i32,
    multi: bool,
    stream: S,
}

/// Container struct for a response that can be glued together from multiple [Packet]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    body: Bytes,
}

impl Response {
    pub fn body(&self) -> &[u8] {
        self.body.as_ref()
    }

    pub fn text(&self) -> Result<&str> {
        Ok(std::str::from_utf8(&self.body)?)
    }

    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn into_bytes(self) -> Bytes {
        self.body
    }
}

impl Client<TcpStream> {
    pub async fn connect(address: &str, port: u16, options: ConnectOptions) -> Result<Self> {
        let connecting = TcpStream::connect((address, port));
        let stream = match options.timeout {
            Some(limit) => timeout(limit, connecting).await?,
            None => connecting.await,
        }
        .map_err(RconError::UnreachableHost)?;

        trace!("opened tcp stream to {}:{}", address, port);

        Ok(Self::from_stream(stream, options))
    }

    /// Connect and log in, treating a rejected password as
    /// [RconError::AuthenticationFailed].
    pub async fn connect_authenticated(
        address: &str,
        port: u16,
        password: &str,
        options: ConnectOptions,
    ) -> Result<Self> {
        let mut client = Self::connect(address, port, options).await?;
        if !client.authenticate(password).await? {
            return Err(RconError::AuthenticationFailed);
        }
        Ok(client)
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a transport that is already connected.
    pub fn from_stream(stream: S, options: ConnectOptions) -> Self {
        Client {
            next_id: INITIAL_ID,
            multi: options.multi,
            stream,
        }
    }

    /// Id the next outgoing packet will carry.
    pub fn next_id(&self) -> i32 {
        self.next_id
    }

    pub fn is_multi(&self) -> bool {
        self.multi
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Shut down the write half of the transport.
    pub async fn disconnect(mut self) -> Result<()> {
        self.stream.shutdown().await.map_err(RconError::SendError)
    }

    /// Send one packet and return the id it was sent with.
    pub async fn send(&mut self, kind: PacketKind, body: &[u8]) -> Result<i32> {
        let id = self.next_id;
        let bytes = Packet::new(kind, id, Bytes::copy_from_slice(body), Origin::Client)?.pack()?;
        // ids stay non-negative so they never collide with AUTH_FAILED_ID
        self.next_id = if id == i32::MAX { INITIAL_ID } else { id + 1 };

        trace!("sending {:?} packet {} ({} body bytes)", kind, id, body.len());
        self.stream
            .write_all(&bytes)
            .await
            .map_err(RconError::SendError)?;

        Ok(id)
    }

    /// Read the next packet the server sent.
    pub async fn receive(&mut self) -> Result<Packet> {
        let mut size = [0u8; 4];
        self.stream
            .read_exact(&mut size)
            .await
            .map_err(receive_error)?;
        let size = packet::decode_size(&size)?;
        if size < BASE_PACKET_SIZE {
            return Err(RconError::Malformed);
        }

        // grow with what actually arrives instead of trusting the size field
        let mut payload = Vec::new();
        (&mut self.stream)
            .take(size as u64)
            .read_to_end(&mut payload)
            .await
            .map_err(receive_error)?;
        if payload.len() != size as usize {
            return Err(RconError::UnexpectedEndOfStream);
        }

        let packet = packet::decode_payload(size, &payload, Origin::Server)?;
        trace!("receive {:?} packet {}", packet.kind(), packet.id());
        Ok(packet)
    }

    /// Log in with `password`. A rejected password is `Ok(false)`, not an
    /// error.
    pub async fn authenticate(&mut self, password: &str) -> Result<bool> {
        let auth_id = self.send(PacketKind::Auth, password.as_bytes()).await?;

        loop {
            let response = self.receive().await?;
            match (response.kind(), response.id()) {
                // some servers send an empty exec response ahead of the auth response
                (PacketKind::ExecResponse, id) if id == auth_id => {
                    debug!("discard exec response echoed for auth packet {}", id);
                }
                (PacketKind::AuthResponse, id) if id == auth_id => {
                    debug!("auth accepted");
                    return Ok(true);
                }
                (PacketKind::AuthResponse, AUTH_FAILED_ID) => {
                    debug!("auth rejected");
                    return Ok(false);
                }
                (kind, id) => return Err(RconError::UnexpectedPacket { kind, id }),
            }
        }
    }

    /// Run a rcon command. In multi mode a response split between multiple
    /// packets is joined together.
    pub async fn execute(&mut self, command: impl AsRef<[u8]>) -> Result<Response> {
        if self.multi {
            self.execute_multi(command.as_ref()).await
        } else {
            self.execute_single(command.as_ref()).await
        }
    }

    async fn execute_single(&mut self, command: &[u8]) -> Result<Response> {
        let command_id = self.send(PacketKind::Exec, command).await?;

        let response = self.receive().await?;
        match (response.kind(), response.id()) {
            (PacketKind::ExecResponse, id) if id == command_id => Ok(Response {
                body: response.body().clone(),
            }),
            (kind, id) => Err(RconError::UnexpectedPacket { kind, id }),
        }
    }

    async fn execute_multi(&mut self, command: &[u8]) -> Result<Response> {
        // since srcds can split up the response but it won't tell us how many
        // packets to expect, we send a second packet immediately afterwards
        // with a blank body so that we can get a confirmation that there are
        // no more packets in response to our command.
        let command_id = self.send(PacketKind::Exec, command).await?;
        let end_id = self.send(PacketKind::ExecResponse, b"").await?;

        let mut body = BytesMut::new();

        // we are guaranteed to receive responses to packets in the order we sent
        // them, so collect responses until we receive the id of the tracking packet.
        // There is no upper bound on how long this takes.
        loop {
            let response = self.receive().await?;
            match (response.kind(), response.id()) {
                (PacketKind::ExecResponse, id) if id == command_id => {
                    body.extend_from_slice(response.body());
                }
                (PacketKind::ExecResponse, id) if id == end_id => {
                    trace!("that was the tracking packet, completing response");
                    break;
                }
                // servers in a bad auth state may never answer the tracking
                // packet, so anything else is dropped
                (PacketKind::ExecResponse, id) => {
                    debug!("discard response for unrelated packet {}", id);
                }
                (kind, id) => return Err(RconError::UnexpectedPacket { kind, id }),
            }
        }

        Ok(Response {
            body: body.freeze(),
        })
    }
}

fn receive_error(err: std::io::Error) -> RconError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        RconError::UnexpectedEndOfStream
    } else {
        RconError::ReceiveError(err)
    }
}
