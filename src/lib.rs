//! Pure Rust async implementation of the [Source RCON protocol](https://developer.valvesoftware.com/wiki/Source_RCON_Protocol).
pub mod client;
pub mod config;
pub mod error;
pub mod packet;

pub use client::{Client, Response};
pub use config::ConnectOptions;
pub use error::{RconError, Result};
pub use packet::{Origin, Packet, PacketKind};
