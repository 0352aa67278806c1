//! Networked play for Summoners.
//!
//! Two peers each keep a full copy of the game. The peer whose team is to
//! move is authoritative: it resolves clicks, runs the rules engine and
//! broadcasts the whole encoded state. The other peer swaps that state in.
//! A small HTTP relay forwards messages between them.
//!
//! - [`layout`]: screen positions to grid cells
//! - [`session`]: the per-peer protocol state machine
//! - [`transport`]: HTTP (via the relay) and in-memory message links
//! - [`relay`]: the axum relay server
//! - [`runner`]: the fixed-rate tick loop and terminal input
//! - [`config`]: TOML configuration

pub mod cli;
pub mod config;
pub mod layout;
pub mod relay;
pub mod runner;
pub mod session;
pub mod transport;

pub use config::{Config, ConfigError, PeerConfig, RelayConfig};
pub use layout::Layout;
pub use session::{PeerSession, SessionError};
pub use transport::{HttpTransport, MemoryTransport, Transport, TransportError};
