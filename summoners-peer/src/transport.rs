//! Message transports between two peers.
//!
//! Both implementations preserve message boundaries and per-direction FIFO
//! order. `recv` never blocks: it returns whatever has arrived since the
//! last call, possibly nothing.

use std::sync::Mutex;

use async_trait::async_trait;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use summoners_core::Team;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument};

#[derive(Debug, Display, Error)]
pub enum TransportError {
    #[display("relay request failed: {_0}")]
    Http(reqwest::Error),
    #[display("relay already has two peers")]
    RelayFull,
    #[display("relay answered with status {status}")]
    Status { status: u16 },
    #[display("peer channel closed")]
    Closed,
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Http(err)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue one message for the other peer.
    async fn send(&self, text: &str) -> Result<(), TransportError>;

    /// Everything received since the previous call, oldest first.
    async fn recv(&self) -> Result<Vec<String>, TransportError>;
}

// ============================================================================
// HTTP (relay)
// ============================================================================

/// Body of a successful `POST /join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinModel {
    pub player_id: u8,
}

/// Talks to the relay over HTTP.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    player_id: u8,
}

impl HttpTransport {
    /// Join the relay. The first peer to join plays PlayerOne.
    #[instrument(skip(base_url), fields(base_url = %base_url))]
    pub async fn join(base_url: &str) -> Result<(Self, Team), TransportError> {
        let client = reqwest::Client::builder().no_proxy().build()?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let response = client.post(format!("{}/join", base_url)).send().await?;
        match response.status().as_u16() {
            409 => return Err(TransportError::RelayFull),
            status if !response.status().is_success() => {
                return Err(TransportError::Status { status })
            }
            _ => {}
        }
        let JoinModel { player_id } = response.json().await?;
        let team = if player_id == 1 {
            Team::PlayerOne
        } else {
            Team::PlayerTwo
        };
        info!(player_id, ?team, "Joined relay");

        Ok((
            Self {
                client,
                base_url,
                player_id,
            },
            team,
        ))
    }

    pub fn player_id(&self) -> u8 {
        self.player_id
    }

    fn check(response: &reqwest::Response) -> Result<(), TransportError> {
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status {
                status: response.status().as_u16(),
            })
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let response = self
            .client
            .post(format!("{}/send/{}", self.base_url, self.player_id))
            .body(text.to_string())
            .send()
            .await?;
        Self::check(&response)
    }

    async fn recv(&self) -> Result<Vec<String>, TransportError> {
        let response = self
            .client
            .get(format!("{}/recv/{}", self.base_url, self.player_id))
            .send()
            .await?;
        Self::check(&response)?;
        Ok(response.json().await?)
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// One end of an in-process channel pair.
pub struct MemoryTransport {
    outbox: UnboundedSender<String>,
    inbox: Mutex<UnboundedReceiver<String>>,
}

impl MemoryTransport {
    /// Two connected ends: what one sends, the other receives.
    pub fn pair() -> (MemoryTransport, MemoryTransport) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            MemoryTransport {
                outbox: a_tx,
                inbox: Mutex::new(b_rx),
            },
            MemoryTransport {
                outbox: b_tx,
                inbox: Mutex::new(a_rx),
            },
        )
    }

    fn drain(&self) -> Result<Vec<String>, TransportError> {
        let mut inbox = self.inbox.lock().unwrap_or_else(|e| e.into_inner());
        let mut batch = Vec::new();
        loop {
            match inbox.try_recv() {
                Ok(text) => batch.push(text),
                Err(TryRecvError::Empty) => return Ok(batch),
                Err(TryRecvError::Disconnected) if batch.is_empty() => {
                    return Err(TransportError::Closed)
                }
                Err(TryRecvError::Disconnected) => return Ok(batch),
            }
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        self.outbox
            .send(text.to_string())
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&self) -> Result<Vec<String>, TransportError> {
        let batch = self.drain()?;
        if !batch.is_empty() {
            debug!(count = batch.len(), "received");
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_pair_fifo() {
        let (a, b) = MemoryTransport::pair();
        a.send("one").await.unwrap();
        a.send("two").await.unwrap();
        b.send("back").await.unwrap();

        assert_eq!(b.recv().await.unwrap(), vec!["one", "two"]);
        assert!(b.recv().await.unwrap().is_empty());
        assert_eq!(a.recv().await.unwrap(), vec!["back"]);
    }

    #[tokio::test]
    async fn test_memory_closed_after_drop() {
        let (a, b) = MemoryTransport::pair();
        a.send("last").await.unwrap();
        drop(a);

        assert_eq!(b.recv().await.unwrap(), vec!["last"]);
        assert!(matches!(b.recv().await, Err(TransportError::Closed)));
        assert!(matches!(b.send("x").await, Err(TransportError::Closed)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TransportError::RelayFull.to_string(), "relay already has two peers");
        assert_eq!(
            TransportError::Status { status: 400 }.to_string(),
            "relay answered with status 400"
        );
    }
}
