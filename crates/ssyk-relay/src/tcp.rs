//! Length-prefixed TCP relay client.
//!
//! Framing follows `wraith_transport::tcp::TcpTransport`'s length-prefixed
//! scheme, sized down to the `u16` bound the collaborator contract specifies
//! (65535 bytes per frame). Connection handling follows the original
//! `connectToHub`: dial lazily on first use, cache the connection, and drop
//! it on any I/O error so the next call redials.

use std::net::SocketAddr;

use ssyk_core::{AckResponse, CoreError, RecvResponse, Relay, SendRequest};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use crate::wire::{self, Response, MAX_FRAME_LEN};

/// A `Relay` backed by a single TCP connection to a hub.
///
/// Owns its own Tokio runtime so its `send`/`recv` methods can stay
/// synchronous, matching the `ssyk_core::Relay` trait; construct one
/// `TcpRelay` per `Core`, not per call.
pub struct TcpRelay {
    hub_address: SocketAddr,
    runtime: Runtime,
    conn: Option<TcpStream>,
}

impl TcpRelay {
    /// Prepare a relay for `hub_address`. The connection is not dialed until
    /// the first `send` or `recv`.
    pub fn new(hub_address: SocketAddr) -> Result<Self, CoreError> {
        let runtime = Runtime::new()
            .map_err(|e| CoreError::RelayError(format!("failed to start async runtime: {e}")))?;
        Ok(Self {
            hub_address,
            runtime,
            conn: None,
        })
    }
}

async fn ensure_connected(
    conn: &mut Option<TcpStream>,
    hub_address: SocketAddr,
) -> Result<&mut TcpStream, CoreError> {
    if conn.is_none() {
        debug!(addr = %hub_address, "dialing hub");
        let stream = TcpStream::connect(hub_address)
            .await
            .map_err(|e| CoreError::RelayError(format!("dial {hub_address} failed: {e}")))?;
        *conn = Some(stream);
    }
    Ok(conn.as_mut().expect("just populated"))
}

async fn round_trip(
    conn: &mut Option<TcpStream>,
    hub_address: SocketAddr,
    frame: Vec<u8>,
) -> Result<Vec<u8>, CoreError> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(CoreError::MalformedInput(format!(
            "frame of {} bytes exceeds the {} byte relay bound",
            frame.len(),
            MAX_FRAME_LEN
        )));
    }

    let result = async {
        let stream = ensure_connected(conn, hub_address).await?;
        stream
            .write_all(&(frame.len() as u16).to_be_bytes())
            .await
            .map_err(|e| CoreError::RelayError(format!("write length prefix: {e}")))?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| CoreError::RelayError(format!("write frame: {e}")))?;

        let mut len_buf = [0u8; 2];
        stream
            .read_exact(&mut len_buf)
            .await
            .map_err(|e| CoreError::RelayError(format!("read length prefix: {e}")))?;
        let len = u16::from_be_bytes(len_buf) as usize;

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .await
            .map_err(|e| CoreError::RelayError(format!("read frame: {e}")))?;
        Ok(payload)
    }
    .await;

    if result.is_err() {
        warn!(addr = %hub_address, "hub connection failed, dropping for redial");
        *conn = None;
    }
    result
}

impl Relay for TcpRelay {
    fn send(&mut self, request: &SendRequest) -> Result<AckResponse, CoreError> {
        let frame = wire::encode_send_request(request);
        let TcpRelay {
            hub_address,
            runtime,
            conn,
        } = self;
        let payload = runtime.block_on(round_trip(conn, *hub_address, frame))?;
        match wire::decode_response(&payload) {
            Some(Response::Ack(ack)) => Ok(ack),
            _ => Err(CoreError::RelayError(
                "hub returned a malformed Ack frame".into(),
            )),
        }
    }

    fn recv(&mut self) -> Result<Option<RecvResponse>, CoreError> {
        let frame = wire::encode_get_next_message();
        let TcpRelay {
            hub_address,
            runtime,
            conn,
        } = self;
        let payload = runtime.block_on(round_trip(conn, *hub_address, frame))?;
        match wire::decode_response(&payload) {
            Some(Response::Recv(response)) => Ok(response),
            _ => Err(CoreError::RelayError(
                "hub returned a malformed message frame".into(),
            )),
        }
    }
}
