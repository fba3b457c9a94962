//! The untrusted store-and-forward transport, as a collaborator trait.
//!
//! Wire field names follow the spec's protobuf-equivalent shapes so a wire
//! implementation stays a drop-in; `ssyk-relay` ships a framed TCP
//! implementation and an in-memory test double.

/// A request to forward an envelope to `to_address`.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub to_address: String,
    pub convo_id: String,
    pub content: Vec<u8>,
}

/// An envelope delivered from `from_address`.
#[derive(Debug, Clone)]
pub struct RecvResponse {
    pub from_address: String,
    pub convo_id: String,
    pub content: Vec<u8>,
}

/// The relay's acknowledgement of a `SendRequest`.
#[derive(Debug, Clone)]
pub struct AckResponse {
    pub success: bool,
    pub error: String,
}

/// Opaque envelope transport. Delivery is FIFO per recipient; an empty
/// `from_address` response (`recv` returning `None`) means no pending
/// message.
pub trait Relay: Send {
    fn send(&mut self, request: &SendRequest) -> Result<AckResponse, crate::CoreError>;

    fn recv(&mut self) -> Result<Option<RecvResponse>, crate::CoreError>;
}
