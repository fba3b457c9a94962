//! The hub wire protocol: a hand-rolled equivalent of the protobuf `Request`/
//! response shapes in the collaborator contract, framed as
//! `[length: u16 BE][payload]`. There is no generated-code dependency here;
//! the message shapes are small and fixed, so a direct length-prefixed
//! encoding is simpler than wiring in a schema compiler for two messages.

use ssyk_core::{AckResponse, RecvResponse, SendRequest};

/// Maximum framed payload, matching the bound the collaborator contract
/// places on a single Relay round-trip.
pub const MAX_FRAME_LEN: usize = 65535;

const TAG_SEND_REQUEST: u8 = 0;
const TAG_GET_NEXT_MESSAGE: u8 = 1;
const TAG_ACK: u8 = 2;
const TAG_RECV_RESPONSE: u8 = 3;
const TAG_NO_MESSAGE: u8 = 4;

fn put_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(&(s.len() as u16).to_be_bytes());
    out.extend_from_slice(s.as_bytes());
}

fn put_bytes(out: &mut Vec<u8>, b: &[u8]) {
    out.extend_from_slice(&(b.len() as u32).to_be_bytes());
    out.extend_from_slice(b);
}

fn take_str(buf: &[u8], pos: &mut usize) -> Option<String> {
    let len = u16::from_be_bytes(buf.get(*pos..*pos + 2)?.try_into().ok()?) as usize;
    *pos += 2;
    let bytes = buf.get(*pos..*pos + len)?;
    *pos += len;
    String::from_utf8(bytes.to_vec()).ok()
}

fn take_bytes(buf: &[u8], pos: &mut usize) -> Option<Vec<u8>> {
    let len = u32::from_be_bytes(buf.get(*pos..*pos + 4)?.try_into().ok()?) as usize;
    *pos += 4;
    let bytes = buf.get(*pos..*pos + len)?;
    *pos += len;
    Some(bytes.to_vec())
}

/// Encode a `SendMessage` request frame.
pub fn encode_send_request(request: &SendRequest) -> Vec<u8> {
    let mut out = vec![TAG_SEND_REQUEST];
    put_str(&mut out, &request.to_address);
    put_str(&mut out, &request.convo_id);
    put_bytes(&mut out, &request.content);
    out
}

/// Encode a `GetNextMessage` request frame (no body).
pub fn encode_get_next_message() -> Vec<u8> {
    vec![TAG_GET_NEXT_MESSAGE]
}

/// Decode an `Ack` or `RecvResponse` frame sent back by the hub.
pub enum Response {
    Ack(AckResponse),
    Recv(Option<RecvResponse>),
}

pub fn decode_response(buf: &[u8]) -> Option<Response> {
    let mut pos = 1;
    match *buf.first()? {
        TAG_ACK => {
            let success = *buf.get(pos)? != 0;
            pos += 1;
            let error = take_str(buf, &mut pos)?;
            Some(Response::Ack(AckResponse { success, error }))
        }
        TAG_RECV_RESPONSE => {
            let from_address = take_str(buf, &mut pos)?;
            let convo_id = take_str(buf, &mut pos)?;
            let content = take_bytes(buf, &mut pos)?;
            Some(Response::Recv(Some(RecvResponse {
                from_address,
                convo_id,
                content,
            })))
        }
        TAG_NO_MESSAGE => Some(Response::Recv(None)),
        _ => None,
    }
}

/// Encode an `Ack` response frame (server side of the wire, kept here since
/// it shares the tag constants; unused by the client relay but documents the
/// full protocol one file can be read to understand).
pub fn encode_ack(ack: &AckResponse) -> Vec<u8> {
    let mut out = vec![TAG_ACK, ack.success as u8];
    put_str(&mut out, &ack.error);
    out
}

/// Encode a `RecvResponse` (or "no message pending") response frame.
pub fn encode_recv_response(response: Option<&RecvResponse>) -> Vec<u8> {
    match response {
        None => vec![TAG_NO_MESSAGE],
        Some(r) => {
            let mut out = vec![TAG_RECV_RESPONSE];
            put_str(&mut out, &r.from_address);
            put_str(&mut out, &r.convo_id);
            put_bytes(&mut out, &r.content);
            out
        }
    }
}

/// Decode a request frame sent by a client (used by test/server harnesses).
pub enum Request {
    Send(SendRequest),
    GetNextMessage,
}

pub fn decode_request(buf: &[u8]) -> Option<Request> {
    let mut pos = 1;
    match *buf.first()? {
        TAG_SEND_REQUEST => {
            let to_address = take_str(buf, &mut pos)?;
            let convo_id = take_str(buf, &mut pos)?;
            let content = take_bytes(buf, &mut pos)?;
            Some(Request::Send(SendRequest {
                to_address,
                convo_id,
                content,
            }))
        }
        TAG_GET_NEXT_MESSAGE => Some(Request::GetNextMessage),
        _ => None,
    }
}
