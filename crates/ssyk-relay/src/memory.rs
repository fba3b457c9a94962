//! An in-memory `Relay` test double.
//!
//! [`InMemoryRelay::paired`] wires two relays together so messages sent on
//! one side queue up for the other, without any actual I/O -- useful for
//! integration tests that exercise a full `Core` conversation.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use ssyk_core::{AckResponse, CoreError, RecvResponse, Relay, SendRequest};

/// One side of an in-memory relay pair.
///
/// `send` does not know its own address, so the paired test harness must
/// set `from_address` on queued messages itself (a real hub fills it in
/// from the authenticated connection the message arrived on).
#[derive(Clone)]
pub struct InMemoryRelay {
    inbound: Arc<Mutex<VecDeque<RecvResponse>>>,
    outbound: Arc<Mutex<VecDeque<RecvResponse>>>,
    from_address: String,
}

impl InMemoryRelay {
    /// Construct two relays, `a` and `b`, wired so `a.send` enqueues for
    /// `b.recv` and vice versa. `from_address` on an enqueued message is
    /// filled in from the sending side's own `address`.
    pub fn paired(address_a: impl Into<String>, address_b: impl Into<String>) -> (Self, Self) {
        let a_to_b = Arc::new(Mutex::new(VecDeque::new()));
        let b_to_a = Arc::new(Mutex::new(VecDeque::new()));
        (
            InMemoryRelay {
                inbound: b_to_a.clone(),
                outbound: a_to_b.clone(),
                from_address: address_a.into(),
            },
            InMemoryRelay {
                inbound: a_to_b,
                outbound: b_to_a,
                from_address: address_b.into(),
            },
        )
    }
}

impl Relay for InMemoryRelay {
    fn send(&mut self, request: &SendRequest) -> Result<AckResponse, CoreError> {
        self.outbound.lock().unwrap().push_back(RecvResponse {
            from_address: self.from_address.clone(),
            convo_id: request.convo_id.clone(),
            content: request.content.clone(),
        });
        Ok(AckResponse {
            success: true,
            error: String::new(),
        })
    }

    fn recv(&mut self) -> Result<Option<RecvResponse>, CoreError> {
        Ok(self.inbound.lock().unwrap().pop_front())
    }
}
