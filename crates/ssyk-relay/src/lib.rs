//! `ssyk_core::Relay` implementations: a length-prefixed TCP transport to a
//! remote hub, and an in-memory double for tests.
//!
//! `Relay` itself is a synchronous, blocking trait (`Core` calls it from
//! behind its own mutex, never concurrently) -- [`tcp::TcpRelay`] bridges
//! that into async I/O the way a CLI entry point bridges into an async
//! runtime: one `tokio::runtime::Runtime` owned by the relay, `block_on`
//! per call.

pub mod memory;
pub mod tcp;
mod wire;

pub use memory::InMemoryRelay;
pub use tcp::TcpRelay;
