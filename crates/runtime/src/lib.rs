//! vimhost runtime - control-channel plumbing
//!
//! This crate provides the low-level pieces used to talk to a supervised
//! editor process:
//!
//! - **Transport**: msgpack-RPC frames over a pair of pipes
//! - **Connection**: request/response correlation and the dispatch loop
//! - **Client contract**: [`RpcClient`], the calls the supervisor relies on
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ vimhost (core)   │  Supervisor, session manager, router
//! └────────┬─────────┘
//!          │ Arc<dyn RpcClient>
//! ┌────────▼─────────┐
//! │ vimhost-runtime  │  This crate
//! │  ┌────────────┐  │
//! │  │ Connection │  │  id correlation
//! │  └────────────┘  │
//! │  ┌────────────┐  │
//! │  │ Transport  │  │  msgpack over stdio
//! │  └────────────┘  │
//! └──────────────────┘
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{RpcClient, RpcFuture};
pub use connection::Connection;
pub use error::{Error, Result};
pub use transport::{PipeTransport, PipeTransportReceiver, PipeTransportSender, Transport, TransportParts, TransportReceiver};
