//! msgpack-RPC wire types for the vimhost control channel.
//!
//! The control channel carries three kinds of frames between vimhost and a
//! supervised editor process:
//!
//! 1. [`Request`] - a method call from vimhost, correlated by `id`
//! 2. [`Response`] - the editor's answer to a request, carrying either `result` or `error`
//! 3. [`Notification`] - an unsolicited event from the editor (no `id`)
//!
//! Frames are msgpack arrays; [`value`] converts their payloads to and from
//! the `serde_json::Value`s the rest of the workspace works with.

pub mod buffer;
pub mod message;
pub mod value;

pub use buffer::Buffer;
pub use message::{Message, Notification, RemoteError, Request, Response, methods};
