#![deny(missing_docs)]
//! A minimal networked key-value store built to be exercised through
//! property-based testing of its wire protocol and its cross-client
//! isolation guarantees.
//!
//! This crate provides the store engine itself, as well as an [`skv-server`]
//! and [`skv-client`] executable that can be used to interact with it.
//! Data is sent between the client and server using synchronous networking
//! over a custom self-framing protocol.
//!
//! ## Data model
//! A [`Value`] is a recursive tagged type: null, boolean, integer, text, or
//! an insertion-ordered object of text keys to nested values. The store
//! maps text keys to values and persists each key as one JSON file under a
//! store directory.
//!
//! ## Wire protocol
//! A [`Message`] is one of a closed set of request and lifecycle variants
//! (`insert`, `get`, `delete`, `select`, `startup`, `stop`, `shutdown`),
//! encoded as a sequence of self-describing frames (see [`wire`]). Framing
//! is length-prefixed, never delimiter-based, so embedded CRLF bytes in
//! payloads are harmless and `decode(encode(m)) == m` holds for every valid
//! message.
//!
//! ## Dispatch and lifecycle
//! A [`Dispatcher`] owns one [`Store`] and a running/stopped flag. While
//! stopped, every message except startup is rejected as unavailable. The
//! store is saved synchronously after every handled message. [`KvServer`]
//! hosts a dispatcher behind a one-request-per-connection TCP transport;
//! its accept loop runs on a background thread and drains in-flight
//! requests before stopping.
//!
//! ## Clients and isolation
//! A [`Client`] carries a tenant prefix and rewrites every key-bearing
//! field (select patterns included) to `"<prefix>_" + field` before
//! transmission. This single rewrite is the whole isolation mechanism.
//!
//! ## Traces
//! The [`trace`] module replays ordered scripts of client and lifecycle
//! interactions against a live server and checks the recorded outcomes for
//! isolation and state-model equivalence. The property-based test suite in
//! `tests/` drives randomized traces through it.
//!
//! [`skv-server`]: ./bin/skv-server.rs
//! [`skv-client`]: ./bin/skv-client.rs

pub use client::{with_prefix, Client, ADMIN_PREFIX};
pub use dispatcher::{Dispatcher, Disposition, Reply, ServerState, Status};
pub use error::{Result, SkvError};
pub use message::Message;
pub use server::{KvServer, ServerHandle};
pub use store::Store;
pub use trace::{check_isolation, check_state_model, execute, Interaction, Outcome, ServerOp, Trace};
pub use value::Value;

mod client;
mod dispatcher;
mod error;
mod message;
mod server;
mod store;
pub mod trace;
mod value;
pub mod wire;
