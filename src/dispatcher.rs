use serde::Serialize;
use tracing::{debug, error};

use crate::error::SkvError;
use crate::message::Message;
use crate::store::Store;
use crate::value::Value;

/// Whether the server is accepting regular messages.
///
/// While `Stopped`, every message except [`Message::Startup`] is rejected
/// with a service-unavailable reply and performs no store access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// the server accepts all messages
    Running,
    /// only a startup message is accepted
    Stopped,
}

/// the result/status class of a reply, mapped to a numeric code on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// the request succeeded
    Ok,
    /// the request bytes or the select pattern were malformed
    BadRequest,
    /// the requested key is absent (a normal outcome, not an error)
    NotFound,
    /// the server is stopped
    Unavailable,
    /// persistence failed while handling this request
    StoreError,
}

impl Status {
    /// the numeric code carried on the wire
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotFound => 404,
            Status::Unavailable => 503,
            Status::StoreError => 500,
        }
    }

    /// maps a wire code back to a status, `None` if unknown
    pub fn from_code(code: u16) -> Option<Status> {
        match code {
            200 => Some(Status::Ok),
            400 => Some(Status::BadRequest),
            404 => Some(Status::NotFound),
            503 => Some(Status::Unavailable),
            500 => Some(Status::StoreError),
            _ => None,
        }
    }
}

/// one reply to one message: a status class plus a short text body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// the result/status class
    pub status: Status,
    /// the response body (a sentinel word, a JSON value, or a JSON array)
    pub body: String,
}

impl Reply {
    fn ok(body: impl Into<String>) -> Reply {
        Reply {
            status: Status::Ok,
            body: body.into(),
        }
    }

    /// the reply sent for request bytes that could not be decoded
    pub fn bad_request() -> Reply {
        Reply {
            status: Status::BadRequest,
            body: "BAD REQUEST".to_owned(),
        }
    }
}

/// whether the serving loop should keep accepting connections afterwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// keep serving
    Continue,
    /// a shutdown message was handled; terminate the listening service
    Shutdown,
}

/// Owns the [`Store`] and the [`ServerState`] and turns each decoded
/// [`Message`] into exactly one [`Reply`].
///
/// The dispatcher persists the store with [`Store::save`] after every
/// handled message, lifecycle messages included; the unavailable path
/// neither reads nor writes the store.
#[derive(Debug)]
pub struct Dispatcher {
    store: Store,
    state: ServerState,
}

impl Dispatcher {
    /// creates a dispatcher over `store`, initially [`ServerState::Running`]
    pub fn new(store: Store) -> Dispatcher {
        Dispatcher {
            store,
            state: ServerState::Running,
        }
    }

    /// the current lifecycle state
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Handles one message, mutating the store or the lifecycle state, and
    /// returns the reply plus whether the listening service should
    /// terminate.
    ///
    /// A persistence failure is surfaced as a [`Status::StoreError`] reply
    /// and fails only this request.
    pub fn dispatch(&mut self, message: Message) -> (Reply, Disposition) {
        debug!("dispatching {:?}", message.kind());

        if self.state == ServerState::Stopped && !matches!(message, Message::Startup) {
            return (
                Reply {
                    status: Status::Unavailable,
                    body: "SERVER IS NOT RUNNING".to_owned(),
                },
                Disposition::Continue,
            );
        }

        let (reply, disposition) = self.apply(message);

        if let Err(e) = self.store.save() {
            error!("store save failed: {}", e);
            return (
                Reply {
                    status: Status::StoreError,
                    body: format!("STORE ERROR: {}", e),
                },
                disposition,
            );
        }

        (reply, disposition)
    }

    fn apply(&mut self, message: Message) -> (Reply, Disposition) {
        let reply = match message {
            // the store materializes each key as a file, so the empty key
            // (reachable through the unprefixed superuser view) never
            // reaches it
            Message::Insert { key, .. } if key.is_empty() => Reply {
                status: Status::BadRequest,
                body: "EMPTY KEY".to_owned(),
            },
            Message::Insert { key, value } => match self.store.insert(key, value) {
                Some(previous) => json_reply(&previous),
                None => Reply::ok("OK"),
            },
            Message::Get { key } => match self.store.get(&key) {
                Some(value) => json_reply(value),
                None => not_found(),
            },
            Message::Delete { key } => match self.store.delete(&key) {
                Some(previous) => json_reply(&previous),
                None => not_found(),
            },
            Message::Select { pattern } => match self.store.select(&pattern) {
                Ok(rows) => {
                    let rows: Vec<Value> = rows
                        .into_iter()
                        .map(|(key, value)| Value::Object(vec![(key, value)]))
                        .collect();
                    json_reply(&rows)
                }
                Err(SkvError::Protocol(reason)) => Reply {
                    status: Status::BadRequest,
                    body: reason,
                },
                Err(e) => Reply {
                    status: Status::StoreError,
                    body: format!("STORE ERROR: {}", e),
                },
            },
            Message::Startup => {
                self.state = ServerState::Running;
                Reply::ok("SERVER STARTED")
            }
            Message::Stop => {
                self.state = ServerState::Stopped;
                Reply::ok("SERVER STOPPED")
            }
            Message::Shutdown => {
                return (Reply::ok("SERVER SHUTDOWN"), Disposition::Shutdown)
            }
        };
        (reply, Disposition::Continue)
    }
}

fn not_found() -> Reply {
    Reply {
        status: Status::NotFound,
        body: "NOT FOUND".to_owned(),
    }
}

fn json_reply(value: &impl Serialize) -> Reply {
    match serde_json::to_string(value) {
        Ok(body) => Reply::ok(body),
        Err(e) => Reply {
            status: Status::StoreError,
            body: format!("STORE ERROR: {}", e),
        },
    }
}
