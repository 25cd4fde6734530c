//! Trace-based execution of client and server-lifecycle interactions
//! against a live server, plus the correctness checkers run over the
//! recorded outcomes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;

use tracing::debug;

use crate::client::{with_prefix, Client, ADMIN_PREFIX};
use crate::dispatcher::{Reply, Status};
use crate::error::{Result, SkvError};
use crate::message::Message;
use crate::server::KvServer;
use crate::value::Value;

/// a server-lifecycle transition issued through the admin client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerOp {
    /// send a startup message
    Startup,
    /// send a stop message
    Stop,
    /// send a shutdown message and join the server; terminal for a trace
    Shutdown,
}

/// one step of a trace
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interaction {
    /// a lifecycle transition
    Server(ServerOp),
    /// a message issued by one of the trace's clients
    Client {
        /// index into [`Trace::clients`]
        client: usize,
        /// the message to issue (keys unrewritten; the client prefixes them)
        message: Message,
    },
}

/// An ordered script of interactions driven against one server instance.
///
/// `clients` holds the distinct prefixes of the participating clients;
/// steps are applied strictly in order, modeling a linearizable replay of
/// logically concurrent clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// distinct client prefixes (never empty or `"admin"`)
    pub clients: Vec<String>,
    /// the interactions, normally terminated by a trailing shutdown
    pub steps: Vec<Interaction>,
}

/// the recorded result of one client interaction
#[derive(Debug, Clone)]
pub struct Outcome {
    /// prefix of the issuing client
    pub prefix: String,
    /// the message as issued (before prefix rewriting)
    pub message: Message,
    /// the server's reply
    pub reply: Reply,
    /// whether the server was running when the message was issued
    pub running: bool,
}

/// Replays `trace` against a fresh server persisting under `store_dir`,
/// applying interactions strictly in order, and returns one [`Outcome`]
/// per client interaction.
///
/// Lifecycle steps go through an admin client; a shutdown step sends the
/// shutdown message, joins the server, and ends the trace. A server that
/// is still listening when the steps run out is stopped before returning.
pub fn execute(trace: &Trace, store_dir: &Path) -> Result<Vec<Outcome>> {
    let server = KvServer::open(store_dir)?;
    let handle = server.bind(SocketAddr::from(([127, 0, 0, 1], 0)))?;
    let addr = handle.addr();
    let mut handle = Some(handle);

    let admin = Client::new(addr, ADMIN_PREFIX);
    let clients: Vec<Client> = trace
        .clients
        .iter()
        .map(|prefix| Client::new(addr, prefix))
        .collect();

    let mut running = true;
    let mut outcomes = Vec::new();

    for step in &trace.steps {
        match step {
            Interaction::Server(ServerOp::Startup) => {
                debug!("trace: startup");
                admin.request(&Message::Startup)?;
                running = true;
            }
            Interaction::Server(ServerOp::Stop) => {
                debug!("trace: stop");
                admin.request(&Message::Stop)?;
                running = false;
            }
            Interaction::Server(ServerOp::Shutdown) => {
                debug!("trace: shutdown");
                admin.request(&Message::Shutdown)?;
                if let Some(handle) = handle.take() {
                    handle.stop()?;
                }
                break;
            }
            Interaction::Client { client, message } => {
                let client = clients.get(*client).ok_or_else(|| {
                    SkvError::Server(format!("trace references unknown client {}", client))
                })?;
                let reply = client.request(message)?;
                outcomes.push(Outcome {
                    prefix: client.prefix().to_owned(),
                    message: message.clone(),
                    reply,
                    running,
                });
            }
        }
    }

    if let Some(handle) = handle.take() {
        handle.stop()?;
    }
    Ok(outcomes)
}

/// Checks the isolation property over recorded outcomes: every entry in
/// every select reply delivered to a non-admin client has a key starting
/// with that client's `"<prefix>_"`.
pub fn check_isolation(outcomes: &[Outcome]) -> std::result::Result<(), String> {
    for outcome in outcomes {
        let Message::Select { pattern } = &outcome.message else {
            continue;
        };
        if outcome.prefix.is_empty() || outcome.prefix == ADMIN_PREFIX {
            continue;
        }
        if outcome.reply.status != Status::Ok {
            continue;
        }
        let rows: Vec<serde_json::Value> = serde_json::from_str(&outcome.reply.body)
            .map_err(|e| format!("select reply is not a JSON array: {}", e))?;
        let fence = format!("{}_", outcome.prefix);
        for row in &rows {
            let Some(entry) = row.as_object() else {
                return Err(format!("select row is not an object: {}", row));
            };
            for key in entry.keys() {
                if !key.starts_with(&fence) {
                    return Err(format!(
                        "select({:?}) leaked key {:?} to client {:?}",
                        pattern, key, outcome.prefix
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Checks state-model equivalence over recorded outcomes: a local replica
/// of inserts and deletes must agree with every get reply issued while the
/// server was running. The replica resets at a stop boundary; no
/// equivalence is required across a stop/startup cycle. Messages issued
/// while stopped must have been rejected as unavailable.
pub fn check_state_model(outcomes: &[Outcome]) -> std::result::Result<(), String> {
    let mut replica: HashMap<String, Value> = HashMap::new();
    let mut was_running = true;

    for outcome in outcomes {
        if was_running && !outcome.running {
            // crossed a stop boundary: drop all equivalence claims
            replica.clear();
        }
        was_running = outcome.running;

        if !outcome.running {
            if outcome.reply.status != Status::Unavailable {
                return Err(format!(
                    "{:?} while stopped got {:?} instead of unavailable",
                    outcome.message, outcome.reply.status
                ));
            }
            continue;
        }

        let key_of = |key: &str| with_prefix(&outcome.prefix, key);
        match &outcome.message {
            Message::Insert { key, value } => {
                replica.insert(key_of(key), value.clone());
            }
            Message::Delete { key } => {
                replica.remove(&key_of(key));
            }
            Message::Get { key } => {
                if let Some(expected) = replica.get(&key_of(key)) {
                    let expected_body = serde_json::to_string(expected)
                        .map_err(|e| format!("replica value not serializable: {}", e))?;
                    if outcome.reply.status != Status::Ok || outcome.reply.body != expected_body {
                        return Err(format!(
                            "get({:?}) returned {:?} {:?}, expected {:?}",
                            key, outcome.reply.status, outcome.reply.body, expected_body
                        ));
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}
