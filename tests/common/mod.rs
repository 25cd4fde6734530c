//! proptest strategies shared by the property suites: random values,
//! messages, client prefixes and whole traces.

#![allow(dead_code)]

use proptest::prelude::*;
use skv::{Interaction, Message, ServerOp, Trace, Value};

/// arbitrary text for wire-level fuzzing: plain ASCII, text with embedded
/// CR/LF bytes, and unrestricted printable Unicode, empty strings included
pub fn texts() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_]{0,16}",
        "[a-z \\r\\n]{0,12}",
        "\\PC{0,8}",
    ]
}

/// recursive values: scalars at the leaves, insertion-ordered objects of
/// unique keys above them
pub fn values() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        texts().prop_map(Value::Text),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop::collection::hash_map("[a-zA-Z0-9]{1,6}", inner, 0..4)
            .prop_map(|entries| Value::Object(entries.into_iter().collect()))
    })
}

/// every message variant, with unrestricted keys/patterns/values; used for
/// codec round-trip fuzzing (these are never executed against a server)
pub fn wire_messages() -> impl Strategy<Value = Message> {
    prop_oneof![
        (texts(), values()).prop_map(|(key, value)| Message::Insert { key, value }),
        texts().prop_map(|key| Message::Get { key }),
        texts().prop_map(|key| Message::Delete { key }),
        texts().prop_map(|pattern| Message::Select { pattern }),
        Just(Message::Startup),
        Just(Message::Stop),
        Just(Message::Shutdown),
    ]
}

/// a small key space so trace interactions collide often
fn trace_keys() -> impl Strategy<Value = String> {
    "[a-c][0-9]{0,1}"
}

/// valid select patterns over the trace key space
fn trace_patterns() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(".*".to_owned()),
        "[a-c]".prop_map(|s| format!("{}.*", s)),
        "[a-c][0-9]{0,1}",
    ]
}

/// 2 to 5 distinct non-reserved client prefixes
pub fn prefixes() -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-zA-Z0-9]{1,8}", 2..6)
        .prop_filter("the admin prefix is reserved", |set| !set.contains("admin"))
        .prop_map(|set| set.into_iter().collect())
}

/// one interaction, weighted so lifecycle transitions are much rarer than
/// client messages
fn interactions(clients: usize) -> impl Strategy<Value = Interaction> {
    prop_oneof![
        1 => Just(Interaction::Server(ServerOp::Startup)),
        1 => Just(Interaction::Server(ServerOp::Stop)),
        6 => (0..clients, trace_keys(), values()).prop_map(|(client, key, value)| {
            Interaction::Client { client, message: Message::Insert { key, value } }
        }),
        10 => (0..clients, trace_keys()).prop_map(|(client, key)| {
            Interaction::Client { client, message: Message::Get { key } }
        }),
        4 => (0..clients, trace_keys()).prop_map(|(client, key)| {
            Interaction::Client { client, message: Message::Delete { key } }
        }),
        10 => (0..clients, trace_patterns()).prop_map(|(client, pattern)| {
            Interaction::Client { client, message: Message::Select { pattern } }
        }),
    ]
}

/// bounded-length traces over a pool of distinct-prefix clients, always
/// terminated by a trailing shutdown
pub fn traces() -> impl Strategy<Value = Trace> {
    prefixes().prop_flat_map(|clients| {
        let n = clients.len();
        prop::collection::vec(interactions(n), 1..40).prop_map(move |mut steps| {
            steps.push(Interaction::Server(ServerOp::Shutdown));
            Trace {
                clients: clients.clone(),
                steps,
            }
        })
    })
}
