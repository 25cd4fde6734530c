use crate::error::{Result, SkvError};
use crate::value::Value;
use crate::wire::{decode_value, encode_value};

/// The closed set of request and lifecycle messages a client can send.
///
/// On the wire a message is the concatenation of its ordered parts: a
/// leading text frame naming the kind, followed by the kind-specific
/// fields. Structural equality defines message equality.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// store `value` under `key`, overwriting unconditionally
    Insert {
        /// the key to write
        key: String,
        /// the value to store
        value: Value,
    },
    /// look up the value stored under `key`
    Get {
        /// the key to look up
        key: String,
    },
    /// remove `key` and its value from the store
    Delete {
        /// the key to remove
        key: String,
    },
    /// list all entries whose key starts with a match for `pattern`
    Select {
        /// a regular expression matched against keys, anchored at the start
        pattern: String,
    },
    /// transition the server to the running state
    Startup,
    /// transition the server to the stopped state
    Stop,
    /// terminate the server's listening service
    Shutdown,
}

impl Message {
    /// the kind tag that leads this message's wire encoding
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Insert { .. } => "insert",
            Message::Get { .. } => "get",
            Message::Delete { .. } => "delete",
            Message::Select { .. } => "select",
            Message::Startup => "startup",
            Message::Stop => "stop",
            Message::Shutdown => "shutdown",
        }
    }

    /// the ordered frame parts of this message: the kind tag, then the
    /// kind-specific fields (an insert's value keeps its native frame type)
    pub fn parts(&self) -> Vec<Value> {
        let kind = Value::Text(self.kind().to_owned());
        match self {
            Message::Insert { key, value } => {
                vec![kind, Value::Text(key.clone()), value.clone()]
            }
            Message::Get { key } | Message::Delete { key } => {
                vec![kind, Value::Text(key.clone())]
            }
            Message::Select { pattern } => vec![kind, Value::Text(pattern.clone())],
            Message::Startup | Message::Stop | Message::Shutdown => vec![kind],
        }
    }

    /// Reconstructs a message from decoded frame parts, validating the
    /// leading kind tag and the part count.
    ///
    /// # Errors
    /// Fails with [`SkvError::Protocol`] on an unrecognized kind, a
    /// non-text tag or key, or a wrong number of parts.
    pub fn from_parts(parts: Vec<Value>) -> Result<Message> {
        let mut parts = parts.into_iter();
        let kind = expect_text(parts.next(), "message kind")?;

        let message = match kind.as_str() {
            "insert" => Message::Insert {
                key: expect_text(parts.next(), "insert key")?,
                value: parts
                    .next()
                    .ok_or_else(|| SkvError::Protocol("insert is missing its value".to_owned()))?,
            },
            "get" => Message::Get {
                key: expect_text(parts.next(), "get key")?,
            },
            "delete" => Message::Delete {
                key: expect_text(parts.next(), "delete key")?,
            },
            "select" => Message::Select {
                pattern: expect_text(parts.next(), "select pattern")?,
            },
            "startup" => Message::Startup,
            "stop" => Message::Stop,
            "shutdown" => Message::Shutdown,
            other => {
                return Err(SkvError::Protocol(format!(
                    "unrecognized message kind: {:?}",
                    other
                )))
            }
        };

        if parts.next().is_some() {
            return Err(SkvError::Protocol(format!(
                "trailing parts after {} message",
                message.kind()
            )));
        }
        Ok(message)
    }

    /// encodes this message to its wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in self.parts() {
            encode_value(&part, &mut out);
        }
        out
    }

    /// Decodes one message from `bytes`, reading frames greedily until the
    /// buffer is exhausted and then dispatching on the kind tag.
    ///
    /// # Errors
    /// Fails with [`SkvError::Protocol`] on malformed frames or an invalid
    /// part list (see [`Message::from_parts`]).
    pub fn decode(bytes: &[u8]) -> Result<Message> {
        if bytes.is_empty() {
            return Err(SkvError::Protocol("empty message".to_owned()));
        }
        let mut parts = Vec::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (part, remaining) = decode_value(rest)?;
            parts.push(part);
            rest = remaining;
        }
        Message::from_parts(parts)
    }
}

fn expect_text(part: Option<Value>, what: &str) -> Result<String> {
    match part {
        Some(Value::Text(text)) => Ok(text),
        Some(other) => Err(SkvError::Protocol(format!(
            "{} must be text, got {}",
            what,
            other.kind()
        ))),
        None => Err(SkvError::Protocol(format!("message is missing its {}", what))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_with_nested_object_round_trips() {
        let message = Message::Insert {
            key: "foo".to_owned(),
            value: Value::Object(vec![("bar".to_owned(), Value::Integer(42))]),
        };
        let encoded = message.encode();
        assert_eq!(
            encoded,
            b"$6\r\ninsert\r\n$3\r\nfoo\r\n*1\r\n$3\r\nbar\r\n:42\r\n"
        );
        assert_eq!(Message::decode(&encoded).unwrap(), message);
    }

    #[test]
    fn empty_key_and_value_round_trip() {
        let message = Message::Insert {
            key: String::new(),
            value: Value::Text(String::new()),
        };
        assert_eq!(Message::decode(&message.encode()).unwrap(), message);
    }

    #[test]
    fn lifecycle_messages_round_trip() {
        for message in [Message::Startup, Message::Stop, Message::Shutdown] {
            assert_eq!(Message::decode(&message.encode()).unwrap(), message);
        }
    }

    #[test]
    fn unrecognized_kind_is_a_protocol_error() {
        assert!(Message::decode(b"$4\r\nping\r\n").is_err());
    }

    #[test]
    fn missing_and_trailing_parts_are_protocol_errors() {
        // get without a key
        assert!(Message::decode(b"$3\r\nget\r\n").is_err());
        // stop with a stray extra part
        assert!(Message::decode(b"$4\r\nstop\r\n$1\r\nx\r\n").is_err());
        // insert key of the wrong frame type
        assert!(Message::decode(b"$6\r\ninsert\r\n:1\r\n:2\r\n").is_err());
    }

    #[test]
    fn empty_input_is_a_protocol_error() {
        assert!(Message::decode(b"").is_err());
    }
}
