use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use crate::dispatcher::{Reply, Status};
use crate::error::{Result, SkvError};
use crate::message::Message;

/// the prefix of the unprefixed superuser view; the empty prefix is
/// treated the same way
pub const ADMIN_PREFIX: &str = "admin";

/// Applies the tenant `prefix` to a key-bearing message field.
///
/// This one function is the whole isolation mechanism: every key-bearing
/// field (keys and select patterns alike) goes through it before a message
/// is encoded. The empty prefix and [`ADMIN_PREFIX`] pass the field through
/// untouched.
pub fn with_prefix(prefix: &str, field: &str) -> String {
    if prefix.is_empty() || prefix == ADMIN_PREFIX {
        field.to_owned()
    } else {
        format!("{}_{}", prefix, field)
    }
}

/// A client of one server under a logical identity.
///
/// The identity is a `prefix` string prepended to every key-bearing field
/// before transmission, so distinct-prefix clients sharing one server
/// never see each other's keys. The prefix is purely a client-side
/// convenience; the protocol knows nothing about it.
pub struct Client {
    addr: SocketAddr,
    prefix: String,
}

impl Client {
    /// creates a client of the server at `addr` under `prefix`
    pub fn new(addr: SocketAddr, prefix: &str) -> Client {
        Client {
            addr,
            prefix: prefix.to_owned(),
        }
    }

    /// this client's prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Sends `message` to the server and returns its reply.
    ///
    /// Key-bearing fields are rewritten with this client's prefix first;
    /// the exchange is one connection per request (write, half-close, read
    /// the reply to EOF).
    pub fn request(&self, message: &Message) -> Result<Reply> {
        let message = self.rewrite(message);
        let stream = TcpStream::connect(self.addr)?;

        let mut writer = BufWriter::new(&stream);
        writer.write_all(&message.encode())?;
        writer.flush()?;
        drop(writer);
        stream.shutdown(Shutdown::Write)?;

        let mut raw = Vec::new();
        BufReader::new(&stream).read_to_end(&mut raw)?;
        parse_reply(&raw)
    }

    /// rewrites every key-bearing field with this client's prefix;
    /// select patterns are rewritten like any other key field
    fn rewrite(&self, message: &Message) -> Message {
        match message {
            Message::Insert { key, value } => Message::Insert {
                key: with_prefix(&self.prefix, key),
                value: value.clone(),
            },
            Message::Get { key } => Message::Get {
                key: with_prefix(&self.prefix, key),
            },
            Message::Delete { key } => Message::Delete {
                key: with_prefix(&self.prefix, key),
            },
            Message::Select { pattern } => Message::Select {
                pattern: with_prefix(&self.prefix, pattern),
            },
            lifecycle => lifecycle.clone(),
        }
    }
}

fn parse_reply(raw: &[u8]) -> Result<Reply> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| SkvError::Protocol("reply is not valid UTF-8".to_owned()))?;
    let (line, body) = text
        .split_once("\r\n")
        .ok_or_else(|| SkvError::Protocol("reply is missing its status line".to_owned()))?;
    let code = line
        .strip_prefix("SKV/1 ")
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| SkvError::Protocol(format!("malformed status line: {:?}", line)))?;
    let status = Status::from_code(code)
        .ok_or_else(|| SkvError::Protocol(format!("unknown status code {}", code)))?;
    Ok(Reply {
        status,
        body: body.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn client(prefix: &str) -> Client {
        Client::new(SocketAddr::from(([127, 0, 0, 1], 0)), prefix)
    }

    #[test]
    fn every_key_bearing_field_is_rewritten() {
        let c = client("c1");
        assert_eq!(
            c.rewrite(&Message::Insert {
                key: "k".into(),
                value: Value::Null
            }),
            Message::Insert {
                key: "c1_k".into(),
                value: Value::Null
            }
        );
        assert_eq!(
            c.rewrite(&Message::Get { key: "k".into() }),
            Message::Get { key: "c1_k".into() }
        );
        assert_eq!(
            c.rewrite(&Message::Delete { key: "k".into() }),
            Message::Delete { key: "c1_k".into() }
        );
        // select patterns are key-bearing too
        assert_eq!(
            c.rewrite(&Message::Select { pattern: "a.*".into() }),
            Message::Select { pattern: "c1_a.*".into() }
        );
    }

    #[test]
    fn lifecycle_messages_pass_through() {
        let c = client("c1");
        assert_eq!(c.rewrite(&Message::Startup), Message::Startup);
        assert_eq!(c.rewrite(&Message::Stop), Message::Stop);
        assert_eq!(c.rewrite(&Message::Shutdown), Message::Shutdown);
    }

    #[test]
    fn admin_and_empty_prefixes_are_the_superuser_view() {
        for prefix in ["", ADMIN_PREFIX] {
            let c = client(prefix);
            assert_eq!(
                c.rewrite(&Message::Get { key: "k".into() }),
                Message::Get { key: "k".into() }
            );
        }
    }

    #[test]
    fn reply_parsing() {
        let reply = parse_reply(b"SKV/1 200\r\nOK").unwrap();
        assert_eq!(reply.status, Status::Ok);
        assert_eq!(reply.body, "OK");

        let reply = parse_reply(b"SKV/1 404\r\nNOT FOUND").unwrap();
        assert_eq!(reply.status, Status::NotFound);

        assert!(parse_reply(b"").is_err());
        assert!(parse_reply(b"HTTP/1.1 200\r\n").is_err());
        assert!(parse_reply(b"SKV/1 999\r\n").is_err());
    }
}
