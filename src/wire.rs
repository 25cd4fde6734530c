//! The self-framing binary encoding of [`Value`] frames.
//!
//! Every frame starts with a one-byte type tag and is terminated (or
//! length-prefixed) so that a decoder never needs lookahead beyond the
//! current frame:
//!
//! - null: `$-1\r\n`
//! - text of byte-length L: `$L\r\n<L bytes>\r\n`
//! - integer: `:<decimal>\r\n`
//! - boolean: `|true\r\n` or `|false\r\n`
//! - object of N entries: `*N\r\n` followed by N key/value frame pairs,
//!   each key a text frame, each value any frame (recursive)
//!
//! Text is length-prefixed rather than delimiter-framed, so embedded
//! `\r\n` bytes in the payload are harmless.

use crate::error::{Result, SkvError};
use crate::value::Value;

/// Appends the frame encoding of `value` to `out`.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"$-1\r\n"),
        Value::Boolean(b) => {
            out.extend_from_slice(if *b { b"|true\r\n" } else { b"|false\r\n" })
        }
        Value::Integer(i) => {
            out.extend_from_slice(format!(":{}\r\n", i).as_bytes());
        }
        Value::Text(t) => encode_text(t, out),
        Value::Object(entries) => {
            out.extend_from_slice(format!("*{}\r\n", entries.len()).as_bytes());
            for (key, value) in entries {
                encode_text(key, out);
                encode_value(value, out);
            }
        }
    }
}

fn encode_text(text: &str, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("${}\r\n", text.len()).as_bytes());
    out.extend_from_slice(text.as_bytes());
    out.extend_from_slice(b"\r\n");
}

/// Decodes one frame from the front of `input`, returning the decoded
/// [`Value`] and the unconsumed remainder.
///
/// # Errors
/// Fails with [`SkvError::Protocol`] on an empty buffer, an unknown frame
/// tag, a truncated frame, a missing terminator, or a non-text object key.
pub fn decode_value(input: &[u8]) -> Result<(Value, &[u8])> {
    let (&tag, payload) = input
        .split_first()
        .ok_or_else(|| SkvError::Protocol("unexpected end of input".to_owned()))?;

    match tag {
        b'$' => {
            let (header, rest) = split_crlf(payload)?;
            let length: i64 = parse_decimal(header)?;
            if length == -1 {
                return Ok((Value::Null, rest));
            }
            let length = usize::try_from(length)
                .map_err(|_| SkvError::Protocol(format!("invalid text length {}", length)))?;
            if rest.len() < length + 2 {
                return Err(SkvError::Protocol("truncated text frame".to_owned()));
            }
            if &rest[length..length + 2] != b"\r\n" {
                return Err(SkvError::Protocol("text frame missing terminator".to_owned()));
            }
            let text = std::str::from_utf8(&rest[..length])
                .map_err(|e| SkvError::Protocol(format!("text frame is not UTF-8: {}", e)))?;
            Ok((Value::Text(text.to_owned()), &rest[length + 2..]))
        }
        b':' => {
            let (header, rest) = split_crlf(payload)?;
            Ok((Value::Integer(parse_decimal(header)?), rest))
        }
        b'|' => {
            let (header, rest) = split_crlf(payload)?;
            match header {
                b"true" => Ok((Value::Boolean(true), rest)),
                b"false" => Ok((Value::Boolean(false), rest)),
                other => Err(SkvError::Protocol(format!(
                    "invalid boolean frame: {:?}",
                    String::from_utf8_lossy(other)
                ))),
            }
        }
        b'*' => {
            let (header, rest) = split_crlf(payload)?;
            let count: i64 = parse_decimal(header)?;
            let count = usize::try_from(count)
                .map_err(|_| SkvError::Protocol(format!("invalid object size {}", count)))?;
            // the declared count is untrusted; an entry takes at least 9
            // bytes, so never reserve more than the buffer could hold
            let mut entries: Vec<(String, Value)> = Vec::with_capacity(count.min(rest.len() / 9));
            let mut rest = rest;
            for _ in 0..count {
                let (key, after_key) = decode_value(rest)?;
                let key = match key {
                    Value::Text(key) => key,
                    other => {
                        return Err(SkvError::Protocol(format!(
                            "object key must be text, got {}",
                            other.kind()
                        )))
                    }
                };
                let (value, after_value) = decode_value(after_key)?;
                match entries.iter_mut().find(|(k, _)| *k == key) {
                    Some(entry) => entry.1 = value,
                    None => entries.push((key, value)),
                }
                rest = after_value;
            }
            Ok((Value::Object(entries), rest))
        }
        other => Err(SkvError::Protocol(format!("unknown frame tag {:#04x}", other))),
    }
}

/// splits `input` at the first CRLF, returning the bytes before it and the
/// bytes after it
fn split_crlf(input: &[u8]) -> Result<(&[u8], &[u8])> {
    input
        .windows(2)
        .position(|w| w == b"\r\n")
        .map(|at| (&input[..at], &input[at + 2..]))
        .ok_or_else(|| SkvError::Protocol("frame missing CRLF terminator".to_owned()))
}

fn parse_decimal(digits: &[u8]) -> Result<i64> {
    std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            SkvError::Protocol(format!(
                "invalid decimal field: {:?}",
                String::from_utf8_lossy(digits)
            ))
        })
}
