//! Decoder for gate response bodies.
//!
//! The gate answers with script-style assignments rather than a standard
//! serialization:
//!
//! ```text
//! NetFunnel.gRtype=5101;NetFunnel.gControl.result='5002:200:key=ABC&nwait=3&...';
//! ```
//!
//! Decoding happens in two stages: the body is flattened into an assignment
//! map, then the result token's embedded query string is parsed field by
//! field so every failure can name what went wrong.

use std::collections::HashMap;

use thiserror::Error;

use crate::ticket::Ticket;

/// Assignment holding the ticket token.
pub const RESULT_KEY: &str = "NetFunnel.gControl.result";

/// Errors that can occur while decoding a response body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing result key '{}' in response body", RESULT_KEY)]
    MissingResult,

    #[error("malformed result token (expected <int>:<int>:<query>): {0}")]
    MalformedResult(String),

    #[error("invalid query string in result token: {0}")]
    InvalidQuery(String),

    #[error("response body is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("missing field '{0}' in result token")]
    MissingField(&'static str),

    #[error("field '{field}' is not an integer: {value:?}")]
    InvalidInteger { field: &'static str, value: String },
}

/// Split a body into `name = value` assignments.
///
/// Segments without `=` carry no data and are skipped. When a name repeats,
/// the last value wins.
pub fn parse_assignments(body: &str) -> HashMap<String, String> {
    body.split(';')
        .filter_map(|segment| segment.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Decode raw response bytes into a [`Ticket`].
///
/// Invalid UTF-8 is an error; bytes are never replaced.
pub fn decode_body(body: &[u8]) -> Result<Ticket, DecodeError> {
    let text =
        std::str::from_utf8(body).map_err(|e| DecodeError::InvalidEncoding(e.to_string()))?;
    decode_ticket(text)
}

/// Decode a ticket-request response body into a [`Ticket`].
pub fn decode_ticket(body: &str) -> Result<Ticket, DecodeError> {
    let assignments = parse_assignments(body);

    let result = assignments
        .get(RESULT_KEY)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
        .ok_or(DecodeError::MissingResult)?;

    let id = strip_quotes(result);

    let mut parts = id.splitn(3, ':');
    let query = match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(_), Some(query)) => query,
        _ => return Err(DecodeError::MalformedResult(id.to_string())),
    };

    let fields = parse_query(query)?;
    let text = |name: &str| fields.get(name).cloned().unwrap_or_default();

    let key = text("key");
    if key.is_empty() {
        return Err(DecodeError::MissingField("key"));
    }

    Ok(Ticket::new(
        id.to_string(),
        text("ip"),
        key,
        parse_int(&fields, "nnext")?,
        parse_int(&fields, "nwait")?,
        parse_int(&fields, "port")?,
        parse_int(&fields, "tps")?,
        parse_int(&fields, "ttl")?,
    ))
}

/// Remove one pair of enclosing quotes, if present.
fn strip_quotes(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

/// Parse `k=v&k=v` with `+` as space and percent-decoding.
///
/// The first value for a name is kept.
fn parse_query(query: &str) -> Result<HashMap<String, String>, DecodeError> {
    let mut fields = HashMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        let name = decode_component(name)?;
        let value = decode_component(value)?;
        fields.entry(name).or_insert(value);
    }
    Ok(fields)
}

fn decode_component(raw: &str) -> Result<String, DecodeError> {
    let bytes = raw.as_bytes();
    for (i, byte) in bytes.iter().enumerate() {
        if *byte == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            let valid = escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return Err(DecodeError::InvalidQuery(format!(
                    "invalid percent escape in {:?}",
                    raw
                )));
            }
        }
    }

    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .map_err(|e| DecodeError::InvalidQuery(format!("{:?}: {}", raw, e)))
}

fn parse_int(fields: &HashMap<String, String>, field: &'static str) -> Result<i64, DecodeError> {
    let value = fields.get(field).map(String::as_str).unwrap_or_default();
    value.parse().map_err(|_| DecodeError::InvalidInteger {
        field,
        value: value.to_string(),
    })
}
