//! Line-delimited JSON framing for the backend control protocol
//!
//! Requests: `{"command": [name, ...args], "request_id": N}`
//! Replies:  `{"request_id": N, "error": "success" | <message>, "data": <any>}`
//! Events:   `{"event": <name>, ...}`

use crate::error::Result;
use serde::Serialize;
use serde_json::Value;

/// Event name the backend emits when a file stops playing
pub const END_FILE_EVENT: &str = "end-file";

/// Outbound request line
#[derive(Debug, Serialize)]
struct Request<'a> {
    command: &'a [Value],
    request_id: u64,
}

/// Encode one request as a newline-terminated JSON line
pub fn encode_request(name: &str, args: &[Value], request_id: u64) -> Result<Vec<u8>> {
    let mut command = Vec::with_capacity(args.len() + 1);
    command.push(Value::String(name.to_string()));
    command.extend_from_slice(args);

    let mut line = serde_json::to_vec(&Request {
        command: &command,
        request_id,
    })?;
    line.push(b'\n');
    Ok(line)
}

/// Unsolicited notification from the backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendEvent {
    /// Value of the `event` field
    pub name: String,

    /// The whole event object, for fields beyond the name
    pub payload: Value,
}

impl BackendEvent {
    /// `reason` field, present on end-file events
    pub fn reason(&self) -> Option<&str> {
        self.payload.get("reason").and_then(Value::as_str)
    }

    /// True when the loaded media played to its natural end.
    ///
    /// end-file is also emitted when a file is replaced, stopped, fails to
    /// load, or the backend quits; only `eof` (or a missing reason from
    /// backends that do not report one) counts as finishing.
    pub fn is_end_of_media(&self) -> bool {
        self.name == END_FILE_EVENT && matches!(self.reason(), None | Some("eof"))
    }
}

/// A parsed inbound line
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Reply to the request carrying `request_id`
    Reply {
        request_id: u64,
        /// `Ok(data)` on success, `Err(message)` when the backend reported an error
        outcome: std::result::Result<Value, String>,
    },

    /// Unsolicited event
    Event(BackendEvent),
}

/// Classify one line. Returns `None` for blank, unparsable or unroutable lines.
pub fn decode_line(line: &[u8]) -> Option<Inbound> {
    let trimmed = trim_line(line);
    if trimmed.is_empty() {
        return None;
    }

    let value: Value = serde_json::from_slice(trimmed).ok()?;
    let object = value.as_object()?;

    if let Some(name) = object.get("event").and_then(Value::as_str) {
        return Some(Inbound::Event(BackendEvent {
            name: name.to_string(),
            payload: value.clone(),
        }));
    }

    let request_id = object.get("request_id").and_then(Value::as_u64)?;
    let outcome = match object.get("error").and_then(Value::as_str) {
        Some(message) if message != "success" => Err(message.to_string()),
        _ => Ok(object.get("data").cloned().unwrap_or(Value::Null)),
    };

    Some(Inbound::Reply { request_id, outcome })
}

fn trim_line(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(line.len());
    let end = line.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &line[start..end]
}
