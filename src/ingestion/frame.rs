//! Text frame codec for the streaming transport.
//!
//! Understands Engine.IO v4 / Socket.IO text packets as emitted by the
//! dashboard gateway, plus two plain JSON shapes for simpler publishers:
//! `{"event": "...", "data": ...}` and `["event", data]`.

use serde_json::Value;

// ---

/// Reply to the Engine.IO open packet: join the default namespace.
pub(crate) const NAMESPACE_CONNECT: &str = "40";

/// Reply to an Engine.IO ping.
pub(crate) const PONG: &str = "3";

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Frame {
    /// Engine.IO handshake; the client must join a namespace next.
    Open,
    Ping,
    /// Namespace join acknowledged.
    Joined,
    Event { name: String, data: Value },
    /// Server closed the session or rejected the namespace.
    Disconnect(Option<String>),
    /// Valid but uninteresting (pong, noop, acks).
    Ignored,
    Invalid(String),
}

pub(crate) fn decode(text: &str) -> Frame {
    // ---
    let text = text.trim();
    match text.chars().next() {
        None => Frame::Invalid("empty frame".to_string()),
        Some('{') | Some('[') => decode_json(text),
        Some(_) => decode_engine_io(text),
    }
}

fn decode_json(text: &str) -> Frame {
    // ---
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => return Frame::Invalid(format!("bad json: {e}")),
    };

    match value {
        Value::Object(mut map) => match map.remove("event") {
            Some(Value::String(name)) => Frame::Event {
                name,
                data: map.remove("data").unwrap_or(Value::Null),
            },
            _ => Frame::Invalid("envelope without event name".to_string()),
        },
        Value::Array(items) => event_from_array(items),
        _ => Frame::Invalid("unexpected json shape".to_string()),
    }
}

fn decode_engine_io(text: &str) -> Frame {
    // ---
    let mut chars = text.chars();
    let kind = chars.next();
    match kind {
        Some('0') => Frame::Open,
        Some('1') => Frame::Disconnect(None),
        Some('2') => Frame::Ping,
        Some('3') | Some('6') => Frame::Ignored,
        Some('4') => decode_socket_io(chars.as_str()),
        Some(other) => Frame::Invalid(format!("unknown engine.io packet type '{other}'")),
        None => Frame::Invalid("empty frame".to_string()),
    }
}

fn decode_socket_io(packet: &str) -> Frame {
    // ---
    let mut chars = packet.chars();
    let Some(kind) = chars.next() else {
        return Frame::Invalid("empty socket.io packet".to_string());
    };
    let body = skip_namespace(chars.as_str());

    match kind {
        '0' => Frame::Joined,
        '1' => Frame::Disconnect(None),
        '2' => {
            // optional ack id precedes the payload
            let payload = body.trim_start_matches(|c: char| c.is_ascii_digit());
            match serde_json::from_str::<Value>(payload) {
                Ok(Value::Array(items)) => event_from_array(items),
                Ok(_) => Frame::Invalid("event payload is not an array".to_string()),
                Err(e) => Frame::Invalid(format!("bad event payload: {e}")),
            }
        }
        '3' | '5' | '6' => Frame::Ignored,
        '4' => {
            let reason = serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| body.to_string());
            Frame::Disconnect(Some(reason))
        }
        other => Frame::Invalid(format!("unknown socket.io packet type '{other}'")),
    }
}

/// Strip a `/namespace,` prefix if present.
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn event_from_array(items: Vec<Value>) -> Frame {
    let mut items = items.into_iter();
    match items.next() {
        Some(Value::String(name)) => Frame::Event {
            name,
            data: items.next().unwrap_or(Value::Null),
        },
        _ => Frame::Invalid("event array without a name".to_string()),
    }
}
