//! Server-sent event parsing and snapshot reconstruction.
//!
//! A streaming read delivers `put` and `patch` events, each carrying a path
//! relative to the watched location and the JSON data written there. The
//! first `put` at `/` is the full initial snapshot; later events are deltas.
//! [`Snapshot`] applies them so every emission downstream is a full snapshot.

use serde::Deserialize;
use serde_json::{Map, Value};

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` parser.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; bytes are buffered
/// until a full line is available. Lines end in `\n`, `\r\n` or a bare `\r`.
#[derive(Debug, Default)]
pub struct EventStreamParser {
    buffer: Vec<u8>,
    /// The last line ended in `\r`; a leading `\n` in the next chunk belongs to it.
    skip_lf: bool,
    event: Option<String>,
    data: Vec<String>,
}

impl EventStreamParser {
    /// Feed a chunk of the response body, returning every event it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            if self.skip_lf {
                match self.buffer.first() {
                    Some(b'\n') => {
                        self.buffer.remove(0);
                        self.skip_lf = false;
                    }
                    Some(_) => self.skip_lf = false,
                    None => break,
                }
            }
            let Some(end) = self.buffer.iter().position(|&b| b == b'\n' || b == b'\r') else {
                break;
            };
            let mut raw_line: Vec<u8> = self.buffer.drain(..=end).collect();
            if raw_line.pop() == Some(b'\r') {
                self.skip_lf = true;
            }
            let line = String::from_utf8_lossy(&raw_line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_ref(), ""),
            };
            match field {
                "event" => self.event = Some(value.to_owned()),
                "data" => self.data.push(value.to_owned()),
                _ => {}
            }
        }
        events
    }

    fn dispatch(&mut self) -> Option<RawEvent> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        Some(RawEvent {
            event: event.unwrap_or_else(|| "message".to_owned()),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

/// A realtime store event, decoded.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// Replace the value at `path`.
    Put { path: String, data: Value },
    /// Merge the children of `data` into the value at `path`.
    Patch { path: String, data: Value },
    KeepAlive,
    /// The store ended the stream (`cancel` or `auth_revoked`).
    Closed(String),
    /// An event type this client does not handle.
    Ignored(String),
}

#[derive(Debug, Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

impl StoreEvent {
    /// Decode a raw event.
    ///
    /// # Errors
    ///
    /// Returns an error if a `put` or `patch` payload is not `{"path", "data"}` JSON.
    pub fn parse(raw: &RawEvent) -> Result<Self, serde_json::Error> {
        Ok(match raw.event.as_str() {
            "put" => {
                let PathData { path, data } = serde_json::from_str(&raw.data)?;
                Self::Put { path, data }
            }
            "patch" => {
                let PathData { path, data } = serde_json::from_str(&raw.data)?;
                Self::Patch { path, data }
            }
            "keep-alive" => Self::KeepAlive,
            "cancel" | "auth_revoked" => Self::Closed(format!("{}: {}", raw.event, raw.data)),
            other => Self::Ignored(other.to_owned()),
        })
    }
}

/// Local copy of the watched location, rebuilt from events.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot(Value);

impl Snapshot {
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.0
    }

    /// Apply a `put`: replace (or, with `null`, remove) the value at `path`.
    pub fn put(&mut self, path: &str, data: Value) {
        let segments = segments(path);
        set_at(&mut self.0, &segments, data);
    }

    /// Apply a `patch`: write each child of `data` under `path`.
    pub fn patch(&mut self, path: &str, data: Value) {
        let Value::Object(children) = data else {
            self.put(path, data);
            return;
        };
        let base = segments(path);
        for (key, value) in children {
            let mut child_path = base.clone();
            child_path.push(key.as_str());
            set_at(&mut self.0, &child_path, value);
        }
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Write `data` at `path` below `node`, dropping nodes left without children.
fn set_at(node: &mut Value, path: &[&str], data: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = data;
        return;
    };
    if !node.is_object() {
        if data.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }
    let Value::Object(map) = node else {
        return;
    };

    if rest.is_empty() {
        if data.is_null() {
            map.remove(*first);
        } else {
            map.insert((*first).to_owned(), data);
        }
    } else {
        let child = map.entry((*first).to_owned()).or_insert(Value::Null);
        set_at(child, rest, data);
        let empty = child.is_null() || child.as_object().is_some_and(Map::is_empty);
        if empty {
            map.remove(*first);
        }
    }

    let empty = map.is_empty();
    if empty {
        *node = Value::Null;
    }
}
