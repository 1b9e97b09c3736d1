//! STOMP frame codec.
//!
//! Wire form of a frame:
//!
//! ```text
//! COMMAND\n
//! key:value\n      (zero or more)
//! \n
//! body             (optional)
//! \0
//! ```
//!
//! Several frames may share one transport message. A message made only of whitespace is a
//! heartbeat and decodes to no frames. Decoding never fails: a header line without a usable
//! `:` separator is skipped, a segment with an unknown command is dropped.

use std::fmt;

/// A bare newline, sent as a keepalive and never framed.
pub const HEARTBEAT: &str = "\n";

/// Frame terminator.
pub const NUL: char = '\0';

/// STOMP commands understood by the client.
#[expect(
    clippy::exhaustive_enums,
    reason = "The client speaks exactly this command set"
)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Command {
    Connect,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    /// Parse a command line as it appears on the wire. Case-sensitive.
    #[must_use]
    pub fn from_wire(line: &str) -> Option<Self> {
        let command = match line {
            "CONNECT" => Self::Connect,
            "CONNECTED" => Self::Connected,
            "SUBSCRIBE" => Self::Subscribe,
            "UNSUBSCRIBE" => Self::Unsubscribe,
            "SEND" => Self::Send,
            "MESSAGE" => Self::Message,
            "RECEIPT" => Self::Receipt,
            "ERROR" => Self::Error,
            "DISCONNECT" => Self::Disconnect,
            _ => return None,
        };
        Some(command)
    }
}

/// Ordered, case-sensitive header mapping.
///
/// Iteration follows insertion order so encoded frames are deterministic. [`Headers::insert`]
/// on an existing key replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set `key` to `value`, returning the previous value if there was one.
    pub fn insert<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> Option<String> {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    /// Set `key` only when it is not present yet. Returns whether the value was stored.
    pub fn insert_if_absent<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) -> bool {
        let key = key.into();
        if self.contains_key(&key) {
            return false;
        }
        self.0.push((key, value.into()));
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        let index = self.0.iter().position(|(k, _)| k == key)?;
        Some(self.0.remove(index).1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.insert(k, v);
        }
        headers
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Headers {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl IntoIterator for Headers {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One STOMP protocol unit.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Headers,
    /// Absent and empty bodies are the same thing on the wire; decoding yields `None` for both.
    pub body: Option<String>,
}

impl Frame {
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Headers::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    #[must_use]
    pub fn with_body<B: Into<String>>(mut self, body: B) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Wire representation of this frame.
    #[must_use]
    pub fn encode(&self) -> String {
        encode(self.command, &self.headers, self.body.as_deref())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Encode a frame. The body must not contain NUL, it would end the frame early.
#[must_use]
pub fn encode(command: Command, headers: &Headers, body: Option<&str>) -> String {
    let command = command.to_string();
    let capacity = command.len()
        + headers.iter().map(|(k, v)| k.len() + v.len() + 2).sum::<usize>()
        + body.map_or(0, str::len)
        + 3;

    let mut out = String::with_capacity(capacity);
    out.push_str(&command);
    out.push('\n');
    for (key, value) in headers.iter() {
        out.push_str(key);
        out.push(':');
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');
    if let Some(body) = body {
        out.push_str(body);
    }
    out.push(NUL);
    out
}

/// Split a raw transport message into frames.
#[must_use]
pub fn decode(raw: &str) -> Vec<Frame> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    raw.split(NUL)
        .filter(|segment| !segment.trim().is_empty())
        .filter_map(decode_segment)
        .collect()
}

fn decode_segment(segment: &str) -> Option<Frame> {
    // EOLs between frames are legal, skip them before the command line
    let segment = segment.trim_start_matches(['\r', '\n']);
    let mut lines = segment.split('\n');

    let command_line = lines.next()?.trim();
    let Some(command) = Command::from_wire(command_line) else {
        #[cfg(feature = "tracing")]
        tracing::trace!(command = command_line, "Dropping frame with unknown command");
        return None;
    };

    let mut headers = Headers::new();
    for line in lines.by_ref() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            break;
        }

        match line.split_once(':') {
            Some((key, value)) if !key.trim().is_empty() => {
                headers.insert(key.trim(), value.trim());
            }
            _ => {
                #[cfg(feature = "tracing")]
                tracing::trace!(line, "Skipping malformed header line");
            }
        }
    }

    let body = lines.collect::<Vec<_>>().join("\n");
    let body = (!body.is_empty()).then_some(body);

    Some(Frame {
        command,
        headers,
        body,
    })
}
