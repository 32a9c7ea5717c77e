//! Just enough HTTP/1.1 for the panel: one request per connection.

use std::io::{self, Read, Write};

use serde_json::Value;

use crate::error::{PanelError, Result};

pub const MAX_HEAD_BYTES: usize = 16 * 1024;
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// First header named `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_length(&self) -> Result<usize> {
        match self.header("Content-Length") {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| PanelError::bad_request(format!("invalid Content-Length {raw:?}"))),
        }
    }

    /// `Connection: Upgrade` plus `Upgrade: websocket`.
    #[must_use]
    pub fn is_websocket_upgrade(&self) -> bool {
        let upgrade = self
            .header("Upgrade")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("websocket"));
        let connection = self.header("Connection").is_some_and(|value| {
            value
                .split(',')
                .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
        });
        upgrade && connection
    }
}

/// A request head together with every byte read to obtain it.
///
/// `raw` may extend past the head into the body or, for an upgrade, into
/// the first websocket frames.
#[derive(Debug)]
pub struct ReadHead {
    pub head: RequestHead,
    pub raw: Vec<u8>,
    pub head_len: usize,
}

impl ReadHead {
    /// Read the rest of a `Content-Length` body.
    pub fn read_body<R: Read>(&self, stream: &mut R, max_body: usize) -> Result<Vec<u8>> {
        let length = self.head.content_length()?;
        if length > max_body {
            return Err(PanelError::bad_request(format!(
                "body of {length} bytes exceeds limit of {max_body}"
            )));
        }
        let mut body: Vec<u8> = self.raw[self.head_len..].to_vec();
        body.truncate(length);
        if body.len() < length {
            let start = body.len();
            body.resize(length, 0);
            stream.read_exact(&mut body[start..])?;
        }
        Ok(body)
    }
}

/// Offset just past the blank line ending the head.
#[must_use]
pub fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|index| index + HEAD_TERMINATOR.len())
}

/// Read until the head is complete.
pub fn read_head<R: Read>(stream: &mut R) -> Result<ReadHead> {
    let mut raw = Vec::with_capacity(1024);
    let mut chunk = [0_u8; 2048];
    loop {
        let n = match stream.read(&mut chunk) {
            Ok(0) => {
                return Err(PanelError::bad_request(
                    "connection closed before request head",
                ));
            }
            Ok(n) => n,
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => return Err(error.into()),
        };
        let scan_from = raw.len().saturating_sub(HEAD_TERMINATOR.len() - 1);
        raw.extend_from_slice(&chunk[..n]);
        if let Some(offset) = find_head_end(&raw[scan_from..]) {
            let head_len = scan_from + offset;
            let head = parse_head(&raw[..head_len])?;
            return Ok(ReadHead {
                head,
                raw,
                head_len,
            });
        }
        if raw.len() > MAX_HEAD_BYTES {
            return Err(PanelError::bad_request("request head too large"));
        }
    }
}

pub fn parse_head(bytes: &[u8]) -> Result<RequestHead> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| PanelError::bad_request("request head is not UTF-8"))?;
    let mut lines = text.split("\r\n");
    let request_line = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| PanelError::bad_request("missing request line"))?;

    let mut parts = request_line.split(' ');
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(PanelError::bad_request(format!(
            "malformed request line {request_line:?}"
        )));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(PanelError::bad_request(format!(
            "unsupported version {version:?}"
        )));
    }
    if !target.starts_with('/') {
        return Err(PanelError::bad_request(format!(
            "unsupported request target {target:?}"
        )));
    }
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    };

    let mut headers = Vec::new();
    for line in lines.take_while(|line| !line.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| PanelError::bad_request(format!("malformed header {line:?}")))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(RequestHead {
        method: method.to_string(),
        path,
        query,
        version: version.to_string(),
        headers,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn bytes(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            headers: Vec::new(),
            body,
        }
    }

    #[must_use]
    pub fn json(status: u16, body: &Value) -> Self {
        Self::bytes(status, "application/json; charset=utf-8", body.to_string().into_bytes())
    }

    #[must_use]
    pub fn text(status: u16, body: &str) -> Self {
        Self::bytes(status, "text/plain; charset=utf-8", body.as_bytes().to_vec())
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::text(404, "404 page not found")
    }

    #[must_use]
    pub fn method_not_allowed(allow: &str) -> Self {
        Self::text(405, "405 method not allowed").with_header("Allow", allow)
    }

    #[must_use]
    pub fn bad_request(message: &str) -> Self {
        Self::text(400, message)
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len()
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        writer.write_all(head.as_bytes())?;
        writer.write_all(&self.body)?;
        writer.flush()
    }
}

#[must_use]
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
