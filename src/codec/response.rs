//! Incremental HTTP response parser and serializer (spec §4.3 "Response
//! parser" / "Serializer").
//!
//! Grounded in `response_deserialize`/`response_serialize` in `response.c`.
//! The original stores a raw `char *content` pointer into the (possibly
//! reallocated) `raw` buffer; per the design notes' "Raw-buffer pointers
//! into growable memory" guidance, this implementation stores only
//! `content_offset: usize` and recomputes the body slice on demand.

use bytes::BytesMut;

use super::{find_crlf, status_phrase};
use crate::codec::request::Request;
use crate::error::ProxyError;

/// Maximum accumulated response size before the reader gives up and reports
/// `500` rather than growing `raw` without bound (spec §9 open question).
pub const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024;

const SERVER_TOKEN: &str = "forwardcache";

#[derive(Debug, Default)]
pub struct Response {
    pub raw: BytesMut,
    pub header_complete: bool,
    pub complete: bool,
    pub status_line: Option<String>,
    /// Header fields in arrival order, matching the original's
    /// insertion-ordered hash map closely enough for the one caller
    /// (`response_serialize`) that walks specific field names.
    pub fields: Vec<(String, String)>,
    pub content_offset: usize,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a proxy-originated response (errors, or a 200 for a cache
    /// hit) from the request that triggered it - mirrors
    /// `response_init_from_request`. Never retains `req` past this call
    /// (spec §9 "Cyclic / back references").
    pub fn from_request(
        req: &Request,
        status: u16,
        content_type: Option<&str>,
        content_length: Option<usize>,
    ) -> Self {
        let mut res = Self::new();
        let version = req.http_version.as_deref().unwrap_or("HTTP/1.1");
        res.status_line = Some(format!("{version} {}", status_phrase(status)));

        res.fields.push(("Server".to_string(), SERVER_TOKEN.to_string()));
        res.fields
            .push(("Date".to_string(), httpdate::fmt_http_date(std::time::SystemTime::now())));

        if let Some(ctype) = content_type {
            res.fields.push(("Content-Type".to_string(), ctype.to_string()));
        }
        if let Some(clen) = content_length {
            res.fields
                .push(("Content-Length".to_string(), clen.to_string()));
        }

        let connection = match &req.connection {
            Some(c) => c.clone(),
            None if req.is_http_1_1() => "keep-alive".to_string(),
            None => "close".to_string(),
        };
        res.fields.push(("Connection".to_string(), connection));

        res
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_chunked(&self) -> bool {
        self.get("Transfer-Encoding")
            .map(|v| v == "chunked")
            .unwrap_or(false)
    }

    pub fn content_length_header(&self) -> usize {
        self.get("Content-Length")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// The body collected so far, valid only once `header_complete`.
    pub fn content(&self) -> &[u8] {
        &self.raw[self.content_offset..]
    }

    pub fn is_ok_2xx(&self) -> bool {
        self.status_line
            .as_deref()
            .and_then(|s| s.split_whitespace().nth(1))
            .map(|code| code.starts_with('2'))
            .unwrap_or(false)
    }

    /// Feed newly-read bytes. Returns the unconsumed residual length for a
    /// still-incomplete header line, or a [`ProxyError`] on malformed input.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<usize, ProxyError> {
        self.raw.extend_from_slice(data);
        if self.raw.len() > MAX_RESPONSE_SIZE {
            return Err(ProxyError::MalformedResponse(
                "response exceeded maximum size".to_string(),
            ));
        }

        let mut residual = 0;

        if !self.header_complete {
            residual = self.parse_header_lines()?;
        }

        if self.header_complete {
            self.check_body_complete();
        }

        Ok(residual)
    }

    fn parse_header_lines(&mut self) -> Result<usize, ProxyError> {
        loop {
            // Re-scan from the start of whatever header bytes remain
            // unconsumed; `content_offset` tracks how much of `raw` has
            // already been turned into status line / fields.
            let cursor = &self.raw[self.content_offset..];
            let Some(pos) = find_crlf(cursor) else {
                return Ok(cursor.len());
            };

            let line = cursor[..pos].to_vec();
            self.content_offset += pos + 2;

            if line.is_empty() {
                self.header_complete = true;
                return Ok(0);
            }

            self.parse_header_line(&line)?;
        }
    }

    fn parse_header_line(&mut self, line: &[u8]) -> Result<(), ProxyError> {
        let line = String::from_utf8_lossy(line).into_owned();

        if self.status_line.is_none() {
            self.status_line = Some(line);
        } else {
            let Some((key, value)) = line.split_once(':') else {
                return Err(ProxyError::MalformedResponse(format!(
                    "malformed header line: `{line}'"
                )));
            };
            let value = value.strip_prefix(' ').unwrap_or(value);
            self.fields.push((key.to_string(), value.to_string()));
        }

        Ok(())
    }

    fn check_body_complete(&mut self) {
        if self.is_chunked() {
            self.complete = chunked_body_terminated(self.content());
        } else {
            let expected = self.content_length_header();
            self.complete = self.content().len() == expected;
        }
    }
}

/// Does `body` contain the terminating zero-length chunk `\r\n0\r\n\r\n`?
/// Trailers after it are ignored, per spec §4.3.
fn chunked_body_terminated(body: &[u8]) -> bool {
    body.windows(7).any(|w| w == b"\r\n0\r\n\r\n")
        || body.starts_with(b"0\r\n\r\n")
}

/// Serialize a proxy-originated response into wire-format bytes, in the
/// canonical field order from spec §4.3.
pub fn serialize(res: &Response) -> Vec<u8> {
    let mut buf = Vec::new();
    let status = res.status_line.as_deref().unwrap_or("HTTP/1.1 500 Internal Server Error");
    buf.extend_from_slice(status.as_bytes());
    buf.extend_from_slice(b"\r\n");

    for (key, value) in &res.fields {
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");

    buf
}
