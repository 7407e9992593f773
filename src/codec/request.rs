//! Incremental HTTP request parser (spec §4.3 "Request parser").
//!
//! Grounded in `request_deserialize`/`request_deserialize_line` in
//! `request.c`: lines are processed as soon as a `\r\n` terminator is seen,
//! except for a final fragment still awaiting its terminator, which is kept
//! as a residual and re-presented to the next call. Unlike the original's
//! fixed-size reused C buffer, this implementation keeps that residual as
//! owned state on `Request` itself (`pending_line`) rather than handing a
//! byte count back to the caller to splice into a borrowed buffer - the
//! externally observable behavior (idempotent handling of a line split
//! across reads) is identical.

use bytes::BytesMut;

use super::find_crlf;
use crate::error::ProxyError;
use crate::url::{self, Url};

/// Maximum accumulated request size before the parser reports `431` (spec
/// §9 open question: an explicit cap on unbounded `raw` growth).
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

#[derive(Debug)]
pub struct Request {
    pub client_ip: String,
    /// Full, unmodified bytes received so far - forwarded byte-for-byte to
    /// the upstream server.
    pub raw: BytesMut,
    pub method: Option<String>,
    pub url: Option<Url>,
    pub http_version: Option<String>,
    pub connection: Option<String>,
    pub content_length: Option<String>,
    pub complete: bool,
    /// Bytes accumulated since the last fully-terminated `\r\n` line.
    pending_line: Vec<u8>,
}

impl Request {
    pub fn new(client_ip: String) -> Self {
        Self {
            client_ip,
            raw: BytesMut::new(),
            method: None,
            url: None,
            http_version: None,
            connection: None,
            content_length: None,
            complete: false,
            pending_line: Vec::new(),
        }
    }

    pub fn raw_len(&self) -> usize {
        self.raw.len()
    }

    /// Feed newly-read bytes into the parser. Returns the number of bytes at
    /// the tail of `data` that form a still-incomplete line (the residual,
    /// per spec §4.3) once this call returns, or a [`ProxyError`] on a
    /// malformed status line or an oversize request.
    pub fn deserialize(&mut self, data: &[u8]) -> Result<usize, ProxyError> {
        self.raw.extend_from_slice(data);
        if self.raw.len() > MAX_REQUEST_SIZE {
            return Err(ProxyError::HeaderTooLarge);
        }

        self.pending_line.extend_from_slice(data);

        loop {
            let Some(pos) = find_crlf(&self.pending_line) else {
                break;
            };

            let line: Vec<u8> = self.pending_line.drain(..pos + 2).collect();
            let line = &line[..line.len() - 2]; // strip the \r\n terminator

            if line.is_empty() {
                self.complete = true;
                break;
            }

            self.deserialize_line(line)?;
        }

        Ok(self.pending_line.len())
    }

    fn deserialize_line(&mut self, line: &[u8]) -> Result<(), ProxyError> {
        let line = String::from_utf8_lossy(line).into_owned();

        if self.method.is_none() {
            let mut parts = line.split(' ');
            let method = parts.next().unwrap_or("");
            let uri = parts.next();
            let version = parts.next();
            let extra = parts.next();

            let (Some(uri), Some(version)) = (uri, version) else {
                return Err(ProxyError::MalformedRequest(format!(
                    "malformed status line: `{line}'"
                )));
            };
            if extra.is_some() {
                return Err(ProxyError::MalformedRequest(format!(
                    "malformed status line: `{line}'"
                )));
            }

            let parsed_url = url::parse(uri)
                .map_err(|e| ProxyError::MalformedRequestUrl(e.to_string()))?;

            self.method = Some(method.to_string());
            self.url = Some(parsed_url);
            self.http_version = Some(version.to_string());
        } else {
            let Some((key, value)) = line.split_once(' ') else {
                return Ok(());
            };
            let value = value.trim_start();
            if key.eq_ignore_ascii_case("connection:") {
                self.connection = Some(value.to_string());
            } else if key.eq_ignore_ascii_case("content-length:") {
                self.content_length = Some(value.to_string());
            }
        }

        Ok(())
    }

    pub fn is_get(&self) -> bool {
        self.method.as_deref() == Some("GET")
    }

    pub fn is_http_1_1(&self) -> bool {
        self.http_version
            .as_deref()
            .map(|v| v.eq_ignore_ascii_case("HTTP/1.1"))
            .unwrap_or(false)
    }

    /// Spec §4.5 "Keep-alive determination".
    pub fn is_keepalive(&self) -> bool {
        match &self.connection {
            None => self.is_http_1_1(),
            Some(c) => c.eq_ignore_ascii_case("keep-alive"),
        }
    }
}
