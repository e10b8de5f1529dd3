//! Streaming decoder for multipart response bodies.
//!
//! The predict endpoint answers with a multipart body whose parts carry
//! no reliable ordering: one `application/json` metadata part, one binary
//! image part, and possibly others. This decoder consumes a byte stream
//! plus the boundary from the `content-type` header and yields parts one
//! at a time, so the caller can stop reading as soon as it has what it
//! needs. A decoder is finite, not restartable, and consumed once;
//! dropping it drops the underlying stream.

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};

use crate::error::{FireflyError, Result};

/// One decoded part: its declared content type (lowercased, parameters
/// stripped) and raw bytes.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub content_type: String,
    pub data: Bytes,
}

/// Extract the `boundary` parameter from a `content-type` header value.
pub fn boundary_param(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|segment| {
        let (key, value) = segment.trim().split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("boundary") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

fn invalid(msg: &str) -> FireflyError {
    FireflyError::InvalidResponse(msg.to_string())
}

/// Incremental multipart decoder over a fallible byte stream.
pub struct MultipartDecoder<S> {
    stream: S,
    buf: BytesMut,
    /// `--` + boundary, without the leading CRLF.
    delimiter: Vec<u8>,
    started: bool,
    finished: bool,
    eof: bool,
}

impl<S> MultipartDecoder<S>
where
    S: Stream<Item = reqwest::Result<Bytes>> + Unpin,
{
    pub fn new(stream: S, boundary: &str) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
            delimiter: format!("--{boundary}").into_bytes(),
            started: false,
            finished: false,
            eof: false,
        }
    }

    /// Decode the next part, or `None` once the close delimiter was seen.
    pub async fn next_part(&mut self) -> Result<Option<MultipartPart>> {
        if self.finished {
            return Ok(None);
        }

        if !self.started {
            let delimiter = self.delimiter.clone();
            let pos = self
                .fill_until(&delimiter)
                .await?
                .ok_or_else(|| invalid("multipart body ended before the first boundary"))?;
            let _ = self.buf.split_to(pos + delimiter.len());
            self.started = true;
            if self.at_close_delimiter().await? {
                self.finished = true;
                return Ok(None);
            }
        }

        let content_type = self.read_part_headers().await?;

        let mut body_delimiter = Vec::with_capacity(self.delimiter.len() + 2);
        body_delimiter.extend_from_slice(b"\r\n");
        body_delimiter.extend_from_slice(&self.delimiter);
        let body_end = self
            .fill_until(&body_delimiter)
            .await?
            .ok_or_else(|| invalid("multipart part body truncated"))?;
        let data = self.buf.split_to(body_end).freeze();
        let _ = self.buf.split_to(body_delimiter.len());

        if self.at_close_delimiter().await? {
            self.finished = true;
        }

        Ok(Some(MultipartPart { content_type, data }))
    }

    /// Consume headers up to the blank line, returning the normalized
    /// content type (`application/octet-stream` if absent).
    async fn read_part_headers(&mut self) -> Result<String> {
        self.fill_at_least(2).await?;
        if self.buf.len() >= 2 && &self.buf[..2] == b"\r\n" {
            // No headers on this part.
            let _ = self.buf.split_to(2);
            return Ok("application/octet-stream".to_string());
        }

        let header_end = self
            .fill_until(b"\r\n\r\n")
            .await?
            .ok_or_else(|| invalid("multipart part headers truncated"))?;
        let header_bytes = self.buf.split_to(header_end + 4);
        let headers = String::from_utf8_lossy(&header_bytes);

        let content_type = headers
            .split("\r\n")
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim()
                    .eq_ignore_ascii_case("content-type")
                    .then(|| value.trim())
            })
            .unwrap_or("application/octet-stream");

        // Strip parameters; classification only looks at the essence.
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or(content_type)
            .trim()
            .to_ascii_lowercase();
        Ok(essence)
    }

    /// After a delimiter: `--` closes the body, anything else is padding
    /// ending in a newline before the next part.
    async fn at_close_delimiter(&mut self) -> Result<bool> {
        self.fill_at_least(2).await?;
        if self.buf.len() >= 2 && &self.buf[..2] == b"--" {
            let _ = self.buf.split_to(2);
            return Ok(true);
        }
        match self.fill_until(b"\n").await? {
            Some(pos) => {
                let _ = self.buf.split_to(pos + 1);
                Ok(false)
            }
            None => Err(invalid("multipart boundary line truncated")),
        }
    }

    /// Buffer until `needle` is visible or the stream ends. Returns the
    /// offset of the match in the buffer.
    async fn fill_until(&mut self, needle: &[u8]) -> Result<Option<usize>> {
        let mut search_from = 0;
        loop {
            if let Some(pos) = find(&self.buf, needle, search_from) {
                return Ok(Some(pos));
            }
            if self.eof {
                return Ok(None);
            }
            // The needle may straddle the chunk edge; keep a tail.
            search_from = self.buf.len().saturating_sub(needle.len() - 1);
            self.pull_chunk().await?;
        }
    }

    async fn fill_at_least(&mut self, len: usize) -> Result<()> {
        while self.buf.len() < len && !self.eof {
            self.pull_chunk().await?;
        }
        Ok(())
    }

    async fn pull_chunk(&mut self) -> Result<()> {
        match self.stream.next().await {
            Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
            Some(Err(e)) => {
                return Err(FireflyError::Network {
                    context: "Failed to read multipart response body".to_string(),
                    source: e,
                })
            }
            None => self.eof = true,
        }
        Ok(())
    }
}
