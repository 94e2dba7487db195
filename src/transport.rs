//! HTTP/1.1 request transport.
//!
//! Builds the request bytes, performs the blocking exchange over a pooled or
//! freshly opened [`ClientStream`], and parses the raw response: status line,
//! headers, body framing (chunked, content-length or EOF-terminated) and
//! content encodings. A send that fails on a stale pooled connection gets
//! exactly one reconnect-and-retry; afterwards the connection is either
//! returned to the pool or closed depending on what the response asked for.

use crate::dns::DnsResolver;
use crate::errors::FetchError;
use crate::pool::{ConnectionPool, PooledStream};
use crate::stream::ClientStream;
use crate::target::{Authority, RequestTarget};
use flate2::read::{DeflateDecoder, GzDecoder, MultiGzDecoder, ZlibDecoder};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

/// Case-insensitive response header map. Names are folded to ASCII lowercase
/// on insert and lookup; values are stored trimmed.
#[derive(Debug, Default, Clone)]
pub struct Headers(HashMap<String, String>);

impl Headers {
    pub fn insert(&mut self, name: &str, value: &str) {
        self.0
            .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// True when the named header is present and its value equals `expected`
    /// case-insensitively.
    #[must_use]
    pub fn value_equals(&self, name: &str, expected: &str) -> bool {
        self.get(name)
            .is_some_and(|value| value.eq_ignore_ascii_case(expected))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The transport's return value for one request/response cycle.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// How an exchange on an open connection went wrong.
///
/// The first three variants are the stale-connection signals: nothing of the
/// response had arrived yet, so the request may be retried once on a fresh
/// connection. `Fatal` failures happened mid-response and never retry.
enum ExchangeFailure {
    /// Writing the request failed.
    SendFailed(io::Error),
    /// The peer closed the stream before sending a single status byte.
    EmptyResponse,
    /// Reading the status line failed with an I/O error.
    ReadFailed(io::Error),
    /// The response arrived but could not be parsed, or failed mid-body.
    Fatal(FetchError),
}

impl core::fmt::Display for ExchangeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SendFailed(err) => write!(f, "send failed: {err}"),
            Self::EmptyResponse => write!(f, "peer closed before responding"),
            Self::ReadFailed(err) => write!(f, "status line read failed: {err}"),
            Self::Fatal(err) => write!(f, "{err}"),
        }
    }
}

impl ExchangeFailure {
    fn is_stale_signal(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }

    fn into_terminal(self) -> FetchError {
        match self {
            Self::SendFailed(err) => FetchError::ConnectionFailed(format!("send failed: {err}")),
            Self::EmptyResponse => FetchError::MalformedResponse("empty response".to_string()),
            Self::ReadFailed(err) => FetchError::Io(err),
            Self::Fatal(err) => err,
        }
    }
}

/// Blocking HTTP/1.1 transport with keep-alive pooling.
pub struct HttpTransport<R: DnsResolver> {
    resolver: R,
    pool: ConnectionPool,
    connect_timeout: Duration,
    user_agent: String,
}

impl<R: DnsResolver> HttpTransport<R> {
    pub fn new(resolver: R, connect_timeout: Duration, user_agent: String) -> Self {
        Self {
            resolver,
            pool: ConnectionPool::new(),
            connect_timeout,
            user_agent,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Performs one GET exchange against the target.
    ///
    /// Reuses a pooled connection when one exists for the target's authority.
    /// If that connection turns out to be stale (the send fails, or the peer
    /// closed before producing any response bytes), it is closed and the
    /// request is retried once on a fresh connection; a second failure is
    /// terminal.
    ///
    /// # Errors
    ///
    /// Connect-class errors when no connection can be established or the
    /// retried send fails, `MalformedResponse` for unparsable responses.
    pub fn request(&self, target: &RequestTarget) -> Result<FetchOutcome, FetchError> {
        let authority = &target.authority;
        let request = build_request(target, &self.user_agent);

        if let Some(mut stream) = self.pool.get(authority) {
            match exchange(&mut stream, &request) {
                Ok((outcome, eof_terminated)) => {
                    return Ok(self.dispose(authority, stream, outcome, eof_terminated));
                }
                Err(failure) if failure.is_stale_signal() => {
                    tracing::debug!(
                        %authority,
                        reason = %failure,
                        "pooled connection stale, retrying on a fresh connection"
                    );
                    stream.into_inner().close();
                }
                Err(failure) => {
                    stream.into_inner().close();
                    return Err(failure.into_terminal());
                }
            }
        }

        let stream = ClientStream::connect(authority, &self.resolver, self.connect_timeout)?;
        let mut stream = BufReader::new(stream);
        match exchange(&mut stream, &request) {
            Ok((outcome, eof_terminated)) => {
                Ok(self.dispose(authority, stream, outcome, eof_terminated))
            }
            Err(failure) => {
                stream.into_inner().close();
                Err(failure.into_terminal())
            }
        }
    }

    /// Connection disposition after a parsed response: close when the peer
    /// asked for it or the body ran to EOF, otherwise pool for reuse.
    fn dispose(
        &self,
        authority: &Authority,
        stream: PooledStream,
        outcome: FetchOutcome,
        eof_terminated: bool,
    ) -> FetchOutcome {
        let close_requested = outcome.headers.value_equals("connection", "close")
            || outcome.headers.value_equals("proxy-connection", "close");

        if close_requested || eof_terminated {
            tracing::debug!(%authority, close_requested, eof_terminated, "closing connection");
            stream.into_inner().close();
        } else {
            tracing::debug!(%authority, "returning connection to pool");
            self.pool.put(authority.clone(), stream);
        }
        outcome
    }
}

/// Serializes the request line and headers.
fn build_request(target: &RequestTarget, user_agent: &str) -> Vec<u8> {
    let mut request = String::with_capacity(128);
    request.push_str(&format!("GET {} HTTP/1.1\r\n", target.request_path()));
    request.push_str(&format!("Host: {}\r\n", target.authority.host_header()));
    request.push_str("Connection: keep-alive\r\n");
    request.push_str(&format!("User-Agent: {user_agent}\r\n"));
    request.push_str("Accept-Encoding: gzip\r\n");
    request.push_str("\r\n");
    request.into_bytes()
}

/// Writes the request and parses the response off the same stream.
fn exchange(
    stream: &mut PooledStream,
    request: &[u8],
) -> Result<(FetchOutcome, bool), ExchangeFailure> {
    stream
        .get_mut()
        .write_all(request)
        .and_then(|()| stream.get_mut().flush())
        .map_err(ExchangeFailure::SendFailed)?;

    read_response(stream)
}

/// Parses a raw HTTP/1.1 response: status line, headers, framed body,
/// content decoding. Returns the outcome plus whether the body was
/// EOF-terminated (such a stream cannot be reused).
fn read_response<S: BufRead>(stream: &mut S) -> Result<(FetchOutcome, bool), ExchangeFailure> {
    let status = match read_line(stream) {
        Ok(Some(line)) if line.is_empty() => return Err(ExchangeFailure::EmptyResponse),
        Ok(Some(line)) => parse_status_line(&line).map_err(ExchangeFailure::Fatal)?,
        Ok(None) => return Err(ExchangeFailure::EmptyResponse),
        Err(err) => return Err(ExchangeFailure::ReadFailed(err)),
    };

    // Header block: lines until blank (or EOF). Lines without a colon are
    // skipped, matching lenient servers in the wild.
    let mut headers = Headers::default();
    loop {
        match read_line(stream).map_err(|err| ExchangeFailure::Fatal(FetchError::Io(err)))? {
            None => break,
            Some(line) if line.is_empty() => break,
            Some(line) => {
                if let Some((name, value)) = line.split_once(':') {
                    headers.insert(name, value);
                }
            }
        }
    }

    // Body framing precedence: chunked, then content-length, then EOF.
    let mut eof_terminated = false;
    let raw_body = if headers.value_equals("transfer-encoding", "chunked") {
        let (body, truncated) = decode_chunked(stream)?;
        // A truncated chunk stream means the peer closed mid-body.
        eof_terminated = truncated;
        body
    } else if let Some(length) = headers.get("content-length") {
        match length.parse::<usize>() {
            Ok(length) => {
                let (body, complete) = read_up_to(stream, length)
                    .map_err(|err| ExchangeFailure::Fatal(FetchError::Io(err)))?;
                // A short read means the peer already closed on us.
                eof_terminated = !complete;
                body
            }
            Err(_) => {
                eof_terminated = true;
                read_to_end(stream)?
            }
        }
    } else {
        eof_terminated = true;
        read_to_end(stream)?
    };

    let body = decode_content(&headers, raw_body);

    Ok((
        FetchOutcome {
            status,
            headers,
            body,
        },
        eof_terminated,
    ))
}

fn parse_status_line(line: &str) -> Result<u16, FetchError> {
    let mut parts = line.splitn(3, ' ');
    let _version = parts.next();
    let code = parts
        .next()
        .ok_or_else(|| FetchError::MalformedResponse(format!("bad status line: {line:?}")))?;
    // Tolerant decode: a non-numeric code degrades to 0 instead of aborting.
    Ok(code.trim().parse::<u16>().unwrap_or(0))
}

/// Reads one line, tolerating both CRLF and bare LF terminators. `None`
/// means the stream hit EOF before yielding a single byte. Bytes outside
/// UTF-8 are replaced rather than rejected.
fn read_line<S: BufRead>(stream: &mut S) -> io::Result<Option<String>> {
    let mut raw = Vec::new();
    let read = stream.read_until(b'\n', &mut raw)?;
    if read == 0 {
        return Ok(None);
    }
    while raw.last() == Some(&b'\n') || raw.last() == Some(&b'\r') {
        raw.pop();
    }
    Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
}

/// Reads up to `limit` bytes, stopping early at EOF. The flag reports
/// whether the full count arrived.
fn read_up_to<S: Read>(stream: &mut S, limit: usize) -> io::Result<(Vec<u8>, bool)> {
    let mut body = Vec::with_capacity(limit.min(64 * 1024));
    let mut chunk = [0u8; 8192];
    let mut remaining = limit;

    while remaining > 0 {
        let want = remaining.min(chunk.len());
        let read = stream.read(&mut chunk[..want])?;
        if read == 0 {
            return Ok((body, false));
        }
        body.extend_from_slice(&chunk[..read]);
        remaining -= read;
    }
    Ok((body, true))
}

fn read_to_end<S: Read>(stream: &mut S) -> Result<Vec<u8>, ExchangeFailure> {
    let mut body = Vec::new();
    stream
        .read_to_end(&mut body)
        .map_err(|err| ExchangeFailure::Fatal(FetchError::Io(err)))?;
    Ok(body)
}

/// Decodes a chunked transfer-encoded body (RFC 7230 §4.1).
///
/// Each chunk is a hex size line (an optional `;`-delimited extension is
/// discarded), the chunk data, and a trailing CRLF. A zero size ends the
/// body; trailer lines after it are discarded through the blank terminator.
///
/// The flag reports truncation: the peer closed before the zero-size chunk,
/// mid-chunk, or mid-trailers. A truncated stream is exhausted and must not
/// be pooled.
fn decode_chunked<S: BufRead>(stream: &mut S) -> Result<(Vec<u8>, bool), ExchangeFailure> {
    let mut body = Vec::new();

    loop {
        let Some(line) = read_line(stream).map_err(|err| ExchangeFailure::Fatal(FetchError::Io(err)))?
        else {
            return Ok((body, true));
        };

        let size_field = line.split(';').next().unwrap_or("").trim();
        let size = usize::from_str_radix(size_field, 16).map_err(|_| {
            ExchangeFailure::Fatal(FetchError::MalformedResponse(format!(
                "bad chunk size line: {line:?}"
            )))
        })?;

        if size == 0 {
            // Discard trailer headers through the terminating blank line.
            loop {
                match read_line(stream)
                    .map_err(|err| ExchangeFailure::Fatal(FetchError::Io(err)))?
                {
                    None => return Ok((body, true)),
                    Some(trailer) if trailer.is_empty() => return Ok((body, false)),
                    Some(_) => {}
                }
            }
        }

        let (data, complete) = read_up_to(stream, size)
            .map_err(|err| ExchangeFailure::Fatal(FetchError::Io(err)))?;
        body.extend_from_slice(&data);
        if !complete {
            return Ok((body, true));
        }

        // Consume the CRLF following the chunk data.
        let (_, complete) =
            read_up_to(stream, 2).map_err(|err| ExchangeFailure::Fatal(FetchError::Io(err)))?;
        if !complete {
            return Ok((body, true));
        }
    }
}

/// Applies `Content-Encoding`. Decompression failures are recovered by
/// returning the undecoded bytes; they never abort a fetch.
fn decode_content(headers: &Headers, body: Vec<u8>) -> Vec<u8> {
    match headers.get("content-encoding") {
        Some(encoding) if encoding.eq_ignore_ascii_case("gzip") => decompress_gzip(body),
        Some(encoding) if encoding.eq_ignore_ascii_case("deflate") => decompress_deflate(body),
        _ => body,
    }
}

fn decompress_gzip(body: Vec<u8>) -> Vec<u8> {
    let mut decoded = Vec::new();
    if GzDecoder::new(body.as_slice()).read_to_end(&mut decoded).is_ok() {
        return decoded;
    }
    decoded.clear();
    if MultiGzDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .is_ok()
    {
        return decoded;
    }
    tracing::warn!("gzip decode failed, returning body undecoded");
    body
}

fn decompress_deflate(body: Vec<u8>) -> Vec<u8> {
    let mut decoded = Vec::new();
    if ZlibDecoder::new(body.as_slice()).read_to_end(&mut decoded).is_ok() {
        return decoded;
    }
    decoded.clear();
    // Some servers send raw deflate without the zlib wrapper.
    if DeflateDecoder::new(body.as_slice())
        .read_to_end(&mut decoded)
        .is_ok()
    {
        return decoded;
    }
    tracing::warn!("deflate decode failed, returning body undecoded");
    body
}
