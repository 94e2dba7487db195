use derive_more::From;
use std::io;

/// DNS resolution errors.
#[derive(From, Debug)]
pub enum DnsError {
    /// DNS resolution failed for the given hostname.
    #[from(ignore)]
    ResolutionFailed(String),

    /// Invalid hostname provided.
    #[from(ignore)]
    InvalidHost(String),

    /// No addresses found for the given hostname.
    #[from(ignore)]
    NoAddressesFound(String),

    /// I/O error during DNS resolution.
    #[from(ignore)]
    Io(String),
}

impl From<io::Error> for DnsError {
    fn from(err: io::Error) -> Self {
        DnsError::Io(err.to_string())
    }
}

impl Clone for DnsError {
    fn clone(&self) -> Self {
        match self {
            Self::ResolutionFailed(s) => Self::ResolutionFailed(s.clone()),
            Self::InvalidHost(s) => Self::InvalidHost(s.clone()),
            Self::NoAddressesFound(s) => Self::NoAddressesFound(s.clone()),
            Self::Io(s) => Self::Io(s.clone()),
        }
    }
}

impl std::error::Error for DnsError {}

impl core::fmt::Display for DnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ResolutionFailed(host) => write!(f, "DNS resolution failed for host: {host}"),
            Self::InvalidHost(host) => write!(f, "Invalid hostname: {host}"),
            Self::NoAddressesFound(host) => write!(f, "No addresses found for host: {host}"),
            Self::Io(err) => write!(f, "I/O error during DNS resolution: {err}"),
        }
    }
}

/// Errors surfaced by the fetch engine.
///
/// Connect-class, parse-class and redirect-class failures stay distinct so
/// callers can tell a dead host apart from a garbled response or a redirect
/// loop. File read and decompression failures never appear here; both are
/// recovered locally with a degraded body.
#[derive(From, Debug)]
pub enum FetchError {
    /// DNS resolution error.
    #[from]
    Dns(DnsError),

    /// TCP connection could not be established, or a resend after a
    /// stale-connection reconnect failed.
    #[from(ignore)]
    ConnectionFailed(String),

    /// Connect timeout exceeded.
    #[from(ignore)]
    ConnectionTimeout(String),

    /// TLS handshake failed.
    #[from(ignore)]
    TlsHandshakeFailed(String),

    /// Empty response, unparsable status line or bad chunk framing.
    #[from(ignore)]
    MalformedResponse(String),

    /// A 3xx response arrived without a `Location` header.
    #[from(ignore)]
    RedirectMissingLocation(u16),

    /// The redirect hop bound was exceeded.
    #[from(ignore)]
    TooManyRedirects(usize),

    /// The URL could not be parsed or is missing required parts.
    #[from(ignore)]
    InvalidUrl(String),

    /// A `Location` header could not be resolved against the current URL.
    #[from(ignore)]
    InvalidLocation(String),

    /// URL scheme the engine does not handle.
    #[from(ignore)]
    UnsupportedScheme(String),

    /// I/O error during the request/response exchange.
    #[from]
    Io(io::Error),
}

impl std::error::Error for FetchError {}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        FetchError::InvalidUrl(err.to_string())
    }
}

impl core::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dns(err) => write!(f, "DNS error: {err}"),
            Self::ConnectionFailed(msg) => write!(f, "Connection failed: {msg}"),
            Self::ConnectionTimeout(msg) => write!(f, "Connection timeout: {msg}"),
            Self::TlsHandshakeFailed(msg) => write!(f, "TLS handshake failed: {msg}"),
            Self::MalformedResponse(msg) => write!(f, "Malformed response: {msg}"),
            Self::RedirectMissingLocation(status) => {
                write!(f, "Redirect response {status} carried no Location header")
            }
            Self::TooManyRedirects(hops) => {
                write!(f, "Too many redirects: gave up after {hops} hops")
            }
            Self::InvalidUrl(url) => write!(f, "Invalid URL: {url}"),
            Self::InvalidLocation(loc) => write!(f, "Unresolvable redirect location: {loc}"),
            Self::UnsupportedScheme(scheme) => write!(f, "Unsupported URL scheme: {scheme}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl FetchError {
    /// True for failures that happened while establishing a connection,
    /// as opposed to parsing what came back over one.
    #[must_use]
    pub fn is_connect_error(&self) -> bool {
        matches!(
            self,
            Self::Dns(_)
                | Self::ConnectionFailed(_)
                | Self::ConnectionTimeout(_)
                | Self::TlsHandshakeFailed(_)
        )
    }
}
