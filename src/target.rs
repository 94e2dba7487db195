//! URL decomposition for the network path.
//!
//! An [`Authority`] identifies a connection endpoint and keys the connection
//! pool; a [`RequestTarget`] is the per-attempt decomposition of the full URL
//! into authority, path and query.

use crate::errors::FetchError;
use url::Url;

/// Network scheme the transport understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// The port implied when the URL does not carry one.
    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    #[must_use]
    pub fn is_https(self) -> bool {
        matches!(self, Scheme::Https)
    }
}

/// The `(scheme, host, port)` triple identifying a connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl core::fmt::Display for Authority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }
}

impl Authority {
    /// The `host[:port]` form used in the `Host` request header. The port is
    /// omitted when it matches the scheme default.
    #[must_use]
    pub fn host_header(&self) -> String {
        if self.port == self.scheme.default_port() {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Decomposition of one fetch attempt's URL, derived once per attempt.
#[derive(Debug, Clone)]
pub struct RequestTarget {
    pub authority: Authority,
    pub path: String,
    pub query: Option<String>,
}

impl RequestTarget {
    /// Breaks a parsed URL down into authority, path and query.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedScheme` for anything but http/https and
    /// `InvalidUrl` when the URL has no host.
    pub fn from_url(url: &Url) -> Result<Self, FetchError> {
        let scheme = match url.scheme() {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(format!("missing host in {url}")))?
            .to_string();
        let port = url.port().unwrap_or_else(|| scheme.default_port());

        let path = if url.path().is_empty() {
            "/".to_string()
        } else {
            url.path().to_string()
        };

        Ok(RequestTarget {
            authority: Authority { scheme, host, port },
            path,
            query: url.query().map(str::to_string),
        })
    }

    /// The request-target as it appears on the request line: path plus an
    /// optional `?query` suffix.
    #[must_use]
    pub fn request_path(&self) -> String {
        match &self.query {
            Some(query) => format!("{}?{}", self.path, query),
            None => self.path.clone(),
        }
    }
}
