//! TCP and TLS connection establishment.
//!
//! [`ClientStream`] is the transport's view of a connection: a plain TCP
//! stream for `http`, a rustls-wrapped one for `https`. Connecting resolves
//! the host through a [`DnsResolver`], tries each resolved address with a
//! bounded timeout, and performs the TLS handshake eagerly so handshake
//! failures surface as their own error class.

use crate::dns::DnsResolver;
use crate::errors::FetchError;
use crate::target::Authority;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, ClientConnection, RootCertStore, StreamOwned};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// An established client connection, plain or TLS.
pub enum ClientStream {
    Plain(TcpStream),
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl core::fmt::Debug for ClientStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(stream) => f.debug_tuple("Plain").field(stream).finish(),
            Self::Tls(stream) => f.debug_tuple("Tls").field(&stream.sock).finish(),
        }
    }
}

impl ClientStream {
    /// Opens a new connection to the authority.
    ///
    /// Resolves the host, attempts a timed TCP connect against each resolved
    /// address in order, and upgrades to TLS when the scheme is https.
    ///
    /// # Errors
    ///
    /// Returns `Dns`, `ConnectionTimeout`, `ConnectionFailed` or
    /// `TlsHandshakeFailed` depending on where establishment stopped.
    pub fn connect<R: DnsResolver>(
        authority: &Authority,
        resolver: &R,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let addrs = resolver.resolve(&authority.host, authority.port)?;

        let mut last_error = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(tcp) => {
                    if authority.scheme.is_https() {
                        return Self::upgrade_to_tls(tcp, &authority.host);
                    }
                    return Ok(ClientStream::Plain(tcp));
                }
                Err(err) => last_error = Some(err),
            }
        }

        match last_error {
            Some(err)
                if matches!(err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                Err(FetchError::ConnectionTimeout(format!(
                    "connection to {authority} timed out after {timeout:?}"
                )))
            }
            Some(err) => Err(FetchError::ConnectionFailed(format!(
                "connect to {authority} failed: {err}"
            ))),
            None => Err(FetchError::ConnectionFailed(format!(
                "no addresses to try for {authority}"
            ))),
        }
    }

    fn upgrade_to_tls(mut tcp: TcpStream, host: &str) -> Result<Self, FetchError> {
        let server_name: ServerName<'static> = ServerName::try_from(host.to_string())
            .map_err(|err| FetchError::TlsHandshakeFailed(format!("bad server name: {err}")))?;

        let mut conn = ClientConnection::new(tls_client_config(), server_name)
            .map_err(|err| FetchError::TlsHandshakeFailed(err.to_string()))?;

        // Drive the handshake to completion here so certificate and protocol
        // failures are reported as handshake errors, not send errors.
        while conn.is_handshaking() {
            conn.complete_io(&mut tcp)
                .map_err(|err| FetchError::TlsHandshakeFailed(err.to_string()))?;
        }

        Ok(ClientStream::Tls(Box::new(StreamOwned::new(conn, tcp))))
    }

    /// Closes the connection, releasing the socket.
    ///
    /// For TLS streams a close_notify is flushed on a best-effort basis
    /// before the socket is shut down.
    pub fn close(self) {
        match self {
            ClientStream::Plain(stream) => {
                let _ = stream.shutdown(Shutdown::Both);
            }
            ClientStream::Tls(mut stream) => {
                stream.conn.send_close_notify();
                while stream.conn.wants_write() {
                    if stream.conn.write_tls(&mut stream.sock).is_err() {
                        break;
                    }
                }
                let _ = stream.sock.shutdown(Shutdown::Both);
            }
        }
    }
}

impl Read for ClientStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            ClientStream::Plain(stream) => stream.read(buf),
            // Peers that drop the connection without a close_notify are
            // routine; EOF-terminated bodies depend on reading that as a
            // normal end of stream.
            ClientStream::Tls(stream) => match stream.read(buf) {
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(0),
                other => other,
            },
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ClientStream::Plain(stream) => stream.write(buf),
            ClientStream::Tls(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ClientStream::Plain(stream) => stream.flush(),
            ClientStream::Tls(stream) => stream.flush(),
        }
    }
}

/// Shared rustls client config: webpki trust anchors, no client auth.
fn tls_client_config() -> Arc<ClientConfig> {
    static CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();
    CONFIG
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{MockDnsResolver, StaticResolver};
    use crate::errors::DnsError;
    use crate::target::Scheme;
    use std::net::TcpListener;

    fn authority(scheme: Scheme, host: &str, port: u16) -> Authority {
        Authority {
            scheme,
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn connects_to_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let target = authority(Scheme::Http, "127.0.0.1", addr.port());
        let stream =
            ClientStream::connect(&target, &StaticResolver::new(addr), Duration::from_secs(1))
                .unwrap();

        assert!(matches!(stream, ClientStream::Plain(_)));
        stream.close();
    }

    #[test]
    fn dns_failure_propagates() {
        let resolver = MockDnsResolver::new()
            .with_error("dead.example", DnsError::ResolutionFailed("dead.example".into()));
        let target = authority(Scheme::Http, "dead.example", 80);

        let err = ClientStream::connect(&target, &resolver, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, FetchError::Dns(_)));
    }

    #[test]
    fn refused_connect_is_a_connection_failure() {
        // Bind a listener to grab a free port, then drop it so connects fail.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let target = authority(Scheme::Http, "127.0.0.1", addr.port());
        let err =
            ClientStream::connect(&target, &StaticResolver::new(addr), Duration::from_secs(1))
                .unwrap_err();
        assert!(err.is_connect_error(), "unexpected error: {err:?}");
    }
}
