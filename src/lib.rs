//! tinyfetch: a small synchronous HTTP(S) resource-fetching engine.
//!
//! The crate fetches a URL and hands back its body: `file:` URLs are read
//! from disk, `data:` URLs are decoded inline, and `http:`/`https:` URLs go
//! over the wire with keep-alive connection pooling, transparent gzip and
//! deflate decoding, bounded redirect following and an in-memory response
//! cache driven by `Cache-Control`.
//!
//! ```no_run
//! use tinyfetch::FetchEngine;
//!
//! # fn main() -> Result<(), tinyfetch::FetchError> {
//! let engine = FetchEngine::new();
//! let doc = engine.fetch(Some("https://example.org/"))?;
//! println!("{}", doc.text());
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod dns;
pub mod engine;
pub mod errors;
pub mod pool;
pub mod schemes;
pub mod stream;
pub mod target;
pub mod transport;

pub use cache::{CachePolicy, ResponseCache};
pub use dns::{DnsResolver, MockDnsResolver, StaticResolver, SystemDnsResolver};
pub use engine::{Document, EngineConfig, FetchEngine};
pub use errors::{DnsError, FetchError};
pub use pool::ConnectionPool;
pub use target::{Authority, RequestTarget, Scheme};
pub use transport::{FetchOutcome, Headers, HttpTransport};
