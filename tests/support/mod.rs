//! Loopback HTTP server scaffolding shared by the integration tests.
//!
//! Each server binds an ephemeral port and serves scripted responses from a
//! background thread. The accept counter lets tests assert how many TCP
//! connections the client actually opened.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

pub struct TestServer {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of TCP connections accepted so far.
    pub fn accepts(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }
}

/// One scripted response: the raw bytes to write, and whether to keep the
/// connection open for another request afterwards.
pub struct Reply {
    pub raw: Vec<u8>,
    pub keep_open: bool,
}

impl Reply {
    pub fn keep_alive(raw: Vec<u8>) -> Self {
        Self {
            raw,
            keep_open: true,
        }
    }

    pub fn close(raw: Vec<u8>) -> Self {
        Self {
            raw,
            keep_open: false,
        }
    }
}

/// Spawns a detached server thread. The handler maps a request path to the
/// reply for it; the thread dies with the test process.
pub fn spawn_server<F>(handler: F) -> TestServer
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let accepted = accepts.clone();
    let handler = Arc::new(handler);

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            accepted.fetch_add(1, Ordering::SeqCst);
            let handler = handler.clone();
            thread::spawn(move || serve_connection(stream, handler.as_ref()));
        }
    });

    TestServer { addr, accepts }
}

fn serve_connection<F: Fn(&str) -> Reply>(stream: TcpStream, handler: &F) {
    let Ok(read_half) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(read_half);
    let mut stream = stream;

    while let Some(path) = read_request(&mut reader) {
        let reply = handler(&path);
        if stream.write_all(&reply.raw).is_err() {
            break;
        }
        let _ = stream.flush();
        if !reply.keep_open {
            break;
        }
    }
}

/// Reads one GET request, returning its path. `None` on EOF.
fn read_request(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).ok()? == 0 {
        return None;
    }
    let path = request_line.split_whitespace().nth(1)?.to_string();

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        if line == "\r\n" || line == "\n" {
            break;
        }
    }
    Some(path)
}

/// A 200 response with an exact Content-Length and keep-alive semantics.
/// `extra_headers` must be empty or end with `\r\n`.
pub fn ok_response(body: &[u8], extra_headers: &str) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{extra_headers}Connection: keep-alive\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

/// A redirect with no body, keep-alive.
pub fn redirect_response(status: u16, location: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {status} Moved\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: keep-alive\r\n\r\n"
    )
    .into_bytes()
}
