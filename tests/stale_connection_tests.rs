//! Recovery when a pooled keep-alive connection has gone stale, and the
//! terminal failures that must not be retried.

mod support;

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::thread::sleep;
use std::time::Duration;
use tinyfetch::{FetchEngine, FetchError};

/// A server that advertises keep-alive but drops every connection after one
/// response. The client pools a socket the server has already closed.
fn spawn_lying_keep_alive_server() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let accepted = accepts.clone();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(stream) = stream else { break };
            accepted.fetch_add(1, Ordering::SeqCst);

            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap_or(0) > 0 {
                if line == "\r\n" || line == "\n" {
                    break;
                }
                line.clear();
            }

            let mut stream = stream;
            let _ = stream.write_all(
                b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nCache-Control: no-store\r\nConnection: keep-alive\r\n\r\nok",
            );
            // connection dropped here despite the keep-alive header
        }
    });

    (addr, accepts)
}

#[test]
fn stale_pooled_connection_is_retried_on_a_fresh_socket() {
    let (addr, accepts) = spawn_lying_keep_alive_server();
    let engine = FetchEngine::new();
    let url = format!("http://{addr}/");

    let first = engine.fetch(Some(&url)).unwrap();
    assert_eq!(first.text(), "ok");
    assert_eq!(accepts.load(Ordering::SeqCst), 1);

    // give the server's FIN time to land so the pooled socket is visibly dead
    sleep(Duration::from_millis(50));

    let second = engine.fetch(Some(&url)).unwrap();
    assert_eq!(second.text(), "ok");
    assert_eq!(
        accepts.load(Ordering::SeqCst),
        2,
        "retry must use exactly one fresh connection"
    );

    engine.shutdown();
}

#[test]
fn retry_against_a_dead_server_is_a_connect_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    // serve exactly one request, then stop listening entirely
    thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 {
            if line == "\r\n" || line == "\n" {
                break;
            }
            line.clear();
        }
        let mut stream = stream;
        let _ = stream.write_all(
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nCache-Control: no-store\r\nConnection: keep-alive\r\n\r\nok",
        );
        // listener and connection both dropped here
    });

    let engine = FetchEngine::new();
    let url = format!("http://{addr}/");

    assert_eq!(engine.fetch(Some(&url)).unwrap().text(), "ok");

    // pooled socket is dead and the reconnect is refused
    sleep(Duration::from_millis(50));
    let err = engine.fetch(Some(&url)).unwrap_err();
    assert!(err.is_connect_error(), "unexpected error: {err:?}");

    engine.shutdown();
}

#[test]
fn fresh_connection_closed_before_status_is_terminal() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        for stream in listener.incoming() {
            // accept and drop without writing a byte
            drop(stream);
        }
    });

    let engine = FetchEngine::new();
    let err = engine
        .fetch(Some(&format!("http://{addr}/")))
        .unwrap_err();
    assert!(
        matches!(err, FetchError::MalformedResponse(_)),
        "unexpected error: {err:?}"
    );

    engine.shutdown();
}

#[test]
fn refused_connection_is_a_connect_error() {
    // bind to learn a free port, then drop the listener so connects fail
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let engine = FetchEngine::new();
    let err = engine
        .fetch(Some(&format!("http://{addr}/")))
        .unwrap_err();
    assert!(err.is_connect_error(), "unexpected error: {err:?}");

    engine.shutdown();
}
