//! End-to-end fetches over loopback: body framing, compression, pooling.

mod support;

use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use std::io::Write;
use support::{ok_response, spawn_server, Reply};
use tinyfetch::FetchEngine;

#[test]
fn fetches_a_content_length_body() {
    let server = spawn_server(|_path| Reply::keep_alive(ok_response(b"hello over tcp", "")));
    let engine = FetchEngine::new();

    let doc = engine.fetch(Some(&server.url("/index.html"))).unwrap();
    assert_eq!(doc.text(), "hello over tcp");

    engine.shutdown();
}

#[test]
fn keep_alive_reuses_one_connection_for_two_requests() {
    let server = spawn_server(|path| {
        Reply::keep_alive(ok_response(
            format!("served {path}").as_bytes(),
            "Cache-Control: no-store\r\n",
        ))
    });
    let engine = FetchEngine::new();

    let first = engine.fetch(Some(&server.url("/one"))).unwrap();
    let second = engine.fetch(Some(&server.url("/two"))).unwrap();

    assert_eq!(first.text(), "served /one");
    assert_eq!(second.text(), "served /two");
    assert_eq!(server.accepts(), 1, "second request should reuse the socket");

    engine.shutdown();
}

#[test]
fn connection_close_response_is_not_pooled() {
    let server = spawn_server(|path| {
        let raw = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n{path}",
            path.len()
        );
        Reply::close(raw.into_bytes())
    });
    let engine = FetchEngine::new();

    engine.fetch(Some(&server.url("/a"))).unwrap();
    engine.fetch(Some(&server.url("/b"))).unwrap();

    assert_eq!(server.accepts(), 2, "close responses must not be reused");

    engine.shutdown();
}

#[test]
fn decodes_a_chunked_body() {
    let server = spawn_server(|_path| {
        Reply::keep_alive(
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: keep-alive\r\n\r\n\
              5\r\nhello\r\n7\r\n, world\r\n0\r\n\r\n"
                .to_vec(),
        )
    });
    let engine = FetchEngine::new();

    let doc = engine.fetch(Some(&server.url("/chunked"))).unwrap();
    assert_eq!(doc.text(), "hello, world");

    engine.shutdown();
}

#[test]
fn decodes_a_gzip_body() {
    let plain = b"compressed on the way over".to_vec();
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain).unwrap();
    let compressed = encoder.finish().unwrap();

    let server = spawn_server(move |_path| {
        Reply::keep_alive(ok_response(&compressed, "Content-Encoding: gzip\r\n"))
    });
    let engine = FetchEngine::new();

    let doc = engine.fetch(Some(&server.url("/gz"))).unwrap();
    assert_eq!(doc.body, plain);

    engine.shutdown();
}

#[test]
fn decodes_a_deflate_body() {
    let plain = b"deflate variant".to_vec();
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain).unwrap();
    let compressed = encoder.finish().unwrap();

    let server = spawn_server(move |_path| {
        Reply::keep_alive(ok_response(&compressed, "Content-Encoding: deflate\r\n"))
    });
    let engine = FetchEngine::new();

    let doc = engine.fetch(Some(&server.url("/deflate"))).unwrap();
    assert_eq!(doc.body, plain);

    engine.shutdown();
}

#[test]
fn eof_terminated_body_reads_to_close_and_is_not_pooled() {
    let server = spawn_server(|_path| {
        Reply::close(b"HTTP/1.1 200 OK\r\nCache-Control: no-store\r\n\r\nlegacy body".to_vec())
    });
    let engine = FetchEngine::new();

    let first = engine.fetch(Some(&server.url("/legacy"))).unwrap();
    assert_eq!(first.text(), "legacy body");

    let second = engine.fetch(Some(&server.url("/legacy"))).unwrap();
    assert_eq!(second.text(), "legacy body");
    assert_eq!(server.accepts(), 2, "eof-framed connections cannot be reused");

    engine.shutdown();
}
