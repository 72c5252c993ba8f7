use crpt_api::telemetry::{MemorySink, PolicyEvent, RateLimitEvent, RequestOutcome};
use crpt_api::{ApiError, CrptApi, Document, Product, Strategy};
use httpmock::prelude::*;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

const PATH: &str = "/api/v3/lk/documents/create";

fn client(server: &MockServer, sink: &MemorySink) -> CrptApi {
    CrptApi::builder()
        .endpoint(server.url(PATH))
        .request_limit(10)
        .window(Duration::from_secs(1))
        .with_sink(Arc::new(sink.clone()))
        .build()
        .unwrap()
}

fn acquires(sink: &MemorySink) -> usize {
    sink.count(|e| matches!(e, PolicyEvent::RateLimit(RateLimitEvent::Acquired { .. })))
}

fn releases(sink: &MemorySink) -> usize {
    sink.count(|e| matches!(e, PolicyEvent::RateLimit(RateLimitEvent::Released { .. })))
}

fn sample_document() -> Document {
    Document::new()
        .with_doc_id("test-doc-id")
        .with_owner_inn("test-owner-inn")
        .with_participant_inn("test-participant-inn")
        .with_producer_inn("test-producer-inn")
        .with_production_date("2022-01-01")
        .with_reg_date("2022-01-01")
        .with_reg_number("test-reg-number")
        .with_product(
            Product::new()
                .with_owner_inn("test-owner-inn")
                .with_producer_inn("test-producer-inn")
                .with_tnved_code("test-tnved-code")
                .with_uit_code("test-uit-code")
                .with_uitu_code("test-uitu-code"),
        )
}

#[test]
fn successful_call_returns_parsed_document() {
    let server = MockServer::start();
    let document = sample_document();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path(PATH)
            .header("x-signature", "sig")
            .header("content-type", "application/json; charset=utf-8")
            .json_body(serde_json::to_value(&document).unwrap());
        then.status(200).header("content-type", "application/json").body(r#"{"doc_id":"X"}"#);
    });

    let sink = MemorySink::new();
    let api = client(&server, &sink);
    let created = api.create_document(&document, "sig").unwrap();

    mock.assert();
    assert_eq!(created.doc_id.as_deref(), Some("X"));
    assert_eq!(api.limiter().in_flight(), 0);
    assert_eq!(acquires(&sink), 1);
    assert_eq!(releases(&sink), 1);
    assert_eq!(
        sink.count(|e| matches!(
            e,
            PolicyEvent::Request(RequestOutcome::Success { status: 200, .. })
        )),
        1
    );
}

#[test]
fn server_error_is_reported_and_permit_released() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(500).body("internal failure");
    });

    let sink = MemorySink::new();
    let api = client(&server, &sink);
    let err = api.create_document(&sample_document(), "sig").unwrap_err();

    mock.assert();
    assert!(err.is_remote());
    assert_eq!(err.remote_details(), Some((500, "internal failure")));
    assert_eq!(api.limiter().in_flight(), 0);
    assert_eq!(acquires(&sink), releases(&sink));
    assert_eq!(
        sink.count(|e| matches!(e, PolicyEvent::Request(RequestOutcome::Failure { .. }))),
        1
    );
}

#[test]
fn empty_body_is_reported_and_permit_released() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200);
    });

    let sink = MemorySink::new();
    let api = client(&server, &sink);
    let err = api.create_document(&sample_document(), "sig").unwrap_err();

    mock.assert();
    assert!(err.is_empty_response(), "unexpected error: {err}");
    assert_eq!(api.limiter().in_flight(), 0);
    assert_eq!(acquires(&sink), 1);
    assert_eq!(releases(&sink), 1);
}

#[test]
fn malformed_body_is_a_serialization_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200).body("{not json");
    });

    let sink = MemorySink::new();
    let api = client(&server, &sink);
    let err = api.create_document(&sample_document(), "sig").unwrap_err();

    assert!(err.is_serialization(), "unexpected error: {err}");
    assert_eq!(acquires(&sink), releases(&sink));
}

#[test]
fn unreachable_endpoint_is_a_transport_error() {
    let sink = MemorySink::new();
    let api = CrptApi::builder()
        .endpoint("http://127.0.0.1:1/api/v3/lk/documents/create")
        .request_timeout(Duration::from_secs(2))
        .with_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    let err = api.create_document(&sample_document(), "sig").unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)), "unexpected error: {err}");
    assert_eq!(api.limiter().in_flight(), 0);
    assert_eq!(acquires(&sink), releases(&sink));
}

#[test]
fn every_call_pairs_one_acquire_with_one_release() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH).header("x-signature", "ok");
        then.status(201).body(r#"{"doc_id":"ok"}"#);
    });
    server.mock(|when, then| {
        when.method(POST).path(PATH).header("x-signature", "bad");
        then.status(400).body("bad signature");
    });

    let sink = MemorySink::new();
    let api = client(&server, &sink);
    let mut failures = 0;
    for signature in ["ok", "bad", "ok", "bad", "bad"] {
        if api.create_document(&sample_document(), signature).is_err() {
            failures += 1;
        }
    }

    assert_eq!(failures, 3);
    assert_eq!(acquires(&sink), 5);
    assert_eq!(releases(&sink), 5);
    assert_eq!(api.limiter().in_flight(), 0);
}

#[test]
fn calls_beyond_the_window_budget_wait_for_the_next_window() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200).body(r#"{"doc_id":"X"}"#);
    });

    let started = Instant::now();
    let api = CrptApi::builder()
        .endpoint(server.url(PATH))
        .request_limit(2)
        .window(Duration::from_millis(500))
        .build()
        .unwrap();

    api.create_document(&sample_document(), "sig").unwrap();
    api.create_document(&sample_document(), "sig").unwrap();
    assert_eq!(api.limiter().available(), 0);

    api.create_document(&sample_document(), "sig").unwrap();
    assert!(started.elapsed() >= Duration::from_millis(450));
}

#[test]
fn concurrent_calls_beyond_the_window_budget_wait_for_the_next_window() {
    const N: usize = 3;
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200).body(r#"{"doc_id":"X"}"#);
    });

    let sink = MemorySink::new();
    let started = Instant::now();
    let api = CrptApi::builder()
        .endpoint(server.url(PATH))
        .request_limit(N as u32)
        .window(Duration::from_millis(500))
        .with_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();
    let barrier = Arc::new(Barrier::new(N + 1));

    let handles: Vec<_> = (0..=N)
        .map(|_| {
            let api = api.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                api.create_document(&sample_document(), "sig").unwrap();
                started.elapsed()
            })
        })
        .collect();

    let mut finished: Vec<Duration> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    finished.sort();

    assert!(finished[N - 1] < Duration::from_millis(400), "finish times: {:?}", finished);
    assert!(finished[N] >= Duration::from_millis(450), "finish times: {:?}", finished);
    assert_eq!(
        sink.count(|e| matches!(e, PolicyEvent::Request(RequestOutcome::Success { .. }))),
        N + 1
    );
    assert_eq!(acquires(&sink), N + 1);
    assert_eq!(releases(&sink), N + 1);
    assert_eq!(api.limiter().in_flight(), 0);
}

/// Reads one request, then answers with a status line whose body is cut short.
fn truncated_error_server(status_line: &'static str) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}{}", listener.local_addr().unwrap(), PATH);
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        read_request(&mut stream);
        let response = format!(
            "{status_line}\r\nContent-Length: 64\r\nConnection: close\r\n\r\npartial"
        );
        stream.write_all(response.as_bytes()).unwrap();
        stream.flush().unwrap();
    });
    (url, handle)
}

fn read_request(stream: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            return;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf).to_ascii_lowercase();
        if let Some(end) = text.find("\r\n\r\n") {
            let body_len = text[..end]
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return;
            }
        }
    }
}

#[test]
fn unreadable_error_body_still_reports_the_status() {
    let (url, server) = truncated_error_server("HTTP/1.1 503 Service Unavailable");
    let sink = MemorySink::new();
    let api = CrptApi::builder()
        .endpoint(url)
        .with_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    let err = api.create_document(&sample_document(), "sig").unwrap_err();
    server.join().unwrap();

    assert_eq!(err.remote_details(), Some((503, "")), "unexpected error: {err}");
    assert_eq!(releases(&sink), 1);
    assert_eq!(api.limiter().in_flight(), 0);
}

#[test]
fn permit_wait_timeout_skips_the_request() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200).body(r#"{"doc_id":"X"}"#);
    });

    let sink = MemorySink::new();
    let api = CrptApi::builder()
        .endpoint(server.url(PATH))
        .request_limit(1)
        .strategy(Strategy::Concurrency)
        .max_wait(Duration::from_millis(50))
        .with_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();

    api.limiter().acquire().unwrap();
    let err = api.create_document(&sample_document(), "sig").unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
    assert_eq!(sink.count(|e| matches!(e, PolicyEvent::Request(_))), 0);

    api.limiter().release();
    assert!(api.create_document(&sample_document(), "sig").is_ok());
    assert_eq!(api.limiter().in_flight(), 0);
}

#[test]
fn cancelled_submit_never_reaches_the_server() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path(PATH);
        then.status(200).body(r#"{"doc_id":"X"}"#);
    });

    let sink = MemorySink::new();
    let api = CrptApi::builder()
        .endpoint(server.url(PATH))
        .request_limit(1)
        .strategy(Strategy::Concurrency)
        .with_sink(Arc::new(sink.clone()))
        .build()
        .unwrap();
    api.limiter().acquire().unwrap();

    let token = crpt_api::CancelToken::new();
    let worker = {
        let api = api.clone();
        let token = token.clone();
        std::thread::spawn(move || {
            api.create_document_with_cancel(&sample_document(), "sig", &token)
        })
    };

    while api.limiter().waiting() == 0 {
        std::thread::sleep(Duration::from_millis(2));
    }
    token.cancel();

    let err = worker.join().unwrap().unwrap_err();
    assert!(err.is_interrupted(), "unexpected error: {err}");
    assert_eq!(api.limiter().in_flight(), 1);
    assert_eq!(sink.count(|e| matches!(e, PolicyEvent::Request(_))), 0);
}
