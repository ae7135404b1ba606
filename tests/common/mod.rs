//! A hand-rolled single-threaded mock HTTP server for JWKS / well-known
//! endpoints, generalized from `benches/jwt_cache_performance.rs`'s
//! `MockJwksServer` (raw `TcpListener` + one `std::thread` per connection,
//! writing a fixed HTTP/1.1 response) into something that can also answer
//! 304s, 5xxs, and carry a `Retry-After` header, so integration tests can
//! exercise the fetcher's conditional-GET and retry/backoff paths without
//! pulling in a mocking crate.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// One scripted response. Responses are served in order; the last one
/// repeats once the script is exhausted.
#[derive(Clone)]
pub struct MockResponse {
    pub status: u16,
    pub body: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub retry_after_secs: Option<u64>,
}

impl MockResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into(), etag: None, last_modified: None, retry_after_secs: None }
    }

    pub fn not_modified() -> Self {
        Self { status: 304, body: String::new(), etag: None, last_modified: None, retry_after_secs: None }
    }

    pub fn server_error() -> Self {
        Self { status: 503, body: String::new(), etag: None, last_modified: None, retry_after_secs: None }
    }

    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    pub fn with_last_modified(mut self, value: impl Into<String>) -> Self {
        self.last_modified = Some(value.into());
        self
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    fn status_line(&self) -> &'static str {
        match self.status {
            200 => "200 OK",
            304 => "304 Not Modified",
            404 => "404 Not Found",
            503 => "503 Service Unavailable",
            _ => "500 Internal Server Error",
        }
    }

    fn write_to(&self, stream: &mut TcpStream) {
        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n",
            self.status_line(),
            self.body.len()
        );
        if let Some(etag) = &self.etag {
            head.push_str(&format!("ETag: {etag}\r\n"));
        }
        if let Some(lm) = &self.last_modified {
            head.push_str(&format!("Last-Modified: {lm}\r\n"));
        }
        if let Some(secs) = self.retry_after_secs {
            head.push_str(&format!("Retry-After: {secs}\r\n"));
        }
        head.push_str("Connection: close\r\n\r\n");

        let _ = stream.write_all(head.as_bytes());
        let _ = stream.write_all(self.body.as_bytes());
        let _ = stream.flush();
    }
}

/// A scripted mock server: serves `responses[min(call_count, len - 1)]` for
/// every request, tracking how many requests it has seen so tests can assert
/// on retry counts.
pub struct MockServer {
    port: u16,
    calls: Arc<AtomicUsize>,
    shutdown: Arc<std::sync::atomic::AtomicBool>,
}

impl MockServer {
    pub fn start(responses: Vec<MockResponse>) -> Self {
        assert!(!responses.is_empty(), "MockServer needs at least one scripted response");
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock listener");
        let port = listener.local_addr().expect("local_addr").port();
        listener.set_nonblocking(true).expect("set_nonblocking");

        let calls = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let responses = Arc::new(Mutex::new(responses));

        let calls_bg = Arc::clone(&calls);
        let shutdown_bg = Arc::clone(&shutdown);
        thread::spawn(move || {
            while !shutdown_bg.load(Ordering::Acquire) {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let mut buf = [0u8; 4096];
                        let _ = stream.read(&mut buf);

                        let n = calls_bg.fetch_add(1, Ordering::SeqCst);
                        let scripted = responses.lock().unwrap_or_else(|p| p.into_inner());
                        let idx = n.min(scripted.len() - 1);
                        scripted[idx].write_to(&mut stream);
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self { port, calls, shutdown }
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
