//! Shared test utilities.
//!
//! [`MockTransport`] is an in-memory HTTP double: GET answers are scripted per
//! URL (unknown URLs get a 404), every POST gets the same scripted answer.
//! It records every call and tracks how many GETs and POSTs were in flight at
//! once, so tests can assert on concurrency caps and stage ordering.
//!
//! ```ignore
//! let transport = MockTransport::new()
//!     .with_get("http://h/a.png", 200, png_bytes(&gradient_image(2, 2)))
//!     .with_delay(Duration::from_millis(10));
//! ```

use crate::transport::{HttpResponse, Transport, TransportError};
use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// =========================================================================
// Image fixtures
// =========================================================================

/// A small RGB image where every pixel is distinct, so any mirroring
/// mistake shows up in a byte comparison.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 37 % 256) as u8, (y * 53 % 256) as u8, ((x + y) * 11 % 256) as u8])
    })
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

// =========================================================================
// Mock transport
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One entry in the call log. Each call logs a start and a finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Started(Method, String),
    Finished(Method, String),
}

type Scripted = Result<HttpResponse, TransportError>;

struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    gets: HashMap<String, Scripted>,
    post: Scripted,
    delay: Duration,
    get_gauge: Gauge,
    post_gauge: Gauge,
    log: Mutex<Vec<CallEvent>>,
    posted: Mutex<Vec<(String, Vec<u8>)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            gets: HashMap::new(),
            post: Ok(HttpResponse::new(200, Vec::new())),
            delay: Duration::ZERO,
            get_gauge: Gauge::new(),
            post_gauge: Gauge::new(),
            log: Mutex::new(Vec::new()),
            posted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_get(mut self, url: &str, status: u16, body: Vec<u8>) -> Self {
        self.gets
            .insert(url.to_string(), Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn with_get_error(mut self, url: &str, error: TransportError) -> Self {
        self.gets.insert(url.to_string(), Err(error));
        self
    }

    pub fn with_post_status(mut self, status: u16) -> Self {
        self.post = Ok(HttpResponse::new(status, Vec::new()));
        self
    }

    pub fn with_post_error(mut self, error: TransportError) -> Self {
        self.post = Err(error);
        self
    }

    /// Hold every call open for `delay` so concurrent calls overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn peak_gets(&self) -> usize {
        self.get_gauge.peak.load(Ordering::SeqCst)
    }

    pub fn peak_posts(&self) -> usize {
        self.post_gauge.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<CallEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> usize {
        self.count_started(Method::Get)
    }

    pub fn post_count(&self) -> usize {
        self.count_started(Method::Post)
    }

    pub fn posted(&self) -> Vec<(String, Vec<u8>)> {
        self.posted.lock().unwrap().clone()
    }

    fn count_started(&self, method: Method) -> usize {
        self.calls()
            .iter()
            .filter(|e| matches!(e, CallEvent::Started(m, _) if *m == method))
            .count()
    }

    async fn call(&self, method: Method, url: &str, answer: Scripted) -> Scripted {
        let gauge = match method {
            Method::Get => &self.get_gauge,
            Method::Post => &self.post_gauge,
        };
        gauge.enter();
        self.log
            .lock()
            .unwrap()
            .push(CallEvent::Started(method, url.to_string()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.log
            .lock()
            .unwrap()
            .push(CallEvent::Finished(method, url.to_string()));
        gauge.exit();
        answer
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let answer = self
            .gets
            .get(url)
            .cloned()
            .unwrap_or_else(|| Ok(HttpResponse::new(404, b"not found".to_vec())));
        self.call(Method::Get, url, answer).await
    }

    async fn post(&self, url: &str, body: Vec<u8>) -> Result<HttpResponse, TransportError> {
        self.posted.lock().unwrap().push((url.to_string(), body));
        self.call(Method::Post, url, self.post.clone()).await
    }
}
