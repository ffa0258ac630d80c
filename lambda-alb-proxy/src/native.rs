use http::header::{CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use http::{Extensions, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use std::net::{IpAddr, SocketAddr};
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;

/// Request headers that hold a single value: copying one of these replaces any existing value
/// rather than appending to it.
pub const OVERRIDE_HEADERS: [HeaderName; 5] =
  [HOST, CONTENT_TYPE, USER_AGENT, CONTENT_LENGTH, CONNECTION];

/// Maximum number of idle requests kept by a [`RequestPool`].
const MAX_POOLED_REQUESTS: usize = 16;

/// Request as seen by the application.
#[derive(Debug, Default)]
pub struct Request {
  method: Method,
  request_uri: String,
  host: String,
  headers: HeaderMap,
  body: Vec<u8>,
  extensions: Extensions,
}

impl Request {
  /// Request method.
  pub fn method(&self) -> &Method {
    &self.method
  }

  /// Set the request method.
  pub fn set_method(&mut self, method: Method) {
    self.method = method;
  }

  /// Request URI (path and query string), as it would appear in an HTTP request line.
  pub fn request_uri(&self) -> &str {
    &self.request_uri
  }

  /// Set the request URI.
  pub fn set_request_uri(&mut self, request_uri: impl Into<String>) {
    self.request_uri = request_uri.into();
  }

  /// Path component of the request URI.
  pub fn path(&self) -> &str {
    match self.request_uri.split_once('?') {
      Some((path, _)) => path,
      None => &self.request_uri,
    }
  }

  /// Query string component of the request URI, without the leading `?`.
  pub fn query(&self) -> Option<&str> {
    self.request_uri.split_once('?').map(|(_, query)| query)
  }

  /// Request host.
  pub fn host(&self) -> &str {
    &self.host
  }

  /// Set the request host. This also replaces the `Host` header.
  pub fn set_host(&mut self, host: &str) {
    self.host = host.to_string();
    match HeaderValue::from_str(host) {
      Ok(value) => {
        self.headers.insert(HOST, value);
      }
      Err(_) => {
        self.headers.remove(HOST);
      }
    }
  }

  /// Request headers.
  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  /// Set a header, replacing any existing values.
  pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
    if name == HOST {
      self.host = value.to_str().unwrap_or_default().to_string();
    }
    self.headers.insert(name, value);
  }

  /// Add a header value, keeping any existing values.
  pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
    self.headers.append(name, value);
  }

  /// Copy a header from another request.
  ///
  /// Headers listed in [`OVERRIDE_HEADERS`] are replaced; all other headers are appended so that
  /// repeated header names keep every value.
  pub fn copy_header(&mut self, name: HeaderName, value: HeaderValue) {
    if OVERRIDE_HEADERS.contains(&name) {
      self.set_header(name, value);
    } else {
      self.add_header(name, value);
    }
  }

  /// Declared body length (the `Content-Length` header).
  pub fn content_length(&self) -> Option<usize> {
    self
      .headers
      .get(CONTENT_LENGTH)
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.parse().ok())
  }

  /// Set the declared body length.
  pub fn set_content_length(&mut self, content_length: usize) {
    self
      .headers
      .insert(CONTENT_LENGTH, HeaderValue::from(content_length));
  }

  /// Request body.
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Replace the request body.
  pub fn set_body(&mut self, body: Vec<u8>) {
    self.body = body;
  }

  /// Typed request extensions (e.g., the ALB request context or Lambda context).
  pub fn extensions(&self) -> &Extensions {
    &self.extensions
  }

  /// Mutable typed request extensions.
  pub fn extensions_mut(&mut self) -> &mut Extensions {
    &mut self.extensions
  }

  /// Clear the request so that it can be reused. Allocated capacity is kept.
  pub fn reset(&mut self) {
    self.method = Method::default();
    self.request_uri.clear();
    self.host.clear();
    self.headers.clear();
    self.body.clear();
    self.extensions.clear();
  }
}

/// Pool of reusable [`Request`] objects.
#[derive(Debug, Default)]
pub struct RequestPool {
  idle: Mutex<Vec<Request>>,
}

impl RequestPool {
  /// Create an empty pool.
  pub fn new() -> Self {
    Self::default()
  }

  /// Take a cleared request from the pool, allocating a new one if none are idle.
  ///
  /// The request is returned to the pool when the guard is dropped.
  pub fn acquire(&self) -> PooledRequest<'_> {
    let request = self
      .idle
      .lock()
      .ok()
      .and_then(|mut idle| idle.pop())
      .unwrap_or_default();

    PooledRequest {
      pool: self,
      request: Some(request),
    }
  }

  /// Number of idle requests currently held by the pool.
  pub fn idle_len(&self) -> usize {
    self.idle.lock().map(|idle| idle.len()).unwrap_or(0)
  }

  fn release(&self, mut request: Request) {
    request.reset();
    if let Ok(mut idle) = self.idle.lock() {
      if idle.len() < MAX_POOLED_REQUESTS {
        idle.push(request);
      }
    }
  }
}

/// [`Request`] borrowed from a [`RequestPool`].
#[derive(Debug)]
pub struct PooledRequest<'p> {
  pool: &'p RequestPool,
  // Always `Some` until dropped.
  request: Option<Request>,
}

impl Deref for PooledRequest<'_> {
  type Target = Request;

  fn deref(&self) -> &Request {
    self.request.as_ref().expect("request already released")
  }
}

impl DerefMut for PooledRequest<'_> {
  fn deref_mut(&mut self) -> &mut Request {
    self.request.as_mut().expect("request already released")
  }
}

impl Drop for PooledRequest<'_> {
  fn drop(&mut self) {
    if let Some(request) = self.request.take() {
      self.pool.release(request);
    }
  }
}

/// Response produced by the application.
#[derive(Debug, Default)]
pub struct Response {
  status: StatusCode,
  headers: HeaderMap,
  body: Vec<u8>,
}

impl Response {
  /// Response status (defaults to `200 OK`).
  pub fn status(&self) -> StatusCode {
    self.status
  }

  /// Set the response status.
  pub fn set_status(&mut self, status: StatusCode) {
    self.status = status;
  }

  /// Response headers.
  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  /// Mutable response headers.
  pub fn headers_mut(&mut self) -> &mut HeaderMap {
    &mut self.headers
  }

  /// Set a header, replacing any existing values.
  pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
    self.headers.insert(name, value);
  }

  /// Add a header value, keeping any existing values.
  pub fn add_header(&mut self, name: HeaderName, value: HeaderValue) {
    self.headers.append(name, value);
  }

  /// Response body.
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Replace the response body.
  pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
    self.body = body.into();
  }

  /// Append to the response body.
  pub fn append_body(&mut self, bytes: &[u8]) {
    self.body.extend_from_slice(bytes);
  }

  /// Split the response into its status, headers and body.
  pub fn into_parts(self) -> (StatusCode, HeaderMap, Vec<u8>) {
    (self.status, self.headers, self.body)
  }
}

/// Per-request context handed to the application: the request, the response being built, and the
/// client address.
#[derive(Debug)]
pub struct RequestCtx<'r> {
  request: &'r Request,
  response: Response,
  remote_addr: SocketAddr,
}

impl<'r> RequestCtx<'r> {
  /// Create a context with an empty `200 OK` response.
  pub fn new(request: &'r Request, remote_addr: SocketAddr) -> Self {
    Self {
      request,
      response: Response::default(),
      remote_addr,
    }
  }

  /// Incoming request.
  pub fn request(&self) -> &'r Request {
    self.request
  }

  /// Response built so far.
  pub fn response(&self) -> &Response {
    &self.response
  }

  /// Mutable response.
  pub fn response_mut(&mut self) -> &mut Response {
    &mut self.response
  }

  /// Client socket address.
  pub fn remote_addr(&self) -> SocketAddr {
    self.remote_addr
  }

  /// Client IP address.
  pub fn remote_ip(&self) -> IpAddr {
    self.remote_addr.ip()
  }

  /// Set the response status.
  pub fn set_status(&mut self, status: StatusCode) {
    self.response.set_status(status);
  }

  /// Replace the response body.
  pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
    self.response.set_body(body);
  }

  /// Set a response header, replacing any existing values.
  pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
    self.response.set_header(name, value);
  }

  /// Consume the context, returning the response.
  pub fn into_response(self) -> Response {
    self.response
  }
}

#[cfg(test)]
mod tests {
  use super::{Request, RequestCtx, RequestPool};

  use http::header::{ACCEPT, CONTENT_TYPE, HOST, USER_AGENT};
  use http::{HeaderName, HeaderValue, Method, StatusCode};
  use pretty_assertions::assert_eq;

  use std::net::SocketAddr;

  #[test]
  fn test_copy_header_override_vs_append() {
    let mut request = Request::default();
    request.copy_header(USER_AGENT, HeaderValue::from_static("curl/8.0"));
    request.copy_header(USER_AGENT, HeaderValue::from_static("curl/8.1"));
    request.copy_header(
      HeaderName::from_static("x-trace"),
      HeaderValue::from_static("a"),
    );
    request.copy_header(
      HeaderName::from_static("x-trace"),
      HeaderValue::from_static("b"),
    );

    assert_eq!(
      request.headers().get_all(USER_AGENT).iter().collect::<Vec<_>>(),
      vec!["curl/8.1"]
    );
    assert_eq!(
      request.headers().get_all("x-trace").iter().collect::<Vec<_>>(),
      vec!["a", "b"]
    );
  }

  #[test]
  fn test_host_header_updates_host() {
    let mut request = Request::default();
    request.set_host("internal.example.com");
    assert_eq!(request.headers()[HOST], "internal.example.com");

    request.copy_header(HOST, HeaderValue::from_static("api.example.com"));
    assert_eq!(request.host(), "api.example.com");
    assert_eq!(request.headers().get_all(HOST).iter().count(), 1);
  }

  #[test]
  fn test_content_length() {
    let mut request = Request::default();
    assert_eq!(request.content_length(), None);

    request.set_content_length(42);
    request.set_content_length(7);
    assert_eq!(request.content_length(), Some(7));
  }

  #[test]
  fn test_request_uri_parts() {
    let mut request = Request::default();
    request.set_request_uri("/search?q=rust&page=2");
    assert_eq!(request.path(), "/search");
    assert_eq!(request.query(), Some("q=rust&page=2"));

    request.set_request_uri("/ping");
    assert_eq!(request.path(), "/ping");
    assert_eq!(request.query(), None);
  }

  #[test]
  fn test_pool_resets_released_requests() {
    let pool = RequestPool::new();
    assert_eq!(pool.idle_len(), 0);

    {
      let mut request = pool.acquire();
      request.set_method(Method::POST);
      request.set_request_uri("/upload");
      request.set_body(b"payload".to_vec());
      request.add_header(ACCEPT, HeaderValue::from_static("*/*"));
      request.extensions_mut().insert(5u32);
    }
    assert_eq!(pool.idle_len(), 1);

    let request = pool.acquire();
    assert_eq!(pool.idle_len(), 0);
    assert_eq!(*request.method(), Method::GET);
    assert_eq!(request.request_uri(), "");
    assert!(request.body().is_empty());
    assert!(request.headers().is_empty());
    assert!(request.extensions().get::<u32>().is_none());
  }

  #[test]
  fn test_request_ctx() {
    let request = Request::default();
    let remote_addr = "198.51.100.2:80".parse::<SocketAddr>().unwrap();
    let mut ctx = RequestCtx::new(&request, remote_addr);

    assert_eq!(ctx.response().status(), StatusCode::OK);
    assert_eq!(ctx.remote_ip(), remote_addr.ip());

    ctx.set_status(StatusCode::CREATED);
    ctx.set_header(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    ctx.set_body("created");
    ctx.response_mut().append_body(b"!");

    let response = ctx.into_response();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/plain");
    assert_eq!(response.body(), b"created!");
  }
}
