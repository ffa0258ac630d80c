use crate::error::EventError;
use crate::LambdaContext;

use aws_lambda_events::alb::{AlbTargetGroupRequest, AlbTargetGroupResponse};
use aws_lambda_events::encodings::Body;
use aws_lambda_events::query_map::QueryMap;
use backtrace::Backtrace;
use base64::Engine;
use headers::{ContentType, HeaderMapExt};
use http::header::{HOST, X_CONTENT_TYPE_OPTIONS};
use http::{HeaderMap, HeaderValue, Request, StatusCode};
use itertools::Itertools;
use log::debug;

/// Environment variable that overrides the scheme and host of every decoded request URI when read
/// by [`RequestAccessor::from_env`] (e.g., `https://api.example.com`).
pub const CUSTOM_HOST_VARIABLE: &str = "ALB_PROXY_HOST";

/// Client address reported by the load balancer (the last `X-Forwarded-For` entry).
///
/// Stored in the extensions of each request decoded by a [`RequestAccessor`]. The string is empty
/// when the event doesn't include an `X-Forwarded-For` header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteAddr(pub String);

/// Decodes ALB target group events into [`http::Request`]s.
#[derive(Clone, Debug, Default)]
pub struct RequestAccessor {
  strip_base_path: Option<String>,
  custom_host: Option<String>,
}

impl RequestAccessor {
  /// Accessor with no base path stripping that derives the URI host from the `Host` header.
  pub fn new() -> Self {
    Self::default()
  }

  /// Accessor that reads the custom host from the [`CUSTOM_HOST_VARIABLE`] environment variable,
  /// if set.
  pub fn from_env() -> Self {
    let accessor = Self::new();
    match std::env::var(CUSTOM_HOST_VARIABLE) {
      Ok(custom_host) if !custom_host.is_empty() => accessor.custom_host(custom_host),
      _ => accessor,
    }
  }

  /// Remove `base_path` from the beginning of each request path (e.g., `/v1` maps `/v1/ping` to
  /// `/ping`). A leading `/` is added and a trailing `/` is removed if necessary.
  pub fn strip_base_path(mut self, base_path: impl Into<String>) -> Self {
    let base_path = base_path.into();
    let base_path = base_path.trim_end_matches('/');
    self.strip_base_path = if base_path.is_empty() {
      None
    } else if base_path.starts_with('/') {
      Some(base_path.to_string())
    } else {
      Some(format!("/{base_path}"))
    };
    self
  }

  /// Use `custom_host` (scheme and authority, e.g. `https://api.example.com`) as the base of each
  /// request URI instead of the `Host` header.
  pub fn custom_host(mut self, custom_host: impl Into<String>) -> Self {
    self.custom_host = Some(custom_host.into().trim_end_matches('/').to_string());
    self
  }

  /// Decode an ALB event into an HTTP request.
  ///
  /// The request extensions include the [`RemoteAddr`] and the
  /// [`AlbTargetGroupRequestContext`](aws_lambda_events::alb::AlbTargetGroupRequestContext).
  pub fn event_to_request(
    &self,
    event: AlbTargetGroupRequest,
  ) -> Result<Request<Vec<u8>>, EventError> {
    let body = decode_body(event.body.as_deref(), event.is_base64_encoded)?;

    let mut path = event.path.unwrap_or_default();
    if let Some(base_path) = self
      .strip_base_path
      .as_deref()
      .filter(|base_path| base_path.len() > 1)
    {
      if let Some(stripped) = path.strip_prefix(base_path) {
        path = stripped.to_string();
      }
    }
    if !path.starts_with('/') {
      path.insert(0, '/');
    }

    let query_string = if !event.multi_value_query_string_parameters.is_empty() {
      query_string(&event.multi_value_query_string_parameters)
    } else {
      query_string(&event.query_string_parameters)
    };
    if !query_string.is_empty() {
      path = format!("{path}?{query_string}");
    }

    // Targets with multi-value headers enabled receive only `multiValueHeaders`, and vice versa.
    let headers = if !event.multi_value_headers.is_empty() {
      event.multi_value_headers
    } else {
      event.headers
    };

    let uri = match (&self.custom_host, host_header(&headers)) {
      (Some(custom_host), _) => format!("{custom_host}{path}"),
      (None, Some(host)) => format!("https://{host}{path}"),
      (None, None) => path,
    };

    // The load balancer appends the address of the peer it observed, so only the last entry is
    // trustworthy; earlier entries come from the client.
    let remote_addr = headers
      .get_all("x-forwarded-for")
      .iter()
      .last()
      .and_then(|value| value.to_str().ok())
      .and_then(|value| value.rsplit(',').next())
      .map(|addr| addr.trim().to_string())
      .unwrap_or_default();

    debug!(
      "Decoded ALB event: {} {uri} (remote address `{remote_addr}`, {} body bytes)",
      event.http_method,
      body.len()
    );

    let mut request = Request::builder()
      .method(event.http_method)
      .uri(uri)
      .body(body)
      .map_err(|err| EventError::HttpRequest(Box::new(err), Backtrace::new()))?;
    *request.headers_mut() = headers;
    request.extensions_mut().insert(RemoteAddr(remote_addr));
    request.extensions_mut().insert(event.request_context);

    Ok(request)
  }

  /// Decode an ALB event into an HTTP request, attaching the Lambda context to the request
  /// extensions.
  pub fn event_to_request_with_context(
    &self,
    event: AlbTargetGroupRequest,
    lambda_context: LambdaContext,
  ) -> Result<Request<Vec<u8>>, EventError> {
    let mut request = self.event_to_request(event)?;
    request.extensions_mut().insert(lambda_context);
    Ok(request)
  }
}

/// Host of a decoded request: the URI authority, or else the `Host` header.
pub fn request_host<B>(request: &Request<B>) -> &str {
  request
    .uri()
    .authority()
    .map(|authority| authority.as_str())
    .or_else(|| host_header(request.headers()))
    .unwrap_or_default()
}

/// Path and query string of a decoded request, as they would appear in an HTTP request line.
pub fn request_uri<B>(request: &Request<B>) -> &str {
  request
    .uri()
    .path_and_query()
    .map(|path_and_query| path_and_query.as_str())
    .unwrap_or("/")
}

fn host_header(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(HOST)
    .and_then(|value| value.to_str().ok())
    .filter(|host| !host.is_empty())
}

fn decode_body(body: Option<&str>, is_base64_encoded: bool) -> Result<Vec<u8>, EventError> {
  match body {
    None => Ok(Vec::new()),
    Some(body) if is_base64_encoded => base64::engine::general_purpose::STANDARD
      .decode(body)
      .map_err(|err| EventError::InvalidBodyBase64(Box::new(err), Backtrace::new())),
    Some(body) => Ok(body.as_bytes().to_vec()),
  }
}

// The load balancer passes query parameters through exactly as the client encoded them.
fn query_string(params: &QueryMap) -> String {
  params
    .iter()
    .map(|(key, value)| format!("{key}={value}"))
    .join("&")
}

/// Captures an HTTP response and encodes it as an [`AlbTargetGroupResponse`].
#[derive(Debug, Default)]
pub struct ResponseWriter {
  status: Option<StatusCode>,
  headers: HeaderMap,
  body: Vec<u8>,
}

impl ResponseWriter {
  /// Writer with no status, headers or body.
  pub fn new() -> Self {
    Self::default()
  }

  /// Status written so far, if any.
  pub fn status(&self) -> Option<StatusCode> {
    self.status
  }

  /// Response headers.
  pub fn headers(&self) -> &HeaderMap {
    &self.headers
  }

  /// Mutable response headers. Changes made after the body is written still apply, since the
  /// envelope is only encoded by [`into_proxy_response`](ResponseWriter::into_proxy_response).
  pub fn headers_mut(&mut self) -> &mut HeaderMap {
    &mut self.headers
  }

  /// Response body written so far.
  pub fn body(&self) -> &[u8] {
    &self.body
  }

  /// Set the response status. Only the first call has any effect.
  pub fn write_header(&mut self, status: StatusCode) {
    match self.status {
      None => self.status = Some(status),
      Some(existing) => debug!("Ignoring superfluous status {status} (already set to {existing})"),
    }
  }

  /// Append to the response body, setting the status to `200 OK` if none has been written.
  pub fn write(&mut self, bytes: &[u8]) {
    if self.status.is_none() {
      self.write_header(StatusCode::OK);
    }
    self.body.extend_from_slice(bytes);
  }

  /// Write a plain-text error response containing the reason phrase for `status`.
  pub fn write_error(&mut self, status: StatusCode) {
    self.headers.typed_insert(ContentType::text_utf8());
    self
      .headers
      .insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    self.write_header(status);
    self.write(status.canonical_reason().unwrap_or_default().as_bytes());
    self.write(b"\n");
  }

  /// Encode the captured response as an ALB response.
  ///
  /// UTF-8 bodies are returned as text. Any other body is returned as binary, which is base64
  /// encoded when the response is serialized.
  pub fn into_proxy_response(self) -> Result<AlbTargetGroupResponse, EventError> {
    let status = self
      .status
      .ok_or_else(|| EventError::StatusNotSet(Backtrace::new()))?;

    let (body, is_base64_encoded) = if self.body.is_empty() {
      (None, false)
    } else {
      match String::from_utf8(self.body) {
        Ok(text) => (Some(Body::Text(text)), false),
        Err(err) => (Some(Body::Binary(err.into_bytes())), true),
      }
    };

    Ok(AlbTargetGroupResponse {
      status_code: status.as_u16() as i64,
      status_description: Some(
        format!(
          "{} {}",
          status.as_u16(),
          status.canonical_reason().unwrap_or_default()
        )
        .trim_end()
        .to_string(),
      ),
      // Only the first value of each header is serialized into `headers`, which the load balancer
      // uses unless multi-value headers are enabled on the target group.
      headers: self.headers.clone(),
      multi_value_headers: self.headers,
      body,
      is_base64_encoded,
    })
  }
}
