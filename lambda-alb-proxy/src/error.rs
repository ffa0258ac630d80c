use crate::accessor::ResponseWriter;
use crate::StatusCode;

use aws_lambda_events::alb::AlbTargetGroupResponse;
// Until std::error::Backtrace is fully stabilized, we can't embed a type named `Backtrace` within
// a thiserror::Error (see https://github.com/dtolnay/thiserror/issues/204).
use backtrace::Backtrace as _Backtrace;
use itertools::Itertools;
use log::error;
use thiserror::Error;

/// Error that occurred while translating an ALB event or the application's response.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventError {
  /// Failed to build the HTTP request described by the ALB event.
  #[error("failed to build HTTP request from ALB event")]
  HttpRequest(#[source] Box<http::Error>, _Backtrace),
  /// Invalid base64 encoding for request body.
  // The base64 encoding comes from AWS, so this is actually an internal error.
  #[error("invalid base64 encoding for request body")]
  InvalidBodyBase64(#[source] Box<base64::DecodeError>, _Backtrace),
  /// Failed to resolve the client address into a socket address.
  #[error("could not resolve TCP address for addr `{addr}`")]
  ResolveRemoteAddr {
    /// Remote address as reported by the load balancer.
    addr: String,
    /// Underlying parse error (host names are rejected rather than looked up).
    #[source]
    source: Box<std::net::AddrParseError>,
    /// Stack trace indicating where the error occurred.
    backtrace: _Backtrace,
  },
  /// The response was finalized without a status code ever being written.
  #[error("status code not set on response")]
  StatusNotSet(_Backtrace),
}

impl EventError {
  /// Return the backtrace associated with the error, if known.
  pub fn backtrace(&self) -> Option<&_Backtrace> {
    match self {
      EventError::HttpRequest(_, backtrace)
      | EventError::InvalidBodyBase64(_, backtrace)
      | EventError::ResolveRemoteAddr { backtrace, .. }
      | EventError::StatusNotSet(backtrace) => Some(backtrace),
    }
  }

  /// Return the name of the error variant (e.g., `InvalidBodyBase64`).
  pub fn name(&self) -> &str {
    match self {
      EventError::HttpRequest(_, _) => "HttpRequest",
      EventError::InvalidBodyBase64(_, _) => "InvalidBodyBase64",
      EventError::ResolveRemoteAddr { .. } => "ResolveRemoteAddr",
      EventError::StatusNotSet(_) => "StatusNotSet",
    }
  }

  /// HTTP status code reported to the load balancer when this error aborts a request.
  ///
  /// Every variant is an internal error: the event comes from AWS, not directly from the client.
  pub fn status_code(&self) -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
  }
}

impl From<EventError> for AlbTargetGroupResponse {
  /// Build the ALB response returned when translation fails.
  ///
  /// The body is the plain-text reason phrase for the status code; the error details are logged
  /// rather than exposed to the client.
  fn from(err: EventError) -> AlbTargetGroupResponse {
    let status_code = err.status_code();
    error!(
      "Responding with error status {status_code}: {}",
      format_error(&err, Some(err.name()), err.backtrace())
    );

    let mut writer = ResponseWriter::new();
    writer.write_error(status_code);
    writer
      .into_proxy_response()
      .expect("error response should always have a status code")
  }
}

/// Helper function for formatting an error as a string containing a human-readable chain of causes.
///
/// This function will walk over the chain of causes returned by
/// [`Error::source`](std::error::Error::source) and append each underlying error (using the
/// [`Display`](std::fmt::Display) trait).
///
/// # Arguments
///
/// * `err` - Error to format.
/// * `name` - Optional name of the error type/variant (e.g., `EventError::InvalidBodyBase64`).
/// * `backtrace` - Optional [`Backtrace`](backtrace::Backtrace) indicating where the top-level
///   error occurred.
pub fn format_error(
  err: &dyn std::error::Error,
  name: Option<&str>,
  backtrace: Option<&_Backtrace>,
) -> String {
  let err_line = name
    .map(|n| format!("{}: {}", n, err))
    .unwrap_or_else(|| err.to_string());

  let top_error = if let Some(bt) = backtrace {
    format!("{err_line}\n  stack trace:\n{}", format_backtrace(bt, 4))
  } else {
    err_line
  };

  let cause_str = ErrorCauseIterator(err.source())
    .map(|cause| format!("  caused by: {cause}"))
    .join("\n");

  if !cause_str.is_empty() {
    format!("{top_error}\n{cause_str}")
  } else {
    top_error
  }
}

struct ErrorCauseIterator<'a>(Option<&'a (dyn std::error::Error + 'static)>);

impl<'a> Iterator for ErrorCauseIterator<'a> {
  type Item = &'a (dyn std::error::Error + 'static);

  fn next(&mut self) -> Option<Self::Item> {
    let current = self.0;
    self.0 = current.and_then(|err| err.source());
    current
  }
}

fn format_backtrace(backtrace: &_Backtrace, indent: usize) -> String {
  let indent_str = " ".repeat(indent);
  format!("{backtrace:?}")
    .lines()
    .map(|line| format!("{indent_str}{line}"))
    .join("\n")
}
