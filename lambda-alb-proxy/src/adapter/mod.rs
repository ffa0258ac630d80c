use crate::accessor::{request_host, request_uri, RemoteAddr, RequestAccessor, ResponseWriter};
use crate::addr::resolve_remote_addr;
use crate::app::App;
use crate::error::EventError;
use crate::native::{RequestCtx, RequestPool};

use aws_lambda_events::alb::{AlbTargetGroupRequest, AlbTargetGroupResponse};
use lambda_runtime::LambdaEvent;
use log::debug;


/// Forwards ALB target group events to an [`App`] and encodes its responses.
///
/// Each event is decoded by a [`RequestAccessor`], copied into a pooled native request, handled by
/// the app, and encoded back into an [`AlbTargetGroupResponse`]. Calls share no state other than
/// the request pool, so a single adapter may serve concurrent invocations as long as the app
/// itself supports them.
pub struct AlbAdapter<A> {
  app: A,
  accessor: RequestAccessor,
  pool: RequestPool,
}

impl<A> AlbAdapter<A>
where
  A: App,
{
  /// Create an adapter that forwards requests to `app` using the default [`RequestAccessor`].
  pub fn new(app: A) -> Self {
    Self::with_accessor(app, RequestAccessor::new())
  }

  /// Create an adapter that forwards requests to `app`, decoding events with `accessor`.
  pub fn with_accessor(app: A, accessor: RequestAccessor) -> Self {
    Self {
      app,
      accessor,
      pool: RequestPool::new(),
    }
  }

  /// Application receiving the forwarded requests.
  pub fn app(&self) -> &A {
    &self.app
  }

  /// Accessor used to decode events.
  pub fn accessor(&self) -> &RequestAccessor {
    &self.accessor
  }

  /// Forward an ALB event to the app and return its response.
  ///
  /// If the event can't be translated, the error is logged and a `500 Internal Server Error`
  /// response is returned instead. Use [`try_proxy`](AlbAdapter::try_proxy) to handle such errors
  /// explicitly.
  pub async fn proxy(&self, event: AlbTargetGroupRequest) -> AlbTargetGroupResponse {
    self
      .try_proxy(event)
      .await
      .unwrap_or_else(AlbTargetGroupResponse::from)
  }

  /// Forward an ALB event to the app, making the Lambda context available to the app through the
  /// request extensions.
  ///
  /// Errors are handled the same way as [`proxy`](AlbAdapter::proxy).
  pub async fn proxy_with_context(
    &self,
    event: LambdaEvent<AlbTargetGroupRequest>,
  ) -> AlbTargetGroupResponse {
    self
      .try_proxy_with_context(event)
      .await
      .unwrap_or_else(AlbTargetGroupResponse::from)
  }

  /// Forward an ALB event to the app and return its response, or the error that prevented the
  /// event from reaching the app.
  pub async fn try_proxy(
    &self,
    event: AlbTargetGroupRequest,
  ) -> Result<AlbTargetGroupResponse, EventError> {
    self
      .proxy_internal(self.accessor.event_to_request(event))
      .await
  }

  /// Like [`try_proxy`](AlbAdapter::try_proxy), but makes the Lambda context available to the app
  /// through the request extensions.
  pub async fn try_proxy_with_context(
    &self,
    event: LambdaEvent<AlbTargetGroupRequest>,
  ) -> Result<AlbTargetGroupResponse, EventError> {
    self
      .proxy_internal(
        self
          .accessor
          .event_to_request_with_context(event.payload, event.context),
      )
      .await
  }

  async fn proxy_internal(
    &self,
    request: Result<http::Request<Vec<u8>>, EventError>,
  ) -> Result<AlbTargetGroupResponse, EventError> {
    let mut writer = ResponseWriter::new();
    self.adaptor(&mut writer, request?).await?;
    writer.into_proxy_response()
  }

  /// Run a decoded request through the app, writing the app's response into `writer`.
  ///
  /// The app is not invoked if the client address can't be resolved.
  pub async fn adaptor(
    &self,
    writer: &mut ResponseWriter,
    request: http::Request<Vec<u8>>,
  ) -> Result<(), EventError> {
    let host = request_host(&request).to_string();
    let uri = request_uri(&request).to_string();
    let (mut parts, body) = request.into_parts();

    // Returned to the pool on every exit path when dropped.
    let mut native = self.pool.acquire();
    native.set_method(parts.method);
    native.set_request_uri(uri);
    for (name, value) in &parts.headers {
      native.copy_header(name.clone(), value.clone());
    }
    // Applied after the headers so a custom host isn't clobbered by the event's `Host` header.
    native.set_host(&host);
    // The decoded body is authoritative, even if the event included a different Content-Length.
    native.set_content_length(body.len());
    native.set_body(body);

    let remote_addr = parts
      .extensions
      .remove::<RemoteAddr>()
      .unwrap_or_default();
    *native.extensions_mut() = parts.extensions;

    let remote_addr = resolve_remote_addr(&remote_addr.0)?;

    debug!(
      "Forwarding {} {} from {remote_addr} ({} body bytes)",
      native.method(),
      native.request_uri(),
      native.body().len()
    );

    let mut ctx = RequestCtx::new(&native, remote_addr);
    self.app.handle(&mut ctx).await;
    let (status, headers, body) = ctx.into_response().into_parts();

    debug!("App responded with status {status} ({} body bytes)", body.len());

    for (name, value) in &headers {
      writer.headers_mut().append(name.clone(), value.clone());
    }
    writer.write_header(status);
    writer.write(&body);

    Ok(())
  }
}
