use crate::native::RequestCtx;

use async_trait::async_trait;

use std::sync::Arc;

/// Application that handles the requests forwarded by an [`AlbAdapter`](crate::AlbAdapter).
///
/// The application is typically a router that has already been fully configured. It receives each
/// request through a [`RequestCtx`] and is responsible for writing the complete response (status,
/// headers and body) into that same context. The adapter awaits [`handle`](App::handle) to
/// completion without any timeout or cancellation.
///
/// This trait is intended to be used with the [`#[async_trait]`](async_trait::async_trait)
/// attribute. Synchronous closures taking a `&mut RequestCtx` implement this trait automatically.
///
/// # Example
///
/// ```rust
/// use lambda_alb_proxy::{AlbAdapter, RequestCtx, StatusCode};
///
/// let adapter = AlbAdapter::new(|ctx: &mut RequestCtx<'_>| {
///   if ctx.request().path() == "/ping" {
///     ctx.set_body("pong");
///   } else {
///     ctx.set_status(StatusCode::NOT_FOUND);
///   }
/// });
/// # let _ = adapter;
/// ```
#[async_trait]
pub trait App: Send + Sync {
  /// Handle a single request, writing the response into `ctx`.
  async fn handle(&self, ctx: &mut RequestCtx<'_>);
}

#[async_trait]
impl<F> App for F
where
  F: Fn(&mut RequestCtx<'_>) + Send + Sync,
{
  async fn handle(&self, ctx: &mut RequestCtx<'_>) {
    self(ctx)
  }
}

#[async_trait]
impl<A> App for Arc<A>
where
  A: App + ?Sized,
{
  async fn handle(&self, ctx: &mut RequestCtx<'_>) {
    (**self).handle(ctx).await
  }
}
