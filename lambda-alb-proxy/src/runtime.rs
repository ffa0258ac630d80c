use crate::adapter::AlbAdapter;
use crate::app::App;

use aws_lambda_events::alb::AlbTargetGroupRequest;
use futures::FutureExt;
use lambda_runtime::{service_fn, LambdaEvent};

/// Start the Lambda runtime, forwarding each ALB event to the specified adapter.
///
/// # Example
///
/// ```rust,no_run
/// use lambda_alb_proxy::{run_lambda, AlbAdapter, RequestCtx};
///
/// #[tokio::main]
/// pub async fn main() {
///   env_logger::init();
///
///   let adapter = AlbAdapter::new(|ctx: &mut RequestCtx<'_>| ctx.set_body("pong"));
///
///   run_lambda(adapter).await
/// }
/// ```
pub async fn run_lambda<A>(adapter: AlbAdapter<A>)
where
  A: App,
{
  let adapter = &adapter;
  lambda_runtime::run(service_fn(
    |event: LambdaEvent<AlbTargetGroupRequest>| {
      adapter
        .proxy_with_context(event)
        .map(Result::<_, std::convert::Infallible>::Ok)
    },
  ))
  .await
  .expect("Lambda run loop should never exit")
}
