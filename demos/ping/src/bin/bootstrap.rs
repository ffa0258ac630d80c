use lambda_alb_proxy::{run_lambda, AlbAdapter, RequestAccessor};
use ping::PingApp;

#[tokio::main]
pub async fn main() {
  // TIP: Use the `log4rs` crate for more fine-grained control over logging.
  env_logger::init();

  let app = PingApp::new(());
  let accessor = RequestAccessor::from_env();

  run_lambda(AlbAdapter::with_accessor(app, accessor)).await
}
